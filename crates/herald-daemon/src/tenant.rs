//! Tenant business profiles.
//!
//! Each tenant (business unit) gets its own conversational surface: welcome
//! messages, TOS prompt, workflow trigger bindings, intent patterns, and
//! menu. Profiles are resolved from configuration once at load time into a
//! [`ProfileRegistry`]; per-tenant dispatch is a table lookup, never string
//! matching scattered through the hot path.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::info;

use herald_types::{HeraldConfig, HeraldError, MessageOption, TenantConfig, TenantId};

/// Payload of the affirmative TOS option.
pub const TOS_ACCEPT_PAYLOAD: &str = "tos_accept";

/// Payload of the negative TOS option.
pub const TOS_DECLINE_PAYLOAD: &str = "tos_decline";

/// A compiled intent pattern.
struct IntentPattern {
    pattern: Regex,
    reply: String,
}

/// Runtime conversational profile for one tenant.
pub struct BusinessProfile {
    pub tenant_id: TenantId,
    pub display_name: String,
    /// Sent in order right after TOS acceptance.
    pub initial_messages: Vec<String>,
    pub tos_prompt: String,
    tos_accept_option: String,
    tos_decline_option: String,
    /// Normalized trigger text -> workflow type name.
    workflow_bindings: HashMap<String, String>,
    intent_patterns: Vec<IntentPattern>,
    pub menu: Vec<MessageOption>,
}

impl BusinessProfile {
    /// Compile a profile from its configuration.
    fn from_config(tenant_id: TenantId, config: &TenantConfig) -> Result<Self, HeraldError> {
        let mut intent_patterns = Vec::with_capacity(config.intent_patterns.len());
        for entry in &config.intent_patterns {
            let pattern = Regex::new(&format!("(?i){}", entry.pattern)).map_err(|e| {
                HeraldError::ConfigError(format!(
                    "tenant {tenant_id}: bad intent pattern {:?}: {e}",
                    entry.pattern
                ))
            })?;
            intent_patterns.push(IntentPattern {
                pattern,
                reply: entry.reply.clone(),
            });
        }

        let workflow_bindings = config
            .workflow_bindings
            .iter()
            .map(|(trigger, type_name)| (normalize(trigger), type_name.clone()))
            .collect();

        let menu = config
            .menu
            .iter()
            .map(|entry| MessageOption {
                title: entry.title.clone(),
                payload: entry.payload.clone(),
                url: entry.url.clone(),
            })
            .collect();

        Ok(Self {
            tenant_id,
            display_name: config.display_name.clone(),
            initial_messages: config.initial_messages.clone(),
            tos_prompt: config.tos_prompt.clone(),
            tos_accept_option: config.tos_accept_option.clone(),
            tos_decline_option: config.tos_decline_option.clone(),
            workflow_bindings,
            intent_patterns,
            menu,
        })
    }

    /// The two TOS options, affirmative first.
    pub fn tos_options(&self) -> Vec<MessageOption> {
        vec![
            MessageOption::new(&self.tos_accept_option, TOS_ACCEPT_PAYLOAD),
            MessageOption::new(&self.tos_decline_option, TOS_DECLINE_PAYLOAD),
        ]
    }

    /// Whether an inbound reply counts as TOS acceptance: the option
    /// payload, the option title, or a bare yes — all compared
    /// case- and accent-insensitively.
    pub fn is_tos_affirmative(&self, text: &str) -> bool {
        let reply = normalize(text);
        if reply == TOS_ACCEPT_PAYLOAD {
            return true;
        }
        if reply == normalize(&self.tos_accept_option) {
            return true;
        }
        matches!(reply.as_str(), "si" | "yes" | "acepto")
    }

    /// Workflow type bound to this inbound text, if any.
    pub fn workflow_for(&self, text: &str) -> Option<&str> {
        self.workflow_bindings
            .get(&normalize(text))
            .map(String::as_str)
    }

    /// First intent pattern matching this text, if any.
    pub fn reply_for_intent(&self, text: &str) -> Option<&str> {
        self.intent_patterns
            .iter()
            .find(|entry| entry.pattern.is_match(text))
            .map(|entry| entry.reply.as_str())
    }
}

/// All tenant profiles, resolved once at configuration load.
pub struct ProfileRegistry {
    profiles: HashMap<TenantId, Arc<BusinessProfile>>,
}

impl ProfileRegistry {
    /// Compile every tenant profile in the configuration.
    pub fn from_config(config: &HeraldConfig) -> Result<Self, HeraldError> {
        let mut profiles = HashMap::with_capacity(config.tenants.len());
        for (tenant_id, tenant_config) in &config.tenants {
            let tenant_id = TenantId::new(tenant_id.as_str());
            let profile = BusinessProfile::from_config(tenant_id.clone(), tenant_config)?;
            profiles.insert(tenant_id, Arc::new(profile));
        }
        info!(tenants = profiles.len(), "tenant profiles compiled");
        Ok(Self { profiles })
    }

    /// The profile for a tenant, if configured.
    pub fn get(&self, tenant_id: &TenantId) -> Option<Arc<BusinessProfile>> {
        self.profiles.get(tenant_id).cloned()
    }
}

/// Lowercase, trim, and strip the accents that show up in Spanish-language
/// replies, so "Sí, continuar" matches "si, continuar".
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_types::IntentPatternConfig;

    fn registry() -> ProfileRegistry {
        let mut config = HeraldConfig::default();
        config.tenants.insert(
            "t1".to_string(),
            TenantConfig {
                display_name: "HuntRED".to_string(),
                initial_messages: vec!["¡Bienvenido a HuntRED!".to_string()],
                tos_prompt: "¿Aceptas los términos?".to_string(),
                tos_accept_option: "Sí, continuar".to_string(),
                tos_decline_option: "No".to_string(),
                workflow_bindings: HashMap::from([(
                    "evaluación".to_string(),
                    "assessment".to_string(),
                )]),
                intent_patterns: vec![IntentPatternConfig {
                    pattern: "hola|buen(os|as)".to_string(),
                    reply: "¡Hola! ¿En qué puedo ayudarte?".to_string(),
                }],
                menu: vec![herald_types::MenuEntryConfig {
                    title: "Ver vacantes".to_string(),
                    payload: "vacancies".to_string(),
                    url: None,
                }],
            },
        );
        ProfileRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn tos_options_are_affirmative_first() {
        let registry = registry();
        let profile = registry.get(&TenantId::new("t1")).unwrap();
        let options = profile.tos_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].title, "Sí, continuar");
        assert_eq!(options[1].title, "No");
    }

    #[test]
    fn affirmative_matching_is_accent_insensitive() {
        let registry = registry();
        let profile = registry.get(&TenantId::new("t1")).unwrap();

        assert!(profile.is_tos_affirmative("Sí, continuar"));
        assert!(profile.is_tos_affirmative("si, continuar"));
        assert!(profile.is_tos_affirmative("  SI  "));
        assert!(profile.is_tos_affirmative("sí"));
        assert!(profile.is_tos_affirmative(TOS_ACCEPT_PAYLOAD));

        assert!(!profile.is_tos_affirmative("No"));
        assert!(!profile.is_tos_affirmative("luego"));
    }

    #[test]
    fn workflow_triggers_match_normalized_text() {
        let registry = registry();
        let profile = registry.get(&TenantId::new("t1")).unwrap();

        assert_eq!(profile.workflow_for("Evaluación"), Some("assessment"));
        assert_eq!(profile.workflow_for("evaluacion"), Some("assessment"));
        assert_eq!(profile.workflow_for("vacantes"), None);
    }

    #[test]
    fn intent_patterns_match_case_insensitively() {
        let registry = registry();
        let profile = registry.get(&TenantId::new("t1")).unwrap();

        assert_eq!(
            profile.reply_for_intent("HOLA"),
            Some("¡Hola! ¿En qué puedo ayudarte?")
        );
        assert_eq!(profile.reply_for_intent("buenos días"), Some("¡Hola! ¿En qué puedo ayudarte?"));
        assert_eq!(profile.reply_for_intent("adiós"), None);
    }

    #[test]
    fn bad_pattern_fails_loudly_at_load() {
        let mut config = HeraldConfig::default();
        config.tenants.insert(
            "t1".to_string(),
            TenantConfig {
                display_name: "X".to_string(),
                initial_messages: Vec::new(),
                tos_prompt: "tos".to_string(),
                tos_accept_option: "si".to_string(),
                tos_decline_option: "no".to_string(),
                workflow_bindings: HashMap::new(),
                intent_patterns: vec![IntentPatternConfig {
                    pattern: "(unclosed".to_string(),
                    reply: "x".to_string(),
                }],
                menu: Vec::new(),
            },
        );
        assert!(ProfileRegistry::from_config(&config).is_err());
    }

    #[test]
    fn unknown_tenant_is_none() {
        let registry = registry();
        assert!(registry.get(&TenantId::new("t999")).is_none());
    }
}
