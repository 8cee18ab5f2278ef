//! End-to-end conversation tests through the full stack: orchestrator,
//! tenant profiles, workflow manager, delivery middleware, rate limiter,
//! registry, and recording adapters.

mod common;

use herald_daemon::TOS_ACCEPT_PAYLOAD;
use herald_types::{SessionKey, SessionState};

use common::{build_stack, whatsapp_text, SentKind};

#[tokio::test]
async fn test_hola_from_new_user_triggers_tos_gate() {
    let stack = build_stack();

    let outcome = stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("hola"))
        .await
        .unwrap();
    assert!(outcome.success);

    // The brand-new session was created and moved to the TOS gate before
    // any business content.
    let key = SessionKey::new("t1", "u42", "whatsapp");
    let session = stack.sessions_state(&key);
    assert_eq!(session.state, SessionState::AwaitingTos);

    // Exactly one delivery: the TOS prompt with exactly two options, in
    // order, on the WhatsApp-like channel.
    let sent = stack.whatsapp.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, SentKind::Options);
    assert_eq!(sent[0].recipient, "u42");
    let titles: Vec<&str> = sent[0].options.iter().map(|o| o.title.as_str()).collect();
    assert_eq!(titles, vec!["Sí, continuar", "No"]);
}

#[tokio::test]
async fn test_non_affirmative_reply_reprompts_without_transition() {
    let stack = build_stack();
    let key = SessionKey::new("t1", "u42", "whatsapp");

    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("hola"))
        .await
        .unwrap();
    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("luego"))
        .await
        .unwrap();

    assert_eq!(stack.sessions_state(&key).state, SessionState::AwaitingTos);
    // Two TOS prompts were sent, nothing else.
    let sent = stack.whatsapp.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.kind == SentKind::Options));
}

#[tokio::test]
async fn test_accepting_tos_delivers_welcome() {
    let stack = build_stack();
    let key = SessionKey::new("t1", "u42", "whatsapp");

    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("hola"))
        .await
        .unwrap();

    // The user taps the affirmative button; the channel reports its payload.
    let tap = serde_json::json!({
        "interactive": { "button_reply": { "id": TOS_ACCEPT_PAYLOAD } }
    });
    let outcome = stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &tap)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.response, "¡Bienvenido a HuntRED!");
    assert_eq!(stack.sessions_state(&key).state, SessionState::Conversing);
    assert_eq!(stack.whatsapp.last_sent().unwrap().text, "¡Bienvenido a HuntRED!");
}

#[tokio::test]
async fn test_workflow_funnel_end_to_end() {
    let stack = build_stack();
    let key = SessionKey::new("t1", "u42", "whatsapp");

    // Get past the TOS gate.
    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("hola"))
        .await
        .unwrap();
    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("sí, continuar"))
        .await
        .unwrap();

    // The bound trigger starts the assessment.
    let outcome = stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("evaluación"))
        .await
        .unwrap();
    assert_eq!(outcome.response, "¿Cuál es tu nombre completo?");

    let session = stack.sessions_state(&key);
    assert_eq!(session.state, SessionState::InWorkflow);
    let workflow_id = session.active_workflow().unwrap().to_string();
    assert!(stack.workflows.is_active(&workflow_id).await);

    // Two answers complete the assessment.
    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("Ana Pérez"))
        .await
        .unwrap();
    let outcome = stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("Monterrey"))
        .await
        .unwrap();
    assert!(outcome.response.contains("Gracias"));

    // The session is back to conversing, the instance is gone, and the
    // active-workflow binding is cleared.
    let session = stack.sessions_state(&key);
    assert_eq!(session.state, SessionState::Conversing);
    assert!(session.active_workflow().is_none());
    assert!(!stack.workflows.is_active(&workflow_id).await);
}

#[tokio::test]
async fn test_intent_reply_when_no_workflow_bound() {
    let stack = build_stack();

    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("hola"))
        .await
        .unwrap();
    stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("sí"))
        .await
        .unwrap();

    let outcome = stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("buenos días"))
        .await
        .unwrap();
    assert_eq!(outcome.response, "¡Hola! ¿En qué puedo ayudarte?");
}

#[tokio::test(start_paused = true)]
async fn test_user_still_gets_response_text_when_delivery_dies() {
    let stack = build_stack();
    // Both the primary and the fallback channel are down.
    stack.whatsapp.fail_next(u32::MAX);
    stack.telegram.fail_next(u32::MAX);

    let outcome = stack
        .orchestrator
        .route_inbound("t1", "whatsapp", "u42", &whatsapp_text("hola"))
        .await
        .unwrap();

    // Delivery failed, but the ingress caller still gets the text so the
    // user never sees silence.
    assert!(!outcome.success);
    assert!(!outcome.response.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_menu_is_paginated_with_forward_option() {
    let stack = build_stack();
    let channel = herald_types::ChannelId::new("whatsapp");
    let tenant = herald_types::TenantId::new("t1");

    let result = stack
        .orchestrator
        .send_menu(&channel, &tenant, "u42", 0)
        .await
        .unwrap();
    assert!(result.success);

    // Six menu entries, page size five: page one carries five entries plus
    // the "Ver más" pager. The adapter only renders three inline options,
    // so the middleware splits the page into two paced chunks; the
    // concatenation is what the user ends up seeing.
    let page_one: Vec<_> = stack
        .whatsapp
        .sent()
        .iter()
        .flat_map(|m| m.options.clone())
        .collect();
    assert_eq!(page_one.len(), 6);
    assert_eq!(page_one[5].title, "Ver más");
    assert_eq!(page_one[5].payload, "menu:1");

    // Page two holds the remaining entry, no pager.
    stack
        .orchestrator
        .send_menu(&channel, &tenant, "u42", 1)
        .await
        .unwrap();
    let last_page = stack.whatsapp.last_sent().unwrap();
    assert_eq!(last_page.options.len(), 1);
    assert_eq!(last_page.options[0].title, "Ayuda");
}
