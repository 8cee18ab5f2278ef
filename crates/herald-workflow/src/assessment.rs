//! Built-in scripted assessment workflow.
//!
//! Asks a fixed list of questions in order, records one answer per turn,
//! and completes after the last answer. State is a flat serde struct, so
//! save/restore reproduces the exact continuation point.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::workflow::{
    Workflow, WorkflowContext, WorkflowError, WorkflowFactory, WorkflowReply,
};

/// Message sent when the last question has been answered.
const COMPLETION_TEXT: &str = "¡Gracias! Hemos registrado todas tus respuestas.";

/// Persisted state of a [`ScriptedAssessment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssessmentState {
    type_name: String,
    questions: Vec<String>,
    answers: Vec<String>,
    aborted: bool,
}

/// A question-by-question assessment.
pub struct ScriptedAssessment {
    state: AssessmentState,
}

impl ScriptedAssessment {
    fn new(type_name: String, questions: Vec<String>) -> Self {
        Self {
            state: AssessmentState {
                type_name,
                questions,
                answers: Vec::new(),
                aborted: false,
            },
        }
    }

    /// Answers collected so far, in question order.
    pub fn answers(&self) -> &[String] {
        &self.state.answers
    }

    fn next_question(&self) -> Option<&str> {
        self.state
            .questions
            .get(self.state.answers.len())
            .map(String::as_str)
    }
}

#[async_trait]
impl Workflow for ScriptedAssessment {
    fn type_name(&self) -> &str {
        &self.state.type_name
    }

    async fn initialize(&mut self, _ctx: &WorkflowContext) -> Result<WorkflowReply, WorkflowError> {
        match self.next_question() {
            Some(question) => Ok(WorkflowReply::text(question)),
            // An empty script completes immediately.
            None => Ok(WorkflowReply::text(COMPLETION_TEXT)),
        }
    }

    async fn handle_message(&mut self, text: &str) -> Result<WorkflowReply, WorkflowError> {
        if self.is_completed() {
            return Ok(WorkflowReply::text(COMPLETION_TEXT));
        }
        self.state.answers.push(text.trim().to_string());
        match self.next_question() {
            Some(question) => Ok(WorkflowReply::text(question)),
            None => Ok(WorkflowReply::text(COMPLETION_TEXT)),
        }
    }

    fn is_completed(&self) -> bool {
        self.state.aborted || self.state.answers.len() >= self.state.questions.len()
    }

    fn save_state(&self) -> Result<Value, WorkflowError> {
        serde_json::to_value(&self.state).map_err(|e| WorkflowError::State(e.to_string()))
    }

    fn abort(&mut self) {
        self.state.aborted = true;
    }
}

/// Factory for a named assessment script.
pub struct AssessmentFactory {
    type_name: String,
    questions: Vec<String>,
}

impl AssessmentFactory {
    /// Create a factory producing assessments with the given questions.
    pub fn new(type_name: impl Into<String>, questions: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            questions,
        })
    }
}

impl WorkflowFactory for AssessmentFactory {
    fn create(&self) -> Box<dyn Workflow> {
        Box::new(ScriptedAssessment::new(
            self.type_name.clone(),
            self.questions.clone(),
        ))
    }

    fn load_from_state(&self, state: &Value) -> Result<Box<dyn Workflow>, WorkflowError> {
        let state: AssessmentState =
            serde_json::from_value(state.clone()).map_err(|e| WorkflowError::State(e.to_string()))?;
        Ok(Box::new(ScriptedAssessment { state }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_questions() -> Vec<String> {
        vec![
            "¿Cuál es tu nombre completo?".to_string(),
            "¿Cuántos años de experiencia tienes?".to_string(),
            "¿En qué ciudad vives?".to_string(),
        ]
    }

    fn ctx() -> WorkflowContext {
        WorkflowContext::new("t1", "u42", "whatsapp")
    }

    #[tokio::test]
    async fn asks_questions_in_order_and_completes() {
        let factory = AssessmentFactory::new("assessment", three_questions());
        let mut wf = factory.create();

        let first = wf.initialize(&ctx()).await.unwrap();
        assert_eq!(first.text, "¿Cuál es tu nombre completo?");
        assert!(!wf.is_completed());

        let second = wf.handle_message("Ana Pérez").await.unwrap();
        assert_eq!(second.text, "¿Cuántos años de experiencia tienes?");

        let third = wf.handle_message("5").await.unwrap();
        assert_eq!(third.text, "¿En qué ciudad vives?");
        assert!(!wf.is_completed());

        let done = wf.handle_message("Monterrey").await.unwrap();
        assert_eq!(done.text, COMPLETION_TEXT);
        assert!(wf.is_completed());
    }

    #[tokio::test]
    async fn empty_script_completes_immediately() {
        let factory = AssessmentFactory::new("noop", Vec::new());
        let mut wf = factory.create();
        let reply = wf.initialize(&ctx()).await.unwrap();
        assert_eq!(reply.text, COMPLETION_TEXT);
        assert!(wf.is_completed());
    }

    #[tokio::test]
    async fn abort_completes_the_instance() {
        let factory = AssessmentFactory::new("assessment", three_questions());
        let mut wf = factory.create();
        wf.initialize(&ctx()).await.unwrap();
        wf.abort();
        assert!(wf.is_completed());
    }

    #[tokio::test]
    async fn save_and_restore_resume_mid_script() {
        let factory = AssessmentFactory::new("assessment", three_questions());
        let mut wf = factory.create();
        wf.initialize(&ctx()).await.unwrap();
        wf.handle_message("Ana Pérez").await.unwrap();

        let state = wf.save_state().unwrap();
        let mut restored = factory.load_from_state(&state).unwrap();
        assert!(!restored.is_completed());

        // The restored instance continues exactly where the original was:
        // next answer lands on question two, prompting question three.
        let reply = restored.handle_message("5").await.unwrap();
        assert_eq!(reply.text, "¿En qué ciudad vives?");
    }

    #[test]
    fn malformed_state_is_rejected() {
        let factory = AssessmentFactory::new("assessment", three_questions());
        let err = factory
            .load_from_state(&serde_json::json!({ "bogus": 1 }))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));
    }
}
