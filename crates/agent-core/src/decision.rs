//! Decoding of the controller's per-turn oracle decision.

use oracle_client::{extract_json_value, OracleReply};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ConsultKnowledgeBase,
    RunScreeningTool,
    RespondToUser,
    Unknown(String),
}

impl Action {
    /// Accepts the legacy spellings `run_qcc_tool` and `response_to_user`.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "consult_knowledge_base" => Self::ConsultKnowledgeBase,
            "run_screening_tool" | "run_qcc_tool" => Self::RunScreeningTool,
            "respond_to_user" | "response_to_user" => Self::RespondToUser,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Metric label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConsultKnowledgeBase => "consult_knowledge_base",
            Self::RunScreeningTool => "run_screening_tool",
            Self::RespondToUser => "respond_to_user",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub thought: String,
    pub action: Action,
    pub params: Map<String, Value>,
}

impl Decision {
    /// String parameter, empty when absent or not a string.
    pub fn param(&self, key: &str) -> &str {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Parses decision text. Text without a JSON object carrying an `action`
/// key is `Malformed`; an action that is present but not recognised
/// decodes to [`Action::Unknown`].
pub fn parse_decision(text: &str) -> OracleReply<Decision> {
    let Some(Value::Object(mut object)) = extract_json_value(text) else {
        return OracleReply::Malformed(text.to_string());
    };
    let action = match object.remove("action") {
        Some(Value::String(name)) => Action::parse(&name),
        Some(Value::Null) | None => return OracleReply::Malformed(text.to_string()),
        Some(other) => Action::Unknown(other.to_string()),
    };
    let thought = match object.remove("thought") {
        Some(Value::String(thought)) => thought,
        _ => String::new(),
    };
    let params = match object.remove("params") {
        Some(Value::Object(params)) => params,
        _ => Map::new(),
    };
    OracleReply::Decision(Decision {
        thought,
        action,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(text: &str) -> Decision {
        match parse_decision(text) {
            OracleReply::Decision(decision) => decision,
            OracleReply::Malformed(raw) => panic!("malformed: {raw}"),
        }
    }

    #[test]
    fn parses_fenced_decision_with_raw_newlines() {
        let text = "```json\n{\"thought\": \"ready\", \"action\": \"run_qcc_tool\", \"params\": {\"guidance_text\": \"地域：上海\n关键词：汽车\"}}\n```";
        let parsed = decision(text);
        assert_eq!(parsed.action, Action::RunScreeningTool);
        assert_eq!(parsed.thought, "ready");
        assert_eq!(parsed.param("guidance_text"), "地域：上海\n关键词：汽车");
    }

    #[test]
    fn unknown_action_is_not_malformed() {
        let parsed = decision(r#"{"action": "browse_web", "params": {}}"#);
        assert_eq!(parsed.action, Action::Unknown("browse_web".into()));
        assert_eq!(parsed.param("query"), "");
    }

    #[test]
    fn text_without_action_is_malformed() {
        assert!(matches!(
            parse_decision("Sure, which region?"),
            OracleReply::Malformed(raw) if raw == "Sure, which region?"
        ));
        assert!(matches!(
            parse_decision(r#"{"thought": "hmm"}"#),
            OracleReply::Malformed(_)
        ));
    }

    #[test]
    fn legacy_spellings_map_to_actions() {
        assert_eq!(Action::parse("response_to_user"), Action::RespondToUser);
        assert_eq!(Action::parse(" consult_knowledge_base "), Action::ConsultKnowledgeBase);
    }
}
