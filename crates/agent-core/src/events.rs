//! Caller-facing events of one controller run and their SSE line format.

use screening_pipeline::ProgressMessage;

pub const THINKING_PREFIX: &str = "[Thinking] ";
pub const STATUS_MARKER: &str = "[STATUS_MSG]";
pub const TEXT_RESPONSE_MARKER: &str = "[TEXT_RESPONSE]";
pub const END_OF_STREAM: &str = "---END_OF_STREAM---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Thinking(String),
    Status(String),
    /// Forwarded screening tool output, in production order.
    Progress(ProgressMessage),
    TextResponse(String),
    EndOfStream,
}

impl AgentEvent {
    /// Payload without the `data: ` framing.
    pub fn payload(&self) -> String {
        match self {
            Self::Thinking(text) => format!("{THINKING_PREFIX}{text}"),
            Self::Status(text) => format!("{STATUS_MARKER}{text}"),
            Self::Progress(message) => message.to_line(),
            Self::TextResponse(text) => format!("{TEXT_RESPONSE_MARKER}{text}"),
            Self::EndOfStream => END_OF_STREAM.to_string(),
        }
    }

    /// One SSE event. Line breaks inside the payload are escaped as `\n`.
    pub fn to_wire(&self) -> String {
        format!("data: {}\n\n", escape_newlines(&self.payload()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

pub fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\\n").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_lines_escape_newlines() {
        let event = AgentEvent::TextResponse("which region?\nfor example 广东".into());
        assert_eq!(
            event.to_wire(),
            "data: [TEXT_RESPONSE]which region?\\nfor example 广东\n\n"
        );
    }

    #[test]
    fn progress_uses_pipeline_markers() {
        let event = AgentEvent::Progress(ProgressMessage::FinalReport("Regions: “广东省”".into()));
        assert_eq!(event.payload(), "[FINAL_REPORT]Regions: “广东省”");
        let error = AgentEvent::Progress(ProgressMessage::Error("boom\ntrace".into()));
        assert_eq!(error.to_wire(), "data: ❌ Error: boom\\ntrace\n\n");
        assert_eq!(AgentEvent::EndOfStream.to_wire(), "data: ---END_OF_STREAM---\n\n");
    }
}
