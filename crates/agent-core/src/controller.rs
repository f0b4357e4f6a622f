//! Reason-Act controller: one bounded decision loop per inbound message.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use oracle_client::{OracleClient, OracleReply};
use screening_pipeline::{progress_channel, ProgressDrain, ProgressMessage, ScreeningTool};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::decision::{parse_decision, Action};
use crate::events::AgentEvent;
use crate::knowledge::KnowledgeGateway;
use crate::metrics;
use crate::prompt::decision_prompt;
use crate::session::{SessionStore, Turn};

pub const TURN_LIMIT_MESSAGE: &str =
    "This request is too complex to finish in one pass. Please narrow your query and try again.";
pub const NO_REPORT_PLACEHOLDER: &str =
    "The screening finished but produced no report. Check the error log.";

pub struct ReactController {
    oracle: Arc<OracleClient>,
    knowledge: KnowledgeGateway,
    tool: Arc<dyn ScreeningTool>,
    sessions: Arc<SessionStore>,
    config: ControllerConfig,
}

impl ReactController {
    pub fn new(
        oracle: Arc<OracleClient>,
        knowledge: KnowledgeGateway,
        tool: Arc<dyn ScreeningTool>,
    ) -> Self {
        Self {
            oracle,
            knowledge,
            tool,
            sessions: Arc::new(SessionStore::new()),
            config: ControllerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Runs the decision loop for one user message.
    ///
    /// The stream always ends with [`AgentEvent::EndOfStream`]. Messages of
    /// the same session are processed one at a time; the session lock is
    /// held until the stream finishes or is dropped.
    pub fn handle_message(
        self: Arc<Self>,
        session_id: String,
        message: String,
    ) -> impl Stream<Item = AgentEvent> + Send + 'static {
        stream! {
            let mut session = self.sessions.lock(&session_id).await;
            session.push(Turn::user(message));
            yield AgentEvent::Thinking("The agent is thinking...".to_string());

            let mut turn = 0u32;
            loop {
                if turn >= self.config.max_turns {
                    warn!(target: "controller", session = %session_id, turn, "turn limit reached");
                    yield AgentEvent::TextResponse(TURN_LIMIT_MESSAGE.to_string());
                    break;
                }
                turn += 1;

                let prompt = decision_prompt(session.recent(self.config.history_window));
                let raw = match self.oracle.try_complete_text(&prompt).await {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(target: "controller", session = %session_id, ?err, "oracle call failed");
                        format!("oracle unavailable: {err}")
                    }
                };
                info!(target: "controller", session = %session_id, turn, raw_len = raw.len(), "decision received");
                session.push(Turn::agent(raw.clone()));

                let decision = match parse_decision(&raw) {
                    OracleReply::Decision(decision) => decision,
                    OracleReply::Malformed(raw) => {
                        warn!(target: "controller", session = %session_id, "decision without an action, answering with raw text");
                        metrics::record_turn("malformed");
                        yield AgentEvent::TextResponse(raw);
                        break;
                    }
                };
                metrics::record_turn(decision.action.as_str());
                if !decision.thought.trim().is_empty() {
                    yield AgentEvent::Thinking(decision.thought.clone());
                }

                match &decision.action {
                    Action::RespondToUser => {
                        yield AgentEvent::TextResponse(decision.param("text").to_string());
                        break;
                    }
                    Action::ConsultKnowledgeBase => {
                        let query = decision.param("query");
                        yield AgentEvent::Status(format!("Searching the knowledge base: {query}..."));
                        let result = self.knowledge.query(query).await;
                        session.push(Turn::tool(format!("[Tool: knowledge base result]\n{result}")));
                    }
                    Action::RunScreeningTool => {
                        let guidance = decision.param("guidance_text").to_string();
                        yield AgentEvent::Status("Starting the screening tool...".to_string());
                        info!(target: "controller", session = %session_id, guidance_len = guidance.len(), "screening tool started");

                        let (progress, rx) = progress_channel(self.config.progress_capacity);
                        let tool = Arc::clone(&self.tool);
                        let task = tokio::spawn(async move { tool.run(guidance, progress).await });
                        let mut drain = ProgressDrain::new(rx, task);
                        while let Some(message) = drain.next_message().await {
                            yield AgentEvent::Progress(message);
                        }

                        let captured = drain.final_report().map(str::to_string);
                        let returned = match drain.finish().await {
                            Ok(report) => report,
                            Err(err) => {
                                warn!(target: "controller", session = %session_id, ?err, "screening task aborted");
                                yield AgentEvent::Progress(ProgressMessage::Error(format!(
                                    "screening task aborted: {err}"
                                )));
                                None
                            }
                        };
                        let report = captured.or(returned).filter(|report| !report.trim().is_empty());
                        match report {
                            Some(report) => {
                                debug!(target: "controller", session = %session_id, chars = report.len(), "tool report saved");
                                session.push(Turn::tool(format!(
                                    "[Tool execution report]\nThe screening finished. Report:\n{report}"
                                )));
                            }
                            None => session.push(Turn::tool(NO_REPORT_PLACEHOLDER)),
                        }
                        break;
                    }
                    Action::Unknown(name) => {
                        warn!(target: "controller", session = %session_id, action = %name, "unknown action");
                        session.push(Turn::tool(format!("Error: unknown action: {name}")));
                    }
                }
            }

            yield AgentEvent::EndOfStream;
        }
    }
}
