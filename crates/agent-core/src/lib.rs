//! Conversational core of the screening agent.
//!
//! A [`ReactController`] runs a bounded Reason-Act loop per session: each
//! turn asks the oracle for a [`Decision`], then consults the knowledge
//! base, runs the screening tool, or answers the user. Everything the
//! caller sees comes out as an [`AgentEvent`] stream.

pub mod config;
pub mod controller;
pub mod decision;
pub mod errors;
pub mod events;
pub mod knowledge;
pub mod metrics;
pub mod prompt;
pub mod session;

pub use config::ControllerConfig;
pub use controller::ReactController;
pub use decision::{parse_decision, Action, Decision};
pub use errors::AgentError;
pub use events::AgentEvent;
pub use knowledge::{KnowledgeBase, KnowledgeGateway, Passage, NO_RESULT_MESSAGE};
pub use metrics::register_metrics;
pub use session::{Session, SessionStore, Turn, TurnRole};
