//! Oracle client: one text-completion call per decision, wrapped in retry,
//! exponential backoff and credential rotation, plus JSON extraction and
//! repair for the free-form replies.

pub mod backend;
pub mod client;
pub mod credentials;
pub mod errors;
pub mod gemini;
pub mod metrics;
pub mod openai;
pub mod repair;
pub mod retry;

pub use backend::OracleBackend;
pub use client::{OracleClient, OracleReply};
pub use credentials::{CredentialFile, CredentialPool};
pub use errors::{BackendError, OracleError};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use openai::{OpenAiCompatibleBackend, OpenAiCompatibleConfig};
pub use repair::{extract_json, extract_json_value, RepairError};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
