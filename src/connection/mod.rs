//! Connection lifecycle for pg-handler.
//!
//! Opening a connection (with option fallback and reconnect policy), the
//! client-side cursor over the last result, and the operator prompts used
//! while connecting.

pub mod cursor;
pub mod manager;
pub mod prompt;
pub mod retry;

pub use cursor::{Cursor, UNKNOWN_ROW_COUNT};
pub use manager::{Connection, ConnectionManager, DEFAULT_CONNECT_TIMEOUT};
pub use prompt::{CredentialProvider, OperatorPrompt, ScriptedPrompt, TerminalPrompt};
pub use retry::{policy_for, LoopRetry, PromptRetry, RetryPolicy, DEFAULT_RETRY_INTERVAL};
