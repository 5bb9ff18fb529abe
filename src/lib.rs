//! pg-handler - PostgreSQL connection and query handling.
//!
//! Connects with option fallback and an interactive or looping reconnect
//! policy, stages and executes queries (optionally expanding bulk parameter
//! rows), and fetches results incrementally as lists or maps.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod debug;
pub mod error;
pub mod handler;
pub mod logging;
pub mod query;

pub use connection::{Connection, ConnectionManager};
pub use error::{HandlerError, Result};
pub use handler::PgHandler;
pub use query::{BoostType, ExecuteOptions, FetchedRow, ReturnType};
