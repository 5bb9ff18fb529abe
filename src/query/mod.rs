//! Query staging, boosted execution and result shaping.

pub mod boost;
pub mod executor;
pub mod shape;

pub use boost::{quote_literal, BoostType, PAGE_SIZE};
pub use executor::{ExecuteOptions, Query, QueryExecutor};
pub use shape::{FetchedRow, ReturnType, RowMap};
