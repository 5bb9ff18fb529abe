//! Command tag derivation.
//!
//! Uses sqlparser-rs with the PostgreSQL dialect to work out, for the last
//! statement of a SQL text, which command tag the server reports and whether
//! a result set comes back. Sessions that talk the simple query protocol do
//! not surface either, so the cursor relies on this.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Keywords whose statements produce a result set.
const ROW_RETURNING_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "TABLE", "SHOW", "EXPLAIN", "FETCH",
];

/// What the last statement of a SQL text does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// Command verb as reported in the status tag (e.g. `INSERT`, `CREATE TABLE`).
    pub verb: String,
    /// Whether the statement returns a result set.
    pub returns_rows: bool,
}

impl CommandInfo {
    fn new(verb: impl Into<String>, returns_rows: bool) -> Self {
        Self {
            verb: verb.into(),
            returns_rows,
        }
    }

    /// Builds the PostgreSQL-style status tag.
    pub fn status(&self, row_count: usize, rows_affected: u64) -> String {
        match self.verb.as_str() {
            "SELECT" | "EXPLAIN" | "SHOW" => format!("SELECT {row_count}"),
            "INSERT" => format!("INSERT 0 {rows_affected}"),
            "UPDATE" | "DELETE" | "MERGE" | "COPY" | "FETCH" | "MOVE" => {
                format!("{} {}", self.verb, rows_affected)
            }
            _ => self.verb.clone(),
        }
    }
}

/// Classifies the last statement in `sql`.
///
/// If the SQL cannot be parsed, the leading keyword of the last statement
/// decides.
pub fn classify_command(sql: &str) -> CommandInfo {
    match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => match statements.last() {
            Some(statement) => classify_statement(statement),
            None => CommandInfo::new("EMPTY", false),
        },
        Err(_) => classify_by_keyword(sql),
    }
}

fn classify_statement(statement: &Statement) -> CommandInfo {
    match statement {
        Statement::Query(_) => CommandInfo::new("SELECT", true),
        Statement::Explain { .. } | Statement::ExplainTable { .. } => {
            CommandInfo::new("EXPLAIN", true)
        }
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => CommandInfo::new("SHOW", true),

        Statement::Insert(insert) => CommandInfo::new("INSERT", insert.returning.is_some()),
        Statement::Update { returning, .. } => CommandInfo::new("UPDATE", returning.is_some()),
        Statement::Delete(delete) => CommandInfo::new("DELETE", delete.returning.is_some()),
        Statement::Merge { .. } => CommandInfo::new("MERGE", false),

        Statement::CreateTable { .. } => CommandInfo::new("CREATE TABLE", false),
        Statement::CreateIndex { .. } => CommandInfo::new("CREATE INDEX", false),
        Statement::CreateView { .. } => CommandInfo::new("CREATE VIEW", false),
        Statement::CreateSchema { .. } => CommandInfo::new("CREATE SCHEMA", false),
        Statement::CreateDatabase { .. } => CommandInfo::new("CREATE DATABASE", false),
        Statement::AlterTable { .. } => CommandInfo::new("ALTER TABLE", false),
        Statement::Drop { object_type, .. } => {
            CommandInfo::new(format!("DROP {object_type}"), false)
        }
        Statement::Truncate { .. } => CommandInfo::new("TRUNCATE TABLE", false),
        Statement::Grant { .. } => CommandInfo::new("GRANT", false),
        Statement::Revoke { .. } => CommandInfo::new("REVOKE", false),
        Statement::StartTransaction { .. } => CommandInfo::new("BEGIN", false),
        Statement::Commit { .. } => CommandInfo::new("COMMIT", false),
        Statement::Rollback { .. } => CommandInfo::new("ROLLBACK", false),

        other => classify_by_keyword(&other.to_string()),
    }
}

fn classify_by_keyword(sql: &str) -> CommandInfo {
    let last = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or("");

    let keyword = last
        .split_whitespace()
        .next()
        .map(|w| w.trim_start_matches('(').to_uppercase())
        .unwrap_or_else(|| "EMPTY".to_string());

    let returns_rows = ROW_RETURNING_KEYWORDS.contains(&keyword.as_str())
        || last.to_uppercase().contains(" RETURNING ");

    let verb = if keyword == "WITH" || keyword == "VALUES" || keyword == "TABLE" {
        "SELECT".to_string()
    } else {
        keyword
    };

    CommandInfo::new(verb, returns_rows)
}
