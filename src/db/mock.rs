//! Mock database driver for testing.
//!
//! Provides an in-memory driver with scriptable connection outcomes and a
//! tiny table store that understands `INSERT ... VALUES`, `SELECT` over
//! stored tables (including `information_schema.columns`) and literal
//! `SELECT`s. Every other statement is accepted as a no-op command.

use super::{
    classify_command, ColumnInfo, ConnectParams, Driver, OptionSet, Row, Session,
    StatementResult, Value,
};
use crate::error::{HandlerError, Result};
use async_trait::async_trait;
use sqlparser::ast::{
    self, BinaryOperator, CreateTable, Expr, Insert, SelectItem, SetExpr, Statement,
    TableFactor, UnaryOperator,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const COLUMNS_CATALOG: &str = "information_schema.columns";

/// Outcome of one scripted connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockConnect {
    /// The attempt succeeds.
    Succeed,
    /// The server is unreachable (connectivity failure).
    Unreachable,
    /// The full option set is rejected as unsupported; a reduced attempt
    /// consumes the next scripted outcome.
    RejectFullOptions,
    /// A non-connectivity failure that must not be retried.
    Fatal,
}

#[derive(Debug, Default)]
struct MockTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct MockState {
    tables: BTreeMap<String, MockTable>,
    script: VecDeque<MockConnect>,
    connect_attempts: Vec<OptionSet>,
    executed: Vec<String>,
    commits: usize,
    closes: usize,
    fail_close: bool,
}

/// An in-memory driver whose sessions share one table store.
///
/// Clones share state, so a test can keep a handle for inspection after
/// handing the driver to a connection manager.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Creates a mock driver with no tables that always connects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with the given column names.
    pub fn with_table(self, name: &str, columns: &[&str]) -> Self {
        self.state().tables.insert(
            name.to_lowercase(),
            MockTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Scripts the outcomes of the next connection attempts, in order.
    pub fn with_connect_script(self, script: &[MockConnect]) -> Self {
        self.state().script.extend(script.iter().copied());
        self
    }

    /// Makes every session fail when closed.
    pub fn with_failing_close(self) -> Self {
        self.state().fail_close = true;
        self
    }

    /// Option sets of every connection attempt so far.
    pub fn connect_attempts(&self) -> Vec<OptionSet> {
        self.state().connect_attempts.clone()
    }

    /// SQL texts sent by every session so far.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Number of commits.
    pub fn commits(&self) -> usize {
        self.state().commits
    }

    /// Number of session closes.
    pub fn closes(&self) -> usize {
        self.state().closes
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.state()
            .tables
            .get(&table.to_lowercase())
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn connect(
        &self,
        params: &ConnectParams,
        options: OptionSet,
    ) -> Result<Box<dyn Session>> {
        let outcome = {
            let mut state = self.state();
            state.connect_attempts.push(options);
            state.script.pop_front().unwrap_or(MockConnect::Succeed)
        };

        match outcome {
            MockConnect::Succeed => Ok(Box::new(MockSession {
                state: Arc::clone(&self.state),
            })),
            MockConnect::Unreachable => Err(HandlerError::connectivity(format!(
                "could not connect to server at {}:{}",
                params.host, params.port
            ))),
            MockConnect::RejectFullOptions if options == OptionSet::Full => Err(
                HandlerError::unsupported_option("unrecognized configuration parameter"),
            ),
            MockConnect::RejectFullOptions => Ok(Box::new(MockSession {
                state: Arc::clone(&self.state),
            })),
            MockConnect::Fatal => Err(HandlerError::query("invalid connection parameters")),
        }
    }
}

/// A session against the mock table store.
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Session for MockSession {
    async fn execute(&mut self, sql: &str) -> Result<StatementResult> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.executed.push(sql.to_string());

        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| HandlerError::query(format!("ERROR: syntax error: {e}")))?;

        let mut rows_affected = 0;
        let mut last = StatementResult::command("EMPTY", 0);
        for statement in &statements {
            last = run_statement(&mut state, statement)?;
            rows_affected += last.rows_affected;
        }

        if !last.returns_rows {
            let info = classify_command(sql);
            last.status = info.status(0, rows_affected);
        }
        last.rows_affected = rows_affected;
        Ok(last)
    }

    async fn commit(&mut self) -> Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .commits += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closes += 1;
        if state.fail_close {
            return Err(HandlerError::query("server closed the connection unexpectedly"));
        }
        Ok(())
    }
}

fn run_statement(state: &mut MockState, statement: &Statement) -> Result<StatementResult> {
    match statement {
        Statement::CreateTable(create) => run_create(state, create),
        Statement::Insert(insert) => run_insert(state, insert),
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) => run_select(state, select),
            _ => Err(HandlerError::query("mock: unsupported query form")),
        },
        other => {
            let info = classify_command(&other.to_string());
            Ok(StatementResult::command(info.verb, 0))
        }
    }
}

fn run_create(state: &mut MockState, create: &CreateTable) -> Result<StatementResult> {
    let name = create.name.to_string().to_lowercase();
    if state.tables.contains_key(&name) {
        if create.if_not_exists {
            return Ok(StatementResult::command("CREATE TABLE", 0));
        }
        return Err(HandlerError::query(format!(
            "ERROR: relation \"{name}\" already exists"
        )));
    }
    state.tables.insert(
        name,
        MockTable {
            columns: create.columns.iter().map(|c| c.name.value.clone()).collect(),
            rows: Vec::new(),
        },
    );
    Ok(StatementResult::command("CREATE TABLE", 0))
}

fn run_insert(state: &mut MockState, insert: &Insert) -> Result<StatementResult> {
    let name = insert.table_name.to_string().to_lowercase();
    let table = state
        .tables
        .get_mut(&name)
        .ok_or_else(|| HandlerError::query(format!("ERROR: relation \"{name}\" does not exist")))?;

    let targets: Vec<usize> = if insert.columns.is_empty() {
        (0..table.columns.len()).collect()
    } else {
        insert
            .columns
            .iter()
            .map(|ident| {
                table
                    .columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(&ident.value))
                    .ok_or_else(|| {
                        HandlerError::query(format!(
                            "ERROR: column \"{}\" of relation \"{name}\" does not exist",
                            ident.value
                        ))
                    })
            })
            .collect::<Result<_>>()?
    };

    let values = match insert.source.as_deref().map(|q| q.body.as_ref()) {
        Some(SetExpr::Values(values)) => values,
        _ => return Err(HandlerError::query("mock: INSERT requires a VALUES list")),
    };

    let mut inserted = 0;
    for exprs in &values.rows {
        if exprs.len() != targets.len() {
            return Err(HandlerError::query(
                "ERROR: INSERT has more expressions than target columns",
            ));
        }
        let mut row = vec![Value::Null; table.columns.len()];
        for (expr, &target) in exprs.iter().zip(&targets) {
            row[target] = literal(expr)?;
        }
        table.rows.push(row);
        inserted += 1;
    }

    Ok(StatementResult::command(format!("INSERT 0 {inserted}"), inserted))
}

fn run_select(state: &MockState, select: &ast::Select) -> Result<StatementResult> {
    let Some(from) = select.from.first() else {
        return select_literals(select);
    };
    let TableFactor::Table { name, .. } = &from.relation else {
        return Err(HandlerError::query("mock: unsupported FROM clause"));
    };

    let name = name.to_string().to_lowercase();
    let (columns, rows) = if name == COLUMNS_CATALOG {
        columns_catalog(state)
    } else {
        let table = state.tables.get(&name).ok_or_else(|| {
            HandlerError::query(format!("ERROR: relation \"{name}\" does not exist"))
        })?;
        (table.columns.clone(), table.rows.clone())
    };

    let mut kept = Vec::new();
    for row in rows {
        let keep = match &select.selection {
            Some(predicate) => matches_predicate(predicate, &columns, &row)?,
            None => true,
        };
        if keep {
            kept.push(row);
        }
    }

    let mut projection: Vec<(String, usize)> = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => {
                projection.extend(columns.iter().cloned().enumerate().map(|(i, c)| (c, i)))
            }
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => {
                projection.push((ident.value.clone(), column_index(&columns, &ident.value)?))
            }
            SelectItem::ExprWithAlias {
                expr: Expr::Identifier(ident),
                alias,
            } => projection.push((alias.value.clone(), column_index(&columns, &ident.value)?)),
            _ => return Err(HandlerError::query("mock: unsupported select item")),
        }
    }

    let rows: Vec<Row> = kept
        .iter()
        .map(|row| projection.iter().map(|(_, i)| row[*i].clone()).collect())
        .collect();
    let columns = projection
        .into_iter()
        .map(|(name, _)| ColumnInfo::new(name, "TEXT"))
        .collect();

    Ok(StatementResult::with_rows(columns, rows))
}

fn select_literals(select: &ast::Select) -> Result<StatementResult> {
    let mut columns = Vec::new();
    let mut row = Vec::new();
    for item in &select.projection {
        let (name, expr) = match item {
            SelectItem::UnnamedExpr(expr) => ("?column?".to_string(), expr),
            SelectItem::ExprWithAlias { expr, alias } => (alias.value.clone(), expr),
            _ => return Err(HandlerError::query("mock: unsupported select item")),
        };
        let value = literal(expr)?;
        let data_type = match value {
            Value::Int(_) => "INT4",
            Value::Float(_) => "FLOAT8",
            Value::Bool(_) => "BOOL",
            _ => "TEXT",
        };
        columns.push(ColumnInfo::new(name, data_type));
        row.push(value);
    }
    Ok(StatementResult::with_rows(columns, vec![row]))
}

/// Synthesises `information_schema.columns` from the stored tables.
fn columns_catalog(state: &MockState) -> (Vec<String>, Vec<Row>) {
    let columns = vec![
        "table_name".to_string(),
        "column_name".to_string(),
        "ordinal_position".to_string(),
    ];
    let rows = state
        .tables
        .iter()
        .flat_map(|(table, def)| {
            def.columns.iter().enumerate().map(move |(i, column)| {
                vec![
                    Value::from(table.as_str()),
                    Value::from(column.as_str()),
                    Value::Int(i as i64 + 1),
                ]
            })
        })
        .collect();
    (columns, rows)
}

fn column_index(columns: &[String], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
        .ok_or_else(|| HandlerError::query(format!("ERROR: column \"{name}\" does not exist")))
}

fn matches_predicate(predicate: &Expr, columns: &[String], row: &Row) -> Result<bool> {
    match predicate {
        Expr::Nested(inner) => matches_predicate(inner, columns, row),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Ok(matches_predicate(left, columns, row)?
            && matches_predicate(right, columns, row)?),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => match left.as_ref() {
            Expr::Identifier(ident) => {
                let index = column_index(columns, &ident.value)?;
                Ok(row[index] == literal(right)?)
            }
            _ => Err(HandlerError::query("mock: unsupported WHERE clause")),
        },
        _ => Err(HandlerError::query("mock: unsupported WHERE clause")),
    }
}

fn literal(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Value(value) => Ok(match value {
            ast::Value::Null => Value::Null,
            ast::Value::Boolean(b) => Value::Bool(*b),
            ast::Value::Number(n, _) => match n.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => n
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| HandlerError::query(format!("mock: bad number {n}")))?,
            },
            ast::Value::SingleQuotedString(s) | ast::Value::EscapedStringLiteral(s) => {
                Value::String(s.clone())
            }
            other => Value::String(other.to_string()),
        }),
        Expr::Nested(inner) | Expr::Cast { expr: inner, .. } => literal(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            _ => Err(HandlerError::query("mock: cannot negate non-number")),
        },
        _ => Err(HandlerError::query(format!(
            "mock: unsupported expression {expr}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params() -> ConnectParams {
        ConnectParams {
            host: "localhost".to_string(),
            port: 5432,
            user: "admin".to_string(),
            password: "admin".to_string(),
            database: "admin".to_string(),
            connect_timeout: Duration::from_secs(1),
            application_name: "pg-handler".to_string(),
            sslmode: None,
        }
    }

    #[tokio::test]
    async fn test_mock_select_literal() {
        let driver = MockDriver::new();
        let mut session = driver.connect(&params(), OptionSet::Full).await.unwrap();
        let result = session.execute("SELECT 1 AS one, 'a'").await.unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(1), Value::from("a")]]);
        assert_eq!(result.columns[0].name, "one");
        assert_eq!(result.status, "SELECT 1");
    }

    #[tokio::test]
    async fn test_mock_insert_then_select() {
        let driver = MockDriver::new().with_table("notes", &["id", "comment"]);
        let mut session = driver.connect(&params(), OptionSet::Full).await.unwrap();

        let result = session
            .execute("insert into notes (comment) values ('a'), ('b')")
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.status, "INSERT 0 2");
        assert!(!result.returns_rows);

        let result = session.execute("select comment from notes").await.unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::from("a")], vec![Value::from("b")]]
        );
        assert_eq!(driver.row_count("notes"), 2);
    }

    #[tokio::test]
    async fn test_mock_columns_catalog() {
        let driver = MockDriver::new()
            .with_table("notes", &["id", "comment"])
            .with_table("other", &["x"]);
        let mut session = driver.connect(&params(), OptionSet::Full).await.unwrap();

        let result = session
            .execute("select column_name from information_schema.columns where table_name = 'notes' order by ordinal_position")
            .await
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::from("id")], vec![Value::from("comment")]]
        );
    }

    #[tokio::test]
    async fn test_mock_create_table() {
        let driver = MockDriver::new();
        let mut session = driver.connect(&params(), OptionSet::Full).await.unwrap();

        let result = session
            .execute("CREATE TABLE IF NOT EXISTS notes (id serial, comment text)")
            .await
            .unwrap();
        assert_eq!(result.status, "CREATE TABLE");

        session
            .execute("insert into notes (comment) values ('x')")
            .await
            .unwrap();
        assert_eq!(driver.row_count("notes"), 1);

        let error = session
            .execute("CREATE TABLE notes (id int)")
            .await
            .unwrap_err();
        assert!(error.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_mock_unknown_table() {
        let driver = MockDriver::new();
        let mut session = driver.connect(&params(), OptionSet::Full).await.unwrap();
        let error = session.execute("select x from missing").await.unwrap_err();
        assert!(error.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_mock_connect_script() {
        let driver = MockDriver::new().with_connect_script(&[
            MockConnect::Unreachable,
            MockConnect::RejectFullOptions,
        ]);

        let first = driver.connect(&params(), OptionSet::Full).await;
        assert!(first.err().is_some_and(|e| e.is_connectivity()));

        let second = driver.connect(&params(), OptionSet::Full).await;
        assert!(matches!(
            second.err(),
            Some(HandlerError::UnsupportedOption(_))
        ));

        assert!(driver.connect(&params(), OptionSet::Reduced).await.is_ok());
        assert_eq!(
            driver.connect_attempts(),
            vec![OptionSet::Full, OptionSet::Full, OptionSet::Reduced]
        );
    }

    #[tokio::test]
    async fn test_mock_failing_close() {
        let driver = MockDriver::new().with_failing_close();
        let session = driver.connect(&params(), OptionSet::Full).await.unwrap();
        assert!(session.close().await.is_err());
        assert_eq!(driver.closes(), 1);
    }
}
