//! Boosted bulk execution.
//!
//! Expands a statement template holding a single `%s` placeholder with a
//! sequence of parameter rows, rendering every value as a SQL literal.

use std::fmt;
use std::str::FromStr;

use crate::db::Value;
use crate::error::{HandlerError, Result};

/// Parameter rows (or statements, in batch mode) sent per round trip.
pub const PAGE_SIZE: usize = 100;

/// Execution strategy for a staged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoostType {
    /// Send the staged text as is.
    #[default]
    Normal,
    /// One single-row statement per parameter row, pages of statements per
    /// round trip.
    Batch,
    /// One multi-row `VALUES` expansion per page of parameter rows.
    Values,
}

impl BoostType {
    /// Returns the mode name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Batch => "BATCH",
            Self::Values => "VALUES",
        }
    }
}

impl fmt::Display for BoostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoostType {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "batch" => Ok(Self::Batch),
            "values" => Ok(Self::Values),
            _ => Err(HandlerError::invalid_argument(format!(
                "boost type '{s}' is not a BoostType. Expected: normal, batch, or values"
            ))),
        }
    }
}

/// A template split around its placeholder.
#[derive(Debug, PartialEq, Eq)]
struct Template {
    head: String,
    tail: String,
}

/// Expands `template` into the SQL texts to send, one per round trip.
///
/// Fails with `HandlerError::BoostMode` if the template does not hold
/// exactly one `%s` placeholder, and with `HandlerError::InvalidArgument`
/// if there are no parameter rows.
pub fn expand(template: &str, boost: BoostType, params: &[Vec<Value>]) -> Result<Vec<String>> {
    if boost == BoostType::Normal {
        return Ok(vec![template.to_string()]);
    }

    let template = split_template(template, boost)?;
    if params.is_empty() {
        return Err(HandlerError::invalid_argument(format!(
            "BoostType {boost} needs at least one parameter row"
        )));
    }

    let pages = params
        .chunks(PAGE_SIZE)
        .map(|page| match boost {
            BoostType::Values => {
                let tuples: Vec<String> = page.iter().map(|row| render_row(row)).collect();
                format!("{}{}{}", template.head, tuples.join(","), template.tail)
            }
            _ => page
                .iter()
                .map(|row| format!("{}{}{}", template.head, render_row(row), template.tail))
                .collect::<Vec<_>>()
                .join(";"),
        })
        .collect();

    Ok(pages)
}

/// Splits the template on its single `%s`, unescaping `%%`.
fn split_template(template: &str, boost: BoostType) -> Result<Template> {
    let mut head = String::new();
    let mut tail = String::new();
    let mut found = false;
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        let out = if found { &mut tail } else { &mut head };
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') if !found => found = true,
            Some('s') => {
                return Err(HandlerError::boost_mode(
                    boost,
                    "the query contains more than one '%s' placeholder",
                ))
            }
            Some(other) => {
                return Err(HandlerError::boost_mode(
                    boost,
                    format!("the query contains an unsupported format sequence '%{other}'"),
                ))
            }
            None => {
                return Err(HandlerError::boost_mode(
                    boost,
                    "the query ends with an incomplete format sequence",
                ))
            }
        }
    }

    if !found {
        return Err(HandlerError::boost_mode(
            boost,
            "the query doesn't contain any '%s' placeholder",
        ));
    }

    Ok(Template { head, tail })
}

fn render_row(row: &[Value]) -> String {
    let literals: Vec<String> = row.iter().map(quote_literal).collect();
    format!("({})", literals.join(","))
}

/// Renders a value as a PostgreSQL literal.
pub fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_nan() => "'NaN'::float8".to_string(),
        Value::Float(f) if f.is_infinite() && *f > 0.0 => "'Infinity'::float8".to_string(),
        Value::Float(f) if f.is_infinite() => "'-Infinity'::float8".to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::String(s) => quote_string(s),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("'\\x{hex}'::bytea")
        }
    }
}

fn quote_string(s: &str) -> String {
    let escaped = s.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}
