//! Operator interaction used while connecting.
//!
//! Passwords and reconnect answers come from injected providers so the
//! connection state machine can run without a terminal.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::error::{HandlerError, Result};

/// Supplies a password when none is configured.
pub trait CredentialProvider: Send + Sync {
    /// Returns the password for `user`.
    fn password(&self, user: &str) -> Result<String>;
}

impl<F> CredentialProvider for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn password(&self, user: &str) -> Result<String> {
        self(user)
    }
}

/// Asks the operator questions during connection recovery.
pub trait OperatorPrompt: Send + Sync {
    /// Shows `question` and returns the answer line without its newline.
    fn ask(&self, question: &str) -> Result<String>;

    /// Shows an informational message.
    fn notice(&self, message: &str);
}

/// Prompts on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl CredentialProvider for TerminalPrompt {
    fn password(&self, user: &str) -> Result<String> {
        read_masked(&format!("{user}'s password is:"))
            .map_err(|e| HandlerError::prompt(format!("Failed to read password: {e}")))
    }
}

impl OperatorPrompt for TerminalPrompt {
    fn ask(&self, question: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{question}")
            .and_then(|_| stdout.flush())
            .map_err(|e| HandlerError::prompt(format!("Failed to write prompt: {e}")))?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| HandlerError::prompt(format!("Failed to read answer: {e}")))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn notice(&self, message: &str) {
        println!("{message}");
    }
}

/// Reads a line without echoing it.
fn read_masked(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    terminal::enable_raw_mode()?;
    let result = read_until_enter();
    terminal::disable_raw_mode()?;
    writeln!(stderr)?;
    result
}

fn read_until_enter() -> io::Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "password entry cancelled",
                ))
            }
            KeyCode::Char(c) => secret.push(c),
            _ => {}
        }
    }
}

/// Answers questions from a fixed script; runs dry as an error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: Arc<Mutex<VecDeque<String>>>,
    transcript: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompt {
    /// Creates a prompt that gives `answers` in order.
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Arc::new(Mutex::new(
                answers.iter().map(|a| a.to_string()).collect(),
            )),
            transcript: Arc::default(),
        }
    }

    /// Every question and notice shown so far.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, line: &str) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn ask(&self, question: &str) -> Result<String> {
        self.record(question);
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| HandlerError::prompt("no scripted answer left"))
    }

    fn notice(&self, message: &str) {
        self.record(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_credential_provider() {
        let provider = |user: &str| -> Result<String> { Ok(format!("{user}-secret")) };
        assert_eq!(provider.password("admin").unwrap(), "admin-secret");
    }

    #[test]
    fn test_scripted_prompt_runs_dry() {
        let prompt = ScriptedPrompt::new(&["y"]);
        assert_eq!(prompt.ask("again?").unwrap(), "y");
        assert!(matches!(prompt.ask("again?"), Err(HandlerError::Prompt(_))));
        assert_eq!(prompt.transcript(), vec!["again?", "again?"]);
    }
}
