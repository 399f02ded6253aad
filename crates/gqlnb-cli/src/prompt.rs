//! Variable prompts for the terminal.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use gqlnb_core::{PromptRequest, Prompter};

use crate::colors;

/// Answers from `--var` first, then from stdin if interactive.
///
/// A preset value is only offered on the first attempt; if it fails
/// validation the user is asked instead. Without a terminal the preset is
/// repeated, so an invalid value ends as a validation error.
pub struct TerminalPrompter {
    preset: HashMap<String, String>,
    interactive: bool,
    stdin: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalPrompter {
    pub fn new(preset: HashMap<String, String>, interactive: bool) -> Self {
        Self {
            preset,
            interactive,
            stdin: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self, request: &PromptRequest<'_>) -> Option<String> {
        if let Some(error) = request.error {
            eprintln!("{}  ✗ {}{}", colors::RED, error, colors::RESET);
        }
        eprint!(
            "{}  ? {}{} {}[{}]{}: ",
            colors::YELLOW,
            request.placeholder(),
            colors::RESET,
            colors::DIM,
            request.operation,
            colors::RESET
        );
        colors::flush_stdout();

        let mut stdin = self.stdin.lock().await;
        // EOF dismisses the prompt.
        stdin.next_line().await.ok().flatten()
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt(&self, request: &PromptRequest<'_>) -> Option<String> {
        let preset = self.preset.get(&request.variable.name);

        match preset {
            Some(value) if request.attempt == 1 || !self.interactive => Some(value.clone()),
            _ if self.interactive => self.read_line(request).await,
            _ => None,
        }
    }
}

/// Parse `name=value` pairs from `--var`.
pub fn parse_vars(vars: &[String]) -> anyhow::Result<HashMap<String, String>> {
    vars.iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("invalid --var '{}': expected name=value", pair))?;
            let name = name.trim().trim_start_matches('$');
            if name.is_empty() {
                anyhow::bail!("invalid --var '{}': empty variable name", pair);
            }
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["id=42".to_string(), "$name=a=b".to_string()]).unwrap();
        assert_eq!(vars.get("id").map(String::as_str), Some("42"));
        assert_eq!(vars.get("name").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_parse_vars_rejects_missing_value() {
        assert!(parse_vars(&["id".to_string()]).is_err());
        assert!(parse_vars(&["=1".to_string()]).is_err());
    }
}
