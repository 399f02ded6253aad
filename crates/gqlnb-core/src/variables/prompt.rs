//! Interactive input for variable values.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::extract::VariableDefinition;

/// One request for a variable value.
#[derive(Debug, Clone)]
pub struct PromptRequest<'a> {
    /// Variable being asked for.
    pub variable: &'a VariableDefinition,
    /// Label of the operation declaring it.
    pub operation: &'a str,
    /// 1-based attempt number for this variable.
    pub attempt: u32,
    /// Validation message from the previous attempt, shown inline.
    pub error: Option<&'a str>,
}

impl PromptRequest<'_> {
    /// Placeholder text for an input box.
    pub fn placeholder(&self) -> String {
        format!(
            "Please enter the value for {} ({})",
            self.variable.name, self.variable.type_ref
        )
    }
}

/// Source of raw variable values.
///
/// Implementations suspend until the user answers. Returning `None` means the
/// prompt was dismissed without an answer.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, request: &PromptRequest<'_>) -> Option<String>;
}

/// Prompter answering from a fixed map; unknown variables are dismissed.
///
/// Used for non-interactive runs (`--var name=value`) and tests.
#[derive(Debug, Default)]
pub struct StaticPrompter {
    answers: HashMap<String, String>,
}

impl StaticPrompter {
    pub fn new(answers: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    pub fn answer(&self, name: &str) -> Option<&str> {
        self.answers.get(name).map(String::as_str)
    }
}

#[async_trait]
impl Prompter for StaticPrompter {
    async fn prompt(&self, request: &PromptRequest<'_>) -> Option<String> {
        self.answers.get(&request.variable.name).cloned()
    }
}

/// Prompter replaying a queue of answers, one per prompt, and recording
/// every request it received.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<std::collections::VecDeque<Option<String>>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| a.map(Into::into)).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Names of the variables prompted for, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt(&self, request: &PromptRequest<'_>) -> Option<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(request.variable.name.clone());
        }
        self.answers.lock().ok().and_then(|mut a| a.pop_front()).flatten()
    }
}
