//! Variable resolution: turning declared variables into typed values.
//!
//! Variables are prompted for strictly in declaration order. Each raw answer
//! is validated against the declared type and cast; a failure is shown inline
//! on the next prompt for the same variable. When the attempts run out the
//! whole operation is abandoned with a `ValidationError`. Invalid input is
//! never replaced by a default or `null`.

mod coerce;
mod prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result, ValidationError};
use crate::execute::CancelToken;
use crate::extract::VariableDefinition;

pub use coerce::{coerce_input, coerce_text};
pub use prompt::{PromptRequest, Prompter, ScriptedPrompter, StaticPrompter};

/// Default number of prompts per variable before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Typed values for every variable an operation declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedVariables(Map<String, Value>);

impl ResolvedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Variables as a JSON object, for the request body.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Resolves an operation's declared variables through a `Prompter`.
#[derive(Clone)]
pub struct VariableResolver {
    prompter: Arc<dyn Prompter>,
    max_attempts: u32,
}

impl VariableResolver {
    /// Create a resolver asking `prompter` for values.
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            prompter,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set how many times a variable is prompted for before giving up.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Resolve every definition, in order.
    ///
    /// Returns `Error::Validation` for the first variable that cannot be
    /// validated and `Error::Cancelled` if `cancel` fires while waiting on
    /// the user.
    pub async fn resolve(
        &self,
        operation: &str,
        defs: &[VariableDefinition],
        cancel: &CancelToken,
    ) -> Result<ResolvedVariables> {
        let mut resolved = ResolvedVariables::new();

        for def in defs {
            let value = self.resolve_one(operation, def, cancel).await?;
            resolved.insert(def.name.clone(), value);
        }

        Ok(resolved)
    }

    async fn resolve_one(
        &self,
        operation: &str,
        def: &VariableDefinition,
        cancel: &CancelToken,
    ) -> Result<Value> {
        let mut last_error: Option<ValidationError> = None;

        for attempt in 1..=self.max_attempts {
            let request = PromptRequest {
                variable: def,
                operation,
                attempt,
                error: last_error.as_ref().map(|e| e.message.as_str()),
            };

            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                answer = self.prompter.prompt(&request) => answer,
            };

            let Some(raw) = answer else {
                // Dismissed: absent input, no further prompts.
                return coerce_input(None, def).map_err(Error::Validation);
            };

            match coerce_input(Some(&raw), def) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(variable = %def.name, attempt, "rejected input: {}", e.message);
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Validation(last_error.unwrap_or_else(|| ValidationError {
            variable: def.name.clone(),
            type_name: def.type_ref.to_string(),
            message: "no value provided".to_string(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TypeRef;
    use serde_json::json;

    fn def(name: &str, ty: TypeRef) -> VariableDefinition {
        VariableDefinition {
            name: name.to_string(),
            type_ref: ty,
            default_value: None,
        }
    }

    fn non_null(name: &str) -> TypeRef {
        TypeRef::NonNull(Box::new(TypeRef::Named(name.to_string())))
    }

    #[tokio::test]
    async fn test_no_definitions_resolves_empty_without_prompting() {
        let prompter = Arc::new(ScriptedPrompter::new(Vec::<Option<String>>::new()));
        let resolver = VariableResolver::new(prompter.clone());

        let resolved = resolver.resolve("query", &[], &CancelToken::new()).await.unwrap();

        assert!(resolved.is_empty());
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_prompts_in_declaration_order() {
        let prompter = Arc::new(ScriptedPrompter::new([Some("5"), Some("true"), Some("abc")]));
        let resolver = VariableResolver::new(prompter.clone());
        let defs = vec![
            def("limit", non_null("Int")),
            def("active", TypeRef::Named("Boolean".to_string())),
            def("id", non_null("ID")),
        ];

        let resolved = resolver.resolve("query", &defs, &CancelToken::new()).await.unwrap();

        assert_eq!(prompter.asked(), vec!["limit", "active", "id"]);
        assert_eq!(resolved.to_json(), json!({"limit": 5, "active": true, "id": "abc"}));
    }

    #[tokio::test]
    async fn test_reprompts_after_invalid_input() {
        let prompter = Arc::new(ScriptedPrompter::new([Some("five"), Some("5")]));
        let resolver = VariableResolver::new(prompter.clone());
        let defs = vec![def("limit", non_null("Int"))];

        let resolved = resolver.resolve("query", &defs, &CancelToken::new()).await.unwrap();

        assert_eq!(prompter.asked(), vec!["limit", "limit"]);
        assert_eq!(resolved.get("limit"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_empty_non_null_fails_after_attempts() {
        let prompter = Arc::new(ScriptedPrompter::new([Some(""), Some(""), Some("")]));
        let resolver = VariableResolver::new(prompter.clone()).with_max_attempts(3);
        let defs = vec![def("id", non_null("ID"))];

        let err = resolver.resolve("query", &defs, &CancelToken::new()).await.unwrap_err();

        match err {
            Error::Validation(e) => assert_eq!(e.variable, "id"),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(prompter.asked().len(), 3);
    }

    #[tokio::test]
    async fn test_dismissed_prompt_for_nullable_is_null() {
        let prompter = Arc::new(ScriptedPrompter::new([None::<String>]));
        let resolver = VariableResolver::new(prompter);
        let defs = vec![def("after", TypeRef::Named("String".to_string()))];

        let resolved = resolver.resolve("query", &defs, &CancelToken::new()).await.unwrap();
        assert_eq!(resolved.get("after"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_cancelled_prompt_is_not_a_validation_error() {
        struct Never;

        #[async_trait::async_trait]
        impl Prompter for Never {
            async fn prompt(&self, _: &PromptRequest<'_>) -> Option<String> {
                std::future::pending().await
            }
        }

        let cancel = CancelToken::new();
        let resolver = VariableResolver::new(Arc::new(Never));
        let defs = vec![def("id", non_null("ID"))];

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = resolver.resolve("query", &defs, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
