//! Activity handlers and their registry.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::RunId;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ActivityError;
use crate::operation::RemoteOperation;

/// Information about the attempt an activity is executing.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    pub run_id: RunId,
    pub activity_type: String,
    pub task_queue: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Executes one activity type on encoded arguments.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn execute(&self, ctx: ActivityContext, args: Value) -> Result<Value, ActivityError>;
}

struct FnActivity<I, O, F> {
    f: F,
    _schema: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<I, O, F, Fut> ActivityHandler for FnActivity<I, O, F>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(ActivityContext, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ActivityError>> + Send + 'static,
{
    async fn execute(&self, ctx: ActivityContext, args: Value) -> Result<Value, ActivityError> {
        let input: I = serde_json::from_value(args)?;
        let output = (self.f)(ctx, input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Activity handlers served by one worker, keyed by activity type.
#[derive(Clone, Default)]
pub struct ActivityRegistry {
    handlers: HashMap<String, Arc<dyn ActivityHandler>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed closure for an operation.
    ///
    /// Arguments are decoded into the operation's input type before the
    /// closure runs; decoding failures are not retried.
    pub fn register<I, O, F, Fut>(&mut self, operation: RemoteOperation<I, O>, f: F) -> &mut Self
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(ActivityContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ActivityError>> + Send + 'static,
    {
        let handler = FnActivity {
            f,
            _schema: PhantomData,
        };
        self.register_handler(operation.name(), Arc::new(handler))
    }

    /// Registers an untyped handler.
    pub fn register_handler(
        &mut self,
        activity_type: impl Into<String>,
        handler: Arc<dyn ActivityHandler>,
    ) -> &mut Self {
        self.handlers.insert(activity_type.into(), handler);
        self
    }

    pub fn get(&self, activity_type: &str) -> Option<Arc<dyn ActivityHandler>> {
        self.handlers.get(activity_type).cloned()
    }

    pub fn contains(&self, activity_type: &str) -> bool {
        self.handlers.contains_key(activity_type)
    }

    /// Returns the registered activity types, sorted.
    pub fn activity_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activity_types", &self.activity_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOUT: RemoteOperation<(String,), String> = RemoteOperation::new("shout");

    fn ctx() -> ActivityContext {
        ActivityContext {
            run_id: RunId::new(),
            activity_type: "shout".to_string(),
            task_queue: "q".to_string(),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn typed_handler_round_trips_json() {
        let mut registry = ActivityRegistry::new();
        registry.register(SHOUT, |_ctx, (word,): (String,)| async move {
            Ok(word.to_uppercase())
        });

        let handler = registry.get("shout").unwrap();
        let result = handler
            .execute(ctx(), serde_json::json!(["hello"]))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!("HELLO"));
    }

    #[tokio::test]
    async fn malformed_args_are_payload_errors() {
        let mut registry = ActivityRegistry::new();
        registry.register(SHOUT, |_ctx, (word,): (String,)| async move { Ok(word) });

        let err = registry
            .get("shout")
            .unwrap()
            .execute(ctx(), serde_json::json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::Payload(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn lists_activity_types() {
        let mut registry = ActivityRegistry::new();
        assert!(registry.is_empty());
        registry.register(SHOUT, |_ctx, (w,): (String,)| async move { Ok(w) });
        registry.register(
            RemoteOperation::<(String,), String>::new("echo"),
            |_ctx, (w,): (String,)| async move { Ok(w) },
        );
        assert_eq!(registry.activity_types(), vec!["echo", "shout"]);
        assert!(registry.contains("echo"));
        assert_eq!(registry.len(), 2);
    }
}
