//! Closure-backed tools.
//!
//! Both synchronous and asynchronous callables are adapted onto the single
//! async [`Tool`] contract at registration time, so the tool loop never has to
//! branch on what kind of callable it is holding.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::tool::{Tool, ToolOutput};

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<ToolOutput>> + Send + Sync>;

/// A tool backed by a closure.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl FnTool {
    /// Wrap a synchronous function. An `Err` string becomes
    /// [`ToolError::Execution`].
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |input| {
            let outcome = f(input)
                .map(ToolOutput::success)
                .map_err(ToolError::Execution);
            Box::pin(async move { outcome })
        });
        Self::with_handler(name, description, handler)
    }

    /// Wrap an asynchronous function.
    pub fn from_async<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
    {
        let f = Arc::new(f);
        let handler: Handler = Arc::new(move |input| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                f(input)
                    .await
                    .map(ToolOutput::success)
                    .map_err(ToolError::Execution)
            })
        });
        Self::with_handler(name, description, handler)
    }

    fn with_handler(name: impl Into<String>, description: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
            handler,
        }
    }

    /// Attach a JSON Schema describing the input arguments.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        (self.handler)(input).await
    }
}
