//! Pre- and post-query hooks
//!
//! Hooks are registered under `"<object>.<operation>"` or `"*.<operation>"`
//! and run sequentially in registration order. A pre-query hook may rewrite
//! the operation arguments; a post-query hook sees the result normalized to a
//! list of records and may edit it in place. Any error aborts the pipeline.
//!
//! ```rust,ignore
//! let mut hooks = HookRegistry::new();
//! hooks.register_pre(
//!     "person.createMany",
//!     FnPreQueryHook::new("tag-source", |_auth, op| {
//!         Box::pin(async move { Ok(op) })
//!     }),
//! );
//! ```

use crate::core::auth::AuthContext;
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::record::Record;
use crate::runner::operation::{Operation, OperationName};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

#[async_trait]
pub trait PreQueryHook: Send + Sync {
    /// Name used in `HookRejected` errors and logs
    fn name(&self) -> &str;

    async fn execute(
        &self,
        auth_context: &AuthContext,
        object_name: &str,
        operation: Operation,
    ) -> anyhow::Result<Operation>;
}

#[async_trait]
pub trait PostQueryHook: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        auth_context: &AuthContext,
        object_name: &str,
        operation: OperationName,
        results: &mut Vec<Record>,
    ) -> anyhow::Result<()>;
}

type PreHookFn =
    dyn Fn(AuthContext, Operation) -> BoxFuture<'static, anyhow::Result<Operation>> + Send + Sync;

/// Pre-query hook backed by a closure
pub struct FnPreQueryHook {
    name: String,
    hook: Box<PreHookFn>,
}

impl FnPreQueryHook {
    pub fn new<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(AuthContext, Operation) -> BoxFuture<'static, anyhow::Result<Operation>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            hook: Box::new(hook),
        }
    }
}

#[async_trait]
impl PreQueryHook for FnPreQueryHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        auth_context: &AuthContext,
        _object_name: &str,
        operation: Operation,
    ) -> anyhow::Result<Operation> {
        (self.hook)(auth_context.clone(), operation).await
    }
}

type PostHookFn = dyn Fn(AuthContext, OperationName, Vec<Record>) -> BoxFuture<'static, anyhow::Result<Vec<Record>>>
    + Send
    + Sync;

/// Post-query hook backed by a closure; the closure returns the new list
pub struct FnPostQueryHook {
    name: String,
    hook: Box<PostHookFn>,
}

impl FnPostQueryHook {
    pub fn new<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(AuthContext, OperationName, Vec<Record>) -> BoxFuture<'static, anyhow::Result<Vec<Record>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            hook: Box::new(hook),
        }
    }
}

#[async_trait]
impl PostQueryHook for FnPostQueryHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        auth_context: &AuthContext,
        _object_name: &str,
        operation: OperationName,
        results: &mut Vec<Record>,
    ) -> anyhow::Result<()> {
        let current = std::mem::take(results);
        *results = (self.hook)(auth_context.clone(), operation, current).await?;
        Ok(())
    }
}

/// Hooks keyed by `"<object>.<operation>"` or `"*.<operation>"`
#[derive(Default, Clone)]
pub struct HookRegistry {
    pre: Vec<(String, Arc<dyn PreQueryHook>)>,
    post: Vec<(String, Arc<dyn PostQueryHook>)>,
}

fn key_matches(key: &str, object_name: &str, operation: OperationName) -> bool {
    match key.split_once('.') {
        Some((object, op)) => (object == "*" || object == object_name) && op == operation.as_str(),
        None => false,
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pre(&mut self, key: impl Into<String>, hook: impl PreQueryHook + 'static) {
        self.pre.push((key.into(), Arc::new(hook)));
    }

    pub fn register_post(&mut self, key: impl Into<String>, hook: impl PostQueryHook + 'static) {
        self.post.push((key.into(), Arc::new(hook)));
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    pub async fn execute_pre_query_hooks(
        &self,
        auth_context: &AuthContext,
        object_name: &str,
        mut operation: Operation,
    ) -> QueryRunnerResult<Operation> {
        let name = operation.name();
        for (key, hook) in &self.pre {
            if !key_matches(key, object_name, name) {
                continue;
            }
            tracing::debug!(hook = hook.name(), key = %key, "running pre-query hook");
            operation = hook
                .execute(auth_context, object_name, operation)
                .await
                .map_err(|e| QueryRunnerError::from_hook(hook.name(), e))?;
            if operation.name() != name {
                return Err(QueryRunnerError::HookRejected {
                    hook: hook.name().to_string(),
                    message: format!(
                        "hook changed operation from {} to {}",
                        name,
                        operation.name()
                    ),
                });
            }
        }
        Ok(operation)
    }

    pub async fn execute_post_query_hooks(
        &self,
        auth_context: &AuthContext,
        object_name: &str,
        operation: OperationName,
        results: &mut Vec<Record>,
    ) -> QueryRunnerResult<()> {
        for (key, hook) in &self.post {
            if !key_matches(key, object_name, operation) {
                continue;
            }
            tracing::debug!(hook = hook.name(), key = %key, "running post-query hook");
            hook.execute(auth_context, object_name, operation, results)
                .await
                .map_err(|e| QueryRunnerError::from_hook(hook.name(), e))?;
        }
        Ok(())
    }
}
