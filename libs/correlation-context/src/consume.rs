//! Ambient consume-context scope
//!
//! A messaging consumption pipeline installs one [`ConsumeContext`] per
//! consumed message around the handler invocation; everything running
//! underneath, however deep and across any `.await`, can read it without
//! explicit parameter threading.
//!
//! The scope is a tokio task-local: entering the scope installs the context
//! for exactly the wrapped future, nested scopes shadow and restore exactly,
//! and the previous value is restored on every exit path (return, error,
//! panic, cancellation) because restoration happens on scope drop.
//! Concurrently running tasks never observe each other's contexts.

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::CorrelationId;

/// Per-message execution context installed by the consumption pipeline.
#[derive(Debug, Clone)]
pub struct ConsumeContext {
    message_id: String,
    correlation_id: Option<CorrelationId>,
    received_at: DateTime<Utc>,
}

impl ConsumeContext {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            correlation_id: None,
            received_at: Utc::now(),
        }
    }

    /// Attach the correlation id carried by the message itself.
    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Correlation id carried by the message, if the producer set one.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

tokio::task_local! {
    static CONSUME_CONTEXT: ConsumeContext;
}

/// Run `fut` with `ctx` installed as the ambient consume context.
///
/// The context is visible to [`current_consume_context`] for the duration of
/// `fut`, including across suspension points and inside nested scopes (which
/// shadow it until they finish). When `fut` completes, by any path, the
/// previous context (or none) is restored.
pub async fn with_consume_context<F>(ctx: ConsumeContext, fut: F) -> F::Output
where
    F: Future,
{
    tracing::debug!(
        message_id = %ctx.message_id,
        correlation_id = ?ctx.correlation_id,
        "entering consume context scope"
    );
    CONSUME_CONTEXT.scope(ctx, fut).await
}

/// The innermost consume context of the calling task, or `None` when the
/// caller is not running under [`with_consume_context`].
///
/// Reading outside any scope is an ordinary `None`, never an error.
pub fn current_consume_context() -> Option<ConsumeContext> {
    CONSUME_CONTEXT.try_with(|ctx| ctx.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx(message_id: &str) -> ConsumeContext {
        ConsumeContext::new(message_id)
    }

    #[tokio::test]
    async fn test_no_scope_yields_none() {
        assert!(current_consume_context().is_none());
    }

    #[tokio::test]
    async fn test_scope_installs_and_restores() {
        assert!(current_consume_context().is_none());

        with_consume_context(ctx("m-1"), async {
            let current = current_consume_context().expect("context in scope");
            assert_eq!(current.message_id(), "m-1");
        })
        .await;

        assert!(current_consume_context().is_none());
    }

    #[tokio::test]
    async fn test_nested_scopes_shadow_and_restore_exactly() {
        with_consume_context(ctx("outer"), async {
            assert_eq!(current_consume_context().unwrap().message_id(), "outer");

            with_consume_context(ctx("inner"), async {
                assert_eq!(current_consume_context().unwrap().message_id(), "inner");
            })
            .await;

            // Inner scope popped, outer visible again
            assert_eq!(current_consume_context().unwrap().message_id(), "outer");
        })
        .await;

        // Both scopes popped: back to no context at all
        assert!(current_consume_context().is_none());
    }

    #[tokio::test]
    async fn test_context_survives_suspension_points() {
        with_consume_context(ctx("m-sleep"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(current_consume_context().unwrap().message_id(), "m-sleep");
        })
        .await;
    }

    #[tokio::test]
    async fn test_concurrent_tasks_are_isolated() {
        let mut handles = Vec::new();

        for i in 0..8 {
            handles.push(tokio::spawn(with_consume_context(
                ctx(&format!("m-{}", i)),
                async move {
                    // Yield repeatedly so tasks interleave on shared workers
                    for _ in 0..10 {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        let current = current_consume_context().expect("own context");
                        assert_eq!(current.message_id(), format!("m-{}", i));
                    }
                },
            )));
        }

        for handle in handles {
            handle.await.expect("task panicked");
        }
    }

    #[tokio::test]
    async fn test_scope_restores_after_inner_panic() {
        with_consume_context(ctx("outer"), async {
            let result = tokio::spawn(with_consume_context(ctx("inner"), async {
                panic!("handler blew up");
            }))
            .await;
            assert!(result.is_err());

            // The panicking task's scope never leaked into this one
            assert_eq!(current_consume_context().unwrap().message_id(), "outer");
        })
        .await;
    }
}
