//! Correlation source resolution
//!
//! One authority answers "what is the correlation identity of the currently
//! executing unit of work", whichever transport initiated it. Centralizing
//! the arbitration here keeps the idempotency gate and all logging code
//! transport-agnostic; the returned identity is tagged with its source so no
//! downstream code ever re-asks which transport is active.

use thiserror::Error;

use crate::consume::current_consume_context;
use crate::CorrelationId;

/// Correlation identity tagged with the transport that supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    /// Parsed from the inbound HTTP header.
    Http(CorrelationId),
    /// Read from the ambient consume context of a bus message.
    Message(CorrelationId),
}

impl CorrelationSource {
    pub fn id(&self) -> CorrelationId {
        match self {
            Self::Http(id) | Self::Message(id) => *id,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }
}

/// Failures of correlation resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// Both an HTTP header value and a consume context are present. Cannot
    /// happen under correct pipeline composition; treat as fatal to the
    /// request, not as caller input.
    #[error("ambiguous correlation context: both an HTTP header and a consume context are present")]
    AmbiguousContext,

    /// A consume context is installed but the message carried no correlation
    /// id. The message content itself is defective; dead-lettering is the
    /// messaging collaborator's policy.
    #[error("consumed message carries no correlation id")]
    MissingInMessage,
}

/// Resolve the correlation identity of the current unit of work.
///
/// `http_header` is the raw value of the correlation header when the caller
/// is an HTTP pipeline stage, `None` on the consume path.
///
/// Returns `Ok(None)` when no identity is present (no header and no consume
/// context) or when the header value fails to parse; both are caller
/// errors, answered at the gate boundary, never resolver faults.
pub fn resolve_correlation(
    http_header: Option<&str>,
) -> Result<Option<CorrelationSource>, CorrelationError> {
    match (http_header, current_consume_context()) {
        (Some(_), Some(ctx)) => {
            tracing::error!(
                message_id = %ctx.message_id(),
                "correlation resolution found both an HTTP header and a consume context"
            );
            Err(CorrelationError::AmbiguousContext)
        }
        (None, Some(ctx)) => match ctx.correlation_id() {
            Some(id) => Ok(Some(CorrelationSource::Message(id))),
            None => {
                tracing::warn!(
                    message_id = %ctx.message_id(),
                    "consumed message has no correlation id"
                );
                Err(CorrelationError::MissingInMessage)
            }
        },
        (Some(raw), None) => match CorrelationId::parse(raw) {
            Ok(id) => Ok(Some(CorrelationSource::Http(id))),
            Err(_) => {
                tracing::debug!(value = %raw, "unparseable correlation header treated as absent");
                Ok(None)
            }
        },
        (None, None) => Ok(None),
    }
}
