//! # Correlation Context Library
//!
//! Single source of truth for "which correlation identity owns the currently
//! executing unit of work", across the two transports Fleet services handle:
//!
//! - **HTTP**: the caller supplies the identity in a request header
//!   ([`CORRELATION_HEADER`]).
//! - **Message bus**: the consumption pipeline installs a [`ConsumeContext`]
//!   around the handler via [`with_consume_context`], and everything running
//!   underneath reads it ambiently.
//!
//! [`resolve_correlation`] arbitrates between the two sources exactly once
//! and returns a source-tagged [`CorrelationSource`], so downstream code
//! never has to ask "which transport am I on". Both sources being present at
//! the same time indicates a pipeline-wiring defect and is rejected loudly.

mod consume;
mod id;
mod resolver;

pub use consume::{current_consume_context, with_consume_context, ConsumeContext};
pub use id::{CorrelationId, InvalidCorrelationId};
pub use resolver::{resolve_correlation, CorrelationError, CorrelationSource};

/// Default header carrying the caller-supplied correlation identity.
///
/// The exact header name is deployment policy; middleware accepts an
/// override.
pub const CORRELATION_HEADER: &str = "x-correlation-id";
