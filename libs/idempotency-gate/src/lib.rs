//! # Idempotency Gate Library
//!
//! The pipeline stage wrapping resource-mutating operations. For every
//! guarded call the gate resolves the correlation identity, finds or creates
//! the tracked record, and then either:
//!
//! - rejects the call (missing identity, conflicting key reuse, duplicate
//!   still in flight),
//! - short-circuits it (exact completed duplicate → stored result replayed
//!   verbatim), or
//! - lets it proceed and records the outcome for future replay.
//!
//! Two frontends share that decision sequence:
//!
//! - [`IdempotencyLayer`]: a tower layer for axum routers, guarding
//!   mutating HTTP methods;
//! - [`ConsumeGate`]: the same sequence for message consumption, run inside
//!   a consume-context scope so the resolver sees the message's identity.
//!
//! The gate holds no state between invocations; all side effects live in the
//! tracked request store. When the store is unreachable the gate fails
//! closed; proceeding without a tracked record would forfeit the
//! at-most-once guarantee. Deadlines are the caller's policy (mount a
//! timeout layer outside the gate); a unit of work cancelled mid-flight
//! leaves at worst a `Pending` record that retention purge reclaims.

mod consume;
mod layer;
mod response;

pub use consume::{ConsumeError, ConsumeGate, ConsumeOutcome};
pub use layer::{GatePolicy, IdempotencyLayer, IdempotencyService};
pub use response::REPLAY_HEADER;
