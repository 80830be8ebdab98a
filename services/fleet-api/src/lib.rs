//! Fleet API service
//!
//! Demo service wiring the idempotency core end to end: a toy in-memory
//! "cars" resource behind the HTTP idempotency layer, plus a command
//! consumer feeding the same tracked store from the message path.

pub mod cars;
pub mod config;
pub mod consumer;
pub mod routes;
