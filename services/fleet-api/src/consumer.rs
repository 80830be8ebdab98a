//! Command consumption path
//!
//! Entry point the messaging collaborator calls once per consumed message.
//! The transport (Kafka, SQS, ...) is external to this service; whatever
//! delivers the payload, each envelope passes through the consume gate so a
//! redelivered command settles against the tracked store instead of
//! re-executing.

use anyhow::{Context, Result};
use correlation_context::{ConsumeContext, CorrelationId};
use idempotency_gate::{ConsumeGate, ConsumeOutcome};
use request_tracker::{RecordedResponse, RequestFingerprint, StoredHeaders};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cars::{CarRepository, CreateCar};

/// Wire envelope for car commands.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandEnvelope {
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub command: CarCommand,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CarCommand {
    RegisterCar {
        make: String,
        model: String,
        year: i32,
    },
    RetireCar {
        id: Uuid,
    },
}

impl CarCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::RegisterCar { .. } => "register_car",
            Self::RetireCar { .. } => "retire_car",
        }
    }
}

pub struct CarCommandConsumer {
    gate: ConsumeGate,
    cars: Arc<CarRepository>,
}

impl CarCommandConsumer {
    pub fn new(gate: ConsumeGate, cars: Arc<CarRepository>) -> Self {
        Self { gate, cars }
    }

    /// Process one consumed message payload.
    ///
    /// A malformed payload or a message without a parseable correlation id is
    /// the collaborator's dead-letter case; a [`ConsumeOutcome`] means the
    /// delivery was settled against the tracked store.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<ConsumeOutcome> {
        let envelope: CommandEnvelope =
            serde_json::from_slice(payload).context("malformed command envelope")?;

        let mut ctx = ConsumeContext::new(&envelope.message_id);
        match envelope.correlation_id.as_deref().map(CorrelationId::parse) {
            Some(Ok(id)) => ctx = ctx.with_correlation(id),
            Some(Err(_)) => {
                warn!(message_id = %envelope.message_id, "message carries an unparseable correlation id");
            }
            None => {}
        }

        let fingerprint = RequestFingerprint::new(
            "CONSUME",
            format!("/commands/{}", envelope.command.name()),
            "",
        );

        let cars = self.cars.clone();
        let command = envelope.command.clone();
        let outcome = self
            .gate
            .process(ctx, fingerprint, || async move { apply(&cars, command) })
            .await?;

        match &outcome {
            ConsumeOutcome::Executed(record) => {
                info!(key = %record.key, command = envelope.command.name(), "command executed");
            }
            ConsumeOutcome::Replayed(record) => {
                info!(key = %record.key, "duplicate command delivery, result already recorded");
            }
            ConsumeOutcome::InFlight => {
                info!(message_id = %envelope.message_id, "command still in flight, redeliver later");
            }
            ConsumeOutcome::Rejected(record) => {
                warn!(key = %record.key, "correlation id reused by a conflicting command");
            }
        }

        Ok(outcome)
    }
}

fn apply(cars: &CarRepository, command: CarCommand) -> Result<RecordedResponse> {
    match command {
        CarCommand::RegisterCar { make, model, year } => {
            let car = cars.insert(CreateCar { make, model, year });
            Ok(RecordedResponse {
                status: 201,
                headers: StoredHeaders::new(),
                body: Some(serde_json::to_string(&car)?),
            })
        }
        CarCommand::RetireCar { id } => {
            let status = if cars.remove(id) { 204 } else { 404 };
            Ok(RecordedResponse {
                status,
                headers: StoredHeaders::new(),
                body: None,
            })
        }
    }
}
