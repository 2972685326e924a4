use std::fmt::{self, Display};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bank::Bank;
use crate::error::SinkError;
use crate::payment::Payment;

/// The two kinds of events the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PaymentStatusUpdate,
    BankUpdate,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::PaymentStatusUpdate => "payment-status-update",
            EventKind::BankUpdate => "bank-update",
        })
    }
}

/// One event to be serialized and transported by an [`EventSink`].
///
/// The payload is a concrete record, not an untyped value: sinks decide how
/// to encode it, the engine decides what it is.
#[derive(Debug, Clone)]
pub enum Event {
    PaymentStatus(Payment),
    BankUpdate(Bank),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PaymentStatus(_) => EventKind::PaymentStatusUpdate,
            Event::BankUpdate(_) => EventKind::BankUpdate,
        }
    }

    /// The record key: the payment id or the bank id.
    pub fn key(&self) -> &str {
        match self {
            Event::PaymentStatus(payment) => &payment.id,
            Event::BankUpdate(bank) => &bank.id,
        }
    }

    /// The channel this event is published to: `payment-<status>` for
    /// status updates, `banks` for bank updates.
    pub fn channel(&self) -> String {
        match self {
            Event::PaymentStatus(payment) => payment.status.channel(),
            Event::BankUpdate(_) => BANK_CHANNEL.to_string(),
        }
    }

    /// The payload encoded as JSON, for sinks without a schema registry.
    pub fn payload_json(&self) -> Result<String, SinkError> {
        let result = match self {
            Event::PaymentStatus(payment) => serde_json::to_string(payment),
            Event::BankUpdate(bank) => serde_json::to_string(bank),
        };
        result.map_err(|e| SinkError::Serialize {
            channel: self.channel(),
            reason: e.to_string(),
        })
    }
}

/// Channel all bank updates are published to.
pub const BANK_CHANNEL: &str = "banks";

/// External boundary that serializes and transports events.
///
/// Implementations must be safe for unbounded concurrent callers; every
/// status-emission task and the bank mutator publish through one shared
/// instance.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: Event) -> Result<(), SinkError>;

    /// Flush any outstanding events. Called once after the run drains.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A named channel with its provisioning parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub partitions: i32,
    pub replication: i16,
}

/// External boundary that declaratively creates named channels.
/// Consumed once at startup, before any generation.
#[async_trait]
pub trait ChannelProvisioner: Send + Sync {
    async fn ensure_channel(&self, spec: &ChannelSpec) -> Result<(), SinkError>;
}

/// An [`EventSink`] that encodes payloads as JSON and emits them through
/// `tracing`, so the engine can run end-to-end without a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, event: Event) -> Result<(), SinkError> {
        let payload = event.payload_json()?;
        debug!(
            kind = %event.kind(),
            channel = %event.channel(),
            key = %event.key(),
            %payload,
            "publish"
        );
        Ok(())
    }
}

/// A [`ChannelProvisioner`] that only records what would be created.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProvisioner;

#[async_trait]
impl ChannelProvisioner for LogProvisioner {
    async fn ensure_channel(&self, spec: &ChannelSpec) -> Result<(), SinkError> {
        info!(
            channel = %spec.name,
            partitions = spec.partitions,
            replication = spec.replication,
            "ensuring channel"
        );
        Ok(())
    }
}
