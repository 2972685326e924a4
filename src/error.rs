use std::time::Duration;

use thiserror::Error;

/// A configuration problem detected at construction time, before any
/// generation starts.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A workflow specification contained a token which is not a known
    /// status name.
    #[error("unrecognized status '{0}' in workflow specification")]
    UnknownStatus(String),

    /// A workflow specification parsed to an empty status sequence.
    #[error("workflow specification '{0}' contains no statuses")]
    EmptyWorkflow(String),

    /// The workflow weight table is empty.
    #[error("no workflows configured")]
    NoWorkflows,

    /// Every configured workflow has weight zero, so no selection is
    /// possible.
    #[error("total workflow weight must be greater than zero")]
    ZeroTotalWeight,

    /// A bank pool was configured with size zero, making random selection
    /// undefined.
    #[error("the {0} pool must not be empty")]
    EmptyPool(&'static str),

    /// The configured amount range is empty or inverted.
    #[error("amount range [{min}, {max}) is invalid")]
    InvalidAmountRange { min: f64, max: f64 },

    /// The worker pool was configured with no workers.
    #[error("worker count must be greater than zero")]
    NoWorkers,
}

/// A failure at the event sink or channel provisioner boundary.
///
/// The engine never drops one of these silently: a publish failure is either
/// fatal to the run or counted and reported, depending on the configured
/// failure policy.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum SinkError {
    /// The payload could not be serialized for transport.
    #[error("failed to serialize event for channel '{channel}': {reason}")]
    Serialize { channel: String, reason: String },

    /// Publishing to the named channel failed.
    #[error("failed to publish to channel '{channel}': {reason}")]
    Publish { channel: String, reason: String },

    /// Channel provisioning at startup failed.
    #[error("failed to ensure channel '{channel}': {reason}")]
    Provision { channel: String, reason: String },

    /// Flushing outstanding events failed.
    #[error("failed to flush event sink: {0}")]
    Flush(String),
}

/// An error terminating a generation run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RunError {
    /// Invalid configuration, surfaced before any generation starts.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A sink failure outside the per-status emission path: channel
    /// provisioning, the bank mutator, or the final flush.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// One or more status emissions failed and the failure policy is
    /// to abort. The run still drained fully before reporting this.
    #[error("{failed} status emission(s) failed; first error: {first}")]
    EmissionsFailed { failed: u64, first: SinkError },

    /// The run did not drain within the configured timeout.
    #[error("run did not drain within {0:?}")]
    DrainTimeout(Duration),
}
