use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One discrete stage of a payment lifecycle.
///
/// The set is closed and known at startup; workflow specifications are
/// validated against it when the selector is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Initiated,
    Validated,
    Accounted,
    Completed,
    Failed,
    Canceled,
    Rejected,
}

impl Status {
    /// Every status, in lifecycle order. Used to pre-seed the statistics
    /// aggregator and to enumerate the per-status channels.
    pub const ALL: [Status; 7] = [
        Status::Initiated,
        Status::Validated,
        Status::Accounted,
        Status::Completed,
        Status::Failed,
        Status::Canceled,
        Status::Rejected,
    ];

    /// Canonical capitalized name.
    pub fn name(self) -> &'static str {
        match self {
            Status::Initiated => "Initiated",
            Status::Validated => "Validated",
            Status::Accounted => "Accounted",
            Status::Completed => "Completed",
            Status::Failed => "Failed",
            Status::Canceled => "Canceled",
            Status::Rejected => "Rejected",
        }
    }

    /// Lowercase name, used as the key into the per-status delay table.
    pub fn delay_key(self) -> &'static str {
        match self {
            Status::Initiated => "initiated",
            Status::Validated => "validated",
            Status::Accounted => "accounted",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Canceled => "canceled",
            Status::Rejected => "rejected",
        }
    }

    /// Name of the channel that status updates for this status are
    /// published to.
    pub fn channel(self) -> String {
        format!("payment-{}", self.delay_key())
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Status {
    type Err = ConfigError;

    /// Parses a status token. Surrounding whitespace is ignored and matching
    /// is case-insensitive; an unrecognized token is a configuration error,
    /// never silently dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initiated" => Ok(Status::Initiated),
            "validated" => Ok(Status::Validated),
            "accounted" => Ok(Status::Accounted),
            "completed" => Ok(Status::Completed),
            "failed" => Ok(Status::Failed),
            "canceled" => Ok(Status::Canceled),
            "rejected" => Ok(Status::Rejected),
            _ => Err(ConfigError::UnknownStatus(s.trim().to_string())),
        }
    }
}
