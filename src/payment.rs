use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use fake::faker::currency::en::CurrencyCode;
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::status::Status;

/// One synthetic payment.
///
/// A payment is created once, then a copy is mutated and emitted per status
/// of its assigned workflow. Nothing is retained after the last emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    /// Creation (or last status-update) time, epoch milliseconds.
    pub ts: i64,
    /// Same instant as `ts`, RFC 3339, for human inspection.
    pub date_ts: String,
    pub source: String,
    pub destination: String,
    pub currency: String,
    pub amount: f64,
    pub status: Status,
}

impl Payment {
    /// Refreshes both timestamp fields to now. Called by each emission unit
    /// just before publishing, so every status update carries its own
    /// emission time.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.ts = now.timestamp_millis();
        self.date_ts = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
}

/// Produces new payments from identifier pools.
///
/// The factory holds *copies* of the bank identifiers taken at construction,
/// never references into the live bank pool, so the bank mutator can update
/// banks concurrently without any payment-side locking.
#[derive(Debug)]
pub struct PaymentFactory {
    sources: Vec<String>,
    destinations: Vec<String>,
    amount_min: f64,
    amount_max: f64,
    rng: Mutex<StdRng>,
}

impl PaymentFactory {
    /// Fails if either pool is empty or the amount range `[min, max)` is
    /// empty or inverted.
    pub fn new(
        sources: Vec<String>,
        destinations: Vec<String>,
        amount_min: f64,
        amount_max: f64,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::EmptyPool("source"));
        }
        if destinations.is_empty() {
            return Err(ConfigError::EmptyPool("destination"));
        }
        if !(amount_min < amount_max) || !amount_min.is_finite() || !amount_max.is_finite() {
            return Err(ConfigError::InvalidAmountRange {
                min: amount_min,
                max: amount_max,
            });
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            sources,
            destinations,
            amount_min,
            amount_max,
            rng: Mutex::new(rng),
        })
    }

    /// Produces a new payment: independent uniform source and destination
    /// draws (the two may legitimately be equal), a uniform amount in
    /// `[min, max)`, a random currency code, a fresh unique identifier and
    /// status `Initiated`.
    pub fn generate(&self) -> Payment {
        let (source, destination, currency, amount) = {
            let mut rng = self
                .rng
                .lock()
                .expect("should not panic while holding lock");

            let source = self.sources[rng.random_range(0..self.sources.len())].clone();
            let destination =
                self.destinations[rng.random_range(0..self.destinations.len())].clone();
            let currency: String = CurrencyCode().fake_with_rng(&mut *rng);
            let amount = rng.random_range(self.amount_min..self.amount_max);

            (source, destination, currency, amount)
        };

        let now = Utc::now();
        Payment {
            id: Uuid::new_v4().simple().to_string(),
            ts: now.timestamp_millis(),
            date_ts: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            source,
            destination,
            currency,
            amount,
            status: Status::Initiated,
        }
    }
}
