use std::fmt::{self, Display};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;
use crate::status::Status;

/// An ordered sequence of statuses representing one plausible payment
/// lifecycle path, e.g. `Initiated,Validated,Accounted,Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    statuses: Vec<Status>,
}

impl Workflow {
    /// Parses a comma-separated status sequence. Every token must be a known
    /// status name; an unrecognized or empty token fails construction.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        if spec.trim().is_empty() {
            return Err(ConfigError::EmptyWorkflow(spec.to_string()));
        }

        let statuses = spec
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Status>, _>>()?;

        Ok(Self { statuses })
    }

    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    /// Number of statuses in this workflow, which is also the width of the
    /// per-payment emission fan-out.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Canonical comma-joined form. This is both the per-workflow statistics
    /// key and the format used in the configuration weight table.
    pub fn signature(&self) -> String {
        self.statuses
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<Vec<Status>> for Workflow {
    fn from(statuses: Vec<Status>) -> Self {
        Self { statuses }
    }
}

impl Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Picks workflows according to their configured relative weights.
///
/// The cumulative-weight table is built once at construction; each
/// [`pick`](WorkflowSelector::pick) draws a uniform value in
/// `[0, total_weight)` and binary-searches for the first entry whose
/// cumulative weight exceeds the draw. Safe to call from any number of
/// concurrent workers; the only shared mutable state is the RNG.
#[derive(Debug)]
pub struct WorkflowSelector {
    workflows: Vec<Workflow>,
    cumulative: Vec<u64>,
    total_weight: u64,
    rng: Mutex<StdRng>,
}

impl WorkflowSelector {
    /// Builds a selector from a `(specification, weight)` table.
    ///
    /// Fails if the table is empty, any specification contains an unknown
    /// status token, or the total weight is zero. Zero-weight entries are
    /// permitted but never selected.
    pub fn new<S: AsRef<str>>(
        table: &[(S, u32)],
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::NoWorkflows);
        }

        let mut workflows = Vec::with_capacity(table.len());
        let mut cumulative = Vec::with_capacity(table.len());
        let mut total_weight = 0u64;

        for (spec, weight) in table {
            workflows.push(Workflow::parse(spec.as_ref())?);
            total_weight += u64::from(*weight);
            cumulative.push(total_weight);
        }

        if total_weight == 0 {
            return Err(ConfigError::ZeroTotalWeight);
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            workflows,
            cumulative,
            total_weight,
            rng: Mutex::new(rng),
        })
    }

    /// Picks one workflow according to the configured weights.
    pub fn pick(&self) -> Workflow {
        let draw = self
            .rng
            .lock()
            .expect("should not panic while holding lock")
            .random_range(0..self.total_weight);

        let index = self.cumulative.partition_point(|&c| c <= draw);
        self.workflows[index].clone()
    }
}
