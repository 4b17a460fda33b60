//! Run one ledger per instrument.
//!
//! Instruments share nothing, so each history is replayed on its own rayon task.
//! A failing instrument is reported alongside the others instead of aborting the batch.

use super::ledger::{compute_fifo_gains, DisposalMatch, DisposalScope, LedgerError};
use super::summary::{summarize, SummaryRow};
use super::transaction::Transaction;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Outcome of replaying one instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    Matched {
        instrument: String,
        records: Vec<DisposalMatch>,
    },
    Failed {
        instrument: String,
        error: LedgerError,
    },
}

impl InstrumentOutcome {
    pub fn instrument(&self) -> &str {
        match self {
            InstrumentOutcome::Matched { instrument, .. }
            | InstrumentOutcome::Failed { instrument, .. } => instrument,
        }
    }
}

/// Per-instrument outcomes, ordered by instrument
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<InstrumentOutcome>,
}

impl BatchReport {
    /// Records of every successful instrument; chronological within an instrument
    pub fn records(&self) -> impl Iterator<Item = &DisposalMatch> {
        self.outcomes.iter().flat_map(|outcome| match outcome {
            InstrumentOutcome::Matched { records, .. } => records.as_slice(),
            InstrumentOutcome::Failed { .. } => &[][..],
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &LedgerError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            InstrumentOutcome::Failed { instrument, error } => Some((instrument.as_str(), error)),
            InstrumentOutcome::Matched { .. } => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn summary(&self) -> Vec<SummaryRow> {
        summarize(self.records())
    }
}

/// Replay every history against the same scope
pub fn compute_batch(
    histories: &BTreeMap<String, Vec<Transaction>>,
    scope: &DisposalScope,
) -> BatchReport {
    let outcomes = histories
        .par_iter()
        .map(|(instrument, history)| match compute_fifo_gains(history, scope) {
            Ok(records) => {
                log::debug!("{}: {} disposal record(s)", instrument, records.len());
                InstrumentOutcome::Matched {
                    instrument: instrument.clone(),
                    records,
                }
            }
            Err(error) => {
                log::error!("{}: {}", instrument, error);
                InstrumentOutcome::Failed {
                    instrument: instrument.clone(),
                    error,
                }
            }
        })
        .collect();

    BatchReport { outcomes }
}
