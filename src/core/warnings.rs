use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data-completeness warnings attached to disposal records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// The open lots could not cover the disposal.
    /// When `available = 0`, no cost basis was found at all.
    InsufficientInventory {
        #[schemars(with = "f64")]
        available: Decimal,
        #[schemars(with = "f64")]
        required: Decimal,
    },
}

impl Warning {
    /// Quantity of the disposal left without a matching acquisition
    pub fn unmatched_quantity(&self) -> Decimal {
        match self {
            Warning::InsufficientInventory {
                available,
                required,
            } => *required - *available,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Warning::InsufficientInventory { available, .. } if available.is_zero() => {
                "NoInventory"
            }
            Warning::InsufficientInventory { .. } => "InsufficientInventory",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InsufficientInventory {
                available,
                required,
            } if available.is_zero() => write!(
                f,
                "no open lots to match {} units, cost basis is zero",
                required.normalize()
            ),
            Warning::InsufficientInventory {
                available,
                required,
            } => write!(
                f,
                "only {} of {} units matched open lots, {} unmatched",
                available.normalize(),
                required.normalize(),
                (*required - *available).normalize()
            ),
        }
    }
}
