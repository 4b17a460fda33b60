//! FIFO cost-basis matching for equity disposals.
//!
//! The [`core`] module holds the lot ledger and the data-supply types around it.
//! Everything that touches files or the terminal lives in the `fifo-gains` binary.

pub mod core;
