pub mod batch;
pub mod ledger;
pub mod period;
pub mod summary;
pub mod transaction;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use batch::{compute_batch, BatchReport, InstrumentOutcome};
pub use ledger::{
    compute_fifo_gains, Consumption, DisposalMatch, DisposalScope, LedgerError, Lot, LotLedger,
    LotSlice,
};
pub use period::{FinancialYear, PeriodError, ReportingPeriod};
pub use summary::{summarize, SummaryRow};
pub use transaction::{
    group_by_instrument, read_transactions_csv, write_transactions_csv, Transaction,
    TransactionError, TransactionFilter, TransactionId, TransactionKind, TransactionRecord,
};
pub use warnings::Warning;
