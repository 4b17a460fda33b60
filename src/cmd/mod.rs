pub mod gains;
pub mod schema;
pub mod split;
pub mod validate;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use fifo_gains::core::{
    read_transactions_csv, DisposalScope, FinancialYear, ReportingPeriod, Transaction,
    TransactionFilter,
};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Where transactions come from and which of them to keep
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Broker transaction CSV export ("-" for stdin)
    #[arg(short, long)]
    transactions: PathBuf,

    /// Only include these owners (e.g., --owner DC AC)
    #[arg(long, num_args = 1..)]
    owner: Vec<String>,

    /// Drop transactions settled in these currencies
    #[arg(long, num_args = 1.., default_value = "INR")]
    exclude_currency: Vec<String>,
}

impl InputArgs {
    /// Read, filter and sort the transactions
    pub fn load(&self) -> anyhow::Result<Vec<Transaction>> {
        let transactions = read_transactions(&self.transactions)?;
        let total = transactions.len();
        let filter = TransactionFilter {
            owners: self.owner.clone(),
            excluded_currencies: self.exclude_currency.clone(),
        };
        let transactions = filter.apply(transactions);
        log::info!(
            "Loaded {} of {} transactions from {}",
            transactions.len(),
            total,
            self.transactions.display()
        );
        Ok(transactions)
    }
}

/// Reporting period selection
#[derive(Args, Debug)]
pub struct PeriodArgs {
    /// Financial year to report (e.g., FY24-25)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    fy: Option<FinancialYear>,

    /// First day of a custom period (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last day of a custom period (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
}

impl PeriodArgs {
    /// `None` when no period was given, meaning every disposal is in scope
    pub fn resolve(&self) -> anyhow::Result<Option<ReportingPeriod>> {
        match (self.fy, self.from, self.to) {
            (Some(fy), _, _) => Ok(Some(ReportingPeriod::try_from(fy)?)),
            (None, Some(from), Some(to)) => Ok(Some(ReportingPeriod::new(from, to)?)),
            _ => Ok(None),
        }
    }
}

/// Disposals to report for an optional period
pub fn scope_for(period: Option<&ReportingPeriod>, transactions: &[Transaction]) -> DisposalScope {
    match period {
        Some(period) => period.disposal_scope(transactions),
        None => DisposalScope::all_disposals(transactions),
    }
}

pub fn period_label(period: Option<&ReportingPeriod>) -> String {
    period.map_or("All Periods".to_string(), |p| p.label())
}

/// Read transactions from a CSV file (or stdin with "-")
fn read_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        Ok(read_transactions_csv(buffer.as_slice())?)
    } else {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        read_transactions_csv(BufReader::new(file))
            .with_context(|| format!("failed to read {}", path.display()))
    }
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
