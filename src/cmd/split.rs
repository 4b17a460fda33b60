//! Split command - per-period transaction files for review

use super::{InputArgs, PeriodArgs};
use anyhow::Context;
use clap::Args;
use fifo_gains::core::{
    group_by_instrument, write_transactions_csv, FinancialYear, ReportingPeriod, Transaction,
};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Maximum length of a generated file stem
const MAX_STEM_LEN: usize = 31;

#[derive(Args, Debug)]
pub struct SplitCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    period: PeriodArgs,

    /// Output directory. Defaults to the period label (e.g. FY24-25); without a
    /// period, one FYxx-yy directory per financial year is created under it.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SplitCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.load()?;

        if let Some(period) = self.period.resolve()? {
            let out_dir = self
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(sanitize_file_stem(&period.label())));
            return write_period(&out_dir, &period, &transactions);
        }

        let root = self.output.clone().unwrap_or_else(|| PathBuf::from("."));
        let years = FinancialYear::covering_disposals(&transactions);
        if years.is_empty() {
            log::warn!("No disposals found, nothing written");
        }
        for fy in years {
            let period = ReportingPeriod::try_from(fy)?;
            write_period(&root.join(fy.label()), &period, &transactions)?;
        }
        Ok(())
    }
}

/// Transactions file with the period's disposals plus one full history per symbol sold
fn write_period(
    out_dir: &Path,
    period: &ReportingPeriod,
    transactions: &[Transaction],
) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let disposals = period.disposals(transactions);
    write_file(&out_dir.join("Transactions.csv"), disposals.iter().copied())?;

    let symbols = period.instruments_disposed(transactions);
    let histories = group_by_instrument(transactions);
    let mut used = HashSet::from(["Transactions".to_string()]);

    for symbol in &symbols {
        let Some(history) = histories.get(symbol) else {
            continue;
        };
        let stem = unique_stem(sanitize_file_stem(symbol), &mut used);
        write_file(&out_dir.join(format!("{}.csv", stem)), history)?;
    }

    println!(
        "Wrote {}: Transactions file ({} disposals) + {} symbol files.",
        out_dir.display(),
        disposals.len(),
        symbols.len()
    );
    Ok(())
}

fn write_file<'a, I>(path: &Path, transactions: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_transactions_csv(transactions, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// Replace characters that are unsafe in file and sheet names, and cap the length
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ':' | '\\' | '/' | '?' | '*' | '[' | ']' => '_',
            c => c,
        })
        .take(MAX_STEM_LEN)
        .collect()
}

/// Suffix a stem until it does not collide with one already written.
/// The stem is shortened so the suffixed result stays within `MAX_STEM_LEN`.
fn unique_stem(stem: String, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        let suffix = format!("-{}", n);
        let base: String = stem
            .chars()
            .take(MAX_STEM_LEN.saturating_sub(suffix.len()))
            .collect();
        candidate = format!("{}{}", base, suffix);
        n += 1;
    }
    candidate
}
