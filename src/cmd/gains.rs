//! Gains command - FIFO gains for disposals in a reporting period

use super::{format_amount, format_quantity, period_label, scope_for, InputArgs, PeriodArgs};
use clap::Args;
use fifo_gains::core::{
    compute_batch, group_by_instrument, BatchReport, DisposalMatch, InstrumentOutcome, SummaryRow,
    Transaction,
};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct GainsCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    period: PeriodArgs,

    /// Only report this symbol (e.g., AAPL)
    #[arg(short, long)]
    symbol: Option<String>,

    /// Show the acquisition lots matched by each disposal
    #[arg(long)]
    detailed: bool,

    /// Output disposal records as CSV instead of formatted tables
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted tables
    #[arg(long)]
    json: bool,
}

impl GainsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.load()?;
        let period = self.period.resolve()?;
        let scope = scope_for(period.as_ref(), &transactions);

        let instruments = scope.instruments(&transactions);
        let histories: BTreeMap<String, Vec<Transaction>> = group_by_instrument(&transactions)
            .into_iter()
            .filter(|(instrument, _)| instruments.contains(instrument))
            .filter(|(instrument, _)| {
                self.symbol
                    .as_deref()
                    .map_or(true, |s| instrument.eq_ignore_ascii_case(s))
            })
            .collect();
        log::info!(
            "{} in-scope disposal(s) across {} instrument(s)",
            scope.len(),
            histories.len()
        );

        let report = compute_batch(&histories, &scope);
        let label = period_label(period.as_ref());

        if self.json {
            self.print_json(&report, label)?;
        } else if self.csv {
            self.write_csv(&report)?;
        } else {
            self.print_tables(&report, &label);
        }

        let failed: Vec<_> = report.failures().collect();
        for (instrument, error) in &failed {
            eprintln!("{}: {}", instrument, error);
        }
        if !failed.is_empty() {
            anyhow::bail!("{} instrument(s) could not be processed", failed.len());
        }
        Ok(())
    }

    fn print_tables(&self, report: &BatchReport, label: &str) {
        println!();
        println!("FIFO GAINS ({})", label);

        let mut any = false;
        for outcome in &report.outcomes {
            let InstrumentOutcome::Matched {
                instrument,
                records,
            } = outcome
            else {
                continue;
            };
            if records.is_empty() {
                continue;
            }
            any = true;

            println!();
            println!("=== {} ===", instrument);
            let rows: Vec<DisposalRow> = records.iter().map(DisposalRow::from).collect();
            println!("{}", styled(Table::new(rows)));

            if self.detailed {
                let slices: Vec<SliceRow> = records.iter().flat_map(slice_rows).collect();
                if !slices.is_empty() {
                    println!("{}", styled(Table::new(slices)));
                }
            }
        }

        if !any {
            println!();
            println!("No disposals found");
            return;
        }

        let summary: Vec<SummaryTableRow> =
            report.summary().iter().map(SummaryTableRow::from).collect();
        println!();
        println!("=== Summary ===");
        println!("{}", styled(Table::new(summary)));
    }

    fn print_json(&self, report: &BatchReport, period: String) -> anyhow::Result<()> {
        let output = GainsOutput {
            period,
            records: report.records().cloned().collect(),
            summary: report.summary(),
            failures: report
                .failures()
                .map(|(instrument, error)| FailureView {
                    instrument: instrument.to_string(),
                    error: error.to_string(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn write_csv(&self, report: &BatchReport) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        for record in report.records() {
            wtr.serialize(DisposalCsvRecord::from(record))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

/// JSON output of the gains command
#[derive(Debug, Serialize, JsonSchema)]
pub struct GainsOutput {
    pub period: String,
    pub records: Vec<DisposalMatch>,
    pub summary: Vec<SummaryRow>,
    pub failures: Vec<FailureView>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FailureView {
    pub instrument: String,
    pub error: String,
}

/// CSV record for disposal output
#[derive(Debug, Serialize)]
struct DisposalCsvRecord {
    id: usize,
    date: String,
    symbol: String,
    quantity: String,
    price: String,
    proceeds: String,
    cost: String,
    gain: String,
    currency: String,
    matched_quantity: String,
    warning: String,
}

impl From<&DisposalMatch> for DisposalCsvRecord {
    fn from(d: &DisposalMatch) -> Self {
        DisposalCsvRecord {
            id: d.id.0,
            date: d.timestamp.format("%Y-%m-%d").to_string(),
            symbol: d.instrument.clone(),
            quantity: format_quantity(d.quantity),
            price: d.unit_price.normalize().to_string(),
            proceeds: format_amount(d.proceeds),
            cost: format_amount(d.cost_basis),
            gain: format_amount(d.gain),
            currency: d.currency.clone(),
            matched_quantity: format_quantity(d.matched_quantity),
            warning: warning_note(d),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct DisposalRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Gain/Loss")]
    gain: String,
    #[tabled(rename = "Currency")]
    currency: String,
    #[tabled(rename = "Note")]
    note: String,
}

impl From<&DisposalMatch> for DisposalRow {
    fn from(d: &DisposalMatch) -> Self {
        DisposalRow {
            date: d.timestamp.format("%Y-%m-%d").to_string(),
            quantity: format_quantity(d.quantity),
            price: d.unit_price.normalize().to_string(),
            proceeds: format_amount(d.proceeds),
            cost: format_amount(d.cost_basis),
            gain: format_amount(d.gain),
            currency: d.currency.clone(),
            note: warning_note(d),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct SliceRow {
    #[tabled(rename = "Disposal")]
    disposal: String,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Unit Cost")]
    unit_cost: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

fn slice_rows(d: &DisposalMatch) -> Vec<SliceRow> {
    d.slices
        .iter()
        .map(|s| SliceRow {
            disposal: d.timestamp.format("%Y-%m-%d").to_string(),
            acquired: s.acquired_at.format("%Y-%m-%d").to_string(),
            quantity: format_quantity(s.quantity),
            unit_cost: s.unit_cost.normalize().to_string(),
            cost: format_amount(s.cost()),
        })
        .collect()
}

#[derive(Debug, Clone, Tabled)]
struct SummaryTableRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Currency")]
    currency: String,
    #[tabled(rename = "Disposals")]
    disposals: usize,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Gain/Loss")]
    gain: String,
}

impl From<&SummaryRow> for SummaryTableRow {
    fn from(row: &SummaryRow) -> Self {
        SummaryTableRow {
            symbol: row.instrument.clone(),
            currency: row.currency.clone(),
            disposals: row.disposals,
            proceeds: format_amount(row.proceeds),
            cost: format_amount(row.cost_basis),
            gain: format_amount(row.gain),
        }
    }
}

fn warning_note(d: &DisposalMatch) -> String {
    d.warnings
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
