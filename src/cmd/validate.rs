//! Validate command - surface data quality issues without generating full reports

use super::{format_quantity, period_label, scope_for, InputArgs, PeriodArgs};
use clap::Args;
use fifo_gains::core::{compute_batch, group_by_instrument, BatchReport};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    period: PeriodArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: String,
    symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<String>,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    period: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let transactions = self.input.load()?;
        let period = self.period.resolve()?;
        let scope = scope_for(period.as_ref(), &transactions);

        // Replay every instrument so broken histories show up even without in-scope disposals
        let report = compute_batch(&group_by_instrument(&transactions), &scope);
        let issues = collect_issues(&report);
        let label = period_label(period.as_ref());

        if self.json {
            let output = ValidationOutput {
                period: label,
                issue_count: issues.len(),
                issues,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            if output.issue_count > 0 {
                std::process::exit(1);
            }
            return Ok(());
        }

        print_text(&issues, &label);

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn collect_issues(report: &BatchReport) -> Vec<ValidationIssue> {
    let ledger_errors = report.failures().map(|(symbol, error)| ValidationIssue {
        issue_type: "LedgerError".to_string(),
        symbol: symbol.to_string(),
        date: None,
        quantity: None,
        message: error.to_string(),
    });

    let warnings = report.records().flat_map(|d| {
        d.warnings.iter().map(move |w| ValidationIssue {
            issue_type: w.kind().to_string(),
            symbol: d.instrument.clone(),
            date: Some(d.timestamp.format("%Y-%m-%d").to_string()),
            quantity: Some(format_quantity(d.quantity)),
            message: format!(
                "{} (cost basis {:.2} {})",
                w, d.cost_basis, d.currency
            ),
        })
    });

    ledger_errors.chain(warnings).collect()
}

fn print_text(issues: &[ValidationIssue], label: &str) {
    println!();
    println!("VALIDATION RESULTS ({})", label);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", issues.len());
    println!();
    for (i, issue) in issues.iter().enumerate() {
        match (&issue.date, &issue.quantity) {
            (Some(date), Some(quantity)) => println!(
                "  {}. [{}] {} disposal of {} {}: {}",
                i + 1,
                issue.issue_type,
                date,
                quantity,
                issue.symbol,
                issue.message
            ),
            _ => println!(
                "  {}. [{}] {}: {}",
                i + 1,
                issue.issue_type,
                issue.symbol,
                issue.message
            ),
        }
    }
}
