//! Schema command - print expected input and output formats

use super::gains::GainsOutput;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: csv-header, csv-fields or json-schema
    #[arg(value_enum, default_value = "csv-fields")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// CSV header row of the transaction input
    CsvHeader,
    /// CSV column descriptions of the transaction input
    CsvFields,
    /// JSON Schema of `gains --json` output
    JsonSchema,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::CsvHeader => self.print_csv_header(),
            SchemaFormat::CsvFields => self.print_csv_fields(),
            SchemaFormat::JsonSchema => self.print_json_schema(),
        }
    }

    fn print_json_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(GainsOutput);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_csv_header(&self) -> anyhow::Result<()> {
        let columns: Vec<_> = CSV_FIELD_DESCRIPTIONS.iter().map(|(name, ..)| *name).collect();
        println!("{}", columns.join(","));
        Ok(())
    }

    fn print_csv_fields(&self) -> anyhow::Result<()> {
        println!("CSV Input Format");
        println!("================");
        println!();
        for (name, required, description) in CSV_FIELD_DESCRIPTIONS {
            let req = if *required { "required" } else { "optional" };
            println!("{:12} ({:8})  {}", name, req, description);
        }
        println!();
        println!("B/S values: Bought, Sold, TransferIn, TransferOut; anything else is ignored");
        Ok(())
    }
}

const CSV_FIELD_DESCRIPTIONS: &[(&str, bool, &str)] = &[
    ("Platform", false, "Broker or platform name"),
    ("Owner", false, "Account owner, used by --owner"),
    ("Account ID", false, "Broker account identifier"),
    ("Instrument", false, "Instrument description"),
    ("Symbol", true, "Ticker symbol; one FIFO ledger per symbol"),
    (
        "TradeTime",
        true,
        "Trade date (MM/DD/YYYY or YYYY-MM-DD, optionally with time)",
    ),
    ("B/S", true, "Bought, Sold, TransferIn or TransferOut"),
    ("Amount", true, "Number of units, must be positive for trades"),
    ("Price", false, "Unit price (required for Bought and Sold)"),
    ("Trade Value", false, "Trade value as reported by the broker"),
    ("Currency", true, "Settlement currency code"),
];
