mod cmd;

use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "fifo-gains", version, author)]
#[command(about = "Calculate realized gains on equity disposals using FIFO cost basis")]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// FIFO gains for disposals in a reporting period
    Gains(cmd::gains::GainsCommand),
    /// Write the period's disposals and full symbol histories to CSV files
    Split(cmd::split::SplitCommand),
    /// Report data quality issues such as missing acquisitions
    Validate(cmd::validate::ValidateCommand),
    /// Print the expected input or output format
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Gains(gains) => gains.exec(),
        Command::Split(split) => split.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    } else {
        builder.filter_level(LevelFilter::Warn);
    }
    builder.init();
}
