use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("row {row}: invalid trade time '{value}'")]
    InvalidDatetime { row: usize, value: String },
    #[error("row {row}: price required for {kind} transaction")]
    MissingPrice { row: usize, kind: TransactionKind },
    #[error("row {row}: missing symbol")]
    MissingSymbol { row: usize },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Unique identifier of a transaction within one input.
///
/// Transactions read from CSV are numbered by data row, starting at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct TransactionId(pub usize);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a transaction does to the holding of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TransactionKind {
    Acquisition,
    Disposal,
    TransferIn,
    TransferOut,
    Other,
}

impl TransactionKind {
    /// Map the broker's `B/S` column to a kind. Unknown labels are `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Bought" => TransactionKind::Acquisition,
            "Sold" => TransactionKind::Disposal,
            "TransferIn" | "Transfer In" => TransactionKind::TransferIn,
            "TransferOut" | "Transfer Out" => TransactionKind::TransferOut,
            _ => TransactionKind::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Acquisition => "Bought",
            TransactionKind::Disposal => "Sold",
            TransactionKind::TransferIn => "TransferIn",
            TransactionKind::TransferOut => "TransferOut",
            TransactionKind::Other => "Other",
        }
    }

    /// Whether the kind changes the open-lot queue
    pub fn affects_lots(&self) -> bool {
        matches!(self, TransactionKind::Acquisition | TransactionKind::Disposal)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Acquisition => "Acquisition",
            TransactionKind::Disposal => "Disposal",
            TransactionKind::TransferIn => "TransferIn",
            TransactionKind::TransferOut => "TransferOut",
            TransactionKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// One historical event for one instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    pub id: TransactionId,
    #[schemars(with = "String")]
    pub timestamp: NaiveDateTime,
    pub kind: TransactionKind,
    pub instrument: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub unit_price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    /// Instrument description, e.g. "Apple Inc"
    #[serde(default)]
    pub name: Option<String>,
    /// Trade value as reported by the broker, kept for round-tripping
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub trade_value: Option<Decimal>,
}

impl Transaction {
    /// Minimal constructor for transactions built in code rather than read from a file
    pub fn new(
        id: usize,
        timestamp: NaiveDateTime,
        kind: TransactionKind,
        instrument: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Transaction {
            id: TransactionId(id),
            timestamp,
            kind,
            instrument: instrument.into(),
            quantity,
            unit_price,
            currency: currency.into(),
            platform: None,
            owner: None,
            account: None,
            name: None,
            trade_value: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_disposal(&self) -> bool {
        self.kind == TransactionKind::Disposal
    }
}

/// CSV record format of the broker export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "Platform", default)]
    pub platform: Option<String>,
    #[serde(rename = "Owner", default)]
    pub owner: Option<String>,
    #[serde(rename = "Account ID", default)]
    pub account: Option<String>,
    #[serde(rename = "Instrument", default)]
    pub instrument: Option<String>,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "TradeTime")]
    pub trade_time: String,
    #[serde(rename = "B/S")]
    pub side: String,
    #[serde(rename = "Amount", with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(rename = "Price", default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    #[serde(
        rename = "Trade Value",
        default,
        with = "rust_decimal::serde::str_option"
    )]
    pub trade_value: Option<Decimal>,
    #[serde(rename = "Currency")]
    pub currency: String,
}

impl TransactionRecord {
    /// Convert a record read from data row `row` into a transaction
    pub fn into_transaction(self, row: usize) -> Result<Transaction, TransactionError> {
        let symbol = self.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(TransactionError::MissingSymbol { row });
        }

        let timestamp =
            parse_trade_time(&self.trade_time).ok_or_else(|| TransactionError::InvalidDatetime {
                row,
                value: self.trade_time.clone(),
            })?;

        let kind = TransactionKind::from_label(&self.side);
        let unit_price = match (self.price, kind.affects_lots()) {
            (Some(price), _) => price,
            (None, false) => Decimal::ZERO,
            (None, true) => return Err(TransactionError::MissingPrice { row, kind }),
        };

        Ok(Transaction {
            id: TransactionId(row),
            timestamp,
            kind,
            instrument: symbol,
            quantity: self.amount,
            unit_price,
            currency: self.currency.trim().to_string(),
            platform: non_empty(self.platform),
            owner: non_empty(self.owner),
            account: non_empty(self.account),
            name: non_empty(self.instrument),
            trade_value: self.trade_value,
        })
    }
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        TransactionRecord {
            platform: tx.platform.clone(),
            owner: tx.owner.clone(),
            account: tx.account.clone(),
            instrument: tx.name.clone(),
            symbol: tx.instrument.clone(),
            trade_time: format_trade_time(tx.timestamp),
            side: tx.kind.label().to_string(),
            amount: tx.quantity,
            price: Some(tx.unit_price),
            trade_value: tx.trade_value,
            currency: tx.currency.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a trade time that may be date-only or datetime format
fn parse_trade_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    // Date-only values default to midnight
    ["%m/%d/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

fn format_trade_time(timestamp: NaiveDateTime) -> String {
    if timestamp.num_seconds_from_midnight() == 0 && timestamp.nanosecond() == 0 {
        timestamp.format("%Y-%m-%d").to_string()
    } else {
        timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Read transactions from a broker CSV export.
///
/// The result is sorted by timestamp; rows sharing a timestamp keep their input order.
pub fn read_transactions_csv<R: Read>(reader: R) -> Result<Vec<Transaction>, TransactionError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut transactions = Vec::new();
    for (index, record) in rdr.deserialize::<TransactionRecord>().enumerate() {
        let row = index + 1;
        transactions.push(record?.into_transaction(row)?);
    }

    transactions.sort_by_key(|t| t.timestamp);
    log::debug!("Read {} transactions", transactions.len());
    Ok(transactions)
}

/// Write transactions back out in the broker CSV format
pub fn write_transactions_csv<'a, I, W>(transactions: I, writer: W) -> Result<(), TransactionError>
where
    I: IntoIterator<Item = &'a Transaction>,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for tx in transactions {
        let record: TransactionRecord = tx.into();
        wtr.serialize(record)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Input selection applied before any ledger runs
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only keep these owners. Empty keeps everyone.
    pub owners: Vec<String>,
    /// Drop transactions settled in these currencies
    pub excluded_currencies: Vec<String>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        let owner_ok = self.owners.is_empty()
            || tx
                .owner
                .as_deref()
                .is_some_and(|owner| self.owners.iter().any(|o| o == owner));
        let currency_ok = !self
            .excluded_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&tx.currency));
        owner_ok && currency_ok
    }

    pub fn apply(&self, transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions.into_iter().filter(|tx| self.matches(tx)).collect()
    }
}

/// Split a chronological transaction list into one history per instrument.
///
/// Each history keeps the relative order of the input.
pub fn group_by_instrument(transactions: &[Transaction]) -> BTreeMap<String, Vec<Transaction>> {
    let mut histories: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    for tx in transactions {
        histories
            .entry(tx.instrument.clone())
            .or_default()
            .push(tx.clone());
    }
    histories
}
