use super::ledger::DisposalScope;
use super::transaction::Transaction;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("invalid financial year '{0}', expected e.g. FY24-25 or 2025")]
    InvalidFinancialYear(String),
    #[error("period start {start} is after end {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },
    #[error("financial year {0} is outside the supported date range")]
    OutOfRange(FinancialYear),
}

/// Financial year running 1 April to 31 March.
/// The value is the end year (e.g., 2025 = FY24-25).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FinancialYear(pub i32);

impl FinancialYear {
    /// Financial year containing `date`
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year();
        // 1 April or later belongs to the year ending next March
        if date.month() >= 4 {
            FinancialYear(year + 1)
        } else {
            FinancialYear(year)
        }
    }

    /// 1 April of the previous calendar year, `None` outside chrono's range
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0.checked_sub(1)?, 4, 1)
    }

    /// 31 March
    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 3, 31)
    }

    /// Every financial year from the earliest to the latest disposal, inclusive
    pub fn covering_disposals(transactions: &[Transaction]) -> Vec<FinancialYear> {
        let years = transactions
            .iter()
            .filter(|tx| tx.is_disposal())
            .map(|tx| FinancialYear::from_date(tx.date()));
        let (Some(first), Some(last)) = (years.clone().min(), years.max()) else {
            return Vec::new();
        };
        (first.0..=last.0).map(FinancialYear).collect()
    }

    /// Display as "FY24-25"
    pub fn label(&self) -> String {
        format!(
            "FY{:02}-{:02}",
            (self.0 - 1).rem_euclid(100),
            self.0.rem_euclid(100)
        )
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for FinancialYear {
    type Err = PeriodError;

    /// Accepts "FY24-25", "24-25", "2024-25" or the end year "2025"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidFinancialYear(s.to_string());
        let trimmed = s.trim();
        let prefixed = trimmed.strip_prefix("FY").or_else(|| trimmed.strip_prefix("fy"));
        let body = prefixed.unwrap_or(trimmed);

        let is_digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());

        let year = match body.split_once('-') {
            None if prefixed.is_none() && body.len() == 4 && is_digits(body) => {
                body.parse().map_err(|_| invalid())?
            }
            None => return Err(invalid()),
            Some((start, end)) => {
                if !is_digits(start) || end.len() != 2 || !is_digits(end) {
                    return Err(invalid());
                }
                let end_short: i32 = end.parse().map_err(|_| invalid())?;
                let start_year: i32 = match start.len() {
                    4 => start.parse().map_err(|_| invalid())?,
                    2 => 2000 + start.parse::<i32>().map_err(|_| invalid())?,
                    _ => return Err(invalid()),
                };
                let year = start_year + 1;
                if year.rem_euclid(100) != end_short {
                    return Err(invalid());
                }
                year
            }
        };

        if !(1000..=9999).contains(&year) {
            return Err(invalid());
        }
        Ok(FinancialYear(year))
    }
}

/// Inclusive date range used to select in-scope disposals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::EmptyRange { start, end });
        }
        Ok(ReportingPeriod { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        self.start <= date && date <= self.end
    }

    /// Label such as "FY24-25" for whole financial years, otherwise the date range
    pub fn label(&self) -> String {
        let fy = FinancialYear::from_date(self.start);
        if Some(self.start) == fy.start_date() && Some(self.end) == fy.end_date() {
            fy.label()
        } else {
            format!("{} to {}", self.start, self.end)
        }
    }

    /// Disposals inside the period, in input order
    pub fn disposals<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions
            .iter()
            .filter(|tx| tx.is_disposal() && self.contains(tx.timestamp))
            .collect()
    }

    /// Ids of the disposals inside the period
    pub fn disposal_scope(&self, transactions: &[Transaction]) -> DisposalScope {
        self.disposals(transactions).iter().map(|tx| tx.id).collect()
    }

    /// Symbols with at least one disposal inside the period, sorted
    pub fn instruments_disposed(&self, transactions: &[Transaction]) -> BTreeSet<String> {
        self.disposals(transactions)
            .into_iter()
            .map(|tx| tx.instrument.clone())
            .collect()
    }
}

impl TryFrom<FinancialYear> for ReportingPeriod {
    type Error = PeriodError;

    fn try_from(fy: FinancialYear) -> Result<Self, Self::Error> {
        match (fy.start_date(), fy.end_date()) {
            (Some(start), Some(end)) => Ok(ReportingPeriod { start, end }),
            _ => Err(PeriodError::OutOfRange(fy)),
        }
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
