use super::ledger::DisposalMatch;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

/// Totals for one instrument settled in one currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SummaryRow {
    pub instrument: String,
    pub currency: String,
    pub disposals: usize,
    #[schemars(with = "f64")]
    pub proceeds: Decimal,
    #[schemars(with = "f64")]
    pub cost_basis: Decimal,
    #[schemars(with = "f64")]
    pub gain: Decimal,
}

/// Group disposal records by `(instrument, currency)`, sorted by instrument then currency
pub fn summarize<'a, I>(records: I) -> Vec<SummaryRow>
where
    I: IntoIterator<Item = &'a DisposalMatch>,
{
    let mut rows: BTreeMap<(String, String), SummaryRow> = BTreeMap::new();

    for record in records {
        let row = rows
            .entry((record.instrument.clone(), record.currency.clone()))
            .or_insert_with(|| SummaryRow {
                instrument: record.instrument.clone(),
                currency: record.currency.clone(),
                disposals: 0,
                proceeds: Decimal::ZERO,
                cost_basis: Decimal::ZERO,
                gain: Decimal::ZERO,
            });
        row.disposals += 1;
        row.proceeds += record.proceeds;
        row.cost_basis += record.cost_basis;
        row.gain += record.gain;
    }

    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::{compute_fifo_gains, DisposalScope};
    use crate::core::transaction::{Transaction, TransactionKind};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tx(
        id: usize,
        day: u32,
        kind: TransactionKind,
        symbol: &str,
        qty: Decimal,
        price: Decimal,
        currency: &str,
    ) -> Transaction {
        let timestamp = NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Transaction::new(id, timestamp, kind, symbol, qty, price, currency)
    }

    fn records_for(history: &[Transaction]) -> Vec<DisposalMatch> {
        compute_fifo_gains(history, &DisposalScope::all_disposals(history)).unwrap()
    }

    #[test]
    fn groups_by_instrument_and_currency() {
        use TransactionKind::*;
        let aapl = vec![
            tx(1, 1, Acquisition, "AAPL", dec!(10), dec!(100), "USD"),
            tx(2, 2, Disposal, "AAPL", dec!(4), dec!(150), "USD"),
            tx(3, 3, Disposal, "AAPL", dec!(6), dec!(90), "USD"),
        ];
        let vod = vec![
            tx(4, 1, Acquisition, "VOD", dec!(100), dec!(1), "GBP"),
            tx(5, 2, Disposal, "VOD", dec!(50), dec!(2), "GBP"),
        ];

        let mut records = records_for(&vod);
        records.extend(records_for(&aapl));

        let summary = summarize(&records);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].instrument, "AAPL");
        assert_eq!(summary[0].disposals, 2);
        assert_eq!(summary[0].proceeds, dec!(1140));
        assert_eq!(summary[0].cost_basis, dec!(1000));
        assert_eq!(summary[0].gain, dec!(140));

        assert_eq!(summary[1].instrument, "VOD");
        assert_eq!(summary[1].currency, "GBP");
        assert_eq!(summary[1].gain, dec!(50));
    }

    #[test]
    fn same_instrument_different_currencies_are_separate_rows() {
        use TransactionKind::*;
        let history = vec![
            tx(1, 1, Acquisition, "SHEL", dec!(10), dec!(20), "GBP"),
            tx(2, 2, Disposal, "SHEL", dec!(5), dec!(30), "GBP"),
            tx(3, 3, Disposal, "SHEL", dec!(5), dec!(40), "EUR"),
        ];

        let summary = summarize(&records_for(&history));

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].currency, "EUR");
        assert_eq!(summary[0].proceeds, dec!(200));
        assert_eq!(summary[1].currency, "GBP");
        assert_eq!(summary[1].proceeds, dec!(150));
    }

    #[test]
    fn order_independent() {
        use TransactionKind::*;
        let history = vec![
            tx(1, 1, Acquisition, "AAPL", dec!(10), dec!(1), "USD"),
            tx(2, 2, Disposal, "AAPL", dec!(3), dec!(2), "USD"),
            tx(3, 3, Disposal, "AAPL", dec!(3), dec!(5), "USD"),
        ];
        let records = records_for(&history);
        let reversed: Vec<_> = records.iter().rev().cloned().collect();

        assert_eq!(summarize(&records), summarize(&reversed));
    }

    #[test]
    fn empty_input() {
        assert!(summarize(&Vec::<DisposalMatch>::new()).is_empty());
    }
}
