use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::TransactionRecord;

/// Income/expense sums for the donut chart.
#[derive(Serialize, Default, PartialEq, Debug)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
}

/// One point of the line-chart series: sums for a single calendar date.
#[derive(Serialize, PartialEq, Debug)]
pub struct DayPoint {
    pub date: String,
    pub income: f64,
    pub expense: f64,
}

#[derive(Serialize)]
pub struct Summary {
    pub totals: Totals,
    pub series: Vec<DayPoint>,
}

fn to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Sums all amounts by type in one pass. Empty input yields zero totals.
pub fn totals(records: &[TransactionRecord]) -> Totals {
    let mut acc = (0i64, 0i64);
    for record in records {
        if record.kind == "income" {
            acc.0 += record.amount_cents;
        } else {
            acc.1 += record.amount_cents;
        }
    }
    Totals {
        income: to_amount(acc.0),
        expense: to_amount(acc.1),
    }
}

/// Groups records by calendar date and sums amounts per type per date.
/// Dates come back in chronological order regardless of input order; an
/// empty input yields an empty series.
pub fn daily_series(records: &[TransactionRecord]) -> Vec<DayPoint> {
    // ISO dates sort lexicographically, so a BTreeMap keyed on the
    // YYYY-MM-DD prefix is already chronological.
    let mut grouped: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for record in records {
        let date = if record.occurred_at.len() >= 10 {
            &record.occurred_at[..10]
        } else {
            record.occurred_at.as_str()
        };
        let entry = grouped.entry(date).or_default();
        if record.kind == "income" {
            entry.0 += record.amount_cents;
        } else {
            entry.1 += record.amount_cents;
        }
    }
    grouped
        .into_iter()
        .map(|(date, (income, expense))| DayPoint {
            date: date.to_string(),
            income: to_amount(income),
            expense: to_amount(expense),
        })
        .collect()
}

pub fn summarize(records: &[TransactionRecord]) -> Summary {
    Summary {
        totals: totals(records),
        series: daily_series(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str, amount_cents: i64, occurred_at: &str) -> TransactionRecord {
        TransactionRecord {
            id: 0,
            kind: kind.to_string(),
            amount_cents,
            occurred_at: occurred_at.to_string(),
            description: None,
            category_name: None,
        }
    }

    #[test]
    fn empty_input_yields_empty_series_and_zero_totals() {
        assert_eq!(totals(&[]), Totals::default());
        assert!(daily_series(&[]).is_empty());
    }

    #[test]
    fn totals_sum_amounts_by_type() {
        let records = vec![
            record("income", 10_00, "2024-03-01T09:00:00+00:00"),
            record("expense", 4_50, "2024-03-01T12:00:00+00:00"),
            record("income", 2_25, "2024-03-02T08:00:00+00:00"),
        ];
        let totals = totals(&records);
        assert_eq!(totals.income, 12.25);
        assert_eq!(totals.expense, 4.5);
    }

    #[test]
    fn series_dates_are_chronological_regardless_of_input_order() {
        let records = vec![
            record("expense", 1_00, "2024-03-09T10:00:00+00:00"),
            record("income", 2_00, "2024-03-01T10:00:00+00:00"),
            record("expense", 3_00, "2024-03-05T10:00:00+00:00"),
        ];
        let series = daily_series(&records);
        let dates: Vec<&str> = series.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-05", "2024-03-09"]);
    }

    #[test]
    fn per_date_sums_match_individually_filtered_amounts() {
        let records = vec![
            record("income", 5_00, "2024-03-01T06:00:00+00:00"),
            record("income", 7_00, "2024-03-01T18:00:00+00:00"),
            record("expense", 3_00, "2024-03-01T12:00:00+00:00"),
            record("expense", 9_99, "2024-03-02T12:00:00+00:00"),
        ];
        let series = daily_series(&records);

        for point in &series {
            let income: i64 = records
                .iter()
                .filter(|r| r.kind == "income" && r.occurred_at.starts_with(&point.date))
                .map(|r| r.amount_cents)
                .sum();
            let expense: i64 = records
                .iter()
                .filter(|r| r.kind == "expense" && r.occurred_at.starts_with(&point.date))
                .map(|r| r.amount_cents)
                .sum();
            assert_eq!(point.income, income as f64 / 100.0);
            assert_eq!(point.expense, expense as f64 / 100.0);
        }
    }

    #[test]
    fn same_date_different_times_collapse_to_one_point() {
        let records = vec![
            record("expense", 1_00, "2024-03-01T01:00:00+00:00"),
            record("expense", 2_00, "2024-03-01T23:59:59+00:00"),
        ];
        let series = daily_series(&records);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].expense, 3.0);
        assert_eq!(series[0].income, 0.0);
    }
}
