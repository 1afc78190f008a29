use std::collections::BTreeMap;

use models::expense::{round2, Expense};
use serde::Serialize;

const UNSPECIFIED: &str = "unspecified";

/// Aggregate totals over a list of expenses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub count: usize,
    pub total: f64,
    pub by_category: BTreeMap<String, f64>,
    /// Keyed by `YYYY-MM`.
    pub by_month: BTreeMap<String, f64>,
    pub by_payment_method: BTreeMap<String, f64>,
}

pub fn summarize(expenses: &[Expense]) -> ExpenseSummary {
    let mut summary = ExpenseSummary { count: expenses.len(), ..Default::default() };
    for e in expenses {
        summary.total += e.amount;
        *summary.by_category.entry(e.category.clone()).or_default() += e.amount;
        let month = e.date.get(..7).unwrap_or(&e.date).to_string();
        *summary.by_month.entry(month).or_default() += e.amount;
        let method = match e.payment_method.as_deref() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => UNSPECIFIED.to_string(),
        };
        *summary.by_payment_method.entry(method).or_default() += e.amount;
    }
    summary.total = round2(summary.total);
    for map in [&mut summary.by_category, &mut summary.by_month, &mut summary.by_payment_method] {
        for v in map.values_mut() {
            *v = round2(*v);
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(date: &str, amount: f64, category: &str, method: Option<&str>) -> Expense {
        Expense {
            id: format!("{date}-{amount}"),
            date: date.into(),
            amount,
            category: category.into(),
            description: None,
            payment_method: method.map(str::to_string),
            tags: Vec::new(),
            user_id: Some("u".into()),
        }
    }

    #[test]
    fn empty_list_summarizes_to_zero() {
        assert_eq!(summarize(&[]), ExpenseSummary::default());
    }

    #[test]
    fn groups_and_rounds_totals() {
        let list = vec![
            expense("2024-01-03", 0.1, "Food", Some("card")),
            expense("2024-01-20", 0.2, "Food", None),
            expense("2024-02-01", 10.0, "Rent", Some("")),
        ];
        let s = summarize(&list);
        assert_eq!(s.count, 3);
        assert_eq!(s.total, 10.3);
        assert_eq!(s.by_category.get("Food"), Some(&0.3));
        assert_eq!(s.by_month.get("2024-01"), Some(&0.3));
        assert_eq!(s.by_month.get("2024-02"), Some(&10.0));
        assert_eq!(s.by_payment_method.get("card"), Some(&0.1));
        assert_eq!(s.by_payment_method.get(UNSPECIFIED), Some(&10.2));
    }
}
