//! Expense records.
//!
//! [`ExpenseInput`] accepts every shape the UI or a seed file may hand us
//! (numeric strings, comma separated tags, calendar values). Each loosely
//! typed field is a tagged union with one conversion per variant:
//!
//! | field    | accepted variants                                   | canonical form        |
//! |----------|-----------------------------------------------------|-----------------------|
//! | date     | text, `NaiveDate`, `DateTime<Utc>`, `{year,month,day}` | `DateValue::Text`  |
//! | amount   | number, numeric text                                | `AmountValue::Number` |
//! | text     | text                                                | trimmed text          |
//! | tags     | list, comma separated text, scalar, absent          | `TagsValue::List`     |
//!
//! Anything else is kept in an `Other` variant so that validation can
//! reject it with a precise message instead of normalization failing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    Text(String),
    Parts { year: i32, month: u32, day: u32 },
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountValue {
    Number(f64),
    Text(String),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    Text(String),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsValue {
    List(Vec<Value>),
    Text(String),
    Other(Value),
}

/// Loosely typed expense as received from callers or read from storage.
///
/// `None` means "not specified": [`ExpenseInput::merge`] keeps the prior value.
/// An explicit JSON `null` is a specified value (`Other(Value::Null)`), so it
/// overrides on merge and normalization then clears the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_present", skip_serializing_if = "Option::is_none")]
    pub date: Option<DateValue>,
    #[serde(default, deserialize_with = "de_present", skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountValue>,
    #[serde(default, deserialize_with = "de_present", skip_serializing_if = "Option::is_none")]
    pub category: Option<TextValue>,
    #[serde(default, deserialize_with = "de_present", skip_serializing_if = "Option::is_none")]
    pub description: Option<TextValue>,
    #[serde(
        default,
        alias = "payment_method",
        deserialize_with = "de_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_method: Option<TextValue>,
    #[serde(default, deserialize_with = "de_present", skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsValue>,
    #[serde(
        default,
        alias = "user_id",
        deserialize_with = "de_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
}

/// A validated expense in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// A present field, `null` included, is `Some`; only an absent one stays `None`.
fn de_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Ids in seed files are sometimes numbers.
fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl ExpenseInput {
    /// Overlay `partial` onto `self`; every field `partial` specifies wins.
    pub fn merge(self, partial: ExpenseInput) -> ExpenseInput {
        ExpenseInput {
            id: partial.id.or(self.id),
            date: partial.date.or(self.date),
            amount: partial.amount.or(self.amount),
            category: partial.category.or(self.category),
            description: partial.description.or(self.description),
            payment_method: partial.payment_method.or(self.payment_method),
            tags: partial.tags.or(self.tags),
            user_id: partial.user_id.or(self.user_id),
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(DateValue::Text(date.into()));
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(AmountValue::Number(amount));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(TextValue::Text(category.into()));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(TextValue::Text(description.into()));
        self
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(TextValue::Text(method.into()));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(TagsValue::List(tags.into_iter().map(|t| Value::String(t.into())).collect()));
        self
    }
}

impl From<Expense> for ExpenseInput {
    fn from(e: Expense) -> Self {
        ExpenseInput {
            id: Some(e.id),
            date: Some(DateValue::Text(e.date)),
            amount: Some(AmountValue::Number(e.amount)),
            category: Some(TextValue::Text(e.category)),
            description: e.description.map(TextValue::Text),
            payment_method: e.payment_method.map(TextValue::Text),
            tags: Some(TagsValue::List(e.tags.into_iter().map(Value::String).collect())),
            user_id: e.user_id,
        }
    }
}

/// Round half away from zero to two decimals.
///
/// The scaled value is first snapped to 6 decimals so binary artefacts such as
/// `12.345 * 100 == 1234.4999999999998` round the way the decimal literal reads.
pub fn round2(n: f64) -> f64 {
    // beyond 2^53 cents every f64 is already a whole number of cents
    const EXACT_CENTS: f64 = 9_007_199_254_740_992.0;
    if !n.is_finite() || (n * 100.0).abs() >= EXACT_CENTS {
        return n;
    }
    let scaled = ((n * 100.0) * 1e6).round() / 1e6;
    scaled.round() / 100.0
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

impl DateValue {
    fn normalize(self) -> Option<DateValue> {
        let normalized = match self {
            DateValue::Text(s) => DateValue::Text(s.trim().to_string()),
            DateValue::Date(d) => DateValue::Text(format_date(d)),
            DateValue::DateTime(dt) => DateValue::Text(format_date(dt.date_naive())),
            DateValue::Parts { year, month, day } => match NaiveDate::from_ymd_opt(year, month, day) {
                Some(d) => DateValue::Text(format_date(d)),
                None => DateValue::Parts { year, month, day },
            },
            DateValue::Other(Value::Null) => return None,
            other @ DateValue::Other(_) => other,
        };
        Some(normalized)
    }
}

impl AmountValue {
    fn normalize(self) -> Option<AmountValue> {
        let normalized = match self {
            AmountValue::Number(n) => AmountValue::Number(round2(n)),
            AmountValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) => AmountValue::Number(round2(n)),
                Err(_) => {
                    debug!(amount = %s, "amount is not numeric");
                    AmountValue::Number(f64::NAN)
                }
            },
            AmountValue::Other(Value::Null) => return None,
            other @ AmountValue::Other(_) => other,
        };
        Some(normalized)
    }
}

impl TextValue {
    fn normalize(self) -> Option<TextValue> {
        match self {
            TextValue::Text(s) => Some(TextValue::Text(s.trim().to_string())),
            TextValue::Other(Value::Null) => None,
            other @ TextValue::Other(_) => Some(other),
        }
    }
}

fn scalar_tag(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

impl TagsValue {
    fn normalize(self) -> TagsValue {
        let tags: Vec<String> = match self {
            TagsValue::List(items) => items.iter().filter_map(scalar_tag).collect(),
            TagsValue::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            TagsValue::Other(v) => scalar_tag(&v).into_iter().collect(),
        };
        TagsValue::List(tags.into_iter().map(Value::String).collect())
    }
}

/// Best-effort coercion of every field into its canonical shape. Never fails.
pub fn normalize_expense(input: ExpenseInput) -> ExpenseInput {
    ExpenseInput {
        id: input.id,
        date: input.date.and_then(DateValue::normalize),
        amount: input.amount.and_then(AmountValue::normalize),
        category: input.category.and_then(TextValue::normalize),
        description: input.description.and_then(TextValue::normalize),
        payment_method: input.payment_method.and_then(TextValue::normalize),
        tags: Some(input.tags.map_or(TagsValue::List(Vec::new()), TagsValue::normalize)),
        user_id: input.user_id,
    }
}

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

struct CheckedFields {
    date: String,
    amount: f64,
    category: String,
    description: Option<String>,
    payment_method: Option<String>,
    tags: Vec<String>,
}

fn required_text(field: &str, value: &Option<TextValue>) -> Result<String, ModelError> {
    match value {
        Some(TextValue::Text(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(ModelError::validation(format!("{field} is required"))),
    }
}

fn optional_text(field: &str, value: &Option<TextValue>) -> Result<Option<String>, ModelError> {
    match value {
        None => Ok(None),
        Some(TextValue::Text(s)) => Ok(Some(s.clone())),
        Some(TextValue::Other(_)) => Err(ModelError::validation(format!("{field} must be a string"))),
    }
}

fn check(input: &ExpenseInput) -> Result<CheckedFields, ModelError> {
    let date = match &input.date {
        Some(DateValue::Text(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(ModelError::validation("date is required")),
    };
    let category = required_text("category", &input.category)?;
    let amount = match &input.amount {
        Some(AmountValue::Number(n)) if n.is_finite() => *n,
        _ => return Err(ModelError::validation("amount must be a finite number")),
    };
    if !is_iso_date(&date) {
        return Err(ModelError::validation("date must use the YYYY-MM-DD format"));
    }
    let description = optional_text("description", &input.description)?;
    let payment_method = optional_text("paymentMethod", &input.payment_method)?;
    let tags = match &input.tags {
        None => Vec::new(),
        Some(TagsValue::List(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ModelError::validation("tags must be an array of strings")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(ModelError::validation("tags must be an array of strings")),
    };
    Ok(CheckedFields { date, amount, category, description, payment_method, tags })
}

/// Strict shape check, meant to run on normalized input.
pub fn validate_expense(input: &ExpenseInput) -> Result<(), ModelError> {
    check(input).map(|_| ())
}

impl TryFrom<ExpenseInput> for Expense {
    type Error = ModelError;

    fn try_from(input: ExpenseInput) -> Result<Self, Self::Error> {
        let fields = check(&input)?;
        let id = input.id.ok_or_else(|| ModelError::validation("id is required"))?;
        Ok(Expense {
            id,
            date: fields.date,
            amount: fields.amount,
            category: fields.category,
            description: fields.description,
            payment_method: fields.payment_method,
            tags: fields.tags,
            user_id: input.user_id,
        })
    }
}
