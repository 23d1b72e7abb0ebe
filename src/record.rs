//! The analysed invoice: a raw JSON record plus a typed view over it.
//!
//! The model is free to return any JSON object, so [`InvoiceRecord`] keeps
//! whatever it got, in the order it got it. Consumers that need specific
//! fields go through [`InvoiceView`], which names each expected key and its
//! fallback once instead of scattering lookups across the UI.

use crate::prompts::{
    FIELD_ACCOUNTING_ENTRY, FIELD_BASE_AMOUNT, FIELD_PAYMENT_TYPE, FIELD_SERVICE_TYPE,
    FIELD_SUMMARY, FIELD_TAX_AMOUNT, FIELD_TOTAL_AMOUNT,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shown for any expected text field the model did not provide.
pub const PLACEHOLDER: &str = "No especificado";

/// One analysed invoice as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceRecord(Map<String, Value>);

impl From<Map<String, Value>> for InvoiceRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl InvoiceRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The value at `key` if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in the order the model produced them.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn view(&self) -> InvoiceView {
        InvoiceView::from_record(self)
    }
}

/// Render a record value as display text.
///
/// Strings are shown verbatim, `null` as empty, everything else as
/// pretty-printed JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Dots used only as thousands separators: "1.234", "1.234.567".
static RE_DOT_THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+$").unwrap());

/// Commas used only as thousands separators: "1,234,567".
static RE_COMMA_THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(,\d{3}){2,}$").unwrap());

/// Parse an amount the model may have written as a number or as text
/// ("1.234,56 €", "1,234.56", "1.234 €", "210.00"; "21%" is rejected).
pub fn parse_amount(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount_str(s),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn parse_amount_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('€')
        .trim_start_matches('€')
        .trim_end_matches("EUR")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    normalise_separators(&cleaned).parse::<f64>().ok()
}

/// Rewrite `cleaned` with `.` as the only decimal mark and no grouping.
///
/// With both separators present the last one is the decimal mark. A lone
/// comma is decimal (Spanish "259,14"); dots or commas in groups of three
/// are thousands.
fn normalise_separators(cleaned: &str) -> String {
    match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if RE_DOT_THOUSANDS.is_match(cleaned) => cleaned.replace('.', ""),
        (None, Some(_)) if RE_COMMA_THOUSANDS.is_match(cleaned) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned.to_string(),
    }
}

/// Explicit optional-field view of an [`InvoiceRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceView {
    pub service_type: Option<String>,
    pub payment_type: Option<String>,
    pub accounting_entry: Option<String>,
    pub summary: Option<String>,
    pub base_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub total_amount: Option<f64>,
}

impl InvoiceView {
    pub fn from_record(record: &InvoiceRecord) -> Self {
        let text = |key: &str| {
            record
                .get(key)
                .map(display_value)
                .filter(|s| !s.trim().is_empty())
        };
        let amount = |key: &str| record.get(key).and_then(parse_amount);

        Self {
            service_type: text(FIELD_SERVICE_TYPE),
            payment_type: text(FIELD_PAYMENT_TYPE),
            accounting_entry: text(FIELD_ACCOUNTING_ENTRY),
            summary: text(FIELD_SUMMARY),
            base_amount: amount(FIELD_BASE_AMOUNT),
            tax_amount: amount(FIELD_TAX_AMOUNT),
            total_amount: amount(FIELD_TOTAL_AMOUNT),
        }
    }

    pub fn service_type_or_default(&self) -> &str {
        self.service_type.as_deref().unwrap_or(PLACEHOLDER)
    }

    pub fn payment_type_or_default(&self) -> &str {
        self.payment_type.as_deref().unwrap_or(PLACEHOLDER)
    }

    pub fn accounting_entry_or_default(&self) -> &str {
        self.accounting_entry.as_deref().unwrap_or(PLACEHOLDER)
    }

    pub fn summary_or_default(&self) -> &str {
        self.summary.as_deref().unwrap_or(PLACEHOLDER)
    }

    /// Base/tax proportions, when both amounts are usable.
    pub fn chart(&self) -> Option<ChartData> {
        ChartData::new(self.base_amount?, self.tax_amount?)
    }
}

/// Base-vs-tax split for the proportion chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartData {
    pub base: f64,
    pub tax: f64,
    pub base_share: f64,
    pub tax_share: f64,
}

impl ChartData {
    /// `None` for negative amounts or a zero sum.
    pub fn new(base: f64, tax: f64) -> Option<Self> {
        if base < 0.0 || tax < 0.0 {
            return None;
        }
        let sum = base + tax;
        if !sum.is_finite() || sum <= 0.0 {
            return None;
        }
        Some(Self {
            base,
            tax,
            base_share: base / sum,
            tax_share: tax / sum,
        })
    }
}
