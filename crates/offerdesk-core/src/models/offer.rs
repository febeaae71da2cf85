//! The placement offer document.

use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    error::Result,
    time_window::{civil_date, civil_zone, parse_instant},
};

/// How an installment was paid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Cash,
    Upi,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

/// Recruiter contact at the hiring company.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HrContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One fee payment against an offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Installment {
    /// e.g. "1ST INSTALLMENT"
    pub label: String,
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub date: Option<Timestamp>,
    pub mode: PaymentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One placement offer, as imported and as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub student_name: String,

    #[serde(default, deserialize_with = "lenient_instant")]
    pub offer_date: Option<Timestamp>,

    #[serde(default, deserialize_with = "lenient_instant")]
    pub joining_date: Option<Timestamp>,

    #[serde(default)]
    pub company_name: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr: Option<HrContact>,

    /// Annual package in lakh rupees
    #[serde(default, rename = "packageLPA")]
    pub package_lpa: Option<f64>,

    #[serde(default)]
    pub total_post_placement_fee: f64,

    #[serde(default)]
    pub remaining_pre_placement_fee: f64,

    #[serde(default)]
    pub discount: f64,

    #[serde(default)]
    pub installments: Vec<Installment>,

    /// Kept equal to gross fee minus discount minus payments, floored at 0
    #[serde(default)]
    pub remaining_fee: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_fee_note: Option<String>,
}

/// Accepts an RFC 3339 instant, a bare date, an empty string or null.
fn lenient_instant<'de, D>(deserializer: D) -> std::result::Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let text: Option<String> = Option::deserialize(deserializer)?;
    match text.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_instant(text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Lowercase slug of a person's name: whitespace runs become `-`, anything
/// outside `[a-z0-9-]` is dropped and repeated dashes collapse.
pub fn name_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            slug.push(ch);
        }
    }
    let mut collapsed = String::with_capacity(slug.len());
    for ch in slug.chars() {
        if ch == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(ch);
    }
    collapsed
}

impl Offer {
    pub fn new(student_name: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            offer_date: None,
            joining_date: None,
            company_name: None,
            location: None,
            hr: None,
            package_lpa: None,
            total_post_placement_fee: 0.0,
            remaining_pre_placement_fee: 0.0,
            discount: 0.0,
            installments: Vec::new(),
            remaining_fee: 0.0,
            remaining_fee_note: None,
        }
    }

    pub fn amount_paid(&self) -> f64 {
        self.installments.iter().map(|i| i.amount).sum()
    }

    /// Recomputes `remaining_fee` from the fee, discount and installments.
    pub fn recompute_remaining_fee(&mut self) {
        let remaining = self.total_post_placement_fee - self.discount - self.amount_paid();
        self.remaining_fee = if remaining.is_finite() {
            remaining.max(0.0)
        } else {
            0.0
        };
    }

    /// Identity used to deduplicate imports: student slug, company and the
    /// civil offer date.
    pub fn dedupe_key(&self) -> Result<String> {
        let date = match self.offer_date {
            Some(instant) => civil_date(instant, &civil_zone()?).to_string(),
            None => "nodate".to_string(),
        };
        let company = self
            .company_name
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        Ok(format!("{}|{}|{}", name_key(&self.student_name), company, date))
    }

    /// The stored JSON document, keyed by `_id` = dedupe key.
    pub fn to_document(&self) -> Result<Value> {
        let mut document = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut document {
            map.insert("_id".to_string(), Value::String(self.dedupe_key()?));
        }
        Ok(document)
    }
}
