//! Payment records as sent by the clinic backend and their normalized form.
//!
//! The backend's payment documents are loosely validated: amounts may be
//! numbers or numeric strings, the patient's name may live in one of two
//! places and the platform fee has been stored under several different keys
//! over time. All of that shape-probing happens here, once, when a record
//! enters the console. The rest of the crate works with [Transaction].

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use super::service::Service;

/// The patient label used when a payment has no patient details.
pub const UNKNOWN_PATIENT: &str = "unknown";

/// Date-time layouts accepted for `paidAt` values without a UTC offset.
///
/// These are interpreted as UTC.
const NAIVE_DATE_TIME_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

/// A payment document exactly as the backend sends it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_id: Option<String>,
    #[serde(rename = "_id", default, deserialize_with = "lenient_string")]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub user_details: Option<UserDetails>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub paid_at: Option<String>,
    /// `Some(Value::Null)` when the key is present with a `null` value.
    #[serde(default, deserialize_with = "present")]
    pub final_amount: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub actual_amount: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_from: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub platform_fee: Option<Value>,
    #[serde(rename = "platform_fee", default)]
    pub platform_fee_snake_case: Option<Value>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub fee_details: Option<FeeBreakdown>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub charges: Option<FeeBreakdown>,
}

/// The patient attached to a payment.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UserDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub firstname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lastname: Option<String>,
}

/// A nested object that may carry the platform fee.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeeBreakdown {
    #[serde(rename = "platformFee", default)]
    pub platform_fee: Option<Value>,
    #[serde(rename = "platform_fee", default)]
    pub platform_fee_snake_case: Option<Value>,
}

/// Where the platform fee of a payment came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeeSource {
    /// A fee field held a non-zero amount.
    Reported(f64),
    /// At least one fee field was present, but every one of them was zero.
    Zero,
    /// No fee field was present at all.
    Missing,
}

impl FeeSource {
    /// The fee amount, treating missing fees as zero.
    pub fn amount(self) -> f64 {
        match self {
            FeeSource::Reported(amount) => amount,
            FeeSource::Zero | FeeSource::Missing => 0.0,
        }
    }

    /// Whether the backend said anything about the fee.
    pub fn is_known(self) -> bool {
        !matches!(self, FeeSource::Missing)
    }
}

/// A payment after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// `paymentId`, falling back to `_id`, or an empty string if neither is set.
    pub id: String,
    /// The patient display name, `"unknown"` if the payment has none.
    pub patient: String,
    /// When the payment was made, if the backend recorded it.
    pub paid_at: Option<OffsetDateTime>,
    /// `finalAmount` coerced to a number, `None` if the key was absent.
    pub final_amount: Option<f64>,
    /// `actualAmount` coerced to a number, `None` if the key was absent.
    pub actual_amount: Option<f64>,
    /// The free-text source of the payment.
    pub payment_from: Option<String>,
    /// The free-text payment method, e.g. "cash" or "card".
    pub payment_method: Option<String>,
    /// The raw payment status, e.g. "paid" or "refund_pending".
    pub payment_status: Option<String>,
    /// The platform fee found on the record.
    pub fee: FeeSource,
}

impl Transaction {
    /// The normalized service this payment belongs to.
    pub fn service(&self) -> Service {
        Service::from_raw(self.payment_from.as_deref())
    }
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        let patient = resolve_patient_name(raw.user_details.as_ref(), raw.patient_name.as_deref());
        let fee = resolve_fee_source(&raw);
        let paid_at = raw.paid_at.as_deref().and_then(|paid_at| {
            let parsed = parse_paid_at(paid_at);
            if parsed.is_none() {
                tracing::debug!("ignoring unparseable paidAt value {paid_at:?}");
            }
            parsed
        });

        Self {
            id: raw
                .payment_id
                .filter(|id| !id.is_empty())
                .or(raw.document_id)
                .unwrap_or_default(),
            patient,
            paid_at,
            final_amount: raw.final_amount.as_ref().map(coerce_number),
            actual_amount: raw.actual_amount.as_ref().map(coerce_number),
            payment_from: raw.payment_from,
            payment_method: raw.payment_method,
            payment_status: raw.payment_status,
            fee,
        }
    }
}

/// Resolve the patient's display name.
///
/// `"firstname lastname"` from the user details wins, then `patientName`,
/// then [UNKNOWN_PATIENT].
pub fn resolve_patient_name(details: Option<&UserDetails>, patient_name: Option<&str>) -> String {
    let full_name = details
        .map(|details| {
            format!(
                "{} {}",
                details.firstname.as_deref().unwrap_or_default(),
                details.lastname.as_deref().unwrap_or_default()
            )
            .trim()
            .to_owned()
        })
        .unwrap_or_default();

    if !full_name.is_empty() {
        return full_name;
    }

    match patient_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => UNKNOWN_PATIENT.to_owned(),
    }
}

/// Probe the fee fields in priority order.
///
/// The first candidate that coerces to a non-zero amount wins.
fn resolve_fee_source(raw: &RawTransaction) -> FeeSource {
    fn nested(breakdown: &Option<FeeBreakdown>) -> [Option<&Value>; 2] {
        breakdown
            .as_ref()
            .map(|breakdown| {
                [
                    breakdown.platform_fee.as_ref(),
                    breakdown.platform_fee_snake_case.as_ref(),
                ]
            })
            .unwrap_or([None, None])
    }

    let [fee_details_camel, fee_details_snake] = nested(&raw.fee_details);
    let [charges_camel, charges_snake] = nested(&raw.charges);
    let candidates = [
        raw.platform_fee.as_ref(),
        raw.platform_fee_snake_case.as_ref(),
        fee_details_camel,
        fee_details_snake,
        charges_camel,
        charges_snake,
    ];

    let mut source = FeeSource::Missing;

    for candidate in candidates.into_iter().flatten() {
        let amount = coerce_number(candidate);

        if amount != 0.0 {
            return FeeSource::Reported(amount);
        }

        source = FeeSource::Zero;
    }

    source
}

/// Parse an ISO-ish `paidAt` string.
///
/// RFC 3339 strings keep their offset. Date-times without an offset and bare
/// dates are taken to be UTC.
pub fn parse_paid_at(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();

    if let Ok(date_time) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(date_time);
    }

    NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, format).ok())
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|| {
            Date::parse(raw, format_description!("[year]-[month]-[day]"))
                .ok()
                .map(|date| date.midnight().assume_utc())
        })
}

/// Coerce a JSON value to a finite number.
///
/// Numbers and numeric strings are used as-is, booleans become 1 or 0 and
/// everything else, including NaN and infinities, becomes 0.
pub fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                0.0
            } else {
                text.parse().unwrap_or(0.0)
            }
        }
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    };

    if number.is_finite() { number } else { 0.0 }
}

/// Keep explicit `null`s so that a present-but-null amount can be told apart
/// from a missing one.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Accept strings, numbers and booleans for text fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    Ok(match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

/// Drop nested objects that do not have the expected shape instead of
/// rejecting the whole record.
fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;

    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use crate::test_utils::transaction;

    use super::{FeeSource, coerce_number, parse_paid_at};

    #[test]
    fn prefers_payment_id_over_document_id() {
        let got = transaction(json!({"paymentId": "P1", "_id": "abc"}));
        assert_eq!(got.id, "P1");

        let got = transaction(json!({"_id": "abc"}));
        assert_eq!(got.id, "abc");
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let got = transaction(json!({"paymentId": 42}));

        assert_eq!(got.id, "42");
    }

    #[test]
    fn patient_name_prefers_user_details() {
        let got = transaction(json!({
            "patientName": "Someone Else",
            "userDetails": {"firstname": "Asha", "lastname": "Rao"}
        }));

        assert_eq!(got.patient, "Asha Rao");
    }

    #[test]
    fn patient_name_trims_partial_user_details() {
        let got = transaction(json!({"userDetails": {"firstname": "Asha"}}));

        assert_eq!(got.patient, "Asha");
    }

    #[test]
    fn patient_name_falls_back_to_patient_name_then_unknown() {
        let got = transaction(json!({"patientName": "Ravi", "userDetails": {}}));
        assert_eq!(got.patient, "Ravi");

        let got = transaction(json!({}));
        assert_eq!(got.patient, "unknown");
    }

    #[test]
    fn null_final_amount_is_present() {
        let got = transaction(json!({"finalAmount": null, "actualAmount": 50}));

        assert_eq!(got.final_amount, Some(0.0));
        assert_eq!(got.actual_amount, Some(50.0));
    }

    #[test]
    fn missing_amounts_are_none() {
        let got = transaction(json!({}));

        assert_eq!(got.final_amount, None);
        assert_eq!(got.actual_amount, None);
    }

    #[test]
    fn fee_uses_first_non_zero_candidate() {
        let got = transaction(json!({
            "platformFee": 0,
            "platform_fee": "0",
            "feeDetails": {"platformFee": 15},
            "charges": {"platform_fee": 99}
        }));

        assert_eq!(got.fee, FeeSource::Reported(15.0));
    }

    #[test]
    fn fee_checks_snake_case_under_charges_last() {
        let got = transaction(json!({"charges": {"platform_fee": "12.5"}}));

        assert_eq!(got.fee, FeeSource::Reported(12.5));
    }

    #[test]
    fn zero_fee_is_distinguished_from_missing_fee() {
        let zero = transaction(json!({"platformFee": 0}));
        let missing = transaction(json!({}));

        assert_eq!(zero.fee, FeeSource::Zero);
        assert_eq!(missing.fee, FeeSource::Missing);
        assert_eq!(zero.fee.amount(), missing.fee.amount());
        assert!(zero.fee.is_known());
        assert!(!missing.fee.is_known());
    }

    #[test]
    fn malformed_fee_details_do_not_reject_the_record() {
        let got = transaction(json!({"paymentId": "P1", "feeDetails": 5}));

        assert_eq!(got.id, "P1");
        assert_eq!(got.fee, FeeSource::Missing);
    }

    #[test]
    fn parses_rfc3339_and_naive_date_times() {
        assert_eq!(
            parse_paid_at("2024-01-01T10:00:30Z"),
            Some(datetime!(2024-01-01 10:00:30 UTC))
        );
        assert_eq!(
            parse_paid_at("2024-01-01T10:00:30.250+05:30"),
            Some(datetime!(2024-01-01 10:00:30.25 +05:30))
        );
        assert_eq!(
            parse_paid_at("2024-01-01 10:00"),
            Some(datetime!(2024-01-01 10:00 UTC))
        );
        assert_eq!(
            parse_paid_at("2024-01-01"),
            Some(datetime!(2024-01-01 0:00 UTC))
        );
    }

    #[test]
    fn unparseable_paid_at_is_treated_as_missing() {
        let got = transaction(json!({"paidAt": "last tuesday"}));

        assert_eq!(got.paid_at, None);
    }

    #[test]
    fn coerces_non_numbers_to_zero() {
        assert_eq!(coerce_number(&json!("abc")), 0.0);
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&json!("NaN")), 0.0);
        assert_eq!(coerce_number(&json!("inf")), 0.0);
        assert_eq!(coerce_number(&json!([1])), 0.0);
        assert_eq!(coerce_number(&json!(" 12.5 ")), 12.5);
        assert_eq!(coerce_number(&json!(true)), 1.0);
    }
}
