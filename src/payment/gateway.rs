//! Wire shapes exchanged with the eSewa ePay v2 gateway.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

use super::signature::{SignatureCodec, SignedField, SignedFieldSource};

pub const CALLBACK_PATH: &str = "/api/payments/esewa/callback";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub form_url: String,
    pub product_code: String,
    pub callback_url: String,
    pub frontend_url: String,
    codec: SignatureCodec,
}

impl GatewayConfig {
    pub fn new(
        form_url: impl Into<String>,
        product_code: impl Into<String>,
        backend_url: &str,
        frontend_url: &str,
        codec: SignatureCodec,
    ) -> Self {
        Self {
            form_url: form_url.into(),
            product_code: product_code.into(),
            callback_url: format!("{}{}", backend_url.trim_end_matches('/'), CALLBACK_PATH),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            codec,
        }
    }

    pub fn codec(&self) -> &SignatureCodec {
        &self.codec
    }

    /// Builds the signed form the browser posts to the gateway. Both outcome
    /// URLs point at the same callback; the payload carries the outcome.
    pub fn build_form(&self, transaction_uuid: &str, total_amount: &BigDecimal) -> PaymentForm {
        let amount = format_amount(total_amount);
        let mut form = PaymentForm {
            amount: amount.clone(),
            tax_amount: "0".to_string(),
            total_amount: amount,
            transaction_uuid: transaction_uuid.to_string(),
            product_code: self.product_code.clone(),
            product_service_charge: "0".to_string(),
            product_delivery_charge: "0".to_string(),
            success_url: self.callback_url.clone(),
            failure_url: self.callback_url.clone(),
            signed_field_names: SignedField::join(&SignedField::REQUEST),
            signature: String::new(),
        };
        form.signature = self.codec.sign_source(&form, &SignedField::REQUEST);
        form
    }
}

/// Two fraction digits, always. This exact string is signed and echoed back.
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

/// Parses a gateway amount, tolerating thousands separators.
pub fn parse_amount(raw: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(&raw.trim().replace(',', "")).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentForm {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

impl SignedFieldSource for PaymentForm {
    fn signed_value(&self, field: SignedField) -> Option<&str> {
        match field {
            SignedField::TotalAmount => Some(self.total_amount.as_str()),
            SignedField::TransactionUuid => Some(self.transaction_uuid.as_str()),
            SignedField::ProductCode => Some(self.product_code.as_str()),
            SignedField::SignedFieldNames => Some(self.signed_field_names.as_str()),
            SignedField::TransactionCode | SignedField::Status => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback carried no data parameter")]
    MissingData,

    #[error("callback data is not valid base64: {0}")]
    InvalidEncoding(String),

    #[error("callback data is not a valid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Complete,
    Canceled,
    Failure,
    Pending,
    Other(String),
}

impl CallbackStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" => CallbackStatus::Complete,
            "CANCELED" => CallbackStatus::Canceled,
            "FAILURE" => CallbackStatus::Failure,
            "PENDING" => CallbackStatus::Pending,
            _ => CallbackStatus::Other(raw.to_string()),
        }
    }
}

/// Decoded content of the callback's `data` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub transaction_code: Option<String>,
    pub status: String,
    #[serde(deserialize_with = "string_or_number")]
    pub total_amount: String,
    pub transaction_uuid: String,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub signed_field_names: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub ref_id: Option<String>,
}

impl CallbackPayload {
    pub fn decode(data: Option<&str>) -> Result<Self, CallbackError> {
        let data = data
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(CallbackError::MissingData)?;

        // `+` arrives as a space when the redirect did not percent-encode it.
        let normalized = data.replace(' ', "+");
        let bytes = STANDARD
            .decode(normalized.as_bytes())
            .map_err(|e| CallbackError::InvalidEncoding(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| CallbackError::InvalidPayload(e.to_string()))
    }

    pub fn encode(&self) -> String {
        // Serializing plain strings and options cannot fail.
        STANDARD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn status(&self) -> CallbackStatus {
        CallbackStatus::parse(&self.status)
    }

    /// The signature and its field list, when the gateway sent both.
    pub fn signature_parts(&self) -> Option<(&str, &str)> {
        match (self.signed_field_names.as_deref(), self.signature.as_deref()) {
            (Some(names), Some(sig)) if !names.trim().is_empty() && !sig.trim().is_empty() => {
                Some((names, sig))
            }
            _ => None,
        }
    }
}

impl SignedFieldSource for CallbackPayload {
    fn signed_value(&self, field: SignedField) -> Option<&str> {
        match field {
            SignedField::TotalAmount => Some(self.total_amount.as_str()),
            SignedField::TransactionUuid => Some(self.transaction_uuid.as_str()),
            SignedField::ProductCode => self.product_code.as_deref(),
            SignedField::TransactionCode => self.transaction_code.as_deref(),
            SignedField::Status => Some(self.status.as_str()),
            SignedField::SignedFieldNames => self.signed_field_names.as_deref(),
        }
    }
}

/// The gateway sends `total_amount` as a JSON string or a bare number. The
/// number's textual form is what it signed, so keep it verbatim.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::signature::resolve_signed_fields;

    fn gateway() -> GatewayConfig {
        GatewayConfig::new(
            "https://rc-epay.esewa.com.np/api/epay/main/v2/form",
            "EPAYTEST",
            "https://api.example.com/",
            "https://app.example.com/",
            SignatureCodec::new("secret").unwrap(),
        )
    }

    #[test]
    fn test_format_amount_two_decimals() {
        assert_eq!(format_amount(&BigDecimal::from(2000)), "2000.00");
        assert_eq!(format_amount(&"1499.5".parse().unwrap()), "1499.50");
        assert_eq!(format_amount(&"12.345".parse().unwrap()), "12.35");
        assert_eq!(format_amount(&"7.10".parse().unwrap()), "7.10");
    }

    #[test]
    fn test_parse_amount_handles_separators() {
        assert_eq!(parse_amount("2,000.0"), Some(BigDecimal::from(2000)));
        assert_eq!(parse_amount(" 10.50 "), Some("10.5".parse().unwrap()));
        assert_eq!(parse_amount("ten"), None);
    }

    #[test]
    fn test_build_form_signs_request_fields() {
        let gateway = gateway();
        let form = gateway.build_form("tx-1", &BigDecimal::from(2000));

        assert_eq!(form.amount, "2000.00");
        assert_eq!(form.total_amount, "2000.00");
        assert_eq!(form.tax_amount, "0");
        assert_eq!(form.product_service_charge, "0");
        assert_eq!(form.product_delivery_charge, "0");
        assert_eq!(form.signed_field_names, "total_amount,transaction_uuid,product_code");
        assert_eq!(form.success_url, "https://api.example.com/api/payments/esewa/callback");
        assert_eq!(form.success_url, form.failure_url);

        let expected = gateway.codec().sign(&[
            ("total_amount", "2000.00"),
            ("transaction_uuid", "tx-1"),
            ("product_code", "EPAYTEST"),
        ]);
        assert_eq!(form.signature, expected);
        assert!(gateway
            .codec()
            .verify(&resolve_signed_fields(&form, &form.signed_field_names), &form.signature));
    }

    #[test]
    fn test_decode_callback_with_numeric_amount() {
        let json = r#"{"transaction_code":"000AWEO","status":"COMPLETE","total_amount":1000.0,
            "transaction_uuid":"tx-9","product_code":"EPAYTEST",
            "signed_field_names":"transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names",
            "signature":"abc="}"#;
        let data = STANDARD.encode(json);

        let payload = CallbackPayload::decode(Some(&data)).unwrap();
        assert_eq!(payload.total_amount, "1000.0");
        assert_eq!(payload.status(), CallbackStatus::Complete);
        assert_eq!(payload.transaction_code.as_deref(), Some("000AWEO"));
        assert!(payload.signature_parts().is_some());
    }

    #[test]
    fn test_decode_restores_plus_signs() {
        let payload = CallbackPayload {
            transaction_code: Some(">>>".to_string()),
            status: "COMPLETE".to_string(),
            total_amount: "1.00".to_string(),
            transaction_uuid: "tx?".to_string(),
            product_code: None,
            signed_field_names: None,
            signature: None,
            ref_id: None,
        };
        let encoded = payload.encode();
        let mangled = encoded.replace('+', " ");

        assert_eq!(CallbackPayload::decode(Some(&mangled)).unwrap(), payload);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(CallbackPayload::decode(None), Err(CallbackError::MissingData));
        assert_eq!(CallbackPayload::decode(Some("  ")), Err(CallbackError::MissingData));
        assert!(matches!(
            CallbackPayload::decode(Some("%%%")),
            Err(CallbackError::InvalidEncoding(_))
        ));
        assert!(matches!(
            CallbackPayload::decode(Some(&STANDARD.encode("{\"status\":1}"))),
            Err(CallbackError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(CallbackStatus::parse("complete"), CallbackStatus::Complete);
        assert_eq!(CallbackStatus::parse("CANCELED"), CallbackStatus::Canceled);
        assert_eq!(CallbackStatus::parse("FAILURE"), CallbackStatus::Failure);
        assert_eq!(CallbackStatus::parse("PENDING"), CallbackStatus::Pending);
        assert_eq!(
            CallbackStatus::parse("AMBIGUOUS"),
            CallbackStatus::Other("AMBIGUOUS".to_string())
        );
    }
}
