//! HMAC-SHA256 signatures over the gateway's `name=value,name=value` strings.
//!
//! Field order is part of the signed message. Both the request signer and the
//! callback verifier resolve values through [`SignedFieldSource`], so the two
//! sides can never disagree on which struct field backs a given name.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("gateway signing secret is not configured")]
    MissingSecret,

    #[error("gateway signing secret is not a usable HMAC key")]
    InvalidKey,
}

/// Field names the gateway knows how to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedField {
    TotalAmount,
    TransactionUuid,
    ProductCode,
    TransactionCode,
    Status,
    SignedFieldNames,
}

impl SignedField {
    /// Order used when signing an outgoing payment request.
    pub const REQUEST: [SignedField; 3] = [
        SignedField::TotalAmount,
        SignedField::TransactionUuid,
        SignedField::ProductCode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SignedField::TotalAmount => "total_amount",
            SignedField::TransactionUuid => "transaction_uuid",
            SignedField::ProductCode => "product_code",
            SignedField::TransactionCode => "transaction_code",
            SignedField::Status => "status",
            SignedField::SignedFieldNames => "signed_field_names",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "total_amount" => Some(SignedField::TotalAmount),
            "transaction_uuid" => Some(SignedField::TransactionUuid),
            "product_code" => Some(SignedField::ProductCode),
            "transaction_code" => Some(SignedField::TransactionCode),
            "status" => Some(SignedField::Status),
            "signed_field_names" => Some(SignedField::SignedFieldNames),
            _ => None,
        }
    }

    /// Comma-joined names, as sent in `signed_field_names`.
    pub fn join(fields: &[SignedField]) -> String {
        fields
            .iter()
            .map(SignedField::name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Anything that can supply the value for a signed field.
pub trait SignedFieldSource {
    fn signed_value(&self, field: SignedField) -> Option<&str>;
}

/// Resolves a `signed_field_names` list against `source`, keeping the given
/// order. Unknown names and absent values resolve to an empty string.
pub fn resolve_signed_fields<'a, S>(source: &'a S, names: &'a str) -> Vec<(&'a str, &'a str)>
where
    S: SignedFieldSource + ?Sized,
{
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let value = SignedField::from_name(name)
                .and_then(|field| source.signed_value(field))
                .unwrap_or("");
            (name, value)
        })
        .collect()
}

/// `name1=value1,name2=value2,...` in exactly the supplied order.
pub fn canonical_string(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Clone)]
pub struct SignatureCodec {
    mac: HmacSha256,
}

impl SignatureCodec {
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        if secret.trim().is_empty() {
            return Err(SignatureError::MissingSecret);
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Base64 HMAC-SHA256 of the canonical string.
    pub fn sign(&self, fields: &[(&str, &str)]) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical_string(fields).as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a base64 signature.
    pub fn verify(&self, fields: &[(&str, &str)], signature: &str) -> bool {
        let Ok(received) = STANDARD.decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(canonical_string(fields).as_bytes());
        mac.verify_slice(&received).is_ok()
    }

    pub fn sign_source<S>(&self, source: &S, fields: &[SignedField]) -> String
    where
        S: SignedFieldSource + ?Sized,
    {
        let names = SignedField::join(fields);
        self.sign(&resolve_signed_fields(source, &names))
    }
}

impl fmt::Debug for SignatureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureCodec")
            .field("secret", &"****")
            .finish()
    }
}
