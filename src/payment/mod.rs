pub mod gateway;
pub mod signature;

pub use gateway::{
    format_amount, parse_amount, CallbackError, CallbackPayload, CallbackStatus, GatewayConfig,
    PaymentForm,
};
pub use signature::{SignatureCodec, SignatureError, SignedField, SignedFieldSource};
