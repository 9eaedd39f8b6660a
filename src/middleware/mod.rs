pub mod auth;
pub mod request_logger;

pub use auth::{AuthenticatedUser, USER_ID_HEADER};
pub use request_logger::{request_logger_middleware, REQUEST_ID_HEADER};
