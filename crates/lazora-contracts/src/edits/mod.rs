mod classify;
mod request;
mod result;

pub use classify::{classify_service_error, ErrorCategory, ServiceError};
pub use request::{EditOperation, EditRequest};
pub use result::{EditFailure, EditResult, PayloadRole};
