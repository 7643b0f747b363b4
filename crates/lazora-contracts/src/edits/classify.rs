use crate::messages::Message;

/// Failure shapes the remote edit transport can report. Transports normalize
/// whatever their client library raises into one of these before anything
/// else looks at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service answered with an error envelope.
    Api {
        http_status: Option<u16>,
        code: Option<i64>,
        status: Option<String>,
        message: String,
    },
    /// The request never got a response (connect, TLS, timeout).
    Transport { message: String, timed_out: bool },
    /// A response arrived but could not be read.
    Malformed { message: String },
}

impl ServiceError {
    pub fn api(http_status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            http_status: Some(http_status),
            code: None,
            status: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api {
                http_status,
                code,
                status,
                message,
            } => {
                write!(f, "service error")?;
                if let Some(http_status) = http_status {
                    write!(f, " (http {http_status})")?;
                }
                if let Some(code) = code {
                    write!(f, " code {code}")?;
                }
                if let Some(status) = status {
                    write!(f, " {status}")?;
                }
                write!(f, ": {message}")
            }
            Self::Transport { message, timed_out } => {
                if *timed_out {
                    write!(f, "transport timeout: {message}")
                } else {
                    write!(f, "transport error: {message}")
                }
            }
            Self::Malformed { message } => write!(f, "malformed response: {message}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// User-facing class of a remote failure. Each maps to one fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Quota,
    Auth,
    PayloadTooLarge,
    BadRequest { mentions_media: bool },
    Generic,
}

impl ErrorCategory {
    pub fn message(self) -> Message {
        match self {
            Self::Quota => Message::QuotaExceeded,
            Self::Auth => Message::AuthFailed,
            Self::PayloadTooLarge => Message::PayloadTooLarge,
            Self::BadRequest {
                mentions_media: false,
            } => Message::BadRequest,
            Self::BadRequest {
                mentions_media: true,
            } => Message::BadRequestMedia,
            Self::Generic => Message::ServiceFailed,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::Auth => "auth",
            Self::PayloadTooLarge => "payload_too_large",
            Self::BadRequest { .. } => "bad_request",
            Self::Generic => "generic",
        }
    }
}

const QUOTA_TEXT: &[&str] = &[
    "quota",
    "resource_exhausted",
    "resource exhausted",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
];
const AUTH_TEXT: &[&str] = &[
    "permission_denied",
    "permission denied",
    "unauthenticated",
    "unauthorized",
    "api key not valid",
    "api_key_invalid",
    "forbidden",
];
const TOO_LARGE_TEXT: &[&str] = &["out_of_range", "out of range", "too large", "exceed"];
const BAD_REQUEST_TEXT: &[&str] = &["invalid_argument", "invalid argument", "bad request"];
const MEDIA_TEXT: &[&str] = &["image", "media", "mime"];

/// Maps a service error onto its category. Signals are checked per category
/// in priority order (quota, auth, payload size, bad request); within a
/// category the HTTP status, numeric code, status name, and message text all
/// count, case-insensitively. Anything unmatched is `Generic`.
pub fn classify_service_error(err: &ServiceError) -> ErrorCategory {
    let (codes, status, message) = match err {
        ServiceError::Api {
            http_status,
            code,
            status,
            message,
        } => {
            let mut codes = Vec::new();
            if let Some(http_status) = http_status {
                codes.push(i64::from(*http_status));
            }
            if let Some(code) = code {
                codes.push(*code);
            }
            (
                codes,
                status.as_deref().unwrap_or_default().to_ascii_lowercase(),
                message.to_ascii_lowercase(),
            )
        }
        ServiceError::Transport { message, .. } | ServiceError::Malformed { message } => {
            (Vec::new(), String::new(), message.to_ascii_lowercase())
        }
    };
    let has_code = |wanted: &[i64]| codes.iter().any(|code| wanted.contains(code));
    let mentions = |needles: &[&str]| {
        needles
            .iter()
            .any(|needle| status.contains(needle) || message.contains(needle))
    };

    if has_code(&[429]) || mentions(QUOTA_TEXT) {
        return ErrorCategory::Quota;
    }
    if has_code(&[401, 403]) || mentions(AUTH_TEXT) {
        return ErrorCategory::Auth;
    }
    if has_code(&[413]) || mentions(TOO_LARGE_TEXT) {
        return ErrorCategory::PayloadTooLarge;
    }
    if has_code(&[400]) || mentions(BAD_REQUEST_TEXT) {
        return ErrorCategory::BadRequest {
            mentions_media: MEDIA_TEXT.iter().any(|needle| message.contains(needle)),
        };
    }
    ErrorCategory::Generic
}
