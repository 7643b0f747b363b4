use crate::messages::Message;
use crate::payload::ImagePayload;

use super::classify::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRole {
    Product,
    StyleReference,
    Image,
}

impl PayloadRole {
    pub fn too_large_message(self) -> Message {
        match self {
            Self::Product => Message::ProductImageTooLarge,
            Self::StyleReference => Message::StyleReferenceTooLarge,
            Self::Image => Message::ImageTooLarge,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::StyleReference => "style_reference",
            Self::Image => "image",
        }
    }
}

/// Why an edit produced no image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditFailure {
    /// Local ceiling check; the request never left the process.
    PayloadTooLarge(PayloadRole),
    /// The remote call raised and was classified.
    Service(ErrorCategory),
    /// The call succeeded but carried no inline image part.
    NoImageReturned,
}

impl EditFailure {
    /// Failures worth another identical attempt. Rejected keys, oversized
    /// payloads, and malformed requests fail the same way every time.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NoImageReturned
                | Self::Service(ErrorCategory::Quota)
                | Self::Service(ErrorCategory::Generic)
        )
    }

    pub fn kind(self) -> &'static str {
        match self {
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Service(category) => category.name(),
            Self::NoImageReturned => "no_image_returned",
        }
    }
}

/// Outcome of one edit call. `image` is `None` exactly when `message` and
/// `failure` are set; the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    image: Option<ImagePayload>,
    message: Option<String>,
    failure: Option<EditFailure>,
}

impl EditResult {
    pub fn success(image: ImagePayload) -> Self {
        Self {
            image: Some(image),
            message: None,
            failure: None,
        }
    }

    pub fn failure(failure: EditFailure, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            Message::NoImageFromAi.text()
        } else {
            message
        };
        Self {
            image: None,
            message: Some(message),
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub fn into_image(self) -> Option<ImagePayload> {
        self.image
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn failure_kind(&self) -> Option<EditFailure> {
        self.failure
    }
}
