use lazora_contracts::edits::{classify_service_error, EditFailure, EditRequest, EditResult};
use lazora_contracts::messages::Message;
use lazora_contracts::payload::{ImagePayload, DEFAULT_PAYLOAD_CEILING_BYTES};

use crate::transport::{EditTransport, GenerateRequest, GenerateResponse, Modality, ResponsePart};

const DEFAULT_RESULT_MIME: &str = "image/jpeg";

/// The three edit operations. Implementations never panic or raise; every
/// outcome is an `EditResult`.
pub trait EditClient: Send + Sync {
    fn edit(&self, request: &EditRequest) -> EditResult;

    fn enhance(&self, product: &ImagePayload) -> EditResult {
        self.edit(&EditRequest::Enhance {
            product: product.clone(),
        })
    }

    fn apply_style_from_reference(
        &self,
        product: &ImagePayload,
        style_reference: &ImagePayload,
    ) -> EditResult {
        self.edit(&EditRequest::StyleTransfer {
            product: product.clone(),
            style_reference: style_reference.clone(),
        })
    }

    fn upscale(&self, image: &ImagePayload) -> EditResult {
        self.edit(&EditRequest::Upscale {
            image: image.clone(),
        })
    }
}

pub struct RemoteEditClient<T: EditTransport> {
    transport: T,
    model: String,
    payload_ceiling_bytes: usize,
}

impl<T: EditTransport> RemoteEditClient<T> {
    pub fn new(transport: T, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            payload_ceiling_bytes: DEFAULT_PAYLOAD_CEILING_BYTES,
        }
    }

    pub fn with_payload_ceiling(mut self, ceiling_bytes: usize) -> Self {
        self.payload_ceiling_bytes = ceiling_bytes;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl<T: EditTransport> EditClient for RemoteEditClient<T> {
    fn edit(&self, request: &EditRequest) -> EditResult {
        for (role, image) in request.inputs() {
            if image.exceeds(self.payload_ceiling_bytes) {
                return EditResult::failure(
                    EditFailure::PayloadTooLarge(role),
                    role.too_large_message().text(),
                );
            }
        }

        let generate = GenerateRequest {
            model: self.model.clone(),
            images: request.images().into_iter().cloned().collect(),
            prompt: request.prompt().to_string(),
            response_modalities: vec![Modality::Image, Modality::Text],
        };
        match self.transport.generate(&generate) {
            Ok(response) => extract_result(&response, no_image_message(request)),
            Err(err) => {
                let category = classify_service_error(&err);
                EditResult::failure(EditFailure::Service(category), category.message().text())
            }
        }
    }
}

fn no_image_message(request: &EditRequest) -> Message {
    match request {
        EditRequest::Upscale { .. } => Message::NoUpscaledImageFromAi,
        _ => Message::NoImageFromAi,
    }
}

/// First inline image anywhere in the response wins; otherwise the first text
/// part becomes the message; otherwise the fixed no-image message.
pub fn extract_result(response: &GenerateResponse, no_image: Message) -> EditResult {
    let mut first_text: Option<&str> = None;
    for part in response
        .candidates
        .iter()
        .flat_map(|candidate| candidate.parts.iter())
    {
        match part {
            ResponsePart::InlineImage { data, mime_type } => {
                let mime_type = mime_type
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or(DEFAULT_RESULT_MIME);
                return EditResult::success(ImagePayload::new(data.clone(), mime_type));
            }
            ResponsePart::Text(text) => {
                if first_text.is_none() {
                    first_text = Some(text.as_str());
                }
            }
        }
    }
    let message = first_text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| no_image.text());
    EditResult::failure(EditFailure::NoImageReturned, message)
}
