use lazora_contracts::edits::{EditFailure, EditOperation, EditRequest, EditResult, PayloadRole};
use lazora_contracts::events::{SessionEvent, SessionLog};
use lazora_contracts::messages::{attempt_progress, Message};
use lazora_contracts::payload::{ImagePayload, SourceFile};

use crate::client::EditClient;
use crate::normalizer::{normalize, NormalizerConfig};
use crate::session::{EnhancementSession, ProcessingState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_enhance: bool,
    pub retry_style_transfer: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_enhance: true,
            retry_style_transfer: false,
        }
    }
}

impl RetryPolicy {
    /// Upscaling always gets a single attempt.
    pub fn attempts_for(&self, operation: EditOperation) -> u32 {
        let enabled = match operation {
            EditOperation::Enhance => self.retry_enhance,
            EditOperation::StyleTransfer => self.retry_style_transfer,
            EditOperation::Upscale => false,
        };
        if enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

/// Feature switches for the two enhancer variants: style reference with
/// background reuse, and retry with progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub supports_style_reference: bool,
    pub supports_retry: bool,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            supports_style_reference: true,
            supports_retry: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn style_reference_variant() -> Self {
        Self {
            supports_retry: false,
            ..Self::default()
        }
    }

    pub fn retry_variant() -> Self {
        Self {
            supports_style_reference: false,
            ..Self::default()
        }
    }

    fn attempts_for(&self, operation: EditOperation) -> u32 {
        if self.supports_retry {
            self.retry.attempts_for(operation)
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub operation: EditOperation,
    pub attempt: u32,
    pub max_attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    MissingProductImage,
    Busy,
    ResultPending,
    NoResult,
    AlreadyUpscaled,
    NoReusableBackground,
    Unsupported,
}

impl std::fmt::Display for SubmitRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MissingProductImage => "a product image is required",
            Self::Busy => "another operation is still running",
            Self::ResultPending => "start over or reuse the background before submitting again",
            Self::NoResult => "there is no result image",
            Self::AlreadyUpscaled => "the result is already upscaled",
            Self::NoReusableBackground => "there is no background to reuse",
            Self::Unsupported => "this enhancer does not support style references",
        };
        f.write_str(text)
    }
}

impl std::error::Error for SubmitRejected {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// The session moved on (reset or reuse) after the work started.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReferenceSource {
    None,
    StyleFile(SourceFile),
    ReusedBackground(ImagePayload),
}

/// Inputs captured when a submission enters `Processing`. Owns its data so
/// the remote call can run without borrowing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    generation: u64,
    product: SourceFile,
    reference: ReferenceSource,
}

impl PendingEdit {
    pub fn operation(&self) -> EditOperation {
        match self.reference {
            ReferenceSource::None => EditOperation::Enhance,
            _ => EditOperation::StyleTransfer,
        }
    }

    pub fn reuses_background(&self) -> bool {
        matches!(self.reference, ReferenceSource::ReusedBackground(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpscale {
    generation: u64,
    image: ImagePayload,
}

pub struct Orchestrator<C: EditClient> {
    client: C,
    config: OrchestratorConfig,
    normalizer: NormalizerConfig,
    events: Option<SessionLog>,
}

impl<C: EditClient> Orchestrator<C> {
    pub fn new(client: C, config: OrchestratorConfig) -> Self {
        Self {
            client,
            config,
            normalizer: NormalizerConfig::default(),
            events: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_events(mut self, events: SessionLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// New session keyed like the event log, so both share one id.
    pub fn start_session(&self) -> EnhancementSession {
        let session = match &self.events {
            Some(events) => EnhancementSession::with_id(events.session_id()),
            None => EnhancementSession::new(),
        };
        self.record(session.generation, SessionEvent::SessionStarted);
        session
    }

    pub fn select_product_image(&self, session: &mut EnhancementSession, file: SourceFile) -> bool {
        if session.processing_state == ProcessingState::Processing {
            return false;
        }
        session.product_image = Some(file);
        true
    }

    /// Ignored while processing, while a background is being reused, or when
    /// the variant has no style-reference support.
    pub fn select_style_reference(
        &self,
        session: &mut EnhancementSession,
        file: SourceFile,
    ) -> bool {
        if !self.config.supports_style_reference
            || session.processing_state == ProcessingState::Processing
            || session.reusing_background
        {
            return false;
        }
        session.style_reference_image = Some(file);
        true
    }

    pub fn clear_style_reference(&self, session: &mut EnhancementSession) {
        if session.processing_state != ProcessingState::Processing {
            session.style_reference_image = None;
        }
    }

    /// `Idle`/`Error` -> `Processing`. Without a product image the session
    /// stays where it is and carries the validation message.
    pub fn begin_submit(
        &self,
        session: &mut EnhancementSession,
    ) -> Result<PendingEdit, SubmitRejected> {
        if session.is_busy() {
            return Err(SubmitRejected::Busy);
        }
        if session.processing_state == ProcessingState::Success {
            return Err(SubmitRejected::ResultPending);
        }
        let Some(product) = session.product_image.clone() else {
            session.error = Some(Message::ProductImageRequired.text());
            return Err(SubmitRejected::MissingProductImage);
        };

        let reference = if !self.config.supports_style_reference {
            ReferenceSource::None
        } else if let Some(style) = session.style_reference_image.clone() {
            ReferenceSource::StyleFile(style)
        } else if let Some(background) = session
            .reusable_background
            .clone()
            .filter(|_| session.reusing_background)
        {
            ReferenceSource::ReusedBackground(background)
        } else {
            ReferenceSource::None
        };

        session.processing_state = ProcessingState::Processing;
        session.error = None;
        session.result_image = None;
        session.is_upscaled = false;

        let pending = PendingEdit {
            generation: session.generation,
            product,
            reference,
        };
        self.record(
            pending.generation,
            SessionEvent::EditStarted {
                operation: pending.operation().name(),
                product: pending.product.name.clone(),
                reuses_background: pending.reuses_background(),
            },
        );
        Ok(pending)
    }

    /// Normalizes inputs and runs the selected operation, retrying transient
    /// failures when the policy allows. Does not touch the session.
    pub fn execute(
        &self,
        pending: &PendingEdit,
        progress: &mut dyn FnMut(&Progress),
    ) -> EditResult {
        let generation = pending.generation;
        let product = self.normalized_payload(generation, &pending.product, PayloadRole::Product);
        let request = match &pending.reference {
            ReferenceSource::None => EditRequest::Enhance { product },
            ReferenceSource::StyleFile(style) => EditRequest::StyleTransfer {
                product,
                style_reference: self.normalized_payload(
                    generation,
                    style,
                    PayloadRole::StyleReference,
                ),
            },
            ReferenceSource::ReusedBackground(background) => EditRequest::StyleTransfer {
                product,
                style_reference: background.clone(),
            },
        };
        self.run_with_retries(generation, &request, progress)
    }

    /// Applies a finished edit unless the session has moved on since
    /// `begin_submit`.
    pub fn apply(
        &self,
        session: &mut EnhancementSession,
        pending: PendingEdit,
        result: EditResult,
    ) -> Applied {
        let operation = pending.operation();
        if session.generation != pending.generation
            || session.processing_state != ProcessingState::Processing
        {
            self.record(
                session.generation,
                SessionEvent::EditDiscarded {
                    operation: operation.name(),
                    started_generation: pending.generation,
                },
            );
            return Applied::Discarded;
        }

        let event = outcome_event(operation, &result);
        let message = result.message().map(str::to_string);
        match result.into_image() {
            Some(image) => {
                if operation == EditOperation::Enhance {
                    session.reusable_background = Some(image.clone());
                }
                session.result_image = Some(image);
                session.processing_state = ProcessingState::Success;
            }
            None => {
                session.error = Some(message.unwrap_or_else(|| Message::NoImageFromAi.text()));
                session.processing_state = ProcessingState::Error;
            }
        }
        self.record(session.generation, event);
        Applied::Applied
    }

    pub fn submit(
        &self,
        session: &mut EnhancementSession,
        progress: &mut dyn FnMut(&Progress),
    ) -> Result<Applied, SubmitRejected> {
        let pending = self.begin_submit(session)?;
        let result = self.execute(&pending, progress);
        Ok(self.apply(session, pending, result))
    }

    /// Starts the upscale sub-flow. `processing_state` stays `Success`.
    pub fn begin_upscale(
        &self,
        session: &mut EnhancementSession,
    ) -> Result<PendingUpscale, SubmitRejected> {
        if session.is_busy() {
            return Err(SubmitRejected::Busy);
        }
        let image = match (&session.processing_state, &session.result_image) {
            (ProcessingState::Success, Some(image)) => image.clone(),
            _ => return Err(SubmitRejected::NoResult),
        };
        if session.is_upscaled {
            return Err(SubmitRejected::AlreadyUpscaled);
        }
        session.is_upscaling = true;
        session.error = None;
        self.record(
            session.generation,
            SessionEvent::UpscaleStarted {
                fingerprint: image.fingerprint(),
            },
        );
        Ok(PendingUpscale {
            generation: session.generation,
            image,
        })
    }

    pub fn execute_upscale(&self, pending: &PendingUpscale) -> EditResult {
        self.client.upscale(&pending.image)
    }

    pub fn apply_upscale(
        &self,
        session: &mut EnhancementSession,
        pending: PendingUpscale,
        result: EditResult,
    ) -> Applied {
        if session.generation != pending.generation || !session.is_upscaling {
            self.record(
                session.generation,
                SessionEvent::EditDiscarded {
                    operation: EditOperation::Upscale.name(),
                    started_generation: pending.generation,
                },
            );
            return Applied::Discarded;
        }
        session.is_upscaling = false;
        let event = SessionEvent::UpscaleFinished {
            failure: result.failure_kind().map(EditFailure::kind),
            fingerprint: result.image().map(ImagePayload::fingerprint),
        };
        let message = result.message().map(str::to_string);
        match result.into_image() {
            Some(image) => {
                session.result_image = Some(image);
                session.is_upscaled = true;
            }
            None => {
                let fallback = Message::NoUpscaledImageFromAi;
                session.error = Some(message.unwrap_or_else(|| fallback.text()));
            }
        }
        self.record(session.generation, event);
        Applied::Applied
    }

    pub fn upscale(&self, session: &mut EnhancementSession) -> Result<Applied, SubmitRejected> {
        let pending = self.begin_upscale(session)?;
        let result = self.execute_upscale(&pending);
        Ok(self.apply_upscale(session, pending, result))
    }

    /// `Success` -> `ReusingBackground`: the last plain-enhance result becomes
    /// the style reference for the next product.
    pub fn use_background(&self, session: &mut EnhancementSession) -> Result<(), SubmitRejected> {
        if !self.config.supports_style_reference {
            return Err(SubmitRejected::Unsupported);
        }
        if session.processing_state == ProcessingState::Processing {
            return Err(SubmitRejected::Busy);
        }
        let Some(background) = session.reusable_background.as_ref() else {
            return Err(SubmitRejected::NoReusableBackground);
        };
        let fingerprint = background.fingerprint();
        session.generation += 1;
        session.reusing_background = true;
        session.product_image = None;
        session.style_reference_image = None;
        session.result_image = None;
        session.error = None;
        session.processing_state = ProcessingState::Idle;
        session.is_upscaled = false;
        session.is_upscaling = false;
        self.record(
            session.generation,
            SessionEvent::BackgroundReused { fingerprint },
        );
        Ok(())
    }

    pub fn cancel_reuse(&self, session: &mut EnhancementSession) {
        if session.processing_state != ProcessingState::Processing {
            session.reusing_background = false;
        }
    }

    pub fn start_over(&self, session: &mut EnhancementSession) {
        session.reset();
        self.record(session.generation, SessionEvent::SessionReset);
    }

    fn normalized_payload(
        &self,
        generation: u64,
        file: &SourceFile,
        role: PayloadRole,
    ) -> ImagePayload {
        let normalized = normalize(file, &self.normalizer);
        if let Some(reason) = &normalized.fallback {
            self.record(
                generation,
                SessionEvent::NormalizeFallback {
                    role: role.name(),
                    file: file.name.clone(),
                    reason: reason.to_string(),
                },
            );
        }
        normalized.payload
    }

    fn run_with_retries(
        &self,
        generation: u64,
        request: &EditRequest,
        progress: &mut dyn FnMut(&Progress),
    ) -> EditResult {
        let operation = request.operation();
        let max_attempts = self.config.attempts_for(operation);
        let mut attempt = 1;
        loop {
            if max_attempts > 1 {
                progress(&Progress {
                    operation,
                    attempt,
                    max_attempts,
                    message: attempt_progress(attempt, max_attempts),
                });
            }
            self.record(
                generation,
                SessionEvent::EditAttempt {
                    operation: operation.name(),
                    attempt,
                    max_attempts,
                },
            );
            let result = self.client.edit(request);
            let retry = result.failure_kind().is_some_and(EditFailure::is_retryable);
            if !retry || attempt >= max_attempts {
                return result;
            }
            self.record(
                generation,
                SessionEvent::EditFailed {
                    operation: operation.name(),
                    failure: result.failure_kind().map(EditFailure::kind),
                    retrying: true,
                },
            );
            attempt += 1;
        }
    }

    fn record(&self, generation: u64, event: SessionEvent) {
        if let Some(events) = &self.events {
            // Event log is diagnostic; a failed write must not alter session state.
            let _ = events.record(generation, &event);
        }
    }
}

/// Final event for an applied edit. Carries the image fingerprint, never the
/// image data.
fn outcome_event(operation: EditOperation, result: &EditResult) -> SessionEvent {
    match result.image() {
        Some(image) => SessionEvent::EditSucceeded {
            operation: operation.name(),
            mime_type: image.mime_type.clone(),
            fingerprint: image.fingerprint(),
            bytes: image.estimated_decoded_len(),
        },
        None => SessionEvent::EditFailed {
            operation: operation.name(),
            failure: result.failure_kind().map(EditFailure::kind),
            retrying: false,
        },
    }
}
