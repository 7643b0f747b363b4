use lazora_contracts::payload::{ImagePayload, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

/// What the view should render. `ReusingBackground` is `Idle` with a prior
/// result queued as the style reference for the next product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    ReusingBackground,
    Processing,
    Success,
    Error,
}

/// Label choice for the submit control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Enhance,
    ApplyStyle,
    ApplyBackground,
}

/// In-memory state of one enhancer view. Only the orchestrator mutates it;
/// front ends read it through the accessors.
#[derive(Debug, Clone)]
pub struct EnhancementSession {
    session_id: String,
    pub(crate) generation: u64,
    pub(crate) product_image: Option<SourceFile>,
    pub(crate) style_reference_image: Option<SourceFile>,
    pub(crate) processing_state: ProcessingState,
    pub(crate) result_image: Option<ImagePayload>,
    pub(crate) error: Option<String>,
    pub(crate) reusable_background: Option<ImagePayload>,
    pub(crate) reusing_background: bool,
    pub(crate) is_upscaling: bool,
    pub(crate) is_upscaled: bool,
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Default for EnhancementSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancementSession {
    pub fn new() -> Self {
        Self::with_id(new_session_id())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            generation: 0,
            product_image: None,
            style_reference_image: None,
            processing_state: ProcessingState::Idle,
            result_image: None,
            error: None,
            reusable_background: None,
            reusing_background: false,
            is_upscaling: false,
            is_upscaled: false,
        }
    }

    /// Back to the initial state. The generation moves forward so results
    /// from work started before the reset are recognized as stale.
    pub(crate) fn reset(&mut self) {
        let next = Self::with_id(self.session_id.clone());
        let generation = self.generation + 1;
        *self = Self { generation, ..next };
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn product_image(&self) -> Option<&SourceFile> {
        self.product_image.as_ref()
    }

    pub fn style_reference_image(&self) -> Option<&SourceFile> {
        self.style_reference_image.as_ref()
    }

    pub fn processing_state(&self) -> ProcessingState {
        self.processing_state
    }

    pub fn result_image(&self) -> Option<&ImagePayload> {
        self.result_image.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn reusable_background(&self) -> Option<&ImagePayload> {
        self.reusable_background.as_ref()
    }

    pub fn is_reusing_background(&self) -> bool {
        self.reusing_background
    }

    pub fn is_upscaling(&self) -> bool {
        self.is_upscaling
    }

    pub fn is_upscaled(&self) -> bool {
        self.is_upscaled
    }

    pub fn can_reuse(&self) -> bool {
        self.reusable_background.is_some()
    }

    /// Triggering controls stay disabled while this is true.
    pub fn is_busy(&self) -> bool {
        self.processing_state == ProcessingState::Processing || self.is_upscaling
    }

    pub fn phase(&self) -> SessionPhase {
        match self.processing_state {
            ProcessingState::Idle if self.reusing_background => SessionPhase::ReusingBackground,
            ProcessingState::Idle => SessionPhase::Idle,
            ProcessingState::Processing => SessionPhase::Processing,
            ProcessingState::Success => SessionPhase::Success,
            ProcessingState::Error => SessionPhase::Error,
        }
    }

    pub fn submit_mode(&self) -> SubmitMode {
        if self.reusing_background {
            SubmitMode::ApplyBackground
        } else if self.style_reference_image.is_some() {
            SubmitMode::ApplyStyle
        } else {
            SubmitMode::Enhance
        }
    }
}
