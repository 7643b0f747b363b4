/// Display language for user-facing text. Arabic is the default UI language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    En,
    #[default]
    Ar,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "ar" | "arabic" => Some(Self::Ar),
            _ => None,
        }
    }
}

/// Every fixed user-facing string the engine can surface.
///
/// `text()` is the pre-localized bilingual form (English line, then Arabic
/// line). It is what lands in `EditResult::message` and the session error, so
/// a front end can show it without a translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    QuotaExceeded,
    AuthFailed,
    PayloadTooLarge,
    BadRequest,
    BadRequestMedia,
    ServiceFailed,
    ProductImageTooLarge,
    StyleReferenceTooLarge,
    ImageTooLarge,
    ProductImageRequired,
    NoImageFromAi,
    NoUpscaledImageFromAi,
    InvalidImageData,
    AtLeastOneImage,
    ConversionFailed,
}

impl Message {
    pub const ALL: [Message; 15] = [
        Self::QuotaExceeded,
        Self::AuthFailed,
        Self::PayloadTooLarge,
        Self::BadRequest,
        Self::BadRequestMedia,
        Self::ServiceFailed,
        Self::ProductImageTooLarge,
        Self::StyleReferenceTooLarge,
        Self::ImageTooLarge,
        Self::ProductImageRequired,
        Self::NoImageFromAi,
        Self::NoUpscaledImageFromAi,
        Self::InvalidImageData,
        Self::AtLeastOneImage,
        Self::ConversionFailed,
    ];

    pub fn english(self) -> &'static str {
        self.pair().0
    }

    pub fn arabic(self) -> &'static str {
        self.pair().1
    }

    pub fn localized(self, language: Language) -> &'static str {
        match language {
            Language::En => self.english(),
            Language::Ar => self.arabic(),
        }
    }

    pub fn text(self) -> String {
        let (en, ar) = self.pair();
        format!("{en}\n{ar}")
    }

    fn pair(self) -> (&'static str, &'static str) {
        match self {
            Self::QuotaExceeded => (
                "The AI service quota has been reached. Please wait a minute and try again.",
                "تم الوصول إلى حد الاستخدام لخدمة الذكاء الاصطناعي. يرجى الانتظار دقيقة ثم المحاولة مرة أخرى.",
            ),
            Self::AuthFailed => (
                "The AI service rejected the API key. Please check the key and its permissions.",
                "رفضت خدمة الذكاء الاصطناعي مفتاح الواجهة البرمجية. يرجى التحقق من المفتاح وصلاحياته.",
            ),
            Self::PayloadTooLarge => (
                "The image is too large for the AI service. Please use a smaller image.",
                "الصورة كبيرة جداً بالنسبة لخدمة الذكاء الاصطناعي. يرجى استخدام صورة أصغر.",
            ),
            Self::BadRequest => (
                "The AI service could not process this request. Please try again.",
                "تعذر على خدمة الذكاء الاصطناعي معالجة هذا الطلب. يرجى المحاولة مرة أخرى.",
            ),
            Self::BadRequestMedia => (
                "The AI service could not read this image. Please try a different JPEG or PNG image.",
                "تعذر على خدمة الذكاء الاصطناعي قراءة هذه الصورة. يرجى تجربة صورة أخرى بصيغة JPEG أو PNG.",
            ),
            Self::ServiceFailed => (
                "Something went wrong while contacting the AI service. Please try again.",
                "حدث خطأ أثناء الاتصال بخدمة الذكاء الاصطناعي. يرجى المحاولة مرة أخرى.",
            ),
            Self::ProductImageTooLarge => (
                "The product image is over the upload size limit. Please upload a smaller image.",
                "صورة المنتج تتجاوز الحد المسموح لحجم الرفع. يرجى رفع صورة أصغر.",
            ),
            Self::StyleReferenceTooLarge => (
                "The style reference image is over the upload size limit. Please upload a smaller image.",
                "صورة النمط المرجعية تتجاوز الحد المسموح لحجم الرفع. يرجى رفع صورة أصغر.",
            ),
            Self::ImageTooLarge => (
                "The image is over the upload size limit and cannot be upscaled.",
                "الصورة تتجاوز الحد المسموح لحجم الرفع ولا يمكن رفع دقتها.",
            ),
            Self::ProductImageRequired => (
                "Please upload a product image first.",
                "يرجى رفع صورة المنتج أولاً.",
            ),
            Self::NoImageFromAi => (
                "The AI did not return an image. Please try again.",
                "لم يُرجع الذكاء الاصطناعي أي صورة. يرجى المحاولة مرة أخرى.",
            ),
            Self::NoUpscaledImageFromAi => (
                "The AI did not return an upscaled image. Please try again.",
                "لم يُرجع الذكاء الاصطناعي صورة بدقة أعلى. يرجى المحاولة مرة أخرى.",
            ),
            Self::InvalidImageData => (
                "The stored image data is invalid.",
                "بيانات الصورة المحفوظة غير صالحة.",
            ),
            Self::AtLeastOneImage => (
                "Please select at least one image to convert.",
                "يرجى اختيار صورة واحدة على الأقل للتحويل.",
            ),
            Self::ConversionFailed => (
                "The conversion failed. Please try again.",
                "فشل التحويل. يرجى المحاولة مرة أخرى.",
            ),
        }
    }
}

/// Progress line shown while a retry-enabled edit runs: "attempt N of M".
pub fn attempt_progress(attempt: u32, max_attempts: u32) -> String {
    format!(
        "Processing, attempt {attempt} of {max_attempts}…\nجارٍ المعالجة، المحاولة {attempt} من {max_attempts}…"
    )
}
