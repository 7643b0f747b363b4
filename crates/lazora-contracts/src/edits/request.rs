use crate::payload::ImagePayload;

use super::result::PayloadRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOperation {
    Enhance,
    StyleTransfer,
    Upscale,
}

impl EditOperation {
    pub fn name(self) -> &'static str {
        match self {
            Self::Enhance => "enhance",
            Self::StyleTransfer => "style_transfer",
            Self::Upscale => "upscale",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Enhance => ENHANCE_PROMPT,
            Self::StyleTransfer => STYLE_TRANSFER_PROMPT,
            Self::Upscale => UPSCALE_PROMPT,
        }
    }
}

/// One call to the remote edit capability. Image order is significant: the
/// product always comes before the style reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    Enhance {
        product: ImagePayload,
    },
    StyleTransfer {
        product: ImagePayload,
        style_reference: ImagePayload,
    },
    Upscale {
        image: ImagePayload,
    },
}

impl EditRequest {
    pub fn operation(&self) -> EditOperation {
        match self {
            Self::Enhance { .. } => EditOperation::Enhance,
            Self::StyleTransfer { .. } => EditOperation::StyleTransfer,
            Self::Upscale { .. } => EditOperation::Upscale,
        }
    }

    pub fn prompt(&self) -> &'static str {
        self.operation().prompt()
    }

    /// Inputs in request order, tagged with the role used for size checks.
    pub fn inputs(&self) -> Vec<(PayloadRole, &ImagePayload)> {
        match self {
            Self::Enhance { product } => vec![(PayloadRole::Product, product)],
            Self::StyleTransfer {
                product,
                style_reference,
            } => vec![
                (PayloadRole::Product, product),
                (PayloadRole::StyleReference, style_reference),
            ],
            Self::Upscale { image } => vec![(PayloadRole::Image, image)],
        }
    }

    pub fn images(&self) -> Vec<&ImagePayload> {
        self.inputs().into_iter().map(|(_, image)| image).collect()
    }
}

const ENHANCE_PROMPT: &str = "\
You are a professional product photo editor. Turn the attached product photo into a polished, social-media-ready image.

THE PRODUCT IS UNTOUCHABLE: do not modify, retouch, recolor, or redraw the product in any way. Keep every detail, pattern, and piece of text or calligraphy on it exactly as it is.

Steps:
1. Identify the product and cut it out cleanly from its original background.
2. Generate a new, elegant background that complements the product (minimal, soft-focus, or occasion-themed such as a wedding table).
3. Place the original, unaltered product onto the new background.
4. Adjust global lighting and shadows so the product sits naturally in the scene, without changing the product's own colors or details.

OUTPUT: return exactly ONE image part: the finished composite of the product on its new background, in a square 1:1 aspect ratio.";

const STYLE_TRANSFER_PROMPT: &str = "\
You are a professional product photo editor performing a product swap. You receive two images:
- Image 1: the NEW product.
- Image 2: a style reference scene that shows an OLD product on a finished background.

Replace the old product in Image 2 with the new product from Image 1.

THE NEW PRODUCT IS UNTOUCHABLE: do not modify, retouch, recolor, or redraw the product from Image 1 in any way.

Steps:
1. Find the new product in Image 1 and the old product in Image 2.
2. Remove the old product from Image 2, keeping only its background, props, and atmosphere.
3. Place the unaltered new product from Image 1 into that background.
4. Adjust global lighting and shadows so the new product looks natural in the scene, keeping the reference's background and lighting.

OUTPUT:
- The result MUST contain the new product from Image 1.
- The result MUST NOT contain the old product from Image 2.
- The result MUST NOT be identical to Image 2.
- Return one high-quality, square 1:1 composite image.";

const UPSCALE_PROMPT: &str = "\
You are a professional image upscaler. Increase the resolution and fine detail of the attached image.

DO NOT CHANGE THE IMAGE: content, composition, colors, and style must stay identical. Only the resolution, sharpness, and clarity improve.

Steps:
1. Analyze the input image.
2. Re-render it at a significantly higher resolution, adding plausible texture and edge detail.
3. Keep the result a crisp, faithful version of the original.

OUTPUT:
- Return exactly one high-resolution image part.
- Do not add any text or extra elements.
- Preserve the original aspect ratio.";
