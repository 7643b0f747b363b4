use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use lazora_contracts::payload::{ImagePayload, SourceFile};

pub const CANONICAL_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerConfig {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    Decode(String),
    Encode(String),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(message) => write!(f, "image decode failed: {message}"),
            Self::Encode(message) => write!(f, "image encode failed: {message}"),
        }
    }
}

impl std::error::Error for NormalizeError {}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
}

/// Normalizer output. `fallback` is set when re-encoding failed and the
/// payload carries the original bytes instead.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub payload: ImagePayload,
    pub dimensions: Option<(u32, u32)>,
    pub fallback: Option<NormalizeError>,
}

/// Best-effort normalization: re-encode when possible, otherwise ship the
/// original bytes and let the payload ceiling decide downstream.
pub fn normalize(file: &SourceFile, config: &NormalizerConfig) -> Normalized {
    match reencode(&file.bytes, config) {
        Ok(encoded) => Normalized {
            payload: ImagePayload::from_bytes(&encoded.bytes, encoded.mime_type),
            dimensions: Some((encoded.width, encoded.height)),
            fallback: None,
        },
        Err(err) => Normalized {
            payload: ImagePayload::from_bytes(&file.bytes, file.mime_type.clone()),
            dimensions: None,
            fallback: Some(err),
        },
    }
}

/// Decodes, bounds the longest side, and always re-encodes as JPEG.
pub fn reencode(bytes: &[u8], config: &NormalizerConfig) -> Result<EncodedImage, NormalizeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| NormalizeError::Decode(err.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(NormalizeError::Decode("image has no pixels".to_string()));
    }
    let (target_w, target_h) = bounded_dimensions(width, height, config.max_dimension);
    let flattened = flatten_onto_white(&decoded);
    drop(decoded);
    let resized = if (target_w, target_h) == (width, height) {
        flattened
    } else {
        DynamicImage::ImageRgb8(flattened)
            .resize_exact(target_w, target_h, FilterType::Triangle)
            .to_rgb8()
    };

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, config.jpeg_quality.clamp(1, 100));
    encoder
        .encode_image(&resized)
        .map_err(|err| NormalizeError::Encode(err.to_string()))?;

    Ok(EncodedImage {
        bytes: out,
        width: target_w,
        height: target_h,
        mime_type: CANONICAL_MIME,
    })
}

/// Scales so the larger side equals `max_dimension`. Never upscales.
pub fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let scale = |side: u32, longest: u32| -> u32 {
        let scaled = (f64::from(side) * f64::from(max_dimension) / f64::from(longest)).round();
        (scaled as u32).clamp(1, max_dimension)
    };
    if width > height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(
            x,
            y,
            Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]),
        );
    }
    flattened
}
