use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use lazora_contracts::messages::Message;
use lazora_contracts::payload::SourceFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    #[default]
    Webp,
    Jpeg,
    Png,
}

impl TargetFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// Accepts a bare format name or a MIME type.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let name = normalized.strip_prefix("image/").unwrap_or(&normalized);
        match name {
            "webp" => Some(Self::Webp),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub format: TargetFormat,
    /// JPEG quality. WebP and PNG are written lossless.
    pub quality: u8,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: TargetFormat::default(),
            quality: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub original_size: usize,
    pub new_size: usize,
}

impl ConvertedFile {
    /// Percentage saved relative to the original; 0 when the file grew.
    pub fn size_reduction_pct(&self) -> f64 {
        if self.original_size == 0 || self.new_size >= self.original_size {
            return 0.0;
        }
        let saved = (self.original_size - self.new_size) as f64;
        saved * 100.0 / self.original_size as f64
    }
}

pub fn convert_image(file: &SourceFile, options: &ConvertOptions) -> Result<ConvertedFile> {
    let decoded = image::load_from_memory(&file.bytes)
        .with_context(|| format!("failed to decode {}", file.name))?;
    let bytes = encode(&decoded, options).with_context(|| {
        format!(
            "failed to encode {} as {}",
            file.name,
            options.format.extension()
        )
    })?;
    Ok(ConvertedFile {
        name: format!("{}.{}", file.stem(), options.format.extension()),
        mime_type: options.format.mime_type(),
        original_size: file.size(),
        new_size: bytes.len(),
        bytes,
    })
}

fn encode(image: &DynamicImage, options: &ConvertOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match options.format {
        TargetFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, options.quality.clamp(1, 100))
                .encode_image(&rgb)?;
        }
        TargetFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
        }
        TargetFormat::Png => {
            image.write_with_encoder(PngEncoder::new(&mut out))?;
        }
    }
    Ok(out)
}

/// Converts every file or none. Files run on scoped threads; results keep
/// input order.
pub fn convert_batch(files: &[SourceFile], options: &ConvertOptions) -> Result<Vec<ConvertedFile>> {
    if files.is_empty() {
        bail!(Message::AtLeastOneImage.text());
    }
    std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| scope.spawn(move || convert_image(file, options)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("conversion worker panicked"))?
            })
            .collect::<Result<Vec<_>>>()
    })
    .with_context(|| Message::ConversionFailed.text())
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
