//! Image file encoding for inline upload
//!
//! This module turns a selected problem photo into base64 data plus its
//! declared media type, ready to be sent as an inline image turn.

use base64::Engine;
use std::path::Path;
use thiserror::Error;

use crate::providers::Turn;

/// Media type used when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Error type for image encoding
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The declared media type is not an image type
    #[error("'{file_name}' is not an image ({media_type}). Please choose a photo of the problem.")]
    UnsupportedMediaType {
        /// Selected file name
        file_name: String,
        /// Media type the file declared
        media_type: String,
    },

    /// The file has no content
    #[error("'{file_name}' is empty")]
    Empty {
        /// Selected file name
        file_name: String,
    },

    /// The file exceeds the inline upload limit
    #[error("'{file_name}' is {size} bytes, over the {limit} byte upload limit")]
    TooLarge {
        /// Selected file name
        file_name: String,
        /// File size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// The file could not be read
    #[error("Could not read '{file_name}': {source}")]
    Io {
        /// Selected file name
        file_name: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// An image ready for inline upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// File name shown to the user
    pub file_name: String,
    /// Declared media type (always `image/*`)
    pub media_type: String,
    /// Base64 (standard alphabet, padded) file content
    pub data: String,
    /// Raw file size in bytes
    pub byte_len: u64,
    /// Pixel dimensions, when the header could be read
    pub dimensions: Option<(u32, u32)>,
}

impl EncodedImage {
    /// Inline image turn carrying this image
    pub fn to_turn(&self) -> Turn {
        Turn::inline_image(self.media_type.clone(), self.data.clone())
    }

    /// One-line description for status output
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::tutor::encoder::EncodedImage;
    ///
    /// let image = EncodedImage {
    ///     file_name: "q1.png".to_string(),
    ///     media_type: "image/png".to_string(),
    ///     data: String::new(),
    ///     byte_len: 2048,
    ///     dimensions: Some((640, 480)),
    /// };
    /// assert_eq!(image.describe(), "q1.png (image/png, 2.0 KiB, 640x480)");
    /// ```
    pub fn describe(&self) -> String {
        let size = if self.byte_len < 1024 {
            format!("{} B", self.byte_len)
        } else if self.byte_len < 1024 * 1024 {
            format!("{:.1} KiB", self.byte_len as f64 / 1024.0)
        } else {
            format!("{:.1} MiB", self.byte_len as f64 / (1024.0 * 1024.0))
        };
        match self.dimensions {
            Some((w, h)) => format!(
                "{} ({}, {}, {}x{})",
                self.file_name, self.media_type, size, w, h
            ),
            None => format!("{} ({}, {})", self.file_name, self.media_type, size),
        }
    }
}

/// Media type declared by a file name's extension
///
/// # Examples
///
/// ```
/// use mathtutor::tutor::encoder::declared_media_type;
/// use std::path::Path;
///
/// assert_eq!(declared_media_type(Path::new("photo.PNG")), Some("image/png"));
/// assert_eq!(declared_media_type(Path::new("notes.txt")), Some("text/plain"));
/// assert_eq!(declared_media_type(Path::new("README")), None);
/// ```
pub fn declared_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let media_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" | "jfif" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(media_type)
}

/// Media type detected from magic bytes, for image formats only
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    use image::ImageFormat;

    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Avif => Some("image/avif"),
        ImageFormat::Ico => Some("image/x-icon"),
        _ => None,
    }
}

/// Whether a media type names an image
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

/// Reads the image header for its pixel dimensions
fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads an image file and returns it base64-encoded with its media type
///
/// The media type comes from the file extension; files without a known
/// extension are sniffed. Anything that does not resolve to `image/*` is
/// rejected.
///
/// # Arguments
///
/// * `path` - The selected file
/// * `max_bytes` - Largest accepted file size
///
/// # Errors
///
/// Returns `EncodeError` if:
/// - The declared media type is not an image type
/// - The file is empty or larger than `max_bytes`
/// - An IO error occurs
///
/// # Examples
///
/// ```no_run
/// use mathtutor::tutor::encoder::encode_image;
/// use std::path::Path;
///
/// let image = tokio::runtime::Runtime::new()
///     .unwrap()
///     .block_on(encode_image(Path::new("problem.png"), 20 * 1024 * 1024))
///     .unwrap();
/// assert_eq!(image.media_type, "image/png");
/// ```
pub async fn encode_image(path: &Path, max_bytes: u64) -> Result<EncodedImage, EncodeError> {
    let file_name = display_name(path);
    let declared = declared_media_type(path);

    if let Some(media_type) = declared {
        if !is_image_media_type(media_type) {
            return Err(EncodeError::UnsupportedMediaType {
                file_name,
                media_type: media_type.to_string(),
            });
        }
    }

    let io_error = |source| EncodeError::Io {
        file_name: file_name.clone(),
        source,
    };

    let size = tokio::fs::metadata(path).await.map_err(io_error)?.len();
    if size > max_bytes {
        return Err(EncodeError::TooLarge {
            file_name,
            size,
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(io_error)?;
    if bytes.is_empty() {
        return Err(EncodeError::Empty { file_name });
    }

    let sniffed = sniff_media_type(&bytes);
    let media_type = declared.or(sniffed).unwrap_or(OCTET_STREAM);
    if !is_image_media_type(media_type) {
        return Err(EncodeError::UnsupportedMediaType {
            file_name,
            media_type: media_type.to_string(),
        });
    }

    if let (Some(declared), Some(sniffed)) = (declared, sniffed) {
        if declared != sniffed {
            tracing::warn!(
                "{} is named as {} but its content looks like {}",
                file_name,
                declared,
                sniffed
            );
        }
    }

    let dimensions = image_dimensions(&bytes);
    tracing::debug!(
        file = %file_name,
        media_type,
        bytes = bytes.len(),
        ?dimensions,
        "Encoded image for upload"
    );

    Ok(EncodedImage {
        file_name,
        media_type: media_type.to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        byte_len: bytes.len() as u64,
        dimensions,
    })
}
