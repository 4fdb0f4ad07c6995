use image::ImageFormat;

/// Output encoder picked from the source object's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderChoice {
    Png,
    Jpeg,
    Gif,
}

impl EncoderChoice {
    /// Select an encoder for a file extension such as `.PNG`, `jpeg` or `.gif`.
    /// Returns `None` for anything outside the supported raster formats.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }
}

/// Extension of the last path segment of an object URL, including the dot.
/// Query string and fragment are ignored; an empty string means "no extension".
pub fn extension_of(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rfind('.') {
        Some(idx) => &file[idx..],
        None => "",
    }
}
