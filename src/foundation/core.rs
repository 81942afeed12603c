use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;

use crate::foundation::error::{MemoraError, MemoraResult};

/// Raster formats accepted as uploads.
pub const ACCEPTED_UPLOAD_FORMATS: [image::ImageFormat; 6] = [
    image::ImageFormat::Png,
    image::ImageFormat::Jpeg,
    image::ImageFormat::WebP,
    image::ImageFormat::Gif,
    image::ImageFormat::Bmp,
    image::ImageFormat::Tiff,
];

/// Encoded raster data plus its MIME type.
///
/// Serialized as a `data:<mime>;base64,<payload>` URL so stored history stays readable by
/// anything that understands data URLs.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime: String,
    bytes: Vec<u8>,
}

impl EncodedImage {
    /// Wrap bytes with an explicit MIME type.
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Wrap PNG bytes.
    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new("image/png", bytes)
    }

    /// Wrap bytes, detecting the MIME type from the content.
    pub fn sniff(bytes: Vec<u8>) -> MemoraResult<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|e| MemoraError::image(format!("unrecognized image data: {e}")))?;
        Ok(Self::new(format.to_mime_type(), bytes))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 encoding of the raw bytes.
    pub fn base64_payload(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Decode a base64 payload received alongside a MIME type.
    pub fn from_base64(mime: impl Into<String>, payload: &str) -> MemoraResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| MemoraError::validation(format!("invalid base64 image payload: {e}")))?;
        Ok(Self::new(mime, bytes))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64_payload())
    }

    /// Parse `data:<mime>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> MemoraResult<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| MemoraError::validation("data url must start with 'data:'"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| MemoraError::validation("data url is missing ','"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| MemoraError::validation("data url must be base64 encoded"))?;
        if !mime.starts_with("image/") {
            return Err(MemoraError::validation(format!(
                "data url is not an image: '{mime}'"
            )));
        }
        Self::from_base64(mime, payload)
    }

    /// Detected container format, if the bytes are a known raster format.
    pub fn format(&self) -> Option<image::ImageFormat> {
        image::guess_format(&self.bytes).ok()
    }

    /// Pixel dimensions read from the encoded header.
    pub fn dimensions(&self) -> MemoraResult<(u32, u32)> {
        let reader = image::ImageReader::new(std::io::Cursor::new(&self.bytes))
            .with_guessed_format()
            .map_err(|e| MemoraError::image(e.to_string()))?;
        Ok(reader.into_dimensions()?)
    }

    pub fn decode(&self) -> MemoraResult<image::DynamicImage> {
        Ok(image::load_from_memory(&self.bytes)?)
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl serde::Serialize for EncodedImage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> serde::Deserialize<'de> for EncodedImage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_data_url(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque, time-derived restoration identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Mint an id from epoch milliseconds.
    ///
    /// `seq > 0` appends a suffix so ids minted within the same millisecond stay distinct.
    pub fn from_millis(ms: i64, seq: u32) -> Self {
        if seq == 0 {
            Self(ms.to_string())
        } else {
            Self(format!("{ms}-{seq}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
