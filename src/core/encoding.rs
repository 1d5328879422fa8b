// orderlog-watcher - core/encoding.rs
//
// Single-byte codec used to decode raw log-line bytes. The upstream
// processors write 8-bit Cyrillic text (cp1251-class encodings); UTF-8
// is never assumed by default.

use encoding_rs::Encoding;

/// A named, resolved single-byte (or UTF-8) text codec.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    name: String,
    encoding: &'static Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub reason: String,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for DecodeError {}

impl LineDecoder {
    /// Resolves a configured encoding name (e.g. `windows-1251`, `utf-8`)
    /// to a codec. Falls back to the default 8-bit Cyrillic codec for an
    /// unrecognised name rather than failing startup.
    pub fn resolve(name: &str) -> Self {
        let encoding = Encoding::for_label(name.as_bytes())
            .unwrap_or_else(|| {
                Encoding::for_label(super::super::util::constants::DEFAULT_LINE_ENCODING.as_bytes())
                    .expect("default line encoding name must be a valid encoding_rs label")
            });
        LineDecoder {
            name: name.to_string(),
            encoding,
        }
    }

    pub fn default_codec() -> Self {
        Self::resolve(super::super::util::constants::DEFAULT_LINE_ENCODING)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decodes one line's raw bytes. Never panics; malformed input is
    /// reported as a `DecodeError` the caller turns into a `{exception}`
    /// `LogItem` rather than a silent lossy replacement.
    pub fn decode_line(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        let (text, _, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            return Err(DecodeError {
                reason: format!(
                    "line contains bytes not representable in {}",
                    self.encoding.name()
                ),
            });
        }
        Ok(text.into_owned())
    }
}
