use std::borrow::Cow;

use encoding_rs::Encoding;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("unknown encoding label `{0}`")]
    UnknownEncoding(String),
}

/// Decodes raw file bytes with the named encoding.
///
/// A leading byte order mark wins over the label. Malformed sequences are
/// replaced rather than rejected so the lexer always gets text.
pub fn decode<'a>(bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>, SourceError> {
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| SourceError::UnknownEncoding(label.to_string()))?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "source contains malformed byte sequences");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_latin1() {
        let text = decode(b"<?php echo '\xe9';", "ISO-8859-1").unwrap();
        assert_eq!(text, "<?php echo 'é';");
    }

    #[test]
    fn rejects_unknown_label() {
        assert_eq!(
            decode(b"", "klingon"),
            Err(SourceError::UnknownEncoding("klingon".to_string()))
        );
    }
}
