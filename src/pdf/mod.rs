//! PDF text extraction for chat context.
//!
//! The extraction itself is a direct call into `pdf-extract`; callers that
//! sit on the async runtime run it under `spawn_blocking`. Input validation
//! keeps each malformed-input case distinct so callers and logs can tell a
//! bad upload apart from a parser failure.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug)]
pub enum PdfError {
    /// The data URI does not carry the PDF media-type prefix.
    InvalidDataUri,
    /// No `;base64,` marker after the media type.
    MissingBase64Marker,
    /// The payload after the marker is empty.
    EmptyData,
    /// The payload is not valid base64.
    DecodeFailed(base64::DecodeError),
    /// Decoding succeeded but produced zero bytes.
    EmptyBuffer,
    /// The parser could not extract text from the decoded bytes.
    ParseFailed(String),
}

impl std::fmt::Display for PdfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfError::InvalidDataUri => write!(f, "invalid PDF data URI format"),
            PdfError::MissingBase64Marker => write!(f, "data URI is missing the base64 marker"),
            PdfError::EmptyData => write!(f, "empty PDF data in URI"),
            PdfError::DecodeFailed(err) => write!(f, "failed to decode PDF base64: {err}"),
            PdfError::EmptyBuffer => write!(f, "empty PDF buffer after base64 decoding"),
            PdfError::ParseFailed(detail) => write!(f, "failed to extract text from PDF: {detail}"),
        }
    }
}

impl std::error::Error for PdfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PdfError::DecodeFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// Decode a `data:application/pdf;base64,...` URI and extract its text.
/// Format problems are reported before any decode or parse work happens.
pub fn extract_text_from_data_uri(data_uri: &str) -> Result<String, PdfError> {
    if !data_uri.starts_with(PDF_DATA_URI_PREFIX) {
        if data_uri.starts_with("data:application/pdf") && !data_uri.contains(BASE64_MARKER) {
            return Err(PdfError::MissingBase64Marker);
        }
        return Err(PdfError::InvalidDataUri);
    }

    let payload = &data_uri[PDF_DATA_URI_PREFIX.len()..];
    if payload.is_empty() {
        return Err(PdfError::EmptyData);
    }

    let buffer = BASE64.decode(payload).map_err(PdfError::DecodeFailed)?;
    if buffer.is_empty() {
        return Err(PdfError::EmptyBuffer);
    }

    extract_text_from_buffer(&buffer)
}

/// Page-concatenated plain text of a PDF held in memory.
pub fn extract_text_from_buffer(buffer: &[u8]) -> Result<String, PdfError> {
    if buffer.is_empty() {
        return Err(PdfError::EmptyBuffer);
    }

    pdf_extract::extract_text_from_mem(buffer)
        .map(|text| text.trim().to_string())
        .map_err(|err| PdfError::ParseFailed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_data_uri() {
        let err = extract_text_from_data_uri("data:image/png;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, PdfError::InvalidDataUri));
    }

    #[test]
    fn rejects_plain_text_input() {
        let err = extract_text_from_data_uri("definitely not a data uri").unwrap_err();
        assert!(matches!(err, PdfError::InvalidDataUri));
    }

    #[test]
    fn reports_missing_base64_marker() {
        let err = extract_text_from_data_uri("data:application/pdf,rawbytes").unwrap_err();
        assert!(matches!(err, PdfError::MissingBase64Marker));
    }

    #[test]
    fn reports_empty_payload() {
        let err = extract_text_from_data_uri("data:application/pdf;base64,").unwrap_err();
        assert!(matches!(err, PdfError::EmptyData));
    }

    #[test]
    fn reports_invalid_base64() {
        let err = extract_text_from_data_uri("data:application/pdf;base64,!!!!").unwrap_err();
        assert!(matches!(err, PdfError::DecodeFailed(_)));
    }

    #[test]
    fn reports_empty_buffer_for_raw_input() {
        let err = extract_text_from_buffer(&[]).unwrap_err();
        assert!(matches!(err, PdfError::EmptyBuffer));
    }

    #[test]
    fn garbage_bytes_fail_as_parse_error() {
        let err = extract_text_from_buffer(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, PdfError::ParseFailed(_)));
    }
}
