//! MIME type lookup by file extension

use std::path::Path;

use lettre::message::header::ContentType;

use super::MailError;

/// MIME type used when the extension is not known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Looks up the MIME type for a file extension, without the leading dot.
/// Case insensitive.
pub fn mime_by_extension(extension: &str) -> Option<&'static str> {
    mime_guess::from_ext(&extension.to_ascii_lowercase()).first_raw()
}

/// MIME type for a file name, from its extension. Falls back to
/// [`OCTET_STREAM`] when there is no extension or it is not known.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_by_extension)
        .unwrap_or(OCTET_STREAM)
}

/// Checks that a caller supplied MIME type parses, returning it trimmed.
pub fn parse_mime_type(raw: &str) -> Result<String, MailError> {
    let trimmed = raw.trim();

    ContentType::parse(trimmed).map_err(|_| MailError::UnknownMimeType(raw.to_string()))?;

    Ok(trimmed.to_string())
}
