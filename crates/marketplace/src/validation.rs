//! Input normalization shared by the JSON handlers and the CSV importer.
//!
//! Every helper trims its input and reports the offending field by name, so
//! the message can go straight into a 400 response.

use thiserror::Error;

/// A request field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Longest URL accepted for images and links.
pub const MAX_URL_LENGTH: usize = 2048;

/// Trim a required text field and check its length in characters.
///
/// # Errors
///
/// Returns an error if the trimmed value is empty or longer than `max`.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::new(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field; blank values become `None`.
///
/// # Errors
///
/// Returns an error if the trimmed value is longer than `max`.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v, max).map(Some),
    }
}

/// Validate a URL that was returned by the upload endpoint or points at an
/// external site.
///
/// # Errors
///
/// Returns an error for anything that is not an absolute http(s) URL or a
/// root-relative path.
pub fn url(field: &str, value: &str) -> Result<String, ValidationError> {
    let value = required_text(field, value, MAX_URL_LENGTH)?;
    let ok = value.starts_with("https://")
        || value.starts_with("http://")
        || (value.starts_with('/') && !value.starts_with("//"));
    if !ok {
        return Err(ValidationError::new(format!("{field} must be an http(s) URL")));
    }
    Ok(value)
}

/// Optional variant of [`url`].
///
/// # Errors
///
/// Returns an error if a non-blank value is not a valid URL.
pub fn optional_url(field: &str, value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => url(field, v).map(Some),
    }
}

/// Validate a list of image URLs.
///
/// # Errors
///
/// Returns an error if there are more than `max` images or any is invalid.
pub fn image_urls(field: &str, urls: &[String], max: usize) -> Result<Vec<String>, ValidationError> {
    if urls.len() > max {
        return Err(ValidationError::new(format!(
            "{field} can contain at most {max} images"
        )));
    }
    urls.iter().map(|u| url(field, u)).collect()
}

/// Build a URL slug: lowercase ASCII alphanumerics separated by single dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("name", "  Okra  ", 10).unwrap(), "Okra");
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let err = required_text("name", "   ", 10).unwrap_err();
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn test_required_text_counts_chars_not_bytes() {
        // 5 chars, 10 bytes
        assert!(required_text("name", "ééééé", 5).is_ok());
        assert!(required_text("name", "éééééé", 5).is_err());
    }

    #[test]
    fn test_optional_text_blank_is_none() {
        assert_eq!(optional_text("bio", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("bio", None, 10).unwrap(), None);
        assert_eq!(
            optional_text("bio", Some(" hi "), 10).unwrap(),
            Some("hi".to_owned())
        );
    }

    #[test]
    fn test_url_accepts_http_and_relative() {
        assert!(url("image", "https://cdn.example.org/a.png").is_ok());
        assert!(url("image", "/uploads/products/2026/01/a.png").is_ok());
    }

    #[test]
    fn test_url_rejects_other_schemes() {
        assert!(url("image", "javascript:alert(1)").is_err());
        assert!(url("image", "//evil.example/a.png").is_err());
        assert!(url("image", "data:image/png;base64,AAAA").is_err());
    }

    #[test]
    fn test_image_urls_limit() {
        let urls: Vec<String> = (0..11).map(|i| format!("/uploads/{i}.png")).collect();
        assert!(image_urls("image_urls", &urls, 10).is_err());
        assert_eq!(image_urls("image_urls", &urls[..10], 10).unwrap().len(), 10);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fresh Fruits & Vegetables"), "fresh-fruits-vegetables");
        assert_eq!(slugify("  --Grains--  "), "grains");
        assert_eq!(slugify("Dairy"), "dairy");
    }
}
