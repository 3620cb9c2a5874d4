//! Request body normalization.
//!
//! The signature covers a hash of the body, but what gets hashed depends on
//! the kind of body:
//!
//! | Body | Hashed bytes |
//! |------|--------------|
//! | none | empty string |
//! | JSON | [`stable_stringify`] output |
//! | form | sorted `key=value` pairs joined with `&` |
//! | other | the raw bytes |
//!
//! Form bodies are summarized from their fields only. A file part contributes
//! `name=<filename>` and its content is never read, so two uploads that differ
//! only in file content produce the same body hash.

use std::borrow::Cow;

use bytes::Bytes;
use serde_json::Value;

use crate::stable_json::stable_stringify;

/// The value of one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// A plain text field.
    Text(String),
    /// A file part, identified only by its declared filename.
    File {
        /// The `filename` parameter of the part, possibly empty.
        filename: String,
    },
}

/// One named form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: FormValue,
}

impl FormField {
    /// A text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    /// A file field.
    pub fn file(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                filename: filename.into(),
            },
        }
    }

    fn summary_pair(&self) -> String {
        match &self.value {
            FormValue::Text(text) => format!("{}={text}", self.name),
            FormValue::File { filename } => format!("{}={filename}", self.name),
        }
    }
}

/// A request body in the form the signature is computed over.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SignableBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(Value),
    /// Form fields from a urlencoded or multipart body.
    Form(Vec<FormField>),
    /// Any other payload, hashed verbatim.
    Raw(Bytes),
}

impl SignableBody {
    /// The exact bytes that are hashed for this body.
    #[must_use]
    pub fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Empty => Cow::Borrowed(&[]),
            Self::Json(value) => Cow::Owned(stable_stringify(value).into_bytes()),
            Self::Form(fields) => Cow::Owned(form_summary(fields).into_bytes()),
            Self::Raw(bytes) => Cow::Borrowed(bytes.as_ref()),
        }
    }
}

/// Summarize form fields as sorted `key=value` pairs joined with `&`.
///
/// # Examples
///
/// ```
/// use medscribe_auth::body::{FormField, form_summary};
///
/// let fields = vec![
///     FormField::text("title", "visit"),
///     FormField::file("audio", "note.m4a"),
/// ];
/// assert_eq!(form_summary(&fields), "audio=note.m4a&title=visit");
/// ```
#[must_use]
pub fn form_summary(fields: &[FormField]) -> String {
    let mut pairs: Vec<String> = fields.iter().map(FormField::summary_pair).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_hash_nothing_for_empty_body() {
        assert!(SignableBody::Empty.canonical_bytes().is_empty());
    }

    #[test]
    fn test_should_use_stable_json_for_json_body() {
        let body = SignableBody::Json(json!({"id": "1", "a": 2}));
        assert_eq!(body.canonical_bytes().as_ref(), br#"{"a":2,"id":"1"}"#);
    }

    #[test]
    fn test_should_sort_form_pairs() {
        let fields = vec![
            FormField::text("b", "2"),
            FormField::text("a", "1"),
            FormField::text("a", "0"),
        ];
        assert_eq!(form_summary(&fields), "a=0&a=1&b=2");
    }

    #[test]
    fn test_should_summarize_files_by_name_only() {
        let first = SignableBody::Form(vec![FormField::file("audio", "clip.wav")]);
        let second = SignableBody::Form(vec![FormField::file("audio", "clip.wav")]);
        assert_eq!(first.canonical_bytes(), second.canonical_bytes());
        assert_eq!(first.canonical_bytes().as_ref(), b"audio=clip.wav");
    }

    #[test]
    fn test_should_pass_raw_bytes_through() {
        let body = SignableBody::Raw(Bytes::from_static(b"\x00\x01raw"));
        assert_eq!(body.canonical_bytes().as_ref(), b"\x00\x01raw");
    }
}
