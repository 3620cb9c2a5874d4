//! Decoding wire bodies into the form the signature covers.
//!
//! The `content-type` header picks the decoding:
//!
//! - `application/json` and `+json` types: parsed JSON, hashed in stable form
//! - `application/x-www-form-urlencoded`: form summary of the decoded pairs
//! - `multipart/form-data`: form summary of the parts
//! - anything else, or a missing header: the raw bytes
//!
//! Decoding never fails. A body that does not parse as its declared type is
//! hashed raw, and a signer that hashed the structured form will then see
//! `INVALID_SIGNATURE`.

use bytes::Bytes;
use medscribe_auth::body::{FormField, SignableBody};
use mime::Mime;
use tracing::debug;

use crate::multipart::parse_form_fields;

/// Build the signable body for `body` as declared by `content_type`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use medscribe_auth::body::SignableBody;
/// use medscribe_http::signable::decode_signable_body;
///
/// let body = decode_signable_body(Some("application/json"), Bytes::from_static(br#"{"id":"1"}"#));
/// assert_eq!(body, SignableBody::Json(serde_json::json!({"id": "1"})));
///
/// assert_eq!(decode_signable_body(None, Bytes::new()), SignableBody::Empty);
/// ```
#[must_use]
pub fn decode_signable_body(content_type: Option<&str>, body: Bytes) -> SignableBody {
    if body.is_empty() {
        return SignableBody::Empty;
    }

    let Some(mime) = content_type.and_then(|ct| ct.parse::<Mime>().ok()) else {
        return SignableBody::Raw(body);
    };

    if is_json(&mime) {
        return match serde_json::from_slice(&body) {
            Ok(value) => SignableBody::Json(value),
            Err(err) => {
                debug!(error = %err, "JSON body did not parse, hashing raw bytes");
                SignableBody::Raw(body)
            }
        };
    }

    if mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
        let fields = form_urlencoded::parse(&body)
            .map(|(name, value)| FormField::text(name, value))
            .collect();
        return SignableBody::Form(fields);
    }

    if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
        let boundary = mime
            .get_param(mime::BOUNDARY)
            .map(|b| b.as_str().to_owned())
            .unwrap_or_default();
        return match parse_form_fields(&body, &boundary) {
            Ok(fields) => SignableBody::Form(fields),
            Err(err) => {
                debug!(error = %err, "multipart body did not parse, hashing raw bytes");
                SignableBody::Raw(body)
            }
        };
    }

    SignableBody::Raw(body)
}

fn is_json(mime: &Mime) -> bool {
    (mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON)
        || mime.suffix() == Some(mime::JSON)
}

#[cfg(test)]
mod tests {
    use medscribe_auth::canonical::hash_body;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_decode_json_with_charset() {
        let body = decode_signable_body(
            Some("application/json; charset=utf-8"),
            Bytes::from_static(br#"{"b":2,"a":1}"#),
        );
        assert_eq!(body, SignableBody::Json(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_should_decode_json_suffix_types() {
        let body = decode_signable_body(
            Some("application/vnd.medscribe.report+json"),
            Bytes::from_static(b"[1,2]"),
        );
        assert_eq!(body, SignableBody::Json(json!([1, 2])));
    }

    #[test]
    fn test_should_hash_unparsable_json_raw() {
        let raw = Bytes::from_static(b"{not json");
        let body = decode_signable_body(Some("application/json"), raw.clone());
        assert_eq!(body, SignableBody::Raw(raw));
    }

    #[test]
    fn test_should_decode_urlencoded_pairs() {
        let body = decode_signable_body(
            Some("application/x-www-form-urlencoded"),
            Bytes::from_static(b"b=two+words&a=%2F1"),
        );
        assert_eq!(
            body,
            SignableBody::Form(vec![
                FormField::text("b", "two words"),
                FormField::text("a", "/1"),
            ])
        );
        assert_eq!(body.canonical_bytes().as_ref(), b"a=/1&b=two words");
    }

    #[test]
    fn test_should_decode_multipart_fields() {
        let raw = "--XyZ\r\n\
             Content-Disposition: form-data; name=\"audio\"; filename=\"a.wav\"\r\n\
             \r\n\
             RIFF....\r\n\
             --XyZ--\r\n";
        let body = decode_signable_body(
            Some("multipart/form-data; boundary=XyZ"),
            Bytes::from(raw),
        );
        assert_eq!(
            body,
            SignableBody::Form(vec![FormField::file("audio", "a.wav")])
        );
    }

    #[test]
    fn test_should_ignore_file_content_in_multipart_hash() {
        let upload = |content: &str| {
            let raw = format!(
                "--b\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.bin\"\r\n\r\n{content}\r\n--b--\r\n"
            );
            hash_body(&decode_signable_body(
                Some("multipart/form-data; boundary=b"),
                Bytes::from(raw),
            ))
        };
        assert_eq!(upload("first"), upload("second"));
    }

    #[test]
    fn test_should_fall_back_to_raw() {
        let raw = Bytes::from_static(b"plain");
        assert_eq!(
            decode_signable_body(Some("text/plain"), raw.clone()),
            SignableBody::Raw(raw.clone())
        );
        assert_eq!(
            decode_signable_body(None, raw.clone()),
            SignableBody::Raw(raw.clone())
        );
        assert_eq!(
            decode_signable_body(Some("multipart/form-data; boundary=zz"), raw.clone()),
            SignableBody::Raw(raw)
        );
    }
}
