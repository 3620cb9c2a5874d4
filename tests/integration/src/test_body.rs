//! Form, multipart, and raw bodies over HTTP.

#[cfg(test)]
mod tests {
    use medscribe_auth::{FormField, SignableBody};
    use reqwest::Method;

    use crate::{TestGateway, json_body, now_millis, test_config, test_signer};

    fn multipart(boundary: &str, audio: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                 follow-up visit\r\n\
                 --{boundary}\r\n\
                 Content-Disposition: form-data; name=\"audio\"; filename=\"visit.m4a\"\r\n\
                 Content-Type: audio/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[tokio::test]
    async fn test_should_accept_signed_urlencoded_form() {
        let gateway = TestGateway::start(test_config()).await;
        let fields = vec![
            FormField::text("specialty", "cardiology"),
            FormField::text("draft", "1"),
        ];

        let resp = gateway
            .signed(
                &test_signer(),
                Method::POST,
                "/v1/templates",
                &SignableBody::Form(fields),
                now_millis(),
                None,
            )
            .header("content-type", "application/x-www-form-urlencoded")
            .body("specialty=cardiology&draft=1")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_accept_multipart_upload_by_filename() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let fields = vec![
            FormField::text("title", "follow-up visit"),
            FormField::file("audio", "visit.m4a"),
        ];
        let ts = now_millis();

        // File content is not covered by the signature, only its filename.
        for audio in [b"first take".as_slice(), b"second take".as_slice()] {
            let resp = gateway
                .signed(
                    &signer,
                    Method::POST,
                    "/v1/recordings",
                    &SignableBody::Form(fields.clone()),
                    ts,
                    None,
                )
                .header("content-type", "multipart/form-data; boundary=medscribe-b0undary")
                .body(multipart("medscribe-b0undary", audio))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_multipart_with_renamed_file() {
        let gateway = TestGateway::start(test_config()).await;
        let fields = vec![
            FormField::text("title", "follow-up visit"),
            FormField::file("audio", "other.m4a"),
        ];

        let resp = gateway
            .signed(
                &test_signer(),
                Method::POST,
                "/v1/recordings",
                &SignableBody::Form(fields),
                now_millis(),
                None,
            )
            .header("content-type", "multipart/form-data; boundary=xyz")
            .body(multipart("xyz", b"audio"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_eq!(json_body(resp).await["code"], 1106);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_hash_unknown_content_types_verbatim() {
        let gateway = TestGateway::start(test_config()).await;
        let transcript = "Patient reports mild chest pain.";

        let resp = gateway
            .signed(
                &test_signer(),
                Method::PUT,
                "/v1/notes/3/transcript",
                &SignableBody::Raw(transcript.into()),
                now_millis(),
                None,
            )
            .header("content-type", "text/plain; charset=utf-8")
            .body(transcript)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(json_body(resp).await["bodyBytes"], transcript.len());

        gateway.shutdown().await;
    }
}
