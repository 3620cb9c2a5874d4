//! Signature and header verification over HTTP.

#[cfg(test)]
mod tests {
    use medscribe_auth::{ClientAgent, Platform, Product, RequestSigner, SignableBody};
    use medscribe_core::ApiKey;
    use reqwest::Method;

    use crate::{TEST_SECRET, TestGateway, json_body, now_millis, test_config, test_signer};

    #[tokio::test]
    async fn test_should_accept_signed_get() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();

        let resp = gateway
            .signed(
                &signer,
                Method::GET,
                "/v1/notes?limit=5",
                &SignableBody::Empty,
                now_millis(),
                None,
            )
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let request_id = resp.headers()["x-request-id"].to_str().unwrap().to_owned();
        assert!(uuid::Uuid::parse_str(&request_id).is_ok());

        let body = json_body(resp).await;
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/v1/notes?limit=5");
        assert_eq!(body["product"], "CLI");
        assert_eq!(body["rateRemaining"], 99);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_accept_json_regardless_of_key_order() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let signed = serde_json::json!({"patient": {"id": 7, "age": 41}, "draft": true});

        // Same document, different key order and spacing on the wire.
        let wire = r#"{ "draft": true, "patient": { "age": 41, "id": 7 } }"#;

        let resp = gateway
            .signed(
                &signer,
                Method::POST,
                "/v1/notes",
                &SignableBody::Json(signed),
                now_millis(),
                None,
            )
            .header("content-type", "application/json")
            .body(wire)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(json_body(resp).await["bodyBytes"], wire.len());

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_missing_api_key() {
        let gateway = TestGateway::start(test_config()).await;

        let resp = gateway
            .client()
            .get(gateway.url("/v1/notes"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        let body = json_body(resp).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["error"], "MISSING_API_KEY");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_short_api_key() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = RequestSigner::new(
            ApiKey::new("too-short"),
            ClientAgent::new(Product::Cli, "1.0.0", Platform::Cli),
            TEST_SECRET,
        );

        let resp = gateway
            .signed(&signer, Method::GET, "/v1/notes", &SignableBody::Empty, now_millis(), None)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_eq!(json_body(resp).await["code"], 1002);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_unknown_client_agent() {
        let gateway = TestGateway::start(test_config()).await;
        let mut headers = test_signer().signed_headers(
            "GET",
            "/v1/notes",
            &SignableBody::Empty,
            now_millis(),
            None,
        );
        headers.insert("x-client-agent", "curl/8.0".parse().unwrap());

        let resp = gateway
            .client()
            .get(gateway.url("/v1/notes"))
            .headers(headers)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 403);
        let body = json_body(resp).await;
        assert_eq!(body["code"], 1101);
        assert_eq!(body["error"], "BAD_USER_AGENT");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_path_signed_for_another_route() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let headers = signer.signed_headers(
            "GET",
            "/v1/notes",
            &SignableBody::Empty,
            now_millis(),
            None,
        );

        let resp = gateway
            .client()
            .get(gateway.url("/v1/admin"))
            .headers(headers)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_eq!(json_body(resp).await["code"], 1104);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_stale_timestamp() {
        let gateway = TestGateway::start(test_config()).await;

        let resp = gateway
            .signed(
                &test_signer(),
                Method::GET,
                "/v1/notes",
                &SignableBody::Empty,
                now_millis() - 10 * 60 * 1000,
                None,
            )
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        let body = json_body(resp).await;
        assert_eq!(body["code"], 1105);
        assert_eq!(body["error"], "SKEWED_TIMESTAMP");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_tampered_body() {
        let gateway = TestGateway::start(test_config()).await;
        let signed = serde_json::json!({"text": "no known allergies"});

        let resp = gateway
            .signed(
                &test_signer(),
                Method::POST,
                "/v1/notes",
                &SignableBody::Json(signed),
                now_millis(),
                None,
            )
            .header("content-type", "application/json")
            .body(r#"{"text":"penicillin allergy"}"#)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        let body = json_body(resp).await;
        assert_eq!(body["code"], 1106);
        assert_eq!(body["error"], "INVALID_SIGNATURE");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_reject_wrong_secret() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = RequestSigner::new(
            ApiKey::new(crate::TEST_API_KEY),
            ClientAgent::new(Product::Portal, "2.3", Platform::Web),
            "some-other-secret",
        );

        let resp = gateway
            .signed(&signer, Method::DELETE, "/v1/notes/9", &SignableBody::Empty, now_millis(), None)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_eq!(json_body(resp).await["code"], 1106);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_skip_signature_when_disabled() {
        let config = medscribe_core::GuardConfig {
            signing_secret: None,
            verify_signature: false,
            ..medscribe_core::GuardConfig::default()
        };
        let gateway = TestGateway::start(config).await;
        let signer = test_signer();
        let mut headers =
            signer.signed_headers("GET", "/v1/notes", &SignableBody::Empty, now_millis(), None);
        headers.remove("x-signature");

        let resp = gateway
            .client()
            .get(gateway.url("/v1/notes"))
            .headers(headers)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);

        gateway.shutdown().await;
    }
}
