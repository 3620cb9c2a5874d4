//! Nonce replay and rate limiting over HTTP.

#[cfg(test)]
mod tests {
    use medscribe_auth::{SignableBody, generate_nonce};
    use medscribe_core::GuardConfig;
    use reqwest::Method;

    use crate::{TestGateway, json_body, now_millis, test_config, test_signer};

    #[tokio::test]
    async fn test_should_reject_replayed_nonce() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let nonce = generate_nonce();
        let ts = now_millis();

        let send = || {
            gateway
                .signed(&signer, Method::GET, "/v1/notes", &SignableBody::Empty, ts, Some(&nonce))
                .send()
        };

        let first = send().await.unwrap();
        assert_eq!(first.status(), 200);
        assert_eq!(json_body(first).await["nonce"], nonce.as_str());

        let replay = send().await.unwrap();
        assert_eq!(replay.status(), 403);
        let body = json_body(replay).await;
        assert_eq!(body["code"], 1202);
        assert_eq!(body["error"], "REPLAY_NONCE");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_admit_exactly_one_of_concurrent_replays() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let nonce = generate_nonce();
        let ts = now_millis();

        let attempts = (0..8).map(|_| {
            gateway
                .signed(&signer, Method::GET, "/v1/notes", &SignableBody::Empty, ts, Some(&nonce))
                .send()
        });
        let statuses: Vec<u16> = futures::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap().status().as_u16())
            .collect();

        assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == 403).count(), 7);

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_allow_requests_without_nonce_to_repeat() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let ts = now_millis();

        for _ in 0..3 {
            let resp = gateway
                .signed(&signer, Method::GET, "/v1/notes", &SignableBody::Empty, ts, None)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_rate_limit_per_api_key() {
        let config = GuardConfig {
            rate_limit_max: 2,
            ..test_config()
        };
        let gateway = TestGateway::start(config).await;
        let signer = test_signer();

        let mut remaining = Vec::new();
        for _ in 0..2 {
            let resp = gateway
                .signed(&signer, Method::GET, "/v1/notes", &SignableBody::Empty, now_millis(), None)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
            remaining.push(json_body(resp).await["rateRemaining"].as_u64().unwrap());
        }
        assert_eq!(remaining, vec![1, 0]);

        let limited = gateway
            .signed(&signer, Method::GET, "/v1/notes", &SignableBody::Empty, now_millis(), None)
            .send()
            .await
            .unwrap();
        assert_eq!(limited.status(), 429);

        let retry_after: u64 = limited.headers()["retry-after"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));

        let body = json_body(limited).await;
        assert_eq!(body["code"], 1201);
        assert_eq!(body["error"], "RATE_LIMITED");

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_not_spend_nonce_on_rejected_signature() {
        let gateway = TestGateway::start(test_config()).await;
        let signer = test_signer();
        let nonce = generate_nonce();
        let ts = now_millis();
        let signed = serde_json::json!({"n": 1});

        let forged = gateway
            .signed(&signer, Method::POST, "/v1/notes", &SignableBody::Json(signed.clone()), ts, Some(&nonce))
            .header("content-type", "application/json")
            .body(r#"{"n":2}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(json_body(forged).await["code"], 1106);

        let genuine = gateway
            .signed(&signer, Method::POST, "/v1/notes", &SignableBody::Json(signed), ts, Some(&nonce))
            .header("content-type", "application/json")
            .body(r#"{"n":1}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(genuine.status(), 200);

        gateway.shutdown().await;
    }
}
