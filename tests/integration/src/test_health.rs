//! Health probe integration tests.

#[cfg(test)]
mod tests {
    use crate::{TestGateway, json_body, test_config};

    #[tokio::test]
    async fn test_should_answer_health_without_credentials() {
        let gateway = TestGateway::start(test_config()).await;

        for path in ["/health", "/_health"] {
            let resp = gateway.client().get(gateway.url(path)).send().await.unwrap();
            assert_eq!(resp.status(), 200, "{path}");
            let body = json_body(resp).await;
            assert_eq!(body["status"], "ok");
            assert_eq!(body["version"], medscribe_gateway::VERSION);
        }

        gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_guard_everything_but_health() {
        let gateway = TestGateway::start(test_config()).await;

        let resp = gateway
            .client()
            .get(gateway.url("/health/details"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(resp.headers()["server"], "MedScribe");
        let body = json_body(resp).await;
        assert_eq!(body["code"], 1001);
        assert_eq!(body["error"], "MISSING_API_KEY");

        gateway.shutdown().await;
    }
}
