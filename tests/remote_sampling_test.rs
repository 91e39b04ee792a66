use otel_edge_pipeline::sampling::{
    ExportSampler, LogSamplingRule, MatchConfig, RemoteSamplingConfig, RuleSampler, SamplingConfig,
    SamplingConfigClient,
};
use otel_edge_pipeline::{LogRecord, Severity};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_remote_config_applied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sampling"))
        .and(header("X-Project-Id", "proj-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sampling": {
                "logs": [{"message": {"matchValue": "noisy"}, "samplingRatio": 0}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SamplingConfigClient::new(RemoteSamplingConfig {
        endpoint: format!("{}/sampling", server.uri()),
        project_id: "proj-9".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();
    let sampler = RuleSampler::new();
    client.refresh(&sampler).await;

    assert!(sampler.is_sampling_enabled());
    assert!(!sampler.sample_log(&LogRecord::new(Severity::Info, "noisy")).sample);
}

#[tokio::test]
async fn test_remote_failure_keeps_previous_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(6)
        .mount(&server)
        .await;

    let client = SamplingConfigClient::new(RemoteSamplingConfig {
        endpoint: format!("{}/sampling", server.uri()),
        project_id: "proj-9".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let sampler = RuleSampler::new();
    sampler.set_config(Some(SamplingConfig {
        spans: vec![],
        logs: vec![LogSamplingRule {
            message: Some(MatchConfig::exact("keep-me-out")),
            severity_text: None,
            attributes: vec![],
            sampling_ratio: 0,
        }],
    }));

    assert!(client.fetch().await.is_err());
    client.refresh(&sampler).await;

    assert!(sampler.is_sampling_enabled());
    assert!(!sampler.sample_log(&LogRecord::new(Severity::Info, "keep-me-out")).sample);
}

#[tokio::test]
async fn test_remote_null_config_leaves_sampler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sampling": null })))
        .mount(&server)
        .await;

    let client = SamplingConfigClient::new(RemoteSamplingConfig {
        endpoint: server.uri(),
        project_id: "proj-9".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    assert_eq!(client.fetch().await.unwrap(), None);

    let sampler = RuleSampler::new();
    client.refresh(&sampler).await;
    assert!(!sampler.is_sampling_enabled());
}
