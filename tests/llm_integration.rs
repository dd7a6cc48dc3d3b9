//! Integration tests against a real model endpoint.
//!
//! These tests make real API calls.
//! Run with: STREAMEVAL_API_BASE=... STREAMEVAL_API_KEY=... cargo test --test llm_integration -- --ignored

use stream_eval::config::EvalConfig;
use stream_eval::llm::litellm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
use stream_eval::{Evaluator, MetricId};

fn live_config() -> EvalConfig {
    let config = EvalConfig::from_env().expect("STREAMEVAL_* variables must be valid");
    config
        .model
        .require_complete()
        .expect("STREAMEVAL_API_BASE and STREAMEVAL_API_KEY must be set for integration tests");
    config
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let config = live_config();
    let client = LiteLlmClient::from_config(&config.model).expect("client");

    let request = GenerationRequest::new(
        &config.model.model,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains('4'),
        "Response should contain '4', got: {}",
        content
    );
}

#[tokio::test]
#[ignore]
async fn test_live_evaluation() {
    let evaluator = Evaluator::new(live_config());

    let outcome = evaluator
        .evaluate("主播介绍了一款新手机：电池容量5000毫安时，支持65瓦快充，售价2999元，并对比了上一代产品的续航表现。")
        .await;

    let result = outcome
        .result()
        .unwrap_or_else(|| panic!("evaluation failed: {}", outcome.to_json_pretty()));
    assert_eq!(result.metrics.len(), 4);
    for id in MetricId::ALL {
        let metric = result.metric(id).expect("every dimension present");
        assert!(metric.score.is_finite());
    }
    assert!(result.total().is_some());
}

#[tokio::test]
#[ignore]
async fn test_live_fan_out_evaluation() {
    let config = live_config().with_delegation(stream_eval::config::DelegationMode::FanOut);
    let evaluator = Evaluator::new(config);

    let outcome = evaluator
        .evaluate("讲师用十分钟讲解了光合作用的光反应和暗反应，并举例说明了叶绿体的结构。")
        .await;
    assert!(outcome.is_success(), "{}", outcome.to_json_pretty());
}
