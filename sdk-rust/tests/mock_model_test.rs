use codeverse_genai::{
    genai_test::{MockGenerateResult, MockLanguageModel, MockStreamResult},
    LanguageModel, LanguageModelError, LanguageModelInput, LanguageModelResult,
    LanguageModelStream, Message, ModelResponse, Part, PartDelta, PartialModelResponse,
};
use futures::StreamExt;

fn user_input(text: &str) -> LanguageModelInput {
    LanguageModelInput {
        messages: vec![Message::user([Part::text(text)])],
        ..LanguageModelInput::default()
    }
}

async fn collect_stream(mut stream: LanguageModelStream) -> Vec<LanguageModelResult<PartialModelResponse>> {
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    items
}

fn delta_text(partial: &PartialModelResponse) -> &str {
    match partial.delta.as_ref().map(|delta| &delta.part) {
        Some(PartDelta::Text(text)) => &text.text,
        other => panic!("expected text delta, got {other:?}"),
    }
}

#[tokio::test]
async fn mock_language_model_replays_generate_results_in_order() {
    let model = MockLanguageModel::new();

    let first = ModelResponse {
        content: vec![Part::text("Hello, world!")],
        ..ModelResponse::default()
    };

    model
        .enqueue_generate(first.clone())
        .enqueue_generate(MockGenerateResult::error(LanguageModelError::InvalidInput(
            "generate error".to_string(),
        )))
        .enqueue_generate(MockGenerateResult::json(&serde_json::json!({ "hint": "x" })));

    let res = model
        .generate(user_input("Hi"))
        .await
        .expect("first generate should succeed");
    assert_eq!(res, first);

    let err = model
        .generate(user_input("Error"))
        .await
        .expect_err("second generate should error");
    assert!(matches!(err, LanguageModelError::InvalidInput(msg) if msg == "generate error"));

    let res = model
        .generate(user_input("Json"))
        .await
        .expect("third generate should succeed");
    assert_eq!(res.text(), r#"{"hint":"x"}"#);

    let tracked = model.tracked_generate_inputs();
    assert_eq!(tracked.len(), 3);
    assert_eq!(tracked[1].messages, user_input("Error").messages);

    model.reset();
    assert!(model.tracked_generate_inputs().is_empty());
}

#[tokio::test]
async fn mock_language_model_errors_when_queue_is_empty() {
    let model = MockLanguageModel::new();
    model.enqueue_generate(MockGenerateResult::text("unused"));
    model.restore();

    let err = model
        .generate(user_input("Hi"))
        .await
        .expect_err("generate after restore should fail");
    match err {
        LanguageModelError::Invariant(provider, message) => {
            assert_eq!(provider, "mock");
            assert_eq!(message, "no mocked generate results available");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[tokio::test]
async fn mock_language_model_streams_chunks_then_ends() {
    let model = MockLanguageModel::new();
    model.enqueue_stream(MockStreamResult::text_chunks(["Hel", "lo"]));

    let stream = model
        .stream(user_input("Hi"))
        .await
        .expect("stream should start");
    let items = collect_stream(stream).await;

    assert_eq!(items.len(), 2);
    let texts: Vec<&str> = items
        .iter()
        .map(|item| delta_text(item.as_ref().expect("chunk should be ok")))
        .collect();
    assert_eq!(texts, vec!["Hel", "lo"]);
    assert_eq!(model.tracked_stream_inputs().len(), 1);
}

#[tokio::test]
async fn mock_language_model_streams_partials_before_error() {
    let model = MockLanguageModel::new();
    let MockStreamResult::Partials(partials) = MockStreamResult::text_chunks(["Hel"]) else {
        unreachable!()
    };
    model.enqueue_stream(MockStreamResult::partials_then_error(
        partials,
        LanguageModelError::Invariant("mock", "connection reset".to_string()),
    ));

    let stream = model
        .stream(user_input("Hi"))
        .await
        .expect("stream should start");
    let items = collect_stream(stream).await;

    assert_eq!(items.len(), 2);
    assert_eq!(delta_text(items[0].as_ref().unwrap()), "Hel");
    assert!(matches!(items[1], Err(LanguageModelError::Invariant(_, _))));
}

#[tokio::test]
async fn mock_language_model_stream_call_can_fail() {
    let model = MockLanguageModel::new();
    model.enqueue_stream(MockStreamResult::error(LanguageModelError::Refusal(
        "blocked".to_string(),
    )));

    let Err(err) = model.stream(user_input("Hi")).await else {
        panic!("expected stream error");
    };
    assert!(matches!(err, LanguageModelError::Refusal(_)));
}
