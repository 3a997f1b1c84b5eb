//! Extractor round trips against a mock chat-completions endpoint.

use crate::{ExtractorSettings, OpenAiExtractor};
use chrono::NaiveDate;
use followup_core::gateway::TaskExtractor;
use mockito::{Matcher, Server, ServerGuard};

fn extractor(server: &ServerGuard) -> OpenAiExtractor {
    let mut settings = ExtractorSettings::new("sk-test");
    settings.base_url = format!("{}/v1", server.url());
    OpenAiExtractor::new(settings).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 5).unwrap()
}

fn chat_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

#[test]
fn proposals_come_back_from_fenced_answer() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "gpt-4o",
            "temperature": 0.1
        })))
        .with_status(200)
        .with_body(chat_body(
            "```json\n[{\"type\": \"WhatsApp\", \"date_time\": \"2025-09-06 10:00\", \"task\": \"Написать клиенту\", \"commentary\": \"\", \"source_line\": \"write on whatsapp 6 sept\"}]\n```",
        ))
        .create();

    let tasks = extractor(&server).extract("write on whatsapp 6 sept", today());

    mock.assert();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].source_line.as_deref(), Some("write on whatsapp 6 sept"));
}

#[test]
fn prompt_includes_the_comment_text() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex("call on monday".into()))
        .with_status(200)
        .with_body(chat_body("[]"))
        .create();

    let tasks = extractor(&server).extract("call on monday", today());

    mock.assert();
    assert!(tasks.is_empty());
}

#[test]
fn http_failure_yields_no_tasks() {
    let mut server = Server::new();
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .with_body("upstream down")
        .create();

    let ex = extractor(&server);
    assert!(ex.extract("call on monday", today()).is_empty());
    let err = ex.try_extract("call on monday", today()).unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[test]
fn prose_answer_yields_no_tasks() {
    let mut server = Server::new();
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(chat_body("В тексте нет задач."))
        .create();

    assert!(extractor(&server).extract("спасибо", today()).is_empty());
}

#[test]
fn empty_api_key_is_rejected() {
    assert!(OpenAiExtractor::new(ExtractorSettings::new("")).is_err());
}
