//! HTTP session lifecycle against a server on an ephemeral port.

use async_trait::async_trait;
use docgate::config::Config;
use docgate::server::{serve, AppState};
use docgate::session::Providers;
use docgate_core::completion::{CompletionOptions, CompletionProvider};
use docgate_core::embedding::EmbeddingProvider;
use serde_json::{json, Value};
use std::sync::Arc;

struct WordEmbedder;

#[async_trait]
impl EmbeddingProvider for WordEmbedder {
    fn model_name(&self) -> &str {
        "words"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let t = text.to_lowercase();
        Ok(["ottawa", "canada", "pasta"]
            .iter()
            .map(|w| t.matches(w).count() as f32 + 0.01)
            .collect())
    }
}

struct Oracle;

#[async_trait]
impl CompletionProvider for Oracle {
    fn model_name(&self) -> &str {
        "oracle"
    }
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> anyhow::Result<String> {
        let reply = if prompt.contains("Respond ONLY with") {
            if prompt.contains("Ottawa") {
                "CAN_ANSWER"
            } else {
                "NO_MATCH"
            }
        } else if prompt.starts_with("Verify the following answer") {
            "Supported: YES\nUnsupported Claims: None\nContradictions: None\nRelevant: YES"
        } else if prompt.starts_with("Answer the following question") {
            "Ottawa is the capital of Canada."
        } else {
            "A short talk about Canadian geography."
        };
        Ok(reply.to_string())
    }
}

async fn start() -> String {
    start_with(Config::default()).await
}

async fn start_with(mut config: Config) -> String {
    config.embedding.provider = "openai".to_string();
    config.embedding.model = Some("words".to_string());
    config.embedding.dims = Some(3);

    let providers = Providers {
        embedding: Arc::new(WordEmbedder),
        completion: Arc::new(Oracle),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, AppState::new(config, providers)));
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_session_lifecycle() {
    let base = start().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let resp = client
        .post(format!("{}/sessions", base))
        .json(&json!({
            "documents": [
                { "id": "geo", "text": "Ottawa is the capital of Canada." },
                { "id": "food", "text": "Pasta is best cooked al dente." }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["chunks"], 2);
    let id = created["session_id"].as_str().unwrap().to_string();

    let run: Value = client
        .post(format!("{}/sessions/{}/ask", base, id))
        .json(&json!({ "question": "What is the capital of Canada?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["outcome"]["status"], "accepted");
    assert_eq!(run["label"], "CAN_ANSWER");
    assert_eq!(run["states"].as_array().unwrap().last().unwrap(), "ACCEPTED");
    assert!(run["outcome"]["answer"]["text"]
        .as_str()
        .unwrap()
        .contains("Ottawa"));

    let summary: Value = client
        .post(format!("{}/sessions/{}/summarize", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(summary["summary"].as_str().unwrap().contains("geography"));

    let resp = client
        .delete(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .post(format!("{}/sessions/{}/ask", base, id))
        .json(&json!({ "question": "still there?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let base = start().await;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for text in ["Ottawa is the capital of Canada.", "Pasta is best cooked al dente."] {
        let created: Value = client
            .post(format!("{}/sessions", base))
            .json(&json!({ "documents": [{ "text": text }] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(created["session_id"].as_str().unwrap().to_string());
    }

    let run: Value = client
        .post(format!("{}/sessions/{}/ask", base, ids[1]))
        .json(&json!({ "question": "What is the capital of Canada?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["outcome"]["status"], "refused");
    assert_eq!(run["outcome"]["reason"]["kind"], "no_match");
}

#[tokio::test]
async fn test_transcript_session_and_bad_requests() {
    let base = start().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{}/sessions", base))
        .json(&json!({
            "transcript": [
                { "text": "Ottawa is the capital", "start": 0.0 },
                { "text": "of Canada", "start": 2.5 }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["documents"], 1);

    let resp = client
        .post(format!("{}/sessions", base))
        .json(&json!({ "documents": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let id = created["session_id"].as_str().unwrap();
    let resp = client
        .post(format!("{}/sessions/{}/ask", base, id))
        .json(&json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_duplicate_document_ids_rejected() {
    let base = start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/sessions", base))
        .json(&json!({
            "documents": [
                { "id": "doc", "text": "Ottawa is the capital of Canada." },
                { "id": "doc", "text": "Pasta is best cooked al dente." }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("duplicate document id"));
}

#[tokio::test]
async fn test_blank_documents_have_no_context() {
    let base = start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/sessions", base))
        .json(&json!({ "documents": [{ "text": "   \n\n  " }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no context"));
}

#[tokio::test]
async fn test_session_cap_evicts_least_recent() {
    let mut config = Config::default();
    config.server.max_sessions = 1;
    let base = start_with(config).await;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for text in ["Ottawa is the capital of Canada.", "Pasta is best cooked al dente."] {
        let created: Value = client
            .post(format!("{}/sessions", base))
            .json(&json!({ "documents": [{ "text": text }] }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(created["session_id"].as_str().unwrap().to_string());
    }

    let resp = client
        .post(format!("{}/sessions/{}/summarize", base, ids[0]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/sessions/{}/summarize", base, ids[1]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
