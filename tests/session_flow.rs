//! End-to-end session tests against a WireMock server.

mod common;

use std::sync::Arc;

use common::*;
use moonshot_digest::store::MemoryCredentialStore;
use moonshot_digest::transport::HttpTransportImpl;
use moonshot_digest::{
    Author, Credential, CredentialStore, SessionController, SessionError, SessionState,
    UploadedFile,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn session(server: &MockServer) -> SessionController {
    let config = fast_config(server);
    let transport = HttpTransportImpl::new(&config.base_url, config.timeout).unwrap();
    let session = SessionController::with_transport(config, Arc::new(transport));

    let store = MemoryCredentialStore::new();
    store.save(&Credential::new(API_KEY).unwrap()).await.unwrap();
    assert!(session.load_credential(&store).await.unwrap());

    session
}

#[tokio::test]
async fn test_pdf_upload_to_first_answer() {
    let server = MockServer::start().await;

    authed("POST", "/files")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f-123"})))
        .expect(1)
        .mount(&server)
        .await;
    authed("GET", "/files/f-123/content")
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    authed("GET", "/files/f-123/content")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello world"})))
        .mount(&server)
        .await;
    authed("POST", "/chat/completions")
        .and(body_string_contains("hello world"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A friendly greeting.")))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;

    let summary = session
        .analyze_file(UploadedFile::new("greeting.pdf", b"%PDF-1.4 hello".to_vec()))
        .await
        .unwrap();

    assert_eq!(summary, "A friendly greeting.");
    assert_eq!(session.state(), SessionState::Ready);

    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].author, Author::Bot);
    assert_eq!(transcript[0].text, "A friendly greeting.");
}

#[tokio::test]
async fn test_follow_up_question_uses_cached_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Question: Who wrote it?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Nobody is named.")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Summary of notes.")))
        .mount(&server)
        .await;

    let session = session(&server).await;
    session.analyze_text("meeting notes without an author").await.unwrap();

    let reply = session.ask("Who wrote it?").await.unwrap();

    assert_eq!(reply.text, "Nobody is named.");
    let authors: Vec<_> = session
        .transcript()
        .await
        .iter()
        .map(|turn| turn.author)
        .collect();
    assert_eq!(authors, vec![Author::Bot, Author::User, Author::Bot]);
    assert_eq!(requests_to(&server, "/files").await, 0);
}

#[tokio::test]
async fn test_invalid_key_asks_for_setup() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(error_response(401, "Invalid Authentication"))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server).await;
    let err = session.analyze_text("some text").await.unwrap_err();

    assert!(err.requires_credential_setup());
    assert!(matches!(err, SessionError::Client(_)));
    assert_eq!(session.state(), SessionState::Idle);
}
