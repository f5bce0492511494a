//! Session controller.
//!
//! Owns the user's current content and conversation transcript and drives
//! the client through the upload, extract and analyze flow:
//!
//! ```text
//! Idle -> Submitting -> Extracting -> Analyzing -> Ready   (file)
//! Idle -> Analyzing -> Ready                               (pasted text)
//! ```
//!
//! Transitions only move forward; [`SessionController::reset`] is the only
//! way back to `Idle`. Each session generation carries a cancellation token,
//! so work started before a reset is dropped instead of leaking into the new
//! session.

mod prompts;

pub use prompts::{apology, follow_up, FOLLOW_UP_INSTRUCTION, SUMMARY_PROMPT};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::Credential;
use crate::client::MoonshotClient;
use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::store::{CredentialStore, StoreError};
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::files::UploadedFile;
use crate::types::limits::is_supported;

/// Where a session is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Uploading a file.
    Submitting,
    /// Waiting for the remote extraction.
    Extracting,
    /// Waiting for the summary.
    Analyzing,
    /// Summary available; follow-up questions accepted.
    Ready,
}

impl SessionState {
    /// Returns true while a submission is being processed.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionState::Submitting | SessionState::Extracting | SessionState::Analyzing
        )
    }
}

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The person asking.
    User,
    /// The model.
    Bot,
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    /// Unique id.
    pub id: Uuid,
    /// Who wrote it.
    pub author: Author,
    /// Message text.
    pub text: String,
    /// When it was appended.
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Author::User, text)
    }

    /// Creates a bot turn.
    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Author::Bot, text)
    }

    /// Returns true for bot turns.
    pub fn is_bot(&self) -> bool {
        self.author == Author::Bot
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No credential has been configured.
    #[error("Please set your Moonshot API key first")]
    CredentialRequired,

    /// Another request is in flight, or the session already holds content.
    #[error("Another request is already in progress")]
    Busy,

    /// A question was asked before any content was analyzed.
    #[error("No content has been analyzed yet")]
    NotReady,

    /// The question was blank.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The session was reset while the request was running.
    #[error("The session was reset before the request finished")]
    Superseded,

    /// The remote call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl SessionError {
    /// Returns true if the user has to (re-)enter an API key.
    pub fn requires_credential_setup(&self) -> bool {
        match self {
            SessionError::CredentialRequired => true,
            SessionError::Client(err) => err.is_credential_invalid(),
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    generation: u64,
    token: CancellationToken,
    credential: Option<Credential>,
    content: Option<String>,
    transcript: Vec<ConversationTurn>,
    asking: bool,
}

/// Work bound to one session generation.
struct Ticket {
    generation: u64,
    token: CancellationToken,
    client: MoonshotClient,
}

impl Ticket {
    /// Runs a remote call unless the generation is cancelled first.
    async fn run<T>(&self, call: impl Future<Output = ClientResult<T>>) -> Result<T, SessionError> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(SessionError::Superseded),
            result = call => result.map_err(SessionError::from),
        }
    }
}

/// Drives one user's session.
pub struct SessionController {
    config: Arc<ClientConfig>,
    transport: Arc<dyn HttpTransport>,
    inner: Mutex<Inner>,
    status: watch::Sender<SessionState>,
}

impl SessionController {
    /// Creates a controller talking to the real API.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransportImpl::new(&config.base_url, config.timeout)
            .map_err(|e| ClientError::configuration(e.to_string()))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a controller over an existing transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let (status, _) = watch::channel(SessionState::Idle);

        Self {
            config: Arc::new(config),
            transport,
            inner: Mutex::new(Inner::default()),
            status,
        }
    }

    /// Sets or removes the credential used for new requests.
    pub async fn set_credential(&self, credential: Option<Credential>) {
        self.inner.lock().await.credential = credential;
    }

    /// Loads the credential from a store. Returns whether one was found.
    pub async fn load_credential(&self, store: &dyn CredentialStore) -> Result<bool, StoreError> {
        let credential = store.load().await?;
        let found = credential.is_some();
        self.set_credential(credential).await;
        Ok(found)
    }

    /// Returns true if a credential is configured.
    pub async fn has_credential(&self) -> bool {
        self.inner.lock().await.credential.is_some()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.status.subscribe()
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.status.borrow()
    }

    /// Returns a snapshot of the transcript in display order.
    pub async fn transcript(&self) -> Vec<ConversationTurn> {
        self.inner.lock().await.transcript.clone()
    }

    /// Returns the cached content the transcript is about.
    pub async fn content(&self) -> Option<String> {
        self.inner.lock().await.content.clone()
    }

    /// Uploads a file, waits for extraction and summarizes it.
    ///
    /// On success the session is `Ready` and the transcript holds exactly one
    /// bot turn with the summary. On failure the session returns to `Idle`.
    #[instrument(skip(self, file), fields(file = %file.name))]
    pub async fn analyze_file(&self, file: UploadedFile) -> Result<String, SessionError> {
        let ticket = self.begin(SessionState::Submitting).await?;

        let result = async {
            if !is_supported(&file.name, file.mime_type.as_deref()) {
                return Err(SessionError::from(ClientError::unsupported_type(&file.name)));
            }

            let handle = ticket.run(ticket.client.submit(&file)).await?;
            self.advance(&ticket, SessionState::Extracting).await?;

            let content = ticket.run(ticket.client.fetch_content(&handle)).await?;
            self.advance(&ticket, SessionState::Analyzing).await?;

            let summary = ticket
                .run(ticket.client.analyze(content.as_str(), SUMMARY_PROMPT))
                .await?;
            Ok::<_, SessionError>((content.into_inner(), summary))
        }
        .await;

        self.finish(&ticket, result).await
    }

    /// Summarizes pasted text, skipping upload and extraction.
    #[instrument(skip(self, text))]
    pub async fn analyze_text(&self, text: impl Into<String>) -> Result<String, SessionError> {
        let text = text.into();
        let ticket = self.begin(SessionState::Analyzing).await?;

        let result = ticket
            .run(ticket.client.analyze(&text, SUMMARY_PROMPT))
            .await
            .map(|summary| (text, summary));

        self.finish(&ticket, result).await
    }

    /// Asks a follow-up question about the cached content.
    ///
    /// The question is appended to the transcript immediately. The reply, or
    /// an apology if the call fails, is appended when it arrives and
    /// returned.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, question: &str) -> Result<ConversationTurn, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        let (ticket, content) = {
            let mut inner = self.inner.lock().await;

            if inner.state != SessionState::Ready {
                return Err(SessionError::NotReady);
            }
            if inner.asking {
                return Err(SessionError::Busy);
            }
            let credential = inner
                .credential
                .clone()
                .ok_or(SessionError::CredentialRequired)?;
            let content = inner.content.clone().ok_or(SessionError::NotReady)?;

            inner.transcript.push(ConversationTurn::user(question));
            inner.asking = true;

            (self.ticket(&inner, credential), content)
        };

        let reply = ticket
            .run(
                ticket
                    .client
                    .analyze(&follow_up(&content, question), FOLLOW_UP_INSTRUCTION),
            )
            .await;

        let mut inner = self.inner.lock().await;
        if inner.generation != ticket.generation {
            return Err(SessionError::Superseded);
        }
        inner.asking = false;

        let turn = match reply {
            Ok(text) => ConversationTurn::bot(text),
            Err(SessionError::Client(err)) => {
                tracing::warn!(error = %err, kind = %err.kind(), "Follow-up question failed");
                ConversationTurn::bot(apology(err.message()))
            }
            Err(other) => return Err(other),
        };

        inner.transcript.push(turn.clone());
        Ok(turn)
    }

    /// Starts a new session: cancels in-flight work and clears content and
    /// transcript. The credential is kept.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;

        inner.token.cancel();
        inner.token = CancellationToken::new();
        inner.generation += 1;
        inner.state = SessionState::Idle;
        inner.content = None;
        inner.transcript.clear();
        inner.asking = false;

        self.status.send_replace(SessionState::Idle);
        tracing::info!(generation = inner.generation, "Session reset");
    }

    fn ticket(&self, inner: &Inner, credential: Credential) -> Ticket {
        Ticket {
            generation: inner.generation,
            token: inner.token.clone(),
            client: MoonshotClient::with_transport(
                credential,
                Arc::clone(&self.config),
                Arc::clone(&self.transport),
            ),
        }
    }

    async fn begin(&self, state: SessionState) -> Result<Ticket, SessionError> {
        let mut inner = self.inner.lock().await;

        let credential = inner
            .credential
            .clone()
            .ok_or(SessionError::CredentialRequired)?;
        if inner.state != SessionState::Idle {
            return Err(SessionError::Busy);
        }

        inner.state = state;
        self.status.send_replace(state);

        Ok(self.ticket(&inner, credential))
    }

    async fn advance(&self, ticket: &Ticket, state: SessionState) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.generation != ticket.generation {
            return Err(SessionError::Superseded);
        }

        inner.state = state;
        self.status.send_replace(state);
        Ok(())
    }

    async fn finish(
        &self,
        ticket: &Ticket,
        result: Result<(String, String), SessionError>,
    ) -> Result<String, SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.generation != ticket.generation {
            return Err(SessionError::Superseded);
        }

        match result {
            Ok((content, summary)) => {
                inner.content = Some(content);
                inner.transcript = vec![ConversationTurn::bot(summary.clone())];
                inner.state = SessionState::Ready;
                self.status.send_replace(SessionState::Ready);
                Ok(summary)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Analysis failed");
                inner.state = SessionState::Idle;
                inner.content = None;
                self.status.send_replace(SessionState::Idle);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use crate::store::MemoryCredentialStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio_test::assert_ok;

    async fn controller(transport: &Arc<MockTransport>) -> Arc<SessionController> {
        let session = SessionController::with_transport(
            ClientConfig::default(),
            Arc::clone(transport) as Arc<dyn HttpTransport>,
        );
        session
            .set_credential(Some(Credential::new("sk-test").unwrap()))
            .await;
        Arc::new(session)
    }

    async fn ready_with_text(transport: &Arc<MockTransport>) -> Arc<SessionController> {
        let session = controller(transport).await;
        transport.queue_json(&fixtures::completion("Summary."));
        assert_ok!(session.analyze_text("some pasted notes").await);
        session
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let transport = Arc::new(MockTransport::new());
        let session = SessionController::with_transport(
            ClientConfig::default(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        );

        let err = session
            .analyze_file(UploadedFile::new("a.pdf", b"%PDF".to_vec()))
            .await
            .unwrap_err();

        assert_eq!(err, SessionError::CredentialRequired);
        assert!(err.requires_credential_setup());
        assert_eq!(transport.request_count(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_flow_publishes_each_state() {
        let transport = Arc::new(MockTransport::new());
        let latency = Duration::from_millis(10);
        transport.queue(MockResponse::json(&fixtures::upload("f-123")).with_delay(latency));
        transport.queue(MockResponse::empty(202));
        transport.queue_json(&fixtures::content("hello world"));
        transport.queue(MockResponse::json(&fixtures::completion("The reply.")).with_delay(latency));
        let session = controller(&transport).await;
        let mut status = session.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while status.changed().await.is_ok() {
                let state = *status.borrow_and_update();
                seen.push(state);
                if state == SessionState::Ready {
                    break;
                }
            }
            seen
        });

        let summary = session
            .analyze_file(UploadedFile::new("doc.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();

        assert_eq!(summary, "The reply.");
        assert_eq!(
            observer.await.unwrap(),
            vec![
                SessionState::Submitting,
                SessionState::Extracting,
                SessionState::Analyzing,
                SessionState::Ready
            ]
        );

        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].is_bot());
        assert_eq!(transcript[0].text, "The reply.");
        assert_eq!(session.content().await.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_unsupported_file_is_rejected_locally() {
        let transport = Arc::new(MockTransport::new());
        let session = controller(&transport).await;

        let err = session
            .analyze_file(UploadedFile::new("setup.exe", vec![0u8; 4]))
            .await
            .unwrap_err();

        match err {
            SessionError::Client(err) => assert_eq!(err.kind(), ErrorKind::UnsupportedType),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.request_count(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_returns_to_idle() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(401, "Invalid Authentication");
        let session = controller(&transport).await;

        let err = session
            .analyze_file(UploadedFile::new("doc.pdf", b"%PDF".to_vec()))
            .await
            .unwrap_err();

        assert!(err.requires_credential_setup());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.transcript().await.is_empty());
        assert!(session.content().await.is_none());
    }

    #[tokio::test]
    async fn test_text_flow_skips_upload() {
        let transport = Arc::new(MockTransport::new());
        let session = ready_with_text(&transport).await;

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(session.content().await.as_deref(), Some("some pasted notes"));

        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "chat/completions");
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(body["messages"][0]["content"], SUMMARY_PROMPT);
        assert!(SUMMARY_PROMPT.contains("in Chinese"));
        assert_eq!(body["messages"][1]["content"], "some pasted notes");
    }

    #[tokio::test]
    async fn test_blank_text_fails_without_network() {
        let transport = Arc::new(MockTransport::new());
        let session = controller(&transport).await;

        let err = session.analyze_text("   ").await.unwrap_err();

        assert_eq!(err, SessionError::Client(ClientError::content_empty()));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_submission_while_busy_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(
            MockResponse::json(&fixtures::completion("slow")).with_delay(Duration::from_millis(50)),
        );
        let session = controller(&transport).await;

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.analyze_text("first").await }
        });
        tokio::task::yield_now().await;
        while session.state() != SessionState::Analyzing {
            tokio::task::yield_now().await;
        }

        assert_eq!(session.analyze_text("second").await, Err(SessionError::Busy));
        assert_eq!(first.await.unwrap().unwrap(), "slow");

        // Ready still refuses new submissions until reset.
        assert_eq!(session.analyze_text("third").await, Err(SessionError::Busy));
    }

    #[tokio::test]
    async fn test_ask_appends_question_and_reply() {
        let transport = Arc::new(MockTransport::new());
        let session = ready_with_text(&transport).await;
        transport.queue_json(&fixtures::completion("Forty-two."));

        let reply = session.ask("  What is the answer?  ").await.unwrap();

        assert_eq!(reply.text, "Forty-two.");
        let texts: Vec<_> = session
            .transcript()
            .await
            .into_iter()
            .map(|turn| (turn.author, turn.text))
            .collect();
        assert_eq!(
            texts,
            vec![
                (Author::Bot, "Summary.".to_string()),
                (Author::User, "What is the answer?".to_string()),
                (Author::Bot, "Forty-two.".to_string()),
            ]
        );

        let body: serde_json::Value =
            serde_json::from_slice(&transport.last_request().unwrap().body.unwrap()).unwrap();
        assert_eq!(body["messages"][0]["content"], FOLLOW_UP_INSTRUCTION);
        assert_eq!(
            body["messages"][1]["content"],
            follow_up("some pasted notes", "What is the answer?")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_failure_becomes_apology() {
        let transport = Arc::new(MockTransport::new());
        let session = ready_with_text(&transport).await;
        transport.set_default(MockResponse::error(500, "upstream exploded"));

        let reply = session.ask("Why?").await.unwrap();

        assert!(reply.is_bot());
        assert_eq!(reply.text, apology("upstream exploded"));
        assert_eq!(session.transcript().await.len(), 3);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_ask_requires_ready_and_question() {
        let transport = Arc::new(MockTransport::new());
        let session = controller(&transport).await;

        assert_eq!(session.ask("hello").await, Err(SessionError::NotReady));
        assert_eq!(session.ask("   ").await, Err(SessionError::EmptyQuestion));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_session_and_keeps_credential() {
        let transport = Arc::new(MockTransport::new());
        let session = ready_with_text(&transport).await;

        session.reset().await;

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.transcript().await.is_empty());
        assert!(session.content().await.is_none());
        assert!(session.has_credential().await);

        transport.queue_json(&fixtures::completion("Again."));
        assert_eq!(session.analyze_text("new text").await.unwrap(), "Again.");
    }

    #[tokio::test]
    async fn test_reset_supersedes_in_flight_analysis() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(
            MockResponse::json(&fixtures::completion("stale")).with_delay(Duration::from_secs(5)),
        );
        let session = controller(&transport).await;

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.analyze_text("old text").await }
        });
        while session.state() != SessionState::Analyzing {
            tokio::task::yield_now().await;
        }

        session.reset().await;

        assert_eq!(pending.await.unwrap(), Err(SessionError::Superseded));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.transcript().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_credential_from_store() {
        let transport = Arc::new(MockTransport::new());
        let session = SessionController::with_transport(
            ClientConfig::default(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        );
        let store = MemoryCredentialStore::new();

        assert!(!session.load_credential(&store).await.unwrap());
        assert!(!session.has_credential().await);

        store.save(&Credential::new("sk-stored").unwrap()).await.unwrap();
        assert!(session.load_credential(&store).await.unwrap());
        assert!(session.has_credential().await);
    }
}
