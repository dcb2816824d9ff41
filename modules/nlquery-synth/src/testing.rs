// Test doubles for the synthesizer.
//
// MockChatModel replays one scripted reply for every call and records what
// it was asked, so tests can assert on prompts and on "no call was made".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_client::{AiError, ChatModel, CompletionRequest};
use async_trait::async_trait;

pub struct MockChatModel {
    reply: Result<String, AiError>,
    credential: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockChatModel {
    /// Answer every request with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            credential: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with `err`.
    pub fn failing(err: AiError) -> Self {
        Self {
            reply: Err(err),
            ..Self::replying("")
        }
    }

    /// Report no configured credential.
    pub fn without_credential(mut self) -> Self {
        self.credential = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn model(&self) -> &str {
        "mock-model"
    }

    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.reply.clone()
    }
}
