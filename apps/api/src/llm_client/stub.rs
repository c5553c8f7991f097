//! Deterministic in-process backend for pipeline and route tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationBackend, GenerationError};

pub struct StubBackend {
    reply: Result<String, (u16, String)>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl StubBackend {
    pub fn replying(text: &str) -> Self {
        Self::new(Ok(text.to_string()))
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self::new(Err((status, body.to_string())))
    }

    fn new(reply: Result<String, (u16, String)>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(GenerationError::Api {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}
