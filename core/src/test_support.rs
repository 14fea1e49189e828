//! Scripted completion client used across the test suites.

use crate::ai::{CompletionClient, CompletionError, CompletionRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    captured: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.captured.lock().unwrap().len()
    }

    pub fn captured(&self) -> Vec<CompletionRequest> {
        self.captured.lock().unwrap().clone()
    }

    pub fn captured_instructions(&self) -> Vec<String> {
        self.captured
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.system_instruction.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.captured.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(CompletionError::Network {
                message: "script exhausted".into(),
            })
        })
    }
}

/// A well-formed sentinel envelope for chapter `number`.
pub(crate) fn enveloped_chapter(number: u32, body: &str) -> String {
    format!(
        "***TL_START***\nTranslated Title [Chapter {number}]\n\n{body}\n\nhttps://example.com/novel/{number}/\n***TL_END***"
    )
}

pub(crate) fn network_error() -> CompletionError {
    CompletionError::Network {
        message: "connection reset".into(),
    }
}

pub(crate) fn blocked_error() -> CompletionError {
    CompletionError::AccessDenied {
        message: "blocked by upstream".into(),
    }
}
