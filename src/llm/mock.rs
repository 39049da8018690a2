//! Scripted backend for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::client::{ChatBackend, LlmError};
use super::types::{ChatOptions, ChatResponse};
use crate::transcript::ConversationTurn;

/// One recorded `chat` call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub turns: Vec<ConversationTurn>,
    pub options: ChatOptions,
}

/// Replays queued responses in order, recording every request.
///
/// When the queue is empty the `repeat` response (if any) is returned,
/// otherwise the call fails with `InvalidResponse`.
#[derive(Default)]
pub struct MockBackend {
    queue: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockBackend {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    /// A backend that answers every call with the same response.
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Default::default()
        }
    }

    /// Queue a failure after the responses already queued.
    pub fn push_error(&self, err: LlmError) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(Err(err));
    }

    pub fn push_response(&self, response: ChatResponse) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(Ok(response));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(&self, turns: &[ConversationTurn], options: &ChatOptions) -> Result<ChatResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                turns: turns.to_vec(),
                options: options.clone(),
            });

        let next = self.queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match next {
            Some(result) => result,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| LlmError::InvalidResponse("mock backend has no scripted response".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let mock = MockBackend::new(vec![ChatResponse::text("one", 1, 1), ChatResponse::text("two", 2, 2)]);
        let turns = vec![ConversationTurn::user("hi")];
        let options = ChatOptions::new("m");

        assert_eq!(mock.chat(&turns, &options).await.unwrap().text, "one");
        assert_eq!(mock.chat(&turns, &options).await.unwrap().text, "two");
        assert!(mock.chat(&turns, &options).await.is_err());

        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests()[0].turns, turns);
        assert_eq!(mock.requests()[0].options.model, "m");
    }

    #[tokio::test]
    async fn test_repeating() {
        let mock = MockBackend::repeating(ChatResponse::text("again", 0, 0));
        for _ in 0..3 {
            let response = mock.chat(&[], &ChatOptions::default()).await.unwrap();
            assert_eq!(response.text, "again");
        }
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let mock = MockBackend::default();
        mock.push_error(LlmError::ApiError {
            status: 500,
            message: "boom".to_string(),
        });
        mock.push_response(ChatResponse::text("recovered", 1, 1));

        assert!(mock.chat(&[], &ChatOptions::default()).await.is_err());
        assert_eq!(mock.chat(&[], &ChatOptions::default()).await.unwrap().text, "recovered");
    }
}
