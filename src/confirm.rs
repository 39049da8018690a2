//! Human confirmation for tool calls that have side effects.
//!
//! The gate is the one place a block's processing waits on a person. A gate
//! that cannot reach anyone rejects; it never approves by default.

use async_trait::async_trait;
use log::warn;
use tokio::sync::{mpsc, oneshot};

use crate::llm::ToolCall;

/// Verdict on one confirmation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub approved: bool,
    /// Free-text feedback, passed to the model on rejection
    pub feedback: Option<String>,
}

impl Confirmation {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: None,
        }
    }

    pub fn reject(feedback: Option<String>) -> Self {
        Self {
            approved: false,
            feedback: feedback.filter(|f| !f.trim().is_empty()),
        }
    }
}

/// Asks a human whether an unsafe tool call may run.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn request(&self, call: &ToolCall, description: &str) -> Confirmation;
}

/// Approves everything (`--yes`)
pub struct AutoApprove;

#[async_trait]
impl ConfirmationGate for AutoApprove {
    async fn request(&self, _call: &ToolCall, _description: &str) -> Confirmation {
        Confirmation::approve()
    }
}

/// Rejects everything, optionally with fixed feedback
#[derive(Default)]
pub struct AutoReject {
    pub feedback: Option<String>,
}

impl AutoReject {
    pub fn with_feedback(feedback: impl Into<String>) -> Self {
        Self {
            feedback: Some(feedback.into()),
        }
    }
}

#[async_trait]
impl ConfirmationGate for AutoReject {
    async fn request(&self, _call: &ToolCall, _description: &str) -> Confirmation {
        Confirmation::reject(self.feedback.clone())
    }
}

/// Request sent to whoever answers confirmations (a terminal, a UI).
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub call: ToolCall,
    /// Human-readable summary of the call
    pub description: String,
    /// Oneshot channel to send the verdict back to the tool loop
    pub response_tx: oneshot::Sender<Confirmation>,
}

/// Forwards requests over a channel and suspends until answered.
#[derive(Clone)]
pub struct ChannelGate {
    tx: mpsc::Sender<ConfirmationRequest>,
}

impl ChannelGate {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConfirmationRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ConfirmationGate for ChannelGate {
    async fn request(&self, call: &ToolCall, description: &str) -> Confirmation {
        let (response_tx, response_rx) = oneshot::channel();
        let request = ConfirmationRequest {
            call: call.clone(),
            description: description.to_string(),
            response_tx,
        };

        if self.tx.send(request).await.is_err() {
            warn!("Confirmation channel closed; rejecting {}", call.name);
            return Confirmation::reject(None);
        }

        response_rx.await.unwrap_or_else(|_| {
            warn!("Confirmation for {} dropped unanswered; rejecting", call.name);
            Confirmation::reject(None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> ToolCall {
        ToolCall::new("call_1", "save_file", serde_json::json!({"path": "a.md"}))
    }

    #[tokio::test]
    async fn test_auto_gates() {
        assert!(AutoApprove.request(&call(), "").await.approved);

        let verdict = AutoReject::with_feedback("not now").request(&call(), "").await;
        assert!(!verdict.approved);
        assert_eq!(verdict.feedback.as_deref(), Some("not now"));
    }

    #[test]
    fn test_blank_feedback_is_none() {
        assert_eq!(Confirmation::reject(Some("  ".to_string())).feedback, None);
    }

    #[tokio::test]
    async fn test_channel_gate_round_trip() {
        let (gate, mut rx) = ChannelGate::new(1);

        let responder = tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.call.name, "save_file");
            assert_eq!(request.description, "save it");
            request
                .response_tx
                .send(Confirmation::reject(Some("use another folder".to_string())))
                .unwrap();
        });

        let verdict = gate.request(&call(), "save it").await;
        responder.await.unwrap();
        assert_eq!(verdict, Confirmation::reject(Some("use another folder".to_string())));
    }

    #[tokio::test]
    async fn test_channel_gate_rejects_when_receiver_gone() {
        let (gate, rx) = ChannelGate::new(1);
        drop(rx);
        assert!(!gate.request(&call(), "").await.approved);
    }

    #[tokio::test]
    async fn test_channel_gate_rejects_when_request_dropped() {
        let (gate, mut rx) = ChannelGate::new(1);
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            drop(request);
        });
        assert!(!gate.request(&call(), "").await.approved);
    }
}
