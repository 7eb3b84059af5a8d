use async_trait::async_trait;
use depthcast_core::ClientId;
use depthcast_server::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub struct SentAnswer {
    pub client_id: ClientId,
    pub sdp: String,
}

/// SignalingOutput that captures every answer the session manager sends.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<SentAnswer>,
    answers: Arc<Mutex<Vec<SentAnswer>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentAnswer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            answers: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    pub async fn answer_for(&self, client_id: &ClientId) -> Option<String> {
        self.answers
            .lock()
            .await
            .iter()
            .find(|a| a.client_id == *client_id)
            .map(|a| a.sdp.clone())
    }

    pub async fn answer_count(&self) -> usize {
        self.answers.lock().await.len()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_answer(&self, client_id: ClientId, sdp: String) {
        tracing::debug!("[MockSignaling] send_answer to {}", client_id);

        let answer = SentAnswer { client_id, sdp };
        self.answers.lock().await.push(answer.clone());
        let _ = self.tx.send(answer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_captures_answer() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let client_id = ClientId::new();

        signaling.send_answer(client_id, "test-sdp".into()).await;

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.client_id, client_id);
        assert_eq!(
            signaling.answer_for(&client_id).await.as_deref(),
            Some("test-sdp")
        );
    }
}
