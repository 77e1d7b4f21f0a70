//! Event fanout - best-effort mirror of incoming events to subscribers

use async_trait::async_trait;

use crate::error::FanoutError;

/// Topic every incoming event is mirrored to.
pub const EVENTS_TOPIC: &str = "events";

/// Publish/subscribe side channel.
///
/// Publishing is best-effort from the pipeline's point of view: the caller
/// decides whether a failure matters, and the resolution path logs and
/// drops it.
#[async_trait]
pub trait EventBroker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), FanoutError>;
}

/// Fans one message out to a fixed set of subscriber webhook endpoints.
///
/// Every subscriber is attempted even after a failure; the first error is
/// returned so the caller can log it.
pub struct WebhookFanout {
    client: reqwest::Client,
    subscribers: Vec<String>,
}

impl WebhookFanout {
    pub fn new(subscribers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            subscribers,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[async_trait]
impl EventBroker for WebhookFanout {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), FanoutError> {
        let mut first_error = None;

        for url in &self.subscribers {
            let result = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-hashguard-topic", topic)
                .body(payload.to_vec())
                .send()
                .await
                .and_then(|r| r.error_for_status());

            if let Err(e) = result {
                tracing::warn!("Fanout delivery to {} failed: {}", url, e);
                if first_error.is_none() {
                    first_error = Some(FanoutError(e.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_subscribers_is_a_successful_publish() {
        let fanout = WebhookFanout::new(vec![]);
        assert_eq!(fanout.subscriber_count(), 0);

        fanout.publish(EVENTS_TOPIC, b"{}").await.unwrap();
    }
}
