pub mod webhook;

use core::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

pub use webhook::WebhookDispatcher;

/// Discord rejects messages over 2000 characters; this leaves some headroom
pub const DEFAULT_MESSAGE_BUDGET: usize = 1900;

/// Separator placed between announcements packed into the same chunk
pub const JOINER: char = '\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Delivered,
    Simulated,
}

/// Outbound side of the chat integration
#[async_trait]
pub trait Dispatcher: Send + Sync + fmt::Debug {
    async fn dispatch(&self, channel: &str, text: &str) -> DispatchResult<Delivery>;
}

pub type DispatchResult<T> = core::result::Result<T, DispatchErr>;

#[derive(Debug, Error)]
pub enum DispatchErr {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("channel responded with {0}")]
    Status(StatusCode),
}

/// Logs what would have been sent and keeps a copy for inspection
#[derive(Debug, Default)]
pub struct DryRunDispatcher {
    sent: Mutex<Vec<(String, String)>>,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(channel, text)` pair dispatched so far, oldest first
    #[cfg(test)]
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Dispatcher for DryRunDispatcher {
    async fn dispatch(&self, channel: &str, text: &str) -> DispatchResult<Delivery> {
        tracing::info!(channel, content = text, "dry run, would have sent message");
        self.sent
            .lock()
            .await
            .push((channel.to_string(), text.to_string()));

        Ok(Delivery::Simulated)
    }
}

/// Packs messages greedily into chunks of at most `budget` characters, joined by [`JOINER`].
///
/// Order is preserved and joining the chunks with [`JOINER`] gives back the joined input. The one
/// exception is a single message longer than `budget` on its own, which gets cut into
/// budget-sized pieces.
pub fn chunk_messages<S: AsRef<str>>(messages: &[S], budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    let joiner = JOINER.to_string();
    for message in messages.iter().map(AsRef::as_ref) {
        let len = message.chars().count();

        if len > budget {
            if !current.is_empty() {
                chunks.push(current.join(&joiner));
                current.clear();
                current_len = 0;
            }

            tracing::warn!(len, budget, "message exceeds budget on its own, splitting");
            let chars: Vec<char> = message.chars().collect();
            chunks.extend(chars.chunks(budget).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        let needed = match current.is_empty() {
            true => len,
            false => current_len + 1 + len,
        };

        if needed > budget {
            chunks.push(current.join(&joiner));
            current = vec![message];
            current_len = len;
        } else {
            current.push(message);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(&joiner));
    }

    chunks
}

#[cfg(test)]
mod test {
    use super::*;

    fn announcements(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("Member {i:03} completed Day {} Part {} at {}!", i % 25 + 1, i % 2 + 1, 1_701_432_000 + i))
            .collect()
    }

    #[test]
    fn test_chunks_stay_within_budget_and_preserve_order() {
        let messages = announcements(80);
        let joined = messages.join("\n");
        assert!(joined.chars().count() > DEFAULT_MESSAGE_BUDGET);

        let chunks = chunk_messages(&messages, DEFAULT_MESSAGE_BUDGET);

        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= DEFAULT_MESSAGE_BUDGET));
        assert_eq!(chunks.join("\n"), joined);
    }

    #[test]
    fn test_exact_fit_counts_joiner() {
        let messages = vec!["a".repeat(10), "b".repeat(10), "c".repeat(10)];

        // 10 + 1 + 10 fits, adding the third would need 32
        assert_eq!(
            chunk_messages(&messages, 21),
            vec![format!("{}\n{}", messages[0], messages[1]), messages[2].clone()]
        );

        assert_eq!(chunk_messages(&messages, 32).len(), 1);
        assert_eq!(chunk_messages(&messages, 31).len(), 2);
    }

    #[test]
    fn test_small_input_is_one_chunk() {
        let messages = announcements(3);
        assert_eq!(chunk_messages(&messages, DEFAULT_MESSAGE_BUDGET), vec![messages.join("\n")]);

        let empty: Vec<String> = Vec::new();
        assert!(chunk_messages(&empty, DEFAULT_MESSAGE_BUDGET).is_empty());
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let messages = vec!["★".repeat(5), "★".repeat(5)];
        assert_eq!(chunk_messages(&messages, 11).len(), 1);
    }

    #[test]
    fn test_oversized_message_is_split() {
        let messages = vec!["short".to_string(), "x".repeat(25), "tail".to_string()];
        let chunks = chunk_messages(&messages, 10);

        assert_eq!(chunks, vec!["short", "xxxxxxxxxx", "xxxxxxxxxx", "xxxxx", "tail"]);
    }

    #[tokio::test]
    async fn test_dry_run_records() {
        let dispatcher = DryRunDispatcher::new();

        let first = dispatcher.dispatch("announcements", "one").await.unwrap();
        dispatcher.dispatch("announcements", "two").await.unwrap();

        assert_eq!(first, Delivery::Simulated);
        assert_eq!(
            dispatcher.sent().await,
            vec![
                ("announcements".to_string(), "one".to_string()),
                ("announcements".to_string(), "two".to_string()),
            ]
        );
    }
}
