use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use teloxide::{error_handlers::ErrorHandler, prelude::*};
use tokio::{sync::mpsc, time::Instant};

use crate::{
    db::conversations::ConversationRepository,
    domain::{Conversation, EventFilter, InboundEvent},
};

use super::media::extract_media;

/// Shared state injected into the dispatcher endpoint.
pub struct SubscriptionState {
    pub filter: EventFilter,
    pub events: mpsc::Sender<InboundEvent>,
    pub registry: ConversationRepository,
}

pub async fn on_message(msg: Message, state: Arc<SubscriptionState>) -> ResponseResult<()> {
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        let seen = Conversation {
            id: msg.chat.id.0,
            name: msg.chat.title().unwrap_or_default().to_string(),
            is_group: true,
        };
        if let Err(err) = state.registry.record(&seen).await {
            tracing::warn!(
                target: "db",
                chat_id = seen.id,
                error = %err,
                "failed to record conversation"
            );
        }
    }

    let sender = msg.from.as_ref().and_then(|user| user.username.as_deref());
    if !state.filter.matches(msg.chat.id.0, sender) {
        return Ok(());
    }

    let event = InboundEvent {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender: sender.map(str::to_string),
        timestamp: msg.date,
        media: extract_media(&msg),
        text: msg.caption().or_else(|| msg.text()).map(str::to_string),
    };
    if state.events.send(event).await.is_err() {
        tracing::debug!(
            target: "telegram",
            message_id = msg.id.0,
            "capture loop has stopped; dropping event"
        );
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum NetworkIssueKind {
    Timeout,
    Connection,
    Other,
}

impl NetworkIssueKind {
    fn label(&self) -> &'static str {
        match self {
            NetworkIssueKind::Timeout => "request timeout",
            NetworkIssueKind::Connection => "connection failure",
            NetworkIssueKind::Other => "network error",
        }
    }
}

/// Failures further apart than this start a new streak.
const STREAK_WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct FailureStreak {
    started_at: Option<Instant>,
    last_at: Option<Instant>,
    consecutive: u32,
}

/// Logs polling failures, tracking how long the network has been failing.
/// The platform retries polling on its own; nothing here restarts anything.
#[derive(Default)]
pub struct ListenerErrorLog {
    streak: Mutex<FailureStreak>,
}

impl ListenerErrorLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn classify(error: &teloxide::RequestError) -> Option<(NetworkIssueKind, Option<String>)> {
        match error {
            teloxide::RequestError::Network(source) => {
                let req_err = source.as_ref();
                let kind = if req_err.is_timeout() {
                    NetworkIssueKind::Timeout
                } else if req_err.is_connect() {
                    NetworkIssueKind::Connection
                } else {
                    NetworkIssueKind::Other
                };
                Some((kind, req_err.url().map(|u| u.to_string())))
            }
            _ => None,
        }
    }

    fn process(&self, error: teloxide::RequestError) {
        let Some((kind, url)) = Self::classify(&error) else {
            tracing::error!(target: "telegram", error = %error, "update listener error");
            return;
        };

        let (consecutive, elapsed) = {
            let mut streak = self.streak.lock();
            let now = Instant::now();
            let stale = streak
                .last_at
                .map(|at| now.duration_since(at) > STREAK_WINDOW)
                .unwrap_or(true);
            if stale {
                streak.started_at = Some(now);
                streak.consecutive = 0;
            }
            streak.last_at = Some(now);
            streak.consecutive = streak.consecutive.saturating_add(1);
            let started = streak.started_at.unwrap_or(now);
            (streak.consecutive, now.duration_since(started))
        };

        tracing::error!(
            target: "telegram",
            issue = kind.label(),
            url = url.as_deref(),
            consecutive,
            failing_for_secs = elapsed.as_secs(),
            error = %error,
            "telegram polling network failure"
        );
    }
}

impl ErrorHandler<teloxide::RequestError> for ListenerErrorLog {
    fn handle_error(self: Arc<Self>, error: teloxide::RequestError) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            self.process(error);
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::{
        db::memory_pool,
        domain::MediaKind,
        test_support::{sent_at, telegram_message},
    };

    async fn state_for(sender: &str) -> (Arc<SubscriptionState>, mpsc::Receiver<InboundEvent>) {
        let (events, rx) = mpsc::channel(8);
        let state = Arc::new(SubscriptionState {
            filter: EventFilter {
                chat_id: -100,
                sender_username: sender.to_string(),
            },
            events,
            registry: ConversationRepository::new(memory_pool().await),
        });
        (state, rx)
    }

    fn photo() -> serde_json::Value {
        json!([
            {
                "file_id": "thumb",
                "file_unique_id": "t",
                "file_size": 900,
                "width": 90,
                "height": 67
            },
            {
                "file_id": "full",
                "file_unique_id": "f",
                "file_size": 75245,
                "width": 962,
                "height": 719
            }
        ])
    }

    #[tokio::test]
    async fn matching_media_message_becomes_an_event() {
        let (state, mut rx) = state_for("media_bot").await;
        let msg = telegram_message(json!({ "photo": photo(), "caption": "sunset ✨" }));

        on_message(msg, state).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.chat_id, -100);
        assert_eq!(event.message_id, 4821);
        assert_eq!(event.sender.as_deref(), Some("Media_Bot"));
        assert_eq!(event.timestamp, sent_at(2024, 3, 9, 16, 0, 0));
        assert_eq!(event.text.as_deref(), Some("sunset ✨"));
        let media = event.media.unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.file_id, "full");
    }

    #[tokio::test]
    async fn plain_text_is_forwarded_without_media() {
        let (state, mut rx) = state_for("media_bot").await;
        let msg = telegram_message(json!({ "text": "no attachment here" }));

        on_message(msg, state).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert!(event.media.is_none());
        assert_eq!(event.text.as_deref(), Some("no attachment here"));
    }

    #[tokio::test]
    async fn media_without_caption_has_no_text() {
        let (state, mut rx) = state_for("media_bot").await;
        let msg = telegram_message(json!({ "photo": photo() }));

        on_message(msg, state).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().text, None);
    }

    #[tokio::test]
    async fn other_senders_are_dropped_but_the_group_is_recorded() {
        let (state, mut rx) = state_for("someone_else").await;
        let msg = telegram_message(json!({ "photo": photo() }));

        on_message(msg, state.clone()).await.unwrap();

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        let known = state.registry.list().await.unwrap();
        assert_eq!(
            known,
            vec![Conversation {
                id: -100,
                name: "media".into(),
                is_group: true,
            }]
        );
    }

    #[tokio::test]
    async fn message_without_sender_is_dropped() {
        let (state, mut rx) = state_for("media_bot").await;
        let msg = telegram_message(json!({ "from": null, "photo": photo() }));

        on_message(msg, state.clone()).await.unwrap();

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn other_chats_are_dropped_and_private_chats_not_recorded() {
        let (state, mut rx) = state_for("media_bot").await;
        let elsewhere = telegram_message(json!({
            "chat": { "id": -200, "title": "elsewhere", "type": "group" },
            "photo": photo()
        }));
        let direct = telegram_message(json!({
            "chat": {
                "id": 7,
                "first_name": "Media",
                "username": "Media_Bot",
                "type": "private"
            },
            "text": "hi"
        }));

        on_message(elsewhere, state.clone()).await.unwrap();
        on_message(direct, state.clone()).await.unwrap();

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        let known = state.registry.list().await.unwrap();
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].id, -200);
        assert_eq!(known[0].name, "elsewhere");
    }

    #[tokio::test]
    async fn stopped_capture_loop_does_not_fail_the_handler() {
        let (state, rx) = state_for("media_bot").await;
        drop(rx);

        let msg = telegram_message(json!({ "photo": photo() }));
        assert!(on_message(msg, state).await.is_ok());
    }
}
