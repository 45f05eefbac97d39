use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    error_handlers::LoggingErrorHandler,
    net::Download,
    prelude::*,
    types::FileId,
    update_listeners,
};
use tokio::{fs, sync::mpsc, task::JoinHandle, time::timeout};
use url::Url;

use crate::{
    config::AppConfig,
    db::{self, conversations::ConversationRepository},
    domain::{Conversation, EventFilter, InboundEvent},
    infrastructure::{directories::ResolvedPaths, shutdown::ShutdownListener},
    platform::{ChatPlatform, EventStream, PlatformError, PlatformResult},
};

use super::{
    listener::{on_message, ListenerErrorLog, SubscriptionState},
    media::native_file_name,
};

const EVENT_BUFFER: usize = 64;
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_RETRY: Duration = Duration::from_millis(50);

struct RunningDispatcher {
    token: ShutdownToken,
    handle: JoinHandle<Result<(), teloxide::RequestError>>,
}

/// Bot API backed [`ChatPlatform`].
pub struct TelegramPlatform {
    bot: Bot,
    registry: ConversationRepository,
    seed_chat_ids: Vec<i64>,
    dispatcher: Mutex<Option<RunningDispatcher>>,
}

impl TelegramPlatform {
    pub async fn connect(config: &AppConfig, paths: &ResolvedPaths) -> Result<Self> {
        let bot = build_bot(&config.telegram_bot_token, config.telegram_api_url.as_ref())?;

        let me = bot.get_me().await.context("telegram authentication failed")?;
        tracing::info!(
            target: "telegram",
            bot_id = me.id.0,
            username = ?me.username,
            "telegram bot connected"
        );

        let pool = db::init_pool(&paths.db_path)
            .await
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;

        let mut seed_chat_ids = config.known_chat_ids.clone();
        if let Some(id) = config.target_group.id {
            if !seed_chat_ids.contains(&id) {
                seed_chat_ids.push(id);
            }
        }

        Ok(Self::new(bot, ConversationRepository::new(pool), seed_chat_ids))
    }

    fn new(bot: Bot, registry: ConversationRepository, seed_chat_ids: Vec<i64>) -> Self {
        Self {
            bot,
            registry,
            seed_chat_ids,
            dispatcher: Mutex::new(None),
        }
    }

    async fn refresh_seeded_chats(&self) -> PlatformResult<()> {
        for &chat_id in &self.seed_chat_ids {
            match self.bot.get_chat(ChatId(chat_id)).await {
                Ok(chat) => {
                    let conversation = Conversation {
                        id: chat_id,
                        name: chat.title().unwrap_or_default().to_string(),
                        is_group: chat.is_group() || chat.is_supergroup(),
                    };
                    self.registry.record(&conversation).await?;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "telegram",
                        chat_id,
                        error = %err,
                        "failed to fetch configured chat; is the bot a member?"
                    );
                }
            }
        }
        Ok(())
    }

    /// Stops the dispatcher task and reports how it ended. The task polls the
    /// dispatcher itself, so only the join is awaited here.
    async fn stop_dispatcher(&self) -> PlatformResult<()> {
        let running = self.dispatcher.lock().take();
        let Some(RunningDispatcher { token, mut handle }) = running else {
            return Ok(());
        };
        // Idle means it already returned or never got past startup.
        let _ = token.shutdown();
        match timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(result)) => result.map_err(PlatformError::from),
            Ok(Err(panicked)) => Err(panicked.into()),
            Err(_) => {
                tracing::warn!(
                    target: "telegram",
                    "dispatcher did not stop within {:?}; aborting it",
                    STOP_TIMEOUT
                );
                handle.abort();
                Ok(())
            }
        }
    }

    /// Writes the server-side file to `destination`. A local Bot API server
    /// started with `--local` hands out absolute paths on its own disk.
    async fn fetch_file(&self, server_path: &str, destination: &Path) -> PlatformResult<()> {
        if Path::new(server_path).is_absolute() {
            fs::copy(server_path, destination).await?;
            return Ok(());
        }
        let mut file = fs::File::create(destination).await?;
        self.bot.download_file(server_path, &mut file).await?;
        file.sync_all().await?;
        Ok(())
    }
}

fn build_bot(token: &str, api_url: Option<&Url>) -> Result<Bot> {
    let client: reqwest::Client = teloxide::net::default_reqwest_settings()
        .user_agent(format!("tg-relay/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")?;
    let bot = Bot::with_client(token, client);
    Ok(match api_url {
        Some(url) => {
            tracing::info!(target: "telegram", api_url = %url, "using custom bot api server");
            bot.set_api_url(url.clone())
        }
        None => bot,
    })
}

/// Keeps asking the dispatcher to shut down until it leaves the idle state
/// it is in while startup (`getMe`) is still running. Never resolves.
async fn request_stop(token: &ShutdownToken) {
    while token.shutdown().is_err() {
        tokio::time::sleep(STOP_RETRY).await;
    }
    std::future::pending::<()>().await
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn conversations(&self) -> PlatformResult<Vec<Conversation>> {
        self.refresh_seeded_chats().await?;
        Ok(self.registry.list().await?)
    }

    async fn subscribe(
        &self,
        filter: EventFilter,
        mut shutdown: ShutdownListener,
    ) -> PlatformResult<EventStream> {
        if self.dispatcher.lock().is_some() {
            return Err(PlatformError::Other(
                "a subscription is already running".to_string(),
            ));
        }

        let (events, stream) = mpsc::channel(EVENT_BUFFER);
        let state = Arc::new(SubscriptionState {
            filter,
            events,
            registry: self.registry.clone(),
        });

        let handler = Update::filter_message().endpoint(on_message);
        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![state])
            .default_handler(|update| async move {
                tracing::debug!(target: "telegram", update_id = ?update.id, "unhandled update");
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "error in capture update handler",
            ))
            .build();

        let listener = update_listeners::polling_default(self.bot.clone()).await;
        let token = dispatcher.shutdown_token();
        let stop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut dispatch =
                Box::pin(dispatcher.try_dispatch_with_listener(listener, ListenerErrorLog::new()));
            // Shutdown completes inside `dispatch`, so it must keep being polled.
            let result = tokio::select! {
                result = &mut dispatch => result,
                _ = shutdown.notified() => {
                    tracing::info!(target: "telegram", "stopping update dispatcher");
                    tokio::select! {
                        result = &mut dispatch => result,
                        _ = request_stop(&stop_token) => Ok(()),
                    }
                }
            };
            match &result {
                Ok(()) => tracing::info!(target: "telegram", "update dispatcher stopped"),
                Err(err) => tracing::error!(
                    target: "telegram",
                    error = %err,
                    "update dispatcher failed to start"
                ),
            }
            result
        });

        *self.dispatcher.lock() = Some(RunningDispatcher { token, handle });
        Ok(stream)
    }

    async fn download_media(
        &self,
        event: &InboundEvent,
        folder: &Path,
    ) -> PlatformResult<PathBuf> {
        let media = event
            .media
            .as_ref()
            .ok_or(PlatformError::NoMedia(event.message_id))?;

        let file = self.bot.get_file(FileId(media.file_id.clone())).await?;
        let path = folder.join(native_file_name(media, event.timestamp, &file.path));

        if let Err(err) = self.fetch_file(&file.path, &path).await {
            let _ = fs::remove_file(&path).await;
            return Err(err);
        }
        Ok(path)
    }

    async fn send_text(&self, conversation: &Conversation, text: &str) -> PlatformResult<()> {
        self.bot
            .send_message(ChatId(conversation.id), text)
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> PlatformResult<()> {
        let stopped = self.stop_dispatcher().await;
        self.registry.close().await;
        tracing::info!(target: "telegram", "telegram client disconnected");
        stopped
    }
}
