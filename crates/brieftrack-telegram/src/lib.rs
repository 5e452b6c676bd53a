// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for Brieftrack.
//!
//! Long-polls the Bot API via teloxide, forwards messages, edits, and button
//! presses as [`InboundEvent`]s, and implements [`Notifier`] for cards,
//! alerts, and reminders (HTML parse mode, forum topics, inline keyboards).

pub mod handler;
pub mod keyboard;

use async_trait::async_trait;
use brieftrack_config::model::TelegramConfig;
use brieftrack_core::{
    ActionButton, AdapterType, BriefError, HealthStatus, InboundEvent, Notifier,
    OutboundNotification, PluginAdapter,
};
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, MessageId, ParseMode, ReplyParameters, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Inbound events buffered between the poller and the service.
const INBOUND_BUFFER: usize = 100;

/// Telegram transport: inbound polling plus the [`Notifier`] implementation.
pub struct TelegramChannel {
    bot: Bot,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundEvent>>,
    inbound_tx: mpsc::Sender<InboundEvent>,
    polling_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TelegramChannel {
    /// Requires `telegram.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, BriefError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            BriefError::Config("telegram.bot_token is required for the Telegram transport".into())
        })?;

        if token.trim().is_empty() {
            return Err(BriefError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        Ok(Self {
            bot: Bot::new(token),
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: std::sync::Mutex::new(None),
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Start long polling. Calling it again while polling is a no-op.
    pub fn connect(&self) {
        let mut handle = self
            .polling_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if handle.is_some() {
            return;
        }

        let bot = self.bot.clone();
        let messages = self.inbound_tx.clone();
        let edits = self.inbound_tx.clone();
        let callbacks = self.inbound_tx.clone();

        info!("starting Telegram long polling");

        *handle = Some(tokio::spawn(async move {
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(move |msg: Message| {
                    let tx = messages.clone();
                    async move {
                        forward(&tx, InboundEvent::Message(handler::to_inbound_message(&msg, false)))
                            .await;
                        respond(())
                    }
                }))
                .branch(Update::filter_edited_message().endpoint(move |msg: Message| {
                    let tx = edits.clone();
                    async move {
                        forward(&tx, InboundEvent::Message(handler::to_inbound_message(&msg, true)))
                            .await;
                        respond(())
                    }
                }))
                .branch(Update::filter_callback_query().endpoint(move |query: CallbackQuery| {
                    let tx = callbacks.clone();
                    async move {
                        match handler::to_callback_event(&query) {
                            Some(event) => forward(&tx, InboundEvent::Callback(event)).await,
                            None => debug!("ignoring callback without data or message"),
                        }
                        respond(())
                    }
                }));

            Dispatcher::builder(bot, handler)
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        }));
    }

    /// Next inbound event. Fails once the poller is gone.
    pub async fn receive(&self) -> Result<InboundEvent, BriefError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| BriefError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }
}

async fn forward(tx: &mpsc::Sender<InboundEvent>, event: InboundEvent) {
    if tx.send(event).await.is_err() {
        warn!("inbound channel closed, dropping update");
    }
}

fn message_id(id: i64) -> Result<MessageId, BriefError> {
    i32::try_from(id).map(MessageId).map_err(|e| BriefError::Channel {
        message: format!("invalid message id {id}: {e}"),
        source: None,
    })
}

fn request_error(action: &str, e: RequestError) -> BriefError {
    BriefError::Channel {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn is_not_modified(e: &RequestError) -> bool {
    e.to_string().contains("message is not modified")
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, BriefError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), BriefError> {
        debug!("Telegram channel shutting down");
        let handle = self
            .polling_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    async fn send(&self, notification: &OutboundNotification) -> Result<i64, BriefError> {
        let mut request = self
            .bot
            .send_message(ChatId(notification.chat_id), notification.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(topic) = notification.topic_id {
            request = request.message_thread_id(ThreadId(message_id(topic)?));
        }
        if let Some(reply_to) = notification.reply_to_message_id {
            request = request.reply_parameters(
                ReplyParameters::new(message_id(reply_to)?).allow_sending_without_reply(),
            );
        }
        if !notification.buttons.is_empty() {
            request = request.reply_markup(keyboard::inline_keyboard(&notification.buttons));
        }

        let sent = request
            .await
            .map_err(|e| request_error("send message", e))?;
        Ok(i64::from(sent.id.0))
    }

    async fn edit(
        &self,
        chat_id: i64,
        msg_id: i64,
        text: &str,
        buttons: &[Vec<ActionButton>],
    ) -> Result<(), BriefError> {
        let result = self
            .bot
            .edit_message_text(ChatId(chat_id), message_id(msg_id)?, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard::inline_keyboard(buttons))
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(request_error("edit message", e)),
        }
    }

    async fn edit_buttons(
        &self,
        chat_id: i64,
        msg_id: i64,
        buttons: &[Vec<ActionButton>],
    ) -> Result<(), BriefError> {
        let result = self
            .bot
            .edit_message_reply_markup(ChatId(chat_id), message_id(msg_id)?)
            .reply_markup(keyboard::inline_keyboard(buttons))
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(request_error("edit buttons", e)),
        }
    }

    async fn delete(&self, chat_id: i64, msg_id: i64) -> Result<(), BriefError> {
        self.bot
            .delete_message(ChatId(chat_id), message_id(msg_id)?)
            .await
            .map_err(|e| request_error("delete message", e))?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), BriefError> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .text(text)
            .await
            .map_err(|e| request_error("answer callback", e))?;
        Ok(())
    }
}
