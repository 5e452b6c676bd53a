// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point for inbound events: gating, then dispatch to the pipeline,
//! the command handler, or the action handler.

use std::sync::Arc;

use brieftrack_core::{BriefError, InboundEvent, InboundMessage};
use brieftrack_storage::queries::processed;
use chrono::Utc;
use strum::Display;
use tracing::{debug, info};

use crate::Services;
use crate::actions::ActionHandler;
use crate::commands::{CommandHandler, CommandOutcome};
use crate::pending::PendingState;
use crate::pipeline::{IntakeOutcome, IntakePipeline};
use crate::retry::RetryProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IgnoreReason {
    OtherChat,
    OtherTopic,
    Command,
    Reply,
    NoText,
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Intake(IntakeOutcome),
    /// Consumed as the answer to an open date prompt.
    DateReply,
    /// Button press handled; carries the toast shown to the presser.
    Action(String),
    Command(CommandOutcome),
}

/// Owns the pipeline, the retry processor, the command and action
/// handlers, and the interaction state they share.
#[derive(Clone)]
pub struct IntakeService {
    services: Services,
    pipeline: IntakePipeline,
    retry: RetryProcessor,
    actions: ActionHandler,
    commands: CommandHandler,
    pending: Arc<PendingState>,
}

impl IntakeService {
    pub fn new(services: Services) -> Self {
        let pending = Arc::new(PendingState::default());
        Self {
            pipeline: IntakePipeline::new(services.clone()),
            retry: RetryProcessor::new(services.clone()),
            actions: ActionHandler::new(services.clone(), Arc::clone(&pending)),
            commands: CommandHandler::new(services.clone()),
            services,
            pending,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn pipeline(&self) -> &IntakePipeline {
        &self.pipeline
    }

    pub fn retry_processor(&self) -> &RetryProcessor {
        &self.retry
    }

    pub fn pending(&self) -> &PendingState {
        &self.pending
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Result<EventOutcome, BriefError> {
        match event {
            InboundEvent::Message(msg) => self.handle_message(&msg).await,
            InboundEvent::Callback(cb) => {
                Ok(EventOutcome::Action(self.actions.handle_callback(&cb).await))
            }
        }
    }

    fn gate(&self, msg: &InboundMessage) -> Option<IgnoreReason> {
        let ctx = self.services.context.load();
        if !ctx.is_working_chat(msg.chat_id) {
            debug!(chat_id = msg.chat_id, "message ignored: other chat");
            return Some(IgnoreReason::OtherChat);
        }
        if !ctx.is_working_topic(msg.chat_id, msg.topic_id) {
            info!(
                chat_id = msg.chat_id,
                message_id = msg.message_id,
                topic_id = ?msg.topic_id,
                "message ignored: other topic"
            );
            return Some(IgnoreReason::OtherTopic);
        }
        if msg.is_command() {
            return Some(IgnoreReason::Command);
        }
        if msg.is_real_reply() {
            debug!(message_id = msg.message_id, "message ignored: reply");
            return Some(IgnoreReason::Reply);
        }
        None
    }

    /// Known commands run once per message; anything else stays ignored.
    async fn handle_command(&self, msg: &InboundMessage) -> Result<EventOutcome, BriefError> {
        let ignored = Ok(EventOutcome::Ignored(IgnoreReason::Command));
        if msg.is_edit {
            return ignored;
        }
        let db = self.services.db()?;
        if processed::is_processed(db, msg.chat_id, msg.message_id).await? {
            return Ok(EventOutcome::Ignored(IgnoreReason::AlreadyProcessed));
        }
        let Some(outcome) = self.commands.handle(msg).await? else {
            return ignored;
        };
        processed::mark_processed(db, msg.chat_id, msg.message_id, false, Utc::now()).await?;
        Ok(EventOutcome::Command(outcome))
    }

    async fn handle_message(&self, msg: &InboundMessage) -> Result<EventOutcome, BriefError> {
        match self.gate(msg) {
            Some(IgnoreReason::Command) => return self.handle_command(msg).await,
            Some(reason) => return Ok(EventOutcome::Ignored(reason)),
            None => {}
        }
        if msg.is_edit {
            return Ok(EventOutcome::Intake(self.pipeline.process_edit(msg).await?));
        }
        if self.actions.try_date_reply(msg).await? {
            return Ok(EventOutcome::DateReply);
        }
        if msg.trimmed_text().is_none() {
            return Ok(EventOutcome::Ignored(IgnoreReason::NoText));
        }
        let db = self.services.db()?;
        if processed::is_processed(db, msg.chat_id, msg.message_id).await? {
            debug!(
                chat_id = msg.chat_id,
                message_id = msg.message_id,
                "message skipped: already processed"
            );
            return Ok(EventOutcome::Ignored(IgnoreReason::AlreadyProcessed));
        }
        Ok(EventOutcome::Intake(self.pipeline.process(msg).await?))
    }
}
