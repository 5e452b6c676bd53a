// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator commands typed in the working topic.
//!
//! `/add`, sent as a reply to a brief, registers it by hand. `/revert <n>`,
//! or a bare `/revert` replying to an order card, steps the order back one
//! status.

use brieftrack_core::{
    BriefError, BriefFields, ClassifyError, InboundMessage, OrderStatus, OutboundNotification,
};
use brieftrack_storage::queries::{orders, processed};
use brieftrack_storage::{NewParseFailure, Order};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::actions::actor_of;
use crate::cards::{escape_html, order_ref};
use crate::context::Sender;
use crate::outbound::{refresh_card, send_logged};
use crate::pipeline::{API_ERROR, Admission, Candidate, admit};
use crate::{Services, readiness};

/// Note on the audit row written by `/revert`.
pub const REVERT_NOTE: &str = "manual_revert_command";

/// Characters of an unrecognised brief kept as its description.
const FALLBACK_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The sender lacks the role for this command.
    Denied,
    /// Malformed invocation; the usage hint was posted.
    Usage,
    /// Not ready, classifier failure, or the order could not be saved.
    Unavailable,
    Registered {
        order_id: i64,
        card_message_id: Option<i64>,
        /// The classifier agreed it is a brief.
        recognised: bool,
    },
    AlreadyTracked(i64),
    Reverted {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },
    /// The order has no earlier status to go back to.
    NotRevertible { order_id: i64, status: OrderStatus },
    NotFound(i64),
}

/// Description-only fields for a message the classifier did not accept.
fn fallback_fields(text: &str) -> BriefFields {
    BriefFields {
        description: Some(text.chars().take(FALLBACK_DESCRIPTION_CHARS).collect()),
        ..Default::default()
    }
}

/// The replied-to message id, unless the reply is just the topic root.
fn replied_id(msg: &InboundMessage) -> Option<i64> {
    msg.reply_to_message_id.filter(|_| msg.is_real_reply())
}

#[derive(Clone)]
pub struct CommandHandler {
    services: Services,
}

impl CommandHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Run a known command. `None` when the message is not one of ours.
    pub async fn handle(&self, msg: &InboundMessage) -> Result<Option<CommandOutcome>, BriefError> {
        let Some((name, args)) = msg.command() else {
            return Ok(None);
        };
        let outcome = match name {
            "add" => self.add(msg).await?,
            "revert" => self.revert(msg, args).await?,
            _ => return Ok(None),
        };
        Ok(Some(outcome))
    }

    async fn reply(&self, msg: &InboundMessage, text: impl Into<String>) {
        let notification = OutboundNotification::text(msg.chat_id, msg.topic_id, text)
            .replying_to(msg.message_id);
        send_logged(self.services.notifier.as_ref(), &notification).await;
    }

    async fn add(&self, msg: &InboundMessage) -> Result<CommandOutcome, BriefError> {
        let ctx = self.services.context.load();
        let sender = Sender::from_message(msg);
        if !ctx.roles.can_register_brief(&sender) {
            info!(sender_id = ?sender.id, "manual registration denied");
            self.reply(msg, "Only admins, teamleads and models can register a brief")
                .await;
            return Ok(CommandOutcome::Denied);
        }

        let Some(source_id) = replied_id(msg) else {
            self.reply(msg, "Use /add as a reply to the message with the brief")
                .await;
            return Ok(CommandOutcome::Usage);
        };
        let Some(text) = msg
            .reply_to_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            self.reply(msg, "That message has no text to read").await;
            return Ok(CommandOutcome::Usage);
        };
        let chat_id = msg.chat_id;

        let db = self.services.db()?;
        if let Some(existing) = orders::find_by_message(db, chat_id, source_id).await? {
            self.reply(
                msg,
                format!("This brief is already order {}", order_ref(existing.id)),
            )
            .await;
            return Ok(CommandOutcome::AlreadyTracked(existing.id));
        }

        let report = readiness::evaluate(&ctx.config);
        if !report.is_ready() {
            warn!(
                chat_id,
                message_id = source_id,
                blockers = ?report.blocker_codes(),
                "manual registration blocked: service not ready"
            );
            self.reply(
                msg,
                "❌ Registration is unavailable: the configuration is not ready. Run brieftrack doctor.",
            )
            .await;
            return Ok(CommandOutcome::Unavailable);
        }

        let classification = match self.services.classifier.classify(text, false).await {
            Ok(c) => c,
            Err(ClassifyError::Transient { message }) => {
                warn!(chat_id, message_id = source_id, error = %message, "manual registration: classifier unavailable");
                self.reply(msg, "Classifier error, try again later").await;
                return Ok(CommandOutcome::Unavailable);
            }
            Err(ClassifyError::Permanent { message }) => {
                error!(chat_id, message_id = source_id, error = %message, "manual registration: classification failed");
                processed::record_failure(
                    db,
                    NewParseFailure {
                        chat_id,
                        message_id: source_id,
                        raw_text: Some(text.to_string()),
                        error_type: API_ERROR.to_string(),
                        detail: Some(format!("/add: {message}")),
                    },
                    Utc::now(),
                )
                .await?;
                self.reply(msg, "The classifier returned an invalid result, try again later")
                    .await;
                return Ok(CommandOutcome::Unavailable);
            }
        };

        // The sender vouches for the message, so any task verdict counts.
        let recognised = classification.is_task;
        let reason = classification.reason.clone().unwrap_or_else(|| "unknown".into());
        let fields = classification
            .data
            .filter(|_| recognised)
            .unwrap_or_else(|| fallback_fields(text));
        let candidate = Candidate {
            chat_id,
            message_id: source_id,
            topic_id: msg.topic_id,
            raw_text: text.to_string(),
            sender_username: None,
            fields,
            confidence: None,
            actor: actor_of(&sender),
        };

        match admit(&self.services, &ctx, candidate, Utc::now()).await {
            Ok(Admission::Created {
                order,
                card_message_id,
            }) => {
                info!(order_id = order.id, sender_id = ?sender.id, recognised, "order registered by hand");
                let reference = order_ref(order.id);
                let text = if recognised {
                    format!("✅ Order {reference} registered by hand")
                } else {
                    format!(
                        "⚠️ Not recognised as a brief ({}), registered as draft {reference} anyway.",
                        escape_html(&reason)
                    )
                };
                self.reply(msg, text).await;
                Ok(CommandOutcome::Registered {
                    order_id: order.id,
                    card_message_id,
                    recognised,
                })
            }
            Ok(Admission::Existing(order)) => {
                self.reply(
                    msg,
                    format!("This brief is already order {}", order_ref(order.id)),
                )
                .await;
                Ok(CommandOutcome::AlreadyTracked(order.id))
            }
            Err(e) => {
                error!(chat_id, message_id = source_id, error = %e, "manual registration failed");
                self.reply(msg, "Could not save the order, try again later").await;
                Ok(CommandOutcome::Unavailable)
            }
        }
    }

    /// The order named by the argument, or the one whose card is replied to.
    async fn revert_target(
        &self,
        msg: &InboundMessage,
        args: &str,
    ) -> Result<Result<Order, CommandOutcome>, BriefError> {
        let db = self.services.db()?;
        if args.is_empty() {
            let Some(card_id) = replied_id(msg) else {
                self.reply(msg, "Usage: /revert <order number>").await;
                return Ok(Err(CommandOutcome::Usage));
            };
            return Ok(match orders::find_by_bot_message(db, msg.chat_id, card_id).await? {
                Some(order) => Ok(order),
                None => {
                    self.reply(msg, "That message is not an order card").await;
                    Err(CommandOutcome::Usage)
                }
            });
        }

        let Ok(order_id) = args.trim_start_matches('#').parse::<i64>() else {
            self.reply(msg, "The order number must be a number").await;
            return Ok(Err(CommandOutcome::Usage));
        };
        Ok(match orders::get_order(db, order_id).await? {
            Some(order) => Ok(order),
            None => {
                self.reply(msg, format!("Order {} not found", order_ref(order_id)))
                    .await;
                Err(CommandOutcome::NotFound(order_id))
            }
        })
    }

    async fn revert(&self, msg: &InboundMessage, args: &str) -> Result<CommandOutcome, BriefError> {
        let ctx = self.services.context.load();
        let sender = Sender::from_message(msg);
        if !ctx.roles.is_admin(&sender) {
            info!(sender_id = ?sender.id, "revert denied");
            self.reply(msg, "Only admins can do this").await;
            return Ok(CommandOutcome::Denied);
        }

        let order = match self.revert_target(msg, args).await? {
            Ok(order) => order,
            Err(outcome) => return Ok(outcome),
        };
        let from = order.status;
        let Some(to) = from.previous() else {
            self.reply(
                msg,
                format!(
                    "Order {} is {} and cannot be reverted",
                    order_ref(order.id),
                    from.label().to_lowercase()
                ),
            )
            .await;
            return Ok(CommandOutcome::NotRevertible {
                order_id: order.id,
                status: from,
            });
        };

        let db = self.services.db()?;
        let now = Utc::now();
        let updated = orders::force_transition(
            db,
            order.id,
            to,
            actor_of(&sender),
            Some(REVERT_NOTE.to_string()),
            now,
        )
        .await?;
        info!(order_id = updated.id, from = %from, to = %to, sender_id = ?sender.id, "order reverted");

        let refreshed = refresh_card(self.services.notifier.as_ref(), &ctx, &updated, now).await;
        let mut text = format!(
            "↩️ Order {} reverted: {} → {}",
            order_ref(updated.id),
            from.label(),
            to.label()
        );
        if !refreshed {
            text.push_str("\n⚠️ The card could not be updated automatically.");
        }
        self.reply(msg, text).await;
        Ok(CommandOutcome::Reverted {
            order_id: updated.id,
            from,
            to,
        })
    }
}
