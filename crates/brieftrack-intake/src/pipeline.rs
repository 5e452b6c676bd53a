// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The intake pipeline: from an inbound message to a tracked draft order.
//!
//! Every message reaches exactly one final outcome. Transient classifier
//! failures are parked in the retry queue, permanent ones are recorded, and
//! orders are created idempotently per (chat, message).

use brieftrack_core::{
    BriefError, BriefFields, ClassifyError, InboundMessage, OrderStatus, OutboundNotification,
};
use brieftrack_storage::queries::{orders, processed, retry_queue};
use brieftrack_storage::{Actor, NewOrder, NewParseFailure, Order, RetryRequest};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::actions::actor_of;
use crate::cards;
use crate::context::{RuntimeContext, Sender};
use crate::outbound::{alert_admins, refresh_card, send_logged};
use crate::prefilter::{self, PrefilterInput, PrefilterReason};
use crate::readiness::{self, Blocker};
use crate::{Services, sections};

/// Error type recorded when the classifier fails permanently.
pub const API_ERROR: &str = "api_error";
/// Error type recorded when the order row could not be written.
pub const ORDER_CREATE_FAILED: &str = "order_create_failed";
/// `last_error` of a freshly queued retry entry.
pub const TRANSIENT_ERROR: &str = "TRANSIENT_ERROR";

/// Final outcome of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    /// Nothing to do (no text).
    Skipped,
    /// Readiness blockers present; nothing was written.
    NotReady(Vec<Blocker>),
    /// Rejected by the pre-filter and marked processed.
    Filtered(PrefilterReason),
    /// Transient classifier failure; parked in the retry queue.
    Queued,
    /// Permanent classifier failure; recorded and marked processed.
    Failed,
    /// Classified as not a brief, or below the confidence threshold.
    NotABrief { confidence: f64 },
    /// An order for this message already exists.
    AlreadyTracked(i64),
    Created {
        order_id: i64,
        card_message_id: Option<i64>,
    },
    /// The order row could not be written.
    CreateFailed,
    /// Edit applied to an existing order.
    Updated { order_id: i64, card_refreshed: bool },
    /// Edit of a tracked message that did not produce a usable result.
    Unchanged(i64),
}

/// A classified brief about to become an order.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chat_id: i64,
    pub message_id: i64,
    pub topic_id: Option<i64>,
    pub raw_text: String,
    pub sender_username: Option<String>,
    pub fields: BriefFields,
    /// Classifier confidence; `None` for a manual registration.
    pub confidence: Option<f64>,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub enum Admission {
    Created {
        order: Order,
        card_message_id: Option<i64>,
    },
    /// A concurrent run or an earlier attempt already created it.
    Existing(Order),
}

/// Create the draft order, post its card as a reply to the source message,
/// and bind the card to the order.
///
/// Only the database write can fail the call. Card delivery and binding are
/// best-effort and raise an operator alert when they fail.
pub async fn admit(
    services: &Services,
    ctx: &RuntimeContext,
    candidate: Candidate,
    now: DateTime<Utc>,
) -> Result<Admission, BriefError> {
    let db = services.db()?;
    let originals = sections::extract(&candidate.raw_text);
    let creation = orders::create_order(
        db,
        NewOrder {
            chat_id: candidate.chat_id,
            message_id: candidate.message_id,
            topic_id: candidate.topic_id,
            sender_username: candidate.sender_username,
            fields: candidate.fields,
            originals,
            status: OrderStatus::Draft,
            raw_text: Some(candidate.raw_text),
            ai_confidence: candidate.confidence,
            actor: candidate.actor,
        },
        now,
    )
    .await?;

    let order = creation.order;
    if !creation.created {
        info!(
            order_id = order.id,
            chat_id = order.chat_id,
            message_id = order.message_id,
            "order already exists, creation race recovered"
        );
        return Ok(Admission::Existing(order));
    }
    info!(
        order_id = order.id,
        chat_id = order.chat_id,
        message_id = order.message_id,
        confidence = ?candidate.confidence,
        "draft order created"
    );

    let card = OutboundNotification::text(
        order.chat_id,
        order.topic_id,
        cards::render_card(&order, ctx.local_date(now)),
    )
    .replying_to(order.message_id)
    .with_buttons(cards::card_buttons(&order));

    let notifier = services.notifier.as_ref();
    let Some(card_id) = send_logged(notifier, &card).await else {
        alert_admins(
            notifier,
            ctx,
            order.chat_id,
            order.topic_id,
            Some(order.message_id),
            &format!(
                "Order {} was saved but its card could not be sent.",
                cards::order_ref(order.id)
            ),
        )
        .await;
        return Ok(Admission::Created {
            order,
            card_message_id: None,
        });
    };

    if let Err(e) = orders::bind_bot_message(db, order.id, card_id, now).await {
        error!(order_id = order.id, message_id = card_id, error = %e, "card binding failed");
        alert_admins(
            notifier,
            ctx,
            order.chat_id,
            order.topic_id,
            Some(order.message_id),
            &format!(
                "Order {} card was sent but could not be linked; its buttons may not update.",
                cards::order_ref(order.id)
            ),
        )
        .await;
    }

    Ok(Admission::Created {
        order,
        card_message_id: Some(card_id),
    })
}

/// Runs new and edited messages through detection.
#[derive(Clone)]
pub struct IntakePipeline {
    services: Services,
}

impl IntakePipeline {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Full pipeline for a new message (or an edit of an untracked one).
    pub async fn process(
        &self,
        msg: &InboundMessage,
    ) -> Result<IntakeOutcome, BriefError> {
        let ctx = self.services.context.load();
        let (chat_id, message_id) = (msg.chat_id, msg.message_id);

        let Some(text) = msg.trimmed_text() else {
            debug!(chat_id, message_id, "message skipped: no text");
            return Ok(IntakeOutcome::Skipped);
        };

        let report = readiness::evaluate(&ctx.config);
        if !report.is_ready() {
            warn!(
                chat_id,
                message_id,
                blockers = ?report.blocker_codes(),
                "message skipped: service not ready"
            );
            return Ok(IntakeOutcome::NotReady(report.blockers));
        }

        let sender = Sender::from_message(msg);
        let decision = prefilter::evaluate(
            PrefilterInput {
                text: Some(text),
                is_forwarded: msg.is_forwarded,
                is_teamlead: ctx.roles.is_teamlead(&sender),
            },
            &ctx.config.intake,
        );
        let db = self.services.db()?;
        if !decision.accept {
            info!(
                chat_id,
                message_id,
                reason = %decision.reason,
                text_len = decision.text_len,
                score = ?decision.score,
                "message rejected by pre-filter"
            );
            processed::mark_processed(db, chat_id, message_id, false, Utc::now()).await?;
            return Ok(IntakeOutcome::Filtered(decision.reason));
        }
        debug!(
            chat_id,
            message_id,
            reason = %decision.reason,
            text_len = decision.text_len,
            score = ?decision.score,
            direct_marker = ?decision.direct_marker,
            "pre-filter accepted message"
        );

        let classification = match self.services.classifier.classify(text, msg.has_photo).await {
            Ok(c) => c,
            Err(ClassifyError::Transient { message }) => {
                warn!(chat_id, message_id, error = %message, "classification deferred to retry queue");
                retry_queue::enqueue(
                    db,
                    RetryRequest {
                        chat_id,
                        message_id,
                        topic_id: msg.topic_id,
                        raw_text: text.to_string(),
                        has_photo: msg.has_photo,
                        sender_username: msg.sender_username.clone(),
                        last_error: Some(TRANSIENT_ERROR.to_string()),
                    },
                    Utc::now(),
                )
                .await?;
                return Ok(IntakeOutcome::Queued);
            }
            Err(ClassifyError::Permanent { message }) => {
                error!(chat_id, message_id, error = %message, "classification failed permanently");
                processed::record_failure(
                    db,
                    NewParseFailure {
                        chat_id,
                        message_id,
                        raw_text: Some(text.to_string()),
                        error_type: API_ERROR.to_string(),
                        detail: Some(message),
                    },
                    Utc::now(),
                )
                .await?;
                alert_admins(
                    self.services.notifier.as_ref(),
                    &ctx,
                    chat_id,
                    msg.topic_id,
                    Some(message_id),
                    "Could not classify this message. If it is a brief, reply to it with /add.",
                )
                .await;
                return Ok(IntakeOutcome::Failed);
            }
        };

        let Some(fields) = classification.accepted_fields(ctx.confidence_threshold()) else {
            info!(
                chat_id,
                message_id,
                is_task = classification.is_task,
                confidence = classification.confidence,
                reason = classification.reason.as_deref().unwrap_or(""),
                "message is not a brief"
            );
            processed::mark_processed(db, chat_id, message_id, false, Utc::now()).await?;
            return Ok(IntakeOutcome::NotABrief {
                confidence: classification.confidence,
            });
        };

        if let Some(existing) = orders::find_by_message(db, chat_id, message_id).await? {
            info!(order_id = existing.id, chat_id, message_id, "message already tracked");
            processed::mark_processed(db, chat_id, message_id, true, Utc::now()).await?;
            return Ok(IntakeOutcome::AlreadyTracked(existing.id));
        }

        let candidate = Candidate {
            chat_id,
            message_id,
            topic_id: msg.topic_id,
            raw_text: text.to_string(),
            sender_username: msg.sender_username.clone(),
            fields: fields.clone(),
            confidence: Some(classification.confidence),
            actor: Actor::bot(),
        };
        match admit(&self.services, &ctx, candidate, Utc::now()).await {
            Ok(Admission::Created {
                order,
                card_message_id,
            }) => Ok(IntakeOutcome::Created {
                order_id: order.id,
                card_message_id,
            }),
            Ok(Admission::Existing(order)) => Ok(IntakeOutcome::AlreadyTracked(order.id)),
            Err(e) => {
                error!(chat_id, message_id, error = %e, "order creation failed");
                if let Err(log_err) = processed::record_failure(
                    db,
                    NewParseFailure {
                        chat_id,
                        message_id,
                        raw_text: Some(text.to_string()),
                        error_type: ORDER_CREATE_FAILED.to_string(),
                        detail: Some(e.to_string()),
                    },
                    Utc::now(),
                )
                .await
                {
                    error!(chat_id, message_id, error = %log_err, "could not record parse failure");
                }
                alert_admins(
                    self.services.notifier.as_ref(),
                    &ctx,
                    chat_id,
                    msg.topic_id,
                    Some(message_id),
                    "A brief was recognised but the order could not be saved. Reply to it with /add to retry.",
                )
                .await;
                Ok(IntakeOutcome::CreateFailed)
            }
        }
    }

    /// Re-classify an edited message.
    ///
    /// Untracked messages go through [`IntakePipeline::process`]. For a
    /// tracked one, a fresh accepted result replaces the extracted fields and
    /// originals and re-renders the card; anything else leaves it untouched.
    pub async fn process_edit(
        &self,
        msg: &InboundMessage,
    ) -> Result<IntakeOutcome, BriefError> {
        let Some(text) = msg.trimmed_text() else {
            return Ok(IntakeOutcome::Skipped);
        };
        let db = self.services.db()?;
        let Some(order) = orders::find_by_message(db, msg.chat_id, msg.message_id).await? else {
            debug!(chat_id = msg.chat_id, message_id = msg.message_id, "edit of untracked message");
            return self.process(msg).await;
        };

        let ctx = self.services.context.load();
        let report = readiness::evaluate(&ctx.config);
        if !report.is_ready() {
            warn!(order_id = order.id, blockers = ?report.blocker_codes(), "edit skipped: service not ready");
            return Ok(IntakeOutcome::NotReady(report.blockers));
        }

        let classification = match self.services.classifier.classify(text, msg.has_photo).await {
            Ok(c) => c,
            Err(e) => {
                warn!(order_id = order.id, error = %e, "edit left unchanged: classification failed");
                return Ok(IntakeOutcome::Unchanged(order.id));
            }
        };
        let Some(fresh) = classification.accepted_fields(ctx.confidence_threshold()) else {
            info!(
                order_id = order.id,
                confidence = classification.confidence,
                "edit left unchanged: not classified as a brief"
            );
            return Ok(IntakeOutcome::Unchanged(order.id));
        };

        let fields = merge_fields(&order.fields, fresh);
        let originals = sections::extract(text);
        let now = Utc::now();
        let actor = actor_of(&Sender::from_message(msg));
        let updated = orders::update_from_edit(
            db,
            order.id,
            fields,
            originals,
            text.to_string(),
            actor,
            now,
        )
        .await?;
        info!(order_id = updated.id, "order updated from edited message");

        let card_refreshed = refresh_card(
            self.services.notifier.as_ref(),
            &ctx,
            &updated,
            now,
        )
        .await;
        Ok(IntakeOutcome::Updated {
            order_id: updated.id,
            card_refreshed,
        })
    }
}

/// Fresh values win; fields the new result leaves empty keep their old value.
pub fn merge_fields(old: &BriefFields, fresh: &BriefFields) -> BriefFields {
    fn pick<T: Clone>(fresh: &Option<T>, old: &Option<T>) -> Option<T> {
        fresh.clone().or_else(|| old.clone())
    }
    BriefFields {
        task_date: pick(&fresh.task_date, &old.task_date),
        deadline: pick(&fresh.deadline, &old.deadline),
        platform: pick(&fresh.platform, &old.platform),
        priority: fresh.priority,
        amount_total: pick(&fresh.amount_total, &old.amount_total),
        amount_paid: pick(&fresh.amount_paid, &old.amount_paid),
        amount_remaining: pick(&fresh.amount_remaining, &old.amount_remaining),
        payment_note: pick(&fresh.payment_note, &old.payment_note),
        duration: pick(&fresh.duration, &old.duration),
        description: pick(&fresh.description, &old.description),
        outfit: pick(&fresh.outfit, &old.outfit),
        notes: pick(&fresh.notes, &old.notes),
        fan_link: pick(&fresh.fan_link, &old.fan_link),
        fan_name: pick(&fresh.fan_name, &old.fan_name),
    }
}
