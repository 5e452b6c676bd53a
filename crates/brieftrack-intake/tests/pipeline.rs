// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intake pipeline tests against a temp database and mock adapters.

use brieftrack_core::{BriefFields, LogKind, OrderAction, OrderStatus, Priority};
use brieftrack_intake::prefilter::PrefilterReason;
use brieftrack_intake::readiness::Blocker;
use brieftrack_intake::{EventOutcome, IgnoreReason, IntakeOutcome};
use brieftrack_storage::queries::{orders, processed, retry_queue, status_log};
use brieftrack_test_utils::harness::{CHAT_ID, TEAMLEAD_ID, TOPIC_ID};
use brieftrack_test_utils::TestHarness;
use chrono::{Duration, NaiveDate, Utc};

const BRIEF: &str = "📦 Order description: custom dance video\n\
                     Payment: $80\n\
                     Task description: dance to the new track\n\
                     Outfit: red dress\n\
                     Deadline: 20.03";

fn fields() -> BriefFields {
    BriefFields {
        amount_total: Some(80.0),
        description: Some("Dance video".into()),
        deadline: NaiveDate::from_ymd_opt(2026, 3, 20),
        priority: Priority::High,
        ..Default::default()
    }
}

#[tokio::test]
async fn brief_becomes_draft_with_bound_card() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.92).await;

    let outcome = h.send(h.message(10, BRIEF)).await.unwrap();
    let EventOutcome::Intake(IntakeOutcome::Created {
        order_id,
        card_message_id,
    }) = outcome
    else {
        panic!("expected Created, got {outcome:?}");
    };

    let order = orders::get_order(h.db(), order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert_eq!(order.message_id, 10);
    assert_eq!(order.ai_confidence, Some(0.92));
    assert_eq!(order.bot_message_id, card_message_id);
    assert_eq!(order.originals.description.as_deref(), Some("dance to the new track"));
    assert_eq!(order.originals.outfit.as_deref(), Some("red dress"));

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reply_to_message_id, Some(10));
    assert_eq!(sent[0].topic_id, Some(TOPIC_ID));
    assert!(sent[0].text.contains("<b>Order #"));
    let actions: Vec<OrderAction> = sent[0].buttons.iter().flatten().map(|b| b.action).collect();
    assert_eq!(actions, vec![OrderAction::ConfirmBrief, OrderAction::NotTask]);

    assert!(processed::is_processed(h.db(), CHAT_ID, 10).await.unwrap());
    let log = status_log::for_order(h.db(), order_id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, LogKind::Created);
}

#[tokio::test]
async fn processed_message_is_not_classified_again() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.9).await;

    h.send(h.message(10, BRIEF)).await.unwrap();
    let again = h.send(h.message(10, BRIEF)).await.unwrap();

    assert_eq!(again, EventOutcome::Ignored(IgnoreReason::AlreadyProcessed));
    assert_eq!(h.classifier.call_count().await, 1);
}

#[tokio::test]
async fn prefilter_rejection_marks_processed_without_classifying() {
    let h = TestHarness::new().await.unwrap();

    let outcome = h.send(h.message(11, "thanks!")).await.unwrap();

    assert_eq!(
        outcome,
        EventOutcome::Intake(IntakeOutcome::Filtered(PrefilterReason::TooShort))
    );
    assert_eq!(h.classifier.call_count().await, 0);
    assert!(processed::is_processed(h.db(), CHAT_ID, 11).await.unwrap());
}

#[tokio::test]
async fn teamlead_messages_skip_heuristics() {
    let h = TestHarness::new().await.unwrap();
    let mut msg = h.message(12, "new one: 5 min clip");
    msg.sender_id = Some(TEAMLEAD_ID);

    h.send(msg).await.unwrap();

    assert_eq!(h.classifier.call_count().await, 1);
}

#[tokio::test]
async fn transient_failure_is_queued_not_processed() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_transient("rate limited").await;

    let outcome = h.send(h.message(13, BRIEF)).await.unwrap();

    assert_eq!(outcome, EventOutcome::Intake(IntakeOutcome::Queued));
    let due = retry_queue::due(h.db(), Utc::now() + Duration::minutes(1), 10)
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].attempt_count, 0);
    assert_eq!(due[0].last_error.as_deref(), Some("TRANSIENT_ERROR"));
    assert!(!processed::is_processed(h.db(), CHAT_ID, 13).await.unwrap());
    assert!(orders::find_by_message(h.db(), CHAT_ID, 13).await.unwrap().is_none());
}

#[tokio::test]
async fn permanent_failure_is_recorded_and_alerted() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_permanent("bad json").await;

    let outcome = h.send(h.message(14, BRIEF)).await.unwrap();

    assert_eq!(outcome, EventOutcome::Intake(IntakeOutcome::Failed));
    let failures = processed::parse_failures(h.db(), 10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error_type, "api_error");
    assert!(processed::is_processed(h.db(), CHAT_ID, 14).await.unwrap());

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("@boss"));
    assert_eq!(sent[0].reply_to_message_id, Some(14));
}

#[tokio::test]
async fn low_confidence_is_not_a_brief() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.5).await;

    let outcome = h.send(h.message(15, BRIEF)).await.unwrap();

    assert_eq!(
        outcome,
        EventOutcome::Intake(IntakeOutcome::NotABrief { confidence: 0.5 })
    );
    assert!(orders::find_by_message(h.db(), CHAT_ID, 15).await.unwrap().is_none());
    assert!(processed::is_processed(h.db(), CHAT_ID, 15).await.unwrap());
}

#[tokio::test]
async fn blockers_stop_processing_before_any_write() {
    let h = TestHarness::builder()
        .with_config(|c| c.anthropic.api_key = None)
        .build()
        .await
        .unwrap();

    let outcome = h.send(h.message(16, BRIEF)).await.unwrap();

    assert_eq!(
        outcome,
        EventOutcome::Intake(IntakeOutcome::NotReady(vec![Blocker::AnthropicApiKeyMissing]))
    );
    assert_eq!(h.classifier.call_count().await, 0);
    assert!(!processed::is_processed(h.db(), CHAT_ID, 16).await.unwrap());
}

#[tokio::test]
async fn gating_ignores_other_topics_commands_and_replies() {
    let h = TestHarness::new().await.unwrap();

    let mut other_topic = h.message(20, BRIEF);
    other_topic.topic_id = Some(99);
    assert_eq!(
        h.send(other_topic).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::OtherTopic)
    );

    let mut other_chat = h.message(21, BRIEF);
    other_chat.chat_id = 555;
    assert_eq!(
        h.send(other_chat).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::OtherChat)
    );

    assert_eq!(
        h.send(h.message(22, "/start")).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::Command)
    );

    let mut reply = h.message(23, BRIEF);
    reply.reply_to_message_id = Some(5);
    assert_eq!(
        h.send(reply).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::Reply)
    );

    // A reply to the topic root is an ordinary message.
    h.classifier.push_not_brief().await;
    let mut root_reply = h.message(24, BRIEF);
    root_reply.reply_to_message_id = Some(TOPIC_ID);
    assert!(matches!(
        h.send(root_reply).await.unwrap(),
        EventOutcome::Intake(IntakeOutcome::NotABrief { .. })
    ));
    assert_eq!(h.classifier.call_count().await, 1);
}

#[tokio::test]
async fn card_send_failure_keeps_the_order() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.9).await;
    h.notifier.fail_sends(true);

    let outcome = h.send(h.message(30, BRIEF)).await.unwrap();

    let EventOutcome::Intake(IntakeOutcome::Created {
        order_id,
        card_message_id: None,
    }) = outcome
    else {
        panic!("expected Created without card, got {outcome:?}");
    };
    let order = orders::get_order(h.db(), order_id).await.unwrap().unwrap();
    assert_eq!(order.bot_message_id, None);
    assert!(processed::is_processed(h.db(), CHAT_ID, 30).await.unwrap());
}

#[tokio::test]
async fn edit_updates_tracked_order_and_card() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.9).await;
    let EventOutcome::Intake(IntakeOutcome::Created {
        order_id,
        card_message_id: Some(card),
    }) = h.send(h.message(40, BRIEF)).await.unwrap()
    else {
        panic!("expected Created");
    };

    h.classifier
        .push_brief(
            BriefFields {
                amount_total: Some(120.0),
                ..fields()
            },
            0.95,
        )
        .await;
    let mut edit = h.message(40, &BRIEF.replace("$80", "$120"));
    edit.is_edit = true;
    let outcome = h.send(edit).await.unwrap();

    assert_eq!(
        outcome,
        EventOutcome::Intake(IntakeOutcome::Updated {
            order_id,
            card_refreshed: true
        })
    );
    let order = orders::get_order(h.db(), order_id).await.unwrap().unwrap();
    assert_eq!(order.fields.amount_total, Some(120.0));
    assert!(order.raw_text.unwrap().contains("$120"));
    assert_eq!(order.status, OrderStatus::Draft);
    assert_eq!(status_log::for_order(h.db(), order_id).await.unwrap().len(), 1);

    let edits = h.notifier.edits().await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, card);
    assert!(edits[0].1.contains("$120"));
}

#[tokio::test]
async fn failed_edit_classification_leaves_order_untouched() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.9).await;
    h.send(h.message(41, BRIEF)).await.unwrap();
    let before = orders::find_by_message(h.db(), CHAT_ID, 41)
        .await
        .unwrap()
        .unwrap();

    h.classifier.push_transient("timeout").await;
    let mut edit = h.message(41, "changed text entirely, still long enough");
    edit.is_edit = true;
    let outcome = h.send(edit).await.unwrap();

    assert_eq!(outcome, EventOutcome::Intake(IntakeOutcome::Unchanged(before.id)));
    let after = orders::get_order(h.db(), before.id).await.unwrap().unwrap();
    assert_eq!(after.raw_text, before.raw_text);
    assert_eq!(retry_queue::count(h.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn edit_of_untracked_message_runs_full_pipeline() {
    let h = TestHarness::new().await.unwrap();
    h.classifier.push_brief(fields(), 0.9).await;
    let mut edit = h.message(42, BRIEF);
    edit.is_edit = true;

    let outcome = h.send(edit).await.unwrap();

    assert!(matches!(
        outcome,
        EventOutcome::Intake(IntakeOutcome::Created { .. })
    ));
}
