// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry processor tests.

use brieftrack_core::{BriefFields, OrderStatus};
use brieftrack_intake::retry::RetryOutcome;
use brieftrack_intake::{EventOutcome, IntakeOutcome, RetryBatch};
use brieftrack_storage::queries::{orders, processed, retry_queue};
use brieftrack_test_utils::harness::CHAT_ID;
use brieftrack_test_utils::TestHarness;
use chrono::{Duration, Utc};

const BRIEF: &str = "📦 Order description: custom video for a fan\nPayment: $50";

async fn park(h: &TestHarness, message_id: i64) {
    h.classifier.push_transient("overloaded").await;
    let outcome = h.send(h.message(message_id, BRIEF)).await.unwrap();
    assert_eq!(outcome, EventOutcome::Intake(IntakeOutcome::Queued));
}

#[tokio::test]
async fn successful_retry_creates_order_and_clears_entry() {
    let h = TestHarness::new().await.unwrap();
    park(&h, 10).await;
    h.classifier.push_brief(BriefFields::default(), 0.9).await;

    let batch = h.service.retry_processor().run_once(Utc::now()).await.unwrap();

    assert_eq!(batch.created, 1);
    assert_eq!(retry_queue::count(h.db()).await.unwrap(), 0);
    let order = orders::find_by_message(h.db(), CHAT_ID, 10)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert!(order.bot_message_id.is_some());
    assert_eq!(h.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn transient_retry_backs_off() {
    let h = TestHarness::new().await.unwrap();
    park(&h, 11).await;
    h.classifier.push_transient("overloaded").await;
    let now = Utc::now();

    let batch = h.service.retry_processor().run_once(now).await.unwrap();
    assert_eq!(batch.rescheduled, 1);

    let entries = retry_queue::due(h.db(), now + Duration::hours(1), 10)
        .await
        .unwrap();
    assert_eq!(entries[0].attempt_count, 1);
    assert_eq!(
        entries[0].next_retry_at.timestamp_millis(),
        (now + Duration::minutes(2)).timestamp_millis()
    );

    // Not due yet.
    let idle = h.service.retry_processor().run_once(now).await.unwrap();
    assert_eq!(idle, RetryBatch::default());
}

#[tokio::test]
async fn exhaustion_records_failure_and_alerts_once() {
    let h = TestHarness::builder()
        .with_config(|c| c.retry.max_attempts = 1)
        .build()
        .await
        .unwrap();
    park(&h, 12).await;
    h.classifier.push_transient("still overloaded").await;

    let batch = h.service.retry_processor().run_once(Utc::now()).await.unwrap();

    assert_eq!(batch.exhausted, 1);
    assert_eq!(retry_queue::count(h.db()).await.unwrap(), 0);
    let failures = processed::parse_failures(h.db(), 10).await.unwrap();
    assert_eq!(failures[0].error_type, "transient_retries_exhausted");
    assert!(processed::is_processed(h.db(), CHAT_ID, 12).await.unwrap());

    let alerts = h.notifier.sent().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reply_to_message_id, Some(12));
    assert!(alerts[0].text.contains("1 attempts"));
}

#[tokio::test]
async fn window_expiry_exhausts_regardless_of_count() {
    let h = TestHarness::new().await.unwrap();
    park(&h, 13).await;
    h.classifier.push_transient("overloaded").await;

    let later = Utc::now() + Duration::minutes(121);
    let batch = h.service.retry_processor().run_once(later).await.unwrap();

    assert_eq!(batch.exhausted, 1);
}

#[tokio::test]
async fn stale_entry_is_dropped_without_classifying() {
    let h = TestHarness::new().await.unwrap();
    park(&h, 14).await;
    processed::mark_processed(h.db(), CHAT_ID, 14, false, Utc::now())
        .await
        .unwrap();

    let batch = h.service.retry_processor().run_once(Utc::now()).await.unwrap();

    assert_eq!(batch.dropped, 1);
    assert_eq!(h.classifier.call_count().await, 1);
    assert_eq!(retry_queue::count(h.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn non_brief_on_retry_is_marked_processed() {
    let h = TestHarness::new().await.unwrap();
    park(&h, 15).await;
    h.classifier.push_not_brief().await;

    let entry = retry_queue::due(h.db(), Utc::now(), 10).await.unwrap()[0].clone();
    let ctx = h.context.load();
    let outcome = h
        .service
        .retry_processor()
        .process_entry(&ctx, entry.id, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, RetryOutcome::NotABrief);
    assert!(processed::is_processed(h.db(), CHAT_ID, 15).await.unwrap());
    assert_eq!(retry_queue::count(h.db()).await.unwrap(), 0);
}
