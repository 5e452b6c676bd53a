// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brieftrack serve`: wires storage, classifier, transport, intake, and the
//! scheduler, then runs until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use brieftrack_classifier::BriefClassifier;
use brieftrack_config::BriefConfig;
use brieftrack_core::{BriefError, InboundEvent, PluginAdapter, StorageAdapter};
use brieftrack_intake::{ContextHandle, IntakeService, Services, readiness};
use brieftrack_scheduler::Scheduler;
use brieftrack_storage::SqliteStorage;
use brieftrack_telegram::TelegramChannel;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// How long in-flight events may run after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the service until SIGINT/SIGTERM.
pub async fn run_serve(config: BriefConfig) -> Result<(), BriefError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting brieftrack serve");

    let report = readiness::evaluate(&config);
    let fatal = report.fatal_blockers();
    if !fatal.is_empty() {
        for blocker in &fatal {
            error!(code = %blocker, "{}", blocker.describe());
        }
        return Err(BriefError::NotReady {
            blockers: fatal.iter().map(ToString::to_string).collect(),
        });
    }
    for blocker in &report.blockers {
        warn!(code = %blocker, "{}; messages will not be processed", blocker.describe());
    }
    for warning in &report.warnings {
        warn!(code = %warning, "readiness warning");
    }

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };
    let classifier = Arc::new(BriefClassifier::new(&config.anthropic)?);
    let channel = Arc::new(TelegramChannel::new(&config.telegram)?);
    channel.connect();

    let context = ContextHandle::new(config);
    let service = Arc::new(IntakeService::new(Services {
        storage: Arc::clone(&storage),
        classifier,
        notifier: channel.clone(),
        context: context.clone(),
    }));

    let cancel = shutdown::install_signal_handler();
    shutdown::install_reload_handler(context, cancel.clone());

    let scheduler = tokio::spawn(Scheduler::new(Arc::clone(&service)).run(cancel.clone()));

    run_event_loop(&channel, &service, &cancel).await;

    if let Err(e) = scheduler.await {
        error!(error = %e, "scheduler task failed");
    }
    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "transport shutdown failed");
    }
    storage.close().await?;

    info!("brieftrack serve shutdown complete");
    Ok(())
}

/// Hand every inbound event to the service on its own task. Returns after
/// cancellation once in-flight events finished or the drain timeout passed.
async fn run_event_loop(
    channel: &TelegramChannel,
    service: &Arc<IntakeService>,
    cancel: &CancellationToken,
) {
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            event = channel.receive() => match event {
                Ok(event) => {
                    let service = Arc::clone(service);
                    tracker.spawn(async move { dispatch(&service, event).await });
                }
                Err(e) => {
                    error!(error = %e, "inbound stream ended");
                    cancel.cancel();
                    break;
                }
            },
            _ = cancel.cancelled() => {
                info!("event loop shutting down");
                break;
            }
        }
    }

    tracker.close();
    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait()).await.is_err() {
        warn!(remaining = tracker.len(), "drain timeout reached, abandoning events");
    }
}

async fn dispatch(service: &IntakeService, event: InboundEvent) {
    let (chat_id, message_id) = match &event {
        InboundEvent::Message(m) => (m.chat_id, Some(m.message_id)),
        InboundEvent::Callback(cb) => (cb.chat_id, cb.message_id),
    };
    match service.handle_event(event).await {
        Ok(outcome) => debug!(chat_id, ?message_id, ?outcome, "event handled"),
        Err(e) => error!(chat_id, ?message_id, error = %e, "event handling failed"),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("brieftrack={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
