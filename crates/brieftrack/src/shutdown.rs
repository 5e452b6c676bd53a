// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling: SIGINT/SIGTERM trigger shutdown, SIGHUP reloads the
//! configuration into the runtime snapshot.

use brieftrack_intake::ContextHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not install SIGTERM handler, only Ctrl+C stops the service");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Re-read the configuration on SIGHUP and swap the runtime snapshot. An
/// invalid file is reported and the previous snapshot stays in place.
#[cfg(unix)]
pub fn install_reload_handler(context: ContextHandle, cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "could not install SIGHUP handler, reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = sighup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("received SIGHUP, reloading configuration");
                    reload(&context);
                }
                _ = cancel.cancelled() => {
                    debug!("reload handler shutting down");
                    break;
                }
            }
        }
    });
}

#[cfg(not(unix))]
pub fn install_reload_handler(_context: ContextHandle, _cancel: CancellationToken) {
    debug!("configuration reload on signal is unix-only");
}

/// Load and validate the configuration, then swap it in.
pub fn reload(context: &ContextHandle) -> bool {
    match brieftrack_config::load_and_validate() {
        Ok(config) => {
            context.reload(config);
            true
        }
        Err(errors) => {
            for e in &errors {
                error!(error = %e, "configuration reload rejected");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }
}
