/// Refresh Token Revocation Ledger
///
/// Signed tokens cannot be deleted once issued, so revoked refresh tokens are
/// remembered here until their own `exp` passes. After that, verification
/// rejects them anyway and the entry is dead weight for the sweeper to drop.
///
/// - Keyed by the raw token string, valued by its natural expiry (Unix seconds)
/// - One mutex guards every operation; it is never held across I/O
/// - Only `sweep` removes entries

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Default)]
pub struct RevocationLedger {
    entries: Mutex<HashMap<String, i64>>,
}

impl RevocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // Map operations cannot leave the map half-updated, so a poisoned lock is still usable
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Revoke `token` until `natural_expiry`. Revoking twice is a no-op.
    pub fn revoke(&self, token: &str, natural_expiry: i64) {
        self.claim(token, natural_expiry);
    }

    /// Check and revoke in one step.
    ///
    /// Returns `true` if this call revoked the token, or `false` if it was
    /// already revoked. Exactly one of several racing callers sees `true`.
    pub fn claim(&self, token: &str, natural_expiry: i64) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(token) {
            return false;
        }
        entries.insert(token.to_string(), natural_expiry);
        true
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.entries().contains_key(token)
    }

    /// Drop every entry with `natural_expiry <= now`. Returns how many were removed.
    pub fn sweep(&self, now: i64) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, natural_expiry| *natural_expiry > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Owner of a running sweeper task.
///
/// Call `shutdown` to stop it and wait for it to finish; dropping the handle aborts it.
pub struct SweeperHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Revocation sweeper ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn a task that sweeps `ledger` every `period`, independent of request handling.
pub fn spawn_sweeper(ledger: Arc<RevocationLedger>, period: Duration) -> SweeperHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let removed = ledger.sweep(chrono::Utc::now().timestamp());
                    tracing::info!(
                        removed = removed,
                        remaining = ledger.len(),
                        "Swept expired refresh token revocations"
                    );
                }
            }
        }

        tracing::debug!("Revocation sweeper stopped");
    });

    SweeperHandle {
        stop: Some(stop_tx),
        task: Some(task),
    }
}
