//! Single-flight refresh coordination
//!
//! Collapses N concurrent authentication failures into exactly one refresh
//! call. The first caller to arrive becomes the leader and runs the refresh;
//! everyone else suspends on a watch channel and adopts the leader's outcome.
//! Without this gate, concurrently expiring requests would race to refresh
//! and could invalidate single-use refresh tokens on the server side.
//!
//! State machine: the slot is `None` when idle and holds a receiver while a
//! refresh is in flight. Test-and-set happens under a std mutex that is
//! never held across an await; a drop guard returns the slot to idle on
//! every exit path, including panic and task cancellation.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use session_auth::{CredentialPair, CredentialStore, RefreshError, RefreshOperation};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of one refresh cycle, shared by every caller that observed it.
pub type RefreshOutcome = Result<CredentialPair, RefreshError>;

type Slot = Option<watch::Receiver<Option<RefreshOutcome>>>;

enum Role {
    Leader(watch::Sender<Option<RefreshOutcome>>),
    Follower(watch::Receiver<Option<RefreshOutcome>>),
}

/// Single-flight gate over the credential refresh operation.
pub struct RefreshGate {
    store: Arc<CredentialStore>,
    refresher: Arc<dyn RefreshOperation>,
    timeout: Duration,
    in_flight: Mutex<Slot>,
}

/// Returns the gate to idle when the leader exits, however it exits.
struct SlotGuard<'a> {
    gate: &'a RefreshGate,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.gate.lock_slot() = None;
    }
}

impl RefreshGate {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: Arc<dyn RefreshOperation>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            timeout,
            in_flight: Mutex::new(None),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        // The critical sections only move a receiver in or out of the slot,
        // so a poisoned lock still holds a usable value.
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolve one authentication failure into a refresh outcome.
    ///
    /// `observed` is the credential snapshot the failing request was sent
    /// with. Exactly one caller per cycle runs the refresh; all others
    /// adopt its outcome. On success the returned pair is already stored,
    /// so every caller replays with the leader's result, never an older
    /// snapshot.
    pub async fn coordinate(&self, observed: &CredentialPair) -> RefreshOutcome {
        let role = {
            let mut slot = self.lock_slot();
            match &*slot {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => {
                debug!("refresh already in flight, waiting for its outcome");
                match rx.wait_for(Option::is_some).await {
                    Ok(outcome) => (*outcome).clone().unwrap_or_else(|| {
                        Err(RefreshError::Transient("refresh resolved without an outcome".into()))
                    }),
                    // Leader dropped without publishing (cancelled mid-refresh)
                    Err(_) => Err(RefreshError::Transient(
                        "refresh aborted before completion".into(),
                    )),
                }
            }
            Role::Leader(tx) => {
                let _guard = SlotGuard { gate: self };

                // Another cycle may have completed between this caller's
                // failed request and winning the slot. Its snapshot is then
                // stale and the stored pair is already fresh.
                let current = self.store.read().await;
                let outcome = if current != *observed {
                    debug!("credentials already replaced, skipping refresh");
                    Ok(current)
                } else {
                    self.run_refresh(current).await
                };

                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
        }
    }

    /// Run the refresh as leader and apply its side effects to the store
    /// before any waiter is released.
    async fn run_refresh(&self, current: CredentialPair) -> RefreshOutcome {
        info!("starting credential refresh");
        match tokio::time::timeout(self.timeout, self.refresher.refresh(current)).await {
            Ok(Ok(fresh)) => {
                self.store.write(fresh.clone()).await;
                info!("credential refresh succeeded");
                Ok(fresh)
            }
            Ok(Err(err)) if err.is_terminal() => {
                warn!(error = %err, "refresh token rejected, clearing credentials");
                self.store.clear().await;
                Err(err)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "refresh failed transiently, credentials left intact");
                Err(err)
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "refresh did not resolve within the timeout"
                );
                Err(RefreshError::Transient(format!(
                    "refresh timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
