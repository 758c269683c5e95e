//! Onboarding gate
//!
//! A wallet must have picked a faction before it may connect to an app or
//! sign anything. Status lookups are bounded; a lookup that times out or
//! fails is treated as "not selected yet" so the user is shown the
//! selection screen instead of being waved through.

mod http;

pub use http::HttpStatusProvider;

use crate::config::{GateConfig, UnconfirmedSelectionPolicy};
use crate::{Error, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Faction identifier as used by the status service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Faction(pub u32);

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction #{}", self.0)
    }
}

/// Selection state of one player for the current epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SelectionStatus {
    pub faction: Option<Faction>,
    #[serde(default)]
    pub epoch: Option<u32>,
}

/// Source of truth for faction selections
#[async_trait]
pub trait SelectionStatusProvider: Send + Sync {
    async fn selection(&self, address: Address) -> Result<SelectionStatus>;

    async fn submit_selection(&self, address: Address, faction: Faction) -> Result<()>;
}

/// Outcome of a wait with an upper bound
#[derive(Debug)]
pub enum Bounded<T> {
    Ok(T),
    Timeout,
    Failed(Error),
}

/// Await `fut` for at most `limit`
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Bounded<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Bounded::Ok(value),
        Ok(Err(e)) => Bounded::Failed(e),
        Err(_) => Bounded::Timeout,
    }
}

/// Why the selection screen has to be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionNeeded {
    NotSelected,
    TimedOut,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateCheck {
    Satisfied(Faction),
    NeedsSelection(SelectionNeeded),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The status service reported the new faction
    Confirmed(Faction),
    /// Submitted, but not observed before the confirmation window closed
    Unconfirmed(Faction),
}

#[derive(Clone)]
pub struct OnboardingGate {
    provider: Arc<dyn SelectionStatusProvider>,
    config: GateConfig,
}

impl OnboardingGate {
    pub fn new(provider: Arc<dyn SelectionStatusProvider>, config: GateConfig) -> Self {
        Self { provider, config }
    }

    /// Has `address` already picked a faction?
    pub async fn check(&self, address: Address) -> GateCheck {
        match bounded(self.config.status_timeout(), self.provider.selection(address)).await {
            Bounded::Ok(SelectionStatus {
                faction: Some(faction),
                ..
            }) => {
                tracing::debug!(%address, %faction, "Selection already made");
                GateCheck::Satisfied(faction)
            }
            Bounded::Ok(_) => GateCheck::NeedsSelection(SelectionNeeded::NotSelected),
            Bounded::Timeout => {
                tracing::warn!(
                    %address,
                    timeout_ms = self.config.status_timeout_ms,
                    "Selection status timed out; asking the user to select"
                );
                GateCheck::NeedsSelection(SelectionNeeded::TimedOut)
            }
            Bounded::Failed(e) => {
                tracing::warn!(
                    %address,
                    error = %e,
                    "Selection status unavailable; asking the user to select"
                );
                GateCheck::NeedsSelection(SelectionNeeded::Unavailable(e.to_string()))
            }
        }
    }

    /// Submit `faction` for `address`, then wait for it to become visible.
    ///
    /// Only a failed or timed-out submission is an error. A selection that
    /// is never observed comes back as [`SelectionOutcome::Unconfirmed`].
    pub async fn select(&self, address: Address, faction: Faction) -> Result<SelectionOutcome> {
        let submitted = self.provider.submit_selection(address, faction);
        match bounded(self.config.status_timeout(), submitted).await {
            Bounded::Ok(()) => {}
            Bounded::Timeout => return Err(Error::Timeout(self.config.status_timeout_ms)),
            Bounded::Failed(e) => return Err(Error::Status(format!("Selection failed: {}", e))),
        }

        tracing::info!(%address, %faction, "Selection submitted; waiting for confirmation");

        let confirmed = self.await_confirmation(address, faction);
        match tokio::time::timeout(self.config.confirm_window(), confirmed).await {
            Ok(()) => Ok(SelectionOutcome::Confirmed(faction)),
            Err(_) => {
                tracing::warn!(
                    %address,
                    %faction,
                    window_ms = self.config.confirm_window_ms,
                    "Selection not observed within confirmation window"
                );
                Ok(SelectionOutcome::Unconfirmed(faction))
            }
        }
    }

    /// May the flow continue after `outcome`?
    pub fn accepts(&self, outcome: SelectionOutcome) -> bool {
        match outcome {
            SelectionOutcome::Confirmed(_) => true,
            SelectionOutcome::Unconfirmed(_) => {
                self.config.unconfirmed_policy == UnconfirmedSelectionPolicy::Proceed
            }
        }
    }

    async fn await_confirmation(&self, address: Address, faction: Faction) {
        // interval() panics on a zero period
        let period = self.config.poll_interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.provider.selection(address).await {
                Ok(status) if status.faction == Some(faction) => return,
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Confirmation poll failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Reports the submitted faction after `visible_after` polls
    struct FakeStatus {
        current: Mutex<Option<Faction>>,
        submitted: Mutex<Option<Faction>>,
        polls: AtomicUsize,
        visible_after: usize,
        delay: Duration,
        fail_reads: bool,
        fail_submit: bool,
        hang_submit: bool,
    }

    impl FakeStatus {
        fn new(current: Option<Faction>) -> Self {
            Self {
                current: Mutex::new(current),
                submitted: Mutex::new(None),
                polls: AtomicUsize::new(0),
                visible_after: 0,
                delay: Duration::ZERO,
                fail_reads: false,
                fail_submit: false,
                hang_submit: false,
            }
        }
    }

    #[async_trait]
    impl SelectionStatusProvider for FakeStatus {
        async fn selection(&self, _address: Address) -> Result<SelectionStatus> {
            tokio::time::sleep(self.delay).await;
            if self.fail_reads {
                return Err(Error::Status("503".into()));
            }
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let submitted = *self.submitted.lock().unwrap();
            if submitted.is_some() && polls > self.visible_after {
                *self.current.lock().unwrap() = submitted;
            }
            Ok(SelectionStatus {
                faction: *self.current.lock().unwrap(),
                epoch: Some(1),
            })
        }

        async fn submit_selection(&self, _address: Address, faction: Faction) -> Result<()> {
            if self.fail_submit {
                return Err(Error::Status("rejected".into()));
            }
            if self.hang_submit {
                std::future::pending::<()>().await;
            }
            *self.submitted.lock().unwrap() = Some(faction);
            self.polls.store(0, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> GateConfig {
        GateConfig {
            status_timeout_ms: 50,
            poll_interval_ms: 5,
            confirm_window_ms: 100,
            unconfirmed_policy: UnconfirmedSelectionPolicy::Proceed,
        }
    }

    #[tokio::test]
    async fn selected_wallet_passes() {
        let gate = OnboardingGate::new(Arc::new(FakeStatus::new(Some(Faction(2)))), fast_config());
        assert_eq!(gate.check(Address::ZERO).await, GateCheck::Satisfied(Faction(2)));
    }

    #[tokio::test]
    async fn slow_status_is_treated_as_not_selected() {
        let mut status = FakeStatus::new(Some(Faction(2)));
        status.delay = Duration::from_millis(200);
        let gate = OnboardingGate::new(Arc::new(status), fast_config());

        assert_eq!(
            gate.check(Address::ZERO).await,
            GateCheck::NeedsSelection(SelectionNeeded::TimedOut)
        );
    }

    #[tokio::test]
    async fn failing_status_is_treated_as_not_selected() {
        let mut status = FakeStatus::new(Some(Faction(2)));
        status.fail_reads = true;
        let gate = OnboardingGate::new(Arc::new(status), fast_config());

        assert!(matches!(
            gate.check(Address::ZERO).await,
            GateCheck::NeedsSelection(SelectionNeeded::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn selection_confirmed_by_polling() {
        let mut status = FakeStatus::new(None);
        status.visible_after = 2;
        let gate = OnboardingGate::new(Arc::new(status), fast_config());

        let outcome = gate.select(Address::ZERO, Faction(1)).await.unwrap();
        assert_eq!(outcome, SelectionOutcome::Confirmed(Faction(1)));
        assert!(gate.accepts(outcome));
    }

    #[tokio::test]
    async fn unobserved_selection_follows_policy() {
        let mut status = FakeStatus::new(None);
        status.visible_after = usize::MAX;
        let status = Arc::new(status);

        let proceed = OnboardingGate::new(status.clone(), fast_config());
        let outcome = proceed.select(Address::ZERO, Faction(3)).await.unwrap();
        assert_eq!(outcome, SelectionOutcome::Unconfirmed(Faction(3)));
        assert!(proceed.accepts(outcome));

        let strict = OnboardingGate::new(
            status,
            GateConfig {
                unconfirmed_policy: UnconfirmedSelectionPolicy::RequireConfirmation,
                ..fast_config()
            },
        );
        assert!(!strict.accepts(outcome));
    }

    #[tokio::test]
    async fn failed_submission_is_an_error() {
        let mut status = FakeStatus::new(None);
        status.fail_submit = true;
        let gate = OnboardingGate::new(Arc::new(status), fast_config());

        let err = gate.select(Address::ZERO, Faction(1)).await.unwrap_err();
        assert!(err.to_string().contains("Selection failed"));
    }

    #[tokio::test]
    async fn hanging_submission_times_out() {
        let mut status = FakeStatus::new(None);
        status.hang_submit = true;
        let gate = OnboardingGate::new(Arc::new(status), fast_config());

        let err = gate.select(Address::ZERO, Faction(1)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(50)));
        assert_eq!(err.kind(), crate::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn bounded_distinguishes_timeout_from_error() {
        let slow = bounded(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(1)
        })
        .await;
        assert!(matches!(slow, Bounded::Timeout));

        let failed = bounded(Duration::from_millis(50), async {
            Err::<u8, _>(Error::Status("down".into()))
        })
        .await;
        assert!(matches!(failed, Bounded::Failed(_)));
    }
}
