//! # Circuit Breaker Module
//!
//! Per-model circuit breaker state machine for the health monitor. Unlike a
//! request-path circuit breaker that gates live traffic, this breaker gates
//! nothing by itself: its only job is to compute the next
//! `CircuitBreakerState` stored on a model's tracking row, given the result
//! just processed. The Result Processor drives it once per probe result.
//!
//! ## States
//!
//! - **Closed** — normal operation; consecutive failures are tracked.
//! - **Open** — tripped after `failure_threshold` consecutive failures.
//! - **HalfOpen** — probing for recovery; any failure sends it back to Open,
//!   `success_threshold` consecutive successes close it.
//!
//! The `Open → HalfOpen` transition is triggered by the *next* result
//! processed while the breaker is Open, not by a recovery timer: the
//! Scheduler keeps probing this model on its shortened failing-model
//! interval, and the first result recorded after the trip is itself the
//! recovery probe. This is intentional, not an oversight — see `transition`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Circuit breaker operational states, persisted on the tracking row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation — probes continue on schedule.
    Closed,
    /// Tripped — the model is still probed (on its shortened interval) but
    /// is reported as unhealthy to downstream consumers.
    Open,
    /// Testing recovery after the first post-trip result.
    HalfOpen,
}

impl Default for CircuitState {
    fn default() -> Self {
        CircuitState::Closed
    }
}

/// Thresholds driving circuit breaker transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to trip Closed → Open.
    pub failure_threshold: u32,
    /// Consecutive successes required to close HalfOpen → Closed.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 8,
            success_threshold: 3,
        }
    }
}

/// Errors surfaced while validating circuit breaker configuration.
#[derive(Debug, Error)]
pub enum CircuitBreakerError {
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,
    #[error("success_threshold must be at least 1")]
    ZeroSuccessThreshold,
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), CircuitBreakerError> {
        if self.failure_threshold == 0 {
            return Err(CircuitBreakerError::ZeroFailureThreshold);
        }
        if self.success_threshold == 0 {
            return Err(CircuitBreakerError::ZeroSuccessThreshold);
        }
        Ok(())
    }
}

/// Pure, total state-transition function.
///
/// `consecutive_failures`/`consecutive_successes` are the *post-update*
/// streak counters for the result just processed (the Result Processor
/// updates these before calling in). `is_success` distinguishes a success
/// from every other outcome, which all count as a failure for breaker
/// purposes (including `rate_limited` — see DESIGN.md's Open Question
/// decisions).
pub fn transition(
    current: CircuitState,
    is_success: bool,
    consecutive_failures: u32,
    consecutive_successes: u32,
    config: &CircuitBreakerConfig,
) -> CircuitState {
    // An Open breaker always becomes HalfOpen on the next result; that
    // same result is then evaluated against the HalfOpen rules below.
    let evaluated_from = match current {
        CircuitState::Open => CircuitState::HalfOpen,
        other => other,
    };

    match evaluated_from {
        CircuitState::Closed => {
            if !is_success && consecutive_failures >= config.failure_threshold {
                CircuitState::Open
            } else {
                CircuitState::Closed
            }
        }
        CircuitState::HalfOpen => {
            if is_success {
                if consecutive_successes >= config.success_threshold {
                    CircuitState::Closed
                } else {
                    CircuitState::HalfOpen
                }
            } else {
                CircuitState::Open
            }
        }
        CircuitState::Open => unreachable!("Open is remapped to HalfOpen above"),
    }
}

/// Thin wrapper around `transition` that logs state changes the way the
/// rest of this crate logs degraded-mode events.
pub struct CircuitBreaker;

impl CircuitBreaker {
    /// Computes the next state and logs a transition if one occurred.
    pub fn apply(
        identity: &str,
        current: CircuitState,
        is_success: bool,
        consecutive_failures: u32,
        consecutive_successes: u32,
        config: &CircuitBreakerConfig,
    ) -> CircuitState {
        let next = transition(
            current,
            is_success,
            consecutive_failures,
            consecutive_successes,
            config,
        );

        if next != current {
            match next {
                CircuitState::Open => tracing::warn!(
                    identity,
                    ?current,
                    ?next,
                    consecutive_failures,
                    "circuit breaker tripped"
                ),
                CircuitState::HalfOpen => tracing::info!(
                    identity,
                    ?current,
                    ?next,
                    "circuit breaker probing recovery"
                ),
                CircuitState::Closed => tracing::info!(
                    identity,
                    ?current,
                    ?next,
                    consecutive_successes,
                    "circuit breaker closed"
                ),
            }
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 8,
            success_threshold: 3,
        }
    }

    #[test]
    fn closed_stays_closed_below_threshold() {
        let mut state = CircuitState::Closed;
        for failures in 1..8 {
            state = transition(state, false, failures, 0, &config());
            assert_eq!(state, CircuitState::Closed);
        }
    }

    #[test]
    fn closed_trips_at_exactly_the_failure_threshold() {
        let state = transition(CircuitState::Closed, false, 8, 0, &config());
        assert_eq!(state, CircuitState::Open);
    }

    #[test]
    fn open_moves_to_half_open_on_next_result_even_if_that_result_fails() {
        // A further failure right after tripping still counts as the
        // "next result" trigger; because it is itself a failure the
        // HalfOpen rule immediately sends it back to Open.
        let state = transition(CircuitState::Open, false, 9, 0, &config());
        assert_eq!(state, CircuitState::Open);
    }

    #[test]
    fn open_moves_to_half_open_on_a_single_success() {
        let state = transition(CircuitState::Open, true, 0, 1, &config());
        assert_eq!(state, CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_threshold_successes() {
        let mut state = CircuitState::HalfOpen;
        state = transition(state, true, 0, 1, &config());
        assert_eq!(state, CircuitState::HalfOpen);
        state = transition(state, true, 0, 2, &config());
        assert_eq!(state, CircuitState::HalfOpen);
        state = transition(state, true, 0, 3, &config());
        assert_eq!(state, CircuitState::Closed);
    }

    #[test]
    fn half_open_reopens_on_any_failure() {
        let state = transition(CircuitState::HalfOpen, false, 1, 0, &config());
        assert_eq!(state, CircuitState::Open);
    }

    #[test]
    fn full_trip_and_recover_sequence_matches_seed_scenario_one() {
        let cfg = config();
        let mut state = CircuitState::Closed;
        for failures in 1..=8 {
            state = transition(state, false, failures, 0, &cfg);
        }
        assert_eq!(state, CircuitState::Open);

        state = transition(state, true, 0, 1, &cfg);
        assert_eq!(state, CircuitState::HalfOpen);

        state = transition(state, true, 0, 2, &cfg);
        assert_eq!(state, CircuitState::HalfOpen);

        state = transition(state, true, 0, 3, &cfg);
        assert_eq!(state, CircuitState::Closed);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn transitions_never_leave_closed_for_anything_but_open(
            is_success in any::<bool>(),
            consecutive_failures in 0u32..20,
            consecutive_successes in 0u32..20,
        ) {
            let next = transition(CircuitState::Closed, is_success, consecutive_failures, consecutive_successes, &CircuitBreakerConfig::default());
            prop_assert!(matches!(next, CircuitState::Closed | CircuitState::Open));
        }

        #[test]
        fn open_always_leaves_open(
            is_success in any::<bool>(),
            consecutive_failures in 0u32..20,
            consecutive_successes in 0u32..20,
        ) {
            let next = transition(CircuitState::Open, is_success, consecutive_failures, consecutive_successes, &CircuitBreakerConfig::default());
            prop_assert_ne!(next, CircuitState::Open);
        }

        #[test]
        fn half_open_never_produces_an_invalid_state(
            is_success in any::<bool>(),
            consecutive_failures in 0u32..20,
            consecutive_successes in 0u32..20,
        ) {
            let next = transition(CircuitState::HalfOpen, is_success, consecutive_failures, consecutive_successes, &CircuitBreakerConfig::default());
            prop_assert!(matches!(next, CircuitState::Closed | CircuitState::Open | CircuitState::HalfOpen));
        }
    }
}
