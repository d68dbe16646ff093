//! Settle delays and bounded status polling.
//!
//! Every wait in this program is an active poll of a status register. The
//! polls are bounded: a stuck bit surfaces as [`HardwareTimeout`] instead of
//! hanging the process.

use std::time::{Duration, Instant};

use super::design_parameters::POLL_CADENCE;

/// A hardware-observable condition failed to appear within its budget.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("timeout after {waited:?} waiting for {condition}")]
pub struct HardwareTimeout {
    pub condition: &'static str,
    pub waited: Duration,
}

/// Fixed settle delay between register edges.
pub fn settle(duration: Duration) {
    std::thread::sleep(duration);
}

/// Poll `condition` at the standard cadence until it holds or `timeout`
/// elapses. The predicate is evaluated once more at the deadline so a
/// condition that comes true during the final sleep is not missed.
pub fn poll_until(
    what: &'static str,
    timeout: Duration,
    mut condition: impl FnMut() -> bool,
) -> Result<(), HardwareTimeout> {
    let start = Instant::now();
    loop {
        if condition() {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            if condition() {
                return Ok(());
            }
            return Err(HardwareTimeout {
                condition: what,
                waited: start.elapsed(),
            });
        }
        std::thread::sleep(POLL_CADENCE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_condition() {
        assert!(poll_until("ready", Duration::from_millis(1), || true).is_ok());
    }

    #[test]
    fn expires() {
        let err = poll_until("stuck bit", Duration::from_millis(2), || false)
            .unwrap_err();
        assert_eq!(err.condition, "stuck bit");
        assert!(err.waited >= Duration::from_millis(2));
    }

    #[test]
    fn counts_calls() {
        let mut calls = 0;
        poll_until("third try", Duration::from_millis(50), || {
            calls += 1;
            calls >= 3
        })
        .unwrap();
        assert_eq!(calls, 3);
    }
}
