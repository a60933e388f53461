//! Guards for overlapping async operations against shared state.
//!
//! [`SendGate`] is the explicit `Idle → Sending → Idle` machine that
//! replaces an "is loading" boolean: a second send while one is in flight
//! is rejected with a busy error, never implicitly cancelled.
//!
//! [`FetchSequencer`] detects stale responses: each fetch takes a
//! monotonically increasing ticket, and a result is applied only if its
//! ticket is still the latest issued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use pl_domain::error::{Error, Result};
use pl_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Send gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Single-flight gate for send/regenerate.
#[derive(Default)]
pub struct SendGate {
    sending: Arc<AtomicBool>,
}

impl SendGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the `Sending` state.
    ///
    /// Returns the permit that must be held for the duration of the turn;
    /// dropping it returns the gate to `Idle`.  Fails with
    /// [`Error::Busy`] when a turn is already in flight.
    pub fn begin(&self) -> Result<SendPermit> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy("a reply is already streaming".into()));
        }
        Ok(SendPermit {
            sending: self.sending.clone(),
        })
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }
}

/// Held while one turn streams; releases the gate on drop.
pub struct SendPermit {
    sending: Arc<AtomicBool>,
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.sending.store(false, Ordering::Release);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fetch sequencer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Monotonic tickets for list/detail fetches.
///
/// Rapid switches issue overlapping fetches; only the result whose ticket
/// is still current may be applied, so a slow response for a superseded
/// target never overwrites newer state.
#[derive(Default)]
pub struct FetchSequencer {
    latest: AtomicU64,
}

impl FetchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket, superseding all earlier ones.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Check whether a completed fetch may still be applied.
    ///
    /// Emits [`TraceEvent::StaleFetchDiscarded`] when the answer is no.
    pub fn admit(&self, ticket: u64) -> bool {
        let latest = self.latest.load(Ordering::Acquire);
        if latest != ticket {
            TraceEvent::StaleFetchDiscarded { ticket, latest }.emit();
            return false;
        }
        true
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejects_second_entry() {
        let gate = SendGate::new();
        let permit = gate.begin().unwrap();
        assert!(gate.is_sending());
        assert!(matches!(gate.begin(), Err(Error::Busy(_))));
        drop(permit);
    }

    #[test]
    fn dropping_permit_reopens_gate() {
        let gate = SendGate::new();
        drop(gate.begin().unwrap());
        assert!(!gate.is_sending());
        let _again = gate.begin().unwrap();
    }

    #[test]
    fn sequencer_admits_only_latest_ticket() {
        let seq = FetchSequencer::new();
        let first = seq.begin();
        let second = seq.begin();

        // The superseded fetch resolves late and is discarded.
        assert!(!seq.admit(first));
        assert!(seq.admit(second));
    }

    #[test]
    fn sequencer_tickets_are_monotonic() {
        let seq = FetchSequencer::new();
        let a = seq.begin();
        let b = seq.begin();
        let c = seq.begin();
        assert!(a < b && b < c);
    }

    #[test]
    fn admit_is_repeatable_for_current_ticket() {
        let seq = FetchSequencer::new();
        let t = seq.begin();
        assert!(seq.admit(t));
        assert!(seq.admit(t));
    }
}
