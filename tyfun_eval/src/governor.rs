//! The execution governor.
//!
//! Type function bodies are Turing-complete, so every reduction runs under a
//! deadline and/or a cancellation token. The evaluator calls `tick` on every
//! statement and loop iteration; the actual clock and token are consulted
//! once per `CHECK_INTERVAL` ticks, which keeps both the overhead and the
//! worst-case overshoot past the deadline small.
//!
//! Nested reductions receive the enclosing reduction's governor, never a
//! fresh one, so recursive fan-out cannot multiply the total budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::cell::Cell;
use std::time::{Duration, Instant};

/// A cancellation token the host can trip from another thread.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a reduction was cut short. Not catchable inside the sandbox,
/// unlike ordinary runtime errors.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Exhausted {
    Timeout,
    Canceled,
}

const CHECK_INTERVAL: u32 = 64;

pub struct Governor {
    deadline: Option<Instant>,
    token: Option<CancelToken>,
    counter: Cell<u32>,
}

impl Governor {
    pub fn new(limit: Option<Duration>, token: Option<CancelToken>) -> Governor {
        Governor {
            deadline: limit.map(|limit| Instant::now() + limit),
            token: token,
            counter: Cell::new(0),
        }
    }

    /// Counts one evaluation step,
    /// consulting the deadline and the token every `CHECK_INTERVAL` steps.
    pub fn tick(&self) -> Result<(), Exhausted> {
        let count = self.counter.get().wrapping_add(1);
        self.counter.set(count);
        if count % CHECK_INTERVAL != 0 {
            return Ok(());
        }
        self.check()
    }

    pub fn check(&self) -> Result<(), Exhausted> {
        if let Some(ref token) = self.token {
            if token.is_canceled() {
                return Err(Exhausted::Canceled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Exhausted::Timeout);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::{Governor, CancelToken, Exhausted, CHECK_INTERVAL};

    #[test]
    fn test_unbounded_governor_never_stops() {
        let governor = Governor::new(None, None);
        for _ in 0..CHECK_INTERVAL * 4 {
            assert_eq!(governor.tick(), Ok(()));
        }
    }

    #[test]
    fn test_deadline() {
        let governor = Governor::new(Some(Duration::from_millis(0)), None);
        let mut stopped = None;
        for i in 0..CHECK_INTERVAL * 2 {
            if governor.tick().is_err() {
                stopped = Some(i);
                break;
            }
        }
        // an expired deadline is noticed within one check interval
        assert!(stopped.expect("governor never stopped") < CHECK_INTERVAL);
        assert_eq!(governor.check(), Err(Exhausted::Timeout));
    }

    #[test]
    fn test_cancellation() {
        let token = CancelToken::new();
        let governor = Governor::new(None, Some(token.clone()));
        assert_eq!(governor.check(), Ok(()));
        token.cancel();
        assert_eq!(governor.check(), Err(Exhausted::Canceled));
    }
}
