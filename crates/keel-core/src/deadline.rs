//! Per-request deadline scope.
//!
//! A [`Deadline`] is a time budget with a typed expiry cause. It is
//! intentionally rooted in a fresh [`CancellationToken`] rather than a child
//! of any upstream token: a client disconnect never marks the deadline as
//! expired, so a later expiry is always attributable to this budget.
//!
//! Starting a deadline spawns one background timer. The returned
//! [`DeadlineGuard`] releases it exactly once when dropped, on every exit path
//! of the enclosing handler.

use crate::error::ErrorCode;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const ACTIVE: u8 = 0;
const EXPIRED: u8 = 1;
const RELEASED: u8 = 2;

/// A time budget with a typed expiry cause.
///
/// Cheap to clone; all clones observe the same scope.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    cause: ErrorCode,
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl Deadline {
    /// Starts a deadline that expires `budget` from now with `cause`.
    ///
    /// When called inside a Tokio runtime, a timer task marks the deadline
    /// expired and wakes [`done`](Self::done) waiters. Outside a runtime the
    /// expiry is still observed lazily by [`cause`](Self::cause).
    pub fn start(budget: Duration, cause: ErrorCode) -> (Self, DeadlineGuard) {
        let deadline = Self {
            expires_at: Instant::now() + budget,
            cause,
            state: Arc::new(AtomicU8::new(ACTIVE)),
            token: CancellationToken::new(),
        };

        let timer = tokio::runtime::Handle::try_current().ok().map(|handle| {
            let scope = deadline.clone();
            handle.spawn(async move {
                tokio::time::sleep_until(scope.expires_at).await;
                scope.expire();
            })
        });

        let guard = DeadlineGuard {
            deadline: deadline.clone(),
            timer,
        };
        (deadline, guard)
    }

    fn expire(&self) {
        if self
            .state
            .compare_exchange(ACTIVE, EXPIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.token.cancel();
        }
    }

    /// Returns the instant at which the budget runs out.
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns the time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Returns the expiry cause if the budget ran out before release.
    #[must_use]
    pub fn cause(&self) -> Option<ErrorCode> {
        match self.state.load(Ordering::Acquire) {
            EXPIRED => Some(self.cause),
            ACTIVE if Instant::now() >= self.expires_at => Some(self.cause),
            _ => None,
        }
    }

    /// Returns true if the budget ran out before release.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.cause().is_some()
    }

    /// Returns true once the scope ended, either by expiry or release.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.is_expired()
    }

    /// Waits until the scope ends, either by expiry or release.
    pub async fn done(&self) {
        self.token.cancelled().await;
    }
}

/// Releases a [`Deadline`] when dropped.
#[derive(Debug)]
#[must_use = "dropping the guard releases the deadline immediately"]
pub struct DeadlineGuard {
    deadline: Deadline,
    timer: Option<JoinHandle<()>>,
}

impl DeadlineGuard {
    /// Releases the deadline now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        let next = if Instant::now() >= self.deadline.expires_at {
            EXPIRED
        } else {
            RELEASED
        };
        let _ = self.deadline.state.compare_exchange(
            ACTIVE,
            next,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.deadline.token.cancel();
    }
}
