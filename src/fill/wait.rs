//! Waiting on the host page
//!
//! [`until`] is the one wait primitive: it re-evaluates a condition whenever
//! the page reports a mutation or a polling tick fires, and gives up at an
//! absolute deadline. It always returns a definite answer, and answers
//! `false` as soon as the batch is aborted.

use super::abort::AbortHandle;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};

const MIN_POLL: Duration = Duration::from_millis(1);

/// Wait until `check` holds or `timeout` elapses
///
/// Returns whether the condition held. The condition is evaluated once more
/// at the deadline, so a change that lands exactly then is not lost. A closed
/// mutation signal degrades to polling only. An abort ends the wait with
/// `false` right away.
pub async fn until<F, Fut>(
    signal: &mut watch::Receiver<u64>,
    abort: &AbortHandle,
    poll: Duration,
    timeout: Duration,
    mut check: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    let poll = poll.max(MIN_POLL);
    let mut ticker = interval_at(start + poll, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut signal_open = true;
    signal.borrow_and_update();

    loop {
        if abort.is_aborted() {
            return false;
        }
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }

        tokio::select! {
            _ = abort.aborted() => return false,
            _ = sleep_until(deadline) => return check().await,
            changed = signal.changed(), if signal_open => {
                if changed.is_err() {
                    log::trace!("Mutation signal closed, polling only");
                    signal_open = false;
                }
            }
            _ = ticker.tick() => {}
        }
    }
}

/// Wait for `window` without any mutation, for at most `budget`
///
/// Returns false when the budget ran out first or the batch was aborted;
/// callers proceed either way.
pub async fn quiet(
    signal: &mut watch::Receiver<u64>,
    abort: &AbortHandle,
    window: Duration,
    budget: Duration,
    poll: Duration,
) -> bool {
    let probe = signal.clone();
    let mut seen = *probe.borrow();
    let mut last_mutation = Instant::now();

    until(signal, abort, poll.min(window), budget, || {
        let generation = *probe.borrow();
        let now = Instant::now();
        if generation != seen {
            seen = generation;
            last_mutation = now;
        }
        std::future::ready(now.duration_since(last_mutation) >= window)
    })
    .await
}
