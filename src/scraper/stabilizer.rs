//! Scroll a virtualized result list until it stops growing.
//!
//! `Scrolling → Stable` once the item count has not grown for the stagnation
//! threshold, `Scrolling → TimedOut` when the absolute ceiling passes or the
//! page cannot be queried. Both end states hand the cards already rendered to
//! the caller; neither is an error.

use crate::config::StabilizerConfig;
use crate::error::SessionError;
use crate::models::ExtractionLog;
use crate::scraper::BrowserSession;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    Scrolling,
    Stable,
    TimedOut,
}

/// Pure state machine; the caller feeds it one observation per scroll.
#[derive(Debug, Clone)]
pub struct ListStabilizer {
    pause: Duration,
    stagnation_threshold: Duration,
    ceiling: Duration,
    last_count: usize,
    no_growth: Duration,
    state: ScrollState,
}

impl ListStabilizer {
    pub fn new(pause: Duration, stagnation_threshold: Duration, ceiling: Duration) -> Self {
        Self {
            pause,
            stagnation_threshold,
            ceiling,
            last_count: 0,
            no_growth: Duration::ZERO,
            state: ScrollState::Scrolling,
        }
    }

    pub fn from_config(cfg: &StabilizerConfig) -> Self {
        Self::new(cfg.pause(), cfg.stagnation_threshold(), cfg.ceiling())
    }

    /// Highest item count seen so far.
    pub fn item_count(&self) -> usize {
        self.last_count
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Record the count seen after one scroll + pause, `elapsed` since the loop began.
    pub fn observe(&mut self, count: usize, elapsed: Duration) -> ScrollState {
        if self.state != ScrollState::Scrolling {
            return self.state;
        }

        if count > self.last_count {
            self.last_count = count;
            self.no_growth = Duration::ZERO;
        } else {
            self.no_growth += self.pause;
        }

        if self.no_growth >= self.stagnation_threshold {
            self.state = ScrollState::Stable;
        } else if elapsed > self.ceiling {
            self.state = ScrollState::TimedOut;
        }
        self.state
    }

    /// The page could not be queried; stop with what is already loaded.
    pub fn abort(&mut self) -> ScrollState {
        self.state = ScrollState::TimedOut;
        self.state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizeOutcome {
    pub state: ScrollState,
    pub items: usize,
    pub elapsed: Duration,
}

/// Drive `session` until the list matched by `item_selector` settles.
pub async fn stabilize<S>(
    session: &mut S,
    item_selector: &str,
    mut machine: ListStabilizer,
    log: &mut ExtractionLog,
) -> StabilizeOutcome
where
    S: BrowserSession + ?Sized,
{
    let start = Instant::now();

    loop {
        let observed: Result<usize, SessionError> = async {
            session.scroll_to_bottom().await?;
            sleep(machine.pause()).await;
            session.element_count(item_selector).await
        }
        .await;

        let state = match observed {
            Ok(count) => {
                debug!("scroll: {} items visible", count);
                machine.observe(count, start.elapsed())
            }
            Err(e) => {
                log.error(format!("Error: Scrolling failed with exception: {}", e));
                machine.abort()
            }
        };

        match state {
            ScrollState::Scrolling => continue,
            ScrollState::Stable => {
                log.info(format!("Done scrolling. Found {} cards.", machine.item_count()));
            }
            ScrollState::TimedOut => {
                if start.elapsed() > machine.ceiling {
                    log.warn(format!(
                        "Warning: Scrolling timed out after {} seconds.",
                        machine.ceiling.as_secs()
                    ));
                }
            }
        }

        return StabilizeOutcome {
            state,
            items: machine.item_count(),
            elapsed: start.elapsed(),
        };
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::ElementHandle;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replays a scripted item count per query; repeats the last one forever.
    struct ScriptedList {
        counts: VecDeque<Result<usize, ()>>,
        last: usize,
        scrolls: usize,
    }

    impl ScriptedList {
        fn new(counts: impl IntoIterator<Item = usize>) -> Self {
            Self { counts: counts.into_iter().map(Ok).collect(), last: 0, scrolls: 0 }
        }

        fn failing_after(counts: impl IntoIterator<Item = usize>) -> Self {
            let mut s = Self::new(counts);
            s.counts.push_back(Err(()));
            s
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedList {
        async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn dom_snapshot(&mut self) -> Result<String, SessionError> {
            Ok(String::new())
        }
        async fn find_all(&mut self, _selector: &str) -> Result<Vec<ElementHandle>, SessionError> {
            Ok(vec![])
        }
        async fn element_text(&mut self, _el: &ElementHandle) -> Result<String, SessionError> {
            Ok(String::new())
        }
        async fn click(&mut self, _el: &ElementHandle) -> Result<(), SessionError> {
            Ok(())
        }
        async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
            self.scrolls += 1;
            Ok(())
        }
        async fn element_count(&mut self, _selector: &str) -> Result<usize, SessionError> {
            match self.counts.pop_front() {
                Some(Ok(n)) => {
                    self.last = n;
                    Ok(n)
                }
                Some(Err(())) => Err(SessionError::Protocol("stale element".into())),
                None => Ok(self.last),
            }
        }
        async fn wait_for(&mut self, _s: &str, _t: Duration) -> Result<bool, SessionError> {
            Ok(true)
        }
        async fn close(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn machine(pause_s: u64, threshold_s: u64, ceiling_s: u64) -> ListStabilizer {
        ListStabilizer::new(
            Duration::from_secs(pause_s),
            Duration::from_secs(threshold_s),
            Duration::from_secs(ceiling_s),
        )
    }

    #[test]
    fn test_growth_resets_stagnation() {
        let mut m = machine(2, 10, 300);
        let t = Duration::from_secs(1);
        assert_eq!(m.observe(10, t), ScrollState::Scrolling);
        for _ in 0..4 {
            assert_eq!(m.observe(10, t), ScrollState::Scrolling);
        }
        assert_eq!(m.observe(12, t), ScrollState::Scrolling);
        for _ in 0..4 {
            assert_eq!(m.observe(12, t), ScrollState::Scrolling);
        }
        assert_eq!(m.observe(11, t), ScrollState::Stable);
        assert_eq!(m.item_count(), 12);
        assert_eq!(m.observe(50, t), ScrollState::Stable);
    }

    #[test]
    fn test_ceiling_times_out_while_growing() {
        let mut m = machine(2, 10, 300);
        assert_eq!(m.observe(1, Duration::from_secs(300)), ScrollState::Scrolling);
        assert_eq!(m.observe(2, Duration::from_secs(301)), ScrollState::TimedOut);
        assert_eq!(m.item_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plateau_terminates_stable_within_bound() {
        // Grows for 5 scrolls, then stays flat.
        let mut session = ScriptedList::new([5, 10, 15, 20, 25]);
        let mut log = ExtractionLog::new();
        let out = stabilize(&mut session, "div.card", machine(2, 10, 300), &mut log).await;

        assert_eq!(out.state, ScrollState::Stable);
        assert_eq!(out.items, 25);
        assert!(out.elapsed <= Duration::from_secs(5 * 2 + 10));
        assert_eq!(session.scrolls, 5 + 5);
        assert!(log.contains("Found 25 cards"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_is_stable_after_threshold() {
        let mut session = ScriptedList::new([]);
        let mut log = ExtractionLog::new();
        let out = stabilize(&mut session, "div.card", machine(2, 10, 300), &mut log).await;
        assert_eq!(out.state, ScrollState::Stable);
        assert_eq!(out.items, 0);
        assert_eq!(out.elapsed, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endless_growth_hits_ceiling() {
        let mut session = ScriptedList::new(1..=1000);
        let mut log = ExtractionLog::new();
        let out = stabilize(&mut session, "div.card", machine(2, 10, 30), &mut log).await;
        assert_eq!(out.state, ScrollState::TimedOut);
        assert!(out.elapsed > Duration::from_secs(30));
        assert!(out.elapsed <= Duration::from_secs(32));
        assert!(log.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_is_fail_safe() {
        let mut session = ScriptedList::failing_after([3, 6]);
        let mut log = ExtractionLog::new();
        let out = stabilize(&mut session, "div.card", machine(2, 10, 300), &mut log).await;
        assert_eq!(out.state, ScrollState::TimedOut);
        assert_eq!(out.items, 6);
        assert!(log.contains("Scrolling failed"));
    }
}
