use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

/// Length of the trailing window requests are counted over.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window request counter keyed by client identity.
///
/// Each client keeps the instants of its accepted requests inside the
/// trailing [`WINDOW`]. A request is rejected, and not recorded, once the
/// window already holds `max_requests` entries.
///
/// The client table is bounded by `max_clients`. When a new client shows up
/// at capacity, idle windows are dropped first and then a batch of the least
/// recently seen clients is evicted.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, ClientWindow>>>,
    max_requests: u32,
    max_clients: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
struct ClientWindow {
    timestamps: VecDeque<Instant>,
    last_seen: Instant,
}

impl ClientWindow {
    fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_seen: now,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.duration_since(*oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window. Only set on
    /// rejection.
    pub retry_after: Option<Duration>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, max_clients: usize) -> Self {
        Self::with_clock(max_requests, max_clients, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: u32, max_clients: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            max_clients: max_clients.max(1),
            window: WINDOW,
            clock,
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// Returns whether `client_key` may proceed, recording the request if so.
    pub fn allow(&self, client_key: &str) -> bool {
        self.check(client_key).allowed
    }

    pub fn check(&self, client_key: &str) -> RateDecision {
        let now = self.clock.now();
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);

        if !windows.contains_key(client_key) && windows.len() >= self.max_clients {
            self.make_room(&mut windows, now);
        }

        let window = windows
            .entry(client_key.to_string())
            .or_insert_with(|| ClientWindow::new(now));
        window.prune(now, self.window);
        window.last_seen = now;

        let in_window = window.timestamps.len();
        if in_window >= self.max_requests as usize {
            let retry_after = window
                .timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)));
            return RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                retry_after,
            };
        }

        window.timestamps.push_back(now);
        RateDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - (in_window as u32 + 1),
            retry_after: None,
        }
    }

    /// Drops clients with no request left in the window. Returns how many
    /// were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        let initial_count = windows.len();

        windows.retain(|_, window| {
            window.prune(now, self.window);
            !window.timestamps.is_empty()
        });

        initial_count - windows.len()
    }

    pub fn client_count(&self) -> usize {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Frees table space for a new client. Idle windows go first; if that
    /// is not enough, the least recently seen clients are evicted down to
    /// `max_clients - headroom`, so the next `headroom` new clients insert
    /// without another scan.
    fn make_room(&self, windows: &mut HashMap<String, ClientWindow>, now: Instant) {
        windows.retain(|_, window| {
            window.prune(now, self.window);
            !window.timestamps.is_empty()
        });

        if windows.len() < self.max_clients {
            return;
        }

        let headroom = (self.max_clients / 10).max(1);
        let evict = windows.len() + headroom - self.max_clients;
        let mut by_age: Vec<(Instant, &String)> = windows
            .iter()
            .map(|(key, window)| (window.last_seen, key))
            .collect();
        by_age.select_nth_unstable_by_key(evict - 1, |(last_seen, _)| *last_seen);
        let stalest: Vec<String> = by_age[..evict].iter().map(|(_, key)| (*key).clone()).collect();

        tracing::debug!(evicted = stalest.len(), "Rate limit table full, evicting least recent clients");
        for key in stalest {
            windows.remove(&key);
        }
    }
}
