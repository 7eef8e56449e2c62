//! Fixed-window rate limiting for the upstream client.
//!
//! The upstream enforces a small global budget plus tighter per-endpoint
//! windows. Exhausting a window fails the call immediately instead of
//! queueing; the global window additionally enters a cool-down so a burst
//! does not hammer the boundary of consecutive windows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::UpstreamError;

struct WindowState {
    window_started: Instant,
    used: u32,
    cooldown_until: Option<Instant>,
}

/// Allows up to `max` acquisitions per `window`. When the window is
/// exhausted, acquisitions fail until the window rolls over, or for
/// `cooldown` when one is configured.
pub struct WindowLimiter {
    max: u32,
    window: Duration,
    cooldown: Option<Duration>,
    state: Mutex<WindowState>,
}

impl WindowLimiter {
    pub fn new(max: u32, window: Duration, cooldown: Option<Duration>) -> Self {
        Self {
            max,
            window,
            cooldown,
            state: Mutex::new(WindowState {
                window_started: Instant::now(),
                used: 0,
                cooldown_until: None,
            }),
        }
    }

    /// Consume one slot, or report how long the caller would have to wait.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let Ok(mut state) = self.state.lock() else {
            // A poisoned limiter fails closed.
            return Err(self.window);
        };

        if let Some(until) = state.cooldown_until {
            if now < until {
                return Err(until - now);
            }
            state.cooldown_until = None;
            state.window_started = now;
            state.used = 0;
        }

        if now.duration_since(state.window_started) >= self.window {
            state.window_started = now;
            state.used = 0;
        }

        if state.used < self.max {
            state.used += 1;
            Ok(())
        } else {
            let wait = match self.cooldown {
                Some(cooldown) => {
                    state.cooldown_until = Some(now + cooldown);
                    cooldown
                }
                None => self.window - now.duration_since(state.window_started),
            };
            Err(wait)
        }
    }
}

/// The global limiter plus per-endpoint overlays, each checked before the
/// global budget is consumed.
pub struct RateLimits {
    global: WindowLimiter,
    endpoints: HashMap<&'static str, WindowLimiter>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimits {
    pub fn new() -> Self {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            "login",
            WindowLimiter::new(30, Duration::from_secs(3600), None),
        );
        endpoints.insert(
            "random",
            WindowLimiter::new(60, Duration::from_secs(60), None),
        );
        Self::custom(
            WindowLimiter::new(5, Duration::from_secs(1), Some(Duration::from_secs(60))),
            endpoints,
        )
    }

    pub(crate) fn custom(
        global: WindowLimiter,
        endpoints: HashMap<&'static str, WindowLimiter>,
    ) -> Self {
        Self { global, endpoints }
    }

    /// Acquire a slot for a request, checking the endpoint overlay (when the
    /// endpoint has one) before the global budget.
    pub fn acquire(&self, endpoint: Option<&str>) -> Result<(), UpstreamError> {
        if let Some(limiter) = endpoint.and_then(|name| self.endpoints.get(name)) {
            limiter.try_acquire().map_err(|wait| rate_limited(endpoint, wait))?;
        }
        self.global
            .try_acquire()
            .map_err(|wait| rate_limited(None, wait))
    }
}

fn rate_limited(endpoint: Option<&str>, wait: Duration) -> UpstreamError {
    let scope = endpoint.unwrap_or("global");
    UpstreamError::RateLimited {
        reason: format!("{} request budget exhausted", scope),
        retry_after_secs: Some(wait.as_secs().max(1)),
    }
}
