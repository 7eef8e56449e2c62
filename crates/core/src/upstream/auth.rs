//! Session-token bookkeeping for the upstream client.
//!
//! Tokens live 15 minutes upstream-side; the client refreshes proactively
//! at 14 minutes so a request never rides an about-to-expire token. Only the
//! holder of the token lock performs a login, which keeps concurrent 401
//! handling down to a single outstanding login.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Refresh threshold: one minute inside the 15-minute token lifetime.
pub(crate) const REFRESH_AFTER: Duration = Duration::from_secs(14 * 60);

/// Path prefixes that require a session token.
const PROTECTED_PREFIXES: [&str; 3] = ["/user", "/manga/draft", "/upload"];

#[derive(Debug, Clone)]
pub(crate) struct SessionToken {
    pub session: String,
    #[allow(dead_code)]
    pub refresh: Option<String>,
    pub obtained_at: Instant,
}

impl SessionToken {
    pub fn new(session: String, refresh: Option<String>) -> Self {
        Self {
            session,
            refresh,
            obtained_at: Instant::now(),
        }
    }

    pub fn needs_refresh(&self) -> bool {
        self.obtained_at.elapsed() >= REFRESH_AFTER
    }
}

/// Single-writer token slot. Readers clone the session string; the refresh
/// routine swaps the slot while holding the lock.
#[derive(Default)]
pub(crate) struct TokenCache {
    pub slot: Mutex<Option<SessionToken>>,
}

/// Whether a request path needs the session token attached.
pub(crate) fn protected_path(path: &str) -> bool {
    if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    // /chapter/{id}/read
    if let Some(rest) = path.strip_prefix("/chapter/") {
        return rest.trim_end_matches('/').ends_with("/read");
    }
    false
}
