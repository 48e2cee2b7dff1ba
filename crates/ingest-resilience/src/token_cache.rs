//! TTL- and cooldown-aware token cache keyed by `(token type, context key)`.
//!
//! Each entry has its own mutex. The outer map lock is held only long enough
//! to find or insert an entry, so work on one key never waits on another.
//! Inserting a new key sweeps out stale entries at most once per
//! [`SWEEP_INTERVAL`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use ingest_models::TokenType;
use tokio::time::Instant;
use tracing::debug;

/// Minimum time between sweeps of stale entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// Token
// =============================================================================

/// A credential as stored in the cache.
///
/// Valid while `now < acquired_at + ttl` and no cooldown is in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub context_key: String,
    pub acquired_at: Instant,
    pub ttl: Duration,
    pub invalid_until: Option<Instant>,
}

impl Token {
    /// Create a freshly acquired token.
    pub fn new(
        token_type: TokenType,
        value: impl Into<String>,
        context_key: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            token_type,
            value: value.into(),
            context_key: context_key.into(),
            acquired_at: Instant::now(),
            ttl,
            invalid_until: None,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.acquired_at + self.ttl
    }

    pub fn is_cooling_down_at(&self, now: Instant) -> bool {
        self.invalid_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn is_valid_at(&self, now: Instant) -> bool {
        !self.is_expired_at(now) && !self.is_cooling_down_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    /// Expired and no longer cooling down: nothing left to serve or guard.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        self.is_expired_at(now) && !self.is_cooling_down_at(now)
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Detailed result of a cache lookup.
///
/// Callers that only need a usable token should use [`TokenCache::get`],
/// which folds the three miss variants together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Token),
    Missing,
    Expired(Token),
    CoolingDown(Token),
}

impl CacheLookup {
    pub fn into_valid(self) -> Option<Token> {
        match self {
            CacheLookup::Hit(token) => Some(token),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    token_type: TokenType,
    context_key: String,
}

impl TokenKey {
    fn new(token_type: TokenType, context_key: &str) -> Self {
        Self {
            token_type,
            context_key: context_key.to_string(),
        }
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Thread-safe token cache with per-entry locking.
#[derive(Debug)]
pub struct TokenCache {
    entries: RwLock<HashMap<TokenKey, Arc<Mutex<Token>>>>,
    last_sweep: Mutex<Instant>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Return a copy of the token if present, unexpired and not cooling down.
    pub fn get(&self, token_type: TokenType, context_key: &str) -> Option<Token> {
        self.lookup(token_type, context_key).into_valid()
    }

    /// Look up an entry and report why it is unusable, if it is.
    pub fn lookup(&self, token_type: TokenType, context_key: &str) -> CacheLookup {
        let Some(entry) = self.entry(token_type, context_key) else {
            return CacheLookup::Missing;
        };
        let token = entry.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let now = Instant::now();

        if token.is_cooling_down_at(now) {
            CacheLookup::CoolingDown(token)
        } else if token.is_expired_at(now) {
            CacheLookup::Expired(token)
        } else {
            CacheLookup::Hit(token)
        }
    }

    /// Return the entry regardless of validity (diagnostics).
    pub fn peek(&self, token_type: TokenType, context_key: &str) -> Option<Token> {
        self.entry(token_type, context_key)
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Store a token, replacing whatever was cached under its key.
    pub fn put(&self, token: Token) {
        let key = TokenKey::new(token.token_type, &token.context_key);

        if let Some(entry) = self.entry(key.token_type, &key.context_key) {
            *entry.lock().unwrap_or_else(PoisonError::into_inner) = token;
            return;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(entry) => {
                *entry.lock().unwrap_or_else(PoisonError::into_inner) = token;
            }
            None => {
                self.sweep_if_due(&mut entries);
                entries.insert(key, Arc::new(Mutex::new(token)));
            }
        }
    }

    /// Drop every stale entry now. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Self::remove_stale(&mut entries, Instant::now())
    }

    fn sweep_if_due(&self, entries: &mut HashMap<TokenKey, Arc<Mutex<Token>>>) {
        let now = Instant::now();
        {
            let mut last_sweep = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            if now < *last_sweep + SWEEP_INTERVAL {
                return;
            }
            *last_sweep = now;
        }
        let removed = Self::remove_stale(entries, now);
        if removed > 0 {
            debug!(removed = removed, remaining = entries.len(), "Swept stale tokens");
        }
    }

    fn remove_stale(entries: &mut HashMap<TokenKey, Arc<Mutex<Token>>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| {
            !entry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_stale_at(now)
        });
        before - entries.len()
    }

    /// Put an entry into cooldown without deleting it.
    ///
    /// Only the given `(type, context_key)` is affected. Returns `false` if
    /// there was no entry to mark.
    pub fn invalidate(&self, token_type: TokenType, context_key: &str, cooldown: Duration) -> bool {
        let Some(entry) = self.entry(token_type, context_key) else {
            return false;
        };
        let until = Instant::now() + cooldown;
        entry.lock().unwrap_or_else(PoisonError::into_inner).invalid_until = Some(until);
        debug!(
            token_type = %token_type,
            context_key = %context_key,
            cooldown_secs = cooldown.as_secs(),
            "Token marked invalid"
        );
        true
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, token_type: TokenType, context_key: &str) -> Option<Arc<Mutex<Token>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TokenKey::new(token_type, context_key))
            .cloned()
    }
}

// =============================================================================
// Tests
// =============================================================================
