//! Holder for the hashed passphrase with automatic expiry.
//!
//! The raw passphrase is hashed immediately and never kept. The hash lives in
//! a [`SecureBytes`] buffer until it is cleared explicitly, replaced, or the
//! time-to-live elapses. One background thread per holder watches the
//! current deadline; setting a new passphrase moves that deadline instead of
//! stacking timers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use zeroize::Zeroizing;

use crate::hash::hash512;
use crate::memory::SecureBytes;
use crate::types::{
    SafeError, SafeResult, DEFAULT_PASSPHRASE_TTL_SECS, MINIMUM_PASSPHRASE_LENGTH,
};

const STATIC_SALT: &str = "abcDEF1234!@#$";
const PASSPHRASE_ITERATIONS: u32 = 20_011;

struct State {
    secret: Option<SecureBytes>,
    deadline: Option<Instant>,
    ttl: Duration,
    shutdown: bool,
}

impl State {
    fn clear(&mut self) {
        // SecureBytes zeroes itself on drop
        self.secret = None;
        self.deadline = None;
    }

    fn expire_if_due(&mut self, now: Instant) {
        if matches!(self.deadline, Some(deadline) if now >= deadline) {
            self.clear();
            tracing::debug!("passphrase expired");
        }
    }
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

/// Time-limited holder of a passphrase hash
pub struct Passphrase {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Passphrase {
    /// Create an empty holder with the default ten minute lifetime
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_PASSPHRASE_TTL_SECS))
    }

    /// Create an empty holder whose secrets live for `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    secret: None,
                    deadline: None,
                    ttl,
                    shutdown: false,
                }),
                wake: Condvar::new(),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Validate, hash and store `raw`, re-arming the expiry deadline.
    ///
    /// Fails with [`SafeError::InvalidPassphrase`] when `raw` is shorter than
    /// the minimum length. A rejected passphrase leaves any stored secret
    /// untouched.
    pub fn set_passphrase(&self, raw: &str) -> SafeResult<()> {
        if raw.encode_utf16().count() < MINIMUM_PASSPHRASE_LENGTH {
            return Err(SafeError::InvalidPassphrase);
        }

        // Hash outside the lock, this is the slow part
        let digest = Zeroizing::new(hash512(raw, STATIC_SALT, PASSPHRASE_ITERATIONS));
        let hash = SecureBytes::from_slice(&digest[..]);

        self.ensure_timer()?;

        let mut state = self.shared.state.lock();
        // A lifetime past the end of the clock never expires
        state.deadline = Instant::now().checked_add(state.ttl);
        state.secret = Some(hash);
        drop(state);
        self.shared.wake.notify_all();

        Ok(())
    }

    /// A copy of the stored hash.
    ///
    /// Fails with [`SafeError::PassphraseExpired`] when nothing is held.
    pub fn secret_hash(&self) -> SafeResult<SecureBytes> {
        let mut state = self.shared.state.lock();
        state.expire_if_due(Instant::now());
        state.secret.clone().ok_or(SafeError::PassphraseExpired)
    }

    /// Zero and discard the stored hash. Safe to call repeatedly.
    pub fn clear(&self) {
        self.shared.state.lock().clear();
        self.shared.wake.notify_all();
    }

    /// Alias of [`Passphrase::clear`]
    pub fn lock(&self) {
        self.clear();
    }

    pub fn is_locked(&self) -> bool {
        let mut state = self.shared.state.lock();
        state.expire_if_due(Instant::now());
        state.secret.is_none()
    }

    /// Change the lifetime applied by the next `set_passphrase`
    pub fn set_ttl(&self, ttl: Duration) {
        self.shared.state.lock().ttl = ttl;
    }

    pub fn ttl(&self) -> Duration {
        self.shared.state.lock().ttl
    }

    fn ensure_timer(&self) -> SafeResult<()> {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("passphrase-expiry".into())
            .spawn(move || run_expiry(shared))?;
        *timer = Some(handle);
        Ok(())
    }
}

impl Default for Passphrase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Passphrase {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.clear();
        }
        self.shared.wake.notify_all();

        if let Some(handle) = self.timer.lock().take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passphrase")
            .field("locked", &self.is_locked())
            .field("ttl", &self.ttl())
            .finish()
    }
}

fn run_expiry(shared: Arc<Shared>) {
    let mut state = shared.state.lock();
    while !state.shutdown {
        match state.deadline {
            None => shared.wake.wait(&mut state),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    state.expire_if_due(now);
                } else {
                    // Woken early when the deadline moves or on shutdown
                    let _ = shared.wake.wait_until(&mut state, deadline);
                }
            }
        }
    }
}
