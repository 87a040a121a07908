//! Login, logoff, and session expiry.
//!
//! `LoginController` is the only component that sequences anything: it
//! restores a persisted session at startup, performs logins through a
//! [`LoginTransport`], and keeps a single expiry timer that logs the user
//! off once the session times out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::LoginTransport;
use crate::auth::{auth_header, LoginError, SessionAction, SessionRecord};
use crate::config::Config;
use crate::mirror::{load_or_default, SessionMirror};
use crate::store::SessionStore;

/// Lower bound (hours) for the timer armed when a persisted session is
/// restored. Absorbs drift between the stored timestamp and the real expiry.
pub const RESTORE_FLOOR_HOURS: i64 = 1;

/// Cap on how far out the expiry timer is scheduled; longer timeouts are
/// treated as "until the process exits".
const MAX_TIMER_DAYS: u64 = 365 * 30;

/// Drives the session: login, logoff, and the expiry timer.
///
/// Clone is cheap; all clones drive the same session. The expiry timer is
/// cancelled when the last clone is dropped or on [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct LoginController {
    inner: Arc<Inner>,
}

struct Inner {
    store: SessionStore,
    mirror: Arc<dyn SessionMirror>,
    transport: Arc<dyn LoginTransport>,
    login_url: String,
    default_timeout: Duration,
    /// Bumped by every login and logoff; a login may only publish while its
    /// generation is still current. Held across each publish.
    generation: Mutex<u64>,
    timer: Mutex<TimerSlot>,
}

#[derive(Default)]
struct TimerSlot {
    next_id: u64,
    armed: Option<ExpiryTimer>,
}

struct ExpiryTimer {
    id: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoginController {
    /// Build a controller without touching the persisted session.
    pub fn new(
        store: SessionStore,
        mirror: Arc<dyn SessionMirror>,
        transport: Arc<dyn LoginTransport>,
        config: &Config,
    ) -> Self {
        let login_url = config.login_url();
        let default_timeout = config.default_timeout();
        debug!(%login_url, timeout_ms = default_timeout.num_milliseconds(), "Login controller created");

        Self {
            inner: Arc::new(Inner {
                store,
                mirror,
                transport,
                login_url,
                default_timeout,
                generation: Mutex::new(0),
                timer: Mutex::new(TimerSlot::default()),
            }),
        }
    }

    /// Build a controller and restore any unexpired persisted session.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; restoring a session
    /// spawns the expiry timer.
    pub fn start(
        store: SessionStore,
        mirror: Arc<dyn SessionMirror>,
        transport: Arc<dyn LoginTransport>,
        config: &Config,
    ) -> Self {
        let controller = Self::new(store, mirror, transport, config);
        controller.rehydrate();
        controller
    }

    pub fn login_url(&self) -> &str {
        &self.inner.login_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    /// Restore the persisted session if memory holds none.
    ///
    /// Only an unexpired session with a token is restored; its timer is
    /// armed for the remaining time but never less than [`RESTORE_FLOOR_HOURS`].
    /// Run once by [`start`](Self::start); call again whenever the persisted
    /// copy is known to have changed. Returns whether a session was restored.
    pub fn rehydrate(&self) -> bool {
        let inner = &self.inner;
        if inner.store.current().is_logged_in() {
            return false;
        }

        let persisted = load_or_default(inner.mirror.as_ref(), &inner.login_url);
        if !persisted.is_logged_in() {
            debug!("No persisted session to restore");
            return false;
        }

        let now = Utc::now();
        let expiry = persisted.expires_at(inner.default_timeout);
        if expiry <= now {
            info!(user = %persisted.user_name, %expiry, "Persisted session expired, staying logged out");
            return false;
        }

        let remaining = (expiry - now).max(Duration::hours(RESTORE_FLOOR_HOURS));
        self.reset_logoff_timeout(Some(remaining));
        inner.store.dispatch(SessionAction::Login(persisted.clone().into()));
        info!(user = %persisted.user_name, remaining_mins = remaining.num_minutes(), "Restored persisted session");
        true
    }

    /// Log in with Basic-Auth credentials.
    ///
    /// On success the session is published to the store and the persisted
    /// copy, and the expiry timer is re-armed for the default timeout. On
    /// failure only the store's error slot changes. Errors never escape:
    /// the returned snapshot is the outcome.
    ///
    /// A login superseded by a later `login` or `logoff` call before its
    /// response arrives is discarded.
    pub async fn login(&self, user_name: &str, user_pass: &str) -> SessionRecord {
        let inner = &self.inner;
        let generation = {
            let mut current = lock(&inner.generation);
            *current += 1;
            *current
        };

        debug!(user = %user_name, url = %inner.login_url, "Logging in");
        let headers = auth_header(user_name, user_pass);
        let result = inner.transport.post_login(&inner.login_url, headers).await;

        let current = lock(&inner.generation);
        if *current != generation {
            debug!(user = %user_name, "Discarding superseded login response");
            return inner.store.current();
        }

        match result {
            Ok(credentials) => {
                inner
                    .store
                    .dispatch(SessionAction::Login(credentials.stamped(Utc::now())));
                let record = inner.store.current();
                if let Err(e) = inner.mirror.write(&inner.login_url, &record) {
                    warn!(error = %e, "Failed to persist session");
                }
                Inner::arm_timer(inner, inner.default_timeout);
                info!(user = %record.user_name, user_id = record.user_id, "Login successful");
            }
            Err(e) => {
                warn!(user = %user_name, error = %e, "Login failed");
                inner.store.dispatch(SessionAction::Error(LoginError::from(&e)));
            }
        }
        drop(current);

        inner.store.current()
    }

    /// Log off: reset the persisted copy and the store to the logged-out record.
    pub fn logoff(&self) {
        self.inner.cancel_timer();
        self.inner.logoff();
    }

    /// Re-arm the expiry timer and mark the session as freshly authenticated.
    ///
    /// `None` uses the configured default timeout. Any pending timer is
    /// cancelled first, so at most one logoff is ever scheduled.
    pub fn reset_logoff_timeout(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(self.inner.default_timeout);
        Inner::arm_timer(&self.inner, timeout);
        self.inner.store.dispatch(SessionAction::Reauth);
    }

    /// Time left before the armed expiry timer logs the user off
    pub fn expiry_remaining(&self) -> Option<Duration> {
        let slot = lock(&self.inner.timer);
        slot.armed.as_ref().map(|timer| {
            let left = timer.deadline.saturating_duration_since(Instant::now());
            Duration::from_std(left).unwrap_or_else(|_| Duration::zero())
        })
    }

    pub fn clear_error(&self) {
        self.inner.store.dispatch(SessionAction::ClearError);
    }

    /// Cancel the expiry timer. The session itself is left as is.
    pub fn shutdown(&self) {
        self.inner.cancel_timer();
        debug!("Login controller shut down");
    }
}

impl Inner {
    fn logoff(&self) {
        let mut generation = lock(&self.generation);
        *generation += 1;

        if let Err(e) = self.mirror.write(&self.login_url, &SessionRecord::default()) {
            warn!(error = %e, "Failed to reset persisted session");
        }
        self.store.dispatch(SessionAction::Logoff);
        info!("Logged off");
    }

    fn arm_timer(this: &Arc<Self>, timeout: Duration) {
        let cap = std::time::Duration::from_secs(MAX_TIMER_DAYS * 24 * 60 * 60);
        let delay = timeout.to_std().unwrap_or_default().min(cap);
        let deadline = Instant::now() + delay;

        let mut slot = lock(&this.timer);
        if let Some(previous) = slot.armed.take() {
            previous.handle.abort();
        }
        slot.next_id += 1;
        let id = slot.next_id;

        let weak: Weak<Self> = Arc::downgrade(this);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(id);
            }
        });

        slot.armed = Some(ExpiryTimer {
            id,
            deadline,
            handle,
        });
        debug!(timer = id, timeout_ms = timeout.num_milliseconds(), "Expiry timer armed");
    }

    fn cancel_timer(&self) {
        if let Some(timer) = lock(&self.timer).armed.take() {
            timer.handle.abort();
            debug!(timer = timer.id, "Expiry timer cancelled");
        }
    }

    /// Timer callback; a timer that was replaced in the meantime does nothing.
    fn expire(&self, id: u64) {
        {
            let mut slot = lock(&self.timer);
            match slot.armed.as_ref() {
                Some(timer) if timer.id == id => slot.armed = None,
                _ => return,
            }
        }
        info!("Session timed out");
        self.logoff();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.timer).armed.take() {
            timer.handle.abort();
        }
    }
}
