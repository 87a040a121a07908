//! Shared session state.
//!
//! `SessionStore` holds the one live `SessionRecord` behind a
//! `tokio::sync::watch` channel: readers take snapshots, observers subscribe
//! for changes, and every write goes through the reducer via `dispatch`.
//! `SessionProvider` is the owning object a front end creates once at
//! startup and hands store handles out from.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::auth::{reduce, SessionAction, SessionRecord};

/// Handle to the session state. Clone is cheap and every clone sees the
/// same record.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionRecord>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_state(SessionRecord::default())
    }

    pub fn with_state(initial: SessionRecord) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current record
    pub fn current(&self) -> SessionRecord {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionRecord> {
        self.tx.subscribe()
    }

    /// Run `action` through the reducer. Subscribers are only woken when the
    /// record actually changed; the return value says whether it did.
    pub fn dispatch(&self, action: SessionAction) -> bool {
        let label = action_label(&action);
        let changed = self.tx.send_if_modified(|state| {
            let next = reduce(state.clone(), action);
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        });
        debug!(action = label, changed, "Session action dispatched");
        changed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn action_label(action: &SessionAction) -> &'static str {
    match action {
        SessionAction::Login(_) => "login",
        SessionAction::Logoff => "logoff",
        SessionAction::Error(_) => "error",
        SessionAction::Reauth => "reauth",
        SessionAction::ClearError => "clear_error",
    }
}

/// Owner of the session state for one front end.
///
/// Create it once where the application is assembled and pass store
/// handles (or the provider itself) to whatever needs the current user.
pub struct SessionProvider {
    store: SessionStore,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self {
            store: SessionStore::new(),
        }
    }

    pub fn store(&self) -> SessionStore {
        self.store.clone()
    }

    /// The current user's session
    pub fn user(&self) -> SessionRecord {
        self.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionRecord> {
        self.store.subscribe()
    }

    pub fn dispatch(&self, action: SessionAction) -> bool {
        self.store.dispatch(action)
    }

    /// Tear the provider down, returning the last record it held.
    ///
    /// Subscribers see the channel close once every outstanding store handle
    /// (controllers included) has been dropped as well.
    pub fn close(self) -> SessionRecord {
        let last = self.store.current();
        debug!(logged_in = last.is_logged_in(), "Session provider closed");
        last
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credentials, LoginError};

    fn creds(token: &str) -> Credentials {
        Credentials {
            user_name: Some("foobar".to_string()),
            user_id: Some(1),
            token: Some(token.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_store_starts_logged_out() {
        let provider = SessionProvider::new();
        assert_eq!(provider.user(), SessionRecord::default());
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let other = store.clone();
        store.dispatch(SessionAction::Login(creds("T")));
        assert_eq!(other.current().token, "T");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let provider = SessionProvider::new();
        let mut rx = provider.subscribe();

        assert!(provider.dispatch(SessionAction::Login(creds("T"))));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().token, "T");

        provider.dispatch(SessionAction::Error(LoginError::new("boom")));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().last_error.is_some());
    }

    #[test]
    fn test_noop_dispatch_does_not_notify() {
        let store = SessionStore::new();
        let rx = store.subscribe();
        assert!(!store.dispatch(SessionAction::ClearError));
        assert!(!store.dispatch(SessionAction::Logoff));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let provider = SessionProvider::new();
        let mut rx = provider.subscribe();
        provider.dispatch(SessionAction::Login(creds("T")));

        let last = provider.close();
        assert_eq!(last.token, "T");

        // pending change is still delivered, then the channel reports closed
        assert!(rx.changed().await.is_ok());
        assert!(rx.changed().await.is_err());
    }
}
