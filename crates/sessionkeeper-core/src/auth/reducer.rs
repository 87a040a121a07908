use chrono::{DateTime, Utc};

use super::session::{Credentials, LoginError, SessionRecord};

/// A transition of the session record.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Merge fresh credentials into the session and clear any login error
    Login(Credentials),
    /// Reset to the logged-out record
    Logoff,
    /// Attach a login failure, leaving everything else alone
    Error(LoginError),
    /// Refresh `last_authed` to the current time
    Reauth,
    ClearError,
}

/// Apply `action` to `state` using the wall clock for `Reauth`.
pub fn reduce(state: SessionRecord, action: SessionAction) -> SessionRecord {
    reduce_at(state, action, Utc::now())
}

/// Apply `action` to `state` as of `now`.
pub fn reduce_at(mut state: SessionRecord, action: SessionAction, now: DateTime<Utc>) -> SessionRecord {
    match action {
        SessionAction::Login(credentials) => {
            state.merge(credentials);
            state.last_error = None;
            state
        }
        SessionAction::Logoff => SessionRecord::default(),
        SessionAction::Error(error) => {
            state.last_error = Some(error);
            state
        }
        SessionAction::Reauth => {
            state.last_authed = Some(now);
            state
        }
        SessionAction::ClearError => {
            state.last_error = None;
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn logged_in() -> SessionRecord {
        SessionRecord {
            user_name: "foobar".to_string(),
            user_id: 1,
            token: "123BABEFACE".to_string(),
            last_authed: Some(Utc::now() - Duration::minutes(5)),
            last_error: Some(LoginError::new("earlier failure")),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_login_credentials_win() {
        let mut extra = serde_json::Map::new();
        extra.insert("role".to_string(), json!("admin"));
        let creds = Credentials {
            user_name: Some("other".to_string()),
            token: Some("NEW".to_string()),
            extra,
            ..Default::default()
        };

        let prior = logged_in();
        let next = reduce(prior.clone(), SessionAction::Login(creds));

        assert_eq!(next.user_name, "other");
        assert_eq!(next.token, "NEW");
        assert_eq!(next.user_id, prior.user_id);
        assert_eq!(next.last_authed, prior.last_authed);
        assert_eq!(next.extra.get("role"), Some(&json!("admin")));
        assert_eq!(next.last_error, None);
    }

    #[test]
    fn test_logoff_yields_default_from_any_state() {
        assert_eq!(reduce(logged_in(), SessionAction::Logoff), SessionRecord::default());
        assert_eq!(
            reduce(SessionRecord::default(), SessionAction::Logoff),
            SessionRecord::default()
        );
    }

    #[test]
    fn test_error_only_touches_error() {
        let prior = SessionRecord {
            last_error: None,
            ..logged_in()
        };
        let err = LoginError::new("connection refused");
        let next = reduce(prior.clone(), SessionAction::Error(err.clone()));
        assert_eq!(next.last_error, Some(err));
        assert_eq!(
            SessionRecord {
                last_error: None,
                ..next
            },
            prior
        );
    }

    #[test]
    fn test_reauth_sets_timestamp() {
        let now = Utc::now();
        let next = reduce_at(SessionRecord::default(), SessionAction::Reauth, now);
        assert_eq!(next.last_authed, Some(now));
        assert_eq!(next.token, "");
    }

    #[test]
    fn test_clear_error_is_idempotent() {
        let once = reduce(logged_in(), SessionAction::ClearError);
        let twice = reduce(once.clone(), SessionAction::ClearError);
        assert_eq!(once.last_error, None);
        assert_eq!(once, twice);
    }
}
