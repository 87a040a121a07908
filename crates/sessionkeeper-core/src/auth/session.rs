use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Opaque failure attached to a session after an unsuccessful login.
///
/// Transport and parse failures are deliberately flattened into this one
/// type; consumers only learn that the login failed and why, as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Login failed: {message}")]
pub struct LoginError {
    message: String,
}

impl LoginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The logged-in user's session.
///
/// A record with an empty `token` is logged out, whatever else it holds.
/// `last_authed` is stored as epoch milliseconds under `lastAuthed`; any
/// fields the backend returns beyond the typed ones are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub user_name: String,
    #[serde(default, deserialize_with = "de_user_id")]
    pub user_id: i64,
    #[serde(default)]
    pub token: String,
    #[serde(
        default,
        rename = "lastAuthed",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_authed: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub last_error: Option<LoginError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    pub fn is_logged_in(&self) -> bool {
        !self.token.is_empty()
    }

    /// When this session stops being valid under `timeout`.
    /// A record that was never authenticated counts from the epoch; a timeout
    /// too large to represent never expires.
    pub fn expires_at(&self, timeout: Duration) -> DateTime<Utc> {
        self.last_authed
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        Utc::now() >= self.expires_at(timeout)
    }

    pub fn time_until_expiry(&self, timeout: Duration) -> Duration {
        self.expires_at(timeout) - Utc::now()
    }

    /// Merge `credentials` into this record; credential fields win.
    pub(crate) fn merge(&mut self, credentials: Credentials) {
        let Credentials {
            user_name,
            user_id,
            token,
            last_authed,
            extra,
        } = credentials;

        if let Some(user_name) = user_name {
            self.user_name = user_name;
        }
        if let Some(user_id) = user_id {
            self.user_id = user_id;
        }
        if let Some(token) = token {
            self.token = token;
        }
        if last_authed.is_some() {
            self.last_authed = last_authed;
        }
        self.extra.extend(extra);
    }
}

/// The fields a login transition merges into the session.
///
/// Parsed from a login response body (at least `user_name`, `user_id` and
/// `token` are expected) or built from a persisted [`SessionRecord`].
/// Anything left unset keeps the record's current value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_user_id")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(
        default,
        rename = "lastAuthed",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_authed: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credentials {
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.last_authed = Some(now);
        self
    }
}

impl From<SessionRecord> for Credentials {
    fn from(record: SessionRecord) -> Self {
        Self {
            user_name: Some(record.user_name),
            user_id: Some(record.user_id),
            token: Some(record.token),
            last_authed: record.last_authed,
            extra: record.extra,
        }
    }
}

/// Backends send `user_id` as either a number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            UserId::Number(n) => Ok(n),
            UserId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid user_id: {:?}", s))),
        }
    }
}

fn de_user_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    UserId::deserialize(deserializer)?.into_i64()
}

fn de_opt_user_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Option::<UserId>::deserialize(deserializer)?
        .map(UserId::into_i64)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_is_logged_out() {
        let record = SessionRecord::default();
        assert!(!record.is_logged_in());
        assert_eq!(record.user_name, "");
        assert_eq!(record.user_id, 0);
        assert!(record.last_authed.is_none());
        assert!(record.last_error.is_none());
    }

    #[test]
    fn test_empty_token_is_logged_out_regardless_of_fields() {
        let record = SessionRecord {
            user_name: "foobar".to_string(),
            user_id: 7,
            last_authed: Some(Utc::now()),
            ..Default::default()
        };
        assert!(!record.is_logged_in());
    }

    #[test]
    fn test_expiry_uses_last_authed() {
        let now = Utc::now();
        let record = SessionRecord {
            token: "T".to_string(),
            last_authed: Some(now - Duration::hours(25)),
            ..Default::default()
        };
        assert!(record.is_expired(Duration::hours(24)));
        assert!(!record.is_expired(Duration::hours(26)));

        let fresh = SessionRecord {
            last_authed: Some(now),
            ..record
        };
        assert!(fresh.time_until_expiry(Duration::hours(24)) > Duration::hours(23));
    }

    #[test]
    fn test_never_authed_counts_from_epoch() {
        let record = SessionRecord::default();
        assert_eq!(
            record.expires_at(Duration::days(1)),
            DateTime::<Utc>::UNIX_EPOCH + Duration::days(1)
        );
        assert!(record.is_expired(Duration::days(1)));
    }

    #[test]
    fn test_huge_timeout_never_expires() {
        let record = SessionRecord {
            token: "T".to_string(),
            last_authed: Some(Utc::now()),
            ..Default::default()
        };
        let timeout = Duration::milliseconds(i64::MAX);
        assert_eq!(record.expires_at(timeout), DateTime::<Utc>::MAX_UTC);
        assert!(!record.is_expired(timeout));
        assert!(record.time_until_expiry(timeout) > Duration::days(365));
    }

    #[test]
    fn test_record_json_shape() {
        let record = SessionRecord {
            user_name: "foobar".to_string(),
            user_id: 1,
            token: "123BABEFACE".to_string(),
            last_authed: DateTime::from_timestamp_millis(1_700_000_000_123),
            last_error: Some(LoginError::new("not persisted")),
            extra: Map::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "user_name": "foobar",
                "user_id": 1,
                "token": "123BABEFACE",
                "lastAuthed": 1_700_000_000_123_i64,
            })
        );

        let back: SessionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.last_error, None);
        assert_eq!(back.last_authed, record.last_authed);
    }

    #[test]
    fn test_record_accepts_string_user_id_and_extra_fields() {
        let record: SessionRecord = serde_json::from_value(json!({
            "user_name": "foobar",
            "user_id": "1",
            "token": "T",
            "lastAuthed": null,
            "role": "admin",
        }))
        .unwrap();
        assert_eq!(record.user_id, 1);
        assert_eq!(record.last_authed, None);
        assert_eq!(record.extra.get("role"), Some(&json!("admin")));
    }

    #[test]
    fn test_bad_user_id_rejected() {
        let result: Result<Credentials, _> = serde_json::from_value(json!({
            "user_name": "foobar",
            "user_id": "not-a-number",
            "token": "T",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_missing_fields_are_none() {
        let creds: Credentials = serde_json::from_value(json!({ "token": "T" })).unwrap();
        assert_eq!(creds.token.as_deref(), Some("T"));
        assert_eq!(creds.user_name, None);
        assert_eq!(creds.user_id, None);
        assert!(creds.extra.is_empty());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut record = SessionRecord {
            user_name: "old".to_string(),
            user_id: 3,
            token: "OLD".to_string(),
            ..Default::default()
        };
        record.merge(Credentials {
            token: Some("NEW".to_string()),
            ..Default::default()
        });
        assert_eq!(record.token, "NEW");
        assert_eq!(record.user_name, "old");
        assert_eq!(record.user_id, 3);
    }
}
