//! sessionkeeper-core - client-side authentication session management.
//!
//! The crate tracks one logged-in user's session record, persists it across
//! restarts, performs Basic-Auth logins against a backend, and logs the user
//! off automatically once the session times out.
//!
//! - [`auth`]: the session record, its reducer, and the Basic-Auth header
//! - [`store`]: the shared, observable session store and its provider
//! - [`mirror`]: persisted copies of the session keyed by login URL
//! - [`api`]: the login transport (reqwest in production)
//! - [`controller`]: login, logoff, and the expiry timer
//! - [`config`]: file and environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod mirror;
pub mod store;

pub use api::{ApiError, HttpTransport, LoginTransport};
pub use auth::{
    auth_header, reduce, Credentials, CredentialStore, LoginError, SessionAction, SessionRecord,
};
pub use config::Config;
pub use controller::LoginController;
pub use mirror::{FileMirror, MemoryMirror, MirrorError, SessionMirror};
pub use store::{SessionProvider, SessionStore};
