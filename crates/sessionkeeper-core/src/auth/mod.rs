//! Authentication module for the logged-in user's session.
//!
//! This module provides:
//! - `SessionRecord`: the single source of truth for the current login state
//! - `reduce`: the pure state-transition function over that record
//! - `auth_header`: the Basic-Auth header sent with a login request
//! - `CredentialStore`: optional OS-level password storage via keyring
//!
//! Sessions expire after a configurable timeout (one day by default).

pub mod credentials;
pub mod header;
pub mod reducer;
pub mod session;

pub use credentials::CredentialStore;
pub use header::{auth_header, basic_credentials};
pub use reducer::{reduce, reduce_at, SessionAction};
pub use session::{Credentials, LoginError, SessionRecord};
