//! Login transport module.
//!
//! This module provides the `LoginTransport` seam the controller sends
//! login requests through, and `HttpTransport`, its reqwest implementation.
//!
//! A login is a `POST <origin><backend prefix>/user/auth` carrying a
//! Basic-Auth `Authorization` header and no body; the backend answers with
//! JSON credentials (`user_name`, `user_id`, `token`, plus extras).

pub mod client;
pub mod error;

pub use client::{HttpTransport, LoginTransport};
pub use error::ApiError;
