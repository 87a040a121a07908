use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{self, HeaderMap, HeaderValue};

/// Encode `user_name:user_pass` as a Basic-Auth credential value.
pub fn basic_credentials(user_name: &str, user_pass: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user_name, user_pass)))
}

/// Build the header set for a login request.
///
/// No validation is done on either argument; an empty user name or password
/// is encoded as-is and left for the backend to reject.
pub fn auth_header(user_name: &str, user_pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // base64 output is always visible ASCII, so this cannot fail
    if let Ok(value) = HeaderValue::from_str(&basic_credentials(user_name, user_pass)) {
        headers.insert(header::AUTHORIZATION, value);
    }
    headers
}
