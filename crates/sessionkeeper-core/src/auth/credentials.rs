use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_PREFIX: &str = "sessionkeeper";

/// Remembered login passwords, kept in the OS keychain.
///
/// Entries are scoped to one login endpoint so the same user name on two
/// backends never shares a password.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
}

impl CredentialStore {
    pub fn for_endpoint(login_url: &str) -> Self {
        Self {
            service: format!("{}:{}", SERVICE_PREFIX, login_url),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, user_name: &str) -> Result<Entry> {
        Entry::new(&self.service, user_name).context("Failed to create keyring entry")
    }

    pub fn remember(&self, user_name: &str, password: &str) -> Result<()> {
        self.entry(user_name)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    pub fn recall(&self, user_name: &str) -> Result<Option<String>> {
        match self.entry(user_name)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Forget the stored password; forgetting a missing entry is not an error.
    pub fn forget(&self, user_name: &str) -> Result<()> {
        match self.entry(user_name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
