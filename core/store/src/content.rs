//! Entry content layout used by `pass`.
//!
//! The first line of an entry is the password; everything after the first
//! newline is free-form notes (usernames, URLs, OTP seeds).

use zeroize::{Zeroize, ZeroizeOnDrop};

use passdeck_common::{Error, Result, SecretValue};

/// Decrypted entry split into password and notes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EntryContent {
    password: String,
    notes: String,
}

impl EntryContent {
    /// Split decrypted entry content.
    ///
    /// # Errors
    /// - `InvalidInput` if the content is not UTF-8
    pub fn parse(secret: &SecretValue) -> Result<Self> {
        let text = secret.as_str()?;
        let (password, notes) = match text.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (text, ""),
        };

        Ok(Self {
            password: password.trim_end_matches('\r').to_string(),
            notes: notes.to_string(),
        })
    }

    /// Build content from a password and notes.
    ///
    /// # Errors
    /// - `InvalidInput` if the password contains a line break
    pub fn compose(password: impl Into<String>, notes: impl Into<String>) -> Result<Self> {
        let password = password.into();
        if password.contains(['\n', '\r']) {
            return Err(Error::InvalidInput(
                "password must be a single line".to_string(),
            ));
        }
        Ok(Self {
            password,
            notes: notes.into(),
        })
    }

    /// The password line.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Everything after the password line.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Replace the password, keeping the notes.
    pub fn with_password(&self, password: impl Into<String>) -> Result<Self> {
        Self::compose(password, self.notes.clone())
    }

    /// Serialise back to the stored form.
    pub fn to_secret(&self) -> SecretValue {
        if self.notes.is_empty() {
            SecretValue::from(format!("{}\n", self.password))
        } else {
            SecretValue::from(format!("{}\n{}", self.password, self.notes))
        }
    }
}

impl std::fmt::Debug for EntryContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryContent")
            .field("password", &"[REDACTED]")
            .field("notes_len", &self.notes.len())
            .finish()
    }
}
