//! Password handling for ZIP encryption.

use zeroize::Zeroizing;

use crate::ZipEntry;

/// A password for entry encryption/decryption.
///
/// The secret is wiped from memory on drop. All ZIP encryption schemes
/// feed the password bytes to their key schedule verbatim, so the
/// encoding is whatever the `String` holds (UTF-8).
#[derive(Clone)]
pub struct Password {
    inner: Zeroizing<String>,
}

impl Password {
    /// Creates a new password from a string.
    pub fn new<S: Into<String>>(password: S) -> Self {
        Self {
            inner: Zeroizing::new(password.into()),
        }
    }

    /// Returns the raw bytes fed to the key schedules.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Returns the password as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the password in characters.
    pub fn len(&self) -> usize {
        self.inner.chars().count()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Supplies passwords for encrypted entries.
///
/// Called once per encrypted entry when it is opened. Returning `None`
/// makes the open fail with [`Error::PasswordRequired`](crate::Error::PasswordRequired).
///
/// Implemented for a single [`Password`] (archive-wide secret), for `()`
/// (no passwords), for `Option<Password>`, and for closures taking the
/// entry.
///
/// ```rust
/// use zipvault::{Password, PasswordProvider, ZipEntry};
///
/// let per_file = |entry: &ZipEntry| {
///     entry.name.starts_with("private/").then(|| Password::new("hunter2"))
/// };
/// let entry = ZipEntry::new("private/key.pem");
/// assert!(per_file.password_for(&entry).is_some());
/// ```
pub trait PasswordProvider {
    /// Returns the password for `entry`, or `None` if none is known.
    fn password_for(&self, entry: &ZipEntry) -> Option<Password>;
}

impl PasswordProvider for Password {
    fn password_for(&self, _entry: &ZipEntry) -> Option<Password> {
        Some(self.clone())
    }
}

impl PasswordProvider for Option<Password> {
    fn password_for(&self, _entry: &ZipEntry) -> Option<Password> {
        self.clone()
    }
}

impl PasswordProvider for () {
    fn password_for(&self, _entry: &ZipEntry) -> Option<Password> {
        None
    }
}

impl<F> PasswordProvider for F
where
    F: Fn(&ZipEntry) -> Option<Password>,
{
    fn password_for(&self, entry: &ZipEntry) -> Option<Password> {
        self(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_bytes() {
        let password = Password::new("pässword");
        assert_eq!(password.as_bytes(), "pässword".as_bytes());
        assert_eq!(password.len(), 8);
        assert_eq!(password.as_bytes().len(), 9);
    }

    #[test]
    fn test_password_debug() {
        let password = Password::new("secret");
        let debug = format!("{:?}", password);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("len"));
    }

    #[test]
    fn test_password_from_str() {
        let password: Password = "test".into();
        assert_eq!(password.as_str(), "test");
        assert!(!password.is_empty());
    }

    #[test]
    fn test_providers() {
        let entry = ZipEntry::new("a.txt");
        assert!(().password_for(&entry).is_none());
        assert_eq!(
            Password::new("x").password_for(&entry).unwrap().as_str(),
            "x"
        );
        let none: Option<Password> = None;
        assert!(none.password_for(&entry).is_none());

        let by_name = |e: &ZipEntry| (e.name == "a.txt").then(|| Password::new("a"));
        assert!(by_name.password_for(&entry).is_some());
        assert!(by_name.password_for(&ZipEntry::new("b.txt")).is_none());
    }
}
