//! The account a set of repositories belongs to.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// SSH key pair used for clone and fetch. Keys carry no passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshCredentials {
    pub public_key: PathBuf,
    pub private_key: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Namespaces the on-disk clones of this account
    pub id: u64,
    /// Verified author emails, stored lowercased
    emails: BTreeSet<String>,
    pub ssh: Option<SshCredentials>,
}

impl Account {
    pub fn new<I, S>(id: u64, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            emails: emails.into_iter().map(|e| normalize(e.as_ref())).collect(),
            ssh: None,
        }
    }

    pub fn with_ssh(mut self, credentials: SshCredentials) -> Self {
        self.ssh = Some(credentials);
        self
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }

    pub fn remove_email(&mut self, email: &str) -> bool {
        self.emails.remove(&normalize(email))
    }

    /// Whether a commit by `author_email` counts towards this account.
    pub fn is_authorized(&self, author_email: &str) -> bool {
        self.emails.contains(&normalize(author_email))
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_matching_ignores_case_and_whitespace() {
        let account = Account::new(1, ["Me@Example.com "]);
        assert!(account.is_authorized("me@example.COM"));
        assert!(!account.is_authorized("other@example.com"));
    }

    #[test]
    fn no_emails_authorizes_nothing() {
        let account = Account::new(1, Vec::<String>::new());
        assert!(!account.is_authorized(""));
    }

    #[test]
    fn emails_can_be_removed() {
        let mut account = Account::new(1, ["a@x.org", "b@x.org"]);
        assert!(account.remove_email("A@x.org"));
        assert_eq!(account.emails().collect::<Vec<_>>(), vec!["b@x.org"]);
    }
}
