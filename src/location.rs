//! Parsing of git remote location strings.
//!
//! Accepts scp-style (`user@host:path`), `ssh://`, `https://`, `git://` and
//! plain paths. Parsing never fails; callers reject empty names themselves.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const GIT_SUFFIX: &str = ".git";
const DEFAULT_REMOTE_USER: &str = "git";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLocation {
    pub remote_user: String,
    /// Always carries the `.git` suffix
    pub repo_name: String,
}

impl RepositoryLocation {
    pub fn parse(location: &str) -> Self {
        let (remote_user, repo_name) = parse_location(location);
        Self {
            remote_user,
            repo_name,
        }
    }

    /// Caller-side validation for names the parser let through.
    pub fn validate(location: &str) -> Result<Self> {
        let parsed = Self::parse(location);
        if parsed.display_name().trim().is_empty() {
            return Err(AppError::Parse(location.to_string()));
        }
        Ok(parsed)
    }

    /// Repository name without the `.git` suffix.
    pub fn display_name(&self) -> &str {
        self.repo_name
            .strip_suffix(GIT_SUFFIX)
            .unwrap_or(&self.repo_name)
    }
}

/// Extract `(remote_user, repo_name)` from a git remote location.
pub fn parse_location(location: &str) -> (String, String) {
    let remainder = match location.find("://") {
        Some(idx) => &location[idx + 3..],
        None => location,
    };

    let mut name = remainder.rsplit('/').next().unwrap_or(remainder);
    if name.contains(':') {
        name = remainder.rsplit(':').next().unwrap_or(remainder);
    }

    let repo_name = if name.ends_with(GIT_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, GIT_SUFFIX)
    };

    let first_segment = remainder.split('/').next().unwrap_or(remainder);
    let remote_user = match first_segment.split_once('@') {
        Some((user, _)) => user.to_string(),
        None => DEFAULT_REMOTE_USER.to_string(),
    };

    (remote_user, repo_name)
}

/// Hosting service a repository lives on, guessed from its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    Github,
    Bitbucket,
    Local,
}

impl RepositoryKind {
    pub fn detect(location: &str) -> Self {
        if location.contains("bitbucket") {
            RepositoryKind::Bitbucket
        } else if location.contains("github") {
            RepositoryKind::Github
        } else {
            RepositoryKind::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(location: &str) -> (String, String) {
        parse_location(location)
    }

    fn pair(user: &str, name: &str) -> (String, String) {
        (user.to_string(), name.to_string())
    }

    #[test]
    fn parses_common_remote_forms() {
        assert_eq!(parsed("git://github.com/rails/rails.git"), pair("git", "rails.git"));
        assert_eq!(parsed("git@github.com:cantsin/random-repo"), pair("git", "random-repo.git"));
        assert_eq!(parsed("https://github.com/cantsin/test.git"), pair("git", "test.git"));
        assert_eq!(parsed("ssh://git@github.com/cantsin/test-2.git"), pair("git", "test-2.git"));
        assert_eq!(
            parsed("https://foo@bitbucket.org/foo/reponame.git"),
            pair("foo", "reponame.git")
        );
        assert_eq!(parsed("james@foo:random/testing.git"), pair("james", "testing.git"));
    }

    #[test]
    fn suffix_is_not_doubled() {
        let (_, name) = parsed("https://github.com/cantsin/test.git");
        let (_, again) = parsed(&name);
        assert_eq!(again, "test.git");
    }

    #[test]
    fn malformed_input_becomes_the_name() {
        assert_eq!(parsed("justaname"), pair("git", "justaname.git"));
    }

    #[test]
    fn local_paths_use_last_component() {
        assert_eq!(parsed("/tmp/work/source"), pair("git", "source.git"));
    }

    #[test]
    fn empty_names_fail_validation_only() {
        assert_eq!(parsed("https://github.com/cantsin/"), pair("git", ".git"));
        assert!(matches!(
            RepositoryLocation::validate("https://github.com/cantsin/"),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn display_name_strips_suffix() {
        let location = RepositoryLocation::parse("git://github.com/rails/rails.git");
        assert_eq!(location.display_name(), "rails");
    }

    #[test]
    fn kind_is_detected_from_host() {
        assert_eq!(RepositoryKind::detect("git@github.com:a/b"), RepositoryKind::Github);
        assert_eq!(RepositoryKind::detect("https://bitbucket.org/a/b"), RepositoryKind::Bitbucket);
        assert_eq!(RepositoryKind::detect("/srv/git/b"), RepositoryKind::Local);
    }
}
