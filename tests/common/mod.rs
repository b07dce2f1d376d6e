#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use tempfile::TempDir;

use git_tracker::{Account, DayBucketing, TrackerConfig};

pub const ME: &str = "me@example.com";
pub const ALSO_ME: &str = "me@work.example.com";
pub const STRANGER: &str = "someone@else.org";

pub const DAY: i64 = 86_400;
/// 2015-03-01 00:00:00 UTC
pub const MARCH_1: i64 = 1_425_168_000;

/// Non-bare repository standing in for a remote.
pub struct SourceRepo {
    _temp_dir: TempDir,
    pub path: PathBuf,
    pub repo: Repository,
}

impl SourceRepo {
    pub fn new(name: &str) -> Self {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let path = temp_dir.path().join(name);

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(&path, &opts).expect("init source");

        Self {
            _temp_dir: temp_dir,
            path,
            repo,
        }
    }

    pub fn location(&self) -> String {
        self.path.to_str().expect("utf-8 path").to_string()
    }

    /// Write `files`, then commit them on HEAD as `email` at `time`.
    pub fn commit(&self, email: &str, time: i64, files: &[(&str, &str)], message: &str) -> Oid {
        let mut index = self.repo.index().expect("index");
        for (name, content) in files {
            fs::write(self.path.join(name), content).expect("write file");
            index.add_path(Path::new(name)).expect("add path");
        }
        index.write().expect("write index");

        let tree_id = index.write_tree().expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("tree");
        let signature = Signature::new("Author", email, &Time::new(time, 0)).expect("signature");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .expect("commit")
    }

    pub fn lightweight_tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).expect("object");
        self.repo.tag_lightweight(name, &object, false).expect("tag");
    }

    pub fn annotated_tag(&self, name: &str, target: Oid, time: i64) {
        let object = self.repo.find_object(target, None).expect("object");
        let tagger = Signature::new("Tagger", ME, &Time::new(time, 0)).expect("signature");
        self.repo.tag(name, &object, &tagger, name, false).expect("tag");
    }
}

pub struct Workspace {
    _root: TempDir,
    pub config: Arc<TrackerConfig>,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let config = TrackerConfig {
            fetch_timeout: None,
            bucketing: DayBucketing::utc(),
            ..TrackerConfig::new(root.path().join("repositories"))
        };
        Self {
            _root: root,
            config: Arc::new(config),
        }
    }
}

pub fn account(id: u64, emails: &[&str]) -> Arc<Account> {
    Arc::new(Account::new(id, emails.iter().copied()))
}
