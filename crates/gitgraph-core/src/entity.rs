use crate::{BranchId, CommitId, CommitKind, FileId, RepoId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub name: String,
}

impl Repository {
    pub fn new(id: RepoId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Display name, falling back to the identifier when the name is empty.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub repo: RepoId,
    pub is_default: bool,
    pub merged_into: Option<BranchId>,
    /// Commits in append order; the store maintains this.
    pub commits: Vec<CommitId>,
    /// The one zero-parent commit of this branch, set when it is added.
    pub initial_commit: Option<CommitId>,
}

impl Branch {
    pub fn new(id: BranchId, name: impl Into<String>, repo: RepoId) -> Self {
        Self {
            id,
            name: name.into(),
            repo,
            is_default: false,
            merged_into: None,
            commits: Vec::new(),
            initial_commit: None,
        }
    }

    pub fn default_branch(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn last_commit(&self) -> Option<&CommitId> {
        self.commits.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub author: UserId,
    pub branch: BranchId,
    pub parents: Vec<CommitId>,
    pub modifies: Vec<FileId>,
}

impl Commit {
    pub fn new(
        id: CommitId,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        author: UserId,
        branch: BranchId,
    ) -> Self {
        Self {
            id,
            message: message.into(),
            timestamp,
            author,
            branch,
            parents: Vec::new(),
            modifies: Vec::new(),
        }
    }

    pub fn with_parents(mut self, parents: Vec<CommitId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_modified_files(mut self, files: Vec<FileId>) -> Self {
        self.modifies = files;
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn kind(&self) -> CommitKind {
        CommitKind::classify(self.parents.len())
    }

    /// Case-insensitive substring match against the commit message.
    pub fn message_contains(&self, term: &str) -> bool {
        self.message.to_lowercase().contains(&term.to_lowercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
}

impl User {
    pub fn new(id: UserId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
        }
    }

    pub fn label(&self) -> &str {
        if self.login.is_empty() {
            self.id.as_str()
        } else {
            &self.login
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub name: String,
    pub repo: RepoId,
}

impl File {
    pub fn new(id: FileId, name: impl Into<String>, repo: RepoId) -> Self {
        Self {
            id,
            name: name.into(),
            repo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn commit_kind_tracks_parents() {
        let ts = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let c = Commit::new(
            CommitId::new("c1"),
            "Initial commit",
            ts,
            UserId::new("u1"),
            BranchId::new("b1"),
        );
        assert_eq!(c.kind(), CommitKind::Initial);

        let c = c.with_parents(vec![CommitId::new("c0")]);
        assert_eq!(c.kind(), CommitKind::Regular);

        let c = c.with_parents(vec![CommitId::new("a"), CommitId::new("b")]);
        assert_eq!(c.kind(), CommitKind::Merge);
    }

    #[test]
    fn message_match_is_case_insensitive() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let c = Commit::new(
            CommitId::new("c1"),
            "Security fix: patch dependency",
            ts,
            UserId::new("u1"),
            BranchId::new("b1"),
        );
        assert!(c.message_contains("SECURITY"));
        assert!(!c.message_contains("vulnerability"));
    }

    #[test]
    fn labels_fall_back_to_ids() {
        let r = Repository::new(RepoId::new("repo_9"), "");
        assert_eq!(r.label(), "repo_9");
        let r = Repository::new(RepoId::new("repo_9"), "Repo-9");
        assert_eq!(r.label(), "Repo-9");
    }
}
