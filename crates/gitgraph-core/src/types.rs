use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base IRI shared by every term in the snapshot vocabulary.
pub const GIT_IRI: &str = "http://example.org/git-ontology#";

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

entity_id!(RepoId);
entity_id!(BranchId);
entity_id!(CommitId);
entity_id!(UserId);
entity_id!(FileId);

/// Commit classification, derived from the parent count and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitKind {
    Initial,
    Regular,
    Merge,
}

impl CommitKind {
    pub fn classify(parent_count: usize) -> Self {
        match parent_count {
            0 => CommitKind::Initial,
            1 => CommitKind::Regular,
            _ => CommitKind::Merge,
        }
    }
}

impl fmt::Display for CommitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitKind::Initial => "InitialCommit",
            CommitKind::Regular => "RegularCommit",
            CommitKind::Merge => "MergeCommit",
        };
        f.write_str(s)
    }
}

/// Entity classes as they appear in `rdf:type` triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Repository,
    Branch,
    Commit,
    InitialCommit,
    RegularCommit,
    MergeCommit,
    User,
    File,
}

impl EntityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Repository => "Repository",
            EntityClass::Branch => "Branch",
            EntityClass::Commit => "Commit",
            EntityClass::InitialCommit => "InitialCommit",
            EntityClass::RegularCommit => "RegularCommit",
            EntityClass::MergeCommit => "MergeCommit",
            EntityClass::User => "User",
            EntityClass::File => "File",
        }
    }

    /// Commit subclasses collapse to `Commit` when loading a snapshot.
    pub fn base(&self) -> EntityClass {
        match self {
            EntityClass::InitialCommit | EntityClass::RegularCommit | EntityClass::MergeCommit => {
                EntityClass::Commit
            }
            other => *other,
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Repository" => Ok(EntityClass::Repository),
            "Branch" => Ok(EntityClass::Branch),
            "Commit" => Ok(EntityClass::Commit),
            "InitialCommit" => Ok(EntityClass::InitialCommit),
            "RegularCommit" => Ok(EntityClass::RegularCommit),
            "MergeCommit" => Ok(EntityClass::MergeCommit),
            "User" => Ok(EntityClass::User),
            "File" => Ok(EntityClass::File),
            _ => Err(()),
        }
    }
}

/// Object and datatype properties of the graph vocabulary. The string forms
/// are the IRI local names used in the persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    HasBranch,
    HasFile,
    HasCommit,
    HasInitialCommit,
    OnBranch,
    AuthoredBy,
    HasParent,
    UpdatesFile,
    MergedInto,
    RepoName,
    BranchName,
    IsDefault,
    CommitMessage,
    Timestamp,
    CommitDate,
    Login,
    FileName,
}

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::HasBranch => "hasBranch",
            Predicate::HasFile => "hasFile",
            Predicate::HasCommit => "hasCommit",
            Predicate::HasInitialCommit => "hasInitialCommit",
            Predicate::OnBranch => "onBranch",
            Predicate::AuthoredBy => "authoredBy",
            Predicate::HasParent => "hasParent",
            Predicate::UpdatesFile => "updatesFile",
            Predicate::MergedInto => "mergedInto",
            Predicate::RepoName => "repoName",
            Predicate::BranchName => "branchName",
            Predicate::IsDefault => "isDefault",
            Predicate::CommitMessage => "commitMessage",
            Predicate::Timestamp => "timestamp",
            Predicate::CommitDate => "commitDate",
            Predicate::Login => "login",
            Predicate::FileName => "fileName",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Predicate {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hasBranch" => Ok(Predicate::HasBranch),
            "hasFile" => Ok(Predicate::HasFile),
            "hasCommit" => Ok(Predicate::HasCommit),
            "hasInitialCommit" => Ok(Predicate::HasInitialCommit),
            "onBranch" => Ok(Predicate::OnBranch),
            "authoredBy" => Ok(Predicate::AuthoredBy),
            "hasParent" => Ok(Predicate::HasParent),
            "updatesFile" => Ok(Predicate::UpdatesFile),
            "mergedInto" => Ok(Predicate::MergedInto),
            "repoName" => Ok(Predicate::RepoName),
            "branchName" => Ok(Predicate::BranchName),
            "isDefault" => Ok(Predicate::IsDefault),
            "commitMessage" => Ok(Predicate::CommitMessage),
            "timestamp" => Ok(Predicate::Timestamp),
            "commitDate" => Ok(Predicate::CommitDate),
            "login" => Ok(Predicate::Login),
            "fileName" => Ok(Predicate::FileName),
            _ => Err(()),
        }
    }
}

/// Granularity for the concurrent-contributor query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeBucket {
    #[default]
    Day,
    Month,
}

impl TimeBucket {
    /// Truncates a date to its bucket label, e.g. `2024-03-07` or `2024-03`.
    pub fn label(&self, date: chrono::NaiveDate) -> String {
        match self {
            TimeBucket::Day => date.format("%Y-%m-%d").to_string(),
            TimeBucket::Month => date.format("%Y-%m").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn classify_by_parent_count() {
        assert_eq!(CommitKind::classify(0), CommitKind::Initial);
        assert_eq!(CommitKind::classify(1), CommitKind::Regular);
        assert_eq!(CommitKind::classify(2), CommitKind::Merge);
        assert_eq!(CommitKind::classify(3), CommitKind::Merge);
    }

    #[test]
    fn predicate_round_trip() {
        for p in [
            Predicate::HasBranch,
            Predicate::MergedInto,
            Predicate::CommitDate,
            Predicate::FileName,
        ] {
            assert_eq!(p.as_str().parse::<Predicate>(), Ok(p));
        }
        assert!("nope".parse::<Predicate>().is_err());
    }

    #[test]
    fn commit_subclasses_collapse() {
        assert_eq!(EntityClass::MergeCommit.base(), EntityClass::Commit);
        assert_eq!(EntityClass::Repository.base(), EntityClass::Repository);
    }

    #[test]
    fn bucket_labels() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(TimeBucket::Day.label(d), "2024-03-07");
        assert_eq!(TimeBucket::Month.label(d), "2024-03");
    }
}
