//! In-process constraint checker standing in for the external SHACL step.
//! Same contract: graph in, conforms flag plus human-readable report out,
//! and the graph is never mutated.

use crate::GitGraph;
use gitgraph_core::CommitKind;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// Id of the node the violation is about.
    pub focus: String,
    /// Short name of the violated constraint.
    pub constraint: String,
    pub message: String,
}

/// Conformance report. `violations` are breaches of the schema's cardinality
/// and uniqueness constraints and decide `conforms`; `structural_notes` are
/// ad hoc observations (odd but schema-legal shapes) and never fail a run.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeReport {
    pub conforms: bool,
    pub violations: Vec<Violation>,
    pub structural_notes: Vec<String>,
}

impl fmt::Display for ShapeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation Report")?;
        writeln!(f, "Conforms: {}", if self.conforms { "True" } else { "False" })?;
        if !self.violations.is_empty() {
            writeln!(f, "Results ({}):", self.violations.len())?;
            for v in &self.violations {
                writeln!(f, "  [{}] {}: {}", v.focus, v.constraint, v.message)?;
            }
        }
        if !self.structural_notes.is_empty() {
            writeln!(f, "Structural notes ({}):", self.structural_notes.len())?;
            for note in &self.structural_notes {
                writeln!(f, "  {note}")?;
            }
        }
        Ok(())
    }
}

pub fn validate_graph(graph: &GitGraph) -> ShapeReport {
    let mut v: Vec<Violation> = Vec::new();
    let mut push = |focus: &str, constraint: &str, message: String| {
        v.push(Violation {
            focus: focus.to_string(),
            constraint: constraint.to_string(),
            message,
        });
    };

    let mut repo_names: HashMap<String, &str> = HashMap::new();
    for repo in graph.repositories() {
        if repo.name.is_empty() {
            push(repo.id.as_str(), "repoName", "repository has no name".into());
        } else if let Some(first) = repo_names.insert(repo.name.to_lowercase(), repo.id.as_str()) {
            push(
                repo.id.as_str(),
                "repoName-unique",
                format!("name {:?} already used by {first}", repo.name),
            );
        }
        if graph.branches_of(&repo.id).is_empty() {
            push(repo.id.as_str(), "hasBranch-min", "repository has no branches".into());
        }
        if graph.files_of(&repo.id).is_empty() {
            push(repo.id.as_str(), "hasFile-min", "repository has no files".into());
        }

        let mut file_names: HashMap<String, &str> = HashMap::new();
        for file in graph.files_of(&repo.id) {
            if let Some(first) = file_names.insert(file.name.to_lowercase(), file.id.as_str()) {
                push(
                    file.id.as_str(),
                    "fileName-unique",
                    format!("file name {:?} already used by {first} in {}", file.name, repo.id),
                );
            }
        }
    }

    for branch in graph.branches() {
        if branch.name.is_empty() {
            push(branch.id.as_str(), "branchName", "branch has no name".into());
        }
        let commits = graph.commits_of_branch(&branch.id);
        if commits.is_empty() {
            push(branch.id.as_str(), "hasCommit-min", "branch has no commits".into());
            continue;
        }
        let initials: Vec<_> = commits
            .iter()
            .filter(|c| c.kind() == CommitKind::Initial)
            .collect();
        if initials.len() != 1 {
            push(
                branch.id.as_str(),
                "hasInitialCommit-exactly",
                format!("expected exactly one initial commit, found {}", initials.len()),
            );
        }
        if let (Some(initial), Some(earliest)) =
            (initials.first(), commits.iter().map(|c| c.timestamp).min())
        {
            if initial.timestamp > earliest {
                push(
                    branch.id.as_str(),
                    "initialCommit-earliest",
                    format!("initial commit {} is not the earliest on the branch", initial.id),
                );
            }
        }
    }

    for commit in graph.commits() {
        if commit.message.is_empty() {
            push(commit.id.as_str(), "commitMessage", "commit has no message".into());
        }
        if graph.user(&commit.author).is_none() {
            push(
                commit.id.as_str(),
                "authoredBy-exactly",
                format!("author {} does not resolve", commit.author),
            );
        }
        if graph.branch(&commit.branch).is_none() {
            push(
                commit.id.as_str(),
                "onBranch-exactly",
                format!("branch {} does not resolve", commit.branch),
            );
        }
        for parent in &commit.parents {
            if graph.commit(parent).is_none() {
                push(
                    commit.id.as_str(),
                    "hasParent-resolves",
                    format!("parent {parent} does not resolve"),
                );
            }
        }
        for file in &commit.modifies {
            if graph.file(file).is_none() {
                push(
                    commit.id.as_str(),
                    "updatesFile-resolves",
                    format!("file {file} does not resolve"),
                );
            }
        }
    }

    let mut logins: HashMap<String, &str> = HashMap::new();
    for user in graph.users() {
        if let Some(first) = logins.insert(user.login.to_lowercase(), user.id.as_str()) {
            push(
                user.id.as_str(),
                "login-unique",
                format!("login {:?} already used by {first}", user.login),
            );
        }
    }

    let structural_notes = structural_checks(graph);
    let conforms = v.is_empty();
    debug!(
        conforms,
        violations = v.len(),
        notes = structural_notes.len(),
        "validation finished"
    );
    ShapeReport {
        conforms,
        violations: v,
        structural_notes,
    }
}

/// The ad hoc check list: schema-legal shapes that usually indicate a bad
/// population rather than a broken graph.
fn structural_checks(graph: &GitGraph) -> Vec<String> {
    let mut notes = Vec::new();

    for branch in graph.branches() {
        let Some(target) = &branch.merged_into else {
            continue;
        };
        if *target == branch.id {
            notes.push(format!("branch {} is marked merged into itself", branch.id));
        } else if let Some(target_branch) = graph.branch(target) {
            if target_branch.repo != branch.repo {
                notes.push(format!(
                    "branch {} merged into {} of a different repository",
                    branch.id, target
                ));
            }
        } else {
            notes.push(format!(
                "branch {} merged into unknown branch {}",
                branch.id, target
            ));
        }
    }

    for repo in graph.repositories() {
        let branches = graph.branches_of(&repo.id);
        if branches.len() <= 1 {
            continue;
        }
        let merged: HashSet<_> = branches
            .iter()
            .filter_map(|b| b.merged_into.as_ref())
            .collect();
        if merged.is_empty() {
            notes.push(format!("repository {} has no merged branches", repo.id));
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate;
    use chrono::{TimeZone, Utc};
    use gitgraph_core::{
        Branch, BranchId, Commit, CommitId, File, FileId, GeneratorConfig, Repository, RepoId,
        User, UserId,
    };

    #[test]
    fn generated_graph_conforms() {
        let graph = populate(&GeneratorConfig::default().with_repositories(2)).unwrap();
        let report = validate_graph(&graph);
        assert!(report.conforms, "{report}");
        assert!(report.violations.is_empty());
    }

    #[test]
    fn empty_repository_violates_min_counts() {
        let mut g = GitGraph::new();
        g.add_repository(Repository::new(RepoId::new("r1"), "Repo-1"))
            .unwrap();
        let report = validate_graph(&g);
        assert!(!report.conforms);
        let constraints: Vec<_> = report
            .violations
            .iter()
            .map(|v| v.constraint.as_str())
            .collect();
        assert!(constraints.contains(&"hasBranch-min"));
        assert!(constraints.contains(&"hasFile-min"));
        let rendered = report.to_string();
        assert!(rendered.contains("Conforms: False"));
    }

    #[test]
    fn branch_without_commits_is_reported() {
        let mut g = GitGraph::new();
        g.add_repository(Repository::new(RepoId::new("r1"), "Repo-1"))
            .unwrap();
        g.add_file(File::new(FileId::new("f1"), "file_1", RepoId::new("r1")))
            .unwrap();
        g.add_branch(Branch::new(BranchId::new("b1"), "main", RepoId::new("r1")).default_branch())
            .unwrap();
        let report = validate_graph(&g);
        assert!(report
            .violations
            .iter()
            .any(|v| v.constraint == "hasCommit-min"));
    }

    #[test]
    fn self_merge_is_a_note_not_a_violation() {
        let mut g = GitGraph::new();
        g.add_user(User::new(UserId::new("u1"), "alice")).unwrap();
        g.add_repository(Repository::new(RepoId::new("r1"), "Repo-1"))
            .unwrap();
        g.add_file(File::new(FileId::new("f1"), "file_1", RepoId::new("r1")))
            .unwrap();
        let b = BranchId::new("b1");
        g.add_branch(Branch::new(b.clone(), "main", RepoId::new("r1")).default_branch())
            .unwrap();
        g.add_commit(Commit::new(
            CommitId::new("c1"),
            "Initial commit",
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            UserId::new("u1"),
            b.clone(),
        ))
        .unwrap();
        g.set_merged_into(&b, b.clone()).unwrap();

        let report = validate_graph(&g);
        assert!(report.conforms);
        assert!(report
            .structural_notes
            .iter()
            .any(|n| n.contains("merged into itself")));
    }

    #[test]
    fn duplicate_logins_are_flagged() {
        let mut g = GitGraph::new();
        g.add_user(User::new(UserId::new("u1"), "alice")).unwrap();
        g.add_user(User::new(UserId::new("u2"), "Alice")).unwrap();
        let report = validate_graph(&g);
        assert!(report
            .violations
            .iter()
            .any(|v| v.constraint == "login-unique"));
    }
}
