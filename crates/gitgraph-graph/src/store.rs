use gitgraph_core::{
    Branch, BranchId, Commit, CommitId, CommitKind, File, FileId, GitGraphError, Repository,
    RepoId, Result, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tabled::Tabled;

/// The whole knowledge graph as one explicit owned store. Populated once by
/// the generator (or the snapshot reader) and read-only afterwards; every
/// query borrows it.
///
/// Id maps give O(1) lookup, the `*_order` vectors preserve insertion order
/// so iteration and serialization are deterministic.
#[derive(Debug, Default)]
pub struct GitGraph {
    users: HashMap<UserId, User>,
    repositories: HashMap<RepoId, Repository>,
    branches: HashMap<BranchId, Branch>,
    commits: HashMap<CommitId, Commit>,
    files: HashMap<FileId, File>,

    user_order: Vec<UserId>,
    repo_order: Vec<RepoId>,
    branch_order: Vec<BranchId>,
    commit_order: Vec<CommitId>,
    file_order: Vec<FileId>,

    repo_branches: HashMap<RepoId, Vec<BranchId>>,
    repo_files: HashMap<RepoId, Vec<FileId>>,
}

/// Entity counts over the whole store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct GraphSummary {
    pub repositories: usize,
    pub users: usize,
    pub branches: usize,
    pub commits: usize,
    pub merge_commits: usize,
    pub files: usize,
}

impl GitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user: User) -> Result<()> {
        if self.users.contains_key(&user.id) {
            return Err(GitGraphError::Graph(format!(
                "duplicate user id {}",
                user.id
            )));
        }
        self.user_order.push(user.id.clone());
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn add_repository(&mut self, repo: Repository) -> Result<()> {
        if self.repositories.contains_key(&repo.id) {
            return Err(GitGraphError::Graph(format!(
                "duplicate repository id {}",
                repo.id
            )));
        }
        self.repo_order.push(repo.id.clone());
        self.repo_branches.insert(repo.id.clone(), Vec::new());
        self.repo_files.insert(repo.id.clone(), Vec::new());
        self.repositories.insert(repo.id.clone(), repo);
        Ok(())
    }

    pub fn add_file(&mut self, file: File) -> Result<()> {
        if !self.repositories.contains_key(&file.repo) {
            return Err(GitGraphError::Graph(format!(
                "file {} references unknown repository {}",
                file.id, file.repo
            )));
        }
        if self.files.contains_key(&file.id) {
            return Err(GitGraphError::Graph(format!(
                "duplicate file id {}",
                file.id
            )));
        }
        self.file_order.push(file.id.clone());
        self.repo_files
            .entry(file.repo.clone())
            .or_default()
            .push(file.id.clone());
        self.files.insert(file.id.clone(), file);
        Ok(())
    }

    pub fn add_branch(&mut self, branch: Branch) -> Result<()> {
        if !self.repositories.contains_key(&branch.repo) {
            return Err(GitGraphError::Graph(format!(
                "branch {} references unknown repository {}",
                branch.id, branch.repo
            )));
        }
        if self.branches.contains_key(&branch.id) {
            return Err(GitGraphError::Graph(format!(
                "duplicate branch id {}",
                branch.id
            )));
        }
        self.branch_order.push(branch.id.clone());
        self.repo_branches
            .entry(branch.repo.clone())
            .or_default()
            .push(branch.id.clone());
        self.branches.insert(branch.id.clone(), branch);
        Ok(())
    }

    /// Appends a commit, enforcing the construction-time invariants: the
    /// branch and author must exist, every parent must already be present
    /// (no forward references), and a branch gets at most one zero-parent
    /// commit.
    pub fn add_commit(&mut self, commit: Commit) -> Result<()> {
        if self.commits.contains_key(&commit.id) {
            return Err(GitGraphError::Graph(format!(
                "duplicate commit id {}",
                commit.id
            )));
        }
        if !self.users.contains_key(&commit.author) {
            return Err(GitGraphError::ConstraintViolation(format!(
                "commit {} authored by unknown user {}",
                commit.id, commit.author
            )));
        }
        for parent in &commit.parents {
            if !self.commits.contains_key(parent) {
                return Err(GitGraphError::ConstraintViolation(format!(
                    "commit {} references parent {} before it exists",
                    commit.id, parent
                )));
            }
        }
        for file in &commit.modifies {
            if !self.files.contains_key(file) {
                return Err(GitGraphError::ConstraintViolation(format!(
                    "commit {} modifies unknown file {}",
                    commit.id, file
                )));
            }
        }
        let branch = self.branches.get_mut(&commit.branch).ok_or_else(|| {
            GitGraphError::ConstraintViolation(format!(
                "commit {} placed on unknown branch {}",
                commit.id, commit.branch
            ))
        })?;
        if commit.kind() == CommitKind::Initial {
            if branch.initial_commit.is_some() {
                return Err(GitGraphError::ConstraintViolation(format!(
                    "branch {} already has an initial commit",
                    branch.id
                )));
            }
            branch.initial_commit = Some(commit.id.clone());
        }
        branch.commits.push(commit.id.clone());
        self.commit_order.push(commit.id.clone());
        self.commits.insert(commit.id.clone(), commit);
        Ok(())
    }

    /// Replaces a branch's append order with the one declared by a loaded
    /// snapshot. The declared list must be a permutation of the commits the
    /// branch actually received.
    pub(crate) fn set_branch_commit_order(
        &mut self,
        branch: &BranchId,
        order: Vec<CommitId>,
    ) -> Result<()> {
        let b = self
            .branches
            .get_mut(branch)
            .ok_or_else(|| GitGraphError::NotFound(format!("branch {}", branch)))?;
        let mut actual = b.commits.clone();
        let mut declared = order.clone();
        actual.sort();
        declared.sort();
        if actual != declared {
            return Err(GitGraphError::Graph(format!(
                "branch {}: declared commit list does not match its commits",
                branch
            )));
        }
        b.commits = order;
        Ok(())
    }

    pub fn set_merged_into(&mut self, branch: &BranchId, target: BranchId) -> Result<()> {
        if !self.branches.contains_key(&target) {
            return Err(GitGraphError::Graph(format!(
                "merge target {} does not exist",
                target
            )));
        }
        let branch = self
            .branches
            .get_mut(branch)
            .ok_or_else(|| GitGraphError::NotFound(format!("branch {}", branch)))?;
        branch.merged_into = Some(target);
        Ok(())
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn repository(&self, id: &RepoId) -> Option<&Repository> {
        self.repositories.get(id)
    }

    pub fn branch(&self, id: &BranchId) -> Option<&Branch> {
        self.branches.get(id)
    }

    pub fn commit(&self, id: &CommitId) -> Option<&Commit> {
        self.commits.get(id)
    }

    pub fn file(&self, id: &FileId) -> Option<&File> {
        self.files.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.user_order.iter().filter_map(|id| self.users.get(id))
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Repository> {
        self.repo_order
            .iter()
            .filter_map(|id| self.repositories.get(id))
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branch_order
            .iter()
            .filter_map(|id| self.branches.get(id))
    }

    pub fn commits(&self) -> impl Iterator<Item = &Commit> {
        self.commit_order
            .iter()
            .filter_map(|id| self.commits.get(id))
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.file_order.iter().filter_map(|id| self.files.get(id))
    }

    pub fn branches_of(&self, repo: &RepoId) -> Vec<&Branch> {
        self.repo_branches
            .get(repo)
            .map(|ids| ids.iter().filter_map(|id| self.branches.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn files_of(&self, repo: &RepoId) -> Vec<&File> {
        self.repo_files
            .get(repo)
            .map(|ids| ids.iter().filter_map(|id| self.files.get(id)).collect())
            .unwrap_or_default()
    }

    /// Commits of a branch in append order. Unknown branch yields an empty
    /// list, not an error.
    pub fn commits_of_branch(&self, branch: &BranchId) -> Vec<&Commit> {
        self.branches
            .get(branch)
            .map(|b| b.commits.iter().filter_map(|id| self.commits.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn repository_by_name(&self, name: &str) -> Option<&Repository> {
        let needle = name.to_lowercase();
        self.repositories()
            .find(|r| r.name.to_lowercase() == needle)
    }

    pub fn branch_by_name(&self, repo: &RepoId, name: &str) -> Option<&Branch> {
        let needle = name.to_lowercase();
        self.branches_of(repo)
            .into_iter()
            .find(|b| b.name.to_lowercase() == needle)
    }

    /// Every branch in the graph carrying the given name, across
    /// repositories (branch names are only unique per repository).
    pub fn branches_named(&self, name: &str) -> Vec<&Branch> {
        let needle = name.to_lowercase();
        self.branches()
            .filter(|b| b.name.to_lowercase() == needle)
            .collect()
    }

    /// The default (`main`) branch of a repository.
    pub fn main_branch(&self, repo: &RepoId) -> Option<&Branch> {
        self.branches_of(repo)
            .into_iter()
            .find(|b| b.is_default)
            .or_else(|| self.branch_by_name(repo, "main"))
    }

    /// Repository a commit belongs to, via its branch.
    pub fn repo_of_commit(&self, commit: &Commit) -> Option<&Repository> {
        self.branches
            .get(&commit.branch)
            .and_then(|b| self.repositories.get(&b.repo))
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            repositories: self.repositories.len(),
            users: self.users.len(),
            branches: self.branches.len(),
            commits: self.commits.len(),
            merge_commits: self
                .commits
                .values()
                .filter(|c| c.kind() == CommitKind::Merge)
                .count(),
            files: self.files.len(),
        }
    }
}
