use crate::GitGraph;
use gitgraph_core::{BranchId, Commit, TimeBucket};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tabled::Tabled;

/// Keywords the flagged-commit query matches by default.
pub const FLAG_KEYWORDS: &[&str] = &["security", "vulnerability"];

/// Repositories with more unmerged branches than this are flagged.
pub const UNMERGED_THRESHOLD: usize = 5;

/// Minimum distinct repositories for a contributor to count as concurrent.
pub const CONCURRENT_MIN_REPOS: usize = 3;

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MergeCommitRow {
    pub repository: String,
    pub commit: String,
    pub message: String,
    pub parents: usize,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct UnmergedRepoRow {
    pub repository: String,
    pub unmerged: usize,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ConcurrentRow {
    pub user: String,
    pub bucket: String,
    pub repositories: usize,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct FlaggedCommitRow {
    pub repository: String,
    pub branch: String,
    pub commit: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct BranchLogRow {
    pub date: String,
    pub message: String,
    pub commit: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SearchRow {
    pub branch: String,
    pub message: String,
    pub commit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitDetail {
    pub commit: String,
    pub message: String,
    pub date: String,
    pub author: String,
    pub branch: String,
    pub parents: Vec<String>,
    pub kind: String,
}

fn repo_label(graph: &GitGraph, commit: &Commit) -> String {
    match graph.repo_of_commit(commit) {
        Some(repo) => repo.label().to_string(),
        // Dangling branch reference; degrade to the branch id.
        None => commit.branch.as_str().to_string(),
    }
}

/// Query 1: commits with at least two distinct parents.
pub fn merge_commits(graph: &GitGraph) -> Vec<MergeCommitRow> {
    let mut rows: Vec<MergeCommitRow> = graph
        .commits()
        .filter(|c| c.parents.iter().collect::<HashSet<_>>().len() >= 2)
        .map(|c| MergeCommitRow {
            repository: repo_label(graph, c),
            commit: c.id.as_str().to_string(),
            message: c.message.clone(),
            parents: c.parents.len(),
        })
        .collect();
    rows.sort_by(|a, b| (&a.repository, &a.commit).cmp(&(&b.repository, &b.commit)));
    rows
}

/// Query 2: repositories where more than `threshold` non-main branches have
/// no `mergedInto` edge to that repository's main branch. The filter runs
/// after aggregation, i.e. HAVING semantics.
pub fn unmerged_branches(graph: &GitGraph, threshold: usize) -> Vec<UnmergedRepoRow> {
    let mut rows: Vec<UnmergedRepoRow> = graph
        .repositories()
        .filter_map(|repo| {
            let main = graph.main_branch(&repo.id)?;
            let unmerged = graph
                .branches_of(&repo.id)
                .iter()
                .filter(|b| b.id != main.id && b.merged_into.as_ref() != Some(&main.id))
                .count();
            (unmerged > threshold).then(|| UnmergedRepoRow {
                repository: repo.label().to_string(),
                unmerged,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.repository.cmp(&b.repository));
    rows
}

/// Query 3: users who committed to at least `min_repos` distinct
/// repositories inside the same time bucket. Sorted by descending
/// repository count, then user, then bucket, for deterministic output.
pub fn concurrent_contributors(
    graph: &GitGraph,
    min_repos: usize,
    bucket: TimeBucket,
) -> Vec<ConcurrentRow> {
    let mut buckets: HashMap<(String, String), HashSet<&str>> = HashMap::new();
    for commit in graph.commits() {
        let Some(repo) = graph.repo_of_commit(commit) else {
            continue;
        };
        let user = graph
            .user(&commit.author)
            .map(|u| u.label().to_string())
            .unwrap_or_else(|| commit.author.as_str().to_string());
        buckets
            .entry((user, bucket.label(commit.date())))
            .or_default()
            .insert(repo.id.as_str());
    }

    let mut rows: Vec<ConcurrentRow> = buckets
        .into_iter()
        .filter(|(_, repos)| repos.len() >= min_repos)
        .map(|((user, bucket), repos)| ConcurrentRow {
            user,
            bucket,
            repositories: repos.len(),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.repositories
            .cmp(&a.repositories)
            .then_with(|| a.user.cmp(&b.user))
            .then_with(|| a.bucket.cmp(&b.bucket))
    });
    rows
}

/// Query 4: keyword-flagged commits visible from a named branch. The result
/// is the union of commits directly on every branch with that name and
/// commits on branches merged into such a branch, de-duplicated.
pub fn flagged_commits_on_branch(
    graph: &GitGraph,
    branch_name: &str,
    keywords: &[&str],
) -> Vec<FlaggedCommitRow> {
    let targets = graph.branches_named(branch_name);
    let target_ids: HashSet<_> = targets.iter().map(|b| &b.id).collect();

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut collect = |graph: &GitGraph, branch_id: &BranchId| {
        for commit in graph.commits_of_branch(branch_id) {
            if !keywords.iter().any(|k| commit.message_contains(k)) {
                continue;
            }
            if !seen.insert(commit.id.clone()) {
                continue;
            }
            let branch = graph
                .branch(&commit.branch)
                .map(|b| b.name.clone())
                .unwrap_or_else(|| commit.branch.as_str().to_string());
            rows.push(FlaggedCommitRow {
                repository: repo_label(graph, commit),
                branch,
                commit: commit.id.as_str().to_string(),
                message: commit.message.clone(),
            });
        }
    };

    for target in &targets {
        collect(graph, &target.id);
    }
    let merged: Vec<_> = graph
        .branches()
        .filter(|b| {
            b.merged_into
                .as_ref()
                .map(|t| target_ids.contains(t))
                .unwrap_or(false)
        })
        .map(|b| b.id.clone())
        .collect();
    for branch_id in &merged {
        collect(graph, branch_id);
    }

    rows.sort_by(|a, b| {
        (&a.repository, &a.branch, &a.commit).cmp(&(&b.repository, &b.branch, &b.commit))
    });
    rows
}

/// Branch names of a repository, for `browse repo <name>`.
pub fn branch_names(graph: &GitGraph, repo_name: &str) -> Vec<String> {
    let Some(repo) = graph.repository_by_name(repo_name) else {
        return Vec::new();
    };
    let mut names: Vec<String> = graph
        .branches_of(&repo.id)
        .iter()
        .map(|b| b.name.clone())
        .collect();
    names.sort();
    names
}

/// Date-ordered commit log of one branch, for `browse branch <repo>/<branch>`.
pub fn branch_log(graph: &GitGraph, repo_name: &str, branch_name: &str) -> Vec<BranchLogRow> {
    let Some(repo) = graph.repository_by_name(repo_name) else {
        return Vec::new();
    };
    let Some(branch) = graph.branch_by_name(&repo.id, branch_name) else {
        return Vec::new();
    };
    let mut commits = graph.commits_of_branch(&branch.id);
    commits.sort_by_key(|c| c.timestamp);
    commits
        .into_iter()
        .map(|c| BranchLogRow {
            date: c.date().to_string(),
            message: c.message.clone(),
            commit: c.id.as_str().to_string(),
        })
        .collect()
}

/// Everything the REPL shows for `show commit <id>`, including the kind
/// inferred from the parent count.
pub fn commit_detail(graph: &GitGraph, id: &str) -> Option<CommitDetail> {
    let commit = graph.commit(&id.into())?;
    let author = graph
        .user(&commit.author)
        .map(|u| u.label().to_string())
        .unwrap_or_else(|| commit.author.as_str().to_string());
    let branch = graph
        .branch(&commit.branch)
        .map(|b| b.name.clone())
        .unwrap_or_else(|| commit.branch.as_str().to_string());
    Some(CommitDetail {
        commit: commit.id.as_str().to_string(),
        message: commit.message.clone(),
        date: commit.date().to_string(),
        author,
        branch,
        parents: commit.parents.iter().map(|p| p.as_str().to_string()).collect(),
        kind: commit.kind().to_string(),
    })
}

/// Case-insensitive substring search over commit messages, ordered by branch
/// name as the REPL expects.
pub fn search_commit_messages(graph: &GitGraph, term: &str) -> Vec<SearchRow> {
    let mut rows: Vec<SearchRow> = graph
        .commits()
        .filter(|c| c.message_contains(term))
        .map(|c| SearchRow {
            branch: graph
                .branch(&c.branch)
                .map(|b| b.name.clone())
                .unwrap_or_else(|| c.branch.as_str().to_string()),
            message: c.message.clone(),
            commit: c.id.as_str().to_string(),
        })
        .collect();
    rows.sort_by(|a, b| (&a.branch, &a.commit).cmp(&(&b.branch, &b.commit)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gitgraph_core::{
        Branch, BranchId, Commit, CommitId, File, FileId, Repository, RepoId, User, UserId,
    };

    fn ts(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    /// Repo-1 with main and feature-1..feature-N; features 1..=merged are
    /// merged into main.
    fn fixture(features: usize, merged: usize) -> GitGraph {
        let mut g = GitGraph::new();
        g.add_user(User::new(UserId::new("u1"), "alice")).unwrap();
        let repo = RepoId::new("r1");
        g.add_repository(Repository::new(repo.clone(), "Repo-1"))
            .unwrap();
        g.add_file(File::new(FileId::new("f1"), "file_1", repo.clone()))
            .unwrap();

        let main = BranchId::new("r1_main");
        g.add_branch(Branch::new(main.clone(), "main", repo.clone()).default_branch())
            .unwrap();
        g.add_commit(Commit::new(
            CommitId::new("r1_main_init"),
            "Initial commit",
            ts(2023, 1, 1),
            UserId::new("u1"),
            main.clone(),
        ))
        .unwrap();

        for i in 1..=features {
            let b = BranchId::new(format!("r1_feature-{i}"));
            g.add_branch(Branch::new(b.clone(), format!("feature-{i}"), repo.clone()))
                .unwrap();
            g.add_commit(Commit::new(
                CommitId::new(format!("r1_feature-{i}_init")),
                "Initial commit",
                ts(2023, 1, 2),
                UserId::new("u1"),
                b.clone(),
            ))
            .unwrap();
            if i <= merged {
                g.set_merged_into(&b, main.clone()).unwrap();
            }
        }
        g
    }

    #[test]
    fn merge_query_matches_structural_definition() {
        let mut g = fixture(1, 1);
        g.add_commit(
            Commit::new(
                CommitId::new("m1"),
                "Merge feature-1 into main",
                ts(2024, 1, 5),
                UserId::new("u1"),
                BranchId::new("r1_main"),
            )
            .with_parents(vec![
                CommitId::new("r1_main_init"),
                CommitId::new("r1_feature-1_init"),
            ]),
        )
        .unwrap();
        // A commit listing the same parent twice is not a merge.
        g.add_commit(
            Commit::new(
                CommitId::new("dup"),
                "Add feature",
                ts(2024, 1, 6),
                UserId::new("u1"),
                BranchId::new("r1_main"),
            )
            .with_parents(vec![CommitId::new("m1"), CommitId::new("m1")]),
        )
        .unwrap();

        let rows = merge_commits(&g);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].commit, "m1");
        assert_eq!(rows[0].repository, "Repo-1");
    }

    #[test]
    fn unmerged_query_uses_having_semantics() {
        // 8 features, 2 merged: 6 unmerged > 5 -> flagged.
        let g = fixture(8, 2);
        let rows = unmerged_branches(&g, UNMERGED_THRESHOLD);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unmerged, 6);

        // 7 features, 2 merged: 5 unmerged, not strictly greater.
        let g = fixture(7, 2);
        assert!(unmerged_branches(&g, UNMERGED_THRESHOLD).is_empty());
    }

    #[test]
    fn concurrent_query_counts_distinct_repos_per_bucket() {
        let mut g = GitGraph::new();
        g.add_user(User::new(UserId::new("u1"), "alice")).unwrap();
        g.add_user(User::new(UserId::new("u2"), "bob")).unwrap();
        for r in 1..=3 {
            let repo = RepoId::new(format!("r{r}"));
            g.add_repository(Repository::new(repo.clone(), format!("Repo-{r}")))
                .unwrap();
            g.add_file(File::new(
                FileId::new(format!("r{r}_f1")),
                "file_1",
                repo.clone(),
            ))
            .unwrap();
            let b = BranchId::new(format!("r{r}_main"));
            g.add_branch(Branch::new(b.clone(), "main", repo).default_branch())
                .unwrap();
            // alice commits in all three repos on the same day; bob in one.
            g.add_commit(Commit::new(
                CommitId::new(format!("r{r}_c1")),
                "Initial commit",
                ts(2024, 5, 10),
                UserId::new("u1"),
                b.clone(),
            ))
            .unwrap();
            if r == 1 {
                g.add_commit(
                    Commit::new(
                        CommitId::new("r1_c2"),
                        "Add feature",
                        ts(2024, 5, 10),
                        UserId::new("u2"),
                        b,
                    )
                    .with_parents(vec![CommitId::new("r1_c1")]),
                )
                .unwrap();
            }
        }

        let rows = concurrent_contributors(&g, CONCURRENT_MIN_REPOS, TimeBucket::Day);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user, "alice");
        assert_eq!(rows[0].bucket, "2024-05-10");
        assert_eq!(rows[0].repositories, 3);
        for row in &rows {
            assert!(row.repositories >= CONCURRENT_MIN_REPOS);
        }

        // The month bucket can only merge more days together.
        let rows = concurrent_contributors(&g, CONCURRENT_MIN_REPOS, TimeBucket::Month);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bucket, "2024-05");
    }

    #[test]
    fn flagged_query_includes_merged_branch_commits() {
        let mut g = fixture(3, 1);
        // On the merged feature-1: must be visible from main.
        g.add_commit(
            Commit::new(
                CommitId::new("vuln1"),
                "Resolve vulnerability: sanitize input",
                ts(2024, 3, 1),
                UserId::new("u1"),
                BranchId::new("r1_feature-1"),
            )
            .with_parents(vec![CommitId::new("r1_feature-1_init")]),
        )
        .unwrap();
        // On the unmerged feature-2: must not be visible.
        g.add_commit(
            Commit::new(
                CommitId::new("vuln2"),
                "Security patch",
                ts(2024, 3, 2),
                UserId::new("u1"),
                BranchId::new("r1_feature-2"),
            )
            .with_parents(vec![CommitId::new("r1_feature-2_init")]),
        )
        .unwrap();
        // Directly on main, mixed case.
        g.add_commit(
            Commit::new(
                CommitId::new("sec1"),
                "Security fix: patch dependency",
                ts(2024, 6, 1),
                UserId::new("u1"),
                BranchId::new("r1_main"),
            )
            .with_parents(vec![CommitId::new("r1_main_init")]),
        )
        .unwrap();

        let rows = flagged_commits_on_branch(&g, "main", FLAG_KEYWORDS);
        let ids: Vec<_> = rows.iter().map(|r| r.commit.as_str()).collect();
        assert_eq!(ids, vec!["vuln1", "sec1"]);

        let rows = flagged_commits_on_branch(&g, "main", &["security"]);
        let ids: Vec<_> = rows.iter().map(|r| r.commit.as_str()).collect();
        assert_eq!(ids, vec!["sec1"]);

        assert!(flagged_commits_on_branch(&g, "no-such-branch", FLAG_KEYWORDS).is_empty());
    }

    #[test]
    fn browse_helpers_are_total() {
        let g = fixture(2, 0);
        assert_eq!(branch_names(&g, "repo-1"), vec!["feature-1", "feature-2", "main"]);
        assert!(branch_names(&g, "ghost").is_empty());

        let log = branch_log(&g, "Repo-1", "main");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "Initial commit");
        assert!(branch_log(&g, "Repo-1", "ghost").is_empty());

        let detail = commit_detail(&g, "r1_main_init").unwrap();
        assert_eq!(detail.kind, "InitialCommit");
        assert_eq!(detail.author, "alice");
        assert!(commit_detail(&g, "nope").is_none());

        assert_eq!(search_commit_messages(&g, "INITIAL").len(), 3);
        assert!(search_commit_messages(&g, "zzz").is_empty());
    }
}
