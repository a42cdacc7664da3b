use crate::GitGraph;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use gitgraph_core::{
    Branch, BranchId, Commit, CommitId, File, FileId, GeneratorConfig, Repository, RepoId, Result,
    User, UserId,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Commit messages the regular-commit pass draws from. Two entries carry the
/// keywords the flagged-commit query looks for.
const MESSAGE_POOL: &[&str] = &[
    "Refactor module",
    "Fix bug in parser",
    "Add feature",
    "Improve docs",
    "Security patch",
    "Resolve vulnerability CVE-2024-1234",
];

const SECURITY_ON_MAIN_MESSAGE: &str = "Security fix: patch dependency";
const VULNERABILITY_ON_FEATURE_MESSAGE: &str = "Resolve vulnerability: sanitize input";

/// Produces a constraint-satisfying population of the schema. Deterministic
/// for a fixed seed: same config in, isomorphic graph out.
pub fn populate(config: &GeneratorConfig) -> Result<GitGraph> {
    Generator::new(config).run()
}

struct Generator<'a> {
    config: &'a GeneratorConfig,
    rng: StdRng,
    /// Per-run sequence number folded into every timestamp as microseconds,
    /// so no two commits share an instant.
    seq: i64,
}

impl<'a> Generator<'a> {
    fn new(config: &'a GeneratorConfig) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(config.seed),
            seq: 0,
        }
    }

    fn run(mut self) -> Result<GitGraph> {
        info!(
            seed = self.config.seed,
            repositories = self.config.repositories,
            "populating synthetic graph"
        );
        let mut graph = GitGraph::new();

        let users: Vec<UserId> = (1..=self.config.users)
            .map(|i| UserId::new(format!("user_{i}")))
            .collect();
        for id in &users {
            graph.add_user(User::new(id.clone(), id.as_str().to_string()))?;
        }

        for r in 1..=self.config.repositories {
            self.populate_repository(&mut graph, r, &users)?;
        }

        let summary = graph.summary();
        info!(
            commits = summary.commits,
            merge_commits = summary.merge_commits,
            "population complete"
        );
        Ok(graph)
    }

    fn populate_repository(
        &mut self,
        graph: &mut GitGraph,
        r: usize,
        users: &[UserId],
    ) -> Result<()> {
        let repo_id = RepoId::new(format!("repo_{r}"));
        graph.add_repository(Repository::new(repo_id.clone(), format!("Repo-{r}")))?;

        let file_count = self.rng.random_range(self.config.files_per_repo.clone());
        let files: Vec<FileId> = (1..=file_count)
            .map(|i| FileId::new(format!("repo_{r}_file_{i}")))
            .collect();
        for (i, id) in files.iter().enumerate() {
            graph.add_file(File::new(
                id.clone(),
                format!("file_{}", i + 1),
                repo_id.clone(),
            ))?;
        }

        let branch_count = self.rng.random_range(self.config.branches_per_repo.clone());
        let mut branch_ids: Vec<BranchId> = Vec::with_capacity(branch_count);
        for b in 0..branch_count {
            let name = if b == 0 {
                "main".to_string()
            } else {
                format!("feature-{b}")
            };
            let id = BranchId::new(format!("repo_{r}_{name}"));
            let mut branch = Branch::new(id.clone(), name, repo_id.clone());
            if b == 0 {
                branch = branch.default_branch();
            }
            graph.add_branch(branch)?;
            branch_ids.push(id);
        }
        let main = branch_ids[0].clone();

        // Commit history per branch: one initial commit, then 5-25 regular
        // commits with sorted random timestamps so history is monotonic.
        let window_start = at_midnight(self.config.window_start);
        let window_end = at_midnight(self.config.window_end);
        for branch_id in &branch_ids {
            let init_ts = self.random_timestamp(window_start, window_start + Duration::days(7));
            graph.add_commit(Commit::new(
                CommitId::new(format!("{branch_id}_init")),
                "Initial commit",
                init_ts,
                self.pick_user(users),
                branch_id.clone(),
            ))?;

            let commit_count = self
                .rng
                .random_range(self.config.commits_per_branch.clone());
            let mut timestamps: Vec<DateTime<Utc>> = (0..commit_count)
                .map(|_| self.random_timestamp(init_ts, window_end))
                .collect();
            timestamps.sort();

            let mut prev = CommitId::new(format!("{branch_id}_init"));
            for (i, ts) in timestamps.into_iter().enumerate() {
                let id = CommitId::new(format!("{branch_id}_c_{i}"));
                let message = *MESSAGE_POOL.choose(&mut self.rng).unwrap_or(&MESSAGE_POOL[0]);
                graph.add_commit(
                    Commit::new(id.clone(), message, ts, self.pick_user(users), branch_id.clone())
                        .with_parents(vec![prev])
                        .with_modified_files(self.pick_files(&files)),
                )?;
                prev = id;
            }
        }

        // Merge pass, in branch order: the main-side parent is always the
        // most recent main commit at that point, which keeps the DAG valid.
        let merge_start = at_midnight(self.config.merge_window_start);
        for branch_id in &branch_ids[1..] {
            if !self.rng.random_bool(self.config.merge_probability) {
                continue;
            }
            let main_last = match graph.branch(&main).and_then(|b| b.last_commit()) {
                Some(c) => c.clone(),
                None => continue,
            };
            let feat_last = match graph.branch(branch_id).and_then(|b| b.last_commit()) {
                Some(c) => c.clone(),
                None => continue,
            };
            let branch_name = graph
                .branch(branch_id)
                .map(|b| b.name.clone())
                .unwrap_or_else(|| branch_id.as_str().to_string());
            let ts = self.random_timestamp(merge_start, window_end);
            graph.add_commit(
                Commit::new(
                    CommitId::new(format!("merge_{branch_id}_into_main")),
                    format!("Merge {branch_name} into main"),
                    ts,
                    self.pick_user(users),
                    main.clone(),
                )
                .with_parents(vec![main_last, feat_last])
                .with_modified_files(self.pick_files(&files)),
            )?;
            graph.set_merged_into(branch_id, main.clone())?;
            debug!(branch = %branch_id, "merged into main");
        }

        self.append_flagged_commits(graph, r, &main, &branch_ids, users)?;
        Ok(())
    }

    /// Fixture guarantee: one security-flagged commit on main and one
    /// vulnerability-flagged commit on a branch merged into main, so the
    /// downstream keyword queries always have results to report.
    fn append_flagged_commits(
        &mut self,
        graph: &mut GitGraph,
        r: usize,
        main: &BranchId,
        branch_ids: &[BranchId],
        users: &[UserId],
    ) -> Result<()> {
        let window_end = at_midnight(self.config.window_end);

        if let Some(main_last) = graph.branch(main).and_then(|b| b.last_commit()).cloned() {
            let ts = self.random_timestamp(flag_window(2024, 6, window_end), window_end);
            graph.add_commit(
                Commit::new(
                    CommitId::new(format!("security_on_main_{r}")),
                    SECURITY_ON_MAIN_MESSAGE,
                    ts,
                    self.pick_user(users),
                    main.clone(),
                )
                .with_parents(vec![main_last]),
            )?;
        }

        let target = branch_ids[1..]
            .iter()
            .find(|id| {
                graph
                    .branch(id)
                    .map(|b| b.merged_into.is_some())
                    .unwrap_or(false)
            })
            .or_else(|| branch_ids.get(1))
            .cloned();
        if let Some(feature) = target {
            if let Some(feat_last) = graph
                .branch(&feature)
                .and_then(|b| b.last_commit())
                .cloned()
            {
                let ts = self.random_timestamp(flag_window(2024, 3, window_end), window_end);
                graph.add_commit(
                    Commit::new(
                        CommitId::new(format!("vuln_on_feat_{r}")),
                        VULNERABILITY_ON_FEATURE_MESSAGE,
                        ts,
                        self.pick_user(users),
                        feature,
                    )
                    .with_parents(vec![feat_last]),
                )?;
            }
        }
        Ok(())
    }

    fn pick_user(&mut self, users: &[UserId]) -> UserId {
        users
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| UserId::new("user_1"))
    }

    /// 0-3 file touches, drawn with replacement and de-duplicated.
    fn pick_files(&mut self, files: &[FileId]) -> Vec<FileId> {
        let n = self.rng.random_range(self.config.files_touched.clone());
        let mut picked: Vec<FileId> = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(f) = files.choose(&mut self.rng) {
                if !picked.contains(f) {
                    picked.push(f.clone());
                }
            }
        }
        picked
    }

    /// Uniform instant in `[start, end]`, plus a per-run microsecond
    /// sequence so every generated timestamp is distinct.
    fn random_timestamp(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
        let base = if end > start {
            let secs = self.rng.random_range(0..=(end - start).num_seconds());
            start + Duration::seconds(secs)
        } else {
            start
        };
        self.seq += 1;
        base + Duration::microseconds(self.seq)
    }
}

fn at_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

/// Start of a flagged-commit window, clamped into the configured range so a
/// narrow custom window still produces valid timestamps.
fn flag_window(year: i32, month: u32, window_end: DateTime<Utc>) -> DateTime<Utc> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .map(at_midnight)
        .unwrap_or(window_end);
    start.min(window_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitgraph_core::CommitKind;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig::default().with_repositories(3)
    }

    #[test]
    fn same_seed_reproduces_the_same_graph() {
        let config = small_config();
        let a = populate(&config).unwrap();
        let b = populate(&config).unwrap();
        assert_eq!(a.summary(), b.summary());

        let different = populate(&config.clone().with_seed(7)).unwrap();
        // Counts are random per seed; the repository count is fixed.
        assert_eq!(different.summary().repositories, 3);
    }

    #[test]
    fn every_branch_has_exactly_one_initial_commit_and_it_is_earliest() {
        let graph = populate(&small_config()).unwrap();
        for branch in graph.branches() {
            let commits = graph.commits_of_branch(&branch.id);
            assert!(!commits.is_empty(), "branch {} has no commits", branch.id);

            let initials: Vec<_> = commits
                .iter()
                .filter(|c| c.kind() == CommitKind::Initial)
                .collect();
            assert_eq!(initials.len(), 1, "branch {}", branch.id);

            let earliest = commits.iter().map(|c| c.timestamp).min().unwrap();
            assert_eq!(initials[0].timestamp, earliest, "branch {}", branch.id);
        }
    }

    #[test]
    fn merge_commits_have_two_existing_parents_on_main() {
        let graph = populate(&small_config()).unwrap();
        let mut merges = 0;
        for commit in graph.commits() {
            if commit.kind() != CommitKind::Merge {
                continue;
            }
            merges += 1;
            assert_eq!(commit.parents.len(), 2);
            for parent in &commit.parents {
                assert!(graph.commit(parent).is_some());
            }
            let branch = graph.branch(&commit.branch).unwrap();
            assert!(branch.is_default, "merge commit off main: {}", commit.id);
        }
        // p=0.6 over >=4 feature branches per repo makes zero merges
        // vanishingly unlikely for the fixed default seed.
        assert!(merges > 0);
    }

    #[test]
    fn flagged_fixture_commits_are_guaranteed() {
        let graph = populate(&small_config()).unwrap();
        for repo in graph.repositories() {
            let main = graph.main_branch(&repo.id).unwrap();
            let on_main = graph
                .commits_of_branch(&main.id)
                .iter()
                .any(|c| c.message_contains("security"));
            assert!(on_main, "no security commit on main of {}", repo.name);

            let flagged_feature = graph.branches_of(&repo.id).iter().any(|b| {
                !b.is_default
                    && graph
                        .commits_of_branch(&b.id)
                        .iter()
                        .any(|c| c.message_contains("vulnerability"))
            });
            assert!(flagged_feature, "no flagged feature commit in {}", repo.name);
        }
    }

    #[test]
    fn timestamps_are_unique_instants() {
        let graph = populate(&small_config()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for commit in graph.commits() {
            assert!(seen.insert(commit.timestamp), "duplicate {}", commit.timestamp);
        }
    }
}
