use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Parameters for the synthetic population run. All defaults match the
/// shipped fixture profile, so `GeneratorConfig::default()` reproduces the
/// reference dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "GeneratorConfig::default_seed")]
    pub seed: u64,
    #[serde(default = "GeneratorConfig::default_repositories")]
    pub repositories: usize,
    #[serde(default = "GeneratorConfig::default_users")]
    pub users: usize,
    #[serde(default = "GeneratorConfig::default_files_per_repo")]
    pub files_per_repo: RangeInclusive<usize>,
    #[serde(default = "GeneratorConfig::default_branches_per_repo")]
    pub branches_per_repo: RangeInclusive<usize>,
    #[serde(default = "GeneratorConfig::default_commits_per_branch")]
    pub commits_per_branch: RangeInclusive<usize>,
    #[serde(default = "GeneratorConfig::default_files_touched")]
    pub files_touched: RangeInclusive<usize>,
    #[serde(default = "GeneratorConfig::default_merge_probability")]
    pub merge_probability: f64,
    #[serde(default = "GeneratorConfig::default_window_start")]
    pub window_start: NaiveDate,
    #[serde(default = "GeneratorConfig::default_window_end")]
    pub window_end: NaiveDate,
    #[serde(default = "GeneratorConfig::default_merge_window_start")]
    pub merge_window_start: NaiveDate,
}

impl GeneratorConfig {
    fn default_seed() -> u64 {
        42
    }

    fn default_repositories() -> usize {
        20
    }

    fn default_users() -> usize {
        15
    }

    fn default_files_per_repo() -> RangeInclusive<usize> {
        5..=12
    }

    fn default_branches_per_repo() -> RangeInclusive<usize> {
        5..=10
    }

    fn default_commits_per_branch() -> RangeInclusive<usize> {
        5..=25
    }

    fn default_files_touched() -> RangeInclusive<usize> {
        0..=3
    }

    fn default_merge_probability() -> f64 {
        0.6
    }

    fn default_window_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date")
    }

    fn default_window_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid date")
    }

    fn default_merge_window_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_repositories(mut self, repositories: usize) -> Self {
        self.repositories = repositories;
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: Self::default_seed(),
            repositories: Self::default_repositories(),
            users: Self::default_users(),
            files_per_repo: Self::default_files_per_repo(),
            branches_per_repo: Self::default_branches_per_repo(),
            commits_per_branch: Self::default_commits_per_branch(),
            files_touched: Self::default_files_touched(),
            merge_probability: Self::default_merge_probability(),
            window_start: Self::default_window_start(),
            window_end: Self::default_window_end(),
            merge_window_start: Self::default_merge_window_start(),
        }
    }
}
