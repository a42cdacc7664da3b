//! End-to-end pipeline checks: populate, persist, reload, query.

use gitgraph_core::{CommitKind, GeneratorConfig, TimeBucket};
use gitgraph_graph::{
    concurrent_contributors, flagged_commits_on_branch, merge_commits, populate, read_snapshot,
    unmerged_branches, validate_graph, write_snapshot, FLAG_KEYWORDS,
};
use tempfile::tempdir;

#[test]
fn full_pipeline_preserves_query_results() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.nt");

    let config = GeneratorConfig::default().with_repositories(4);
    let graph = populate(&config).unwrap();
    write_snapshot(&graph, &path).unwrap();
    let loaded = read_snapshot(&path).unwrap();

    // The reloaded graph answers every query identically.
    assert_eq!(
        merge_commits(&graph).len(),
        merge_commits(&loaded).len()
    );
    assert_eq!(
        unmerged_branches(&graph, 5).len(),
        unmerged_branches(&loaded, 5).len()
    );
    assert_eq!(
        concurrent_contributors(&graph, 3, TimeBucket::Month).len(),
        concurrent_contributors(&loaded, 3, TimeBucket::Month).len()
    );
    assert_eq!(
        flagged_commits_on_branch(&graph, "main", FLAG_KEYWORDS).len(),
        flagged_commits_on_branch(&loaded, "main", FLAG_KEYWORDS).len()
    );

    // Regeneration is wholesale: a second write leaves a readable snapshot.
    write_snapshot(&populate(&config).unwrap(), &path).unwrap();
    assert_eq!(read_snapshot(&path).unwrap().summary(), graph.summary());
}

#[test]
fn merge_query_agrees_with_commit_classification() {
    let graph = populate(&GeneratorConfig::default().with_repositories(3)).unwrap();
    let reported: std::collections::HashSet<String> = merge_commits(&graph)
        .into_iter()
        .map(|r| r.commit)
        .collect();
    for commit in graph.commits() {
        let is_merge = commit.kind() == CommitKind::Merge;
        assert_eq!(
            reported.contains(commit.id.as_str()),
            is_merge,
            "commit {} misclassified",
            commit.id
        );
    }
}

#[test]
fn every_repository_has_flagged_results_reachable_from_main() {
    let graph = populate(&GeneratorConfig::default().with_repositories(5)).unwrap();
    let rows = flagged_commits_on_branch(&graph, "main", FLAG_KEYWORDS);
    for repo in graph.repositories() {
        assert!(
            rows.iter().any(|r| r.repository == repo.name),
            "no flagged commits reachable from main of {}",
            repo.name
        );
    }
    // And the guaranteed main-side fixture commit is always among them.
    assert!(rows
        .iter()
        .any(|r| r.message == "Security fix: patch dependency"));
}

#[test]
fn generated_population_conforms_to_the_shapes() {
    let graph = populate(&GeneratorConfig::default()).unwrap();
    let report = validate_graph(&graph);
    assert!(report.conforms, "{report}");
}
