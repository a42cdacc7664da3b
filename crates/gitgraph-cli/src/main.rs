use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use gitgraph_core::{GeneratorConfig, TimeBucket};
use gitgraph_graph::{
    concurrent_contributors, flagged_commits_on_branch, merge_commits, populate, read_snapshot,
    to_ntriples, unmerged_branches, validate_graph, write_snapshot, GitGraph, GraphDocument,
    CONCURRENT_MIN_REPOS, FLAG_KEYWORDS, UNMERGED_THRESHOLD,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};
use tracing::info;

mod repl;

#[derive(Parser)]
#[command(name = "gitgraph")]
#[command(about = "Git knowledge graph - synthetic population and analytical queries", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty, table)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Snapshot path (regenerated wholesale by `generate`)
    #[arg(long, global = true, env = "GITGRAPH_SNAPSHOT", default_value = "data/graph.nt")]
    snapshot: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    Table,
}

#[derive(Clone, Copy, ValueEnum)]
enum BucketArg {
    Day,
    Month,
}

impl From<BucketArg> for TimeBucket {
    fn from(value: BucketArg) -> Self {
        match value {
            BucketArg::Day => TimeBucket::Day,
            BucketArg::Month => TimeBucket::Month,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Ntriples,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate a fresh synthetic graph and overwrite the snapshot
    Generate {
        /// Seed for the deterministic generator
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of repositories to generate
        #[arg(long, default_value_t = 20)]
        repositories: usize,
    },

    /// Entity counts for the current snapshot
    Summary,

    /// Analytical queries over the snapshot
    #[command(subcommand)]
    Query(QueryCommands),

    /// Shape-check the snapshot and print the conformance report
    Validate,

    /// Re-serialize the snapshot
    Export {
        #[arg(long, value_enum, default_value = "ntriples")]
        format: ExportFormat,

        /// Destination file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Interactive browser over the snapshot
    Browse,
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Commits with two or more distinct parents
    MergeCommits,

    /// Repositories with more than a threshold of unmerged branches
    UnmergedBranches {
        #[arg(long, default_value_t = UNMERGED_THRESHOLD)]
        threshold: usize,
    },

    /// Users committing to several repositories in the same time bucket
    ConcurrentContributors {
        #[arg(long, value_enum, default_value = "day")]
        bucket: BucketArg,

        #[arg(long, default_value_t = CONCURRENT_MIN_REPOS)]
        min_repos: usize,
    },

    /// Security/vulnerability commits on a branch or merged into it
    Flagged {
        #[arg(long, default_value = "main")]
        branch: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate { seed, repositories } => {
            let config = GeneratorConfig::default()
                .with_seed(seed)
                .with_repositories(repositories);
            let graph = populate(&config)?;
            write_snapshot(&graph, &cli.snapshot)
                .with_context(|| format!("writing snapshot to {}", cli.snapshot.display()))?;
            info!(path = %cli.snapshot.display(), "snapshot overwritten");
            println!("{}", "Snapshot generated".green().bold());
            render_rows(&[graph.summary()], cli.output)?;
        }
        Commands::Summary => {
            let graph = load(&cli.snapshot)?;
            render_rows(&[graph.summary()], cli.output)?;
        }
        Commands::Query(query) => {
            let graph = load(&cli.snapshot)?;
            run_query(&graph, query, cli.output)?;
        }
        Commands::Validate => {
            let graph = load(&cli.snapshot)?;
            let report = validate_graph(&graph);
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                _ => print!("{report}"),
            }
            if !report.conforms {
                // Violations are a reportable outcome, not a crash.
                std::process::exit(2);
            }
        }
        Commands::Export { format, out } => {
            let graph = load(&cli.snapshot)?;
            let rendered = match format {
                ExportFormat::Ntriples => to_ntriples(&graph),
                ExportFormat::Json => {
                    serde_json::to_string_pretty(&GraphDocument::from(&graph))?
                }
            };
            match out {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("writing export to {}", path.display()))?,
                None => print!("{rendered}"),
            }
        }
        Commands::Browse => {
            let graph = load(&cli.snapshot)?;
            repl::run(&graph)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<GitGraph> {
    read_snapshot(path).with_context(|| format!("loading snapshot {}", path.display()))
}

fn run_query(graph: &GitGraph, query: QueryCommands, output: OutputFormat) -> Result<()> {
    match query {
        QueryCommands::MergeCommits => render_rows(&merge_commits(graph), output),
        QueryCommands::UnmergedBranches { threshold } => {
            render_rows(&unmerged_branches(graph, threshold), output)
        }
        QueryCommands::ConcurrentContributors { bucket, min_repos } => {
            render_rows(&concurrent_contributors(graph, min_repos, bucket.into()), output)
        }
        QueryCommands::Flagged { branch } => {
            render_rows(&flagged_commits_on_branch(graph, &branch, FLAG_KEYWORDS), output)
        }
    }
}

fn render_rows<T: Serialize + Tabled>(rows: &[T], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Pretty => {
            if rows.is_empty() {
                println!("{}", "(no results)".dimmed());
            } else {
                println!("{}", Table::new(rows));
                println!("{}", format!("{} row(s)", rows.len()).dimmed());
            }
        }
    }
    Ok(())
}
