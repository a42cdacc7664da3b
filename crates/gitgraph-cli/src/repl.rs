//! Interactive browser over a loaded snapshot. Free-text commands, plain
//! text output, read-only throughout.

use anyhow::Result;
use colored::Colorize;
use gitgraph_graph::{
    branch_log, branch_names, commit_detail, search_commit_messages, validate_graph, GitGraph,
};
use std::io::{BufRead, Write};

const HELP: &str = "Commands:\n  browse repo <name>\n  browse branch <repo>/<branch>\n  show commit <id>\n  search commits message:<text>\n  show errors\n  quit";

#[derive(Debug, PartialEq)]
enum Command {
    BrowseRepo(String),
    BrowseBranch(String, String),
    ShowCommit(String),
    SearchCommits(String),
    ShowErrors,
    Help,
    Quit,
    Empty,
    Unknown,
    Malformed(&'static str),
}

fn parse_command(input: &str) -> Command {
    let cmd = input.trim();
    if cmd.is_empty() {
        return Command::Empty;
    }
    if cmd == "quit" || cmd == "exit" {
        return Command::Quit;
    }
    if cmd == "help" {
        return Command::Help;
    }
    if cmd == "show errors" {
        return Command::ShowErrors;
    }
    if let Some(name) = cmd.strip_prefix("browse repo ") {
        return Command::BrowseRepo(name.trim().to_string());
    }
    if let Some(rest) = cmd.strip_prefix("browse branch ") {
        return match rest.trim().split_once('/') {
            Some((repo, branch)) => {
                Command::BrowseBranch(repo.trim().to_string(), branch.trim().to_string())
            }
            None => Command::Malformed("Use: browse branch <repo>/<branch>"),
        };
    }
    if let Some(id) = cmd.strip_prefix("show commit ") {
        return Command::ShowCommit(id.trim().to_string());
    }
    if let Some(rest) = cmd.strip_prefix("search commits ") {
        return match rest.trim().strip_prefix("message:") {
            Some(term) if !term.trim().is_empty() => {
                Command::SearchCommits(term.trim().to_string())
            }
            _ => Command::Malformed("Use: search commits message:<text>"),
        };
    }
    Command::Unknown
}

pub fn run(graph: &GitGraph) -> Result<()> {
    let s = graph.summary();
    println!("{}", "Git knowledge graph browser".bold());
    println!(
        "Repos: {}  Users: {}  Branches: {}  Commits: {}  Merge commits: {}",
        s.repositories, s.users, s.branches, s.commits, s.merge_commits
    );
    println!("Type 'help' for commands.");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        match parse_command(&line) {
            Command::Quit => break,
            Command::Empty => {}
            Command::Help => println!("{HELP}"),
            Command::Unknown => println!("Unknown command. Type 'help'."),
            Command::Malformed(hint) => println!("{hint}"),
            Command::BrowseRepo(name) => browse_repo(graph, &name),
            Command::BrowseBranch(repo, branch) => browse_branch(graph, &repo, &branch),
            Command::ShowCommit(id) => show_commit(graph, &id),
            Command::SearchCommits(term) => search_commits(graph, &term),
            Command::ShowErrors => print!("{}", validate_graph(graph)),
        }
    }
    Ok(())
}

fn browse_repo(graph: &GitGraph, name: &str) {
    let names = branch_names(graph, name);
    if names.is_empty() {
        println!("Repository not found: {name}");
        return;
    }
    for branch in names {
        println!("- {branch}");
    }
}

fn browse_branch(graph: &GitGraph, repo: &str, branch: &str) {
    let log = branch_log(graph, repo, branch);
    if log.is_empty() {
        println!("Branch not found: {repo}/{branch}");
        return;
    }
    for row in log {
        println!("{}  {}  ({})", row.date, row.message, row.commit);
    }
}

fn show_commit(graph: &GitGraph, id: &str) {
    match commit_detail(graph, id) {
        None => println!("Commit not found"),
        Some(d) => {
            println!("Commit: {}", d.commit);
            println!("Date: {}", d.date);
            println!("Branch: {}", d.branch);
            println!("Author: {}", d.author);
            println!("Message: {}", d.message);
            println!("Parents: {:?}", d.parents);
            println!("Inferred: {}", d.kind);
        }
    }
}

fn search_commits(graph: &GitGraph, term: &str) {
    let rows = search_commit_messages(graph, term);
    if rows.is_empty() {
        println!("(no matches)");
        return;
    }
    for row in rows {
        println!("[{}] {}  ({})", row.branch, row.message, row.commit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_grammar() {
        assert_eq!(
            parse_command("browse repo Repo-1"),
            Command::BrowseRepo("Repo-1".into())
        );
        assert_eq!(
            parse_command("browse branch Repo-1/main"),
            Command::BrowseBranch("Repo-1".into(), "main".into())
        );
        assert_eq!(
            parse_command("browse branch Repo-1"),
            Command::Malformed("Use: browse branch <repo>/<branch>")
        );
        assert_eq!(
            parse_command("search commits message:security"),
            Command::SearchCommits("security".into())
        );
        assert_eq!(
            parse_command("search commits security"),
            Command::Malformed("Use: search commits message:<text>")
        );
        assert_eq!(parse_command("show errors"), Command::ShowErrors);
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("exit"), Command::Quit);
        assert_eq!(parse_command("frobnicate"), Command::Unknown);
    }
}
