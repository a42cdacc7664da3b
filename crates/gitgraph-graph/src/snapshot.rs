//! Persisted snapshot: a line-oriented N-Triples document at a fixed path.
//! Written wholesale on every generation run, never patched incrementally.

use crate::GitGraph;
use chrono::{DateTime, SecondsFormat, Utc};
use gitgraph_core::{
    Branch, BranchId, Commit, CommitId, EntityClass, File, GitGraphError, Predicate, Repository,
    Result, User, GIT_IRI,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

/// Serializes the graph and overwrites whatever snapshot was at `path`.
pub fn write_snapshot(graph: &GitGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let document = render(graph);
    std::fs::write(path, document)?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}

/// Loads a snapshot back into an in-memory store. Triple order within the
/// file does not matter; commits are re-inserted parents-first and every
/// construction-time invariant is re-checked.
pub fn read_snapshot(path: &Path) -> Result<GitGraph> {
    if !path.exists() {
        return Err(GitGraphError::SnapshotMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Renders the graph as the same N-Triples document `write_snapshot` emits.
pub fn to_ntriples(graph: &GitGraph) -> String {
    render(graph)
}

/// Whole-graph document for the JSON export path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub users: Vec<User>,
    pub repositories: Vec<Repository>,
    pub files: Vec<File>,
    pub branches: Vec<Branch>,
    pub commits: Vec<Commit>,
}

impl From<&GitGraph> for GraphDocument {
    fn from(graph: &GitGraph) -> Self {
        Self {
            users: graph.users().cloned().collect(),
            repositories: graph.repositories().cloned().collect(),
            files: graph.files().cloned().collect(),
            branches: graph.branches().cloned().collect(),
            commits: graph.commits().cloned().collect(),
        }
    }
}

fn iri(local: &str) -> String {
    format!("<{GIT_IRI}{local}>")
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn render(graph: &GitGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# git knowledge graph snapshot {}", Uuid::new_v4());
    let _ = writeln!(
        out,
        "# generated {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    let mut triple = |s: &str, p: &str, o: String| {
        let _ = writeln!(out, "{s} {p} {o} .");
    };
    let type_iri = format!("<{RDF_TYPE}>");
    let class = |c: EntityClass| iri(c.as_str());
    let prop = |p: Predicate| iri(p.as_str());
    let literal = |v: &str| format!("\"{}\"", escape(v));
    let typed = |v: &str, dt: &str| format!("\"{}\"^^<{}>", escape(v), dt);

    for user in graph.users() {
        let s = iri(user.id.as_str());
        triple(&s, &type_iri, class(EntityClass::User));
        triple(&s, &prop(Predicate::Login), literal(&user.login));
    }

    for repo in graph.repositories() {
        let s = iri(repo.id.as_str());
        triple(&s, &type_iri, class(EntityClass::Repository));
        triple(&s, &prop(Predicate::RepoName), literal(&repo.name));
        for file in graph.files_of(&repo.id) {
            triple(&s, &prop(Predicate::HasFile), iri(file.id.as_str()));
        }
        for branch in graph.branches_of(&repo.id) {
            triple(&s, &prop(Predicate::HasBranch), iri(branch.id.as_str()));
        }
    }

    for file in graph.files() {
        let s = iri(file.id.as_str());
        triple(&s, &type_iri, class(EntityClass::File));
        triple(&s, &prop(Predicate::FileName), literal(&file.name));
    }

    for branch in graph.branches() {
        let s = iri(branch.id.as_str());
        triple(&s, &type_iri, class(EntityClass::Branch));
        triple(&s, &prop(Predicate::BranchName), literal(&branch.name));
        if branch.is_default {
            triple(&s, &prop(Predicate::IsDefault), typed("true", XSD_BOOLEAN));
        }
        if let Some(init) = &branch.initial_commit {
            triple(&s, &prop(Predicate::HasInitialCommit), iri(init.as_str()));
        }
        for commit in &branch.commits {
            triple(&s, &prop(Predicate::HasCommit), iri(commit.as_str()));
        }
        if let Some(target) = &branch.merged_into {
            triple(&s, &prop(Predicate::MergedInto), iri(target.as_str()));
        }
    }

    for commit in graph.commits() {
        let s = iri(commit.id.as_str());
        triple(&s, &type_iri, class(EntityClass::Commit));
        // The classification the reasoner would infer, written out so plain
        // triple consumers see it too.
        let kind = commit.kind().to_string();
        triple(&s, &type_iri, iri(&kind));
        triple(
            &s,
            &prop(Predicate::CommitMessage),
            literal(&commit.message),
        );
        triple(
            &s,
            &prop(Predicate::Timestamp),
            typed(
                &commit
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
                XSD_DATE_TIME,
            ),
        );
        triple(
            &s,
            &prop(Predicate::CommitDate),
            typed(&commit.date().to_string(), XSD_DATE),
        );
        triple(&s, &prop(Predicate::OnBranch), iri(commit.branch.as_str()));
        triple(
            &s,
            &prop(Predicate::AuthoredBy),
            iri(commit.author.as_str()),
        );
        for parent in &commit.parents {
            triple(&s, &prop(Predicate::HasParent), iri(parent.as_str()));
        }
        for file in &commit.modifies {
            triple(&s, &prop(Predicate::UpdatesFile), iri(file.as_str()));
        }
    }

    out
}

#[derive(Debug, Clone)]
enum RawObject {
    Iri(String),
    Literal(String),
}

struct RawTriple {
    subject: String,
    predicate: String,
    object: RawObject,
}

fn parse_err(line: usize, reason: impl Into<String>) -> GitGraphError {
    GitGraphError::SnapshotParse {
        line,
        reason: reason.into(),
    }
}

/// Strips the vocabulary base from a full IRI, or fails.
fn local_name(full: &str, line: usize) -> Result<String> {
    full.strip_prefix(GIT_IRI)
        .map(str::to_string)
        .ok_or_else(|| parse_err(line, format!("IRI outside vocabulary: <{full}>")))
}

fn parse_line(line: &str, lineno: usize) -> Result<Option<RawTriple>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let mut rest = trimmed;

    let subject = take_iri(&mut rest, lineno)?;
    rest = rest.trim_start();
    let predicate = take_iri(&mut rest, lineno)?;
    rest = rest.trim_start();

    let object = if rest.starts_with('<') {
        RawObject::Iri(take_iri(&mut rest, lineno)?)
    } else if rest.starts_with('"') {
        RawObject::Literal(take_literal(&mut rest, lineno)?)
    } else {
        return Err(parse_err(lineno, "expected IRI or literal object"));
    };

    if rest.trim() != "." {
        return Err(parse_err(lineno, "missing terminating '.'"));
    }
    Ok(Some(RawTriple {
        subject,
        predicate,
        object,
    }))
}

fn take_iri(rest: &mut &str, lineno: usize) -> Result<String> {
    let inner = rest
        .strip_prefix('<')
        .ok_or_else(|| parse_err(lineno, "expected '<'"))?;
    let end = inner
        .find('>')
        .ok_or_else(|| parse_err(lineno, "unterminated IRI"))?;
    let iri = inner[..end].to_string();
    *rest = &inner[end + 1..];
    Ok(iri)
}

/// Consumes a quoted literal and, when present, its `^^<datatype>` suffix.
/// The datatype is not needed to rebuild the graph, so it is dropped.
fn take_literal(rest: &mut &str, lineno: usize) -> Result<String> {
    let inner = rest
        .strip_prefix('"')
        .ok_or_else(|| parse_err(lineno, "expected '\"'"))?;
    let mut value = String::new();
    let mut chars = inner.char_indices();
    let mut end = None;
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                _ => return Err(parse_err(lineno, "bad escape in literal")),
            },
            '"' => {
                end = Some(i);
                break;
            }
            other => value.push(other),
        }
    }
    let end = end.ok_or_else(|| parse_err(lineno, "unterminated literal"))?;
    *rest = &inner[end + 1..];
    if rest.starts_with("^^") {
        let mut tail = &rest[2..];
        take_iri(&mut tail, lineno)?;
        *rest = tail;
    }
    Ok(value)
}

#[derive(Default)]
struct PendingBranch {
    name: Option<String>,
    repo: Option<String>,
    is_default: bool,
    merged_into: Option<String>,
    initial: Option<String>,
    commits: Vec<String>,
}

#[derive(Default)]
struct PendingCommit {
    message: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    author: Option<String>,
    branch: Option<String>,
    parents: Vec<String>,
    modifies: Vec<String>,
}

fn parse(text: &str) -> Result<GitGraph> {
    // Pass 1: tokenize and index by subject.
    let mut classes: HashMap<String, EntityClass> = HashMap::new();
    let mut order: HashMap<EntityClass, Vec<String>> = HashMap::new();
    let mut triples: Vec<(usize, RawTriple)> = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let lineno = i + 1;
        let Some(t) = parse_line(line, lineno)? else {
            continue;
        };
        if t.predicate == RDF_TYPE {
            let RawObject::Iri(class_iri) = &t.object else {
                return Err(parse_err(lineno, "rdf:type object must be an IRI"));
            };
            let local = local_name(class_iri, lineno)?;
            match EntityClass::from_str(&local) {
                Ok(class) => {
                    let base = class.base();
                    let id = local_name(&t.subject, lineno)?;
                    if classes.insert(id.clone(), base).is_none() {
                        order.entry(base).or_default().push(id);
                    }
                }
                Err(()) => warn!(class = %local, "skipping unknown class"),
            }
            continue;
        }
        triples.push((lineno, t));
    }

    // Pass 2: fold property triples into per-entity builders.
    let mut user_logins: HashMap<String, String> = HashMap::new();
    let mut repo_names: HashMap<String, String> = HashMap::new();
    let mut file_names: HashMap<String, String> = HashMap::new();
    let mut file_repos: HashMap<String, String> = HashMap::new();
    let mut branches: HashMap<String, PendingBranch> = HashMap::new();
    let mut commits: HashMap<String, PendingCommit> = HashMap::new();

    for (lineno, t) in triples {
        let subject = local_name(&t.subject, lineno)?;
        let pred_local = local_name(&t.predicate, lineno)?;
        let Ok(predicate) = Predicate::from_str(&pred_local) else {
            warn!(predicate = %pred_local, "skipping unknown predicate");
            continue;
        };
        let object_id = |o: &RawObject| -> Result<String> {
            match o {
                RawObject::Iri(full) => local_name(full, lineno),
                RawObject::Literal(_) => {
                    Err(parse_err(lineno, format!("{pred_local} needs an IRI object")))
                }
            }
        };
        let object_text = |o: &RawObject| -> Result<String> {
            match o {
                RawObject::Literal(v) => Ok(v.clone()),
                RawObject::Iri(_) => {
                    Err(parse_err(lineno, format!("{pred_local} needs a literal object")))
                }
            }
        };

        match predicate {
            Predicate::Login => {
                user_logins.insert(subject, object_text(&t.object)?);
            }
            Predicate::RepoName => {
                repo_names.insert(subject, object_text(&t.object)?);
            }
            Predicate::FileName => {
                file_names.insert(subject, object_text(&t.object)?);
            }
            Predicate::HasFile => {
                file_repos.insert(object_id(&t.object)?, subject);
            }
            Predicate::HasBranch => {
                branches.entry(object_id(&t.object)?).or_default().repo = Some(subject);
            }
            Predicate::BranchName => {
                branches.entry(subject).or_default().name = Some(object_text(&t.object)?);
            }
            Predicate::IsDefault => {
                branches.entry(subject).or_default().is_default =
                    object_text(&t.object)?.eq_ignore_ascii_case("true");
            }
            Predicate::HasInitialCommit => {
                branches.entry(subject).or_default().initial = Some(object_id(&t.object)?);
            }
            Predicate::HasCommit => {
                branches
                    .entry(subject)
                    .or_default()
                    .commits
                    .push(object_id(&t.object)?);
            }
            Predicate::MergedInto => {
                branches.entry(subject).or_default().merged_into = Some(object_id(&t.object)?);
            }
            Predicate::CommitMessage => {
                commits.entry(subject).or_default().message = Some(object_text(&t.object)?);
            }
            Predicate::Timestamp => {
                let raw = object_text(&t.object)?;
                let ts = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| parse_err(lineno, format!("bad timestamp: {e}")))?
                    .with_timezone(&Utc);
                commits.entry(subject).or_default().timestamp = Some(ts);
            }
            // Derived from the timestamp; checked for syntax only.
            Predicate::CommitDate => {
                let raw = object_text(&t.object)?;
                raw.parse::<chrono::NaiveDate>()
                    .map_err(|e| parse_err(lineno, format!("bad date: {e}")))?;
            }
            Predicate::OnBranch => {
                commits.entry(subject).or_default().branch = Some(object_id(&t.object)?);
            }
            Predicate::AuthoredBy => {
                commits.entry(subject).or_default().author = Some(object_id(&t.object)?);
            }
            Predicate::HasParent => {
                commits
                    .entry(subject)
                    .or_default()
                    .parents
                    .push(object_id(&t.object)?);
            }
            Predicate::UpdatesFile => {
                commits
                    .entry(subject)
                    .or_default()
                    .modifies
                    .push(object_id(&t.object)?);
            }
        }
    }

    assemble(order, user_logins, repo_names, file_names, file_repos, branches, commits)
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    order: HashMap<EntityClass, Vec<String>>,
    user_logins: HashMap<String, String>,
    repo_names: HashMap<String, String>,
    file_names: HashMap<String, String>,
    file_repos: HashMap<String, String>,
    mut branches: HashMap<String, PendingBranch>,
    mut commits: HashMap<String, PendingCommit>,
) -> Result<GitGraph> {
    let missing = |what: &str, id: &str| GitGraphError::Graph(format!("{what} missing for {id}"));
    let ids_of = |class: EntityClass| order.get(&class).cloned().unwrap_or_default();
    let mut graph = GitGraph::new();

    for id in ids_of(EntityClass::User) {
        let login = user_logins.get(&id).cloned().unwrap_or_else(|| id.clone());
        graph.add_user(User::new(id.as_str().into(), login))?;
    }

    for id in ids_of(EntityClass::Repository) {
        let name = repo_names.get(&id).cloned().unwrap_or_default();
        graph.add_repository(Repository::new(id.as_str().into(), name))?;
    }

    for id in ids_of(EntityClass::File) {
        let repo = file_repos
            .get(&id)
            .ok_or_else(|| missing("owning repository", &id))?;
        let name = file_names.get(&id).cloned().unwrap_or_else(|| id.clone());
        graph.add_file(File::new(id.as_str().into(), name, repo.as_str().into()))?;
    }

    for id in ids_of(EntityClass::Branch) {
        let pending = branches.remove(&id).unwrap_or_default();
        let repo = pending
            .repo
            .as_deref()
            .ok_or_else(|| missing("owning repository", &id))?;
        let mut branch = Branch::new(
            id.as_str().into(),
            pending.name.clone().unwrap_or_else(|| id.clone()),
            repo.into(),
        );
        if pending.is_default {
            branch = branch.default_branch();
        }
        graph.add_branch(branch)?;
        branches.insert(id, pending);
    }

    // Commits parents-first (Kahn over the parent edges), seeded in file
    // order so the load stays deterministic.
    let commit_ids = ids_of(EntityClass::Commit);
    let commit_set: HashSet<&String> = commit_ids.iter().collect();
    let mut dependents: HashMap<&String, Vec<&String>> = HashMap::new();
    let mut pending_parents: HashMap<&String, usize> = HashMap::new();
    for id in &commit_ids {
        let parents = commits.get(id).map(|c| c.parents.clone()).unwrap_or_default();
        let mut count = 0;
        for p in &parents {
            if let Some(key) = commit_set.get(p) {
                dependents.entry(*key).or_default().push(id);
                count += 1;
            } else {
                return Err(GitGraphError::ConstraintViolation(format!(
                    "commit {id} references unknown parent {p}"
                )));
            }
        }
        pending_parents.insert(id, count);
    }
    let mut queue: VecDeque<&String> = commit_ids
        .iter()
        .filter(|id| pending_parents.get(*id) == Some(&0))
        .collect();
    let mut inserted = 0usize;
    while let Some(id) = queue.pop_front() {
        let pending = commits
            .remove(id)
            .ok_or_else(|| missing("properties", id))?;
        let commit = Commit::new(
            id.as_str().into(),
            pending.message.ok_or_else(|| missing("message", id))?,
            pending.timestamp.ok_or_else(|| missing("timestamp", id))?,
            pending
                .author
                .ok_or_else(|| missing("author", id))?
                .as_str()
                .into(),
            pending
                .branch
                .ok_or_else(|| missing("branch", id))?
                .as_str()
                .into(),
        )
        .with_parents(pending.parents.iter().map(|p| p.as_str().into()).collect())
        .with_modified_files(pending.modifies.iter().map(|f| f.as_str().into()).collect());
        graph.add_commit(commit)?;
        inserted += 1;
        for dep in dependents.get(id).cloned().unwrap_or_default() {
            let n = pending_parents.entry(dep).or_insert(1);
            *n -= 1;
            if *n == 0 {
                queue.push_back(dep);
            }
        }
    }
    if inserted != commit_ids.len() {
        return Err(GitGraphError::ConstraintViolation(
            "parent cycle in commit graph".to_string(),
        ));
    }

    // Restore per-branch append order and the declared relations.
    for id in ids_of(EntityClass::Branch) {
        let branch_id = BranchId::new(id.clone());
        let Some(pending) = branches.remove(&id) else {
            continue;
        };
        if !pending.commits.is_empty() {
            let declared: Vec<CommitId> =
                pending.commits.iter().map(|c| CommitId::new(c.clone())).collect();
            graph.set_branch_commit_order(&branch_id, declared)?;
        }
        if let Some(declared) = &pending.initial {
            let actual = graph.branch(&branch_id).and_then(|b| b.initial_commit.clone());
            if actual.as_ref().map(CommitId::as_str) != Some(declared.as_str()) {
                return Err(GitGraphError::ConstraintViolation(format!(
                    "branch {id}: declared initial commit {declared} does not match the zero-parent commit"
                )));
            }
        }
        if let Some(target) = pending.merged_into {
            graph.set_merged_into(&branch_id, BranchId::new(target))?;
        }
    }

    Ok(graph)
}
