//! Shared test fixtures: real git repositories in temporary directories, a
//! scripted [`Repository`] for driving the engine without git, and proptest
//! generators.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tempfile::TempDir;

use crate::git::{
    CommitIdentity, GitError, GitResult, MergeResult, PushResult, RebaseResult, Repository,
    SquashResult, git_command, git_commit_command, log, rev_parse,
};
use crate::git::GitCli;
use crate::types::{Branch, Commit, Identity, Sha};

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(|s| Sha::parse(s).unwrap())
}

pub fn arb_branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}(/[a-z][a-z0-9-]{0,12}){0,2}".prop_map(String::from)
}

pub fn arb_remote_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}".prop_map(String::from)
}

pub fn arb_identity() -> impl Strategy<Value = Identity> {
    ("[A-Z][a-z]{1,8}( [A-Z][a-z]{1,8})?", "[a-z]{1,8}@[a-z]{1,8}\\.org")
        .prop_map(|(name, email)| Identity::new(name, email))
}

fn run(workdir: &Path, args: &[&str]) -> String {
    let output = git_command(workdir).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "git {} failed in {}: {}",
        args.join(" "),
        workdir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare `origin` holding `master` with one commit (`README.md`), plus a
/// scratch clone used to publish further commits to it.
///
/// Commit timestamps advance one minute per commit so date ordering is
/// deterministic.
pub struct GitFixture {
    dir: TempDir,
    origin: PathBuf,
    scratch: PathBuf,
    clones: Cell<usize>,
    clock: Cell<i64>,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin.git");
        let scratch = dir.path().join("scratch");

        run(dir.path(), &["init", "--quiet", "--bare", "origin.git"]);
        run(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        run(dir.path(), &["init", "--quiet", "scratch"]);
        run(&scratch, &["remote", "add", "origin", origin.to_str().unwrap()]);

        let fixture = GitFixture {
            dir,
            origin,
            scratch,
            clones: Cell::new(0),
            clock: Cell::new(1_700_000_000),
        };

        std::fs::write(fixture.scratch.join("README.md"), "# Test").unwrap();
        run(&fixture.scratch, &["add", "README.md"]);
        fixture.commit(&Self::test_author(), "Initial commit", &[]);
        run(&fixture.scratch, &["push", "--quiet", "origin", "HEAD:refs/heads/master"]);

        fixture
    }

    pub fn test_author() -> Identity {
        Identity::new("Test", "test@test.com")
    }

    /// Identity of the integration bot in tests.
    pub fn committer(&self) -> CommitIdentity {
        CommitIdentity::new("Integrator", "integrator@example.org")
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    fn commit(&self, author: &Identity, message: &str, extra: &[&str]) {
        let now = self.clock.get();
        self.clock.set(now + 60);
        let date = format!("{} +0000", now);

        let output = git_commit_command(&self.scratch, &CommitIdentity::from(author.clone()))
            .args(["commit", "--quiet", "-m", message])
            .args(extra)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "commit failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn start_from(&self, base: &str) {
        run(&self.scratch, &["fetch", "--quiet", "--prune", "origin"]);
        run(
            &self.scratch,
            &["checkout", "--quiet", "--detach", &format!("origin/{}", base)],
        );
    }

    fn publish(&self, branch: &str) -> Sha {
        run(
            &self.scratch,
            &[
                "push",
                "--quiet",
                "--force",
                "origin",
                &format!("HEAD:refs/heads/{}", branch),
            ],
        );
        rev_parse(&self.scratch, "HEAD").unwrap()
    }

    /// Commits `files` on top of `origin/<base>` and pushes the result to `branch`.
    pub fn push_branch(&self, branch: &str, base: &str, files: &[(&str, &str)]) -> Sha {
        self.push_branch_as(branch, base, files, &Self::test_author())
    }

    pub fn push_branch_as(
        &self,
        branch: &str,
        base: &str,
        files: &[(&str, &str)],
        author: &Identity,
    ) -> Sha {
        let names: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
        self.push_commit(branch, base, &format!("Update {}", names.join(", ")), files, author)
    }

    /// Like [`push_branch`](Self::push_branch) with an explicit commit message.
    pub fn push_commit(
        &self,
        branch: &str,
        base: &str,
        message: &str,
        files: &[(&str, &str)],
        author: &Identity,
    ) -> Sha {
        self.start_from(base);
        for (name, content) in files {
            let path = self.scratch.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
            run(&self.scratch, &["add", name]);
        }
        self.commit(author, message, &[]);
        self.publish(branch)
    }

    /// Pushes a commit that changes nothing.
    pub fn push_empty_commit(&self, branch: &str, base: &str) -> Sha {
        self.start_from(base);
        self.commit(&Self::test_author(), "Empty", &["--allow-empty"]);
        self.publish(branch)
    }

    /// Merges `origin/<other>` into `origin/<base>` with a merge commit and
    /// pushes the result to `branch`.
    pub fn push_merge(&self, branch: &str, base: &str, other: &str) -> Sha {
        self.start_from(base);
        let now = self.clock.get();
        self.clock.set(now + 60);
        let date = format!("{} +0000", now);
        let output = git_commit_command(&self.scratch, &CommitIdentity::from(Self::test_author()))
            .args([
                "merge",
                "--quiet",
                "--no-ff",
                "-m",
                &format!("Merge {} into {}", other, base),
                &format!("origin/{}", other),
            ])
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "merge failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        self.publish(branch)
    }

    pub fn remote_head(&self, branch: &str) -> Sha {
        rev_parse(&self.origin, &format!("refs/heads/{}", branch)).unwrap()
    }

    /// Whether `branch` exists on origin.
    pub fn remote_has_branch(&self, branch: &str) -> bool {
        git_command(&self.origin)
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
            .output()
            .unwrap()
            .status
            .success()
    }

    pub fn remote_commit(&self, branch: &str) -> Commit {
        log::show_commit(&self.origin, &self.remote_head(branch)).unwrap()
    }

    /// A fresh clone of origin with `master` checked out.
    pub fn integration_clone(&self) -> PathBuf {
        let n = self.clones.get() + 1;
        self.clones.set(n);
        let name = format!("work-{}", n);
        run(
            self.dir.path(),
            &["clone", "--quiet", self.origin.to_str().unwrap(), &name],
        );
        self.dir.path().join(name)
    }

    /// A [`GitCli`] on a fresh integration clone.
    pub fn repository(&self) -> GitCli {
        GitCli::new(self.integration_clone(), self.committer())
    }
}

/// Canned responses of a [`ScriptedRepository`].
#[derive(Debug)]
pub struct Script {
    pub refs: HashMap<String, Sha>,
    pub remote_branches: Vec<Branch>,
    pub commits: HashMap<Sha, Commit>,
    pub empty_commits: HashSet<Sha>,
    pub fast_forward: MergeResult,
    pub squash: SquashResult,
    pub no_fast_forward: MergeResult,
    pub rebase: RebaseResult,
    pub committed: Sha,
    pub push: Option<PushResult>,
    /// Operations answering with `GitError::CommandFailed`.
    pub failing: HashSet<&'static str>,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            refs: HashMap::new(),
            remote_branches: Vec::new(),
            commits: HashMap::new(),
            empty_commits: HashSet::new(),
            fast_forward: MergeResult::NotFastForward,
            squash: SquashResult::Staged {
                message: Some("Squashed commit of the following:\n".to_string()),
            },
            no_fast_forward: MergeResult::Staged,
            rebase: RebaseResult::Conflict {
                conflicting_files: vec![],
            },
            committed: Sha::new("c".repeat(40)),
            push: None,
            failing: HashSet::new(),
        }
    }
}

/// A [`Repository`] answering from a [`Script`] and journaling every call.
///
/// Journal entries are prefixed with the calling thread's name so tests can
/// check that concurrent attempts do not interleave.
#[derive(Debug, Default)]
pub struct ScriptedRepository {
    script: Mutex<Script>,
    journal: Mutex<Vec<String>>,
}

impl ScriptedRepository {
    pub fn new(script: Script) -> Self {
        ScriptedRepository {
            script: Mutex::new(script),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Calls made so far, without thread prefixes.
    pub fn calls(&self) -> Vec<String> {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .map(|entry| match entry.split_once(": ") {
                Some((_, call)) => call.to_string(),
                None => entry.clone(),
            })
            .collect()
    }

    /// Calls made so far, as `<thread>: <call>`.
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Appends a marker, e.g. for the build running between calls.
    pub fn note(&self, entry: impl Into<String>) {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("main");
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}: {}", name, entry.into()));
    }

    pub fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn call(&self, op: &'static str, args: String) -> GitResult<()> {
        if args.is_empty() {
            self.note(op);
        } else {
            self.note(format!("{} {}", op, args));
        }
        if self.script().failing.contains(op) {
            return Err(GitError::CommandFailed {
                command: format!("git {}", op),
                stderr: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

/// A commit for scripted graphs, one minute apart per `minute`.
pub fn scripted_commit(id: char, parents: &[char], author: &Identity, minute: i64, message: &str) -> Commit {
    Commit {
        id: Sha::new(id.to_string().repeat(40)),
        parents: parents
            .iter()
            .map(|p| Sha::new(p.to_string().repeat(40)))
            .collect(),
        author: author.clone(),
        committer: author.clone(),
        timestamp: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
        message: message.to_string(),
    }
}

impl Repository for ScriptedRepository {
    fn resolve_ref(&self, name: &str) -> GitResult<Option<Sha>> {
        self.call("resolve_ref", name.to_string())?;
        Ok(self.script().refs.get(name).cloned())
    }

    fn find_commit(&self, id: &Sha) -> GitResult<Commit> {
        self.call("find_commit", id.short().to_string())?;
        self.script()
            .commits
            .get(id)
            .cloned()
            .ok_or_else(|| GitError::RefNotFound {
                refspec: id.to_string(),
            })
    }

    fn list_branches(&self) -> GitResult<Vec<Branch>> {
        self.call("list_branches", String::new())?;
        Ok(vec![])
    }

    fn list_remote_branches(&self) -> GitResult<Vec<Branch>> {
        self.call("list_remote_branches", String::new())?;
        Ok(self.script().remote_branches.clone())
    }

    fn checkout(&self, target: &str) -> GitResult<()> {
        self.call("checkout", target.to_string())
    }

    fn create_branch(&self, name: &str, at: &Sha) -> GitResult<()> {
        self.call("create_branch", format!("{} {}", name, at.short()))
    }

    fn merge_fast_forward_only(&self, commit: &Sha) -> GitResult<MergeResult> {
        self.call("merge_fast_forward_only", commit.short().to_string())?;
        Ok(self.script().fast_forward.clone())
    }

    fn merge_squash(&self, commit: &Sha) -> GitResult<SquashResult> {
        self.call("merge_squash", commit.short().to_string())?;
        Ok(self.script().squash.clone())
    }

    fn merge_no_fast_forward(
        &self,
        commit: &Sha,
        _message: &str,
        author: &Identity,
    ) -> GitResult<MergeResult> {
        self.call("merge_no_fast_forward", format!("{} {}", commit.short(), author))?;
        Ok(self.script().no_fast_forward.clone())
    }

    fn rebase(&self, commit: &Sha, onto: &str) -> GitResult<RebaseResult> {
        self.call("rebase", format!("{} {}", commit.short(), onto))?;
        Ok(self.script().rebase.clone())
    }

    fn commit(&self, _message: &str, author: &Identity) -> GitResult<Sha> {
        self.call("commit", author.to_string())?;
        Ok(self.script().committed.clone())
    }

    fn push(&self, remote: &str, branch: &str) -> GitResult<PushResult> {
        self.call("push", format!("{} {}", remote, branch))?;
        let script = self.script();
        Ok(script.push.clone().unwrap_or_else(|| PushResult::Success {
            pushed_sha: script.committed.clone(),
        }))
    }

    fn delete_remote_branch(&self, remote: &str, branch: &str) -> GitResult<()> {
        self.call("delete_remote_branch", format!("{} {}", remote, branch))
    }

    fn walk(&self, from: &Sha, exclude_ancestors_of: &Sha) -> GitResult<Vec<Commit>> {
        self.call(
            "walk",
            format!("{} {}", from.short(), exclude_ancestors_of.short()),
        )?;
        let script = self.script();
        let excluded = ancestors(&script.commits, exclude_ancestors_of);
        let mut commits: Vec<Commit> = ancestors(&script.commits, from)
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| script.commits.get(&id).cloned())
            .collect();
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(commits)
    }

    fn is_empty_commit(&self, id: &Sha) -> GitResult<bool> {
        self.call("is_empty_commit", id.short().to_string())?;
        Ok(self.script().empty_commits.contains(id))
    }

    fn reset_hard(&self, target: &str) -> GitResult<()> {
        self.call("reset_hard", target.to_string())
    }
}

/// `start` and everything reachable from it through known commits.
fn ancestors(commits: &HashMap<Sha, Commit>, start: &Sha) -> HashSet<Sha> {
    let mut seen = HashSet::new();
    let mut pending = vec![start.clone()];
    while let Some(id) = pending.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(commit) = commits.get(&id) {
            pending.extend(commit.parents.iter().cloned());
        }
    }
    seen
}
