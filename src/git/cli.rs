//! [`Repository`] implementation backed by the `git` command line.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::{Branch, Commit, Identity, Sha};

use super::{
    CommitIdentity, GitError, GitResult, MergeResult, PushResult, RebaseResult, Repository,
    SquashResult, get_parents, get_tree_sha, log, merge, push, recovery, run_git_stdout,
    run_git_sync,
};

/// The empty tree, the content of a root commit that adds nothing.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// A working clone driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    committer: CommitIdentity,
}

impl GitCli {
    /// Operates on the working clone at `workdir`; synthesized commits are
    /// committed by `committer`.
    pub fn new(workdir: impl Into<PathBuf>, committer: CommitIdentity) -> Self {
        GitCli {
            workdir: workdir.into(),
            committer,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn committer(&self) -> &CommitIdentity {
        &self.committer
    }

    fn list_refs(&self, namespace: &str) -> GitResult<Vec<(String, Sha)>> {
        let output = run_git_stdout(
            &self.workdir,
            &[
                "for-each-ref",
                "--format=%(objectname) %(refname:short)",
                namespace,
            ],
        )?;

        output
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (sha, name) = line.split_once(' ').ok_or_else(|| GitError::MalformedLog {
                    details: format!("unexpected for-each-ref line {:?}", line),
                })?;
                Ok((name.to_string(), Sha::parse(sha)?))
            })
            .collect()
    }
}

impl Repository for GitCli {
    fn resolve_ref(&self, name: &str) -> GitResult<Option<Sha>> {
        let rev = format!("{}^{{commit}}", name);
        let output = super::git_command(&self.workdir)
            .args(["rev-parse", "--verify", "--quiet", &rev])
            .output()?;

        // --verify --quiet exits 1 with no output for a missing ref
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(Sha::parse(String::from_utf8_lossy(&output.stdout))?))
    }

    fn find_commit(&self, id: &Sha) -> GitResult<Commit> {
        log::show_commit(&self.workdir, id)
    }

    fn list_branches(&self) -> GitResult<Vec<Branch>> {
        Ok(self
            .list_refs("refs/heads")?
            .into_iter()
            .map(|(name, head)| Branch::local(name, head))
            .collect())
    }

    fn list_remote_branches(&self) -> GitResult<Vec<Branch>> {
        Ok(self
            .list_refs("refs/remotes")?
            .into_iter()
            // Symbolic `<remote>/HEAD` entries shorten to the bare remote name
            .filter(|(name, _)| name.contains('/') && !name.ends_with("/HEAD"))
            .map(|(name, head)| Branch::remote_tracking(name, head))
            .collect())
    }

    fn checkout(&self, target: &str) -> GitResult<()> {
        let is_local_branch = self
            .resolve_ref(&format!("refs/heads/{}", target))?
            .is_some();
        if is_local_branch {
            run_git_sync(&self.workdir, &["checkout", "--quiet", target, "--"])?;
        } else {
            super::checkout_detached(&self.workdir, target)?;
        }
        Ok(())
    }

    fn create_branch(&self, name: &str, at: &Sha) -> GitResult<()> {
        run_git_sync(&self.workdir, &["branch", "--force", name, at.as_str()])?;
        Ok(())
    }

    fn merge_fast_forward_only(&self, commit: &Sha) -> GitResult<MergeResult> {
        merge::merge_fast_forward_only(&self.workdir, commit)
    }

    fn merge_squash(&self, commit: &Sha) -> GitResult<SquashResult> {
        merge::merge_squash(&self.workdir, commit, &self.committer)
    }

    fn merge_no_fast_forward(
        &self,
        commit: &Sha,
        message: &str,
        author: &Identity,
    ) -> GitResult<MergeResult> {
        merge::merge_no_fast_forward(&self.workdir, commit, message, author, &self.committer)
    }

    fn rebase(&self, commit: &Sha, onto: &str) -> GitResult<RebaseResult> {
        merge::rebase_commit(&self.workdir, commit, onto, &self.committer)
    }

    fn commit(&self, message: &str, author: &Identity) -> GitResult<Sha> {
        merge::commit_staged(&self.workdir, message, author, &self.committer)
    }

    fn push(&self, remote: &str, branch: &str) -> GitResult<PushResult> {
        push::push_branch(&self.workdir, remote, branch)
    }

    fn delete_remote_branch(&self, remote: &str, branch: &str) -> GitResult<()> {
        push::delete_remote_branch(&self.workdir, remote, branch)
    }

    fn walk(&self, from: &Sha, exclude_ancestors_of: &Sha) -> GitResult<Vec<Commit>> {
        let commits = log::log_between(&self.workdir, from, exclude_ancestors_of)?;
        debug!(
            from = %from.short(),
            boundary = %exclude_ancestors_of.short(),
            count = commits.len(),
            "Walked commit graph"
        );
        Ok(commits)
    }

    fn is_empty_commit(&self, id: &Sha) -> GitResult<bool> {
        let tree = get_tree_sha(&self.workdir, id.as_str())?;
        let parents = get_parents(&self.workdir, id.as_str())?;
        match parents.first() {
            Some(parent) => Ok(get_tree_sha(&self.workdir, parent.as_str())? == tree),
            None => Ok(tree.as_str() == EMPTY_TREE),
        }
    }

    fn reset_hard(&self, target: &str) -> GitResult<()> {
        recovery::reset_to(&self.workdir, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::run_git_sync;
    use crate::test_utils::GitFixture;

    #[test]
    fn resolve_ref_finds_remote_branch() {
        let fixture = GitFixture::new();
        let tip = fixture.push_branch("ready/one", "master", &[("one.txt", "1")]);
        let repo = fixture.repository();

        assert_eq!(repo.resolve_ref("origin/ready/one").unwrap(), Some(tip));
        assert_eq!(repo.resolve_ref("origin/ready/missing").unwrap(), None);
    }

    #[test]
    fn lists_local_and_remote_branches() {
        let fixture = GitFixture::new();
        let tip = fixture.push_branch("ready/one", "master", &[("one.txt", "1")]);
        let repo = fixture.repository();

        let local: Vec<String> = repo
            .list_branches()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(local, vec!["master".to_string()]);

        let remote = repo.list_remote_branches().unwrap();
        let ready = remote
            .iter()
            .find(|b| b.name == "origin/ready/one")
            .expect("remote branch listed");
        assert_eq!(ready.head, tip);
        assert_eq!(ready.remote.as_deref(), Some("origin"));
        assert!(remote.iter().all(|b| !b.name.ends_with("/HEAD")));
    }

    #[test]
    fn checkout_branch_versus_detached() {
        let fixture = GitFixture::new();
        let tip = fixture.push_branch("ready/one", "master", &[("one.txt", "1")]);
        let repo = fixture.repository();

        repo.checkout(tip.as_str()).unwrap();
        let head = run_git_sync(repo.workdir(), &["symbolic-ref", "-q", "HEAD"]);
        assert!(head.is_err(), "HEAD should be detached");

        repo.create_branch("integration", &tip).unwrap();
        repo.checkout("integration").unwrap();
        let head = run_git_stdout(repo.workdir(), &["symbolic-ref", "--short", "HEAD"]).unwrap();
        assert_eq!(head, "integration");
    }

    #[test]
    fn find_commit_reads_author() {
        let fixture = GitFixture::new();
        let tip = fixture.push_branch_as(
            "ready/one",
            "master",
            &[("one.txt", "1")],
            &Identity::new("Jane Doe", "jane@example.org"),
        );
        let repo = fixture.repository();

        let commit = repo.find_commit(&tip).unwrap();

        assert_eq!(commit.id, tip);
        assert_eq!(commit.author, Identity::new("Jane Doe", "jane@example.org"));
        assert_eq!(commit.parents, vec![fixture.remote_head("master")]);
    }

    #[test]
    fn walk_excludes_boundary_ancestors() {
        let fixture = GitFixture::new();
        let master = fixture.remote_head("master");
        fixture.push_branch("ready/one", "master", &[("a.txt", "a")]);
        let second = fixture.push_branch("ready/one", "ready/one", &[("b.txt", "b")]);
        let repo = fixture.repository();

        let commits = repo.walk(&second, &master).unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, second);
        assert!(commits.iter().all(|c| c.id != master));
    }

    #[test]
    fn empty_commit_detection() {
        let fixture = GitFixture::new();
        let real = fixture.push_branch("ready/real", "master", &[("a.txt", "a")]);
        let empty = fixture.push_empty_commit("ready/empty", "master");
        let repo = fixture.repository();

        assert!(!repo.is_empty_commit(&real).unwrap());
        assert!(repo.is_empty_commit(&empty).unwrap());
    }
}
