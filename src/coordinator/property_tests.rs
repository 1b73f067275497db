//! Property-based tests of whole integration attempts against real git
//! repositories.
//!
//! **Content**: after a successful integration the published branch holds
//! every file of the candidate and of any commit that landed in between.
//! **Linearity**: squash and fast-forward integrations never create merges.
//! **Completeness**: an accumulated merge lists every integrated commit once.
//! **Gating**: a build below the threshold never changes the remote.

use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

use super::*;
use crate::git::run_git_stdout;
use crate::test_utils::{GitFixture, arb_identity};
use crate::types::Identity;

fn arb_strategy() -> impl Strategy<Value = StrategyKind> {
    prop_oneof![
        Just(StrategyKind::FastForwardOnly),
        Just(StrategyKind::Squash),
        Just(StrategyKind::Accumulated),
    ]
}

fn arb_build_result() -> impl Strategy<Value = BuildResult> {
    prop_oneof![
        Just(BuildResult::Success),
        Just(BuildResult::Unstable),
        Just(BuildResult::Failure),
        Just(BuildResult::NotBuilt),
        Just(BuildResult::Aborted),
    ]
}

/// Pushes one commit per content onto `ready/prop`, each adding its own file.
fn push_candidate(fixture: &GitFixture, contents: &[String], author: &Identity) -> Sha {
    let mut head = None;
    for (i, content) in contents.iter().enumerate() {
        let base = if i == 0 { "master" } else { "ready/prop" };
        let file = format!("change{}.txt", i);
        let message = format!("Change {}", i);
        head = Some(fixture.push_commit("ready/prop", base, &message, &[(&file, content)], author));
    }
    head.expect("at least one commit")
}

fn remote_file(fixture: &GitFixture, path: &str) -> Option<String> {
    run_git_stdout(fixture.origin(), &["show", &format!("master:{}", path)]).ok()
}

fn integrate(
    fixture: &GitFixture,
    strategy: StrategyKind,
    head: Sha,
    build: BuildResult,
) -> IntegrationReport {
    let repo = fixture.repository();
    let queue = BuildQueue::new();
    let request = IntegrationRequest {
        config: IntegrationConfig::new("master", strategy),
        remotes: vec![],
        changes: vec![ChangeDescriptor::new(
            "origin",
            Branch::remote_tracking("origin/ready/prop", head.clone()),
            head,
        )],
        required_result: BuildResult::Success,
    };
    Coordinator::new(&repo, &queue).integrate(&request, |_| build)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    /// Every candidate file and every intervening master file is published.
    #[test]
    fn integrated_content_is_preserved(
        contents in prop::collection::vec("[a-z]{5,20}", 1..4),
        intervening in prop::option::of("[a-z]{5,20}"),
        squash in any::<bool>(),
    ) {
        let fixture = GitFixture::new();
        let head = push_candidate(&fixture, &contents, &GitFixture::test_author());
        if let Some(content) = &intervening {
            fixture.push_branch("master", "master", &[("intervening.txt", content)]);
        }
        let strategy = if squash { StrategyKind::Squash } else { StrategyKind::Accumulated };

        let report = integrate(&fixture, strategy, head, BuildResult::Success);

        prop_assert_eq!(report.outcome, BuildOutcome::Integrated, "{}", report);
        for (i, content) in contents.iter().enumerate() {
            let published = remote_file(&fixture, &format!("change{}.txt", i));
            prop_assert_eq!(published.as_ref(), Some(content));
        }
        prop_assert_eq!(remote_file(&fixture, "README.md"), Some("# Test".to_string()));
        if let Some(content) = intervening {
            prop_assert_eq!(remote_file(&fixture, "intervening.txt"), Some(content));
        }
        prop_assert!(!fixture.remote_has_branch("ready/prop"));
    }

    /// Squash integrations add exactly one non-merge commit on top of the
    /// previous tip, authored by the candidate's author.
    #[test]
    fn squash_is_linear(
        contents in prop::collection::vec("[a-z]{5,20}", 2..5),
        author in arb_identity(),
    ) {
        let fixture = GitFixture::new();
        let base = fixture.remote_head("master");
        let head = push_candidate(&fixture, &contents, &author);

        let report = integrate(&fixture, StrategyKind::Squash, head, BuildResult::Success);

        prop_assert_eq!(report.outcome, BuildOutcome::Integrated, "{}", report);
        let published = fixture.remote_commit("master");
        prop_assert_eq!(published.parents, vec![base]);
        prop_assert_eq!(published.author, author);
    }

    /// The accumulated message names every commit of the candidate once.
    #[test]
    fn accumulated_message_is_complete(
        contents in prop::collection::vec("[a-z]{5,20}", 2..5),
    ) {
        let fixture = GitFixture::new();
        let base = fixture.remote_head("master");
        let head = push_candidate(&fixture, &contents, &GitFixture::test_author());
        let ids = run_git_stdout(
            fixture.origin(),
            &["rev-list", head.as_str(), &format!("^{}", base)],
        ).unwrap();

        let report = integrate(&fixture, StrategyKind::Accumulated, head, BuildResult::Success);

        prop_assert_eq!(report.outcome, BuildOutcome::Integrated, "{}", report);
        let message = fixture.remote_commit("master").message;
        let ids: Vec<&str> = ids.lines().collect();
        prop_assert_eq!(ids.len(), contents.len());
        for id in ids {
            prop_assert_eq!(message.matches(&format!("commit {}", id)).count(), 1);
        }
    }

    /// Only a build at least as good as required changes the remote.
    #[test]
    fn remote_changes_only_on_good_builds(
        strategy in arb_strategy(),
        build in arb_build_result(),
        commits in 1usize..3,
    ) {
        let fixture = GitFixture::new();
        let base = fixture.remote_head("master");
        let contents: Vec<String> = (0..commits).map(|i| format!("content {}", i)).collect();
        let head = push_candidate(&fixture, &contents, &GitFixture::test_author());

        let report = integrate(&fixture, strategy, head, build);

        let moved = fixture.remote_head("master") != base;
        prop_assert_eq!(moved, report.outcome == BuildOutcome::Integrated);
        prop_assert_eq!(fixture.remote_has_branch("ready/prop"), !moved);
        if build != BuildResult::Success {
            prop_assert!(!moved);
        }
    }
}
