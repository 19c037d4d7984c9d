//! 聚合器端到端测试

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pd_common::{ProviderId, ResourcePath};
use pd_errors::{AppError, AppResult};
use private_download::domain::{AccessProvider, PriorityPolicy, Verdict};
use private_download::AccessAggregator;

struct Fixed(Verdict);

#[async_trait::async_trait]
impl AccessProvider for Fixed {
    async fn decide(&self, _path: &ResourcePath) -> AppResult<Verdict> {
        Ok(self.0)
    }
}

struct AlwaysFails;

#[async_trait::async_trait]
impl AccessProvider for AlwaysFails {
    async fn decide(&self, _path: &ResourcePath) -> AppResult<Verdict> {
        Err(AppError::provider_fault("backend unavailable"))
    }
}

fn mixed(policy: PriorityPolicy) -> AccessAggregator {
    let aggregator = AccessAggregator::new();
    aggregator.register("P1", Fixed(Verdict::Abstain)).unwrap();
    aggregator.register("P2", Fixed(Verdict::Deny)).unwrap();
    aggregator.register("P3", Fixed(Verdict::Allow)).unwrap();
    aggregator.set_policy(policy).unwrap();
    aggregator.seal().unwrap();
    aggregator
}

#[tokio::test]
async fn test_allow_overrides_deny_scenario() {
    let decision = mixed(PriorityPolicy::AllowOverridesDeny)
        .decide("reports/q1.pdf")
        .await
        .unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.deciding_provider, Some(ProviderId::from("P3")));
}

#[tokio::test]
async fn test_deny_overrides_allow_scenario() {
    let decision = mixed(PriorityPolicy::DenyOverridesAllow)
        .decide("reports/q1.pdf")
        .await
        .unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.deciding_provider, Some(ProviderId::from("P2")));
}

#[tokio::test]
async fn test_first_decider_wins_scenario() {
    let decision = mixed(PriorityPolicy::FirstDeciderWins)
        .decide("reports/q1.pdf")
        .await
        .unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.deciding_provider, Some(ProviderId::from("P2")));
}

#[tokio::test]
async fn test_all_abstain_denies() {
    let aggregator = AccessAggregator::new();
    aggregator.register("a", Fixed(Verdict::Abstain)).unwrap();
    aggregator.register("b", Fixed(Verdict::Abstain)).unwrap();
    aggregator.seal().unwrap();

    let decision = aggregator.decide("a/b.txt").await.unwrap();
    assert!(!decision.allowed);
    assert!(decision.is_fail_closed());
}

#[tokio::test]
async fn test_empty_registry_denies() {
    for policy in [
        PriorityPolicy::AllowOverridesDeny,
        PriorityPolicy::DenyOverridesAllow,
        PriorityPolicy::FirstDeciderWins,
    ] {
        let aggregator = AccessAggregator::new();
        aggregator.set_policy(policy).unwrap();
        aggregator.seal().unwrap();

        let decision = aggregator.decide("any/file.bin").await.unwrap();
        assert!(!decision.allowed, "{policy} should deny with no providers");
        assert_eq!(decision.deciding_provider, None);
    }
}

#[tokio::test]
async fn test_parent_traversal_is_invalid_path() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let aggregator = AccessAggregator::new();
    aggregator
        .register_fn("counting", move |_path: &ResourcePath| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Allow)
        })
        .unwrap();
    aggregator.seal().unwrap();

    let result = aggregator.decide("../etc/passwd").await;
    assert!(matches!(result, Err(AppError::InvalidPath(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_faulting_provider_equivalent_to_abstaining() {
    let policies = [
        PriorityPolicy::AllowOverridesDeny,
        PriorityPolicy::DenyOverridesAllow,
        PriorityPolicy::FirstDeciderWins,
    ];
    let others = [Verdict::Allow, Verdict::Deny, Verdict::Abstain];

    for policy in policies {
        for before in others {
            for after in others {
                let faulting = AccessAggregator::new();
                faulting.register("before", Fixed(before)).unwrap();
                faulting.register("x", AlwaysFails).unwrap();
                faulting.register("after", Fixed(after)).unwrap();
                faulting.set_policy(policy).unwrap();
                faulting.seal().unwrap();

                let abstaining = AccessAggregator::new();
                abstaining.register("before", Fixed(before)).unwrap();
                abstaining.register("x", Fixed(Verdict::Abstain)).unwrap();
                abstaining.register("after", Fixed(after)).unwrap();
                abstaining.set_policy(policy).unwrap();
                abstaining.seal().unwrap();

                let a = faulting.decide("f.txt").await.unwrap();
                let b = abstaining.decide("f.txt").await.unwrap();
                assert_eq!(a.allowed, b.allowed, "{policy}: {before} / {after}");
                assert_eq!(a.deciding_provider, b.deciding_provider);
                assert_eq!(a.faults.len(), 1);
                assert!(b.faults.is_empty());
            }
        }
    }
}

#[tokio::test]
async fn test_first_decider_ignores_later_providers() {
    for later in [Verdict::Allow, Verdict::Deny, Verdict::Abstain] {
        let aggregator = AccessAggregator::new();
        aggregator.register("silent", Fixed(Verdict::Abstain)).unwrap();
        aggregator.register("first", Fixed(Verdict::Allow)).unwrap();
        aggregator.register("later", Fixed(later)).unwrap();
        aggregator
            .set_policy(PriorityPolicy::FirstDeciderWins)
            .unwrap();
        aggregator.seal().unwrap();

        let decision = aggregator.decide("f.txt").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.deciding_provider, Some(ProviderId::from("first")));
    }
}

#[test]
fn test_register_after_seal_leaves_set_unchanged() {
    let aggregator = mixed(PriorityPolicy::DenyOverridesAllow);
    let before = aggregator.provider_ids();

    let result = aggregator.register("late", Fixed(Verdict::Allow));
    assert!(matches!(result, Err(AppError::Configuration(_))));
    assert_eq!(aggregator.provider_ids(), before);
}
