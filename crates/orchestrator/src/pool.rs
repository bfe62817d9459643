//! Model pool: picks a live endpoint per call and accounts for its use.

use std::sync::{Arc, Mutex};

use brain_core::{CapabilityClass, ModelEndpoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::PoolPolicyKind;
use crate::error::OrchestratorError;
use crate::store::EndpointStore;

/// Chooses one endpoint from a non-empty set of active endpoints.
///
/// Implementations must return `Some` whenever `candidates` is non-empty.
pub trait SelectionPolicy: Send + Sync {
    fn choose<'a>(&self, candidates: &'a [ModelEndpoint]) -> Option<&'a ModelEndpoint>;

    fn name(&self) -> &str;
}

/// Uniform random choice.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: Mutex<StdRng>,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A reproducible sequence of choices.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionPolicy for RandomPolicy {
    fn choose<'a>(&self, candidates: &'a [ModelEndpoint]) -> Option<&'a ModelEndpoint> {
        if candidates.is_empty() {
            return None;
        }
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..candidates.len())
        };
        candidates.get(index)
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Never-used endpoints first, then the one idle the longest.
/// Ties go to the earliest in store order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastRecentlyUsedPolicy;

impl SelectionPolicy for LeastRecentlyUsedPolicy {
    fn choose<'a>(&self, candidates: &'a [ModelEndpoint]) -> Option<&'a ModelEndpoint> {
        // None orders before Some, and min_by_key keeps the first minimum.
        candidates.iter().min_by_key(|e| e.last_used)
    }

    fn name(&self) -> &str {
        "lru"
    }
}

/// Lowest usage counter. Ties go to the earliest in store order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastUsedPolicy;

impl SelectionPolicy for LeastUsedPolicy {
    fn choose<'a>(&self, candidates: &'a [ModelEndpoint]) -> Option<&'a ModelEndpoint> {
        candidates.iter().min_by_key(|e| e.usage_count)
    }

    fn name(&self) -> &str {
        "least_used"
    }
}

/// Build the policy named by configuration.
pub fn policy_for(kind: PoolPolicyKind) -> Arc<dyn SelectionPolicy> {
    match kind {
        PoolPolicyKind::Random => Arc::new(RandomPolicy::new()),
        PoolPolicyKind::LeastRecentlyUsed => Arc::new(LeastRecentlyUsedPolicy),
        PoolPolicyKind::LeastUsed => Arc::new(LeastUsedPolicy),
    }
}

/// Endpoint selection over an [`EndpointStore`].
#[derive(Clone)]
pub struct ModelPool {
    store: Arc<dyn EndpointStore>,
    policy: Arc<dyn SelectionPolicy>,
    clock: Arc<dyn Clock>,
}

impl ModelPool {
    pub fn new(
        store: Arc<dyn EndpointStore>,
        policy: Arc<dyn SelectionPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    /// Pick an active endpoint of the given class.
    pub async fn select_endpoint(
        &self,
        capability: CapabilityClass,
    ) -> Result<ModelEndpoint, OrchestratorError> {
        let candidates = self.store.active_endpoints(capability).await?;
        let chosen = self
            .policy
            .choose(&candidates)
            .cloned()
            .ok_or(OrchestratorError::NoEndpointAvailable(capability))?;

        debug!(
            endpoint = %chosen.id,
            capability = %capability,
            policy = self.policy.name(),
            candidates = candidates.len(),
            "Selected endpoint"
        );
        Ok(chosen)
    }

    /// Account one call against an endpoint. Failures are logged, never raised.
    pub async fn record_usage(&self, endpoint: &ModelEndpoint) {
        if let Err(e) = self.store.record_usage(&endpoint.id, self.clock.now()).await {
            warn!(endpoint = %endpoint.id, error = %e, "ENDPOINT_USAGE_NOT_RECORDED");
        }
    }
}

impl std::fmt::Debug for ModelPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPool")
            .field("policy", &self.policy.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryEndpointStore;
    use brain_core::EndpointStatus;
    use chrono::{TimeZone, Utc};

    fn endpoint(id: &str) -> ModelEndpoint {
        ModelEndpoint::new(id, CapabilityClass::Dialogue, "http://localhost", "k", "m")
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_policies_empty_set() {
        assert!(RandomPolicy::seeded(1).choose(&[]).is_none());
        assert!(LeastRecentlyUsedPolicy.choose(&[]).is_none());
        assert!(LeastUsedPolicy.choose(&[]).is_none());
    }

    #[test]
    fn test_random_policy_stays_in_set() {
        let candidates = vec![endpoint("a"), endpoint("b"), endpoint("c")];
        let policy = RandomPolicy::seeded(42);
        for _ in 0..50 {
            let chosen = policy.choose(&candidates).unwrap();
            assert!(candidates.iter().any(|c| c.id == chosen.id));
        }
    }

    #[test]
    fn test_lru_prefers_never_used_then_oldest() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut a = endpoint("a");
        a.last_used = Some(t0 + chrono::Duration::minutes(5));
        let mut b = endpoint("b");
        b.last_used = Some(t0);
        let c = endpoint("c");
        let d = endpoint("d");

        let with_unused = vec![a.clone(), b.clone(), c, d];
        assert_eq!(LeastRecentlyUsedPolicy.choose(&with_unused).unwrap().id, "c");

        let all_used = vec![a, b];
        assert_eq!(LeastRecentlyUsedPolicy.choose(&all_used).unwrap().id, "b");
    }

    #[test]
    fn test_least_used_breaks_ties_by_order() {
        let mut a = endpoint("a");
        a.usage_count = 3;
        let mut b = endpoint("b");
        b.usage_count = 1;
        let mut c = endpoint("c");
        c.usage_count = 1;

        assert_eq!(LeastUsedPolicy.choose(&[a, b, c]).unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_pool_ignores_inactive_and_reports_empty() {
        let store = Arc::new(MemoryEndpointStore::with_endpoints(vec![
            endpoint("a"),
            endpoint("b"),
        ]));
        store.set_status("a", EndpointStatus::Inactive).await;
        let pool = ModelPool::new(store.clone(), Arc::new(RandomPolicy::seeded(7)), clock());

        for _ in 0..10 {
            let chosen = pool.select_endpoint(CapabilityClass::Dialogue).await.unwrap();
            assert_eq!(chosen.id, "b");
        }

        let missing = pool.select_endpoint(CapabilityClass::Utility).await;
        assert!(matches!(
            missing,
            Err(OrchestratorError::NoEndpointAvailable(CapabilityClass::Utility))
        ));
    }

    #[tokio::test]
    async fn test_lru_rotates_with_usage() {
        let store = Arc::new(MemoryEndpointStore::with_endpoints(vec![
            endpoint("a"),
            endpoint("b"),
        ]));
        let clock = clock();
        let pool = ModelPool::new(store.clone(), Arc::new(LeastRecentlyUsedPolicy), clock.clone());

        let mut picked = Vec::new();
        for _ in 0..4 {
            let chosen = pool.select_endpoint(CapabilityClass::Dialogue).await.unwrap();
            pool.record_usage(&chosen).await;
            clock.advance(chrono::Duration::seconds(1));
            picked.push(chosen.id);
        }
        assert_eq!(picked, vec!["a", "b", "a", "b"]);
        assert_eq!(store.get("a").await.unwrap().usage_count, 2);
    }

    #[tokio::test]
    async fn test_record_usage_failure_is_swallowed() {
        let store = Arc::new(MemoryEndpointStore::new());
        let pool = ModelPool::new(store, Arc::new(LeastUsedPolicy), clock());
        pool.record_usage(&endpoint("ghost")).await;
    }
}
