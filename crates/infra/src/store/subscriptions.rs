use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use devportal_core::{
    ApplicationId, DomainError, DomainResult, EnvironmentId, ProductId, SubscriptionId,
};
use devportal_entitlements::{EntitlementKey, SlotKey, Subscription};

use super::poisoned;

/// Optional filters for listing subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub application_id: Option<ApplicationId>,
    pub product_id: Option<ProductId>,
    pub environment_id: Option<EnvironmentId>,
}

impl SubscriptionFilter {
    fn matches(&self, s: &Subscription) -> bool {
        self.application_id.is_none_or(|id| id == s.application_id)
            && self.product_id.is_none_or(|id| id == s.product_id)
            && self.environment_id.is_none_or(|id| id == s.environment_id)
    }
}

#[derive(Debug, Default)]
struct State {
    by_id: HashMap<SubscriptionId, Subscription>,
    by_key: HashMap<EntitlementKey, SubscriptionId>,
    by_slot: HashMap<SlotKey, BTreeSet<SubscriptionId>>,
}

/// Subscriptions by id, with secondary indexes on the entitlement triple and
/// on the credential slot.
///
/// `insert_unique` checks and inserts under one write lock, so the triple
/// stays unique even if a caller skips the entitlement-level lock.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    inner: RwLock<State>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_unique(&self, subscription: Subscription) -> DomainResult<()> {
        let mut state = self.inner.write().map_err(poisoned("subscriptions"))?;
        let key = subscription.key();
        if let Some(existing) = state.by_key.get(&key) {
            return Err(DomainError::conflict(format!(
                "subscription {existing} already exists for {key}"
            )));
        }

        state.by_key.insert(key, subscription.id);
        state
            .by_slot
            .entry(key.slot())
            .or_default()
            .insert(subscription.id);
        state.by_id.insert(subscription.id, subscription);
        Ok(())
    }

    pub fn get(&self, id: SubscriptionId) -> DomainResult<Option<Subscription>> {
        let state = self.inner.read().map_err(poisoned("subscriptions"))?;
        Ok(state.by_id.get(&id).cloned())
    }

    pub fn find(&self, key: &EntitlementKey) -> DomainResult<Option<Subscription>> {
        let state = self.inner.read().map_err(poisoned("subscriptions"))?;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.by_id.get(id))
            .cloned())
    }

    pub fn remove(&self, id: SubscriptionId) -> DomainResult<Option<Subscription>> {
        let mut state = self.inner.write().map_err(poisoned("subscriptions"))?;
        let Some(removed) = state.by_id.remove(&id) else {
            return Ok(None);
        };

        let key = removed.key();
        state.by_key.remove(&key);
        if let Some(ids) = state.by_slot.get_mut(&key.slot()) {
            ids.remove(&id);
            if ids.is_empty() {
                state.by_slot.remove(&key.slot());
            }
        }
        Ok(Some(removed))
    }

    /// Subscriptions that authenticate through one credential slot.
    pub fn count_for_slot(&self, slot: &SlotKey) -> DomainResult<usize> {
        let state = self.inner.read().map_err(poisoned("subscriptions"))?;
        Ok(state.by_slot.get(slot).map_or(0, BTreeSet::len))
    }

    pub fn list(&self, filter: &SubscriptionFilter) -> DomainResult<Vec<Subscription>> {
        let state = self.inner.read().map_err(poisoned("subscriptions"))?;
        Ok(state
            .by_id
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }
}
