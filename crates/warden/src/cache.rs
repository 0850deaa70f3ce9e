//! Prepared-rule cache.
//!
//! Preparing a role's rules only depends on the rules themselves, so the
//! result is shared by every actor holding that role. Each role slot carries
//! a generation counter. A miss hands out a [`CacheTicket`] stamped with the
//! current generation, and [`AbilityCache::fill`] only stores the result if
//! no invalidation happened in between. A fetch that raced with a rule update
//! therefore never puts the old rules back.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, trace};

use warden_ability::PreparedRules;
use warden_core::EntityId;
use warden_observe::{AuthzEvent, EventDispatcher};

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    prepared: Option<Arc<PreparedRules>>,
}

/// Proof of a cache miss, redeemed with [`AbilityCache::fill`].
#[derive(Debug)]
#[must_use]
pub struct CacheTicket {
    role: EntityId,
    generation: u64,
}

impl CacheTicket {
    /// The role that missed.
    pub fn role(&self) -> &EntityId {
        &self.role
    }
}

/// Result of [`AbilityCache::lookup`].
#[derive(Debug)]
pub enum Lookup {
    /// Prepared rules were cached.
    Hit(Arc<PreparedRules>),
    /// Nothing cached; fetch, prepare and [`fill`](AbilityCache::fill).
    Miss(CacheTicket),
}

/// Prepared rules per role.
#[derive(Default)]
pub struct AbilityCache {
    slots: Mutex<HashMap<EntityId, Slot>>,
    events: Option<Arc<EventDispatcher>>,
}

impl AbilityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit cache events to `events`.
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Look up the prepared rules of `role`.
    pub fn lookup(&self, role: &EntityId) -> Lookup {
        let mut slots = self.slots.lock();
        let slot = slots.entry(role.clone()).or_default();
        let lookup = match &slot.prepared {
            Some(prepared) => Lookup::Hit(Arc::clone(prepared)),
            None => Lookup::Miss(CacheTicket {
                role: role.clone(),
                generation: slot.generation,
            }),
        };
        drop(slots);

        match &lookup {
            Lookup::Hit(_) => {
                trace!(role = %role, "Prepared rules cache hit");
                self.emit(AuthzEvent::CacheHit {
                    role: role.to_string(),
                });
            }
            Lookup::Miss(_) => {
                trace!(role = %role, "Prepared rules cache miss");
                self.emit(AuthzEvent::CacheMiss {
                    role: role.to_string(),
                });
            }
        }
        lookup
    }

    /// Store rules prepared after a miss.
    ///
    /// The rules are returned either way; they are only cached when the role
    /// was not invalidated since the ticket was issued.
    pub fn fill(&self, ticket: CacheTicket, prepared: PreparedRules) -> Arc<PreparedRules> {
        let prepared = Arc::new(prepared);
        let mut slots = self.slots.lock();
        let slot = slots.entry(ticket.role.clone()).or_default();
        if slot.generation == ticket.generation {
            slot.prepared = Some(Arc::clone(&prepared));
        } else {
            trace!(role = %ticket.role, "Discarding rules prepared before invalidation");
        }
        prepared
    }

    /// Forget the prepared rules of `role`.
    ///
    /// Takes effect before returning: the next lookup misses and in-flight
    /// fills for the role are discarded.
    pub fn invalidate(&self, role: &EntityId) {
        {
            let mut slots = self.slots.lock();
            let slot = slots.entry(role.clone()).or_default();
            slot.generation += 1;
            slot.prepared = None;
        }
        info!(role = %role, "Prepared rules invalidated");
        self.emit(AuthzEvent::CacheInvalidated {
            role: role.to_string(),
        });
    }

    /// Forget every role.
    pub fn clear(&self) {
        let roles: Vec<EntityId> = self.slots.lock().keys().cloned().collect();
        for role in &roles {
            self.invalidate(role);
        }
    }

    /// Whether prepared rules are cached for `role`.
    pub fn contains(&self, role: &EntityId) -> bool {
        self.slots
            .lock()
            .get(role)
            .is_some_and(|slot| slot.prepared.is_some())
    }

    /// Number of roles with cached rules.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.prepared.is_some())
            .count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, event: AuthzEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl std::fmt::Debug for AbilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityCache")
            .field("cached_roles", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_observe::{MetricsCollector, MetricsSubscriber};

    fn ticket(lookup: Lookup) -> CacheTicket {
        match lookup {
            Lookup::Miss(ticket) => ticket,
            Lookup::Hit(_) => panic!("expected a miss"),
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = AbilityCache::new();
        let role = EntityId::from(3);

        let ticket = ticket(cache.lookup(&role));
        assert_eq!(ticket.role(), &role);
        cache.fill(ticket, PreparedRules::default());

        assert!(cache.contains(&role));
        assert!(matches!(cache.lookup(&role), Lookup::Hit(_)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidation_discards_inflight_fill() {
        let cache = AbilityCache::new();
        let role = EntityId::from(3);

        let stale = ticket(cache.lookup(&role));
        cache.invalidate(&role);
        cache.fill(stale, PreparedRules::default());

        assert!(!cache.contains(&role));
        let fresh = ticket(cache.lookup(&role));
        cache.fill(fresh, PreparedRules::default());
        assert!(cache.contains(&role));
    }

    #[test]
    fn test_clear() {
        let cache = AbilityCache::new();
        for id in [1, 2] {
            let role = EntityId::from(id);
            let ticket = ticket(cache.lookup(&role));
            cache.fill(ticket, PreparedRules::default());
        }
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_metrics() {
        let events = Arc::new(EventDispatcher::new());
        let collector = Arc::new(MetricsCollector::new());
        events.subscribe(Arc::new(MetricsSubscriber::new(Arc::clone(&collector))));
        let cache = AbilityCache::new().with_events(events);
        let role = EntityId::from(3);

        let ticket = ticket(cache.lookup(&role));
        cache.fill(ticket, PreparedRules::default());
        let _ = cache.lookup(&role);
        cache.invalidate(&role);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.cache.misses, 1);
        assert_eq!(snapshot.cache.hits, 1);
        assert_eq!(snapshot.cache.invalidations, 1);
    }
}
