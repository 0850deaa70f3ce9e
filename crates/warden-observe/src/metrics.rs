//! Metrics collected from authorization events.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::events::{AuthzEvent, EventSubscriber};

/// Collects authorization metrics.
#[derive(Default)]
pub struct MetricsCollector {
    /// Compilation metrics.
    compile: RwLock<CompileMetrics>,
    /// Decision metrics.
    decisions: RwLock<DecisionMetrics>,
    /// Prepared-rule cache metrics.
    cache: RwLock<CacheMetrics>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a compiled ability.
    pub fn record_compile(&self, rules: usize, skipped: usize) {
        let mut compile = self.compile.write();
        compile.abilities_compiled += 1;
        compile.rules_compiled += rules as u64;
        compile.rules_skipped += skipped as u64;
    }

    /// Record a dropped rule.
    pub fn record_dropped_rule(&self, reason: &str) {
        let mut compile = self.compile.write();
        compile.rules_dropped += 1;
        *compile.drop_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Record an access decision.
    pub fn record_decision(&self, action: &str, allowed: bool) {
        let mut guard = self.decisions.write();
        let decisions = &mut *guard;
        let counts = decisions.per_action.entry(action.to_string()).or_default();
        if allowed {
            decisions.allowed += 1;
            counts.allowed += 1;
        } else {
            decisions.denied += 1;
            counts.denied += 1;
        }
    }

    /// Record a cache hit.
    pub fn record_cache_hit(&self) {
        self.cache.write().hits += 1;
    }

    /// Record a cache miss.
    pub fn record_cache_miss(&self) {
        self.cache.write().misses += 1;
    }

    /// Record a cache invalidation.
    pub fn record_cache_invalidation(&self) {
        self.cache.write().invalidations += 1;
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            compile: self.compile.read().clone(),
            decisions: self.decisions.read().clone(),
            cache: self.cache.read().clone(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        *self.compile.write() = CompileMetrics::default();
        *self.decisions.write() = DecisionMetrics::default();
        *self.cache.write() = CacheMetrics::default();
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("compile", &*self.compile.read())
            .field("decisions", &*self.decisions.read())
            .field("cache", &*self.cache.read())
            .finish()
    }
}

/// Snapshot of collected metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Compilation metrics.
    pub compile: CompileMetrics,
    /// Decision metrics.
    pub decisions: DecisionMetrics,
    /// Cache metrics.
    pub cache: CacheMetrics,
}

/// Compilation metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileMetrics {
    /// Abilities compiled.
    pub abilities_compiled: u64,
    /// Rules that made it into an ability.
    pub rules_compiled: u64,
    /// Rules whose condition did not apply to the actor.
    pub rules_skipped: u64,
    /// Rules dropped as invalid.
    pub rules_dropped: u64,
    /// Dropped rules per reason.
    pub drop_reasons: HashMap<String, u64>,
}

/// Decision metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionMetrics {
    /// Allowed decisions.
    pub allowed: u64,
    /// Denied decisions.
    pub denied: u64,
    /// Per-action counts.
    pub per_action: HashMap<String, ActionDecisions>,
}

/// Decision counts for one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionDecisions {
    /// Allowed decisions.
    pub allowed: u64,
    /// Denied decisions.
    pub denied: u64,
}

/// Prepared-rule cache metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Cache hits.
    pub hits: u64,
    /// Cache misses.
    pub misses: u64,
    /// Invalidations.
    pub invalidations: u64,
}

/// Subscriber that feeds events into a [`MetricsCollector`].
pub struct MetricsSubscriber {
    collector: Arc<MetricsCollector>,
}

impl MetricsSubscriber {
    /// Create a subscriber recording into `collector`.
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    /// The collector this subscriber records into.
    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }
}

impl EventSubscriber for MetricsSubscriber {
    fn on_event(&self, event: &AuthzEvent) {
        match event {
            AuthzEvent::RuleDropped { reason, .. } => self.collector.record_dropped_rule(reason),
            AuthzEvent::AbilityCompiled { rules, skipped, .. } => {
                self.collector.record_compile(*rules, *skipped)
            }
            AuthzEvent::AccessDecided {
                action, allowed, ..
            } => self.collector.record_decision(action, *allowed),
            AuthzEvent::CacheHit { .. } => self.collector.record_cache_hit(),
            AuthzEvent::CacheMiss { .. } => self.collector.record_cache_miss(),
            AuthzEvent::CacheInvalidated { .. } => self.collector.record_cache_invalidation(),
            AuthzEvent::ActionRegistered { .. } | AuthzEvent::ConditionRegistered { .. } => {}
        }
    }
}
