//! Observable authorization events.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one compiled ability.
///
/// Decision events carry the id of the ability that produced them so an audit
/// trail can tie a decision back to the rule set it was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityId(Uuid);

impl AbilityId {
    /// Create a new random ability ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AbilityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AbilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events that can be observed while registering, compiling and checking.
#[derive(Debug, Clone)]
pub enum AuthzEvent {
    /// An action was added to the action registry.
    ActionRegistered {
        /// Canonical action id.
        id: String,
    },
    /// A condition was added to the condition registry.
    ConditionRegistered {
        /// Condition id.
        id: String,
    },
    /// A permission rule was dropped during compilation.
    RuleDropped {
        /// Position of the rule in its input list.
        index: usize,
        /// Action named by the rule.
        action: String,
        /// Subject named by the rule, if any.
        subject: Option<String>,
        /// Why the rule was dropped.
        reason: String,
    },
    /// An ability was compiled.
    AbilityCompiled {
        /// Id of the new ability.
        ability: AbilityId,
        /// Number of compiled rules.
        rules: usize,
        /// Number of rules that did not apply to the actor.
        skipped: usize,
    },
    /// An access decision was made.
    AccessDecided {
        /// Ability that made the decision.
        ability: AbilityId,
        /// Action checked.
        action: String,
        /// Subject checked.
        subject: String,
        /// Whether access was granted.
        allowed: bool,
    },
    /// Prepared rules for a role were served from cache.
    CacheHit {
        /// Role id.
        role: String,
    },
    /// Prepared rules for a role had to be fetched.
    CacheMiss {
        /// Role id.
        role: String,
    },
    /// Cached rules for a role were invalidated.
    CacheInvalidated {
        /// Role id.
        role: String,
    },
}

impl AuthzEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthzEvent::ActionRegistered { .. } => "action_registered",
            AuthzEvent::ConditionRegistered { .. } => "condition_registered",
            AuthzEvent::RuleDropped { .. } => "rule_dropped",
            AuthzEvent::AbilityCompiled { .. } => "ability_compiled",
            AuthzEvent::AccessDecided { .. } => "access_decided",
            AuthzEvent::CacheHit { .. } => "cache_hit",
            AuthzEvent::CacheMiss { .. } => "cache_miss",
            AuthzEvent::CacheInvalidated { .. } => "cache_invalidated",
        }
    }
}

/// Subscriber for authorization events.
pub trait EventSubscriber: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &AuthzEvent);

    /// Filter for event types this subscriber is interested in.
    /// Returns `None` to receive all events.
    fn event_filter(&self) -> Option<Vec<&'static str>> {
        None
    }
}

/// A subscriber that logs events through `tracing`.
pub struct LoggingSubscriber;

impl LoggingSubscriber {
    /// Create a new logging subscriber.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &AuthzEvent) {
        match event {
            AuthzEvent::ActionRegistered { id } => {
                tracing::debug!(event = "action_registered", action = %id, "Action registered");
            }
            AuthzEvent::ConditionRegistered { id } => {
                tracing::debug!(
                    event = "condition_registered",
                    condition = %id,
                    "Condition registered"
                );
            }
            AuthzEvent::RuleDropped {
                index,
                action,
                subject,
                reason,
            } => {
                tracing::warn!(
                    event = "rule_dropped",
                    index,
                    action = %action,
                    subject = ?subject,
                    reason = %reason,
                    "Permission rule dropped"
                );
            }
            AuthzEvent::AbilityCompiled {
                ability,
                rules,
                skipped,
            } => {
                tracing::debug!(
                    event = "ability_compiled",
                    ability = %ability,
                    rules = rules,
                    skipped = skipped,
                    "Ability compiled"
                );
            }
            AuthzEvent::AccessDecided {
                ability,
                action,
                subject,
                allowed,
            } => {
                tracing::trace!(
                    event = "access_decided",
                    ability = %ability,
                    action = %action,
                    subject = %subject,
                    allowed = allowed,
                    "Access decided"
                );
            }
            AuthzEvent::CacheHit { role } => {
                tracing::trace!(event = "cache_hit", role = %role, "Prepared rules cache hit");
            }
            AuthzEvent::CacheMiss { role } => {
                tracing::trace!(event = "cache_miss", role = %role, "Prepared rules cache miss");
            }
            AuthzEvent::CacheInvalidated { role } => {
                tracing::info!(
                    event = "cache_invalidated",
                    role = %role,
                    "Prepared rules invalidated"
                );
            }
        }
    }
}

/// A subscriber that collects events for later analysis.
pub struct CollectingSubscriber {
    events: RwLock<Vec<(Instant, AuthzEvent)>>,
    max_events: usize,
}

impl CollectingSubscriber {
    /// Create a new collecting subscriber.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<(Instant, AuthzEvent)> {
        self.events.read().clone()
    }

    /// Collected events of one type.
    pub fn of_type(&self, event_type: &str) -> Vec<AuthzEvent> {
        self.events
            .read()
            .iter()
            .filter(|(_, e)| e.event_type() == event_type)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSubscriber for CollectingSubscriber {
    fn on_event(&self, event: &AuthzEvent) {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push((Instant::now(), event.clone()));
        }
    }
}

/// Event dispatcher that manages subscribers.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Remove all subscribers.
    pub fn clear_subscribers(&self) {
        self.subscribers.write().clear();
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AuthzEvent) {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            if let Some(filter) = subscriber.event_filter() {
                if !filter.contains(&event.event_type()) {
                    continue;
                }
            }
            subscriber.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DropsOnly(CollectingSubscriber);

    impl EventSubscriber for DropsOnly {
        fn on_event(&self, event: &AuthzEvent) {
            self.0.on_event(event);
        }

        fn event_filter(&self) -> Option<Vec<&'static str>> {
            Some(vec!["rule_dropped"])
        }
    }

    fn dropped() -> AuthzEvent {
        AuthzEvent::RuleDropped {
            index: 0,
            action: "read".to_string(),
            subject: Some("article".to_string()),
            reason: "unknown condition".to_string(),
        }
    }

    #[test]
    fn test_event_type() {
        assert_eq!(dropped().event_type(), "rule_dropped");
        let event = AuthzEvent::CacheHit {
            role: "1".to_string(),
        };
        assert_eq!(event.event_type(), "cache_hit");
    }

    #[test]
    fn test_collecting_subscriber_max_events() {
        let subscriber = CollectingSubscriber::new(2);
        for _ in 0..5 {
            subscriber.on_event(&dropped());
        }
        assert_eq!(subscriber.len(), 2);
    }

    #[test]
    fn test_event_dispatcher() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(CollectingSubscriber::new(100));
        dispatcher.subscribe(Arc::clone(&collector) as Arc<dyn EventSubscriber>);

        dispatcher.emit(AuthzEvent::ActionRegistered {
            id: "read".to_string(),
        });
        dispatcher.emit(dropped());

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.of_type("rule_dropped").len(), 1);
    }

    #[test]
    fn test_event_filter() {
        let dispatcher = EventDispatcher::new();
        let drops = Arc::new(DropsOnly(CollectingSubscriber::new(100)));
        dispatcher.subscribe(Arc::clone(&drops) as Arc<dyn EventSubscriber>);

        dispatcher.emit(AuthzEvent::CacheMiss {
            role: "1".to_string(),
        });
        dispatcher.emit(dropped());

        assert_eq!(drops.0.len(), 1);
    }

    #[test]
    fn test_ability_ids_are_unique() {
        assert_ne!(AbilityId::new(), AbilityId::new());
    }
}
