//! End-to-end scenarios through the façade.

use std::sync::Arc;

use serde_json::json;
use warden::prelude::*;
use warden::{StoreResult, WardenError};

fn context() -> RegistryContext {
    Warden::builder()
        .with_actions(
            ["read", "create", "update", "delete", "publish"]
                .into_iter()
                .map(|uid| ActionDescriptor::new(uid, Section::ContentTypes, uid)),
        )
        .build()
        .unwrap()
}

fn schema() -> SchemaRegistry {
    let mut schema = SchemaRegistry::new();
    schema
        .register_model(ModelSchema::new("article").with_scalars(["title", "body"]))
        .unwrap();
    schema
}

fn actor() -> RuntimeContext {
    RuntimeContext::new(Actor::new(1).with_role(Role::new(3)))
}

fn rules(value: serde_json::Value) -> Vec<PermissionRule> {
    serde_json::from_value(value).unwrap()
}

fn crud() -> CheckerConfig {
    CheckerConfig::new().with_actions(CrudActions::bare())
}

#[test]
fn test_scenario_a_read_with_field_restriction() {
    let ability = context().compile(
        &rules(json!([{ "action": "read", "subject": "article", "fields": ["title"] }])),
        &actor(),
    );
    let schema = schema();
    let checker = PermissionChecker::create(&ability, &schema, "article")
        .unwrap()
        .with_config(crud());

    assert!(checker.can().read());

    let record = json!({ "title": "x", "body": "y" });
    let before = record.clone();
    assert_eq!(checker.sanitize_output(&record), json!({ "title": "x" }));
    assert_eq!(record, before);
}

#[test]
fn test_scenario_b_creator_condition() {
    let ability = context().compile(
        &rules(json!([{
            "action": "update",
            "subject": "article",
            "condition": { "name": "is-creator" }
        }])),
        &actor(),
    );

    let theirs = json!({ "id": 5, "createdBy": { "id": 9 } });
    let mine = json!({ "id": 6, "createdBy": { "id": 1 } });

    assert!(!ability.can("update", Subject::record("article", &theirs), None));
    assert!(ability.can("update", Subject::record("article", &mine), None));
    assert!(ability.can("update", Subject::Type("article"), None));
}

#[test]
fn test_scenario_c_unconditional_any_subject() {
    let ability = context().compile(
        &rules(json!([{ "action": "delete", "subject": null }])),
        &actor(),
    );

    for subject in ["article", "anySubjectName", "plugin::users-permissions.user"] {
        assert!(ability.can("delete", Subject::Type(subject), None));
        assert!(ability.relevant_rule_for("delete", subject).filter.is_unrestricted());
    }
    assert!(ability.cannot("read", Subject::Type("article"), None));
}

#[test]
fn test_scenario_d_conditions_are_or_ed() {
    let ability = context().compile(
        &rules(json!([
            { "action": "read", "subject": "article", "condition": { "name": "is-same-role-as-creator" } },
            { "action": "read", "subject": "article", "condition": { "name": "is-creator" } }
        ])),
        &actor(),
    );

    let relevant = ability.relevant_rule_for("read", "article");
    assert_eq!(
        relevant.filter.to_json(),
        json!({ "$or": [{ "createdBy": 1 }, { "createdBy.role": 3 }] })
    );
}

#[test]
fn test_unknown_condition_grants_nothing() {
    let context = context();
    let prepared = context.prepare(&rules(json!([
        { "action": "read", "subject": "article", "condition": { "name": "no-such-condition" } }
    ])));
    assert!(prepared.is_empty());
    assert_eq!(prepared.dropped().len(), 1);

    let ability = context.compile(
        &rules(json!([
            { "action": "read", "subject": "article", "condition": { "name": "no-such-condition" } }
        ])),
        &actor(),
    );
    assert!(ability.cannot("read", Subject::Type("article"), None));
    assert!(ability.relevant_rule_for("read", "article").filter.is_nothing());
}

#[test]
fn test_build_read_query_restricts_rows() {
    let ability = context().compile(
        &rules(json!([{
            "action": "read",
            "subject": "article",
            "fields": ["title"],
            "condition": { "name": "is-creator" }
        }])),
        &actor(),
    );
    let schema = schema();
    let checker = PermissionChecker::create(&ability, &schema, "article")
        .unwrap()
        .with_config(crud());

    let query = checker.build_read_query(&json!({ "fields": ["title", "body"] }));
    assert_eq!(query["fields"], json!(["title"]));
    assert_eq!(query["filters"], json!({ "createdBy": 1 }));
}

struct UnavailableStore;

impl RuleStore for UnavailableStore {
    async fn rules_for_role(&self, _role: &EntityId) -> StoreResult<Vec<PermissionRule>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn replace_role_rules(
        &self,
        _role: &EntityId,
        _rules: Vec<PermissionRule>,
    ) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_service_caches_prepared_rules() {
    let collector = Arc::new(CollectingSubscriber::new(100));
    let context = Warden::builder()
        .with_action(ActionDescriptor::new("read", Section::ContentTypes, "Read"))
        .with_event_subscriber(collector.clone())
        .build()
        .unwrap();
    let store = InMemoryRuleStore::new()
        .with_role(3, rules(json!([{ "action": "read", "subject": "article" }])));
    let service = AuthorizationService::new(context, store);

    let first = service.ability_for(&actor()).await.unwrap();
    let second = service.ability_for(&actor()).await.unwrap();

    assert!(first.can("read", Subject::Type("article"), None));
    assert!(second.can("read", Subject::Type("article"), None));
    assert_ne!(first.id(), second.id());
    assert_eq!(collector.of_type("cache_miss").len(), 1);
    assert_eq!(collector.of_type("cache_hit").len(), 1);
    assert!(service.cache().contains(&EntityId::from(3)));
}

#[tokio::test]
async fn test_service_update_invalidates_synchronously() {
    let store = InMemoryRuleStore::new()
        .with_role(3, rules(json!([{ "action": "read", "subject": "article" }])));
    let service = AuthorizationService::new(context(), store);
    let role = EntityId::from(3);

    let before = service.ability_for(&actor()).await.unwrap();
    assert!(before.can("read", Subject::Type("article"), None));

    service
        .update_role_rules(&role, rules(json!([{ "action": "delete", "subject": "article" }])))
        .await
        .unwrap();
    assert!(!service.cache().contains(&role));

    let after = service.ability_for(&actor()).await.unwrap();
    assert!(after.cannot("read", Subject::Type("article"), None));
    assert!(after.can("delete", Subject::Type("article"), None));

    // The ability built before the update is unchanged.
    assert!(before.can("read", Subject::Type("article"), None));
}

#[tokio::test]
async fn test_service_unions_roles() {
    let store = InMemoryRuleStore::new()
        .with_role(3, rules(json!([{ "action": "read", "subject": "article", "fields": ["title"] }])))
        .with_role(4, rules(json!([{ "action": "read", "subject": "article", "fields": ["body"] }])));
    let service = AuthorizationService::new(context(), store);
    let ctx = RuntimeContext::new(Actor::new(1).with_role(Role::new(3)).with_role(Role::new(4)));

    let ability = service.ability_for(&ctx).await.unwrap();
    let fields = ability.relevant_rule_for("read", "article").fields;
    assert!(fields.allows("title"));
    assert!(fields.allows("body"));
    assert!(!fields.allows("slug"));
}

#[tokio::test]
async fn test_service_without_roles_is_empty() {
    let store = InMemoryRuleStore::new().with_role(3, rules(json!([{ "action": "read" }])));
    let service = AuthorizationService::new(context(), store);

    let ability = service
        .ability_for(&RuntimeContext::new(Actor::new(1)))
        .await
        .unwrap();
    assert!(ability.is_empty());
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_service_without_cache() {
    let context = Warden::builder()
        .with_config(EngineConfig::new().with_cache(false))
        .with_action(ActionDescriptor::new("read", Section::ContentTypes, "Read"))
        .build()
        .unwrap();
    let store = InMemoryRuleStore::new().with_role(3, rules(json!([{ "action": "read" }])));
    let service = AuthorizationService::new(context, store);

    let ability = service.ability_for(&actor()).await.unwrap();
    assert!(ability.can("read", Subject::Type("article"), None));
    assert!(service.cache().is_empty());
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let service = AuthorizationService::new(context(), UnavailableStore);

    let err = service.ability_for(&actor()).await.unwrap_err();
    assert!(matches!(err, WardenError::Store(StoreError::Unavailable(_))));

    let err = service
        .update_role_rules(&EntityId::from(3), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Store(_)));
}
