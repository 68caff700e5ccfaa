#![allow(clippy::unwrap_used, clippy::expect_used)]

use content_acl::PermissionFactory;
use content_acl_sdk::{
    Access, AclSchema, Entity, EntityPermissionsDeclaration, Model, Operation,
    PredicateDeclaration, PredicateDefinition, PredicateValue, ResolvedPermissions,
    ResolvedPredicates, RichPredicate, RoleDefinition, Schema, ThroughKey,
};
use content_condition::ColumnCondition;

fn column(field: &str) -> PredicateDefinition {
    PredicateDefinition::column(field, ColumnCondition::eq(true))
}

fn schema() -> Schema {
    let model = Model::new().with_entity(
        Entity::new("Post")
            .column("title")
            .column("body")
            .column("draft")
            .inverse("comments", "Comment", "post"),
    );
    let post = |extra: EntityPermissionsDeclaration| {
        extra
            .predicate("visible", column("draft"))
            .predicate("own", PredicateDefinition::column_variable("author", "me"))
    };
    let acl = AclSchema::default()
        .with_role(
            "reader",
            RoleDefinition::new().entity(
                "Post",
                post(EntityPermissionsDeclaration::new())
                    .read("title", PredicateDeclaration::named("visible"))
                    .read(
                        "body",
                        PredicateDeclaration::Rich(vec![
                            RichPredicate::named("visible").through_any(),
                            RichPredicate::named("own").through_relations(["comments"]),
                        ]),
                    )
                    .delete(PredicateDeclaration::named("own")),
            ),
        )
        .with_role(
            "author",
            RoleDefinition::new().inherits(["reader"]).entity(
                "Post",
                post(EntityPermissionsDeclaration::new())
                    .read("draft", PredicateDeclaration::named("own"))
                    .update("title", PredicateDeclaration::named("own"))
                    .update("body", PredicateDeclaration::allow()),
            ),
        )
        .with_role(
            "admin",
            RoleDefinition::new().entity(
                "Post",
                EntityPermissionsDeclaration::new()
                    .read("title", PredicateDeclaration::allow())
                    .delete(PredicateDeclaration::allow()),
            ),
        )
        .with_role(
            "commenter",
            RoleDefinition::new().entity(
                "Post",
                post(EntityPermissionsDeclaration::new()).read(
                    "title",
                    PredicateDeclaration::Rich(vec![
                        RichPredicate::named("visible").through_relations(["comments"]),
                    ]),
                ),
            ),
        );
    Schema { model, acl }
}

fn compile(schema: &Schema, roles: &[&str]) -> ResolvedPermissions {
    let roles: Vec<String> = roles.iter().map(|r| (*r).to_owned()).collect();
    PermissionFactory::new(schema).create(&roles, None).unwrap()
}

fn keys() -> Vec<ThroughKey> {
    vec![
        ThroughKey::Root,
        ThroughKey::AnyRelation,
        ThroughKey::Unknown,
        ThroughKey::relation("comments"),
        ThroughKey::relation("other"),
    ]
}

/// Predicates of `value` named after the reader's definitions, sorted;
/// `["allow"]` for an unconditional grant.
fn labels(value: Option<&PredicateValue>) -> Option<Vec<&'static str>> {
    let visible = column("draft");
    let own = PredicateDefinition::column_variable("author", "reader__me");
    value.map(|value| match value {
        PredicateValue::Allow => vec!["allow"],
        PredicateValue::Predicates(list) => {
            let mut names: Vec<&'static str> = list
                .iter()
                .map(|p| match p.as_ref() {
                    p if *p == visible => "visible",
                    p if *p == own => "own",
                    _ => "other",
                })
                .collect();
            names.sort_unstable();
            names
        }
    })
}

/// Grant level of `key` in `map`, with predicate lists erased.
fn grant(map: Option<&ResolvedPredicates>, key: &ThroughKey) -> Access<'static> {
    match Access::from_value(map.and_then(|m| m.matching(key))) {
        Access::Denied => Access::Denied,
        Access::Allowed => Access::Allowed,
        Access::Conditional(_) => Access::Conditional(&[]),
    }
}

#[test]
fn compiling_twice_is_deep_equal() {
    let schema = schema();
    assert_eq!(
        compile(&schema, &["author", "admin"]),
        compile(&schema, &["author", "admin"])
    );
}

#[test]
fn primary_is_union_of_other_fields_under_every_key() {
    let schema = schema();
    let role_sets: [&[&str]; 4] = [
        &["reader"],
        &["author"],
        &["reader", "admin"],
        &["admin", "author"],
    ];
    for roles in role_sets {
        let resolved = compile(&schema, roles);
        let post = resolved.entity("Post").unwrap();
        for operation in Operation::FIELD_LEVEL {
            let fields = post.fields(operation).unwrap();
            if fields.is_empty() {
                continue;
            }
            let union = fields
                .iter()
                .filter(|(name, _)| name.as_str() != "id")
                .fold(ResolvedPredicates::new(), |acc, (_, p)| acc.merge(p));
            for key in keys() {
                assert_eq!(
                    fields["id"].get(&key),
                    union.get(&key),
                    "roles {roles:?}, {operation}, {key}"
                );
            }
        }
    }
}

#[test]
fn primary_matches_hand_computed_union() {
    let schema = schema();

    let reader = compile(&schema, &["reader"]);
    let id = &reader.entity("Post").unwrap().read["id"];
    assert_eq!(labels(id.get(&ThroughKey::Root)), Some(vec!["visible"]));
    assert_eq!(labels(id.get(&ThroughKey::AnyRelation)), Some(vec!["visible"]));
    assert_eq!(
        labels(id.get(&ThroughKey::relation("comments"))),
        Some(vec!["own", "visible"])
    );
    assert_eq!(labels(id.get(&ThroughKey::Unknown)), Some(vec!["own", "visible"]));
    assert_eq!(id.get(&ThroughKey::relation("other")), None);

    let with_admin = compile(&schema, &["reader", "admin"]);
    let id = &with_admin.entity("Post").unwrap().read["id"];
    for key in [
        ThroughKey::Root,
        ThroughKey::AnyRelation,
        ThroughKey::Unknown,
        ThroughKey::relation("comments"),
    ] {
        assert_eq!(labels(id.get(&key)), Some(vec!["allow"]), "{key}");
    }
}

fn assert_no_less_access(
    before: &ResolvedPermissions,
    after: &ResolvedPermissions,
    label: &str,
) {
    for (entity, permissions) in before.iter() {
        for operation in Operation::FIELD_LEVEL {
            for (field, predicates) in permissions.fields(operation).unwrap() {
                let merged = after
                    .entity(entity)
                    .and_then(|p| p.fields(operation))
                    .and_then(|f| f.get(field));
                for key in keys() {
                    let context = format!("{label}: {entity}.{field} {operation} {key}");
                    match (grant(Some(predicates), &key), grant(merged, &key)) {
                        (Access::Allowed, after) => assert_eq!(after, Access::Allowed, "{context}"),
                        (Access::Conditional(_), after) => {
                            assert!(after.is_possible(), "{context}");
                        }
                        (Access::Denied, _) => {}
                    }
                }
            }
        }
    }
}

#[test]
fn merging_never_reduces_access() {
    let schema = schema();
    let pairs = [
        ("reader", "admin"),
        ("admin", "reader"),
        ("admin", "commenter"),
        ("commenter", "admin"),
        ("reader", "commenter"),
    ];
    for (first, second) in pairs {
        let alone = compile(&schema, &[first]);
        let label = format!("{first} + {second}");
        assert_no_less_access(&alone, &alone.merge(&compile(&schema, &[second])), &label);
        assert_no_less_access(&alone, &compile(&schema, &[first, second]), &label);
    }
}

#[test]
fn scoped_rule_does_not_shadow_an_unconditional_grant() {
    let schema = schema();
    let resolved = compile(&schema, &["admin", "commenter"]);
    let title = &resolved.entity("Post").unwrap().read["title"];

    assert_eq!(
        title.matching(&ThroughKey::relation("comments")),
        Some(&PredicateValue::Allow)
    );
    assert_eq!(title.matching(&ThroughKey::Root), Some(&PredicateValue::Allow));
}

#[test]
fn specific_relation_beats_any_relation() {
    let schema = schema();
    let resolved = compile(&schema, &["reader"]);
    let body = &resolved.entity("Post").unwrap().read["body"];

    let variables = |key: ThroughKey| -> Vec<String> {
        body.matching(&key)
            .and_then(PredicateValue::predicates)
            .unwrap()
            .iter()
            .flat_map(|p| p.variables().into_iter().map(str::to_owned).collect::<Vec<_>>())
            .collect()
    };
    assert_eq!(variables(ThroughKey::relation("comments")), vec!["reader__me"]);
    assert!(variables(ThroughKey::relation("other")).is_empty());
    assert!(body.matching(&ThroughKey::Root).is_none());
}

#[test]
fn unknown_bounds_every_tracked_context() {
    let schema = schema();
    let resolved = compile(&schema, &["reader"]);
    let body = &resolved.entity("Post").unwrap().read["body"];
    let unknown = body
        .get(&ThroughKey::Unknown)
        .and_then(PredicateValue::predicates)
        .unwrap();

    for (_, value) in body.iter() {
        for predicate in value.predicates().unwrap() {
            assert!(unknown.contains(predicate));
        }
    }
}

#[test]
fn inherited_permissions_are_merged() {
    let schema = schema();
    let resolved = compile(&schema, &["author"]);
    let post = resolved.entity("Post").unwrap();

    assert!(post.read.contains_key("title"));
    assert!(post.read.contains_key("draft"));
    assert_eq!(
        post.update["body"].get(&ThroughKey::Root),
        Some(&PredicateValue::Allow)
    );
    assert_eq!(post.update["id"].get(&ThroughKey::Root), Some(&PredicateValue::Allow));
    assert!(matches!(
        post.delete.get(&ThroughKey::Root),
        Some(PredicateValue::Predicates(list)) if list.len() == 1
    ));
}
