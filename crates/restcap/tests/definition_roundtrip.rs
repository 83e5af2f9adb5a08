//! Property-based tests for definitions, access masks and scalar types.

use proptest::prelude::*;
use restcap::normalizer::{denormalize_definition, normalize_definition};
use restcap::types::{BoolType, FloatType, IntType, StringType};
use restcap::{Access, PropertyType, PropertyValue, TypeRegistry};
use serde_json::{Value, json};

// Strategy for resource and property names
fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

// Strategy for type descriptors understood by the default registry
fn descriptor() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("string".to_string()),
        Just("int".to_string()),
        Just("float".to_string()),
        Just("bool".to_string()),
        Just("date<Y-m-d>".to_string()),
        Just("date<c>".to_string()),
    ];
    leaf.prop_recursive(3, 8, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| format!("set<{t}>")),
            (inner.clone(), inner).prop_map(|(k, v)| format!("map<{k}, {v}>")),
        ]
    })
}

fn access_codes() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(vec!["READ", "CREATE", "UPDATE"], 0..=3)
}

fn access() -> impl Strategy<Value = Access> {
    access_codes().prop_map(|codes| Access::from_codes(codes).unwrap())
}

fn raw_property() -> impl Strategy<Value = Value> {
    (
        descriptor(),
        access_codes(),
        prop::collection::btree_set(identifier(), 0..3),
        any::<bool>(),
    )
        .prop_map(|(ty, access, variants, optional)| {
            json!({
                "type": ty,
                "access": access,
                "variants": variants,
                "optional": optional,
            })
        })
}

fn raw_definition() -> impl Strategy<Value = Value> {
    (
        identifier(),
        identifier(),
        prop::collection::btree_map(identifier(), raw_property(), 0..6),
        prop::collection::btree_map(identifier(), any::<i32>(), 0..3),
        prop::collection::vec(
            (identifier(), identifier(), prop::collection::vec(identifier(), 0..3)),
            0..3,
        ),
        any::<bool>(),
    )
        .prop_map(|(path, identity, properties, metas, links, rangeable)| {
            json!({
                "url": format!("/{path}"),
                "identity": identity,
                "properties": properties,
                "metas": metas,
                "linkable_to": links
                    .into_iter()
                    .map(|(relationship, resource_path, parameters)| json!({
                        "relationship": relationship,
                        "resource_path": resource_path,
                        "parameters": parameters,
                    }))
                    .collect::<Vec<_>>(),
                "rangeable": rangeable,
            })
        })
}

// Any JSON document, used as untyped property input
fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e12..1.0e12f64).prop_map(Value::from),
        ".{0,20}".prop_map(Value::String),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn definition_survives_normalization(raw in raw_definition(), name in identifier()) {
        let registry = TypeRegistry::defaults();
        let first = denormalize_definition(raw, &name, &registry).unwrap();
        let second = denormalize_definition(normalize_definition(&first), &name, &registry).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn access_matches_itself(a in access()) {
        prop_assert!(a.matches(&a));
        prop_assert!(a.matches(&Access::empty()));
    }

    #[test]
    fn access_union_covers_both(a in access(), b in access()) {
        let union = a | b;
        prop_assert!(union.matches(&a));
        prop_assert!(union.matches(&b));
    }

    #[test]
    fn scalar_normalize_is_total(value in json_value()) {
        let value = PropertyValue::from(value);
        let scalars: [&dyn PropertyType; 4] = [&StringType, &IntType, &FloatType, &BoolType];
        for ty in scalars {
            prop_assert!(ty.normalize(&value).is_ok(), "{} failed on {:?}", ty, value);
        }
    }
}

#[test]
fn access_matching_examples() {
    let read = Access::READ;
    let read_create = Access::READ | Access::CREATE;
    assert!(!read.matches(&read_create));
    assert!(read_create.matches(&read));
}

#[test]
fn scalar_normalize_representative_values() {
    let inputs = [json!(1), json!(1.2), json!(true), json!(""), json!([]), json!({"a": 1})];
    let scalars: [&dyn PropertyType; 4] = [&StringType, &IntType, &FloatType, &BoolType];
    for input in inputs {
        let value = PropertyValue::from(input);
        for ty in scalars {
            assert!(ty.normalize(&value).is_ok(), "{ty} failed on {value:?}");
        }
    }
}
