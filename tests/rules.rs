//! Rule evaluator tests: operators, loose coercion, nesting, and
//! short-circuit combinators.

use nexusflow::engine::rules::evaluate;
use nexusflow::workflow::{ExecutionContext, RuleGroup};
use serde_json::json;

fn group(value: serde_json::Value) -> RuleGroup {
    serde_json::from_value(value).unwrap()
}

fn rule(value_a: serde_json::Value, operator: &str, value_b: serde_json::Value) -> RuleGroup {
    group(json!({
        "combinator": "AND",
        "rules": [{ "valueA": value_a, "operator": operator, "valueB": value_b }],
    }))
}

fn context() -> ExecutionContext {
    ExecutionContext::from_value(json!({
        "PRICE": 42.5,
        "NAME": "alice",
        "TAGS": ["urgent", "billing"],
        "EMPTY": "",
    }))
}

#[test]
fn numeric_comparisons() {
    let ctx = context();
    assert!(evaluate(&rule(json!("{{PRICE}}"), ">", json!(40)), &ctx));
    assert!(!evaluate(&rule(json!("{{PRICE}}"), ">", json!(50)), &ctx));
    assert!(evaluate(&rule(json!("{{PRICE}}"), "<", json!(50)), &ctx));
}

#[test]
fn numeric_strings_coerce_for_comparison() {
    let ctx = context();
    assert!(evaluate(&rule(json!("100"), ">", json!("42.5")), &ctx));
}

#[test]
fn non_numeric_operand_fails_comparison_without_panicking() {
    let ctx = context();
    assert!(!evaluate(&rule(json!("{{NAME}}"), ">", json!(10)), &ctx));
    assert!(!evaluate(&rule(json!("{{NAME}}"), "<", json!(10)), &ctx));
}

#[test]
fn loose_equality_matches_across_types() {
    let ctx = context();
    assert!(evaluate(&rule(json!(5), "==", json!("5")), &ctx));
    assert!(evaluate(&rule(json!("{{NAME}}"), "==", json!("alice")), &ctx));
    assert!(evaluate(&rule(json!("{{NAME}}"), "!=", json!("bob")), &ctx));
}

#[test]
fn contains_on_strings_and_arrays() {
    let ctx = context();
    assert!(evaluate(&rule(json!("{{NAME}}"), "contains", json!("lic")), &ctx));
    assert!(evaluate(&rule(json!("{{TAGS}}"), "contains", json!("urgent")), &ctx));
    assert!(!evaluate(&rule(json!("{{TAGS}}"), "contains", json!("missing")), &ctx));
    assert!(!evaluate(&rule(json!(42), "contains", json!(4)), &ctx));
}

#[test]
fn is_empty_ignores_right_operand() {
    let ctx = context();
    assert!(evaluate(&rule(json!("{{EMPTY}}"), "is_empty", json!("ignored")), &ctx));
    assert!(evaluate(&rule(json!("{{MISSING}}"), "is_empty", json!(null)), &ctx));
    assert!(!evaluate(&rule(json!("{{NAME}}"), "is_empty", json!(null)), &ctx));
}

#[test]
fn and_requires_every_rule() {
    let ctx = context();
    let both = group(json!({
        "combinator": "AND",
        "rules": [
            { "valueA": "{{PRICE}}", "operator": ">", "valueB": 40 },
            { "valueA": "{{NAME}}", "operator": "==", "valueB": "alice" },
        ],
    }));
    assert!(evaluate(&both, &ctx));

    let one_fails = group(json!({
        "combinator": "AND",
        "rules": [
            { "valueA": "{{PRICE}}", "operator": ">", "valueB": 40 },
            { "valueA": "{{NAME}}", "operator": "==", "valueB": "bob" },
        ],
    }));
    assert!(!evaluate(&one_fails, &ctx));
}

#[test]
fn or_requires_any_rule() {
    let ctx = context();
    let one_holds = group(json!({
        "combinator": "OR",
        "rules": [
            { "valueA": "{{PRICE}}", "operator": ">", "valueB": 1000 },
            { "valueA": "{{NAME}}", "operator": "==", "valueB": "alice" },
        ],
    }));
    assert!(evaluate(&one_holds, &ctx));
}

#[test]
fn groups_nest_recursively() {
    let ctx = context();
    let nested = group(json!({
        "combinator": "AND",
        "rules": [
            { "valueA": "{{PRICE}}", "operator": ">", "valueB": 40 },
            {
                "combinator": "OR",
                "rules": [
                    { "valueA": "{{NAME}}", "operator": "==", "valueB": "bob" },
                    { "valueA": "{{TAGS}}", "operator": "contains", "valueB": "billing" },
                ],
            },
        ],
    }));
    assert!(evaluate(&nested, &ctx));
}

#[test]
fn empty_groups_follow_combinator_identity() {
    let ctx = context();
    assert!(evaluate(&group(json!({ "combinator": "AND", "rules": [] })), &ctx));
    assert!(!evaluate(&group(json!({ "combinator": "OR", "rules": [] })), &ctx));
}
