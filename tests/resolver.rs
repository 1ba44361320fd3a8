//! Variable resolver tests: typed exact-token resolution, string
//! interpolation, and miss behavior.

use nexusflow::engine::resolver::{display, resolve};
use nexusflow::workflow::ExecutionContext;
use serde_json::json;

fn context() -> ExecutionContext {
    ExecutionContext::from_value(json!({
        "PRICE": 42.5,
        "NAME": "alice",
        "node_1": { "TX_HASH": "0xabc", "CONFIRMED": true },
        "payload": { "items": [1, 2, 3] },
    }))
}

#[test]
fn exact_token_preserves_value_type() {
    let ctx = context();
    assert_eq!(resolve(&json!("{{PRICE}}"), &ctx), json!(42.5));
    assert_eq!(resolve(&json!("{{node_1.CONFIRMED}}"), &ctx), json!(true));
    assert_eq!(resolve(&json!("{{payload.items}}"), &ctx), json!([1, 2, 3]));
}

#[test]
fn exact_token_miss_resolves_to_null() {
    assert_eq!(resolve(&json!("{{nothing.here}}"), &context()), json!(null));
}

#[test]
fn dot_path_walks_namespaced_step_results() {
    assert_eq!(resolve(&json!("{{node_1.TX_HASH}}"), &context()), json!("0xabc"));
}

#[test]
fn path_segments_are_whitespace_trimmed() {
    assert_eq!(resolve(&json!("{{ node_1.TX_HASH }}"), &context()), json!("0xabc"));
}

#[test]
fn interpolation_stringifies_resolved_values() {
    let resolved = resolve(&json!("price is {{PRICE}} for {{NAME}}"), &context());
    assert_eq!(resolved, json!("price is 42.5 for alice"));
}

#[test]
fn interpolation_encodes_objects_as_json() {
    let resolved = resolve(&json!("got {{payload}}"), &context());
    assert_eq!(resolved, json!(r#"got {"items":[1,2,3]}"#));
}

#[test]
fn unresolved_interpolation_token_stays_verbatim() {
    let resolved = resolve(&json!("hello {{missing}} world"), &context());
    assert_eq!(resolved, json!("hello {{missing}} world"));
}

#[test]
fn non_string_inputs_pass_through_unchanged() {
    let ctx = context();
    assert_eq!(resolve(&json!(99), &ctx), json!(99));
    assert_eq!(resolve(&json!({ "a": 1 }), &ctx), json!({ "a": 1 }));
    assert_eq!(resolve(&json!(null), &ctx), json!(null));
}

#[test]
fn text_without_tokens_passes_through() {
    assert_eq!(resolve(&json!("plain text"), &context()), json!("plain text"));
}

#[test]
fn unterminated_token_is_kept_as_is() {
    assert_eq!(resolve(&json!("broken {{PRICE"), &context()), json!("broken {{PRICE"));
}

#[test]
fn display_keeps_strings_raw_and_encodes_composites() {
    assert_eq!(display(&json!("abc")), "abc");
    assert_eq!(display(&json!(5)), "5");
    assert_eq!(display(&json!([1, 2])), "[1,2]");
}
