/// Boolean evaluation of nested AND/OR condition trees
///
/// Rule operands go through the variable resolver first, so `{{path}}`
/// references compare against live context values. Comparisons never
/// panic: a coercion failure simply fails the comparison.

use crate::engine::resolver;
use crate::workflow::types::{Combinator, ExecutionContext, Operator, Rule, RuleGroup, RuleNode};
use serde_json::Value;

/// Evaluate a rule group with short-circuit AND/OR semantics
///
/// An empty AND group is vacuously true, an empty OR group false.
pub fn evaluate(group: &RuleGroup, context: &ExecutionContext) -> bool {
    match group.combinator {
        Combinator::And => group.rules.iter().all(|node| evaluate_node(node, context)),
        Combinator::Or => group.rules.iter().any(|node| evaluate_node(node, context)),
    }
}

fn evaluate_node(node: &RuleNode, context: &ExecutionContext) -> bool {
    match node {
        RuleNode::Group(group) => evaluate(group, context),
        RuleNode::Rule(rule) => evaluate_rule(rule, context),
    }
}

fn evaluate_rule(rule: &Rule, context: &ExecutionContext) -> bool {
    let a = resolver::resolve(&rule.value_a, context);

    // is_empty only inspects the left operand.
    if rule.operator == Operator::IsEmpty {
        return is_empty(&a);
    }

    let b = resolver::resolve(&rule.value_b, context);

    let verdict = match rule.operator {
        Operator::Gt => numeric(&a).zip(numeric(&b)).is_some_and(|(x, y)| x > y),
        Operator::Lt => numeric(&a).zip(numeric(&b)).is_some_and(|(x, y)| x < y),
        Operator::Eq => loose_eq(&a, &b),
        Operator::Ne => !loose_eq(&a, &b),
        Operator::Contains => contains(&a, &b),
        Operator::IsEmpty => unreachable!("handled above"),
    };

    tracing::trace!(?rule.operator, ?a, ?b, verdict, "evaluated rule");
    verdict
}

/// Coerce a value to a number; numeric strings count, anything else fails
/// the comparison instead of erroring.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose equality: numeric when both sides coerce, stringified otherwise,
/// so `5 == "5"` and `"a" == "a"` both hold.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x == y;
    }
    resolver::display(a) == resolver::display(b)
}

fn contains(a: &Value, b: &Value) -> bool {
    match a {
        Value::String(haystack) => haystack.contains(&resolver::display(b)),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, b)),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
