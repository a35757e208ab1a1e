//! Rewrites node-name references inside parameter expressions.
//!
//! Only string values starting with `=` are expressions. The recognised
//! reference forms are `$node["Name"]`, `$node['Name']`, `$node.Name`,
//! `$("Name")`, `$('Name')`, `$items("Name"` and `$items('Name'`.

use serde_json::{Map, Value};

/// Replace references to `old` with `new` in every expression under
/// `parameters`. Returns whether anything changed.
pub fn rename_node_references(parameters: &mut Map<String, Value>, old: &str, new: &str) -> bool {
    let mut changed = false;
    for value in parameters.values_mut() {
        changed |= rename_in_value(value, old, new);
    }
    changed
}

fn rename_in_value(value: &mut Value, old: &str, new: &str) -> bool {
    match value {
        Value::String(text) if text.starts_with('=') => match rename_in_expression(text, old, new) {
            Some(rewritten) => {
                *text = rewritten;
                true
            }
            None => false,
        },
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| rename_in_value(item, old, new) | changed),
        Value::Object(map) => rename_node_references(map, old, new),
        _ => false,
    }
}

fn rename_in_expression(text: &str, old: &str, new: &str) -> Option<String> {
    let mut out = text.to_owned();
    for quote in ['"', '\''] {
        let from_name = quoted(old, quote);
        let to_name = quoted(new, quote);
        for (prefix, suffix) in [("$node[", "]"), ("$(", ")"), ("$items(", "")] {
            let from = format!("{prefix}{from_name}{suffix}");
            if out.contains(&from) {
                out = out.replace(&from, &format!("{prefix}{to_name}{suffix}"));
            }
        }
    }
    if is_identifier(old) {
        out = rename_dotted(&out, old, new);
    }
    (out != text).then_some(out)
}

/// `$node.Old` → `$node.New`, or `$node["New"]` when `new` is not a bare
/// identifier. Matches only whole identifiers.
fn rename_dotted(text: &str, old: &str, new: &str) -> String {
    let needle = format!("$node.{old}");
    let replacement = if is_identifier(new) {
        format!("$node.{new}")
    } else {
        format!("$node[{}]", quoted(new, '"'))
    };

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(&needle) {
        let after = &rest[pos + needle.len()..];
        let whole = !after.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '$');
        out.push_str(&rest[..pos]);
        out.push_str(if whole { &replacement } else { &needle });
        rest = after;
    }
    out.push_str(rest);
    out
}

fn quoted(name: &str, quote: char) -> String {
    let escaped = name.replace(quote, &format!("\\{quote}"));
    format!("{quote}{escaped}{quote}")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn rewrites_every_reference_form() {
        let mut p = params(json!({
            "a": "={{ $node[\"Fetch\"].json.id }}",
            "b": "={{ $node['Fetch'].json.id }}",
            "c": "={{ $('Fetch').item.json }} {{ $(\"Fetch\").first() }}",
            "d": "={{ $items(\"Fetch\", 0) }}",
            "e": "={{ $node.Fetch.json }}",
        }));

        assert!(rename_node_references(&mut p, "Fetch", "Load"));
        assert_eq!(p["a"], json!("={{ $node[\"Load\"].json.id }}"));
        assert_eq!(p["b"], json!("={{ $node['Load'].json.id }}"));
        assert_eq!(p["c"], json!("={{ $('Load').item.json }} {{ $(\"Load\").first() }}"));
        assert_eq!(p["d"], json!("={{ $items(\"Load\", 0) }}"));
        assert_eq!(p["e"], json!("={{ $node.Load.json }}"));
    }

    #[test]
    fn leaves_plain_strings_and_partial_names_alone() {
        let mut p = params(json!({
            "literal": "$node[\"Fetch\"] is not an expression",
            "longer": "={{ $node.FetchAll.json }}",
            "other": "={{ $('Fetcher').item }}",
        }));
        let before = p.clone();

        assert!(!rename_node_references(&mut p, "Fetch", "Load"));
        assert_eq!(p, before);
    }

    #[test]
    fn dotted_reference_switches_to_brackets_for_non_identifiers() {
        let mut p = params(json!({ "x": "={{ $node.Fetch.json }}" }));
        rename_node_references(&mut p, "Fetch", "Fetch data");
        assert_eq!(p["x"], json!("={{ $node[\"Fetch data\"].json }}"));
    }

    #[test]
    fn nested_values_are_visited() {
        let mut p = params(json!({
            "rules": [{ "value": "={{ $('Fetch').item.json.ok }}" }],
        }));
        assert!(rename_node_references(&mut p, "Fetch", "Load"));
        assert_eq!(p["rules"][0]["value"], json!("={{ $('Load').item.json.ok }}"));
    }
}
