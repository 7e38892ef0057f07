use serde_json::{json, Value};

use crate::condition::Condition;
use crate::transform::{Applied, Transform};
use crate::{apply, path, template, MappingDef, MappingMode, MappingRule};

fn field_map(rules: Vec<MappingRule>) -> MappingDef {
    MappingDef {
        mode: MappingMode::FieldMap,
        rules,
        template: None,
        static_fields: None,
        pass_through: false,
    }
}

fn rule(source: &str, target: &str) -> MappingRule {
    MappingRule {
        source_path: source.to_string(),
        target_path: target.to_string(),
        transform: None,
        default_value: None,
        condition: None,
    }
}

#[test]
fn resolves_dotted_and_indexed_paths() {
    let payload = json!({
        "entry": [{"changes": [{"value": {"name": "Ada"}}]}]
    });
    assert_eq!(
        path::lookup(&payload, "entry[0].changes[0].value.name"),
        Some(&json!("Ada"))
    );
    assert_eq!(path::lookup(&payload, "entry[3].changes"), None);
    assert_eq!(path::lookup(&payload, "entry[0].missing"), None);
}

#[test]
fn field_map_copies_and_creates_nested_targets() {
    let mapping = field_map(vec![rule("contact.name", "lead.full_name")]);
    let out = apply(&mapping, &json!({"contact": {"name": "Ada"}})).unwrap();
    assert_eq!(out.output, json!({"lead": {"full_name": "Ada"}}));
    assert!(out.warnings.is_empty());
}

#[test]
fn absent_source_uses_default_or_skips() {
    let mut with_default = rule("missing", "out");
    with_default.default_value = Some(json!("fallback"));
    let mapping = field_map(vec![with_default, rule("also_missing", "other")]);

    let out = apply(&mapping, &json!({})).unwrap();
    assert_eq!(out.output, json!({"out": "fallback"}));
}

#[test]
fn transform_type_error_warns_and_skips_without_default() {
    let mut r = rule("n", "out");
    r.transform = Some(Transform::Uppercase);
    let mapping = field_map(vec![r]);

    let out = apply(&mapping, &json!({"n": 42})).unwrap();
    assert_eq!(out.output, json!({}));
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn condition_gates_rule() {
    let mut gated = rule("name", "out");
    gated.condition = Some("kind == \"lead\"".to_string());
    let mapping = field_map(vec![gated]);

    let hit = apply(&mapping, &json!({"name": "Ada", "kind": "lead"})).unwrap();
    assert_eq!(hit.output, json!({"out": "Ada"}));

    let miss = apply(&mapping, &json!({"name": "Ada", "kind": "page"})).unwrap();
    assert_eq!(miss.output, json!({}));
}

#[test]
fn static_fields_win_unless_pass_through() {
    let mut mapping = field_map(vec![rule("a", "k")]);
    mapping.static_fields = Some(json!({"k": "static", "extra": 1}));

    let out = apply(&mapping, &json!({"a": "computed"})).unwrap();
    assert_eq!(out.output, json!({"k": "static", "extra": 1}));

    mapping.pass_through = true;
    let out = apply(&mapping, &json!({"a": "computed"})).unwrap();
    assert_eq!(out.output["k"], json!("computed"));
    assert_eq!(out.output["a"], json!("computed"));
    assert_eq!(out.output["extra"], json!(1));
}

#[test]
fn apply_is_deterministic() {
    let mut r = rule("ts", "at");
    r.transform = Some(Transform::DateIso);
    let mapping = field_map(vec![r, rule("who", "lead.name")]);
    let payload = json!({"ts": 1700000000, "who": "Ada"});

    let a = apply(&mapping, &payload).unwrap();
    let b = apply(&mapping, &payload).unwrap();
    assert_eq!(
        serde_json::to_vec(&a.output).unwrap(),
        serde_json::to_vec(&b.output).unwrap()
    );
}

#[test]
fn template_renders_paths_and_absents_as_empty() {
    let payload = json!({"user": {"name": "Ada"}, "n": 3});
    let rendered = template::render("hi {{user.name}} ({{n}}) {{missing}}!", &payload);
    assert_eq!(rendered, "hi Ada (3) !");
}

#[test]
fn template_output_parses_to_json_when_possible() {
    let mapping = MappingDef {
        mode: MappingMode::Template,
        rules: vec![],
        template: Some("{\"name\": \"{{user.name}}\"}".to_string()),
        static_fields: Some(json!({"source": "hub"})),
        pass_through: false,
    };
    let out = apply(&mapping, &json!({"user": {"name": "Ada"}})).unwrap();
    assert_eq!(out.output, json!({"name": "Ada", "source": "hub"}));
}

#[test]
fn template_output_stays_string_when_not_json() {
    let mapping = MappingDef {
        mode: MappingMode::Template,
        rules: vec![],
        template: Some("hello {{user.name}}".to_string()),
        static_fields: Some(json!({"ignored": true})),
        pass_through: false,
    };
    let out = apply(&mapping, &json!({"user": {"name": "Ada"}})).unwrap();
    assert_eq!(out.output, Value::String("hello Ada".to_string()));
}

#[test]
fn template_mode_without_template_is_structural_error() {
    let mapping = MappingDef {
        mode: MappingMode::Template,
        rules: vec![],
        template: None,
        static_fields: None,
        pass_through: false,
    };
    assert!(apply(&mapping, &json!({})).is_err());
}

#[test]
fn template_in_field_map_mode_is_structural_error() {
    let mut mapping = field_map(vec![]);
    mapping.template = Some("{{a}}".to_string());
    assert!(apply(&mapping, &json!({})).is_err());
}

// ---- transforms ----

fn applied_value(t: Transform, v: Value) -> Option<Value> {
    match t.apply(&v) {
        Applied::Value(v) => Some(v),
        _ => None,
    }
}

#[test]
fn number_coercion_handles_strings_and_empties() {
    assert_eq!(applied_value(Transform::Number, json!("12.5")), Some(json!(12.5)));
    assert!(matches!(Transform::Number.apply(&json!("")), Applied::Absent));
    assert!(matches!(
        Transform::Number.apply(&json!("abc")),
        Applied::TypeError
    ));
}

#[test]
fn date_iso_accepts_mixed_inputs() {
    let rfc = applied_value(Transform::DateIso, json!("2024-05-01T10:30:00+02:00")).unwrap();
    assert_eq!(rfc, json!("2024-05-01T08:30:00Z"));

    let secs = applied_value(Transform::DateIso, json!(1714552200)).unwrap();
    let millis = applied_value(Transform::DateIso, json!(1714552200000i64)).unwrap();
    assert_eq!(secs, millis);
}

#[test]
fn array_transforms() {
    assert_eq!(
        applied_value(Transform::ArrayFirst, json!(["a", "b"])),
        Some(json!("a"))
    );
    assert_eq!(
        applied_value(Transform::ArrayLast, json!(["a", "b"])),
        Some(json!("b"))
    );
    // Identity on non-arrays.
    assert_eq!(
        applied_value(Transform::ArrayFirst, json!("solo")),
        Some(json!("solo"))
    );
    assert_eq!(
        applied_value(Transform::ArrayJoin, json!(["a", 1, true])),
        Some(json!("a,1,true"))
    );
}

#[test]
fn phone_clean_keeps_leading_plus() {
    assert_eq!(
        applied_value(Transform::PhoneClean, json!("+49 (151) 123-456")),
        Some(json!("+49151123456"))
    );
    assert_eq!(
        applied_value(Transform::PhoneClean, json!("0151/123456")),
        Some(json!("0151123456"))
    );
}

#[test]
fn email_lower_trims_and_lowercases() {
    assert_eq!(
        applied_value(Transform::EmailLower, json!("  Ada@Example.COM ")),
        Some(json!("ada@example.com"))
    );
}

#[test]
fn json_parse_and_stringify_run_exactly_once() {
    assert_eq!(
        applied_value(Transform::JsonParse, json!("{\"a\":1}")),
        Some(json!({"a": 1}))
    );
    assert_eq!(
        applied_value(Transform::JsonStringify, json!({"a": 1})),
        Some(json!("{\"a\":1}"))
    );
}

// ---- conditions ----

#[test]
fn condition_parsing_and_evaluation() {
    let payload = json!({"a": {"b": "x"}, "empty": "", "list": []});

    assert!(Condition::parse("exists(a.b)").unwrap().holds(&payload));
    assert!(!Condition::parse("exists(a.c)").unwrap().holds(&payload));
    assert!(Condition::parse("!exists(a.c)").unwrap().holds(&payload));
    assert!(!Condition::parse("non_empty(empty)").unwrap().holds(&payload));
    assert!(!Condition::parse("non_empty(list)").unwrap().holds(&payload));
    assert!(Condition::parse("a.b == \"x\"").unwrap().holds(&payload));
    assert!(Condition::parse("a.b == x").unwrap().holds(&payload));
    assert!(Condition::parse("a.b != y").unwrap().holds(&payload));
    assert!(Condition::parse("totally bogus ###").is_err());
}
