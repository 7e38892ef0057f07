use serde_json::{Map, Value};

use crate::condition::Condition;
use crate::transform::Applied;
use crate::{path, template, MappingDef, MappingError, MappingMode};

/// Result of applying a mapping: the produced value plus any per-rule
/// warnings collected along the way. Warnings never abort the transform.
#[derive(Debug, Clone)]
pub struct MappingOutput {
    pub output: Value,
    pub warnings: Vec<String>,
}

/// Apply a mapping to a payload.
///
/// Pure: same inputs always produce the same output. Returns `Err` only
/// for a structurally invalid mapping definition; bad payload data
/// degrades to warnings.
pub fn apply(mapping: &MappingDef, payload: &Value) -> Result<MappingOutput, MappingError> {
    if let Some(sf) = &mapping.static_fields {
        if !sf.is_object() && !sf.is_null() {
            return Err(MappingError::StaticFieldsNotObject);
        }
    }

    match mapping.mode {
        MappingMode::FieldMap => {
            if mapping.template.as_deref().is_some_and(|t| !t.is_empty()) {
                return Err(MappingError::TemplateInFieldMap);
            }
            apply_field_map(mapping, payload)
        }
        MappingMode::Template => apply_template(mapping, payload),
    }
}

fn apply_field_map(mapping: &MappingDef, payload: &Value) -> Result<MappingOutput, MappingError> {
    // Parse all conditions up front: a malformed condition is a structural
    // defect of the mapping, not a data problem.
    let conditions: Vec<Option<Condition>> = mapping
        .rules
        .iter()
        .map(|r| r.condition.as_deref().map(Condition::parse).transpose())
        .collect::<Result<_, _>>()?;

    let mut output = if mapping.pass_through {
        payload.clone()
    } else {
        Value::Object(Map::new())
    };
    let mut warnings = Vec::new();

    for (i, rule) in mapping.rules.iter().enumerate() {
        let resolved = path::lookup(payload, &rule.source_path).cloned();

        let mut value = match resolved {
            Some(v) => Some(v),
            None => rule.default_value.clone(),
        };
        let Some(raw) = value.take() else {
            continue;
        };

        let value = match &rule.transform {
            Some(t) => match t.apply(&raw) {
                Applied::Value(v) => v,
                Applied::Absent => match &rule.default_value {
                    Some(d) => d.clone(),
                    None => continue,
                },
                Applied::TypeError => {
                    warnings.push(format!(
                        "rule {}: transform {} does not apply to value at '{}'",
                        i + 1,
                        t,
                        rule.source_path
                    ));
                    match &rule.default_value {
                        Some(d) => d.clone(),
                        None => continue,
                    }
                }
            },
            None => raw,
        };

        if let Some(cond) = &conditions[i] {
            if !cond.holds(payload) {
                continue;
            }
        }

        path::write(&mut output, &rule.target_path, value)?;
    }

    merge_static_fields(&mut output, mapping);
    Ok(MappingOutput { output, warnings })
}

fn apply_template(mapping: &MappingDef, payload: &Value) -> Result<MappingOutput, MappingError> {
    let template_text = mapping
        .template
        .as_deref()
        .ok_or(MappingError::MissingTemplate)?;

    let rendered = template::render(template_text, payload);

    // The rendered text is returned as a JSON value when it parses, else as
    // a plain string. Static fields only apply to a parsed object.
    let output = match serde_json::from_str::<Value>(&rendered) {
        Ok(mut parsed) => {
            if let (Value::Object(obj), Some(Value::Object(statics))) =
                (&mut parsed, &mapping.static_fields)
            {
                for (k, v) in statics {
                    obj.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            parsed
        }
        Err(_) => Value::String(rendered),
    };

    Ok(MappingOutput {
        output,
        warnings: Vec::new(),
    })
}

// Shallow merge: static fields win over computed values, except in
// pass-through mode where computed values win.
fn merge_static_fields(output: &mut Value, mapping: &MappingDef) {
    let Some(Value::Object(statics)) = &mapping.static_fields else {
        return;
    };
    if statics.is_empty() {
        return;
    }
    if !output.is_object() {
        *output = Value::Object(Map::new());
    }
    let Some(obj) = output.as_object_mut() else {
        return;
    };
    for (k, v) in statics {
        if mapping.pass_through {
            obj.entry(k.clone()).or_insert_with(|| v.clone());
        } else {
            obj.insert(k.clone(), v.clone());
        }
    }
}
