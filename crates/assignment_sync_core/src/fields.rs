//! crates/assignment_sync_core/src/fields.rs
//!
//! The static mapping from local questionnaire field keys to the server's
//! field names, plus the per-kind value coercion applied before an update is
//! sent. The table is fixed and exhaustive for the update flow.

use serde_json::Value;

/// How a field's value is coerced before being placed in an update payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Boolean,
    FileList,
}

/// One row of the local-to-remote field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub local: &'static str,
    pub remote: &'static str,
    pub kind: FieldKind,
}

pub const FIELD_MAP: &[FieldSpec] = &[
    FieldSpec { local: "assignmentType", remote: "assignment_type", kind: FieldKind::Text },
    FieldSpec { local: "subject", remote: "subject", kind: FieldKind::Text },
    FieldSpec { local: "course", remote: "course", kind: FieldKind::Text },
    FieldSpec { local: "level", remote: "level", kind: FieldKind::Text },
    FieldSpec { local: "referencingStyle", remote: "referencing_style", kind: FieldKind::Text },
    FieldSpec { local: "numberOfReferences", remote: "number_of_references", kind: FieldKind::Numeric },
    FieldSpec { local: "sampleAssignment", remote: "sample_assignments", kind: FieldKind::FileList },
    FieldSpec { local: "lectureNotes", remote: "lecture_notes", kind: FieldKind::FileList },
    FieldSpec { local: "wordCount", remote: "word_count", kind: FieldKind::Numeric },
    FieldSpec { local: "lineSpacing", remote: "line_spacing", kind: FieldKind::Text },
    FieldSpec { local: "fontStyle", remote: "font_style", kind: FieldKind::Text },
    FieldSpec { local: "fontSize", remote: "font_size", kind: FieldKind::Numeric },
    FieldSpec { local: "includeDiagrams", remote: "include_diagrams_pictures", kind: FieldKind::Boolean },
    FieldSpec { local: "otherInstructions", remote: "special_instructions", kind: FieldKind::Text },
];

/// Looks up the wire-side spec for a local field key.
pub fn field_spec(local_key: &str) -> Option<&'static FieldSpec> {
    FIELD_MAP.iter().find(|spec| spec.local == local_key)
}

/// Coerces a raw value according to the field's declared kind.
///
/// Numeric fields parse to an integer; unparseable input coerces to 0 rather
/// than being dropped. Boolean fields follow truthiness. File-reference
/// fields normalize to an array, wrapping a single value and treating null as
/// empty.
pub fn coerce(kind: FieldKind, value: &Value) -> Value {
    match kind {
        FieldKind::Text => value.clone(),
        FieldKind::Numeric => Value::from(coerce_integer(value)),
        FieldKind::Boolean => Value::from(coerce_truthy(value)),
        FieldKind::FileList => match value {
            Value::Null => Value::Array(Vec::new()),
            Value::Array(items) => Value::Array(items.clone()),
            other => Value::Array(vec![other.clone()]),
        },
    }
}

fn coerce_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn coerce_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_local_key_resolves() {
        for spec in FIELD_MAP {
            assert_eq!(field_spec(spec.local).unwrap().remote, spec.remote);
        }
        assert!(field_spec("favoriteColor").is_none());
    }

    #[test]
    fn numeric_strings_parse_to_integers() {
        assert_eq!(coerce(FieldKind::Numeric, &json!("2000")), json!(2000));
        assert_eq!(coerce(FieldKind::Numeric, &json!(" 42 ")), json!(42));
        assert_eq!(coerce(FieldKind::Numeric, &json!(12)), json!(12));
    }

    #[test]
    fn invalid_numeric_input_coerces_to_zero() {
        assert_eq!(coerce(FieldKind::Numeric, &json!("abc")), json!(0));
        assert_eq!(coerce(FieldKind::Numeric, &json!(null)), json!(0));
        assert_eq!(coerce(FieldKind::Numeric, &json!({"nested": true})), json!(0));
    }

    #[test]
    fn booleans_follow_truthiness() {
        assert_eq!(coerce(FieldKind::Boolean, &json!(true)), json!(true));
        assert_eq!(coerce(FieldKind::Boolean, &json!(0)), json!(false));
        assert_eq!(coerce(FieldKind::Boolean, &json!("")), json!(false));
        assert_eq!(coerce(FieldKind::Boolean, &json!("yes")), json!(true));
        assert_eq!(coerce(FieldKind::Boolean, &json!(null)), json!(false));
    }

    #[test]
    fn file_references_normalize_to_arrays() {
        assert_eq!(coerce(FieldKind::FileList, &json!(null)), json!([]));
        assert_eq!(coerce(FieldKind::FileList, &json!("doc.pdf")), json!(["doc.pdf"]));
        assert_eq!(
            coerce(FieldKind::FileList, &json!(["a.pdf", "b.pdf"])),
            json!(["a.pdf", "b.pdf"])
        );
    }
}
