//! Shape contracts for flow inputs and outputs.
//!
//! The same [`ObjectSchema`] gates caller input before a prompt is rendered and
//! is sent to the model as the response JSON schema. Field descriptions and
//! array item bounds are guidance for the model only; validation checks
//! presence, kind, enum membership and string formats.
use crate::FlowError;
use codeverse_genai::JSONSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array {
        items: Box<FieldKind>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object(Vec<Field>),
    Enum(Vec<&'static str>),
}

impl FieldKind {
    #[must_use]
    pub fn array_of(items: Self) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Array { .. } => "an array",
            Self::Object(_) => "an object",
            Self::Enum(_) => "one of the allowed values",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Uri,
    Uuid,
}

impl StringFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::Uuid => "uuid",
        }
    }

    fn accepts(self, text: &str) -> bool {
        match self {
            Self::Uri => url::Url::parse(text).is_ok(),
            Self::Uuid => uuid::Uuid::parse_str(text).is_ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub format: Option<StringFormat>,
}

impl Field {
    #[must_use]
    pub fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
            format: None,
        }
    }

    #[must_use]
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    #[must_use]
    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Number, description)
    }

    #[must_use]
    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Integer, description)
    }

    #[must_use]
    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean, description)
    }

    #[must_use]
    pub fn array(name: &'static str, items: FieldKind, description: &'static str) -> Self {
        Self::new(name, FieldKind::array_of(items), description)
    }

    #[must_use]
    pub fn object(name: &'static str, fields: Vec<Self>, description: &'static str) -> Self {
        Self::new(name, FieldKind::Object(fields), description)
    }

    #[must_use]
    pub fn enumeration(
        name: &'static str,
        values: Vec<&'static str>,
        description: &'static str,
    ) -> Self {
        Self::new(name, FieldKind::Enum(values), description)
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Bounds on the number of items, sent to the model. Has no effect on
    /// non-array fields.
    #[must_use]
    pub fn items_between(mut self, min: usize, max: usize) -> Self {
        if let FieldKind::Array {
            min_items,
            max_items,
            ..
        } = &mut self.kind
        {
            *min_items = Some(min);
            *max_items = Some(max);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<Field>,
}

impl ObjectSchema {
    #[must_use]
    pub fn new(name: &'static str, description: &'static str, fields: Vec<Field>) -> Self {
        Self {
            name,
            description,
            fields,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Check `value` against the schema. The error carries the path of the
    /// first offending field, e.g. `questions[2].options`.
    pub fn validate(&self, value: &Value) -> Result<(), FlowError> {
        let Value::Object(map) = value else {
            return Err(FlowError::schema_mismatch(
                self.name,
                "$",
                format!("expected an object, found {}", describe_value(value)),
            ));
        };
        validate_fields(self.name, "", &self.fields, map)
    }

    #[must_use]
    pub fn to_json_schema(&self) -> JSONSchema {
        let mut schema = object_json_schema(&self.fields);
        if !self.description.is_empty() {
            schema["description"] = json!(self.description);
        }
        schema
    }
}

/// Implemented by flow input and output records.
pub trait FlowSchema {
    fn schema() -> ObjectSchema;
}

/// Serialize `record` and validate it against its schema.
pub fn validate_record<T: Serialize + FlowSchema>(record: &T) -> Result<Value, FlowError> {
    let schema = T::schema();
    let value = serde_json::to_value(record)
        .map_err(|error| FlowError::schema_mismatch(schema.name, "$", error.to_string()))?;
    schema.validate(&value)?;
    Ok(value)
}

/// Validate a JSON value against `T`'s schema and deserialize it.
pub fn decode_record<T: DeserializeOwned + FlowSchema>(value: Value) -> Result<T, FlowError> {
    let schema = T::schema();
    schema.validate(&value)?;
    serde_json::from_value(value)
        .map_err(|error| FlowError::schema_mismatch(schema.name, "$", error.to_string()))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_fields(
    schema: &str,
    prefix: &str,
    fields: &[Field],
    map: &Map<String, Value>,
) -> Result<(), FlowError> {
    for field in fields {
        let path = join_path(prefix, field.name);
        match map.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(FlowError::schema_mismatch(
                        schema,
                        path,
                        "required field is missing",
                    ));
                }
            }
            Some(value) => {
                validate_kind(schema, &path, &field.kind, value)?;
                if let (Some(format), Value::String(text)) = (field.format, value) {
                    if !format.accepts(text) {
                        return Err(FlowError::schema_mismatch(
                            schema,
                            path,
                            format!("`{text}` is not a valid {}", format.as_str()),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_kind(schema: &str, path: &str, kind: &FieldKind, value: &Value) -> Result<(), FlowError> {
    let matches = match (kind, value) {
        (FieldKind::String, Value::String(_))
        | (FieldKind::Number, Value::Number(_))
        | (FieldKind::Boolean, Value::Bool(_)) => true,
        (FieldKind::Integer, Value::Number(number)) => number.is_i64() || number.is_u64(),
        (FieldKind::Enum(values), Value::String(text)) => {
            if !values.contains(&text.as_str()) {
                return Err(FlowError::schema_mismatch(
                    schema,
                    path,
                    format!("`{text}` is not one of {}", values.join(", ")),
                ));
            }
            true
        }
        (FieldKind::Array { items, .. }, Value::Array(elements)) => {
            for (index, element) in elements.iter().enumerate() {
                validate_kind(schema, &format!("{path}[{index}]"), items, element)?;
            }
            true
        }
        (FieldKind::Object(fields), Value::Object(map)) => {
            validate_fields(schema, path, fields, map)?;
            true
        }
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(FlowError::schema_mismatch(
            schema,
            path,
            format!("expected {}, found {}", kind.describe(), describe_value(value)),
        ))
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn kind_json_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String => json!({ "type": "string" }),
        FieldKind::Number => json!({ "type": "number" }),
        FieldKind::Integer => json!({ "type": "integer" }),
        FieldKind::Boolean => json!({ "type": "boolean" }),
        FieldKind::Enum(values) => json!({ "type": "string", "enum": values }),
        FieldKind::Object(fields) => object_json_schema(fields),
        FieldKind::Array {
            items,
            min_items,
            max_items,
        } => {
            let mut schema = json!({ "type": "array", "items": kind_json_schema(items) });
            if let Some(min_items) = min_items {
                schema["minItems"] = json!(min_items);
            }
            if let Some(max_items) = max_items {
                schema["maxItems"] = json!(max_items);
            }
            schema
        }
    }
}

fn object_json_schema(fields: &[Field]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let mut property = kind_json_schema(&field.kind);
        if !field.description.is_empty() {
            property["description"] = json!(field.description);
        }
        if let Some(format) = field.format {
            property["format"] = json!(format.as_str());
        }
        properties.insert(field.name.to_string(), property);
    }

    let required: Vec<&str> = fields
        .iter()
        .filter(|field| field.required)
        .map(|field| field.name)
        .collect();
    let ordering: Vec<&str> = fields.iter().map(|field| field.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "propertyOrdering": ordering,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_schema() -> ObjectSchema {
        ObjectSchema::new(
            "Quiz",
            "A quiz",
            vec![
                Field::string("title", "Quiz title"),
                Field::integer("level", "").optional(),
                Field::enumeration("difficulty", vec!["easy", "hard"], "").optional(),
                Field::array(
                    "questions",
                    FieldKind::Object(vec![
                        Field::string("question", ""),
                        Field::array("options", FieldKind::String, ""),
                    ]),
                    "",
                )
                .items_between(1, 3),
            ],
        )
    }

    fn path_of(error: FlowError) -> String {
        match error {
            FlowError::SchemaMismatch { path, .. } => path,
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn accepts_conforming_value() {
        let value = json!({
            "title": "Closures",
            "difficulty": "easy",
            "questions": [{ "question": "q", "options": ["a", "b", "c"] }]
        });
        quiz_schema().validate(&value).unwrap();
    }

    #[test]
    fn missing_required_field() {
        let error = quiz_schema()
            .validate(&json!({ "questions": [] }))
            .unwrap_err();
        assert_eq!(path_of(error), "title");
    }

    #[test]
    fn null_counts_as_missing() {
        let error = quiz_schema()
            .validate(&json!({ "title": null, "questions": [] }))
            .unwrap_err();
        assert_eq!(path_of(error), "title");

        // Optional fields may be null.
        quiz_schema()
            .validate(&json!({ "title": "t", "level": null, "questions": [] }))
            .unwrap();
    }

    #[test]
    fn wrong_kind() {
        let error = quiz_schema()
            .validate(&json!({ "title": 42, "questions": [] }))
            .unwrap_err();
        let FlowError::SchemaMismatch {
            schema,
            path,
            reason,
        } = error
        else {
            panic!("expected schema mismatch");
        };
        assert_eq!(schema, "Quiz");
        assert_eq!(path, "title");
        assert_eq!(reason, "expected a string, found a number");
    }

    #[test]
    fn integer_rejects_fractions() {
        let error = quiz_schema()
            .validate(&json!({ "title": "t", "level": 1.5, "questions": [] }))
            .unwrap_err();
        assert_eq!(path_of(error), "level");
    }

    #[test]
    fn nested_array_item_mismatch() {
        let error = quiz_schema()
            .validate(&json!({
                "title": "t",
                "questions": [
                    { "question": "q1", "options": ["a"] },
                    { "question": "q2", "options": ["a", 7] }
                ]
            }))
            .unwrap_err();
        assert_eq!(path_of(error), "questions[1].options[1]");
    }

    #[test]
    fn enum_membership() {
        let error = quiz_schema()
            .validate(&json!({ "title": "t", "difficulty": "medium", "questions": [] }))
            .unwrap_err();
        assert_eq!(path_of(error), "difficulty");
    }

    #[test]
    fn string_formats() {
        let schema = ObjectSchema::new(
            "QuizRequest",
            "",
            vec![
                Field::string("videoUrl", "").with_format(StringFormat::Uri),
                Field::string("topicId", "").with_format(StringFormat::Uuid),
            ],
        );
        schema
            .validate(&json!({
                "videoUrl": "https://youtu.be/ABC123",
                "topicId": "6f1c1d7e-3c7b-4b5e-9a59-0d7d4c1f2a10"
            }))
            .unwrap();

        let error = schema
            .validate(&json!({
                "videoUrl": "https://youtu.be/ABC123",
                "topicId": "topic-1"
            }))
            .unwrap_err();
        assert_eq!(path_of(error), "topicId");
    }

    #[test]
    fn rejects_non_object_root() {
        let error = quiz_schema().validate(&json!(["a"])).unwrap_err();
        assert_eq!(path_of(error), "$");
    }

    #[test]
    fn renders_json_schema() {
        assert_eq!(
            quiz_schema().to_json_schema(),
            json!({
                "type": "object",
                "description": "A quiz",
                "properties": {
                    "title": { "type": "string", "description": "Quiz title" },
                    "level": { "type": "integer" },
                    "difficulty": { "type": "string", "enum": ["easy", "hard"] },
                    "questions": {
                        "type": "array",
                        "minItems": 1,
                        "maxItems": 3,
                        "items": {
                            "type": "object",
                            "properties": {
                                "question": { "type": "string" },
                                "options": { "type": "array", "items": { "type": "string" } }
                            },
                            "required": ["question", "options"],
                            "propertyOrdering": ["question", "options"]
                        }
                    }
                },
                "required": ["title", "questions"],
                "propertyOrdering": ["title", "level", "difficulty", "questions"]
            })
        );
    }
}
