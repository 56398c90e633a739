use serde_json::{json, Map, Value};

use super::bson::{BsonType, DATE_KEY, DATE_PATTERN};

/// Shape check applied to every document written to a collection.
///
/// Only the subset the platform needs: the document must be an object, the
/// required fields must be present, and listed properties must carry their
/// declared type when present. Unlisted properties are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchema {
    pub required: Vec<String>,
    pub properties: Vec<(String, BsonType)>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("document must be an object, got {0}")]
    NotAnObject(BsonType),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: BsonType,
        actual: BsonType,
    },
}

impl JsonSchema {
    pub fn new() -> Self {
        Self {
            required: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn required(mut self, field: &str, bson_type: BsonType) -> Self {
        self.required.push(field.to_string());
        self.property(field, bson_type)
    }

    pub fn property(mut self, field: &str, bson_type: BsonType) -> Self {
        self.properties.push((field.to_string(), bson_type));
        self
    }

    pub fn validate(&self, doc: &Value) -> Result<(), ValidationError> {
        let map = match doc {
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(BsonType::of(other))),
        };

        for field in &self.required {
            if !map.contains_key(field) {
                return Err(ValidationError::MissingField(field.clone()));
            }
        }

        for (field, expected) in &self.properties {
            if let Some(value) = map.get(field) {
                let actual = BsonType::of(value);
                if actual != *expected {
                    return Err(ValidationError::WrongType {
                        field: field.clone(),
                        expected: *expected,
                        actual,
                    });
                }
            }
        }

        Ok(())
    }

    /// The `$jsonSchema` document form of this validator.
    pub fn to_document(&self) -> Value {
        let mut properties = Map::new();
        for (field, bson_type) in &self.properties {
            properties.insert(field.clone(), json!({ "bsonType": bson_type.as_str() }));
        }
        json!({
            "$jsonSchema": {
                "bsonType": "object",
                "required": self.required,
                "properties": properties,
            }
        })
    }

    /// Renders a Postgres CHECK expression over a JSONB column mirroring
    /// `validate`.
    pub fn check_constraint(&self, column: &str) -> String {
        let mut clauses = vec![format!("jsonb_typeof({column}) = 'object'")];

        for field in &self.required {
            clauses.push(format!("{column} ? {}", quote_literal(field)));
        }

        for (field, bson_type) in &self.properties {
            let key = quote_literal(field);
            let value = format!("{column}->{key}");
            let base = format!("jsonb_typeof({value}) = '{}'", bson_type.jsonb_type());
            let type_check = match bson_type {
                BsonType::Date => format!("{base} AND {}", date_expr(&value)),
                BsonType::Object => format!("{base} AND NOT {}", date_expr(&value)),
                _ => base,
            };
            clauses.push(format!("(NOT ({column} ? {key}) OR ({type_check}))"));
        }

        clauses.join(" AND ")
    }
}

impl Default for JsonSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// SQL form of `bson::is_date` for a JSONB object expression: the only key is
/// `$date` and it holds a string of the date shape.
fn date_expr(value: &str) -> String {
    format!(
        "({value} ? '{DATE_KEY}' AND ({value}) - '{DATE_KEY}' = '{{}}'::jsonb \
         AND jsonb_typeof({value}->'{DATE_KEY}') = 'string' \
         AND ({value}->>'{DATE_KEY}') ~ {})",
        quote_literal(DATE_PATTERN)
    )
}

/// Quotes a string as a SQL literal.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
