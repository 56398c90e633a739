use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_i32(&self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub keys: Vec<(String, Direction)>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            keys: vec![(field.to_string(), Direction::Ascending)],
            unique: false,
            sparse: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            keys: vec![(field.to_string(), Direction::Descending)],
            unique: false,
            sparse: false,
        }
    }

    pub fn then_asc(mut self, field: &str) -> Self {
        self.keys.push((field.to_string(), Direction::Ascending));
        self
    }

    pub fn then_desc(mut self, field: &str) -> Self {
        self.keys.push((field.to_string(), Direction::Descending));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Default index name, e.g. `email_1_tenantId_1` or `createdAt_-1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, dir)| format!("{}_{}", field, dir.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(field, _)| field.as_str())
    }

    /// True when both specs index the same keys with the same options.
    pub fn same_options(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys && self.unique == other.unique && self.sparse == other.sparse
    }

    /// The index key a document contributes, or `None` when a sparse index
    /// skips the document. A sparse index skips documents where every key
    /// field is absent or null; otherwise absent fields read as null.
    pub fn key_of(&self, doc: &Value) -> Option<Vec<Value>> {
        let key: Vec<Value> = self
            .fields()
            .map(|field| doc.get(field).map(normalize).unwrap_or(Value::Null))
            .collect();

        if self.sparse && key.iter().all(Value::is_null) {
            return None;
        }
        Some(key)
    }

    /// Key pattern document, e.g. `{"email": 1, "tenantId": 1}`.
    pub fn key_document(&self) -> Value {
        let mut map = Map::new();
        for (field, dir) in &self.keys {
            map.insert(field.clone(), json!(dir.as_i32()));
        }
        Value::Object(map)
    }
}

/// Canonical form for key comparison. Numbers compare by value, so `1` and
/// `1.0` are the same key, as they are in a JSONB index.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

impl std::fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        if self.unique {
            write!(f, " unique")?;
        }
        if self.sparse {
            write!(f, " sparse")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        assert_eq!(IndexSpec::asc("slug").name(), "slug_1");
        assert_eq!(IndexSpec::desc("createdAt").name(), "createdAt_-1");
        assert_eq!(
            IndexSpec::asc("email").then_asc("tenantId").name(),
            "email_1_tenantId_1"
        );
        assert_eq!(
            IndexSpec::asc("tenantId").then_desc("timestamp").name(),
            "tenantId_1_timestamp_-1"
        );
    }

    #[test]
    fn test_key_of_missing_reads_null() {
        let index = IndexSpec::asc("email").then_asc("tenantId").unique();
        assert_eq!(
            index.key_of(&json!({ "tenantId": "t1" })),
            Some(vec![Value::Null, json!("t1")])
        );
    }

    #[test]
    fn test_sparse_skips_absent_and_null() {
        let index = IndexSpec::asc("domain").unique().sparse();
        assert_eq!(index.key_of(&json!({ "slug": "a" })), None);
        assert_eq!(index.key_of(&json!({ "domain": null })), None);
        assert_eq!(
            index.key_of(&json!({ "domain": "acme.io" })),
            Some(vec![json!("acme.io")])
        );
    }

    #[test]
    fn test_key_of_compares_numbers_by_value() {
        let index = IndexSpec::asc("stripePriceId").unique().sparse();
        assert_eq!(
            index.key_of(&json!({ "stripePriceId": 1 })),
            index.key_of(&json!({ "stripePriceId": 1.0 }))
        );
        assert_ne!(
            index.key_of(&json!({ "stripePriceId": 1 })),
            index.key_of(&json!({ "stripePriceId": 1.5 }))
        );
        assert_eq!(
            normalize(&json!({ "tiers": [2.0, { "n": -3.0 }] })),
            json!({ "tiers": [2, { "n": -3 }] })
        );
    }

    #[test]
    fn test_same_options() {
        let a = IndexSpec::asc("slug").unique();
        assert!(a.same_options(&IndexSpec::asc("slug").unique()));
        assert!(!a.same_options(&IndexSpec::asc("slug")));
        assert!(!a.same_options(&IndexSpec::desc("slug").unique()));
    }

    #[test]
    fn test_key_document_and_display() {
        let index = IndexSpec::asc("source").then_asc("status");
        assert_eq!(index.key_document(), json!({ "source": 1, "status": 1 }));
        assert_eq!(
            IndexSpec::asc("domain").unique().sparse().to_string(),
            "domain_1 unique sparse"
        );
    }
}
