pub mod bson;
pub mod index;
pub mod platform;
pub mod validator;

pub use bson::BsonType;
pub use index::{Direction, IndexSpec};
pub use platform::platform_schema;
pub use validator::{JsonSchema, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: String,
    pub validator: Option<JsonSchema>,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            validator: None,
            indexes: Vec::new(),
        }
    }

    pub fn validator(mut self, schema: JsonSchema) -> Self {
        self.validator = Some(schema);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A named database and the collections declared in it, in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSchema {
    pub name: String,
    pub collections: Vec<CollectionSpec>,
}

impl DatabaseSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collections: Vec::new(),
        }
    }

    pub fn collection(mut self, collection: CollectionSpec) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn index_count(&self) -> usize {
        self.collections.iter().map(|c| c.indexes.len()).sum()
    }
}
