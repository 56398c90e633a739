//! The fixed schema of the subscription platform database.

use super::{BsonType, CollectionSpec, DatabaseSchema, IndexSpec, JsonSchema};

pub const DATABASE_NAME: &str = "subscription_platform";

pub const TENANTS: &str = "tenants";
pub const USERS: &str = "users";
pub const PLANS: &str = "plans";
pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const INVOICES: &str = "invoices";
pub const PAYMENTS: &str = "payments";
pub const USAGE: &str = "usage";
pub const WEBHOOK_LOGS: &str = "webhooklogs";

pub const ALL_COLLECTIONS: &[&str] = &[
    TENANTS,
    USERS,
    PLANS,
    SUBSCRIPTIONS,
    INVOICES,
    PAYMENTS,
    USAGE,
    WEBHOOK_LOGS,
];

pub fn tenant_validator() -> JsonSchema {
    JsonSchema::new()
        .required("name", BsonType::String)
        .required("slug", BsonType::String)
        .property("domain", BsonType::String)
        .property("stripeAccountId", BsonType::String)
        .property("branding", BsonType::Object)
        .property("settings", BsonType::Object)
        .required("createdAt", BsonType::Date)
}

/// Builds the platform schema under the given database name.
pub fn platform_schema_named(database: &str) -> DatabaseSchema {
    DatabaseSchema::new(database)
        .collection(
            CollectionSpec::new(TENANTS)
                .validator(tenant_validator())
                .index(IndexSpec::asc("slug").unique())
                .index(IndexSpec::asc("domain").unique().sparse()),
        )
        .collection(
            CollectionSpec::new(USERS)
                .index(IndexSpec::asc("email").then_asc("tenantId").unique())
                .index(IndexSpec::asc("tenantId"))
                .index(IndexSpec::desc("createdAt")),
        )
        .collection(
            CollectionSpec::new(PLANS)
                .index(IndexSpec::asc("tenantId"))
                .index(IndexSpec::asc("stripePriceId").unique().sparse())
                .index(IndexSpec::asc("isActive")),
        )
        .collection(
            CollectionSpec::new(SUBSCRIPTIONS)
                .index(IndexSpec::asc("userId"))
                .index(IndexSpec::asc("tenantId"))
                .index(IndexSpec::asc("stripeSubscriptionId").unique().sparse())
                .index(IndexSpec::asc("status"))
                .index(IndexSpec::asc("currentPeriodEnd")),
        )
        .collection(
            CollectionSpec::new(INVOICES)
                .index(IndexSpec::asc("userId"))
                .index(IndexSpec::asc("tenantId"))
                .index(IndexSpec::asc("stripeInvoiceId").unique().sparse())
                .index(IndexSpec::desc("createdAt")),
        )
        .collection(
            CollectionSpec::new(PAYMENTS)
                .index(IndexSpec::asc("userId"))
                .index(IndexSpec::asc("invoiceId"))
                .index(IndexSpec::asc("status"))
                .index(IndexSpec::desc("createdAt")),
        )
        .collection(
            CollectionSpec::new(USAGE)
                .index(
                    IndexSpec::asc("userId")
                        .then_asc("subscriptionId")
                        .then_asc("metricName")
                        .then_desc("timestamp"),
                )
                .index(IndexSpec::asc("tenantId").then_desc("timestamp")),
        )
        .collection(
            CollectionSpec::new(WEBHOOK_LOGS)
                .index(IndexSpec::desc("createdAt"))
                .index(IndexSpec::asc("source").then_asc("status")),
        )
}

pub fn platform_schema() -> DatabaseSchema {
    platform_schema_named(DATABASE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declares_every_collection_once_in_order() {
        let schema = platform_schema();
        let names: Vec<&str> = schema.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ALL_COLLECTIONS);
        assert_eq!(schema.name, "subscription_platform");
    }

    #[test]
    fn test_only_tenants_validated() {
        let schema = platform_schema();
        for collection in &schema.collections {
            assert_eq!(collection.validator.is_some(), collection.name == TENANTS);
        }
        let validator = schema.get(TENANTS).unwrap().validator.as_ref().unwrap();
        assert_eq!(validator.required, vec!["name", "slug", "createdAt"]);
    }

    #[test]
    fn test_unique_indexes() {
        let schema = platform_schema();
        let unique: Vec<(String, String, bool)> = schema
            .collections
            .iter()
            .flat_map(|c| {
                c.indexes
                    .iter()
                    .filter(|i| i.unique)
                    .map(move |i| (c.name.clone(), i.name(), i.sparse))
            })
            .collect();

        assert_eq!(
            unique,
            vec![
                ("tenants".into(), "slug_1".into(), false),
                ("tenants".into(), "domain_1".into(), true),
                ("users".into(), "email_1_tenantId_1".into(), false),
                ("plans".into(), "stripePriceId_1".into(), true),
                ("subscriptions".into(), "stripeSubscriptionId_1".into(), true),
                ("invoices".into(), "stripeInvoiceId_1".into(), true),
            ]
        );
    }

    #[test]
    fn test_index_count() {
        assert_eq!(platform_schema().index_count(), 25);
    }

    #[test]
    fn test_custom_database_name() {
        let schema = platform_schema_named("staging_platform");
        assert_eq!(schema.name, "staging_platform");
        assert_eq!(schema.collections.len(), ALL_COLLECTIONS.len());
    }
}
