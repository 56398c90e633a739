pub mod config;
pub mod db;
pub mod error;
pub mod init;
pub mod schema;
pub mod store;

pub use error::{InitError, InitResult};
pub use init::{initialize, render_plan, InitReport};
pub use schema::{platform_schema, DatabaseSchema};
pub use store::{DocumentStore, MemoryStore, PgStore};
