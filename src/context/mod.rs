pub mod lsh;
pub mod mschema;
pub mod retriever;

pub use lsh::LshIndex;
pub use mschema::{ColumnSchema, ForeignKey, SchemaCatalog, TableSchema};
pub use retriever::{ContextRetriever, RetrievedContext};
