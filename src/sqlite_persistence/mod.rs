//! Declarative SQLite schema definitions with versioning.
//!
//! Stores describe their tables as constants, create them on first open and
//! validate or migrate them on subsequent opens, keyed off `PRAGMA user_version`.

mod versioned_schema;

pub use versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};
