//! Schema definition for the three persisted relations.

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use rusqlite::Connection;

use crate::ingest::IngestError;

/// Schema shipped with the crate.
pub const SCHEMA: &str = include_str!("schema.sql");

/// Where the import reads its schema definition from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SchemaSource {
    #[default]
    Bundled,
    File(PathBuf),
}

impl SchemaSource {
    pub fn load(&self) -> Result<Cow<'static, str>, IngestError> {
        match self {
            Self::Bundled => Ok(Cow::Borrowed(SCHEMA)),
            Self::File(path) => match std::fs::read_to_string(path) {
                Ok(sql) => Ok(Cow::Owned(sql)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(IngestError::SchemaMissing(path.clone()))
                }
                Err(source) => Err(IngestError::Io {
                    path: path.clone(),
                    source,
                }),
            },
        }
    }
}

/// Drop and recreate every table.
pub fn apply(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    conn.execute_batch(sql)
}
