//! Type definitions for qplay
//!
//! This module provides type-safe wrappers around primitive types and the
//! small vocabulary shared by the evaluator, the coordinator and the store.

use crate::error::Error;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A type-safe wrapper for history entry IDs
///
/// IDs are assigned by the store at insertion time and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl EntryId {
    /// Create a new EntryId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<EntryId> for i64 {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for EntryId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for EntryId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(EntryId::new)
    }
}

/// History category; each one is persisted in its own table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Queries,
    Templates,
}

impl HistoryKind {
    pub const ALL: [HistoryKind; 2] = [HistoryKind::Queries, HistoryKind::Templates];

    pub(crate) fn table(self) -> &'static str {
        match self {
            HistoryKind::Queries => "query_history",
            HistoryKind::Templates => "template_history",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryKind::Queries => f.write_str("queries"),
            HistoryKind::Templates => f.write_str("templates"),
        }
    }
}

/// Serialization kind of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Json,
    Yaml,
    #[serde(alias = "query-language")]
    #[value(alias = "query-language")]
    Query,
    Template,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Json => "json",
            DocumentKind::Yaml => "yaml",
            DocumentKind::Query => "query",
            DocumentKind::Template => "template",
        }
    }

    /// History table that text of this kind is recorded into
    pub fn history_kind(self) -> HistoryKind {
        match self {
            DocumentKind::Template => HistoryKind::Templates,
            _ => HistoryKind::Queries,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(DocumentKind::Json),
            "yaml" | "yml" => Ok(DocumentKind::Yaml),
            "query" | "query-language" => Ok(DocumentKind::Query),
            "template" => Ok(DocumentKind::Template),
            _ => Err(Error::UnknownDocumentKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// A document paired with the kind it is serialized as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDocument {
    pub content: String,
    pub kind: DocumentKind,
}

impl TypedDocument {
    pub fn new(content: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            content: content.into(),
            kind,
        }
    }

    pub fn json(content: impl Into<String>) -> Self {
        Self::new(content, DocumentKind::Json)
    }
}
