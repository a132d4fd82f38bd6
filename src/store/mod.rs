//! Course vector store.
//!
//! Two collections live in one SQLite database: a course catalog (one row
//! per course, lessons serialized as JSON, title embedded for fuzzy name
//! resolution) and the course content chunks with their embeddings.

mod sqlite;

pub use sqlite::VectorStore;

use serde::{Deserialize, Serialize};

/// Metadata stored alongside each content chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: Option<String>,
    pub lesson_number: Option<i64>,
    pub chunk_index: Option<i64>,
}

/// Container for semantic search results. Errors are carried in-band so the
/// search tool can surface them to the model as plain text.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
