use serde::{Deserialize, Serialize};

/// A single lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

/// A course parsed from a transcript document. The title doubles as the
/// catalog identifier, so it must be unique across the document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A chunk of lesson text ready for embedding and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: i64,
}
