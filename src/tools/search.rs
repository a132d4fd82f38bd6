use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::core::errors::ApiError;
use crate::store::{SearchResults, VectorStore};

/// Semantic search over course content, exposed to the model as
/// `search_course_content`.
pub struct CourseSearchTool {
    store: Arc<VectorStore>,
    last_sources: Mutex<Vec<String>>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            last_sources: Mutex::new(Vec::new()),
        }
    }

    fn format_results(&self, results: &SearchResults) -> String {
        let mut formatted = Vec::new();
        let mut sources = Vec::new();

        for (i, document) in results.documents.iter().enumerate() {
            let metadata = results.metadata.get(i).cloned().unwrap_or_default();
            let course_title = metadata
                .course_title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "unknown".to_string());

            let label = match metadata.lesson_number {
                Some(n) => format!("{} - Lesson {}", course_title, n),
                None => course_title,
            };

            formatted.push(format!("[{}]\n{}", label, document));
            sources.push(label);
        }

        *self.last_sources.lock().expect("sources lock") = sources;
        formatted.join("\n\n")
    }

    fn empty_message(course_name: Option<&str>, lesson_number: Option<i64>) -> String {
        let mut message = String::from("No relevant content found");
        if let Some(course) = course_name {
            message.push_str(&format!(" in course '{}'", course));
        }
        if let Some(lesson) = lesson_number {
            message.push_str(&format!(" in lesson {}", lesson));
        }
        message.push('.');
        message
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> Value {
        json!({
            "name": "search_course_content",
            "description": "Search course materials with smart course name matching and lesson filtering",
            "input_schema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }
        })
    }

    async fn execute(&self, args: &Value) -> Result<String, ApiError> {
        let Some(query) = args["query"].as_str() else {
            return Ok("Search error: 'query' parameter is required".to_string());
        };
        let course_name = args["course_name"].as_str();
        let lesson_number = args["lesson_number"].as_i64();

        let results = self.store.search(query, course_name, lesson_number, None).await;

        if let Some(error) = results.error {
            self.reset_sources();
            return Ok(error);
        }

        if results.is_empty() {
            self.reset_sources();
            return Ok(Self::empty_message(course_name, lesson_number));
        }

        Ok(self.format_results(&results))
    }

    fn last_sources(&self) -> Vec<String> {
        self.last_sources.lock().expect("sources lock").clone()
    }

    fn reset_sources(&self) {
        self.last_sources.lock().expect("sources lock").clear();
    }
}
