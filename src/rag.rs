//! Retrieval-augmented generation orchestrator.
//!
//! Ties together document ingestion, the vector store, the search tool, the
//! response generator and session history behind one `RagSystem` facade that
//! the HTTP handlers call.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::errors::ApiError;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::ingest::DocumentProcessor;
use crate::llm::{AnthropicProvider, LlmProvider, ResponseGenerator};
use crate::models::Course;
use crate::session::SessionStore;
use crate::store::VectorStore;
use crate::tools::{CourseSearchTool, ToolManager};

pub struct RagSystem {
    processor: DocumentProcessor,
    store: Arc<VectorStore>,
    generator: ResponseGenerator,
    sessions: SessionStore,
    tool_manager: ToolManager,
}

impl RagSystem {
    pub async fn new(config: &Config) -> Result<Self, ApiError> {
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(
            &config.embedding_base_url,
            &config.embedding_model,
        ));
        let provider: Arc<dyn LlmProvider> = Arc::new(AnthropicProvider::new(
            &config.anthropic_api_key,
            &config.anthropic_model,
        ));
        Self::with_components(config, embedder, provider).await
    }

    /// Builds the system with injected embedding and model backends.
    pub async fn with_components(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ApiError> {
        std::fs::create_dir_all(&config.data_dir).map_err(ApiError::internal)?;

        let store = Arc::new(
            VectorStore::new(
                config.data_dir.join("courses.db"),
                embedder,
                config.max_results,
            )
            .await?,
        );
        let sessions =
            SessionStore::new(config.data_dir.join("sessions.db"), config.max_history).await?;

        let mut tool_manager = ToolManager::new();
        tool_manager.register_tool(Arc::new(CourseSearchTool::new(store.clone())))?;

        Ok(Self {
            processor: DocumentProcessor::new(config.chunk_size, config.chunk_overlap),
            store,
            generator: ResponseGenerator::new(provider),
            sessions,
            tool_manager,
        })
    }

    /// Answers one user query, optionally inside a session. Returns the
    /// answer together with the sources the search tool touched.
    pub async fn query(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<(String, Vec<String>), ApiError> {
        let prompt = format!("Answer this question about course materials: {}", query);

        let history = match session_id {
            Some(id) => self.sessions.get_conversation_history(id).await?,
            None => None,
        };

        let answer = self
            .generator
            .generate_response(&prompt, history.as_deref(), Some(&self.tool_manager))
            .await?;

        let sources = self.tool_manager.get_last_sources();
        self.tool_manager.reset_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer).await?;
        }

        Ok((answer, sources))
    }

    pub async fn create_session(&self) -> Result<String, ApiError> {
        self.sessions.create_session().await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.sessions.clear_session(session_id).await
    }

    /// Ingests a single course transcript, returning the parsed course and
    /// the number of chunks stored.
    pub async fn add_course_document(&self, path: &Path) -> Result<(Course, usize), ApiError> {
        let (course, chunks) = self.processor.process_course_document(path)?;
        self.store.add_course_metadata(&course).await?;
        self.store.add_course_content(&chunks).await?;
        Ok((course, chunks.len()))
    }

    /// Ingests every transcript in a folder, skipping courses already in the
    /// catalog. Returns (courses added, chunks added). Individual bad files
    /// are logged and skipped rather than aborting the run.
    pub async fn add_course_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<(usize, usize), ApiError> {
        if clear_existing {
            info!("Clearing existing data for rebuild");
            self.store.clear_all_data().await;
        }

        if !folder.is_dir() {
            warn!("Documents folder {} does not exist", folder.display());
            return Ok((0, 0));
        }

        let existing: HashSet<String> = self
            .store
            .get_existing_course_titles()
            .await
            .into_iter()
            .collect();

        let mut paths: Vec<_> = std::fs::read_dir(folder)
            .map_err(ApiError::internal)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "txt" | "pdf" | "docx")
                    })
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut total_courses = 0;
        let mut total_chunks = 0;

        for path in paths {
            let (course, chunks) = match self.processor.process_course_document(&path) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("Skipping {}: {}", path.display(), err);
                    continue;
                }
            };

            if existing.contains(&course.title) {
                continue;
            }

            self.store.add_course_metadata(&course).await?;
            self.store.add_course_content(&chunks).await?;
            info!("Added course '{}' ({} chunks)", course.title, chunks.len());

            total_courses += 1;
            total_chunks += chunks.len();
        }

        Ok((total_courses, total_chunks))
    }

    pub async fn get_course_analytics(&self) -> Value {
        json!({
            "total_courses": self.store.get_course_count().await,
            "course_titles": self.store.get_existing_course_titles().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::test_support::HashEmbedder;
    use crate::llm::types::{ContentBlock, MessagesRequest, ModelResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<ModelResponse>>,
        requests: Mutex<Vec<MessagesRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn messages(&self, request: &MessagesRequest) -> Result<ModelResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ApiError::Internal("script exhausted".to_string()));
            }
            Ok(responses.remove(0))
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            stop_reason: Some("end_turn".to_string()),
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }

    fn test_config() -> (Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            docs_dir: dir.path().join("docs"),
            ..Config::default()
        };
        (config, dir)
    }

    async fn test_system(responses: Vec<ModelResponse>) -> (RagSystem, tempfile::TempDir) {
        let (config, dir) = test_config();
        let system = RagSystem::with_components(
            &config,
            Arc::new(HashEmbedder),
            ScriptedProvider::new(responses),
        )
        .await
        .unwrap();
        (system, dir)
    }

    const SAMPLE_DOC: &str = "Course Title: Python Programming Fundamentals\n\
Course Link: https://example.com/course\n\
Course Instructor: John Doe\n\
\n\
Lesson 1: Introduction\n\
Python is a high-level programming language. It is widely used.\n";

    #[tokio::test]
    async fn query_without_session_skips_history() {
        let (system, _dir) = test_system(vec![text_response("Direct answer")]).await;

        let (answer, sources) = system.query("What is Python?", None).await.unwrap();
        assert_eq!(answer, "Direct answer");
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn query_prompt_wraps_user_question() {
        let provider = ScriptedProvider::new(vec![text_response("ok")]);
        let (config, _dir) = test_config();
        let system =
            RagSystem::with_components(&config, Arc::new(HashEmbedder), provider.clone())
                .await
                .unwrap();

        system.query("What is Python?", None).await.unwrap();

        let requests = provider.requests.lock().unwrap();
        match &requests[0].messages[0].content[0] {
            ContentBlock::Text { text } => assert_eq!(
                text,
                "Answer this question about course materials: What is Python?"
            ),
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[tokio::test]
    async fn session_history_reaches_the_second_query() {
        let provider = ScriptedProvider::new(vec![
            text_response("First answer"),
            text_response("Second answer"),
        ]);
        let (config, _dir) = test_config();
        let system =
            RagSystem::with_components(&config, Arc::new(HashEmbedder), provider.clone())
                .await
                .unwrap();

        let session = system.create_session().await.unwrap();
        system.query("First question", Some(&session)).await.unwrap();
        system.query("Second question", Some(&session)).await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert!(!requests[0].system.contains("Previous conversation"));
        assert!(requests[1].system.contains("Previous conversation:"));
        assert!(requests[1].system.contains("User: First question"));
        assert!(requests[1].system.contains("Assistant: First answer"));
    }

    #[tokio::test]
    async fn search_sources_are_returned_then_reset() {
        let (system, dir) = test_system(vec![
            ModelResponse {
                stop_reason: Some("tool_use".to_string()),
                content: vec![ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "search_course_content".to_string(),
                    input: serde_json::json!({ "query": "Python programming" }),
                }],
            },
            text_response("Grounded answer"),
        ])
        .await;

        let doc = dir.path().join("course1.txt");
        std::fs::write(&doc, SAMPLE_DOC).unwrap();
        system.add_course_document(&doc).await.unwrap();

        let (answer, sources) = system.query("tell me about Python", None).await.unwrap();
        assert_eq!(answer, "Grounded answer");
        assert_eq!(
            sources,
            vec!["Python Programming Fundamentals - Lesson 1".to_string()]
        );

        // A second query that never searches must not inherit old sources.
        assert!(system.tool_manager.get_last_sources().is_empty());
    }

    #[tokio::test]
    async fn folder_ingestion_skips_existing_courses() {
        let (system, dir) = test_system(Vec::new()).await;

        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("course1.txt"), SAMPLE_DOC).unwrap();
        std::fs::write(docs.join("notes.md"), "not a transcript").unwrap();

        let (courses, chunks) = system.add_course_folder(&docs, false).await.unwrap();
        assert_eq!(courses, 1);
        assert!(chunks > 0);

        // Re-running adds nothing.
        let (courses, chunks) = system.add_course_folder(&docs, false).await.unwrap();
        assert_eq!(courses, 0);
        assert_eq!(chunks, 0);

        let analytics = system.get_course_analytics().await;
        assert_eq!(analytics["total_courses"], 1);
        assert_eq!(
            analytics["course_titles"],
            serde_json::json!(["Python Programming Fundamentals"])
        );
    }

    #[tokio::test]
    async fn clear_existing_rebuilds_the_catalog() {
        let (system, dir) = test_system(Vec::new()).await;

        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("course1.txt"), SAMPLE_DOC).unwrap();

        system.add_course_folder(&docs, false).await.unwrap();
        let (courses, _) = system.add_course_folder(&docs, true).await.unwrap();
        assert_eq!(courses, 1, "cleared catalog re-ingests everything");
    }

    #[tokio::test]
    async fn missing_folder_is_not_an_error() {
        let (system, dir) = test_system(Vec::new()).await;
        let missing = dir.path().join("nope");

        let (courses, chunks) = system.add_course_folder(&missing, false).await.unwrap();
        assert_eq!((courses, chunks), (0, 0));
    }
}
