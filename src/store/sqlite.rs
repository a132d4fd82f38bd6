use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{ChunkMetadata, SearchResults};
use crate::core::errors::ApiError;
use crate::embedding::Embedder;
use crate::models::{Course, CourseChunk};

pub struct VectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct SearchFilter {
    course_title: Option<String>,
    lesson_number: Option<i64>,
}

impl VectorStore {
    pub async fn new(
        db_path: PathBuf,
        embedder: Arc<dyn Embedder>,
        max_results: usize,
    ) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self {
            pool,
            embedder,
            max_results,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_catalog (
                title TEXT PRIMARY KEY,
                instructor TEXT,
                course_link TEXT,
                lesson_count INTEGER NOT NULL DEFAULT 0,
                lessons_json TEXT NOT NULL DEFAULT '[]',
                embedding BLOB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_content (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                course_title TEXT NOT NULL,
                lesson_number INTEGER,
                chunk_index INTEGER NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_course ON course_content(course_title)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Semantic search over course content. Failures are reported in-band so
    /// callers never have to branch on transport errors.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<usize>,
    ) -> SearchResults {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Some(title) => Some(title),
                None => {
                    return SearchResults::empty(format!("No course found matching '{}'", name))
                }
            },
            None => None,
        };

        let filter = SearchFilter {
            course_title,
            lesson_number,
        };

        match self
            .search_inner(query, &filter, limit.unwrap_or(self.max_results))
            .await
        {
            Ok(results) => results,
            Err(err) => SearchResults::empty(format!("Search error: {}", err)),
        }
    }

    async fn search_inner(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<SearchResults, ApiError> {
        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("no query embedding returned".to_string()))?;

        let rows = match (&filter.course_title, filter.lesson_number) {
            (Some(title), Some(lesson)) => {
                sqlx::query(
                    "SELECT content, course_title, lesson_number, chunk_index, embedding
                     FROM course_content WHERE course_title = ?1 AND lesson_number = ?2",
                )
                .bind(title)
                .bind(lesson)
                .fetch_all(&self.pool)
                .await
            }
            (Some(title), None) => {
                sqlx::query(
                    "SELECT content, course_title, lesson_number, chunk_index, embedding
                     FROM course_content WHERE course_title = ?1",
                )
                .bind(title)
                .fetch_all(&self.pool)
                .await
            }
            (None, Some(lesson)) => {
                sqlx::query(
                    "SELECT content, course_title, lesson_number, chunk_index, embedding
                     FROM course_content WHERE lesson_number = ?1",
                )
                .bind(lesson)
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                sqlx::query(
                    "SELECT content, course_title, lesson_number, chunk_index, embedding
                     FROM course_content",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(ApiError::internal)?;

        let mut scored: Vec<(f32, String, ChunkMetadata)> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = deserialize_embedding(&embedding_bytes);
                let score = cosine_similarity(&query_embedding, &stored);

                let metadata = ChunkMetadata {
                    course_title: row.get("course_title"),
                    lesson_number: row.get("lesson_number"),
                    chunk_index: row.get("chunk_index"),
                };
                Some((score, row.get("content"), metadata))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(1));

        let mut results = SearchResults::default();
        for (score, content, metadata) in scored {
            results.documents.push(content);
            results.metadata.push(metadata);
            results.distances.push(1.0 - score);
        }
        Ok(results)
    }

    /// Resolves a partial course name against the catalog by embedding
    /// similarity, taking the single best match.
    pub async fn resolve_course_name(&self, name: &str) -> Option<String> {
        let name_embedding = self
            .embedder
            .embed(&[name.to_string()])
            .await
            .ok()?
            .into_iter()
            .next()?;

        let rows = sqlx::query("SELECT title, embedding FROM course_catalog")
            .fetch_all(&self.pool)
            .await
            .ok()?;

        rows.iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = deserialize_embedding(&embedding_bytes);
                let score = cosine_similarity(&name_embedding, &stored);
                Some((score, row.get::<String, _>("title")))
            })
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, title)| title)
    }

    pub async fn add_course_metadata(&self, course: &Course) -> Result<(), ApiError> {
        let embedding = self
            .embedder
            .embed(&[course.title.clone()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let lessons_json =
            serde_json::to_string(&course.lessons).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT OR REPLACE INTO course_catalog
             (title, instructor, course_link, lesson_count, lessons_json, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&course.title)
        .bind(&course.instructor)
        .bind(&course.course_link)
        .bind(course.lessons.len() as i64)
        .bind(&lessons_json)
        .bind(serialize_embedding(&embedding))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<(), ApiError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            let id = format!("{}_{}", chunk.course_title.replace(' ', "_"), chunk.chunk_index);
            sqlx::query(
                "INSERT OR REPLACE INTO course_content
                 (id, content, course_title, lesson_number, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&id)
            .bind(&chunk.content)
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number)
            .bind(chunk.chunk_index)
            .bind(serialize_embedding(embedding))
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }
        tx.commit().await.map_err(ApiError::internal)?;

        Ok(())
    }

    /// Drops both collections. Errors are logged, not propagated, so a
    /// rebuild can always proceed.
    pub async fn clear_all_data(&self) {
        for table in ["course_catalog", "course_content"] {
            if let Err(err) = sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&self.pool)
                .await
            {
                tracing::warn!("Failed to clear {}: {}", table, err);
            }
        }
    }

    pub async fn get_existing_course_titles(&self) -> Vec<String> {
        sqlx::query_scalar("SELECT title FROM course_catalog ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("Failed to list course titles: {}", err);
                Vec::new()
            })
    }

    pub async fn get_course_count(&self) -> usize {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM course_catalog")
            .fetch_one(&self.pool)
            .await
            .map(|count| count as usize)
            .unwrap_or_else(|err| {
                tracing::warn!("Failed to count courses: {}", err);
                0
            })
    }

    /// Catalog metadata for every course, lessons inlined.
    pub async fn get_all_courses_metadata(&self) -> Vec<Value> {
        let rows = match sqlx::query(
            "SELECT title, instructor, course_link, lesson_count, lessons_json
             FROM course_catalog ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!("Failed to read course catalog: {}", err);
                return Vec::new();
            }
        };

        rows.iter()
            .map(|row| {
                let lessons_json: String = row.get("lessons_json");
                let lessons: Value =
                    serde_json::from_str(&lessons_json).unwrap_or_else(|_| json!([]));
                json!({
                    "title": row.get::<String, _>("title"),
                    "instructor": row.get::<Option<String>, _>("instructor"),
                    "course_link": row.get::<Option<String>, _>("course_link"),
                    "lesson_count": row.get::<i64, _>("lesson_count"),
                    "lessons": lessons,
                })
            })
            .collect()
    }

    pub async fn get_course_link(&self, title: &str) -> Option<String> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT course_link FROM course_catalog WHERE title = ?1",
        )
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .flatten()
    }

    pub async fn get_lesson_link(&self, title: &str, lesson_number: i64) -> Option<String> {
        let lessons_json: String =
            sqlx::query_scalar("SELECT lessons_json FROM course_catalog WHERE title = ?1")
                .bind(title)
                .fetch_optional(&self.pool)
                .await
                .ok()
                .flatten()?;

        let lessons: Vec<Value> = serde_json::from_str(&lessons_json).ok()?;
        lessons
            .iter()
            .find(|lesson| lesson["lesson_number"].as_i64() == Some(lesson_number))
            .and_then(|lesson| lesson["lesson_link"].as_str())
            .map(|link| link.to_string())
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
