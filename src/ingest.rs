//! Course transcript ingestion.
//!
//! Parses the transcript layout used by the course material exports:
//!
//! ```text
//! Course Title: Building Things
//! Course Link: https://example.com/course
//! Course Instructor: Jane Doe
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/lesson0
//! <lesson text...>
//!
//! Lesson 1: ...
//! ```
//!
//! Lesson text is split into overlapping, sentence-aware chunks. Each chunk
//! is prefixed with its course and lesson so a retrieved chunk stays
//! meaningful without surrounding context.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::errors::ApiError;
use crate::models::{Course, CourseChunk, Lesson};

pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn process_course_document(
        &self,
        path: &Path,
    ) -> Result<(Course, Vec<CourseChunk>), ApiError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ApiError::BadRequest(format!("cannot read {}: {}", path.display(), e)))?;
        self.process_text(&raw, path)
    }

    fn process_text(&self, raw: &str, path: &Path) -> Result<(Course, Vec<CourseChunk>), ApiError> {
        let mut lines = raw.lines().peekable();

        let mut title = None;
        let mut course_link = None;
        let mut instructor = None;

        // Header lines precede the first lesson marker.
        while let Some(line) = lines.peek() {
            let line = line.trim();
            if lesson_header_re().is_match(line) {
                break;
            }
            if let Some(value) = line.strip_prefix("Course Title:") {
                title = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Course Link:") {
                course_link = non_empty(value);
            } else if let Some(value) = line.strip_prefix("Course Instructor:") {
                instructor = non_empty(value);
            }
            lines.next();
        }

        let title = title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest(format!("{}: missing 'Course Title:' header", path.display()))
            })?;

        let mut lessons: Vec<Lesson> = Vec::new();
        let mut lesson_texts: Vec<String> = Vec::new();
        let mut current_text = String::new();

        for line in lines {
            let trimmed = line.trim();
            if let Some(caps) = lesson_header_re().captures(trimmed) {
                if !lessons.is_empty() {
                    lesson_texts.push(std::mem::take(&mut current_text));
                }
                lessons.push(Lesson {
                    lesson_number: caps[1].parse().unwrap_or(0),
                    title: caps[2].trim().to_string(),
                    lesson_link: None,
                });
                continue;
            }
            if let Some(value) = trimmed.strip_prefix("Lesson Link:") {
                if let Some(last) = lessons.last_mut() {
                    if last.lesson_link.is_none() {
                        last.lesson_link = non_empty(value);
                        continue;
                    }
                }
            }
            if !lessons.is_empty() {
                current_text.push_str(line);
                current_text.push('\n');
            }
        }
        if !lessons.is_empty() {
            lesson_texts.push(current_text);
        }

        let course = Course {
            title: title.clone(),
            course_link,
            instructor,
            lessons,
        };

        let mut chunks = Vec::new();
        let mut chunk_index: i64 = 0;
        for (lesson, text) in course.lessons.iter().zip(lesson_texts.iter()) {
            for piece in self.split_into_chunks(text) {
                chunks.push(CourseChunk {
                    content: format!(
                        "Course {} Lesson {} content: {}",
                        title, lesson.lesson_number, piece
                    ),
                    course_title: title.clone(),
                    lesson_number: Some(lesson.lesson_number),
                    chunk_index,
                });
                chunk_index += 1;
            }
        }

        Ok((course, chunks))
    }

    /// Packs sentences into chunks of at most `chunk_size` characters, with
    /// up to `chunk_overlap` characters of trailing sentences repeated at the
    /// start of the next chunk.
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for sentence in &sentences {
            let len = sentence.chars().count();
            if current_len + len > self.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));

                // Carry trailing sentences back as overlap.
                let mut kept: Vec<&str> = Vec::new();
                let mut kept_len = 0usize;
                for prev in current.iter().rev() {
                    let prev_len = prev.chars().count();
                    if kept_len + prev_len > self.chunk_overlap {
                        break;
                    }
                    kept.push(prev);
                    kept_len += prev_len;
                }
                kept.reverse();
                current = kept;
                current_len = kept_len;
            }
            current.push(sentence);
            current_len += len;
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn lesson_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Lesson\s+(\d+):\s*(.*)$").expect("valid regex"))
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]*[.!?]+['\x22)\]]*\s*").expect("valid regex"))
}

fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences: Vec<String> = Vec::new();
    let mut consumed = 0;
    for m in sentence_re().find_iter(&normalized) {
        let s = m.as_str().trim();
        if !s.is_empty() {
            sentences.push(s.to_string());
        }
        consumed = m.end();
    }
    // Trailing text without terminal punctuation still counts.
    let rest = normalized[consumed..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}
