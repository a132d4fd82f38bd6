//! Course materials RAG backend.
//!
//! An axum HTTP service that answers questions about course transcripts:
//! documents are chunked and embedded into a SQLite vector store, and queries
//! run through an Anthropic tool-calling loop that can search that store.

pub mod core;
pub mod embedding;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod rag;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod tools;
