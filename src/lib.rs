//! # Park Knowledge
//!
//! A question-answering service over a curated collection of national-park
//! documents. Questions are answered by a language model grounded in
//! passages retrieved from a Qdrant vector index; the retrieval capability
//! is exposed to the model as an MCP tool over an in-process bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌─────────┐
//! │ /ingest  │──▶│ Parse+Embed │──▶│ Qdrant  │
//! └──────────┘   └─────────────┘   └────┬────┘
//!                                       │ search
//! ┌──────────┐   ┌───────────┐   ┌──────┴──────┐
//! │ /ask     │──▶│ Assistant │──▶│ Tool Bridge │
//! │ /ask/    │   │ (LLM +    │   │ (in-process │
//! │  stream  │◀──│ tool loop)│◀──│  MCP pair)  │
//! └──────────┘   └───────────┘   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types and HTTP bodies |
//! | [`parser`] | Park document parsing and description extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`qdrant`] | Vector index lifecycle, upsert, and search |
//! | [`search_tool`] | Query embedding, retrieval, and result formatting |
//! | [`bridge`] | In-process MCP server/client tool bridge |
//! | [`agent`] | Chat-completion orchestration with tool calling |
//! | [`stream`] | SSE framing for the streaming answer endpoint |
//! | [`pipeline`] | Ingestion orchestration |
//! | [`http`] | Axum routes and error mapping |

pub mod agent;
pub mod bridge;
pub mod config;
pub mod embedding;
pub mod http;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod qdrant;
pub mod search_tool;
pub mod stream;
