//! # Cerevyn RAG
//!
//! A retrieval-augmented-generation helper service. It accepts raw text or
//! files, turns them into embeddings, stores them in a vector index, and
//! answers similarity queries with ranked documents or a ready-made
//! context block for grounding a language-model prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐
//! │ Extractor │──▶│  Embedding   │──▶│  Vector   │
//! │ pdf/docx… │   │  provider    │   │  store    │
//! └───────────┘   └──────────────┘   └─────┬─────┘
//!        ▲                ▲                │
//!        └──────── RagService ◀────────────┘
//!                       ▲
//!                 ┌─────┴─────┐
//!                 │   HTTP    │
//!                 │  gateway  │
//!                 └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Document records, metadata, search hits |
//! | [`extract`] | Extension-keyed text extraction |
//! | [`tabular`] | CSV parsing and table rendering |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store abstraction (memory, SQLite) |
//! | [`rag`] | Ingestion and retrieval orchestration |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod server;
pub mod store;
pub mod tabular;
