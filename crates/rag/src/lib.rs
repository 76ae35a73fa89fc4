//! Iterative retrieval loop over physician and hospital records.
//!
//! A generation step either asks for grounding data with
//! `NEED_RETRIEVAL: <table> | <query>` or finishes with
//! `FINAL_ANSWER: <text>`. [`RetrievalLoop`] drives that exchange: it parses
//! each reply into a [`Directive`], runs similarity search through the
//! [`RetrieverGateway`], folds the formatted rows back into the
//! [`Transcript`], and stops with a [`LoopOutcome`].

pub mod capability;
pub mod controller;
pub mod directive;
pub mod embedding;
pub mod error;
pub mod format;
pub mod gateway;
pub mod generation;
pub mod store;
pub mod table;
pub mod transcript;

pub use capability::{Embedder, Generator, SimilarityStore};
pub use controller::{
    Anomaly, DependencyStage, LoopConfig, LoopObserver, LoopOutcome, NoopObserver, RetrievalLoop,
    DEFAULT_MAX_ITERATIONS,
};
pub use directive::{parse_directive, Directive, ParseFailure, ParseFailureKind, RetrievalRequest};
pub use embedding::{EmbeddingBackend, EmbeddingClient, HashEmbedder, HashEmbedderConfig};
pub use error::{RagError, Result};
pub use format::{format_context, retrieval_followup, NO_RESULTS};
pub use gateway::{RetrieverGateway, DEFAULT_TOP_K};
pub use generation::LlmGenerator;
pub use store::{HospitalInsert, PhysicianInsert, RagStore};
pub use table::{HospitalRow, PhysicianRow, RetrievedRow, Table};
pub use transcript::{Transcript, SYSTEM_DIRECTIVE};
pub use medrag_llm::{
    ChatMessage, ChatRole, LlmClient, LlmProvider, LlmRequest, LlmResponse, DEFAULT_MAX_TOKENS,
};
