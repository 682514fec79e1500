//! faqrag-engine
//!
//! Question answering over a document index: a retrieval and grading router
//! that picks between a context-grounded and a general-knowledge answer, the
//! [`Engine`] facade that owns the index and generator, and the request and
//! response types a host exposes.

pub mod api;
mod engine;
pub mod prompts;
pub mod router;

pub use engine::Engine;
pub use router::{FailureKind, GenerationFailure, QueryState, RetrievalGradingRouter, RouterConfig, Stage};
