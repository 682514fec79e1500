//! faqrag-vector
//!
//! Exact (flat) cosine-similarity index over unit-normalized embeddings,
//! persisted as a binary vector file plus a JSON list of source texts. See
//! `index` for the concurrency contract and `snapshot` for the file format.

mod index;
pub mod search;
pub mod snapshot;

pub use index::{IndexOptions, VectorIndex};
