//! Rank fusion of the lexical and semantic retrieval lists.

pub mod rrf;

pub use rrf::{intermediate_limit, rrf_contribution, rrf_fuse, sort_fused};
