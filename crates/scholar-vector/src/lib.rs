//! scholar-vector
//!
//! LanceDB storage for papers and embedded chunks, plus cosine k-NN search
//! over the chunk table.

pub mod schema;
pub mod search;
pub mod store;
pub mod table;

pub use search::{filter_predicate, LanceVectorIndex};
pub use store::LanceStore;
