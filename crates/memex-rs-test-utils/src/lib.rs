//! Test helpers shared across memex crates.

pub mod adapter;
pub mod embedding;
pub mod record;
pub mod store;

pub use adapter::RecordingAdapter;
pub use embedding::{FailingEmbedder, FixedEmbedder};
pub use record::RecordBuilder;
pub use store::{FailingStore, StoreOp};
