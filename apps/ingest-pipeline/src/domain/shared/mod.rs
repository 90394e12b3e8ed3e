//! Shared domain value objects.

mod identifiers;
mod timestamp;

pub use identifiers::{AssetId, CycleId, SourceId};
pub use timestamp::Timestamp;
