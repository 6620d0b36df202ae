// Domain models: fact documents, API payload, resume checkpoint.

mod checkpoint;
mod document;
mod response;

pub use checkpoint::Checkpoint;
pub use document::{DataType, FactDocument, Metric};
pub use response::{AggregateResponse, GroupDimensions, MinuteGroup, Uniq, Viewer, ZoneGroups};
