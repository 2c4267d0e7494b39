//! Customer lifecycle pipeline: purchase extraction, fiscal bucketing,
//! New/Retained/Reactivated classification, and lifecycle aggregation.

pub mod aggregate;
pub mod classify;
pub mod extract;
pub mod index;
pub mod pipeline;

pub use aggregate::{AggregateAccumulator, AggregateRow};
pub use classify::{ClassifiedEvent, LifecycleClassifier};
pub use extract::{ExtractedLine, ExtractionGaps, PurchaseEventExtractor};
pub use index::{ActivityHistory, TimeBucketIndexer};
pub use pipeline::{LifecyclePipeline, LifecycleRun};
