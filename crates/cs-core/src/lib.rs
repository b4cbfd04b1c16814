//! Core domain logic for clickstream session analysis.
//!
//! This crate contains the fundamental types and logic for:
//! - Segmentation: cutting a user's event stream into sessions that end at
//!   the target domain
//! - Subsession splitting: breaking sessions at anomalous idle gaps
//! - Aggregation: one duration/platform/link-path record per session
//! - Role labeling: tagging each event as init/during/end/init-end
//!
//! Everything here is pure and works on one user's events at a time; the
//! [`pipeline`] module fans the per-user functions out across a dataset.

mod aggregate;
pub mod anomaly;
mod event;
mod links;
mod page;
pub mod pipeline;
mod roles;
mod segment;
mod subsession;
mod types;

#[cfg(test)]
mod test_support;

pub use aggregate::{SubsessionRecord, aggregate_subsession};
pub use anomaly::{AnomalyError, ForestConfig, GapAnomalyDetector, IsolationForest};
pub use event::{Event, MalformedEventError, RawEvent, RawTimestamp};
pub use links::{LinkColumns, build_link_sequence};
pub use page::{PageUrl, TargetDomain};
pub use pipeline::{
    PipelineConfig, group_by_user, label_dataset, segment_and_aggregate, segment_dataset,
};
pub use roles::{RoleLabeledEvent, SessionRole, UnknownSessionRole, classify_roles, label_roles};
pub use segment::{Session, segment_sessions};
pub use subsession::{
    ClickGap, SplitterConfig, Subsession, TimedEvent, click_gaps, split_subsessions,
    split_subsessions_with,
};
pub use types::{SessionId, SubsessionId, UserId, ValidationError};
