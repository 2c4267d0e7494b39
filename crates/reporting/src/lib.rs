//! Lifecycle reporting: rank/share (Pareto) analytics, customer and
//! category rankings, segment mix, qualification, year-over-year
//! comparison, and CSV/JSON export.

pub mod categories;
pub mod customers;
pub mod qualification;
pub mod rank;
pub mod segments;
pub mod table;
pub mod yoy;

pub use rank::{rank_by, rank_within_partitions, Rankable, RankedRow};
pub use table::{IntoReportTable, ReportTable};
