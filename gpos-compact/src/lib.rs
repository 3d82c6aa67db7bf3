//! Compacting class-based GPOS pair adjustment (kerning) subtables.
//!
//! Each format 2 pair subtable is flattened into a matrix of kerning pairs,
//! which is then regrouped into one or more new subtables:
//!
//! - `one`: everything in a single subtable
//! - `max`: one subtable per first class
//! - `auto`: first classes with similar second-class coverage are clustered
//!   together
//!
//! Which mode is smallest depends on how sparse the kerning is; the
//! [`report`] module measures all of them.

pub mod args;
mod builder;
mod cluster;
mod compact;
mod config;
mod error;
mod pairs;
mod regroup;
pub mod report;

pub use builder::{ClassPairPosBuilder, SubtableBuilder};
pub use cluster::{cluster_pairs, AgglomerativeClustering, Clustering, OccupancyMatrix};
pub use compact::{compact, compact_with, is_pair_lookup, CompactionSummary};
pub use config::{
    ClusteringConfig, CompactionConfig, Linkage, Mode, StopCriterion, DEFAULT_DISTANCE_THRESHOLD,
};
pub use error::{BuildError, ClusterError, ConfigError, Error, MalformedSubtable};
pub use pairs::{
    extract_pairs, first_classes, is_noop, second_classes, GlyphClass, PairKey, PairMatrix,
    ValuePair,
};
pub use regroup::{regroup, regroup_with};
pub use report::{
    font_from_bytes, gpos_size, measure_font, measure_gpos, relative_change, write_csv,
    Measurement, ModeResult, ReportRow,
};
