//! Compaction settings

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Threshold used when no stopping criterion is configured.
///
/// Tuned against a corpus of Google Fonts families for ward linkage.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 5.5;

/// How the pairs of a class-based subtable are regrouped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    /// Everything in a single subtable
    One,
    /// One subtable per distinct first class
    Max,
    /// Cluster first classes with similar second-class coverage
    Auto,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::One, Mode::Auto, Mode::Max];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::One => "one",
            Mode::Max => "max",
            Mode::Auto => "auto",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim() {
            "one" => Ok(Mode::One),
            "max" => Ok(Mode::Max),
            "auto" => Ok(Mode::Auto),
            _ => Err(ConfigError::UnknownMode(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mode> for String {
    fn from(value: Mode) -> Self {
        value.as_str().to_owned()
    }
}

/// How the distance between two clusters is measured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Linkage {
    /// Increase in within-cluster variance caused by a merge
    #[default]
    Ward,
    /// Distance of the farthest members
    Complete,
    /// Mean distance over all member pairs
    Average,
    /// Distance of the closest members
    Single,
}

impl Linkage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::Ward => "ward",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Single => "single",
        }
    }
}

impl Display for Linkage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim() {
            "ward" => Ok(Linkage::Ward),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "single" => Ok(Linkage::Single),
            _ => Err(ConfigError::UnknownLinkage(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Linkage {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Linkage> for String {
    fn from(value: Linkage) -> Self {
        value.as_str().to_owned()
    }
}

/// When agglomeration stops merging clusters
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StopCriterion {
    /// Stop when this many clusters remain
    ClusterCount(usize),
    /// Stop when clusters hold this many rows on average
    RowsPerCluster(f64),
    /// Stop when the closest two clusters are at least this far apart
    DistanceThreshold(f64),
}

impl StopCriterion {
    /// The number of clusters to stop at, or `None` if a distance decides.
    pub(crate) fn target_clusters(&self, n_rows: usize) -> Option<usize> {
        match *self {
            StopCriterion::ClusterCount(n) => Some(n.clamp(1, n_rows.max(1))),
            StopCriterion::RowsPerCluster(per) => {
                let n = (n_rows as f64 / per).round() as usize;
                Some(n.min(n_rows).max(1))
            }
            StopCriterion::DistanceThreshold(_) => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            StopCriterion::ClusterCount(0) => Err(ConfigError::ZeroClusters),
            StopCriterion::RowsPerCluster(per) if !per.is_finite() || per <= 0.0 => {
                Err(ConfigError::InvalidRowsPerCluster(per))
            }
            StopCriterion::DistanceThreshold(dist) if !dist.is_finite() || dist < 0.0 => {
                Err(ConfigError::InvalidDistanceThreshold(dist))
            }
            _ => Ok(()),
        }
    }
}

/// Parameters of the clustering used by [`Mode::Auto`]
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawClusteringParams")]
pub struct ClusteringConfig {
    pub linkage: Linkage,
    pub criterion: StopCriterion,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig {
            linkage: Linkage::Ward,
            criterion: StopCriterion::DistanceThreshold(DEFAULT_DISTANCE_THRESHOLD),
        }
    }
}

impl ClusteringConfig {
    pub fn new(linkage: Linkage, criterion: StopCriterion) -> Result<Self, ConfigError> {
        let config = ClusteringConfig { linkage, criterion };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.criterion.validate()
    }
}

/// The clustering parameters as written in a config file.
///
/// Either `{linkage, n_clusters, distance_threshold}` or
/// `{linkage, rows_per_cluster}`; at most one stopping parameter may be set.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClusteringParams {
    #[serde(default)]
    linkage: Linkage,
    n_clusters: Option<usize>,
    distance_threshold: Option<f64>,
    rows_per_cluster: Option<f64>,
}

impl TryFrom<RawClusteringParams> for ClusteringConfig {
    type Error = ConfigError;

    fn try_from(raw: RawClusteringParams) -> Result<Self, Self::Error> {
        let criterion = match (raw.n_clusters, raw.distance_threshold, raw.rows_per_cluster) {
            (Some(_), _, Some(_)) => {
                return Err(ConfigError::ConflictingParameters(
                    "rows_per_cluster",
                    "n_clusters",
                ))
            }
            (_, Some(_), Some(_)) => {
                return Err(ConfigError::ConflictingParameters(
                    "rows_per_cluster",
                    "distance_threshold",
                ))
            }
            (Some(_), Some(_), None) => {
                return Err(ConfigError::ConflictingParameters(
                    "n_clusters",
                    "distance_threshold",
                ))
            }
            (None, None, Some(per)) => StopCriterion::RowsPerCluster(per),
            (Some(n), None, None) => StopCriterion::ClusterCount(n),
            (None, Some(dist), None) => StopCriterion::DistanceThreshold(dist),
            (None, None, None) => StopCriterion::DistanceThreshold(DEFAULT_DISTANCE_THRESHOLD),
        };
        ClusteringConfig::new(raw.linkage, criterion)
    }
}

/// Everything that controls one compaction run
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompactionConfig {
    pub mode: Mode,
    /// Only consulted in [`Mode::Auto`]
    pub clustering: ClusteringConfig,
}

impl CompactionConfig {
    pub fn new(mode: Mode) -> Self {
        CompactionConfig {
            mode,
            clustering: Default::default(),
        }
    }

    pub fn with_clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = clustering;
        self
    }

    /// Check all parameters; nothing is compacted with a bad config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clustering.validate()
    }
}
