//! Partitioning a pair matrix into the groups that become subtables

use indexmap::IndexMap;

use crate::{
    cluster::{cluster_pairs, AgglomerativeClustering, Clustering},
    config::{CompactionConfig, Mode},
    error::ClusterError,
    pairs::{first_classes, GlyphClass, PairMatrix},
};

/// Split `pairs` into groups according to the configured mode.
///
/// Every pair ends up in exactly one group. An empty matrix produces no
/// groups at all.
pub fn regroup(
    pairs: PairMatrix,
    config: &CompactionConfig,
) -> Result<Vec<PairMatrix>, ClusterError> {
    let clustering = AgglomerativeClustering::from(config.clustering);
    regroup_with(pairs, config.mode, &clustering)
}

/// As [`regroup`], with an explicit clustering for [`Mode::Auto`].
pub fn regroup_with(
    pairs: PairMatrix,
    mode: Mode,
    clustering: &impl Clustering,
) -> Result<Vec<PairMatrix>, ClusterError> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }
    match mode {
        Mode::One => Ok(vec![pairs]),
        Mode::Max => Ok(group_by_first_class(pairs)),
        // clustering needs at least two things to cluster
        Mode::Auto if first_classes(&pairs).len() < 2 => Ok(vec![pairs]),
        Mode::Auto => cluster_pairs(pairs, clustering),
    }
}

/// One group per distinct first class, in order of first appearance.
fn group_by_first_class(pairs: PairMatrix) -> Vec<PairMatrix> {
    let mut groups: IndexMap<GlyphClass, PairMatrix> = IndexMap::new();
    for (key, value) in pairs {
        groups
            .entry(key.first.clone())
            .or_default()
            .insert(key, value);
    }
    groups.into_values().collect()
}
