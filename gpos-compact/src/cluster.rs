//! Clustering the rows of a pair matrix by their second-class occupancy.
//!
//! Each first class (a row of the matrix) is described by a binary vector
//! with one entry per second class (a column): set if the pair exists. Rows
//! with similar vectors can share a subtable without leaving many empty
//! cells, so we group them with hierarchical agglomerative clustering.
//!
//! The agglomeration uses the nearest-neighbour chain algorithm, which is
//! O(n²) for the reducible linkages we support, with Lance-Williams updates
//! of a condensed distance matrix. Merge heights are on the same scale as
//! scipy's `linkage`: for ward, the height of a merge is
//! `sqrt(2 * increase in within-cluster sum of squares)`.

use std::collections::HashMap;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::{
    config::{ClusteringConfig, Linkage, StopCriterion},
    error::ClusterError,
    pairs::{first_classes, second_classes, GlyphClass, PairMatrix},
};

const WORD_BITS: usize = u64::BITS as usize;

/// A dense bit matrix of which (row, column) cells are present
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyMatrix {
    n_rows: usize,
    n_cols: usize,
    words_per_row: usize,
    bits: Vec<u64>,
}

impl OccupancyMatrix {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        let words_per_row = n_cols.div_ceil(WORD_BITS);
        OccupancyMatrix {
            n_rows,
            n_cols,
            words_per_row,
            bits: vec![0; n_rows * words_per_row],
        }
    }

    /// Build the occupancy of a pair matrix.
    ///
    /// Rows and columns are the first and second classes, in order of first
    /// appearance; the row classes are returned alongside the matrix.
    pub fn from_pairs(pairs: &PairMatrix) -> (Vec<GlyphClass>, Self) {
        let rows = first_classes(pairs);
        let row_idx: HashMap<_, _> = rows.iter().enumerate().map(|(i, r)| (r, i)).collect();
        let col_idx: HashMap<_, _> = second_classes(pairs)
            .into_iter()
            .enumerate()
            .map(|(i, c)| (c, i))
            .collect();
        let mut matrix = OccupancyMatrix::new(rows.len(), col_idx.len());
        for key in pairs.keys() {
            matrix.set(row_idx[&key.first], col_idx[&key.second]);
        }
        (rows, matrix)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Mark a cell as present.
    ///
    /// Returns `false` (and changes nothing) if the cell is outside the matrix.
    pub fn set(&mut self, row: usize, col: usize) -> bool {
        if row >= self.n_rows || col >= self.n_cols {
            return false;
        }
        self.bits[row * self.words_per_row + col / WORD_BITS] |= 1 << (col % WORD_BITS);
        true
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.n_rows
            && col < self.n_cols
            && self.bits[row * self.words_per_row + col / WORD_BITS] & (1 << (col % WORD_BITS))
                != 0
    }

    fn row(&self, row: usize) -> &[u64] {
        let start = row * self.words_per_row;
        &self.bits[start..start + self.words_per_row]
    }

    /// Euclidean distance between two rows; for binary vectors this is the
    /// square root of the number of differing cells.
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        let differing: u32 = self
            .row(a)
            .iter()
            .zip(self.row(b))
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        (differing as f64).sqrt()
    }
}

/// Something that assigns a cluster label to each row.
///
/// A label of `None` means the row is an outlier that belongs to no cluster.
pub trait Clustering {
    fn fit_predict(&self, data: &OccupancyMatrix) -> Result<Vec<Option<usize>>, ClusterError>;
}

/// Hierarchical, bottom-up clustering.
///
/// Every row starts as its own cluster; the closest two clusters are merged
/// until the stopping criterion is met. Every row is assigned a label, and
/// labels are numbered in order of first appearance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgglomerativeClustering {
    linkage: Linkage,
    criterion: StopCriterion,
}

impl AgglomerativeClustering {
    pub fn new(linkage: Linkage, criterion: StopCriterion) -> Self {
        AgglomerativeClustering { linkage, criterion }
    }
}

impl From<ClusteringConfig> for AgglomerativeClustering {
    fn from(config: ClusteringConfig) -> Self {
        AgglomerativeClustering::new(config.linkage, config.criterion)
    }
}

impl Clustering for AgglomerativeClustering {
    fn fit_predict(&self, data: &OccupancyMatrix) -> Result<Vec<Option<usize>>, ClusterError> {
        let n = data.n_rows();
        if n < 2 {
            return Err(ClusterError::TooFewRows(n));
        }
        let mut merges = nn_chain(data, self.linkage);
        // stable, so that tied merges keep the order they were found in
        merges.sort_by_key(|merge| OrderedFloat(merge.height));
        let n_merges = match (self.criterion.target_clusters(n), self.criterion) {
            (Some(n_clusters), _) => n - n_clusters,
            (None, StopCriterion::DistanceThreshold(threshold)) => merges
                .iter()
                .take_while(|merge| merge.height < threshold)
                .count(),
            // only the threshold criterion has no target count
            (None, _) => 0,
        };
        log::trace!(
            "{n} rows, {} linkage: applying {n_merges} merges",
            self.linkage
        );
        let mut sets = DisjointSets::new(n);
        for merge in &merges[..n_merges] {
            sets.union(merge.a, merge.b);
        }
        let mut labels = HashMap::new();
        Ok((0..n)
            .map(|row| {
                let next = labels.len();
                Some(*labels.entry(sets.find(row)).or_insert(next))
            })
            .collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Merge {
    a: usize,
    b: usize,
    height: f64,
}

impl Linkage {
    /// The Lance-Williams update: the distance from cluster `i` to the union
    /// of clusters `x` and `y`.
    fn update(self, d_ix: f64, d_iy: f64, d_xy: f64, n_x: usize, n_y: usize, n_i: usize) -> f64 {
        match self {
            Linkage::Single => d_ix.min(d_iy),
            Linkage::Complete => d_ix.max(d_iy),
            Linkage::Average => {
                (n_x as f64 * d_ix + n_y as f64 * d_iy) / (n_x + n_y) as f64
            }
            Linkage::Ward => {
                let (n_x, n_y, n_i) = (n_x as f64, n_y as f64, n_i as f64);
                let t = 1.0 / (n_x + n_y + n_i);
                let squared = (n_i + n_x) * t * d_ix * d_ix + (n_i + n_y) * t * d_iy * d_iy
                    - n_i * t * d_xy * d_xy;
                squared.max(0.0).sqrt()
            }
        }
    }
}

// index into a condensed (upper triangle) distance matrix
fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    n * i - i * (i + 1) / 2 + j - i - 1
}

/// Compute all n - 1 merges of the full dendrogram.
///
/// The merges are returned in the order they are found, which is not sorted
/// by height. Each merge names one row from each of the merged clusters.
fn nn_chain(data: &OccupancyMatrix, linkage: Linkage) -> Vec<Merge> {
    let n = data.n_rows();
    let mut dists = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            dists.push(data.distance(i, j));
        }
    }

    // slot `s` always holds a cluster containing row `s`; a size of 0
    // means the slot has been merged into another
    let mut size = vec![1usize; n];
    let mut merges = Vec::with_capacity(n.saturating_sub(1));
    let mut chain: Vec<usize> = Vec::with_capacity(n);

    for _ in 1..n {
        if chain.is_empty() {
            let Some(first) = size.iter().position(|s| *s > 0) else {
                break;
            };
            chain.push(first);
        }

        let (x, y, height) = loop {
            let x = chain[chain.len() - 1];
            let prev = (chain.len() > 1).then(|| chain[chain.len() - 2]);
            // prefer the previous chain element on ties, or we never terminate
            let (mut y, mut best) = match prev {
                Some(prev) => (prev, dists[condensed_index(n, x, prev)]),
                None => (x, f64::INFINITY),
            };
            for (i, _) in size.iter().enumerate().filter(|(i, s)| **s > 0 && *i != x) {
                let dist = dists[condensed_index(n, x, i)];
                if dist < best {
                    best = dist;
                    y = i;
                }
            }
            if prev == Some(y) {
                break (x, y, best);
            }
            chain.push(y);
        };
        chain.truncate(chain.len() - 2);

        let (x, y) = (x.min(y), x.max(y));
        let (n_x, n_y) = (size[x], size[y]);
        merges.push(Merge { a: x, b: y, height });
        size[x] = 0;
        size[y] = n_x + n_y;

        for i in 0..n {
            let n_i = size[i];
            if n_i == 0 || i == y {
                continue;
            }
            let d_ix = dists[condensed_index(n, i, x)];
            let d_iy = dists[condensed_index(n, i, y)];
            dists[condensed_index(n, i, y)] = linkage.update(d_ix, d_iy, height, n_x, n_y, n_i);
        }
    }
    merges
}

// union-find with path halving
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        DisjointSets {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut item: usize) -> usize {
        while self.parent[item] != item {
            self.parent[item] = self.parent[self.parent[item]];
            item = self.parent[item];
        }
        item
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[b] = a;
        }
    }
}

/// Split a pair matrix into one matrix per cluster of rows.
///
/// Rows sharing a label are merged into one group, in label order of first
/// appearance; rows without a label each become their own group, after all
/// the clustered groups.
pub fn cluster_pairs(
    pairs: PairMatrix,
    clustering: &impl Clustering,
) -> Result<Vec<PairMatrix>, ClusterError> {
    let (rows, occupancy) = OccupancyMatrix::from_pairs(&pairs);
    let labels = clustering.fit_predict(&occupancy)?;
    if labels.len() != rows.len() {
        return Err(ClusterError::LabelCountMismatch {
            expected: rows.len(),
            found: labels.len(),
        });
    }

    let mut lines: HashMap<GlyphClass, PairMatrix> = HashMap::new();
    for (key, value) in pairs {
        lines.entry(key.first.clone()).or_default().insert(key, value);
    }

    let mut grouped: IndexMap<usize, PairMatrix> = IndexMap::new();
    let mut ungrouped = Vec::new();
    for (row, label) in rows.iter().zip(labels) {
        let line = lines.remove(row).unwrap_or_default();
        match label {
            Some(label) => grouped.entry(label).or_default().extend(line),
            None => ungrouped.push(line),
        }
    }
    log::debug!(
        "clustered {} rows into {} groups and {} singletons",
        rows.len(),
        grouped.len(),
        ungrouped.len()
    );
    Ok(grouped.into_values().chain(ungrouped).collect())
}
