use std::path::PathBuf;

use write_fonts::{read::ReadError, types::GlyphId16, BuilderError};

/// An invalid compaction configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown compaction mode '{0}', expected one of 'one', 'max', 'auto'")]
    UnknownMode(String),
    #[error("unknown linkage '{0}', expected one of 'ward', 'complete', 'average', 'single'")]
    UnknownLinkage(String),
    #[error("'{0}' and '{1}' cannot be used together")]
    ConflictingParameters(&'static str, &'static str),
    #[error("n_clusters must be at least 1")]
    ZeroClusters,
    #[error("rows_per_cluster must be a positive number, found {0}")]
    InvalidRowsPerCluster(f64),
    #[error("distance_threshold must be a non-negative number, found {0}")]
    InvalidDistanceThreshold(f64),
}

/// A class-based pair subtable whose structure is inconsistent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedSubtable {
    #[error("glyph {0} is in the first class definition but not in the coverage")]
    GlyphNotInCoverage(GlyphId16),
    #[error("glyph {0} occurs more than once in the coverage")]
    DuplicateCoverageGlyph(GlyphId16),
    #[error("glyph {glyph} has class1 {class} but there are only {count} class1 records")]
    Class1OutOfRange {
        glyph: GlyphId16,
        class: u16,
        count: usize,
    },
    #[error("glyph {glyph} has class2 {class} but there are only {count} class2 records")]
    Class2OutOfRange {
        glyph: GlyphId16,
        class: u16,
        count: usize,
    },
    #[error("class1 record {class1} has {found} class2 records, expected {expected}")]
    RaggedClass2Records {
        class1: usize,
        expected: usize,
        found: usize,
    },
    #[error("class1 {class1} has a non-zero adjustment against class2 0, which has no explicit glyphs")]
    UnaddressableDefaultClass { class1: usize },
    #[error("{0} class records cannot all be addressed by a 16-bit class id")]
    TooManyClassRecords(usize),
}

/// A failure to build a subtable from a group of pairs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("cannot build a subtable without any pairs")]
    EmptyMatrix,
    #[error("glyph {0} is a member of more than one class")]
    GlyphInMultipleClasses(GlyphId16),
    #[error("{0} classes do not fit in a class definition")]
    TooManyClasses(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    #[error("clustering needs at least two rows, found {0}")]
    TooFewRows(usize),
    #[error("clustering returned {found} labels for {expected} rows")]
    LabelCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bad configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("lookup {lookup}, subtable {subtable}: {source}")]
    Malformed {
        lookup: usize,
        subtable: usize,
        source: MalformedSubtable,
    },
    #[error("lookup {lookup}, subtable {subtable}: {source}")]
    Build {
        lookup: usize,
        subtable: usize,
        source: BuildError,
    },
    #[error("lookup {lookup}, subtable {subtable}: {source}")]
    Cluster {
        lookup: usize,
        subtable: usize,
        source: ClusterError,
    },
    #[error("could not compile GPOS: {0}")]
    DumpTable(#[from] write_fonts::error::Error),
    #[error("could not read font '{path}': {inner}")]
    FontRead { path: PathBuf, inner: ReadError },
    #[error("could not read GPOS: {0}")]
    GposRead(#[from] ReadError),
    #[error("could not build font: {0}")]
    FontBuild(#[from] BuilderError),
    #[error("could not read path '{path}': '{inner}'")]
    Load {
        path: PathBuf,
        inner: std::io::Error,
    },
    #[error("could not create file '{path}': '{inner}'")]
    FileWrite {
        path: PathBuf,
        inner: std::io::Error,
    },
    #[error("write error: '{0}'")]
    Write(#[from] std::io::Error),
    #[error("could not parse clustering config '{path}': '{inner}'")]
    Yaml {
        path: PathBuf,
        inner: serde_yaml::Error,
    },
}
