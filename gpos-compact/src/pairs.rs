//! Extracting kerning pairs from class-based subtables

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Debug,
    sync::Arc,
};

use indexmap::IndexMap;
use write_fonts::{
    tables::gpos::{PairPosFormat2, ValueRecord},
    types::GlyphId16,
};

use crate::error::MalformedSubtable;

/// A set of glyphs that share a class in some subtable, sorted by glyph id.
///
/// Classes are compared by their glyphs, not by the class id they had in
/// their source subtable; this is what makes it possible to merge pairs
/// from subtables with independent class numbering.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphClass(Arc<[GlyphId16]>);

impl GlyphClass {
    pub fn iter(&self) -> impl Iterator<Item = GlyphId16> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The lowest glyph id in the class
    pub fn first(&self) -> Option<GlyphId16> {
        self.0.first().copied()
    }
}

impl FromIterator<GlyphId16> for GlyphClass {
    fn from_iter<I: IntoIterator<Item = GlyphId16>>(iter: I) -> Self {
        let mut glyphs: Vec<_> = iter.into_iter().collect();
        glyphs.sort_unstable();
        glyphs.dedup();
        GlyphClass(glyphs.into())
    }
}

impl Debug for GlyphClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|gid| gid.to_u16()))
            .finish()
    }
}

/// One cell of the class1 x class2 matrix
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub first: GlyphClass,
    pub second: GlyphClass,
}

impl PairKey {
    pub fn new(first: GlyphClass, second: GlyphClass) -> Self {
        PairKey { first, second }
    }
}

/// The adjustments for the first and second glyph of a pair.
///
/// Records carry no explicit value format, and zero scalars are dropped:
/// whatever format they were read with, the builder picks one that fits the
/// subtable they end up in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ValuePair(pub ValueRecord, pub ValueRecord);

impl ValuePair {
    pub fn new(first: &ValueRecord, second: &ValueRecord) -> Self {
        ValuePair(plain(first), plain(second))
    }

    /// `true` if neither record has any effect
    pub fn is_noop(&self) -> bool {
        is_noop(&self.0) && is_noop(&self.1)
    }
}

/// `true` if applying this record changes nothing.
///
/// All four scalars must be zero (or absent), and each of the four device
/// attachments must be absent.
pub fn is_noop(record: &ValueRecord) -> bool {
    [
        record.x_placement,
        record.y_placement,
        record.x_advance,
        record.y_advance,
    ]
    .into_iter()
    .all(|value| value.unwrap_or_default() == 0)
        && record.x_placement_device.is_none()
        && record.y_placement_device.is_none()
        && record.x_advance_device.is_none()
        && record.y_advance_device.is_none()
}

// a copy of the record with only the fields that do something
fn plain(record: &ValueRecord) -> ValueRecord {
    let nonzero = |value: Option<i16>| value.filter(|v| *v != 0);
    let mut result = ValueRecord::new();
    result.x_placement = nonzero(record.x_placement);
    result.y_placement = nonzero(record.y_placement);
    result.x_advance = nonzero(record.x_advance);
    result.y_advance = nonzero(record.y_advance);
    result.x_placement_device = record.x_placement_device.clone();
    result.y_placement_device = record.y_placement_device.clone();
    result.x_advance_device = record.x_advance_device.clone();
    result.y_advance_device = record.y_advance_device.clone();
    result
}

/// A sparse matrix of kerning adjustments.
///
/// Iteration order is insertion order, which keeps everything computed from a
/// matrix (row order, group order) deterministic.
pub type PairMatrix = IndexMap<PairKey, ValuePair>;

/// The distinct first classes of a matrix, in order of first appearance.
pub fn first_classes(pairs: &PairMatrix) -> Vec<GlyphClass> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for key in pairs.keys() {
        if seen.insert(&key.first) {
            result.push(key.first.clone());
        }
    }
    result
}

/// The distinct second classes of a matrix, in order of first appearance.
pub fn second_classes(pairs: &PairMatrix) -> Vec<GlyphClass> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for key in pairs.keys() {
        if seen.insert(&key.second) {
            result.push(key.second.clone());
        }
    }
    result
}

// the class count of a subtable, as declared by its records
fn class2_count(subtable: &PairPosFormat2) -> usize {
    subtable
        .class1_records
        .first()
        .map(|rec| rec.class2_records.len())
        .unwrap_or(0)
}

fn class_id(index: usize, count: usize) -> Result<u16, MalformedSubtable> {
    u16::try_from(index).map_err(|_| MalformedSubtable::TooManyClassRecords(count))
}

/// Convert a class-based subtable into a matrix of its non-zero pairs.
///
/// Glyphs in the coverage but not in the first class definition are in
/// class 0. Cells that no glyph pair can reach (because one of the classes
/// has no glyphs) are dropped. The one exception is a non-zero cell in
/// second class 0, which applies to 'all other glyphs' and so cannot be
/// expressed with an explicit glyph key, even if some glyphs are mapped to
/// class 0 explicitly.
pub fn extract_pairs(subtable: &PairPosFormat2) -> Result<PairMatrix, MalformedSubtable> {
    let class1_count = subtable.class1_records.len();
    let class2_count = class2_count(subtable);

    for (class1, record) in subtable.class1_records.iter().enumerate() {
        if record.class2_records.len() != class2_count {
            return Err(MalformedSubtable::RaggedClass2Records {
                class1,
                expected: class2_count,
                found: record.class2_records.len(),
            });
        }
    }

    let mut covered = HashSet::new();
    let mut classes1: BTreeMap<u16, Vec<GlyphId16>> = BTreeMap::new();
    for glyph in subtable.coverage.iter() {
        if !covered.insert(glyph) {
            return Err(MalformedSubtable::DuplicateCoverageGlyph(glyph));
        }
        let class = subtable.class_def1.get(glyph);
        if class as usize >= class1_count {
            return Err(MalformedSubtable::Class1OutOfRange {
                glyph,
                class,
                count: class1_count,
            });
        }
        classes1.entry(class).or_default().push(glyph);
    }
    if let Some((glyph, _)) = subtable
        .class_def1
        .iter()
        .find(|(glyph, class)| *class != 0 && !covered.contains(glyph))
    {
        return Err(MalformedSubtable::GlyphNotInCoverage(glyph));
    }

    let mut classes2: BTreeMap<u16, Vec<GlyphId16>> = BTreeMap::new();
    for (glyph, class) in subtable.class_def2.iter() {
        if class as usize >= class2_count {
            return Err(MalformedSubtable::Class2OutOfRange {
                glyph,
                class,
                count: class2_count,
            });
        }
        // class 0 means 'everything else', listed glyphs or not
        if class != 0 {
            classes2.entry(class).or_default().push(glyph);
        }
    }

    let classes1: BTreeMap<_, GlyphClass> = classes1
        .into_iter()
        .map(|(id, glyphs)| (id, glyphs.into_iter().collect()))
        .collect();
    let classes2: BTreeMap<_, GlyphClass> = classes2
        .into_iter()
        .map(|(id, glyphs)| (id, glyphs.into_iter().collect()))
        .collect();

    let mut pairs = PairMatrix::new();
    for (i, class1_record) in subtable.class1_records.iter().enumerate() {
        let Some(first) = classes1.get(&class_id(i, class1_count)?) else {
            continue;
        };
        for (j, record) in class1_record.class2_records.iter().enumerate() {
            let class2 = class_id(j, class2_count)?;
            if is_noop(&record.value_record1) && is_noop(&record.value_record2) {
                continue;
            }
            if class2 == 0 {
                return Err(MalformedSubtable::UnaddressableDefaultClass { class1: i });
            }
            let Some(second) = classes2.get(&class2) else {
                log::debug!("dropping class1 {i} x class2 {j}: class2 has no glyphs");
                continue;
            };
            pairs.insert(
                PairKey::new(first.clone(), second.clone()),
                ValuePair::new(&record.value_record1, &record.value_record2),
            );
        }
    }
    Ok(pairs)
}
