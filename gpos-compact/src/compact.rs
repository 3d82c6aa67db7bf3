//! Rewriting the pair adjustment lookups of a GPOS table

use rayon::prelude::*;
use write_fonts::tables::{
    gpos::{ExtensionPosFormat1, ExtensionSubtable, Gpos, PairPos, PositionLookup},
    layout::Lookup,
};

use crate::{
    builder::{ClassPairPosBuilder, SubtableBuilder},
    config::CompactionConfig,
    error::{Error, MalformedSubtable},
    pairs::extract_pairs,
    regroup::regroup,
};

/// The lookup type of pair adjustment, as stored in extension subtables
const PAIR_POS_LOOKUP_TYPE: u16 = 2;

/// What a call to [`compact`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompactionSummary {
    /// Pair adjustment lookups visited, including extension lookups
    pub lookups: usize,
    pub subtables_before: usize,
    pub subtables_after: usize,
    /// Subtables kept as they were: format 1, or format 2 that cannot be regrouped
    pub passed_through: usize,
}

impl CompactionSummary {
    fn add(&mut self, other: CompactionSummary) {
        self.lookups += other.lookups;
        self.subtables_before += other.subtables_before;
        self.subtables_after += other.subtables_after;
        self.passed_through += other.passed_through;
    }
}

/// `true` if the lookup adjusts pairs, directly or through extension subtables.
pub fn is_pair_lookup(lookup: &PositionLookup) -> bool {
    match lookup {
        PositionLookup::Pair(_) => true,
        PositionLookup::Extension(lookup) => pair_extensions(lookup).is_some(),
        _ => false,
    }
}

// the wrapped subtables, if every one of them is a pair adjustment
fn pair_extensions(lookup: &Lookup<ExtensionSubtable>) -> Option<Vec<&PairPos>> {
    if lookup.subtables.is_empty() {
        return None;
    }
    lookup
        .subtables
        .iter()
        .map(|subtable| match &**subtable {
            ExtensionSubtable::Pair(ext) => Some(&*ext.extension),
            _ => None,
        })
        .collect()
}

/// Regroup every class-based pair subtable in `gpos`.
///
/// On error, `gpos` is left untouched.
pub fn compact(gpos: &mut Gpos, config: &CompactionConfig) -> Result<CompactionSummary, Error> {
    compact_with(gpos, config, &ClassPairPosBuilder)
}

/// As [`compact`], with a caller-provided subtable builder.
pub fn compact_with(
    gpos: &mut Gpos,
    config: &CompactionConfig,
    builder: &impl SubtableBuilder,
) -> Result<CompactionSummary, Error> {
    config.validate()?;

    let compacted = gpos
        .lookup_list
        .lookups
        .par_iter()
        .enumerate()
        .map(|(i, lookup)| compact_lookup(i, lookup, config, builder))
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = CompactionSummary::default();
    for (lookup, compacted) in gpos.lookup_list.lookups.iter_mut().zip(compacted) {
        if let Some((new_lookup, lookup_summary)) = compacted {
            *lookup = new_lookup.into();
            summary.add(lookup_summary);
        }
    }
    log::info!(
        "'{}' compaction: {} pair lookups, {} subtables -> {} ({} passed through)",
        config.mode,
        summary.lookups,
        summary.subtables_before,
        summary.subtables_after,
        summary.passed_through
    );
    Ok(summary)
}

// None if this is not a lookup we rewrite
fn compact_lookup(
    lookup_index: usize,
    lookup: &PositionLookup,
    config: &CompactionConfig,
    builder: &impl SubtableBuilder,
) -> Result<Option<(PositionLookup, CompactionSummary)>, Error> {
    let subtables: Vec<&PairPos> = match lookup {
        PositionLookup::Pair(lookup) => lookup.subtables.iter().map(|sub| &**sub).collect(),
        PositionLookup::Extension(lookup) => match pair_extensions(lookup) {
            Some(subtables) => subtables,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };

    let mut summary = CompactionSummary {
        lookups: 1,
        subtables_before: subtables.len(),
        ..Default::default()
    };
    let mut new_subtables = Vec::with_capacity(subtables.len());
    for (i, subtable) in subtables.into_iter().enumerate() {
        let (new, passed) = compact_subtable(lookup_index, i, subtable, config, builder)?;
        summary.passed_through += usize::from(passed);
        new_subtables.extend(new);
    }
    summary.subtables_after = new_subtables.len();

    let new_lookup = match lookup {
        PositionLookup::Extension(lookup) => PositionLookup::Extension(with_subtables(
            lookup,
            new_subtables
                .into_iter()
                .map(|sub| {
                    ExtensionSubtable::Pair(ExtensionPosFormat1::new(PAIR_POS_LOOKUP_TYPE, sub))
                })
                .collect(),
        )),
        PositionLookup::Pair(lookup) => {
            PositionLookup::Pair(with_subtables(lookup, new_subtables))
        }
        _ => return Ok(None),
    };
    log::debug!(
        "lookup {lookup_index}: {} subtables -> {}",
        summary.subtables_before,
        summary.subtables_after
    );
    Ok(Some((new_lookup, summary)))
}

fn with_subtables<T, U>(lookup: &Lookup<T>, subtables: Vec<U>) -> Lookup<U> {
    Lookup {
        lookup_flag: lookup.lookup_flag,
        subtables: subtables.into_iter().map(Into::into).collect(),
        mark_filtering_set: lookup.mark_filtering_set,
    }
}

/// The replacements for one subtable, and whether it was kept as is.
fn compact_subtable(
    lookup: usize,
    subtable: usize,
    pair_pos: &PairPos,
    config: &CompactionConfig,
    builder: &impl SubtableBuilder,
) -> Result<(Vec<PairPos>, bool), Error> {
    let class_pairs = match pair_pos {
        // glyph pairs are left alone
        PairPos::Format1(_) => return Ok((vec![pair_pos.clone()], true)),
        PairPos::Format2(class_pairs) => class_pairs,
    };
    let pairs = match extract_pairs(class_pairs) {
        Ok(pairs) => pairs,
        Err(MalformedSubtable::UnaddressableDefaultClass { class1 }) => {
            log::warn!(
                "lookup {lookup}, subtable {subtable}: class1 {class1} kerns against \
                 class2 0, keeping subtable unchanged"
            );
            return Ok((vec![pair_pos.clone()], true));
        }
        Err(source) => {
            return Err(Error::Malformed {
                lookup,
                subtable,
                source,
            })
        }
    };
    let groups = regroup(pairs, config).map_err(|source| Error::Cluster {
        lookup,
        subtable,
        source,
    })?;
    let new = groups
        .into_iter()
        .map(|group| {
            builder
                .build(group)
                .map(PairPos::Format2)
                .map_err(|source| Error::Build {
                    lookup,
                    subtable,
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((new, false))
}
