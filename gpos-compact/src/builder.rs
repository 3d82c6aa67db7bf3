//! Building class-based pair subtables from pair matrices

use std::collections::HashMap;

use write_fonts::{
    read::collections::IntSet,
    tables::{
        gpos::{Class1Record, Class2Record, PairPosFormat2, ValueFormat, ValueRecord},
        layout::{builders::ClassDefBuilder, ClassDef},
    },
    types::GlyphId16,
};

use crate::{
    error::BuildError,
    pairs::{GlyphClass, PairMatrix, ValuePair},
};

type GlyphSet = IntSet<GlyphId16>;

/// Something that turns a group of pairs into exactly one subtable.
pub trait SubtableBuilder: Sync {
    fn build(&self, pairs: PairMatrix) -> Result<PairPosFormat2, BuildError>;
}

/// Builds format 2 subtables, numbering classes from scratch.
///
/// Larger classes get lower ids, with ties going to the class holding the
/// lowest glyph id. The largest first class becomes class 0; second class 0
/// is left to mean 'all other glyphs'. Every record in the subtable shares
/// one value format, the union of the formats the pairs need.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassPairPosBuilder;

impl SubtableBuilder for ClassPairPosBuilder {
    fn build(&self, pairs: PairMatrix) -> Result<PairPosFormat2, BuildError> {
        if pairs.is_empty() {
            return Err(BuildError::EmptyMatrix);
        }
        let mut classdef_1 = Classes::new(ClassDefBuilder::new_using_class_0());
        let mut classdef_2 = Classes::new(ClassDefBuilder::new());
        for key in pairs.keys() {
            classdef_1.checked_add(&key.first)?;
            classdef_2.checked_add(&key.second)?;
        }
        // class1 ids start at 0, class2 ids at 1
        if classdef_1.len() > u16::MAX as usize {
            return Err(BuildError::TooManyClasses(classdef_1.len()));
        }
        if classdef_2.len() >= u16::MAX as usize {
            return Err(BuildError::TooManyClasses(classdef_2.len()));
        }

        let (format1, format2) = pairs.values().fold(
            (ValueFormat::empty(), ValueFormat::empty()),
            |(acc1, acc2), ValuePair(v1, v2)| (acc1 | v1.format(), acc2 | v2.format()),
        );
        let empty_record = Class2Record::new(
            ValueRecord::new().with_explicit_value_format(format1),
            ValueRecord::new().with_explicit_value_format(format2),
        );

        let coverage = classdef_1.glyphs.iter().collect();
        let class1_count = classdef_1.len();
        let class2_count = classdef_2.len() + 1;
        let (class_def1, class1_ids) = classdef_1.build();
        let (class_def2, class2_ids) = classdef_2.build();

        let mut class1_records =
            vec![Class1Record::new(vec![empty_record; class2_count]); class1_count];
        for (key, ValuePair(value_record1, value_record2)) in pairs {
            let class1 = class1_ids[&key.first] as usize;
            let class2 = class2_ids[&key.second] as usize;
            class1_records[class1].class2_records[class2] = Class2Record::new(
                value_record1.with_explicit_value_format(format1),
                value_record2.with_explicit_value_format(format2),
            );
        }

        Ok(PairPosFormat2::new(
            coverage,
            class_def1,
            class_def2,
            class1_records,
        ))
    }
}

// The glyph classes of one side of a subtable
struct Classes {
    builder: ClassDefBuilder,
    sets: HashMap<GlyphClass, GlyphSet>,
    glyphs: GlyphSet,
}

impl Classes {
    fn new(builder: ClassDefBuilder) -> Self {
        Classes {
            builder,
            sets: HashMap::new(),
            glyphs: GlyphSet::empty(),
        }
    }

    fn len(&self) -> usize {
        self.sets.len()
    }

    /// Add this class, unless it overlaps a class added earlier.
    fn checked_add(&mut self, cls: &GlyphClass) -> Result<(), BuildError> {
        if self.sets.contains_key(cls) {
            return Ok(());
        }
        let set: GlyphSet = cls.iter().collect();
        if !self.builder.checked_add(set.clone()) {
            let glyph = cls
                .iter()
                .find(|glyph| self.glyphs.contains(*glyph))
                .unwrap_or_default();
            return Err(BuildError::GlyphInMultipleClasses(glyph));
        }
        self.glyphs.extend(set.iter());
        self.sets.insert(cls.clone(), set);
        Ok(())
    }

    /// Returns the class def, as well as the id assigned to each class.
    fn build(self) -> (ClassDef, HashMap<GlyphClass, u16>) {
        let (class_def, mapping) = self.builder.build_with_mapping();
        let ids = self
            .sets
            .into_iter()
            .map(|(cls, set)| {
                let id = mapping[&set];
                (cls, id)
            })
            .collect();
        (class_def, ids)
    }
}
