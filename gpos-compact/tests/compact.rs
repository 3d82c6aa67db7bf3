use std::{
    path::{Path, PathBuf},
    process::Command,
};

use gpos_compact::{
    compact, extract_pairs, font_from_bytes, measure_font, ClusteringConfig, CompactionConfig,
    Linkage, Mode, PairMatrix, StopCriterion,
};
use more_asserts::assert_lt;
use pretty_assertions::assert_eq;
use rstest::rstest;
use write_fonts::{
    from_obj::ToOwnedTable,
    read::{FontRef, TableProvider},
    tables::{
        gpos::{
            Class1Record, Class2Record, ExtensionPosFormat1, ExtensionSubtable, Gpos, PairPos,
            PairPosFormat1, PairPosFormat2, PairSet, PairValueRecord, PositionLookup,
            PositionLookupList, SinglePos, ValueRecord,
        },
        layout::{ClassDef, FeatureList, Lookup, LookupFlag, ScriptList},
    },
    types::{GlyphId16, Tag},
    FontBuilder,
};

const GLYPHS: &[&str] = &[
    ".notdef",
    "A",
    "Aacute",
    "L",
    "O",
    "T",
    "V",
    "W",
    "a",
    "comma",
    "e",
    "f",
    "o",
    "period",
    "quoteright",
];

const EXTRA_TABLE: Tag = Tag::new(b"TEST");

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn gid(name: &str) -> GlyphId16 {
    let idx = GLYPHS.iter().position(|g| *g == name).unwrap();
    GlyphId16::new(idx as u16)
}

fn gids(names: &[&str]) -> Vec<GlyphId16> {
    names.iter().map(|name| gid(name)).collect()
}

fn kern(x_adv: i16) -> ValueRecord {
    ValueRecord::new().with_x_advance(x_adv)
}

// every cell is written, so that all records share one value format
fn class_pairs(
    coverage: &[&str],
    class_def1: &[(&str, u16)],
    class_def2: &[(&str, u16)],
    grid: &[&[i16]],
) -> PairPos {
    let class_def = |classes: &[(&str, u16)]| -> ClassDef {
        classes.iter().map(|(name, cls)| (gid(name), *cls)).collect()
    };
    let class1_records = grid
        .iter()
        .map(|row| {
            Class1Record::new(
                row.iter()
                    .map(|x_adv| Class2Record::new(kern(*x_adv), ValueRecord::new()))
                    .collect(),
            )
        })
        .collect();
    PairPos::Format2(PairPosFormat2::new(
        gids(coverage).into(),
        class_def(class_def1),
        class_def(class_def2),
        class1_records,
    ))
}

/// Three lookups:
///
/// - pair adjustment, ignoring marks: one glyph pair subtable, then a class
///   subtable with five first classes (A and Aacute are class 0)
/// - an extension lookup wrapping one more class subtable
/// - a single adjustment
fn kern_gpos() -> Gpos {
    let glyph_pairs = PairPos::Format1(PairPosFormat1::new(
        gids(&["T"]).into(),
        vec![PairSet::new(vec![PairValueRecord::new(
            gid("e"),
            kern(-95),
            ValueRecord::new(),
        )])],
    ));
    let latin = class_pairs(
        &["A", "Aacute", "L", "O", "T", "V", "W"],
        &[("T", 1), ("V", 2), ("W", 2), ("O", 3), ("L", 4)],
        &[
            ("a", 1),
            ("o", 2),
            ("e", 2),
            ("period", 3),
            ("comma", 3),
            ("quoteright", 4),
            ("T", 5),
        ],
        &[
            &[0, 0, 0, 0, -60, -80],
            &[0, -70, -80, -90, 0, 0],
            &[0, -40, -50, -60, 0, 0],
            &[0, 0, 0, 0, -10, -20],
            &[0, 0, 0, 0, -100, -90],
        ],
    );
    let f_quote = class_pairs(&["f"], &[], &[("quoteright", 1)], &[&[0, 50]]);
    let single = SinglePos::format_1(
        gids(&["a"]).into(),
        ValueRecord::new().with_y_placement(10),
    );

    let lookups = vec![
        PositionLookup::Pair(Lookup::new(
            LookupFlag::IGNORE_MARKS,
            vec![glyph_pairs, latin],
        )),
        PositionLookup::Extension(Lookup::new(
            LookupFlag::empty(),
            vec![ExtensionSubtable::Pair(ExtensionPosFormat1::new(2, f_quote))],
        )),
        PositionLookup::Single(Lookup::new(LookupFlag::empty(), vec![single])),
    ];
    Gpos::new(
        ScriptList::default(),
        FeatureList::default(),
        PositionLookupList::new(lookups),
    )
}

fn kern_font() -> Vec<u8> {
    FontBuilder::new()
        .add_table(&kern_gpos())
        .unwrap()
        .add_raw(EXTRA_TABLE, b"keep me".to_vec())
        .build()
}

fn no_gpos_font() -> Vec<u8> {
    FontBuilder::new()
        .add_raw(EXTRA_TABLE, b"no kerning".to_vec())
        .build()
}

// the GPOS table as read back from compiled bytes
fn read_gpos(font: &FontRef) -> Gpos {
    font.gpos().unwrap().to_owned_table()
}

fn pair_subtables(lookup: &PositionLookup) -> Vec<&PairPos> {
    match lookup {
        PositionLookup::Pair(lookup) => lookup.subtables.iter().map(|sub| &**sub).collect(),
        PositionLookup::Extension(lookup) => lookup
            .subtables
            .iter()
            .filter_map(|sub| match &**sub {
                ExtensionSubtable::Pair(ext) => Some(&*ext.extension),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// every class pair in the table, ignoring how it is split into subtables
fn all_class_pairs(gpos: &Gpos) -> PairMatrix {
    let mut pairs = PairMatrix::new();
    for lookup in &gpos.lookup_list.lookups {
        for subtable in pair_subtables(lookup) {
            if let PairPos::Format2(sub) = subtable {
                for (key, value) in extract_pairs(sub).unwrap() {
                    assert!(
                        pairs.insert(key.clone(), value).is_none(),
                        "{key:?} is in two subtables"
                    );
                }
            }
        }
    }
    pairs.sort_keys();
    pairs
}

fn two_clusters() -> ClusteringConfig {
    ClusteringConfig::new(Linkage::Ward, StopCriterion::ClusterCount(2)).unwrap()
}

#[rstest]
#[case::one(CompactionConfig::new(Mode::One), 2)]
#[case::max(CompactionConfig::new(Mode::Max), 6)]
#[case::auto_default(CompactionConfig::new(Mode::Auto), 2)]
#[case::auto_two_clusters(CompactionConfig::new(Mode::Auto).with_clustering(two_clusters()), 3)]
fn compact_fixture(#[case] config: CompactionConfig, #[case] first_lookup_subtables: usize) {
    let bytes = kern_font();
    let original = read_gpos(&FontRef::new(&bytes).unwrap());
    let mut gpos = original.clone();

    let summary = compact(&mut gpos, &config).unwrap();

    assert_eq!(summary.lookups, 2);
    assert_eq!(summary.subtables_before, 3);
    assert_eq!(summary.passed_through, 1);
    let lookups = &gpos.lookup_list.lookups;
    let original_lookups = &original.lookup_list.lookups;
    assert_eq!(pair_subtables(&lookups[0]).len(), first_lookup_subtables);
    // the glyph pair subtable and the single adjustment are untouched
    assert_eq!(
        pair_subtables(&lookups[0])[0],
        pair_subtables(&original_lookups[0])[0]
    );
    assert_eq!(lookups[2], original_lookups[2]);
    let PositionLookup::Pair(first) = &*lookups[0] else {
        panic!("pair lookup changed type");
    };
    assert_eq!(first.lookup_flag, LookupFlag::IGNORE_MARKS);
    assert!(matches!(*lookups[1], PositionLookup::Extension(_)));

    assert_eq!(all_class_pairs(&gpos), all_class_pairs(&original));
}

#[test]
fn zero_kerning_is_dropped() {
    let pairs = all_class_pairs(&kern_gpos());
    // 12 in the first lookup, one in the extension; V against quoteright is 0
    assert_eq!(pairs.len(), 13);
}

#[test]
fn clusters_follow_shared_columns() {
    let mut gpos = kern_gpos();
    let config = CompactionConfig::new(Mode::Auto).with_clustering(two_clusters());
    compact(&mut gpos, &config).unwrap();

    let mut coverages: Vec<Vec<GlyphId16>> = pair_subtables(&gpos.lookup_list.lookups[0])[1..]
        .iter()
        .map(|sub| {
            let PairPos::Format2(sub) = sub else {
                panic!("expected class pairs");
            };
            sub.coverage.iter().collect()
        })
        .collect();
    coverages.sort();
    assert_eq!(
        coverages,
        vec![gids(&["A", "Aacute", "L", "O"]), gids(&["T", "V", "W"])]
    );
}

#[test]
fn measure_fixture() {
    let bytes = kern_font();
    let font = FontRef::new(&bytes).unwrap();
    let measurement = measure_font(&font, two_clusters()).unwrap().unwrap();
    assert_eq!(
        measurement.original_size,
        font.table_data(Tag::new(b"GPOS")).unwrap().len()
    );
    let size = |mode| measurement.size_of(mode).unwrap();
    // with this few rows, per-subtable overhead dominates
    assert_lt!(size(Mode::One), size(Mode::Max));
    assert_lt!(size(Mode::Auto), size(Mode::Max));
    assert_eq!(measurement.results[0].summary.subtables_after, 3);
}

fn run_cli(args: &[&Path]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_gpos-compact"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn cli_writes_report_and_fonts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let out_dir = temp_dir.path().join("out");
    let kern = temp_dir.path().join("kern.ttf");
    let no_gpos = temp_dir.path().join("no_gpos.ttf");
    std::fs::write(&kern, kern_font()).unwrap();
    std::fs::write(&no_gpos, no_gpos_font()).unwrap();

    let config = testdata("clustering.yaml");
    let output = run_cli(&[
        Path::new("--config"),
        config.as_path(),
        Path::new("--out-dir"),
        out_dir.as_path(),
        kern.as_path(),
        no_gpos.as_path(),
    ]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[0].starts_with("File,Original GPOS Size,mode=one"));
    assert!(lines[1].starts_with("kern.ttf,"));

    let expected = all_class_pairs(&kern_gpos());
    for mode in Mode::ALL {
        let path = out_dir.join(format!("kern_{mode}.ttf"));
        let data = std::fs::read(&path).unwrap();
        let font = font_from_bytes(&data, None).unwrap();
        assert_eq!(all_class_pairs(&read_gpos(&font)), expected, "{mode}");
        assert_eq!(
            font.table_data(EXTRA_TABLE).unwrap().as_bytes(),
            b"keep me"
        );
    }
    assert!(!out_dir.join("no_gpos_one.ttf").exists());
}

#[test]
fn cli_rejects_bad_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = temp_dir.path().join("bad.yaml");
    let kern = temp_dir.path().join("kern.ttf");
    std::fs::write(&config, "n_clusters: 2\nrows_per_cluster: 3\n").unwrap();
    std::fs::write(&kern, kern_font()).unwrap();

    let output = run_cli(&[Path::new("--config"), config.as_path(), kern.as_path()]);
    assert!(!output.status.success());
}

#[test]
fn cli_rejects_files_that_are_not_fonts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let not_a_font = temp_dir.path().join("kern.json");
    std::fs::write(&not_a_font, "{}").unwrap();

    let output = run_cli(&[not_a_font.as_path()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("kern.json"), "{stderr}");
}
