//! Comparing the size of a font's kerning across compaction modes

use std::io::Write;

use write_fonts::{
    dump_table,
    from_obj::ToOwnedTable,
    read::{FileRef, FontRef, ReadError, TableProvider},
    tables::gpos::Gpos,
    types::Tag,
};

use crate::{
    compact::{compact, is_pair_lookup, CompactionSummary},
    config::{ClusteringConfig, CompactionConfig, Mode},
    error::Error,
};

const GPOS: Tag = Tag::new(b"GPOS");

/// A GPOS table compacted in one mode
#[derive(Clone, Debug)]
pub struct ModeResult {
    pub mode: Mode,
    pub gpos: Gpos,
    pub summary: CompactionSummary,
    /// Size of the compiled GPOS table, in bytes
    pub size: usize,
}

/// A GPOS table measured before and after compaction in every mode
#[derive(Clone, Debug)]
pub struct Measurement {
    /// Size of the original GPOS table, in bytes
    pub original_size: usize,
    /// One result per mode, in [`Mode::ALL`] order
    pub results: Vec<ModeResult>,
}

impl Measurement {
    pub fn size_of(&self, mode: Mode) -> Option<usize> {
        self.results
            .iter()
            .find(|result| result.mode == mode)
            .map(|result| result.size)
    }
}

/// The font at `index` in a font file or collection
pub fn font_from_bytes(bytes: &[u8], index: Option<u32>) -> Result<FontRef, ReadError> {
    match (FileRef::new(bytes)?, index.unwrap_or(0)) {
        (FileRef::Font(font), 0) => Ok(font),
        (FileRef::Font(_), other) => Err(ReadError::InvalidCollectionIndex(other)),
        (FileRef::Collection(collection), idx) => collection.get(idx),
    }
}

/// Size of the compiled table, in bytes
pub fn gpos_size(gpos: &Gpos) -> Result<usize, Error> {
    Ok(dump_table(gpos)?.len())
}

/// Compact a copy of the font's GPOS table in every mode and measure the results.
///
/// The original size is that of the table as stored in the font. Returns
/// `None` if the font has no GPOS table, or no pair adjustment lookups.
pub fn measure_font(
    font: &FontRef,
    clustering: ClusteringConfig,
) -> Result<Option<Measurement>, Error> {
    let Some(data) = font.table_data(GPOS) else {
        return Ok(None);
    };
    let gpos: Gpos = font.gpos()?.to_owned_table();
    if !has_pair_lookups(&gpos) {
        return Ok(None);
    }
    measure(&gpos, data.len(), clustering).map(Some)
}

/// As [`measure_font`], for a table that is not in a font yet.
///
/// The original size is that of the table compiled as is.
pub fn measure_gpos(
    gpos: &Gpos,
    clustering: ClusteringConfig,
) -> Result<Option<Measurement>, Error> {
    if !has_pair_lookups(gpos) {
        return Ok(None);
    }
    measure(gpos, gpos_size(gpos)?, clustering).map(Some)
}

fn has_pair_lookups(gpos: &Gpos) -> bool {
    gpos.lookup_list
        .lookups
        .iter()
        .any(|lookup| is_pair_lookup(lookup))
}

fn measure(
    gpos: &Gpos,
    original_size: usize,
    clustering: ClusteringConfig,
) -> Result<Measurement, Error> {
    let mut results = Vec::with_capacity(Mode::ALL.len());
    for mode in Mode::ALL {
        let config = CompactionConfig::new(mode).with_clustering(clustering);
        let mut compacted = gpos.clone();
        let summary = compact(&mut compacted, &config)?;
        let size = gpos_size(&compacted)?;
        log::debug!("'{mode}': {original_size} -> {size} bytes");
        results.push(ModeResult {
            mode,
            gpos: compacted,
            summary,
            size,
        });
    }
    Ok(Measurement {
        original_size,
        results,
    })
}

/// One line of the size report
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub file: String,
    pub original_kib: f64,
    /// Sizes in [`Mode::ALL`] order
    pub mode_kib: Vec<f64>,
}

impl ReportRow {
    pub fn new(file: impl Into<String>, measurement: &Measurement) -> Self {
        ReportRow {
            file: file.into(),
            original_kib: kib(measurement.original_size),
            mode_kib: Mode::ALL
                .iter()
                .map(|mode| kib(measurement.size_of(*mode).unwrap_or_default()))
                .collect(),
        }
    }
}

fn kib(bytes: usize) -> f64 {
    bytes as f64 / 1024.0
}

/// Relative change from `old` to `new`; negative means smaller.
pub fn relative_change(new: f64, old: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    -(1.0 - new / old)
}

/// Write the report as CSV: one column pair (size, change) per mode.
pub fn write_csv(rows: &[ReportRow], mut out: impl Write) -> Result<(), Error> {
    let mut header = vec!["File".to_string(), "Original GPOS Size".to_string()];
    for mode in Mode::ALL {
        header.push(format!("mode={mode}"));
        header.push(format!("Change {mode}"));
    }
    writeln!(out, "{}", header.join(","))?;

    for row in rows {
        let mut fields = vec![csv_field(&row.file), format!("{:.3}", row.original_kib)];
        for size in &row.mode_kib {
            fields.push(format!("{size:.3}"));
            fields.push(format!("{:.4}", relative_change(*size, row.original_kib)));
        }
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
