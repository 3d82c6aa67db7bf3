//! Measures how much each compaction mode shrinks the kerning of some fonts

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use clap::Parser;
use gpos_compact::{
    args::Args, font_from_bytes, measure_font, write_csv, ClusteringConfig, Error, ReportRow,
};
use write_fonts::FontBuilder;

fn main() -> Result<(), Error> {
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            writeln!(
                buf,
                "{}: {:?}: {}: {}",
                ts,
                std::thread::current().id(),
                record.level(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let clustering = match args.config.as_ref() {
        Some(path) => load_clustering_config(path)?,
        None => ClusteringConfig::default(),
    };
    if let Some(out_dir) = args.out_dir.as_ref() {
        fs::create_dir_all(out_dir).map_err(|inner| Error::FileWrite {
            path: out_dir.clone(),
            inner,
        })?;
    }

    let mut rows = Vec::new();
    for path in &args.inputs {
        let name = file_name(path);
        let bytes = fs::read(path).map_err(|inner| Error::Load {
            path: path.to_owned(),
            inner,
        })?;
        let font = font_from_bytes(&bytes, args.index).map_err(|inner| Error::FontRead {
            path: path.to_owned(),
            inner,
        })?;
        log::info!("Measuring {name}...");
        let Some(measurement) = measure_font(&font, clustering)? else {
            log::warn!("No GPOS pair adjustment lookups in {name}, skipping.");
            continue;
        };
        if let Some(out_dir) = args.out_dir.as_ref() {
            for result in &measurement.results {
                let out_path = out_dir.join(output_name(path, &result.mode.to_string()));
                let data = FontBuilder::new()
                    .add_table(&result.gpos)?
                    .copy_missing_tables(font.clone())
                    .build();
                fs::write(&out_path, data).map_err(|inner| Error::FileWrite {
                    path: out_path.clone(),
                    inner,
                })?;
                log::debug!("wrote {}", out_path.display());
            }
        }
        rows.push(ReportRow::new(name, &measurement));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_csv(&rows, &mut out)?;
    out.flush()?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// <stem>_<mode>.<ext>, keeping the input's extension
fn output_name(path: &Path, mode: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{stem}_{mode}.{}", ext.to_string_lossy()).into(),
        None => format!("{stem}_{mode}").into(),
    }
}

fn load_clustering_config(path: &Path) -> Result<ClusteringConfig, Error> {
    let data = fs::read_to_string(path).map_err(|inner| Error::Load {
        path: path.to_owned(),
        inner,
    })?;
    serde_yaml::from_str(&data).map_err(|inner| Error::Yaml {
        path: path.to_owned(),
        inner,
    })
}
