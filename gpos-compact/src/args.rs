use std::path::PathBuf;

#[derive(Clone, Debug, clap::Parser)]
#[command(about = "Regroup class-based GPOS kerning and compare the resulting sizes")]
pub struct Args {
    /// Font files (TrueType, OpenType or collections) to measure
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Index of the font to measure, if the inputs are font collections
    #[arg(short, long)]
    pub index: Option<u32>,
    /// YAML file with the clustering parameters used by 'auto' mode
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Write each compacted font to this directory as <stem>_<mode>.<ext>
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}
