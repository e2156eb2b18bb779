use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "genoreport",
    version,
    about = "Structured extraction of HIV genotype reports and clinical notes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "Dossier_patient")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "data_json")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = "Dossier_patient")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "data_json")]
    pub output_dir: PathBuf,

    #[arg(long = "code")]
    pub codes: Vec<String>,

    #[arg(long)]
    pub run_manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "data_json")]
    pub output_dir: PathBuf,
}
