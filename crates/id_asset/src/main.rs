pub(crate) mod convert;
pub(crate) mod utils;

use anyhow::Result;
use log::info;
use std::path::PathBuf;
use structopt::StructOpt;

/// Bakes id Software MD5 models, MD5 animations and PROC scenes.
#[derive(StructOpt, Debug)]
#[structopt(name = "id_asset")]
struct CliArgs {
    /// Folder searched recursively for `.md5mesh`, `.md5anim` and `.proc` files
    #[structopt(parse(from_os_str))]
    input: PathBuf,
    /// Folder the baked files are written to, mirroring the input layout
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: PathBuf,
    /// Log every step instead of warnings only
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("Input folder does not exist: {0}")]
    InputFolderNonExistent(String),
}

fn main() -> Result<()> {
    let args = CliArgs::from_args();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if !args.input.is_dir() {
        return Err(CliError::InputFolderNonExistent(args.input.display().to_string()).into());
    }

    let report = convert::convert_tree(&args.input, &args.output)?;
    info!(
        "Converted {} files into {}, skipped {}",
        report.converted,
        args.output.display(),
        report.skipped
    );
    Ok(())
}
