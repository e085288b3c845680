use std::fs;

use anyhow::{Context, Result};
use brick::config::BrickConfig;
use brick::io::cli::Cli;
use brick::io::input::PreSliced;
use brick::{EPOCH, driver, io};
use clap::Parser as ClapParser;
use log::{info, warn};

fn main() -> Result<()> {
    let args = Cli::parse();
    io::init_logger(args.log_level)?;

    let config: BrickConfig = match args.config_file {
        None => {
            warn!("[MAIN] No config file provided, use --config-file to provide a custom config");
            BrickConfig::default()
        }
        Some(config_file) => io::read_json(&config_file).context("incorrect config file format")?,
    };

    info!("[MAIN] Successfully parsed BrickConfig: {config:?}");

    let input_file_stem = args
        .input_file
        .file_stem()
        .and_then(|s| s.to_str())
        .context("input file has no valid name")?;

    if !args.solution_folder.exists() {
        fs::create_dir_all(&args.solution_folder).with_context(|| {
            format!(
                "could not create solution folder: {:?}",
                args.solution_folder
            )
        })?;
    }

    let input: PreSliced = io::read_json(&args.input_file)?;
    let solution_path = args
        .solution_folder
        .join(format!("sol_{input_file_stem}.json"));

    let mesh = driver::run(&input, config, solution_path)?;

    info!(
        "[MAIN] done in {:.3}s, {} layers, {} irregular bits left",
        EPOCH.elapsed().as_secs_f64(),
        mesh.n_layers(),
        mesh.count_irregularities()
    );
    Ok(())
}
