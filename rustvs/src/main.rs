use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rustvs::data::catalogue::CleanCellCatalogue;
use rustvs::data::config::RunConfig;
use rustvs::pipeline::channel::ChannelOutcome;
use rustvs::pipeline::run::clean_cells;
use vscore::executor::Executor;

#[derive(Parser)]
#[command(name = "rustvs")]
#[command(about = "Clean, deduplicate and detrend segmented cells")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the cells of every channel in a run
    Clean {
        /// Path to the run's parameters.json
        #[arg(long, value_name = "JSON")]
        parameters: PathBuf,
        /// Worker threads for baseline extraction (0 = one per core)
        #[arg(long, value_name = "N")]
        threads: Option<usize>,
        /// Run baseline extraction on the calling thread only
        #[arg(long)]
        serial: bool,
        /// Leave the volumes/ and cells/ directories in place
        #[arg(long)]
        keep_intermediates: bool,
    },
    /// Print a summary of a clean catalogue
    Inspect {
        /// Catalogue written by `clean`
        catalogue: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clean {
            parameters,
            threads,
            serial,
            keep_intermediates,
        } => {
            let mut config = RunConfig::from_json_file(&parameters)
                .with_context(|| format!("loading {}", parameters.display()))?;
            if let Some(n) = threads {
                config.num_threads = n;
            }
            if serial {
                config.parallel = false;
            }
            config.keep_intermediates |= keep_intermediates;
            cmd_clean(&config)
        }
        Commands::Inspect { catalogue } => cmd_inspect(&catalogue),
    }
}

fn cmd_clean(config: &RunConfig) -> Result<()> {
    let executor = Executor::from_settings(config.parallel, config.num_threads);
    let summary = clean_cells(config, &executor);

    for (color, outcome) in &summary.channels {
        match outcome {
            ChannelOutcome::Skipped => println!("channel {color}: already clean"),
            ChannelOutcome::Cleaned(r) => println!(
                "channel {color}: {} candidates -> {} cells ({} duplicates, {} repaired, baselines {:?})",
                r.candidates, r.survivors, r.duplicates_removed, r.repaired_timeseries, r.baseline_path
            ),
            ChannelOutcome::Failed(msg) => println!("channel {color}: FAILED: {msg}"),
        }
    }
    if summary.intermediates_removed {
        info!("intermediate directories removed");
    }
    if let Some(msg) = &summary.cleanup_error {
        bail!("all channels are clean but removing the intermediates failed: {msg}");
    }

    if !summary.is_complete() {
        bail!("{} of {} channel(s) failed", summary.failed(), summary.channels.len());
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let cat = CleanCellCatalogue::load(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let owned = cat.volume_id.iter().filter(|&&id| id >= 0).count();
    let sizes: Vec<usize> = cat.cell_x.iter().map(Vec::len).collect();
    let mean_size = if sizes.is_empty() {
        0.0
    } else {
        sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
    };

    println!("{}", path.display());
    println!("  grid:        {}", cat.dims());
    println!("  frames:      {}", cat.t);
    println!("  cells:       {}", cat.n);
    println!("  mean voxels: {mean_size:.1}");
    println!("  owned:       {owned} / {}", cat.volume_id.len());
    Ok(())
}
