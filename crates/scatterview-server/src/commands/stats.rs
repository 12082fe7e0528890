use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use scatterview_core::config::SourceSettings;
use scatterview_core::source::{open_source, resolve};
use scatterview_core::stats::{accumulate, AccumulatedStatistics};
use scatterview_server::state::{DotenvProvider, EnvProvider};

use super::load_config;

#[derive(Args)]
pub struct StatsArgs {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Read the local data directory instead of the remote store
    #[arg(long)]
    pub dev: bool,

    /// Scans per parallel batch, overrides the config
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub fn run(args: &StatsArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(batch_size) = args.batch_size {
        config.source.stats_batch_size = batch_size;
    }

    let settings = if args.dev || config.dev_mode {
        SourceSettings::Local(config.source.local_settings())
    } else {
        let credentials = DotenvProvider::new(&config.env_file).store_env().validate()?;
        SourceSettings::Remote(config.source.remote_settings(&credentials))
    };

    let source = open_source(&settings)?;
    let (scans, mask) = resolve(source.as_ref())?;

    let pb = ProgressBar::new(scans.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Reducing scans");
    let progress = |done: usize| pb.set_position(done as u64);

    let accumulation = accumulate(
        &scans,
        &mask,
        source.as_ref(),
        AccumulatedStatistics::default(),
        &[],
        &config.source.accumulate_options(),
        &CancellationToken::new(),
        Some(&progress),
    )?;
    pb.finish_with_message("Scans reduced");

    print_table(&source.location(), &accumulation.statistics, mask.selected_count());
    Ok(())
}

fn print_table(location: &str, stats: &AccumulatedStatistics, selected_pixels: usize) {
    let title = Style::new().cyan().bold();
    let label = Style::new().dim();
    let value = Style::new().bold().white();
    let gap = Style::new().dim().yellow();

    println!();
    println!("  {}", title.apply_to("Scan statistics"));
    println!("  {:<16}{}", label.apply_to("Source"), value.apply_to(location));
    println!("  {:<16}{}", label.apply_to("Scans"), value.apply_to(stats.len()));
    println!(
        "  {:<16}{}",
        label.apply_to("Mask pixels"),
        value.apply_to(selected_pixels)
    );
    println!();
    println!("  {:>5}  {:<32}  {:>14}  {:>14}", "#", "Scan", "Max", "Mean");
    println!("  {}", "-".repeat(71));

    let rows = stats
        .image_names()
        .iter()
        .zip(stats.max_intensities())
        .zip(stats.avg_intensities())
        .zip(stats.gaps());
    for (i, (((name, max), mean), reason)) in rows.enumerate() {
        match (reason, max, mean) {
            (Some(reason), _, _) => {
                println!("  {:>5}  {:<32}  {}", i, name, gap.apply_to(reason));
            }
            (None, Some(max), Some(mean)) => {
                println!("  {:>5}  {:<32}  {:>14.3}  {:>14.3}", i, name, max, mean);
            }
            _ => {
                println!(
                    "  {:>5}  {:<32}  {}",
                    i,
                    name,
                    gap.apply_to("no pixels selected")
                );
            }
        }
    }

    if stats.gap_count() > 0 {
        println!();
        println!(
            "  {} {}",
            gap.apply_to(stats.gap_count()),
            label.apply_to("scans could not be reduced")
        );
    }
}
