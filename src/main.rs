use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mineralis::config::{DiscoveryStrategy, SiteProfile};
use mineralis::dataset;
use mineralis::fetch::FetcherSpec;
use mineralis::index::{DiscoveredLinks, LinkDiscoverer};
use mineralis::merge;
use mineralis::parser::RecordParser;
use mineralis::periodic;
use mineralis::report::{self, RunReport};
use mineralis::stats::HarvestStats;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "mineralis")]
#[command(about = "Harvest mineral density, hardness and composition into a CSV dataset")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, harvest and write the mineral dataset
    Harvest(HarvestArgs),
    /// List the detail-page links the index yields, without harvesting
    Links(SiteArgs),
    /// Patch an existing dataset with hand-edited records
    Overlay(OverlayArgs),
}

/// Options shared by every command that talks to the site
#[derive(Args)]
struct SiteArgs {
    /// TOML site profile (built-in webmineral profile if omitted)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Page fetcher: "http" or "file"
    #[arg(long)]
    fetcher: Option<String>,

    /// Root directory of an offline copy of the site (for --fetcher file)
    #[arg(long)]
    mirror: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// First index row position to poll (positional discovery)
    #[arg(long)]
    first: Option<u32>,

    /// Last index row position to poll (positional discovery)
    #[arg(long)]
    last: Option<u32>,
}

#[derive(Args)]
struct HarvestArgs {
    /// Periodic table CSV; its symbol column defines the element columns
    #[arg(long)]
    periodic_table: PathBuf,

    /// Dataset CSV to write; side reports go next to it
    #[arg(short, long, default_value = "Minerals.csv")]
    output: PathBuf,

    /// Number of concurrent workers (one batch each)
    #[arg(long)]
    workers: Option<usize>,

    /// Dry run - harvest but don't write output files
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    site: SiteArgs,
}

#[derive(Args)]
struct OverlayArgs {
    /// Previously written dataset CSV
    #[arg(long)]
    dataset: PathBuf,

    /// Hand-edited CSV whose rows replace or extend the dataset
    #[arg(long)]
    custom: PathBuf,

    /// Periodic table CSV; its symbol column defines the element columns
    #[arg(long)]
    periodic_table: PathBuf,

    /// Patched dataset to write
    #[arg(short, long, default_value = "CurrentMinerals.csv")]
    output: PathBuf,
}

fn load_profile(args: &SiteArgs, workers: Option<usize>) -> Result<SiteProfile> {
    let mut profile = match &args.profile {
        Some(path) => SiteProfile::load(path)
            .with_context(|| format!("Failed to load site profile: {}", path.display()))?,
        None => SiteProfile::default(),
    };

    if let Some(kind) = &args.fetcher {
        profile.fetch.kind = kind.clone();
    }
    if args.mirror.is_some() {
        profile.fetch.mirror = args.mirror.clone();
    }
    if let Some(timeout) = args.timeout {
        profile.fetch.timeout_secs = timeout;
    }
    if let Some(workers) = workers {
        profile.fetch.workers = workers;
    }
    match &mut profile.discovery {
        DiscoveryStrategy::Positional { first, last, .. } => {
            if let Some(f) = args.first {
                *first = f;
            }
            if args.last.is_some() {
                *last = args.last;
            }
        }
        DiscoveryStrategy::Structural { .. } => {
            if args.first.is_some() || args.last.is_some() {
                warn!("--first/--last only apply to positional discovery; ignored");
            }
        }
    }

    profile.validate()?;
    Ok(profile)
}

fn discover(profile: &SiteProfile, spec: &FetcherSpec) -> Result<DiscoveredLinks> {
    let discoverer = LinkDiscoverer::new(profile)?;
    let fetcher = spec
        .build()
        .context("Failed to build fetcher for link discovery")?;
    discoverer
        .discover(&fetcher)
        .with_context(|| format!("Failed to read index: {}", profile.site.index_url))
}

fn run_harvest(args: HarvestArgs) -> Result<()> {
    let start = Instant::now();
    let profile = load_profile(&args.site, args.workers)?;
    let symbols = periodic::load_symbols(&args.periodic_table)?;
    let spec = FetcherSpec::from_config(&profile.fetch)?;
    let parser = RecordParser::new(&profile)?;

    let start_discovery = Instant::now();
    let discovered = discover(&profile, &spec)?;
    let discovery_duration = start_discovery.elapsed();
    info!(
        duration_secs = discovery_duration.as_secs_f64(),
        links = discovered.links.len(),
        "Discovery complete"
    );

    let stats = HarvestStats::new();
    let start_harvest = Instant::now();
    let factory = || spec.build();
    let harvest = mineralis::extract::run_harvest(
        &discovered.links,
        profile.fetch.workers,
        &factory,
        &parser,
        &stats,
    )?;
    let harvest_duration = start_harvest.elapsed();

    let records_harvested = harvest.records.len();
    let deduplicated = merge::deduplicate(harvest.records);
    let duplicates = report::log_duplicates(&deduplicated.duplicates);

    let mut skipped = discovered.skipped;
    skipped.extend(harvest.skipped);

    let mut run_report = RunReport {
        links_discovered: discovered.links.len(),
        records_harvested,
        unique_minerals: deduplicated.unique.len(),
        skipped,
        duplicates,
        failed_workers: harvest.failed_workers,
        stats: stats.snapshot(),
        ..RunReport::default()
    };

    if args.dry_run {
        info!("Dry run, nothing written");
    } else {
        let summary = dataset::write_dataset(&args.output, &deduplicated.unique, &symbols)
            .with_context(|| format!("Failed to write dataset: {}", args.output.display()))?;
        if !summary.unknown_elements.is_empty() {
            warn!(
                symbols = ?summary.unknown_elements,
                "Elements missing from the periodic table were dropped"
            );
        }
        run_report.rare_earth = summary.rare_earth;
        run_report.unknown_elements = summary.unknown_elements.into_iter().collect();

        let dir = report::report_dir(&args.output);
        report::write_skipped(&dir, &run_report.skipped)?;
        report::write_rare_earth(&dir, &run_report.rare_earth)?;
        run_report.duration_secs = start.elapsed().as_secs_f64();
        report::write_run_report(&dir, &run_report)?;
    }

    println!();
    println!("=== Summary ===");
    println!(
        "Discovery time:     {:.2}s",
        discovery_duration.as_secs_f64()
    );
    println!("Harvest time:       {:.2}s", harvest_duration.as_secs_f64());
    println!("Total time:         {:.2}s", start.elapsed().as_secs_f64());
    println!();
    println!("Links discovered:   {}", run_report.links_discovered);
    println!("Pages fetched:      {}", stats.fetched());
    println!("Records parsed:     {}", stats.records());
    println!("Unique minerals:    {}", run_report.unique_minerals);
    println!("Duplicate names:    {}", run_report.duplicates.len());
    for name in &run_report.duplicates {
        println!("  {}", name);
    }
    println!("Skipped links:      {}", run_report.skipped.len());
    println!("Timeouts:           {}", stats.timed_out());
    println!("Redirects followed: {}", stats.redirects());
    println!("Rare-earth:         {}", run_report.rare_earth.len());
    println!("Failed workers:     {}", run_report.failed_workers.len());
    for failure in &run_report.failed_workers {
        println!(
            "  worker {} lost {} links: {}",
            failure.worker, failure.urls, failure.message
        );
    }

    Ok(())
}

fn run_links(args: SiteArgs) -> Result<()> {
    let profile = load_profile(&args, None)?;
    let spec = FetcherSpec::from_config(&profile.fetch)?;
    let discovered = discover(&profile, &spec)?;

    for link in &discovered.links {
        println!("{}", link);
    }
    eprintln!(
        "{} links, {} skipped",
        discovered.links.len(),
        discovered.skipped.len()
    );
    Ok(())
}

fn run_overlay(args: OverlayArgs) -> Result<()> {
    let symbols = periodic::load_symbols(&args.periodic_table)?;
    let baseline = dataset::read_dataset(&args.dataset)?;
    let overlays = dataset::read_dataset(&args.custom)?;

    let outcome = merge::overlay(baseline, overlays);
    let changes = report::log_overlay(&outcome);

    dataset::write_dataset(&args.output, &outcome.merged, &symbols)
        .with_context(|| format!("Failed to write dataset: {}", args.output.display()))?;

    println!();
    println!("=== Summary ===");
    println!("Minerals written:   {}", outcome.merged.len());
    println!("Added:              {}", outcome.added.len());
    println!("Replaced:           {}", outcome.modified.len());
    for change in &changes {
        println!("  {}", change);
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Harvest(args) => run_harvest(args),
        Commands::Links(args) => run_links(args),
        Commands::Overlay(args) => run_overlay(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
