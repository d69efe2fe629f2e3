use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;

use run_playlist_planner::catalog::{CatalogIndex, JsonFileCatalogStore};
use run_playlist_planner::config::{self, load_config};
use run_playlist_planner::errors;
use run_playlist_planner::models::{Decade, SourceLayer, Template, Umbrella};
use run_playlist_planner::music_service::{HttpMusicService, MusicService};
use run_playlist_planner::output;
use run_playlist_planner::playlist::pace::PaceBucket;
use run_playlist_planner::playlist::{pool, preflight, selector};
use run_playlist_planner::usage_store::{JsonFileUsageStore, UsageIndex, UsageStore};

#[derive(Parser)]
#[command(name = "run-playlist-planner")]
#[command(about = "Selects a timed running workout playlist from a layered music catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Force debug-level detail into the JSON output regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and publish a run playlist
    Generate {
        /// Workout template: light, tempo, hiit, intervals, pyramid, kicker
        #[arg(long)]
        template: String,

        /// Target run length in minutes
        #[arg(long)]
        minutes: u32,

        /// Comma-separated genre umbrellas (e.g. "pop,rock")
        #[arg(long, default_value = "")]
        genres: String,

        /// Comma-separated decades (e.g. "90s,00s")
        #[arg(long, default_value = "")]
        decades: String,

        /// Pace bucket A-D, mapped to a cadence anchor
        #[arg(long, default_value = "B")]
        pace: String,

        /// Explicit steps-per-minute override (80-220), replaces the pace bucket anchor
        #[arg(long)]
        spm: Option<f64>,

        /// Seed for the deterministic weighted pick
        #[arg(long)]
        seed: Option<u64>,

        /// Name given to the created playlist
        #[arg(long, default_value = "Run Playlist")]
        name: String,

        /// Whether the created playlist is public
        #[arg(long)]
        public: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print catalog statistics
    Info,
}

fn parse_genres(raw: &str) -> Result<Vec<Umbrella>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Umbrella::parse(s).ok_or_else(|| anyhow!("unknown genre umbrella: {s}")))
        .collect()
}

fn parse_decades(raw: &str) -> Result<Vec<Decade>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Decade::parse(s).ok_or_else(|| anyhow!("unknown decade: {s}")))
        .collect()
}

fn build_catalog(cfg: &config::Config) -> Result<CatalogIndex> {
    let primary = JsonFileCatalogStore { path: cfg.catalog_primary_path.clone(), layer: SourceLayer::Primary };
    let secondary = JsonFileCatalogStore { path: cfg.catalog_secondary_path.clone(), layer: SourceLayer::Secondary };
    let tertiary = JsonFileCatalogStore { path: cfg.catalog_tertiary_path.clone(), layer: SourceLayer::Tertiary };
    CatalogIndex::build(&primary, &secondary, &tertiary).map_err(|e| anyhow!(e))
}

fn run_generate(
    template: String,
    minutes: u32,
    genres: String,
    decades: String,
    pace: String,
    spm: Option<f64>,
    seed: Option<u64>,
    name: String,
    public: bool,
    pretty: bool,
    debug: bool,
) -> Result<()> {
    let template = Template::parse(&template).ok_or_else(|| anyhow!("unknown template: {template}"))?;
    let genres = parse_genres(&genres)?;
    let decades = parse_decades(&decades)?;
    let pace_bucket = PaceBucket::parse(&pace).ok_or_else(|| anyhow!("unknown pace bucket: {pace}"))?;
    let seed = seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
    });

    let cfg = load_config()?;
    let catalog = build_catalog(&cfg)?;
    let usage_store = JsonFileUsageStore { path: cfg.usage_store_path.clone() };
    let usage = UsageIndex::build(&usage_store).map_err(|e| anyhow!(e))?;
    let music_service = HttpMusicService::new(cfg.base_url.clone(), cfg.bearer_token.clone());

    let now = Utc::now();
    log::info!("building candidate pool (genres={:?}, decades={:?})", genres, decades);
    let built_pool = pool::build_pool(&catalog, &usage, &genres, &decades, now).map_err(|e| anyhow!(e))?;
    log::info!("pool built: {} candidates ({} locked out)", built_pool.candidates.len(), built_pool.locked_out.len());

    let market = music_service.get_market();
    let selection = selector::run(
        template,
        minutes,
        pace_bucket,
        spm,
        &genres,
        &built_pool,
        &catalog,
        &usage,
        &music_service,
        &market,
        now,
        seed,
    );
    log::info!("timeline filled: {} tracks selected", selection.chosen.len());

    if selection.chosen.is_empty() {
        let err = errors::PlannerError::EmptySelection;
        return print_error_and_exit(&err);
    }

    let description = format!("Generated {} run, {} minutes", template_label(template), minutes);
    let published = preflight::preflight_and_publish(
        &music_service,
        &usage_store,
        &usage,
        &name,
        &description,
        public,
        selection.chosen.clone(),
        now,
    );

    let published = match published {
        Ok(p) => p,
        Err(e) => return print_error_and_exit(&e),
    };

    let mut report = output::build_report(template, minutes, &genres, &decades, market, &selection, &published, now);
    if !debug {
        report.debug_lines.clear();
    }

    let text = if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn template_label(template: Template) -> &'static str {
    match template {
        Template::Light => "light",
        Template::Tempo => "tempo",
        Template::Hiit => "hiit",
        Template::Intervals => "intervals",
        Template::Pyramid => "pyramid",
        Template::Kicker => "kicker",
        Template::Rest => "rest",
    }
}

fn print_error_and_exit(err: &errors::PlannerError) -> Result<()> {
    log::error!("{err}");
    let body = json!({ "error": err.kind(), "details": err.to_string() });
    println!("{body}");
    std::process::exit(1)
}

fn run_info() -> Result<()> {
    let cfg = load_config()?;
    let catalog = build_catalog(&cfg)?;
    let usage_store = JsonFileUsageStore { path: cfg.usage_store_path.clone() };
    let usage_rows = usage_store.load_all().map_err(|e| anyhow!(e))?;

    let mut primary = 0usize;
    let mut secondary = 0usize;
    let mut tertiary = 0usize;
    for layer in catalog.source.values() {
        match layer {
            SourceLayer::Primary => primary += 1,
            SourceLayer::Secondary => secondary += 1,
            SourceLayer::Tertiary => tertiary += 1,
        }
    }

    let body = json!({
        "tracks": catalog.tracks.len(),
        "artists": catalog.artists.len(),
        "featuredTracks": catalog.features.len(),
        "sourceLikes": primary,
        "sourcePlaylists": secondary,
        "sourceThird": tertiary,
        "usageRows": usage_rows.len(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    match cli.command {
        Command::Generate { template, minutes, genres, decades, pace, spm, seed, name, public, pretty } => {
            run_generate(template, minutes, genres, decades, pace, spm, seed, name, public, pretty, cli.debug)
        }
        Command::Info => run_info(),
    }
}
