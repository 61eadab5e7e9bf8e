// SPDX-License-Identifier: GPL-3.0-or-later
mod adapters;

use adapters::{DialogueLayer, DisabledMetadata, FrameAnalysisGather, FrameHashLayer};
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidsort_application::metadata::{MetadataMatcher, MetadataSearch};
use vidsort_application::phash::PhashMatcher;
use vidsort_application::pipeline::{AudioLayer, EscalationPipeline, HashLayer, VisualGather};
use vidsort_application::{InMemoryEventBus, Organizer, RunEngine};
use vidsort_audio::{AudioMatcher, OpenSubtitlesClient, SegmentExtractor, WhisperTranscriber};
use vidsort_config::AppConfig;
use vidsort_domain::RunStatistics;
use vidsort_infrastructure::{
    init_database, BuilderControl, ReferenceBuilder, SqliteHashStore, SqliteReferenceRepository,
};
use vidsort_tmdb::TmdbClient;
use vidsort_visual::{FaceRecognitionCli, FaceRecognizer, TesseractRecognizer, TextRecognizer, VisualAnalyzer};

#[derive(Parser)]
#[command(name = "vidsort", version, about = "Identify and organize movie and series files")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process the source directory once
    Run(RunArgs),
    /// Build the perceptual-hash reference catalog from an organized library
    BuildReference(BuildReferenceArgs),
    /// Print the effective configuration
    PrintConfig,
}

#[derive(Args)]
struct RunArgs {
    /// Source directory to scan (overrides the configuration)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Destination for movies
    #[arg(long)]
    movies: Option<PathBuf>,

    /// Destination for series
    #[arg(long)]
    series: Option<PathBuf>,

    /// Destination for unrecognized files
    #[arg(long)]
    unknown: Option<PathBuf>,

    /// Report decisions without moving anything
    #[arg(long)]
    dry_run: bool,

    /// Disable the metadata layer
    #[arg(long)]
    no_layer0: bool,

    /// Disable the perceptual-hash layer
    #[arg(long)]
    no_layer1: bool,

    /// Disable the audio layer
    #[arg(long)]
    no_layer2: bool,

    /// Disable the verification layer
    #[arg(long)]
    no_layer3: bool,
}

#[derive(Args)]
struct BuildReferenceArgs {
    /// Organized movie library to index (defaults to the configured
    /// movies destination)
    #[arg(long)]
    library: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = vidsort_config::load(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::BuildReference(args) => build_reference(config, args).await,
        Command::PrintConfig => {
            println!("{:#?}", config);
            Ok(())
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let fmt_layer = fmt::layer().with_target(true).with_level(true);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if let Some(source) = args.source {
        config.library.source = source;
    }
    if let Some(movies) = args.movies {
        config.library.movies = movies;
    }
    if let Some(series) = args.series {
        config.library.series = series;
    }
    if let Some(unknown) = args.unknown {
        config.library.unknown = Some(unknown);
    }
    if args.dry_run {
        config.library.move_files = false;
    }
    config.layers.layer0_enabled &= !args.no_layer0;
    config.layers.layer1_enabled &= !args.no_layer1;
    config.layers.layer2_enabled &= !args.no_layer2;
    config.layers.layer3_enabled &= !args.no_layer3;

    let metadata = metadata_search(&config)?;
    let hash_layer = hash_layer(&config).await?;
    let audio_layer = audio_layer(&config)?;
    let visual_gather = visual_gather(&config);

    let pipeline = EscalationPipeline::new(
        config.layers.clone(),
        config.tmdb.min_score,
        config.tmdb.fallback_min_score,
        metadata,
        hash_layer,
        audio_layer,
        visual_gather,
    );
    let organizer = Organizer::new(
        config.library.movies.clone(),
        config.library.series.clone(),
        config.library.unknown.clone(),
        config.library.move_files,
    );
    let engine = RunEngine::new(
        config.library.source.clone(),
        config.library.video_extensions.clone(),
        pipeline,
        organizer,
        InMemoryEventBus::new(),
    );

    let stats = engine.run().await?;
    print_summary(&stats, config.library.move_files);
    Ok(())
}

fn metadata_search(config: &AppConfig) -> Result<Arc<dyn MetadataSearch>> {
    match &config.tmdb.api_key {
        Some(api_key) => {
            let mut builder = TmdbClient::builder(api_key)
                .language(&config.tmdb.language)
                .timeout(Duration::from_secs(config.tmdb.timeout_secs))
                .rate_limit_interval(Duration::from_millis(config.tmdb.rate_limit_millis));
            if let Some(base_url) = &config.tmdb.base_url {
                builder = builder.base_url(base_url);
            }
            Ok(Arc::new(MetadataMatcher::new(builder.build()?)))
        }
        None if config.layers.layer0_enabled => {
            bail!("tmdb.api_key is required unless the metadata layer is disabled")
        }
        None => Ok(Arc::new(DisabledMetadata)),
    }
}

async fn hash_layer(config: &AppConfig) -> Result<Option<Arc<dyn HashLayer>>> {
    if !config.layers.layer1_enabled {
        return Ok(None);
    }

    let pool = init_database(config).await?;
    let store = SqliteHashStore::load(pool).await?;
    if store.is_empty() {
        warn!(
            target: "cli",
            "reference catalog is empty, the hash layer will fall back to visual evidence"
        );
        return Ok(None);
    }

    let matcher = PhashMatcher::new(Arc::new(store));
    Ok(Some(Arc::new(FrameHashLayer::new(matcher))))
}

fn audio_layer(config: &AppConfig) -> Result<Option<Arc<dyn AudioLayer>>> {
    if !config.layers.layer2_enabled {
        return Ok(None);
    }

    let extractor = SegmentExtractor::new(config.audio.segments, config.audio.segment_secs);
    let transcriber = Arc::new(WhisperTranscriber::new(
        &config.audio.whisper_model,
        &config.audio.language,
    ));

    let mut builder = OpenSubtitlesClient::builder()
        .languages(&config.opensubtitles.languages)
        .timeout(Duration::from_secs(config.opensubtitles.timeout_secs))
        .rate_limit_interval(Duration::from_millis(config.opensubtitles.rate_limit_millis));
    if let Some(api_key) = &config.opensubtitles.api_key {
        builder = builder.api_key(api_key);
    }
    if let Some(base_url) = &config.opensubtitles.base_url {
        builder = builder.base_url(base_url);
    }

    let matcher = AudioMatcher::new(extractor, transcriber, builder.build()?);
    Ok(Some(Arc::new(DialogueLayer::new(matcher))))
}

fn visual_gather(config: &AppConfig) -> Option<Arc<dyn VisualGather>> {
    if !(config.layers.layer1_enabled || config.layers.layer3_enabled) {
        return None;
    }

    let ocr: Option<Arc<dyn TextRecognizer>> = config
        .visual
        .ocr_enabled
        .then(|| Arc::new(TesseractRecognizer::default()) as Arc<dyn TextRecognizer>);

    let faces: Option<Arc<dyn FaceRecognizer>> = match (
        config.visual.facial_recognition_enabled,
        &config.visual.known_faces_dir,
    ) {
        (true, Some(dir)) => Some(Arc::new(FaceRecognitionCli::new(
            dir,
            config.visual.min_confidence,
        ))),
        (true, None) => {
            warn!(
                target: "cli",
                "facial recognition enabled but visual.known_faces_dir is unset, skipping"
            );
            None
        }
        _ => None,
    };

    let analyzer = VisualAnalyzer::new(ocr, faces);
    analyzer
        .has_recognizers()
        .then(|| Arc::new(FrameAnalysisGather::new(analyzer)) as Arc<dyn VisualGather>)
}

async fn build_reference(config: AppConfig, args: BuildReferenceArgs) -> Result<()> {
    let library = args.library.unwrap_or_else(|| config.library.movies.clone());

    let Some(api_key) = &config.tmdb.api_key else {
        bail!("tmdb.api_key is required to resolve library titles");
    };
    let mut builder = TmdbClient::builder(api_key)
        .language(&config.tmdb.language)
        .timeout(Duration::from_secs(config.tmdb.timeout_secs))
        .rate_limit_interval(Duration::from_millis(config.tmdb.rate_limit_millis));
    if let Some(base_url) = &config.tmdb.base_url {
        builder = builder.base_url(base_url);
    }
    let metadata: Arc<dyn MetadataSearch> = Arc::new(MetadataMatcher::new(builder.build()?));

    let pool = init_database(&config).await?;
    let repository = Arc::new(SqliteReferenceRepository::new(pool));

    let control = BuilderControl::new();
    spawn_signal_handlers(control.clone());

    let reference = ReferenceBuilder::new(
        repository,
        metadata,
        control,
        config.tmdb.min_score,
        config.library.video_extensions.clone(),
    );
    let stats = reference.build_from_library(&library).await?;

    println!("Reference build finished");
    println!("  titles processed:  {}", stats.titles_processed);
    println!("  titles skipped:    {}", stats.titles_skipped);
    println!("  hashes stored:     {}", stats.hashes_stored);
    println!("  errors:            {}", stats.errors);
    println!("  elapsed:           {:.1}s", stats.elapsed.as_secs_f64());
    Ok(())
}

/// Ctrl-C stops the builder; on Unix SIGUSR1 pauses it and SIGUSR2 resumes.
fn spawn_signal_handlers(control: BuilderControl) {
    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(target: "cli", "interrupt received, stopping after the current title");
                control.stop();
            }
        });
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let pause = control.clone();
        tokio::spawn(async move {
            let Ok(mut usr1) = signal(SignalKind::user_defined1()) else {
                return;
            };
            while usr1.recv().await.is_some() {
                info!(target: "cli", "pause requested");
                pause.pause();
            }
        });

        tokio::spawn(async move {
            let Ok(mut usr2) = signal(SignalKind::user_defined2()) else {
                return;
            };
            while usr2.recv().await.is_some() {
                info!(target: "cli", "resume requested");
                control.resume();
            }
        });
    }
}

fn print_summary(stats: &RunStatistics, moved: bool) {
    let verb = if moved { "moved" } else { "would move" };
    println!("Run finished in {}", stats.elapsed_display());
    println!("  movies {}:          {}", verb, stats.movies_moved);
    println!("  episodes {}:        {}", verb, stats.series_moved);
    println!("  extras {}:          {}", verb, stats.extras_moved);
    println!("  deferred:             {}", stats.deferred);
    println!("  unrecognized:         {}", stats.unrecognized);
    println!("  errors:               {}", stats.errors);
    println!(
        "  layer runs:           hash {} / audio {} / verification {}",
        stats.layer1_runs, stats.layer2_runs, stats.layer3_runs
    );
    println!("  visual analyses:      {}", stats.visual_analysis_runs);
    println!("  alternative hits:     {}", stats.alternative_search_hits);
    if !stats.actors_seen.is_empty() {
        println!(
            "  actors recognized:    {}",
            stats
                .actors_seen
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
