use clap::Parser;
use pokedex_sync::etl::{
    DEFAULT_BASE_URL, EtlCoordinator, PokeApiExtractor, PokemonLoader, RunOptions, RunOutcome,
};
use pokedex_sync::{db, init_logger};
use std::process::ExitCode;

/// Sync Pokémon data from the PokéAPI into PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "pokedex-sync", version, about)]
struct Args {
    /// Maximum number of Pokémon to sync; omit for the full catalog.
    #[arg(long)]
    limit: Option<u32>,

    /// Pokémon per batch.
    #[arg(long, default_value_t = 20)]
    batch_size: usize,

    /// Concurrent workers within a batch.
    #[arg(long, default_value_t = 4)]
    max_workers: usize,

    /// Skip the end-of-run retry pass for failed Pokémon.
    #[arg(long)]
    skip_retry: bool,

    /// Resume from this Pokédex ID (not yet implemented).
    #[arg(long)]
    start_from: Option<i32>,

    /// Re-sync even if data appears current (not yet implemented).
    #[arg(long)]
    force: bool,

    /// Enable debug logging.
    #[arg(long, short)]
    verbose: bool,

    /// PokéAPI base URL.
    #[arg(long, env = "POKEAPI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    if args.start_from.is_some() {
        log::warn!("--start-from is not implemented yet; syncing from the beginning");
    }
    if args.force {
        log::warn!("--force is not implemented yet; upserts always overwrite");
    }

    let pool = match db::connect(&args.database_url).await {
        Ok(pool) => pool,
        Err(err) => {
            log::error!("failed to connect to database: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = db::run_migrations(&pool).await {
        log::error!("database migrations failed: {}", err);
        return ExitCode::FAILURE;
    }
    log::info!("database migrations successful");

    let extractor = match PokeApiExtractor::new(&args.base_url) {
        Ok(extractor) => extractor,
        Err(err) => {
            log::error!("failed to build api client: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let loader = PokemonLoader::new(pool);
    let coordinator = EtlCoordinator::new(extractor, loader);

    let options = RunOptions {
        limit: args.limit,
        batch_size: args.batch_size,
        max_workers: args.max_workers,
        retry_failed: !args.skip_retry,
    };

    let report = match coordinator.run(options).await {
        Ok(report) => report,
        Err(err) => {
            log::error!("pipeline failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "sync {}: {} processed, {} successful, {} failed in {:.1}s",
        report.outcome,
        report.stats.total_processed,
        report.stats.successful,
        report.stats.failed,
        report.elapsed.as_secs_f64()
    );
    if !report.stats.failed_ids.is_empty() {
        println!("failed pokemon ids: {:?}", report.stats.failed_ids);
    }

    match report.outcome {
        RunOutcome::Failed => ExitCode::FAILURE,
        RunOutcome::Success | RunOutcome::Degraded => ExitCode::SUCCESS,
    }
}
