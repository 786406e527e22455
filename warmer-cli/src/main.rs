mod cli;
mod config;
mod error;

use std::io::Write;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use upstream_cache::{
    CacheLayerConfig, CacheStore, CacheWarmer, CancellationToken, FetchTarget, HttpFetcher,
    MemoryStore, RedisStore, Resolver, TemplateKeySource,
};

use crate::{
    cli::{Args, Commands},
    config::AppConfig,
    error::{AppError, Result},
};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose, args.quiet)?;

    let config = AppConfig::load(args.config.as_deref())?;

    if let Commands::Config { show } = &args.command {
        if *show {
            println!("{}", config.show()?);
        } else {
            println!("Use --show to display the effective configuration");
        }
        return Ok(());
    }

    let layer = config.layer_config()?;
    let store = open_store(&args, &config).await?;
    let fetcher = HttpFetcher::new(&layer.fetcher)?;
    let shutdown = shutdown_on_ctrl_c();

    match args.command {
        Commands::Run => {
            let warmer = build_warmer(store, fetcher, &config, &layer)?;
            warmer.run(shutdown).await;
        }

        Commands::Once => {
            let warmer = build_warmer(store, fetcher, &config, &layer)?;
            let report = warmer.run_cycle(&shutdown).await;
            println!(
                "{:?}: {} filled, {} already cached, {} failed",
                report.outcome, report.filled, report.already_cached, report.failed
            );
        }

        Commands::Resolve {
            key,
            url,
            cached,
            raw,
        } => {
            let url = url
                .parse()
                .map_err(|e| AppError::InvalidInput(format!("invalid URL '{url}': {e}")))?;
            let target = if raw {
                FetchTarget::raw(url)
            } else {
                FetchTarget::json(url)
            };
            let request = fetcher.request(target);
            let resolver = Resolver::new(store, layer.resolver.clone());

            let resolved = if cached {
                resolver.cached_or_fetch(&key, &request, &shutdown).await?
            } else {
                resolver.resolve(&key, &request).await?
            };

            info!(key = %key, source = ?resolved.source, bytes = resolved.data.len(), "Resolved");
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&resolved.data)?;
            stdout.flush()?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn open_store(args: &Args, config: &AppConfig) -> Result<Arc<dyn CacheStore>> {
    if args.memory {
        warn!("Using in-process store; it is not shared with other instances");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let redis = config.redis_config(args.redis_url.as_deref());
    let store = RedisStore::connect(&redis).await?;
    Ok(Arc::new(store))
}

fn build_warmer(
    store: Arc<dyn CacheStore>,
    fetcher: HttpFetcher,
    config: &AppConfig,
    layer: &CacheLayerConfig,
) -> Result<CacheWarmer> {
    let templates = config.key_templates();
    if templates.is_empty() {
        return Err(AppError::InvalidInput(
            "no warm targets configured, add [[targets]] to the configuration file".to_string(),
        ));
    }

    let source = TemplateKeySource::new(fetcher, templates)?;
    info!(targets = config.targets.len(), "Warm targets loaded");
    Ok(CacheWarmer::from_config(store, Arc::new(source), layer)?)
}

/// Token cancelled on the first Ctrl-C
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Received Ctrl-C, shutting down");
        trigger.cancel();
    });

    token
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbose))
        .with(filter)
        .init();

    Ok(())
}
