//! lazythumb - Lazy thumbnail generation.
//!
//! This binary runs the deferred-render server and signs render URLs.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lazythumb::{
    config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat, StorageBackend},
    create_s3_client,
    io::{LocalStorage, ObjectStore, S3Storage, SourceStore},
    server::{create_router, RouterConfig},
    thumbnail::{DeferredUrlSigner, LazyThumbnailService, MemoryKvStore, SignedPayload},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let backend = match config.backend() {
        Ok(backend) => backend,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("lazythumb v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");

    let (sources, storage): (Arc<dyn SourceStore>, Arc<dyn ObjectStore>) = match backend {
        StorageBackend::S3 {
            bucket,
            endpoint,
            region,
            public_base_url,
        } => {
            info!("  S3 bucket: {}", bucket);
            if let Some(ref endpoint) = endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", region);
            info!("  Public URL: {}", public_base_url);

            let client = create_s3_client(endpoint.as_deref(), &region).await;
            let s3 = Arc::new(S3Storage::new(client, bucket, public_base_url));
            (s3.clone(), s3)
        }
        StorageBackend::Local {
            root,
            public_base_url,
        } => {
            info!("  Local root: {}", root.display());
            info!("  Public URL: {}", public_base_url);

            let local = Arc::new(LocalStorage::new(root, public_base_url));
            (local.clone(), local)
        }
    };

    let settings = config.settings();
    info!("  Prefix: {}", settings.prefix);
    info!("  Metadata cache: {} records", config.kv_capacity);
    match settings.server_url {
        Some(ref server_url) => info!("  Mode: deferred ({})", server_url),
        None => info!("  Mode: immediate"),
    }
    if settings.dummy {
        info!("  Dummy images: {}", settings.dummy_source);
    }
    if settings.force_overwrite {
        warn!("  Force overwrite: every render rewrites storage");
    }

    let kv = Arc::new(MemoryKvStore::with_capacity(config.kv_capacity));
    let service = LazyThumbnailService::new(sources, kv, storage, settings);

    let router_config = build_router_config(&config);
    let render_route = router_config.render_route();
    let router = create_router(service, router_config);

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("  Render endpoint: {}", render_route);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "lazythumb=debug,tower_http=debug"
    } else {
        "lazythumb=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_base_path(&config.base_path())
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = match config.parse_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let payload = SignedPayload::new(config.source_ref(), config.geometry.clone(), options);
    if let Err(e) = payload.options.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let signer = DeferredUrlSigner::new(&config.secret);
    let token = match signer.sign(&payload) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let url = match config.server_url.as_deref() {
        Some(server_url) => match signer.deferred_url(server_url, &token) {
            Ok(url) => Some(url),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    match config.format {
        SignOutputFormat::Token => println!("{}", token),
        SignOutputFormat::Url => println!("{}", url.unwrap_or_default()),
        SignOutputFormat::Json => {
            let json = serde_json::json!({
                "token": token,
                "url": url,
                "source": payload.source,
                "geometry": payload.geometry,
                "options": payload.options,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
