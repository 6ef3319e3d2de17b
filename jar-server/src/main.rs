use clap::Parser;
use colored::*;
use jar_server::{
    router, AppState, InMemoryRepository, MediaStore, MemoryRepository, PgRepository,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jar-server")]
#[command(about = "Backend for shared memory jars", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Base URL clients reach this server at; media links are built from it
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    /// Postgres connection string. Rows are kept in memory when omitted.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Directory uploaded media is stored in
    #[arg(long, env = "MEDIA_DIR", default_value = "media")]
    media_dir: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jar_server=debug,tower_http=debug")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("{}", "Memory Jar Server".bold().cyan());
    tracing::info!("{}", "=================".cyan());

    let repository: Arc<dyn MemoryRepository> = match &args.database_url {
        Some(url) => {
            let db = match PgRepository::new(url).await {
                Ok(db) => db,
                Err(e) => {
                    tracing::error!(%e, "Failed to initialize database");
                    return;
                }
            };
            if let Err(e) = db.run_migrations().await {
                tracing::error!(%e, "Failed to run migrations");
                return;
            }
            tracing::info!("Using Postgres repository");
            Arc::new(db)
        }
        None => {
            tracing::warn!("{}", "DATABASE_URL not set; memories live in memory only".yellow());
            Arc::new(InMemoryRepository::new())
        }
    };

    let public_url = args
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://{}", args.bind));
    let state = Arc::new(AppState::new(
        repository,
        MediaStore::new(&args.media_dir),
        public_url,
    ));

    tracing::info!(
        "Starting jar server on {} (media in {}, links under {})",
        args.bind,
        args.media_dir,
        state.public_url
    );

    let listener = match tokio::net::TcpListener::bind(&args.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%e, addr = %args.bind);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!(%e, addr = %args.bind);
    }
}
