//! MyArc server binary: configuration, capability wiring, and the serve loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use myarc_ai::{DisabledInsightClient, GoogleAiClient, GoogleAiConfig, InsightClient};
use myarc_assets::{AssetStore, AssetUrlScanner, DisabledAssetStore, S3AssetStore};
use myarc_crypto::ContentCodec;
use myarc_gateway::{run_server, AppState};
use myarc_journal::{EntryLifecycle, LogNotifier};
use myarc_memory::{MemoryClient, MemoryClientConfig, MemoryStore, NoopMemoryStore};
use myarc_store::JournalDb;

/// Development-only fallback so a bare checkout still boots; anything real
/// must set ENCRYPTION_KEY.
const DEV_FALLBACK_ENCRYPTION_KEY: &str = "myarc-dev-only-encryption-key";

#[derive(Parser, Debug)]
#[command(name = "myarc-server", version, about = "MyArc journaling service")]
struct Cli {
    #[arg(long, env = "MYARC_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    #[arg(long, env = "MYARC_DB_PATH", default_value = "myarc.db")]
    db_path: PathBuf,

    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    encryption_key: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_API_BASE")]
    gemini_api_base: Option<String>,

    #[arg(long, env = "MEM0_API_KEY", hide_env_values = true)]
    mem0_api_key: Option<String>,

    #[arg(long, env = "MEM0_API_BASE")]
    mem0_api_base: Option<String>,

    #[arg(long, env = "S3_BUCKET_NAME")]
    s3_bucket: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    aws_region: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user row and print its API token. Sign-in flows live outside
    /// this service; this is how operators provision access.
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        /// Token to assign; generated when omitted.
        #[arg(long)]
        token: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let db = JournalDb::new(&cli.db_path)
        .with_context(|| format!("failed to open database at {}", cli.db_path.display()))?;

    if let Some(Command::CreateUser { email, name, token }) = &cli.command {
        let token = token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let user = db
            .create_user(email, name.as_deref(), Some(&token))
            .context("failed to create user")?;
        println!("created user {} ({})", user.email, user.id);
        println!("api token: {token}");
        return Ok(());
    }

    let codec = match non_empty(cli.encryption_key.as_ref()) {
        Some(secret) => ContentCodec::new(secret),
        None => {
            warn!("ENCRYPTION_KEY not set; falling back to the development key");
            ContentCodec::new(DEV_FALLBACK_ENCRYPTION_KEY)
        }
    };

    let insight: Arc<dyn InsightClient> = match non_empty(cli.gemini_api_key.as_ref()) {
        Some(api_key) => {
            let mut config = GoogleAiConfig::new(api_key);
            if let Some(api_base) = non_empty(cli.gemini_api_base.as_ref()) {
                config.api_base = api_base.to_string();
            }
            Arc::new(GoogleAiClient::new(config).context("failed to build AI client")?)
        }
        None => {
            info!("GEMINI_API_KEY not set; analysis and embeddings disabled");
            Arc::new(DisabledInsightClient)
        }
    };

    let memory: Arc<dyn MemoryStore> = match non_empty(cli.mem0_api_key.as_ref()) {
        Some(api_key) => {
            let mut config = MemoryClientConfig::new(api_key);
            if let Some(api_base) = non_empty(cli.mem0_api_base.as_ref()) {
                config.api_base = api_base.to_string();
            }
            Arc::new(MemoryClient::new(config).context("failed to build memory client")?)
        }
        None => {
            info!("MEM0_API_KEY not set; long-term memory sync disabled");
            Arc::new(NoopMemoryStore)
        }
    };

    let assets: Arc<dyn AssetStore> = match (
        non_empty(cli.s3_bucket.as_ref()),
        non_empty(cli.aws_region.as_ref()),
    ) {
        (Some(bucket), Some(region)) => Arc::new(S3AssetStore::connect(bucket, region).await),
        _ => {
            info!("S3_BUCKET_NAME/AWS_REGION not set; image uploads disabled");
            Arc::new(DisabledAssetStore)
        }
    };
    let scanner = AssetUrlScanner::new(assets.public_base_url())
        .context("failed to build asset url scanner")?;

    let lifecycle = EntryLifecycle::new(
        db.clone(),
        codec,
        Arc::clone(&assets),
        scanner,
        Arc::clone(&insight),
        Arc::clone(&memory),
    );

    let state = Arc::new(AppState {
        db,
        lifecycle,
        insight,
        memory,
        notifier: Arc::new(LogNotifier),
    });

    run_server(state, &cli.bind).await
}
