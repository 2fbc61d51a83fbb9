use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use project_a_tracker::{
    shell, ActivityType, ElapsedClock, HttpRemote, SessionController, TrackerConfig,
};

/// Session tracker: local timer shell backed by the Project-A session service
#[derive(Parser)]
#[command(name = "project-a-tracker")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./project-a.toml if present)
    #[arg(long, env = "PROJECT_A_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the session service
    #[arg(long, env = "PROJECT_A_REMOTE_URL")]
    remote_url: Option<String>,

    /// Address for the local shell API
    #[arg(long, env = "PROJECT_A_BIND")]
    bind: Option<SocketAddr>,

    /// User the sessions are tracked for
    #[arg(long, env = "PROJECT_A_USER_ID")]
    user_id: Option<String>,

    /// Default module for new drafts
    #[arg(long)]
    module: Option<String>,

    /// Default activity type for new drafts
    #[arg(long, value_enum)]
    activity_type: Option<ActivityType>,

    /// Force debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut TrackerConfig) {
        if let Some(url) = self.remote_url {
            config.remote.base_url = url;
        }
        if let Some(bind) = self.bind {
            config.shell.bind = bind;
        }
        if let Some(user_id) = self.user_id {
            config.defaults.user_id = user_id;
        }
        if let Some(module) = self.module {
            config.defaults.module = module;
        }
        if let Some(activity_type) = self.activity_type {
            config.defaults.activity_type = activity_type;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = TrackerConfig::load(cli.config.as_deref()).context("loading config")?;
    cli.apply(&mut config);
    config.validate().context("validating config")?;

    let remote = HttpRemote::new(&config.remote.base_url, config.timeout());
    let controller = Arc::new(SessionController::new(
        remote,
        ElapsedClock::new(config.tick()),
        config.initial_draft(),
    ));
    let app = shell::router(controller);

    let addr = config.shell.bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, remote = %config.remote.base_url, "session tracker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving shell API")?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
