mod activity;
mod api;
mod cli;
mod commands;
mod config;
mod model;
mod render;
mod session;
mod sync;
#[cfg(test)]
mod testing;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "towerdash",
    about = "Terminal dashboard for checking and applying container image updates"
)]
pub struct Args {
    #[arg(
        long,
        env = "TOWERDASH_API_URL",
        help = "Base URL of the watchtower HTTP API (e.g. http://host:8080/v1)"
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        env = "WATCHTOWER_HTTP_API_TOKEN",
        hide_env_values = true,
        help = "API token (skips the password prompt)"
    )]
    pub token: Option<String>,

    #[arg(long, help = "Remember the token for the next start")]
    pub remember: bool,

    #[arg(short, long, help = "Run one command (e.g. \"check\", \"update all\") and exit")]
    pub command: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Directory for the remembered token")]
    pub storage_dir: Option<PathBuf>,

    #[arg(long, help = "Enable tracing of API requests")]
    pub trace: bool,

    #[arg(long, help = "Verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (print resolved settings)")]
    pub debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    // CLI and environment take priority over config files
    if let Some(api_url) = &args.api_url {
        cfg.api_url = Some(api_url.clone());
    }
    if let Some(storage_dir) = &args.storage_dir {
        cfg.storage_dir = Some(storage_dir.clone());
    }

    // Without an API base path there is nothing to talk to
    let api_url = cfg.api_url.clone().ok_or_else(|| {
        anyhow!("No API base path configured. Use --api-url, TOWERDASH_API_URL, or api_url in .towerdash/config.toml.")
    })?;

    if let Err(errors) = cfg.validate() {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(anyhow!("Invalid configuration:\n  {}", details.join("\n  ")));
    }

    if args.debug {
        eprintln!("[DEBUG] API: {}", api_url);
        eprintln!("[DEBUG] Storage: {}", cfg.storage_dir().display());
        eprintln!("[DEBUG] Activity: {}", cfg.activity_dir().display());
        eprintln!("[DEBUG] Timeout: {:?}", cfg.request_timeout());
    }

    let session = Arc::new(session::Session::new());
    let api: Arc<dyn api::WatchtowerApi> = Arc::new(api::Client::new(
        &api_url,
        session.clone(),
        cfg.request_timeout(),
    ));
    let auth = session::AuthManager::new(session, session::FileStore::new(&cfg.storage_dir()));
    let sync = sync::Synchronizer::new(api.clone());

    let session_id = uuid::Uuid::new_v4().to_string();
    let activity_path = cfg.activity_dir().join(format!("{}.jsonl", session_id));
    let activity = activity::ActivityLog::new(&activity_path, &session_id, &api_url)?;
    if args.debug {
        eprintln!("[DEBUG] Session: {}", activity.session_id());
        eprintln!("[DEBUG] Activity log: {}", activity.path.display());
    }

    let tracing = args.trace;
    let ctx = cli::Context {
        args,
        config: cfg,
        api,
        auth: RefCell::new(auth),
        sync,
        activity: RefCell::new(activity),
        tracing: RefCell::new(tracing),
    };

    if let Some(command) = ctx.args.command.clone() {
        cli::run_once(&ctx, &command)
    } else {
        cli::run_repl(ctx)
    }
}
