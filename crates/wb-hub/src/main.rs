use axum::{routing::get, Router};
use clap::Parser;
use std::{
    fs::OpenOptions,
    io::{self, Write},
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{error, info};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};
use wb_core::history::DEFAULT_HISTORY_WINDOW;
use wb_storage::RecordStore;

mod dashboard;
mod render;

use dashboard::AppState;

const DEFAULT_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_STORE_PATH: &str = "dashboard_inputs.db";
const DEFAULT_LOG_DIR: &str = ".wellbeing/logs";

#[derive(Clone, Debug)]
struct Config {
    addr: String,
    store_path: PathBuf,
    history_window: usize,
    debug: bool,
    log_dir: String,
}

#[derive(Parser, Debug)]
#[command(name = "wb-hub")]
struct Args {
    #[arg(long, default_value = "")]
    addr: String,
    #[arg(long, default_value = "")]
    store: String,
    #[arg(long, default_value_t = DEFAULT_HISTORY_WINDOW)]
    history_window: usize,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value = "")]
    log_dir: String,
}

#[tokio::main]
async fn main() {
    let config = load_config();
    let _log_guard = init_logging(&config);
    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };
    // no authentication, so never listen beyond this machine
    if !addr.ip().is_loopback() {
        error!(event = "invalid_addr", addr = %config.addr);
        return;
    }

    let store = RecordStore::new(config.store_path.clone());
    match store.initialize() {
        Ok(created) => info!(
            event = "store_ready",
            path = %store.path().display(),
            created = created
        ),
        Err(err) => {
            error!(event = "store_init_failed", path = %store.path().display(), error = %err);
            return;
        }
    }

    let state = Arc::new(AppState::new(store, config.history_window));
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "hub_error", error = %err);
            return;
        }
    };

    info!(event = "hub_start", addr = %config.addr);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "hub_error", error = %err);
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard::form_page).post(dashboard::submit))
        .route("/metrics", get(dashboard::metrics_page))
        .route("/api/metrics", get(dashboard::metrics_json))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

fn load_config() -> Config {
    let args = Args::parse();
    Config {
        addr: resolve_flag(&args.addr, "WB_HUB_ADDR", DEFAULT_ADDR),
        store_path: PathBuf::from(resolve_flag(
            &args.store,
            "WB_STORE_PATH",
            DEFAULT_STORE_PATH,
        )),
        history_window: args.history_window,
        debug: args.debug || env_true("WB_HUB_DEBUG"),
        log_dir: resolve_flag(&args.log_dir, "WB_LOG_DIR", DEFAULT_LOG_DIR),
    }
}

fn init_logging(config: &Config) -> Option<LogGuard> {
    let level = if config.debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("WB_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let writer = match open_log_file(&config.log_dir, &log_file_name(&config.store_path)) {
        Ok(log_guard) => log_guard,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            LogGuard { file: None }
        }
    };
    let file = writer.file.clone();
    let make_writer = BoxMakeWriter::new(move || MultiWriter::new(file.clone()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(writer)
}

struct LogGuard {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

struct MultiWriter {
    stdout: io::Stdout,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl MultiWriter {
    fn new(file: Option<Arc<Mutex<std::fs::File>>>) -> Self {
        Self {
            stdout: io::stdout(),
            file,
        }
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.stdout.write_all(buf);
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.stdout.flush();
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// One log file per store, so hubs pointed at different stores can share a
/// log directory.
fn log_file_name(store_path: &Path) -> String {
    match store_path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) if !stem.trim().is_empty() => format!("wb-hub-{stem}.log"),
        _ => "wb-hub.log".to_string(),
    }
}

fn open_log_file(log_dir: &str, file_name: &str) -> io::Result<LogGuard> {
    if log_dir.trim().is_empty() {
        return Ok(LogGuard { file: None });
    }
    let dir = PathBuf::from(log_dir);
    if std::fs::create_dir_all(&dir).is_err() {
        return Ok(LogGuard { file: None });
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(file_name))?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => is_truthy(&value),
        Err(_) => false,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Flag wins over the environment, which wins over the built-in default.
fn resolve_flag(flag: &str, env_key: &str, default: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    default.to_string()
}
