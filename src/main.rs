use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use boilerplate_kit::database::{Metadata, Table, get_session_pool, int_pk, str_255};
use boilerplate_kit::http::{
    ControllerConfig, DEFAULT_CACHE_DIR, HttpController, RequestOptions, get_cache_transport,
};
use boilerplate_kit::settings::{DbSettings, Settings, SettingsLoader};
use futures_util::FutureExt;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Default)]
struct Args {
    root: Option<PathBuf>,
    url: Option<String>,
    cache_dir: Option<PathBuf>,
    db: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    for arg in env::args().skip(1) {
        if let Some(root) = arg.strip_prefix("--root=") {
            args.root = Some(PathBuf::from(root));
        } else if let Some(url) = arg.strip_prefix("--url=") {
            args.url = Some(url.to_string());
        } else if let Some(dir) = arg.strip_prefix("--cache=") {
            args.cache_dir = Some(PathBuf::from(dir));
        } else if arg == "--cache" {
            args.cache_dir = Some(PathBuf::from(DEFAULT_CACHE_DIR));
        } else if arg == "--db" {
            args.db = true;
        }
    }
    args
}

fn init_tracing(log_level: Option<&str>) {
    let level = match log_level {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") | Some("critical") => Level::ERROR,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    let mut loader = SettingsLoader::new();
    if let Some(root) = &args.root {
        loader = loader.with_root(root);
    }

    let (layered, env_snapshot) = match loader.source() {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return;
        }
    };
    let settings = match Settings::from_source(&layered, &env_snapshot) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid settings: {}", e);
            return;
        }
    };

    init_tracing(Some(settings.log_level.to_lowercase().as_str()));

    info!(
        env = %settings.env,
        container_env = settings.container_env,
        log_level = %settings.log_level,
        files = layered.loaded_files().len(),
        "Settings loaded"
    );

    if let Some(url) = &args.url {
        fetch_json(url, args.cache_dir.clone()).await;
    }

    if args.db {
        match DbSettings::from_source(&layered, &env_snapshot) {
            Ok(db) => init_database(&db).await,
            Err(e) => error!(error = %e, "Invalid database settings"),
        }
    }
}

/// Fetches `url` and logs the decoded JSON body.
async fn fetch_json(url: &str, cache_dir: Option<PathBuf>) {
    let mut config = ControllerConfig::new()
        .with_url(url)
        .with_follow_redirects(true)
        .with_header("Accept", "application/json");

    if let Some(dir) = cache_dir {
        match get_cache_transport(&dir, None, true, 2, None) {
            Ok(transport) => config = config.with_transport(Arc::new(transport)),
            Err(e) => {
                error!(error = %e, "Cache transport unavailable");
                return;
            }
        }
    }

    let result = HttpController::scope(config, |http| {
        async move {
            let request = http.new_request("GET", "", RequestOptions::new())?;
            match http.try_send_request(&request, false, None).await? {
                Some(response) => {
                    let from_cache = response.from_cache();
                    let body: serde_json::Value = http.decode_res_content(&response)?;
                    Ok(Some((body, from_cache)))
                }
                None => Ok(None),
            }
        }
        .boxed()
    })
    .await;

    match result {
        Ok(Some((body, from_cache))) => info!(url = %url, from_cache, body = %body, "Fetched"),
        Ok(None) => error!(url = %url, "Host unreachable"),
        Err(e) => error!(url = %url, error = %e, "Fetch failed"),
    }
}

/// Creates the demo schema and checks that a session can be opened.
async fn init_database(db: &DbSettings) {
    let engine = match db.engine() {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to create database engine");
            return;
        }
    };

    let mut metadata = Metadata::new();
    metadata.register(
        Table::new("events")
            .column(int_pk("id"))
            .column(str_255("name").not_null())
            .with_timestamps(),
    );

    if let Err(e) = metadata.create_all(&engine).await {
        error!(error = %e, uri = %engine.uri(), "Failed to create tables");
        engine.dispose().await;
        return;
    }

    match get_session_pool(&engine).begin().await {
        Ok(session) => {
            if let Err(e) = session.commit().await {
                error!(error = %e, "Failed to commit session");
            } else {
                info!(uri = %engine.uri(), backend = %engine.backend(), "Database ready");
            }
        }
        Err(e) => error!(error = %e, "Failed to open session"),
    }

    engine.dispose().await;
}
