mod config;
mod web;

use config::WavaultConfig;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::LevelFilter;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wavault_core::media::MockMediaFetcher;
use wavault_core::transport::MockTransport;
use wavault_core::{CoreConfig, SessionManager};
use web::WebState;

#[derive(thiserror::Error, Debug)]
enum DaemonError {
    #[error("config")]
    Config,
    #[error("startup")]
    Startup,
    #[error("http")]
    Http,
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let args: Vec<String> = std::env::args().collect();
    let mut path = PathBuf::from("wavault.toml");
    let mut i = 1;
    while i + 1 < args.len() {
        if args[i] == "--config" {
            path = PathBuf::from(&args[i + 1]);
        }
        i += 1;
    }
    let cfg = config::load_config(&path).map_err(|e| {
        eprintln!("cannot load {}: {e}", path.display());
        DaemonError::Config
    })?;
    init_logging(&cfg);

    let manager = init_session(&cfg).await?;
    let web_state = Arc::new(WebState {
        archive_root: cfg.archive_dir(),
        pairing_file: cfg.pairing_file(),
        state_rx: manager.state_watch(),
    });

    let (session_shutdown_tx, session_shutdown_rx) = oneshot::channel();
    let session = tokio::spawn(manager.run(session_shutdown_rx));

    let (http_shutdown_tx, http_shutdown_rx) = oneshot::channel();
    let server = if cfg.http.enabled {
        Some(start_http_server(cfg.http.port, web_state, http_shutdown_rx).await?)
    } else {
        None
    };

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let _ = ctrl_c.as_mut().await;
    log::info!("shutting down");
    let _ = session_shutdown_tx.send(());
    let _ = http_shutdown_tx.send(());
    let _ = session.await;
    if let Some(server) = server {
        let _ = server.await;
    }
    Ok(())
}

fn init_logging(cfg: &WavaultConfig) {
    let level = match cfg.logging.level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// The protocol adapter plugs in behind the transport and fetcher seams;
/// this build wires the in-memory pair the same way tests do.
async fn init_session(cfg: &WavaultConfig) -> Result<SessionManager, DaemonError> {
    let core_cfg = CoreConfig {
        auth_dir: cfg.auth_dir().display().to_string(),
        archive_dir: cfg.archive_dir().display().to_string(),
        pairing_file: cfg.pairing_file().display().to_string(),
        reconnect_delay_ms: cfg.session.reconnect_delay_ms,
        halt_when_logged_out: cfg.session.halt_when_logged_out,
    };
    let transport = Arc::new(MockTransport::new());
    let fetcher = Arc::new(MockMediaFetcher::new());
    SessionManager::init(core_cfg, transport, fetcher)
        .await
        .map_err(|e| {
            log::error!("session startup failed: {e}");
            DaemonError::Startup
        })
}

async fn start_http_server(
    port: u16,
    state: Arc<WebState>,
    shutdown: oneshot::Receiver<()>,
) -> Result<JoinHandle<()>, DaemonError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        log::error!("cannot bind {addr}: {e}");
        DaemonError::Http
    })?;
    log::info!("http surface on {addr}");
    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    break;
                }
                res = listener.accept() => {
                    match res {
                        Ok((stream, _)) => {
                            let state = state.clone();
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    web::handle_request(state.clone(), req)
                                });
                                let _ = http1::Builder::new().serve_connection(io, service).await;
                            });
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });
    Ok(handle)
}
