use listenfd::ListenFd;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use layoutkit_server::api::register_routes;
use layoutkit_server::application::ServerData;
use layoutkit_server::{ServerConfig, Transport, VERSION};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const CONSOLE_VAR: &str = "LAYOUTKIT_CONSOLE";

fn init_tracing() {
    if std::env::var_os(CONSOLE_VAR).is_some() {
        console_subscriber::init();
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    let mut transport = Transport::new(config);
    register_routes(transport.router(), ServerData::new());

    // Prefer a socket handed over by systemd or systemfd.
    let addr = match ListenFd::from_env().take_tcp_listener(0)? {
        Some(listener) => transport.start_with_listener(listener)?,
        None => transport.start()?,
    };
    info!(version = VERSION, "layoutkit listening on http://{addr}");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    transport.close();

    Ok(())
}
