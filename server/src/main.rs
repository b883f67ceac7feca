use anyhow::Context;
use chapayev_server::config::ServerConfig;
use chapayev_server::relay::{run_relay, RelayCommand};
use chapayev_server::ws::{router, AppState};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().context("reading configuration")?;
    config.validate().context("invalid server configuration")?;

    let listen_addr = config.listen_addr.clone();
    let app_state = {
        let (relay_tx, relay_rx) = mpsc::channel::<RelayCommand>(config.outbound_buffer);
        let state = AppState {
            relay_tx,
            max_message_bytes: config.max_message_bytes,
            max_parse_errors: config.max_parse_errors,
        };
        tokio::spawn(run_relay(relay_rx, config));
        state
    };

    let app = router(app_state);

    tracing::info!("Starting chapayev relay on {}", listen_addr);
    println!("Chapayev relay listening on {}", listen_addr);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {}", listen_addr))?;
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
