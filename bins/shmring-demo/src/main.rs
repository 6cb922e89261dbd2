use shmring_config::{DemoConfig, Role};
use shmring_conn::{Conn, Listener};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn run_server(config: &DemoConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind(&config.name, config.block_count, config.block_size)?;
    info!(addr = %listener.addr(), "server listening");

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;

    let mut conn = loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown requested before a client connected");
            return Ok(());
        }
        match listener.accept() {
            Ok(conn) => break conn,
            Err(_) => std::thread::sleep(std::time::Duration::from_millis(5)),
        }
    };
    info!("client connected, echoing until EOF or SIGINT");

    let mut buf = vec![0u8; config.block_size as usize];
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown requested, closing connection");
            break;
        }
        let n = conn.read(&mut buf)?;
        if n == 0 {
            info!("client sent no bytes, echo loop exiting");
            break;
        }
        info!(n, "echoing bytes back to client");
        conn.write_all(&buf[..n])?;
    }

    conn.close()?;
    shmring_core::Endpoint::unlink(&config.name)?;
    Ok(())
}

fn run_client(config: &DemoConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Conn::dial(&config.name)?;
    info!(addr = %conn.local_addr(), "dialed server");

    let message = b"hello from shmring-demo client";
    conn.write_all(message)?;
    info!(n = message.len(), "sent message");

    let mut buf = vec![0u8; config.block_size as usize];
    let n = conn.read(&mut buf)?;
    info!(reply = %String::from_utf8_lossy(&buf[..n]), "received echo");

    conn.close()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "shmring-demo.toml".to_string());
    let config = DemoConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match config.role {
        Role::Server => run_server(&config),
        Role::Client => run_client(&config),
    }
}
