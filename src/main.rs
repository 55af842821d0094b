//! Remote-control JSON-RPC server
//!
//! Reads one JSON-RPC request per line on stdin and writes one response per
//! line on stdout. Injected key events are logged by a background thread.
//!
//! Usage: `remote-control-rs [config.toml]` (defaults to configs/default.toml)

use anyhow::Context;
use log::info;
use remote_control_rs::backend::ChannelKeyboardBackend;
use remote_control_rs::config::Config;
use remote_control_rs::registry::InMemoryRegistry;
use remote_control_rs::{JsonRpcDispatcher, RemoteControl};
use std::sync::Arc;
use std::thread;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::load_default().context("loading configs/default.toml")?,
    };

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.settings.log_level.as_str()))
        .init();

    let registry = InMemoryRegistry::new();
    for producer in &config.producers {
        registry.add_producer(&producer.name, &producer.metadata, producer.pairable);
    }

    let (keyboard, events) = ChannelKeyboardBackend::new(config.settings.event_queue);
    thread::Builder::new()
        .name("key-events".to_string())
        .spawn(move || {
            for event in events.iter() {
                info!(
                    "Key {}: {} code {:#06x} -> key {:#06x} modifiers {:#06x}",
                    if event.pressed { "DOWN" } else { "UP" },
                    event.stroke.device,
                    event.stroke.code,
                    event.stroke.key,
                    event.stroke.modifiers
                );
            }
            info!("Key event queue closed");
        })
        .context("spawning key event thread")?;

    let control = RemoteControl::from_config(&config, registry, keyboard);
    control.initialize(&config);

    let dispatcher = Arc::new(JsonRpcDispatcher::new(control));
    info!("Serving {} methods on stdin/stdout", dispatcher.methods().len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        // Handlers do file I/O and may block on a full key event queue
        let handler = Arc::clone(&dispatcher);
        let response = tokio::task::spawn_blocking(move || handler.handle_message(&line))
            .await
            .context("dispatching request")?;

        if let Some(response) = response {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}
