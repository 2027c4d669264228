//! CLI for wampsub
//!
//! Subcommands:
//! - `server`: run the WebSocket router
//! - `client`: run a simple smoke-test client against a running router

use std::sync::Arc;

use clap::Parser;
use serde_json::{Value, json};
use tracing::{error, info};

use wampsub::broker::{EventPayload, PublicationId, PublishOptions, SubscribeOptions};
use wampsub::config::load_config;
use wampsub::server::WampServer;
use wampsub::transport::{connect, start_websocket_server};
use wampsub::utils::logging;

#[derive(Parser)]
#[command(name = "wampsub")]
enum Command {
    /// Start the WebSocket router
    Server,
    /// Run the example client (connects, subscribes, publishes, says goodbye)
    Client {
        /// WebSocket router URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Topic used for the round trip
        #[arg(long, default_value = "com.example.chat")]
        topic: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                // no-op when the configured subscriber is already installed
                logging::init("info");
                error!("Server failed: {e}");
            }
        }
        Command::Client { url, topic } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &topic).await {
                error!("Client failed: {e}");
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.logging.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = Arc::new(WampServer::<Value>::from_settings(&config));

    tokio::select! {
        result = start_websocket_server(&addr, server) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(url: &str, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    let connection = connect(url).await?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let handle = connection.client().get_topic(topic);
    let subscription = handle
        .subscribe(
            SubscribeOptions::exact(),
            Arc::new(move |publication_id: PublicationId, payload: &EventPayload<Value>| {
                let _ = tx.send((publication_id, payload.clone()));
            }),
        )
        .await?;
    println!("Subscribed to {topic} as {}", subscription.subscription_id);

    // own events are excluded by default
    let options = PublishOptions {
        exclude_me: false,
        ..PublishOptions::acknowledged()
    };
    let publication = handle
        .publish(options, Some(vec![json!("Hello from wampsub")]), None)
        .await?;
    println!("Published: {publication:?}");

    if let Some((publication_id, payload)) = rx.recv().await {
        println!("Incoming {publication_id}: {:?}", payload.arguments());
    }

    handle.unsubscribe(subscription).await?;
    handle.release();
    connection.close().await?;
    Ok(())
}
