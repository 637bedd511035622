//! CLI for EdgeBus
//!
//! Subcommands:
//! - `listen`: subscribe to one or more patterns and print messages until Ctrl-C
//! - `publish`: send a single message and exit
//! - `status`: publish a device status, retained by default

use clap::Parser;
use edgebus::config::{Settings, load_config};
use edgebus::network::AlwaysReachable;
use edgebus::transport::WsTransport;
use edgebus::utils::logging;
use edgebus::{BusClient, Handler, QoS};
use tracing::{error, info};

type Client = BusClient<WsTransport, AlwaysReachable>;

#[derive(Parser)]
#[command(name = "edgebus")]
enum Command {
    /// Print every message matching the given patterns
    Listen {
        /// Topic pattern; repeat for several (default: everything)
        #[arg(long = "topic", default_value = "#")]
        topics: Vec<String>,
        #[arg(long, default_value_t = 0)]
        qos: u8,
    },
    /// Publish one payload; JSON is sent as-is, anything else as text
    Publish {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        retain: bool,
        #[arg(long, default_value_t = 0)]
        qos: u8,
    },
    /// Publish a device status to `status/<device>`
    Status {
        #[arg(long)]
        device: String,
        #[arg(long)]
        status: String,
        /// Do not retain the status on the broker
        #[arg(long)]
        no_retain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    let result = match cmd {
        Command::Listen { topics, qos } => run_listen(&settings, &topics, qos).await,
        Command::Publish {
            topic,
            payload,
            retain,
            qos,
        } => run_publish(&settings, &topic, &payload, retain, qos).await,
        Command::Status {
            device,
            status,
            no_retain,
        } => run_status(&settings, &device, &status, !no_retain).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn client(settings: &Settings) -> Client {
    let transport = WsTransport::new().with_path(settings.broker.path.clone());
    BusClient::from_settings(transport, AlwaysReachable, settings)
}

async fn run_listen(settings: &Settings, topics: &[String], qos: u8) -> edgebus::Result<()> {
    let qos = QoS::try_from(qos)?;
    let mut client = client(settings);

    let printer = Handler::new(|topic, payload| {
        println!("{topic} {payload}");
        Ok(())
    });
    for topic in topics {
        client.subscribe(topic, printer.clone(), qos).await?;
    }

    client
        .wait_for_messages(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutdown signal received. Exiting gracefully.");
    client.disconnect().await
}

async fn run_publish(
    settings: &Settings,
    topic: &str,
    payload: &str,
    retain: bool,
    qos: u8,
) -> edgebus::Result<()> {
    let qos = QoS::try_from(qos)?;
    let value: serde_json::Value = serde_json::from_str(payload)
        .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));

    client(settings).publish(topic, value, retain, qos).await
}

async fn run_status(
    settings: &Settings,
    device: &str,
    status: &str,
    retain: bool,
) -> edgebus::Result<()> {
    client(settings)
        .publish_status(device, status, retain, QoS::AtLeastOnce)
        .await
}
