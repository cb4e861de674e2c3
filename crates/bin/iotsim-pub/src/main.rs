//! # iotsim-pub: MQTT test utility
//!
//! Exercises a broker (and a running `iotsimd`) from the command line:
//! publishes a fixed test sequence, a single custom message, or prints
//! everything arriving on a topic.

mod modes;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use iotsim_adapter_mqtt::{MqttBus, MqttConfig};
use iotsim_app::ports::MessageBus;
use iotsim_domain::message::QoS;
use iotsim_domain::time::now;
use iotsim_domain::topic;

/// MQTT test publisher.
#[derive(Debug, Parser)]
#[command(name = "iotsim-pub", version, about)]
struct Cli {
    /// MQTT broker host.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port.
    #[arg(long, default_value_t = 1883)]
    port: u16,

    /// Topic to publish to or subscribe on.
    #[arg(long, default_value = topic::CHAT_REPLY)]
    topic: String,

    /// Custom message to send.
    #[arg(long)]
    message: Option<String>,

    /// QoS level for a custom message.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    qos: u8,

    /// Set the retain flag on a custom message.
    #[arg(long)]
    retain: bool,

    /// Print incoming messages instead of publishing.
    #[arg(long)]
    subscribe: bool,

    /// Send the test sequence (the default when nothing else is asked).
    #[arg(long)]
    test: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Subscribe,
    Custom(String),
    /// `requested` is false when the sequence runs only as the fallback.
    TestSequence { requested: bool },
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.subscribe {
            Mode::Subscribe
        } else if let Some(message) = &self.message {
            Mode::Custom(message.clone())
        } else {
            Mode::TestSequence {
                requested: self.test,
            }
        }
    }

    fn bus(&self, role: &str) -> MqttBus {
        let config = MqttConfig {
            broker_host: self.host.clone(),
            broker_port: self.port,
            ..MqttConfig::default()
        };
        MqttBus::new(config).with_client_id(format!("{role}_{}", now().timestamp()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_env("IOTSIM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("iotsim_pub=info,iotsim=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!("🧪 MQTT Test Utility");
    println!("{}", "=".repeat(40));

    let mode = cli.mode();
    let role = match mode {
        Mode::Subscribe => "test_subscriber",
        Mode::Custom(_) => "custom_publisher",
        Mode::TestSequence { .. } => "test_publisher",
    };
    let bus = cli.bus(role);
    println!("🔗 Connecting to {}:{}...", cli.host, cli.port);
    let events = bus
        .connect()
        .await
        .with_context(|| format!("connecting to {}:{}", cli.host, cli.port))?;
    println!("✅ Connected to broker");

    let outcome = run(&cli, mode, &bus, events).await;
    bus.disconnect().await?;
    outcome
}

async fn run(
    cli: &Cli,
    mode: Mode,
    bus: &MqttBus,
    events: iotsim_app::ports::BusEvents,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    match mode {
        Mode::Subscribe => {
            bus.subscribe(&cli.topic)
                .await
                .with_context(|| format!("subscribing to {}", cli.topic))?;
            println!("📥 Subscribed to: {}", cli.topic);
            println!("Press Ctrl+C to stop...\n");
            let stop = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(%err, "unable to listen for Ctrl-C");
                }
            };
            modes::print_messages(events, &mut stdout, stop).await;
            println!("\n👋 Stopping subscriber...");
        }
        Mode::Custom(message) => {
            let qos = QoS::try_from(cli.qos)?;
            modes::publish_one(bus, &cli.topic, &message, qos, cli.retain)
                .await
                .context("publishing message")?;
            println!("✅ Published: {message}");
            println!("   Topic: {}", cli.topic);
            println!("   QoS: {qos}, Retain: {}", cli.retain);
        }
        Mode::TestSequence { requested } => {
            if !requested {
                println!("No --message or --subscribe given, sending the test sequence");
            }
            println!("\n📨 Publishing to topic: {}\n", cli.topic);
            modes::publish_sequence(bus, &cli.topic, modes::SEQUENCE_INTERVAL, &mut stdout).await;
            println!("✅ Test complete!");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("iotsim-pub").chain(args.iter().copied()))
    }

    #[test]
    fn should_default_to_test_sequence() {
        let cli = parse(&[]);
        assert_eq!(cli.mode(), Mode::TestSequence { requested: false });
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 1883);
        assert_eq!(cli.topic, "mqttchat/demo/room1");
        assert_eq!(cli.qos, 1);
    }

    #[test]
    fn should_prefer_subscribe_over_message() {
        let cli = parse(&["--subscribe", "--message", "hi", "--test"]);
        assert_eq!(cli.mode(), Mode::Subscribe);
    }

    #[test]
    fn should_prefer_message_over_test() {
        let cli = parse(&["--message", "hi", "--test", "--qos", "2", "--retain"]);
        assert_eq!(cli.mode(), Mode::Custom("hi".to_string()));
        assert_eq!(cli.qos, 2);
        assert!(cli.retain);
    }

    #[test]
    fn should_mark_explicit_test_sequence() {
        let cli = parse(&["--test"]);
        assert_eq!(cli.mode(), Mode::TestSequence { requested: true });
    }

    #[test]
    fn should_reject_qos_above_two() {
        let result = Cli::try_parse_from(["iotsim-pub", "--qos", "3"]);
        assert!(result.is_err());
    }
}
