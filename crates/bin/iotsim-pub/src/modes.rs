//! The three things the utility can do with a topic.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use iotsim_app::ports::{BusEvent, BusEvents, MessageBus};
use iotsim_domain::error::BusError;
use iotsim_domain::message::{OutboundMessage, QoS};
use iotsim_domain::time::{clock_time, now};

/// Pause between messages of the test sequence.
pub const SEQUENCE_INTERVAL: Duration = Duration::from_secs(1);

/// The built-in test traffic, in publish order.
pub fn test_sequence(topic: &str) -> Vec<OutboundMessage> {
    let sample = serde_json::json!({
        "sensor": "test",
        "value": 42,
        "timestamp": now().to_rfc3339(),
    });
    vec![
        OutboundMessage::new(topic, "Hello from test publisher! 👋", QoS::AtLeastOnce),
        OutboundMessage::new(topic, sample.to_string(), QoS::AtLeastOnce),
        OutboundMessage::new(topic, "Testing QoS 0 (fire and forget)", QoS::AtMostOnce),
        OutboundMessage::new(topic, "Testing QoS 2 (exactly once)", QoS::ExactlyOnce),
        OutboundMessage::new(topic, "This is a retained message 📌", QoS::AtLeastOnce)
            .retained(true),
    ]
}

/// Publish the test sequence, one message per `interval`.
///
/// A refused publish is reported and the sequence goes on. Returns how many
/// messages were accepted.
pub async fn publish_sequence<B, W>(bus: &B, topic: &str, interval: Duration, out: &mut W) -> u32
where
    B: MessageBus,
    W: Write,
{
    let mut sent = 0;
    for (index, message) in test_sequence(topic).into_iter().enumerate() {
        let content = String::from_utf8_lossy(&message.payload).into_owned();
        let (qos, retain) = (message.qos, message.retain);
        let status = match bus.publish(message).await {
            Ok(()) => {
                sent += 1;
                "Sent".to_string()
            }
            Err(err) => {
                tracing::warn!(%err, "publish failed");
                format!("Failed ({err})")
            }
        };
        let _ = writeln!(
            out,
            "Message {}:\n  Content: {}\n  QoS: {qos}, Retain: {retain}\n  Status: {status}\n",
            index + 1,
            preview(&content)
        );
        tokio::time::sleep(interval).await;
    }
    sent
}

/// Publish a single message.
///
/// # Errors
///
/// Returns the bus error if the publish was refused.
pub async fn publish_one<B: MessageBus>(
    bus: &B,
    topic: &str,
    text: &str,
    qos: QoS,
    retain: bool,
) -> Result<(), BusError> {
    bus.publish(OutboundMessage::new(topic, text, qos).retained(retain))
        .await
}

/// Print every message arriving on the subscribed filter until `stop`
/// resolves or the bus goes away. Returns how many messages were printed.
pub async fn print_messages<W, F>(mut events: BusEvents, out: &mut W, stop: F) -> u64
where
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut printed = 0;
    loop {
        tokio::select! {
            () = &mut stop => break,
            event = events.recv() => match event {
                Some(BusEvent::Message(message)) => {
                    let _ = writeln!(
                        out,
                        "[{}] {}: {}",
                        clock_time(message.received_at),
                        message.topic,
                        message.payload_lossy()
                    );
                    printed += 1;
                }
                Some(BusEvent::Disconnected { reason }) => {
                    tracing::warn!(%reason, "connection lost, waiting for reconnect");
                }
                Some(BusEvent::Connected) => tracing::info!("reconnected"),
                None => break,
            },
        }
    }
    printed
}

/// Shorten long payloads the way a terminal preview should.
fn preview(content: &str) -> String {
    if content.chars().count() > 50 {
        let head: String = content.chars().take(50).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotsim_app::in_memory_bus::InMemoryBus;

    const TOPIC: &str = "mqttchat/demo/room1";

    #[test]
    fn should_build_five_message_sequence() {
        let sequence = test_sequence(TOPIC);
        let qos: Vec<QoS> = sequence.iter().map(|m| m.qos).collect();
        assert_eq!(
            qos,
            [
                QoS::AtLeastOnce,
                QoS::AtLeastOnce,
                QoS::AtMostOnce,
                QoS::ExactlyOnce,
                QoS::AtLeastOnce
            ]
        );
        let retained: Vec<bool> = sequence.iter().map(|m| m.retain).collect();
        assert_eq!(retained, [false, false, false, false, true]);
        assert!(sequence.iter().all(|m| m.topic == TOPIC));
    }

    #[test]
    fn should_embed_json_sample() {
        let sequence = test_sequence(TOPIC);
        let value: serde_json::Value = serde_json::from_slice(&sequence[1].payload).unwrap();
        assert_eq!(value["sensor"], "test");
        assert_eq!(value["value"], 42);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn should_truncate_long_previews() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_publish_sequence_one_second_apart() {
        let bus = InMemoryBus::default();
        let _events = bus.connect().await.unwrap();
        let mut tap = bus.tap();
        let mut out = Vec::new();
        let started = tokio::time::Instant::now();

        let sent = publish_sequence(&bus, TOPIC, SEQUENCE_INTERVAL, &mut out).await;

        assert_eq!(sent, 5);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(tap.recv().await.unwrap().payload, "Hello from test publisher! 👋".as_bytes());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Message 5:"));
        assert!(printed.contains("QoS: 2, Retain: false"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_going_when_a_publish_fails() {
        let bus = InMemoryBus::default();
        let mut out = Vec::new();
        let sent = publish_sequence(&bus, TOPIC, SEQUENCE_INTERVAL, &mut out).await;
        assert_eq!(sent, 0);
        assert!(String::from_utf8(out).unwrap().contains("Message 5:"));
    }

    #[tokio::test]
    async fn should_publish_custom_message_with_flags() {
        let bus = InMemoryBus::default();
        let _events = bus.connect().await.unwrap();
        publish_one(&bus, "home/x", "ping", QoS::ExactlyOnce, true)
            .await
            .unwrap();
        let published = bus.published_on("home/x");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].qos, QoS::ExactlyOnce);
        assert!(published[0].retain);
    }

    #[tokio::test]
    async fn should_print_received_messages_with_clock_time() {
        let bus = InMemoryBus::default();
        let events = bus.connect().await.unwrap();
        bus.subscribe("home/#").await.unwrap();
        assert!(bus.inject("home/sensors/temperature", "21.5"));
        bus.disconnect().await.unwrap();

        let mut out = Vec::new();
        let printed = print_messages(events, &mut out, std::future::pending()).await;

        assert_eq!(printed, 1);
        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] home/sensors/temperature: 21.5\n"));
        assert_eq!(line.find(']'), Some(9));
    }
}
