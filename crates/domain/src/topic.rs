//! The stable topic namespace and MQTT topic-filter matching.
//!
//! Topic strings are consumed by existing subscribers and must not change.

/// Temperature readings.
pub const TEMPERATURE: &str = "home/sensors/temperature";
/// Motion events.
pub const MOTION: &str = "home/sensors/motion";
/// Living-room light state.
pub const LIGHT: &str = "home/lights/living_room";
/// Energy meter readings.
pub const ENERGY: &str = "home/energy/meter";
/// Periodic system announcement.
pub const SYSTEM_STATUS: &str = "home/system/status";
/// Room that receives chat replies.
pub const CHAT_REPLY: &str = "mqttchat/demo/room1";

/// Filter matching device commands (`home/<device>/command`).
pub const COMMAND_FILTER: &str = "home/+/command";
/// Filter matching chat traffic (`mqttchat/<room>/<id>`).
pub const CHAT_FILTER: &str = "mqttchat/+/+";

/// Filters the engine subscribes to.
pub const SUBSCRIPTIONS: [&str; 2] = [COMMAND_FILTER, CHAT_FILTER];

/// Topic carrying the state of a single door.
#[must_use]
pub fn door(door: &str) -> String {
    format!("home/doors/{door}")
}

/// Topic carrying acknowledgments for `device`.
#[must_use]
pub fn device_status(device: &str) -> String {
    format!("home/{device}/status")
}

/// Extract `<device>` from `home/<device>/command`.
#[must_use]
pub fn command_target(topic: &str) -> Option<&str> {
    let mut levels = topic.split('/');
    match (levels.next(), levels.next(), levels.next(), levels.next()) {
        (Some("home"), Some(device), Some("command"), None) if !device.is_empty() => Some(device),
        _ => None,
    }
}

/// Extract `(<room>, <id>)` from `mqttchat/<room>/<id>`.
#[must_use]
pub fn chat_route(topic: &str) -> Option<(&str, &str)> {
    let mut levels = topic.split('/');
    match (levels.next(), levels.next(), levels.next(), levels.next()) {
        (Some("mqttchat"), Some(room), Some(id), None) => Some((room, id)),
        _ => None,
    }
}

/// MQTT topic-filter matching with `+` (one level) and a trailing `#`.
///
/// Topics starting with `$` are never matched by a leading wildcard.
#[must_use]
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_extract_command_target() {
        assert_eq!(command_target("home/lamp1/command"), Some("lamp1"));
    }

    #[test]
    fn should_reject_command_topic_with_extra_levels() {
        assert_eq!(command_target("home/lamp1/command/extra"), None);
        assert_eq!(command_target("home/lamp1/status"), None);
        assert_eq!(command_target("home//command"), None);
    }

    #[test]
    fn should_extract_chat_route() {
        assert_eq!(chat_route("mqttchat/demo/room1"), Some(("demo", "room1")));
        assert_eq!(chat_route("mqttchat/demo"), None);
        assert_eq!(chat_route("chat/demo/room1"), None);
    }

    #[test]
    fn should_build_status_and_door_topics() {
        assert_eq!(device_status("lamp1"), "home/lamp1/status");
        assert_eq!(door("front"), "home/doors/front");
    }

    #[test]
    fn should_match_single_level_wildcard() {
        assert!(matches("home/+/command", "home/lamp1/command"));
        assert!(!matches("home/+/command", "home/lamp1/status"));
        assert!(!matches("home/+/command", "home/a/b/command"));
    }

    #[test]
    fn should_match_multi_level_wildcard() {
        assert!(matches("home/#", "home/sensors/temperature"));
        assert!(matches("home/#", "home"));
        assert!(!matches("home/#/x", "home/a/x"));
    }

    #[test]
    fn should_match_exact_topic() {
        assert!(matches(CHAT_REPLY, "mqttchat/demo/room1"));
        assert!(!matches(CHAT_REPLY, "mqttchat/demo/room2"));
    }

    #[test]
    fn should_not_match_system_topics_with_leading_wildcard() {
        assert!(!matches("#", "$SYS/uptime"));
        assert!(!matches("+/uptime", "$SYS/uptime"));
        assert!(matches("$SYS/#", "$SYS/uptime"));
    }
}
