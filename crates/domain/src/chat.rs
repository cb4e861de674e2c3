//! Canned replies sent in response to chat messages.

use crate::time::{Timestamp, clock_time};

/// Number of reply candidates.
pub const CANDIDATE_COUNT: usize = 5;

/// All replies the simulator may send for `received` at time `at`.
#[must_use]
pub fn candidates(received: &str, at: Timestamp) -> [String; CANDIDATE_COUNT] {
    [
        format!("IoT Device received: '{received}'"),
        "Hello from your MacBook IoT simulator! \u{1f916}".to_string(),
        format!(
            "Processing your message... Message length: {} chars",
            received.chars().count()
        ),
        "All systems operational! \u{1f7e2}".to_string(),
        format!("Timestamp: {} - Message acknowledged", clock_time(at)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_echo_received_text() {
        let replies = candidates("hello", now());
        assert_eq!(replies[0], "IoT Device received: 'hello'");
    }

    #[test]
    fn should_count_characters_not_bytes() {
        let replies = candidates("h\u{e9}", now());
        assert_eq!(
            replies[2],
            "Processing your message... Message length: 2 chars"
        );
    }

    #[test]
    fn should_never_produce_empty_reply() {
        assert!(candidates("", now()).iter().all(|r| !r.is_empty()));
    }
}
