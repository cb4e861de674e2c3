//! MQTT adapter error types.

use std::time::Duration;

use iotsim_domain::error::BusError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// No session is established.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The bus was disconnected on request and cannot be reused.
    #[error("MQTT client closed")]
    Closed,

    /// The transport failed while establishing the session.
    #[error("MQTT connection to {host}:{port} failed")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: rumqttc::ConnectionError,
    },

    /// The broker accepted the socket but refused the session.
    #[error("MQTT broker {host}:{port} refused the session: {code:?}")]
    Refused {
        host: String,
        port: u16,
        code: rumqttc::ConnectReturnCode,
    },

    /// No CONNACK arrived in time.
    #[error("no CONNACK from {host}:{port} within {timeout:?}")]
    Timeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// The rumqttc client rejected a publish request.
    #[error("MQTT publish failed")]
    Publish(#[source] rumqttc::ClientError),

    /// The rumqttc client rejected a subscribe request.
    #[error("MQTT subscribe failed")]
    Subscribe(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`BusError`] for propagation across the port boundary.
    pub fn into_domain(self) -> BusError {
        match self {
            Self::NotConnected => BusError::NotConnected,
            Self::Closed => BusError::Closed,
            Self::Connection { host, port, source } => BusError::Connect {
                host,
                port,
                reason: source.to_string(),
            },
            Self::Refused { host, port, code } => BusError::Connect {
                host,
                port,
                reason: format!("refused: {code:?}"),
            },
            Self::Timeout {
                host,
                port,
                timeout,
            } => BusError::Connect {
                host,
                port,
                reason: format!("no CONNACK within {timeout:?}"),
            },
            Self::Publish(err) => BusError::Publish(Box::new(err)),
            Self::Subscribe(err) => BusError::Subscribe(Box::new(err)),
        }
    }
}

impl From<MqttError> for BusError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_connected_error() {
        let err = MqttError::NotConnected;
        assert_eq!(err.to_string(), "MQTT client not connected");
    }

    #[test]
    fn should_convert_not_connected_to_domain() {
        let err: BusError = MqttError::NotConnected.into();
        assert!(matches!(err, BusError::NotConnected));
        assert!(err.is_transient());
    }

    #[test]
    fn should_convert_timeout_to_connect_error() {
        let err: BusError = MqttError::Timeout {
            host: "broker".to_string(),
            port: 1883,
            timeout: Duration::from_secs(10),
        }
        .into();
        let BusError::Connect { host, port, reason } = err else {
            panic!("expected a connect error");
        };
        assert_eq!(host, "broker");
        assert_eq!(port, 1883);
        assert!(reason.contains("CONNACK"));
    }

    #[test]
    fn should_convert_refusal_to_connect_error() {
        let err: BusError = MqttError::Refused {
            host: "broker".to_string(),
            port: 1883,
            code: rumqttc::ConnectReturnCode::NotAuthorized,
        }
        .into();
        assert!(matches!(err, BusError::Connect { .. }));
        assert!(err.to_string().contains("NotAuthorized"));
    }

    #[test]
    fn should_keep_closed_distinct() {
        let err: BusError = MqttError::Closed.into();
        assert!(matches!(err, BusError::Closed));
    }
}
