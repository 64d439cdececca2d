//! JSON records stored in the coordination tree.
//!
//! ```text
//! <root>/topics/<topic>/partitions/<p>/state
//!     { "controller_epoch": 4, "isr": [1, 0], "leader": 1, "leader_epoch": 1, "version": 1 }
//! <root>/ids/<broker>
//!     { "host": "localhost", "jmx_port": 9999, "port": 9092, "version": 1 }
//! ```
//!
//! Only the fields discovery needs are modelled; the rest are ignored.

use senderpool_core::{BrokerId, Endpoint, Error, Result};
use serde::Deserialize;

/// Leadership state of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PartitionState {
    /// Broker currently leading the partition
    pub leader: i32,
}

impl PartitionState {
    /// Parse a partition state node payload.
    ///
    /// # Errors
    /// Returns [`Error::Discovery`] if the payload is not a JSON object with
    /// an integer `leader`.
    pub fn parse(path: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| Error::discovery(format!("malformed partition state at {path}: {e}")))
    }

    /// Leader as a typed broker id.
    #[must_use]
    pub const fn leader(&self) -> BrokerId {
        BrokerId(self.leader)
    }
}

/// Registration record a broker writes under `<root>/ids`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerRegistration {
    /// Advertised host name
    pub host: String,
    /// Advertised port, as written by the broker
    pub port: i64,
}

impl BrokerRegistration {
    /// Parse a broker registration payload.
    ///
    /// # Errors
    /// Returns [`Error::Discovery`] if `host` or `port` is missing or of the
    /// wrong type.
    pub fn parse(path: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| Error::discovery(format!("malformed broker registration at {path}: {e}")))
    }

    /// The `host:port` endpoint this broker accepts producers on, or `None`
    /// when the advertised port is outside `1..=65535`.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        let port = u16::try_from(self.port).ok().filter(|&port| port != 0)?;
        Some(Endpoint::new(self.host.clone(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_state_ignores_extra_fields() {
        let payload =
            br#"{ "controller_epoch":4, "isr":[ 1, 0 ], "leader":1, "leader_epoch":1, "version":1 }"#;
        let state = PartitionState::parse("/p/0/state", payload).unwrap();
        assert_eq!(state.leader(), BrokerId(1));
    }

    #[test]
    fn test_partition_state_requires_integer_leader() {
        assert!(PartitionState::parse("/p/0/state", br#"{"leader":"one"}"#).is_err());
        assert!(PartitionState::parse("/p/0/state", br#"{"isr":[1]}"#).is_err());
        assert!(PartitionState::parse("/p/0/state", b"not json").is_err());
    }

    #[test]
    fn test_broker_registration() {
        let payload = br#"{ "host":"localhost", "jmx_port":9999, "port":9092, "version":1 }"#;
        let broker = BrokerRegistration::parse("/brokers/ids/0", payload).unwrap();
        assert_eq!(broker.endpoint().unwrap().to_string(), "localhost:9092");
    }

    #[test]
    fn test_broker_registration_port_out_of_range() {
        for port in ["-1", "0", "65536"] {
            let payload = format!(r#"{{"host":"h","port":{port}}}"#);
            let broker = BrokerRegistration::parse("/brokers/ids/0", payload.as_bytes()).unwrap();
            assert_eq!(broker.endpoint(), None, "port {port}");
        }
    }

    #[test]
    fn test_broker_registration_malformed() {
        let err = BrokerRegistration::parse("/brokers/ids/0", br#"{"host":"h"}"#).unwrap_err();
        assert!(matches!(err, Error::Discovery { .. }));
        assert!(err.to_string().contains("/brokers/ids/0"));
    }
}
