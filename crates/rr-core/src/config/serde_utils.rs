//! Shared serialization/deserialization utilities for configuration

/// Helper module for Duration serialization as milliseconds
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "rr_core::config::serde_utils::duration_millis")]
///     retry_interval: Duration,
/// }
/// ```
pub mod duration_millis {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize a Duration from milliseconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_millis")]
        retry_interval: Duration,
    }

    #[test]
    fn test_duration_millis_serialize() {
        let config = TestConfig {
            retry_interval: Duration::from_secs(1),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"retry_interval":1000}"#);
    }

    #[test]
    fn test_duration_millis_deserialize() {
        let json = r#"{"retry_interval":250}"#;
        let config: TestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.retry_interval, Duration::from_millis(250));
    }
}
