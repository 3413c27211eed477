use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How chunks are mapped onto worker threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStrategy {
    /// Exactly `parallelism` fixed workers. Chunk `i` goes to worker
    /// `i % parallelism` regardless of how busy that worker is.
    /// Best for homogeneous per-item cost.
    Static,

    /// Work-stealing pool of `parallelism` threads. Idle workers take chunks
    /// from busy ones. Best for heterogeneous per-item cost.
    #[default]
    Dynamic,
}

impl PartitionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStrategy::Static => "static",
            PartitionStrategy::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(PartitionStrategy::Static),
            "dynamic" => Ok(PartitionStrategy::Dynamic),
            other => Err(format!(
                "unknown strategy '{other}' (expected 'static' or 'dynamic')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_dynamic() {
        assert_eq!(PartitionStrategy::default(), PartitionStrategy::Dynamic);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("static".parse::<PartitionStrategy>(), Ok(PartitionStrategy::Static));
        assert_eq!(" DYNAMIC ".parse::<PartitionStrategy>(), Ok(PartitionStrategy::Dynamic));
        assert!("priority".parse::<PartitionStrategy>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&PartitionStrategy::Static).unwrap();
        assert_eq!(json, "\"static\"");
        let parsed: PartitionStrategy = serde_json::from_str("\"dynamic\"").unwrap();
        assert_eq!(parsed, PartitionStrategy::Dynamic);
    }
}
