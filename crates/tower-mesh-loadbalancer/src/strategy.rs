//! Selection strategies.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How one instance is picked from a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LoadBalanceStrategy {
    /// Rotate through the candidates in order. Best for: even spread over
    /// uniform instances.
    #[default]
    RoundRobin,

    /// Uniform random pick.
    Random,

    /// Fewest in-flight calls; ties go to the earliest candidate. Best for:
    /// requests with uneven cost.
    LeastConnections,
}

impl LoadBalanceStrategy {
    /// Stable snake_case name, used in configs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            LoadBalanceStrategy::RoundRobin => "round_robin",
            LoadBalanceStrategy::Random => "random",
            LoadBalanceStrategy::LeastConnections => "least_connections",
        }
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing an unrecognized strategy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown load balancing strategy '{0}'")]
pub struct ParseStrategyError(String);

impl FromStr for LoadBalanceStrategy {
    type Err = ParseStrategyError;

    /// Accepts snake_case, kebab-case and camelCase spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "roundrobin" => Ok(LoadBalanceStrategy::RoundRobin),
            "random" => Ok(LoadBalanceStrategy::Random),
            "leastconnections" | "leastconn" => Ok(LoadBalanceStrategy::LeastConnections),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}
