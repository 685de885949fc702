use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::utils::error::InvalidRate;

/// Identifies one run of a publish session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    WaitingForSubscribers,
    Publishing,
    PartialDelivery,
    Finished,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::WaitingForSubscribers => "waiting for subscribers",
            SessionState::Publishing => "publishing",
            SessionState::PartialDelivery => "publishing (partial delivery)",
            SessionState::Finished => "finished",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How often a session emits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishRate {
    Once,
    /// Messages per second, always positive and finite.
    Hz(f64),
}

impl PublishRate {
    /// Non-positive rates mean "publish once". Rates whose period does not
    /// fit a `Duration` are rejected.
    pub fn from_hz(hz: f64) -> Result<Self, InvalidRate> {
        if !hz.is_finite() {
            return Err(InvalidRate(hz.to_string()));
        }
        if hz <= 0.0 {
            return Ok(PublishRate::Once);
        }
        Duration::try_from_secs_f64(1.0 / hz).map_err(|_| InvalidRate(hz.to_string()))?;
        Ok(PublishRate::Hz(hz))
    }
}

impl FromStr for PublishRate {
    type Err = InvalidRate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("once") {
            return Ok(PublishRate::Once);
        }
        let hz = trimmed
            .parse::<f64>()
            .map_err(|_| InvalidRate(s.to_string()))?;
        Self::from_hz(hz).map_err(|_| InvalidRate(s.to_string()))
    }
}

impl fmt::Display for PublishRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishRate::Once => f.write_str("once"),
            PublishRate::Hz(hz) => write!(f, "{hz} Hz"),
        }
    }
}
