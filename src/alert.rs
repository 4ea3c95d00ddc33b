//! Buzzer alerting: the external sink contract, the HTTP client for the
//! ESP32 buzzer, and the per-track cooldown gate.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Local};

pub const DEFAULT_ALERT_COOLDOWN_SECS: i64 = 30;
const ALERT_HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// External alert sink. Sends are best-effort: the pipeline logs and counts
/// failures but never lets one block frame processing.
pub trait AlertSink: Send {
    fn send_alert(&self, pattern: u8) -> Result<()>;
}

/// HTTP client for the ESP32 buzzer's alert endpoint.
pub struct BuzzerClient {
    alert_url: String,
    test_url: Option<String>,
    timeout: StdDuration,
}

impl BuzzerClient {
    pub fn new(alert_url: String, test_url: Option<String>) -> Self {
        Self {
            alert_url,
            test_url,
            timeout: ALERT_HTTP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ping the buzzer's self-test endpoint, when one is configured.
    pub fn test(&self) -> Result<()> {
        let url = self
            .test_url
            .as_deref()
            .ok_or_else(|| anyhow!("no buzzer test url configured"))?;
        let response = ureq::get(url)
            .timeout(self.timeout)
            .call()
            .context("buzzer self-test")?;
        if response.status() != 200 {
            return Err(anyhow!("buzzer self-test returned {}", response.status()));
        }
        Ok(())
    }
}

impl AlertSink for BuzzerClient {
    fn send_alert(&self, pattern: u8) -> Result<()> {
        let url = format!("{}?pattern={}", self.alert_url, pattern);
        let response = ureq::get(&url)
            .timeout(self.timeout)
            .call()
            .context("send buzzer alert")?;
        if response.status() != 200 {
            return Err(anyhow!("buzzer alert returned {}", response.status()));
        }
        Ok(())
    }
}

/// Per-track alert throttle. A track may page the buzzer again only after
/// the cooldown has fully elapsed since its previous page.
pub struct AlertDispatcher {
    cooldown: Duration,
    last_alert: HashMap<u64, DateTime<Local>>,
}

impl AlertDispatcher {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: HashMap::new(),
        }
    }

    pub fn should_alert(&self, track_id: u64, now: DateTime<Local>) -> bool {
        match self.last_alert.get(&track_id) {
            None => true,
            Some(last) => now - *last >= self.cooldown,
        }
    }

    /// Record an alert attempt. Called whether or not the network send
    /// succeeded; failed alerts are not retried within the cooldown.
    pub fn record_alert(&mut self, track_id: u64, now: DateTime<Local>) {
        self.last_alert.insert(track_id, now);
    }

    /// Drop cooldown state for an evicted track. Ids are never reused, so
    /// stale entries would only accumulate.
    pub fn forget(&mut self, track_id: u64) {
        self.last_alert.remove(&track_id);
    }

    pub fn len(&self) -> usize {
        self.last_alert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> AlertDispatcher {
        AlertDispatcher::new(Duration::seconds(DEFAULT_ALERT_COOLDOWN_SECS))
    }

    #[test]
    fn first_alert_always_allowed() {
        let d = dispatcher();
        assert!(d.should_alert(1, Local::now()));
    }

    #[test]
    fn alert_blocked_inside_cooldown() {
        let mut d = dispatcher();
        let t0 = Local::now();
        d.record_alert(1, t0);
        assert!(!d.should_alert(1, t0 + Duration::seconds(10)));
    }

    #[test]
    fn alert_allowed_after_cooldown() {
        let mut d = dispatcher();
        let t0 = Local::now();
        d.record_alert(1, t0);
        assert!(d.should_alert(1, t0 + Duration::seconds(30)));
        assert!(d.should_alert(1, t0 + Duration::seconds(31)));
    }

    #[test]
    fn cooldowns_are_per_track() {
        let mut d = dispatcher();
        let t0 = Local::now();
        d.record_alert(1, t0);
        assert!(d.should_alert(2, t0 + Duration::seconds(1)));
    }

    #[test]
    fn forget_clears_state() {
        let mut d = dispatcher();
        let t0 = Local::now();
        d.record_alert(1, t0);
        d.forget(1);
        assert!(d.is_empty());
        assert!(d.should_alert(1, t0 + Duration::seconds(1)));
    }
}
