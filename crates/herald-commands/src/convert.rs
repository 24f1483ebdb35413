//! Time zone and currency conversion commands

use crate::dispatcher::{Command, CommandContext};
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveTime, TimeDelta};
use herald_core::error::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Parse a UTC offset like `+2`, `-5`, `+05:30`. chrono's own parsers want
/// the full `+HH:MM` form, so the shorthand is handled here.
fn parse_offset(s: &str) -> Result<FixedOffset> {
    let bad = || Error::Usage(format!("{s} is not a UTC offset"));

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => (1, s),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (
            h.parse::<i32>().map_err(|_| bad())?,
            m.parse::<i32>().map_err(|_| bad())?,
        ),
        None => (rest.parse::<i32>().map_err(|_| bad())?, 0),
    };
    if hours > 14 || minutes > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::Usage(format!("{s} is not a HH:MM time")))
}

/// Shift a wall-clock time between two UTC offsets, wrapping past midnight
pub fn shift_clock(clock: NaiveTime, from: FixedOffset, to: FixedOffset) -> NaiveTime {
    let delta = TimeDelta::seconds(i64::from(to.local_minus_utc() - from.local_minus_utc()));
    clock.overflowing_add_signed(delta).0
}

/// `time <HH:MM> <from-offset> <to-offset>`
pub struct TimeCmd;

#[async_trait]
impl Command for TimeCmd {
    fn name(&self) -> &str {
        "time"
    }

    fn usage(&self) -> &str {
        "time <HH:MM> <from-offset> <to-offset>"
    }

    fn description(&self) -> &str {
        "Convert a wall-clock time between UTC offsets"
    }

    async fn run(&self, _ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [clock, from, to] = args else {
            return Err(Error::Usage("wrong number of arguments".to_string()));
        };
        let clock = parse_clock(clock)?;
        let from_offset = parse_offset(from)?;
        let to_offset = parse_offset(to)?;

        let shifted = shift_clock(clock, from_offset, to_offset);
        Ok(format!(
            "{} at UTC{} is {} at UTC{}",
            clock.format("%H:%M"),
            from,
            shifted.format("%H:%M"),
            to
        ))
    }
}

/// `currency <amount> <FROM> <TO>` against a configured rates endpoint
pub struct CurrencyCmd {
    client: Client,
    base_url: String,
}

impl CurrencyCmd {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// Pull `rates[to]` out of a rates response
pub fn extract_rate(body: &Value, to: &str) -> Option<f64> {
    body.get("rates")?.get(to)?.as_f64()
}

#[async_trait]
impl Command for CurrencyCmd {
    fn name(&self) -> &str {
        "currency"
    }

    fn usage(&self) -> &str {
        "currency <amount> <FROM> <TO>"
    }

    fn description(&self) -> &str {
        "Convert an amount between currencies at the current rate"
    }

    async fn run(&self, _ctx: &CommandContext, args: &[String]) -> Result<String> {
        let [amount, from, to] = args else {
            return Err(Error::Usage("wrong number of arguments".to_string()));
        };
        let amount: f64 = amount
            .parse()
            .map_err(|_| Error::Usage(format!("{amount} is not an amount")))?;
        let (from, to) = (from.to_uppercase(), to.to_uppercase());

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), from);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Domain(format!("rates service unreachable: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Domain(format!("rates service returned garbage: {e}")))?;

        let rate = extract_rate(&body, &to)
            .ok_or_else(|| Error::Domain(format!("no rate for {from} -> {to}")))?;
        Ok(format!("{amount:.2} {from} = {:.2} {to}", amount * rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offset(secs: i32) -> FixedOffset {
        FixedOffset::east_opt(secs).unwrap()
    }

    fn clock(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_offset_forms() {
        assert_eq!(parse_offset("+2").unwrap(), offset(2 * 3600));
        assert_eq!(parse_offset("-5").unwrap(), offset(-5 * 3600));
        assert_eq!(parse_offset("+05:30").unwrap(), offset(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("0").unwrap(), offset(0));
        assert!(parse_offset("east").is_err());
        assert!(parse_offset("+15").is_err());
    }

    #[test]
    fn test_shift_clock_wraps_midnight() {
        // 23:30 UTC+0 seen from UTC+2
        assert_eq!(
            shift_clock(clock(23, 30), offset(0), offset(2 * 3600)),
            clock(1, 30)
        );
        // 01:00 UTC+0 seen from UTC-5
        assert_eq!(
            shift_clock(clock(1, 0), offset(0), offset(-5 * 3600)),
            clock(20, 0)
        );
        // Identity
        assert_eq!(
            shift_clock(clock(12, 0), offset(2 * 3600), offset(2 * 3600)),
            clock(12, 0)
        );
    }

    #[tokio::test]
    async fn test_time_command_end_to_end() {
        let ctx = CommandContext {
            store: std::sync::Arc::new(herald_store::SqliteStore::open_in_memory().unwrap()),
            caller: "alice".to_string(),
            admin: false,
        };
        let args = vec!["14:30".to_string(), "+2".to_string(), "-5".to_string()];

        let reply = TimeCmd.run(&ctx, &args).await.unwrap();
        assert!(reply.contains("07:30"));
    }

    #[test]
    fn test_extract_rate() {
        let body = json!({"base_code": "USD", "rates": {"EUR": 0.92, "GBP": 0.79}});
        assert_eq!(extract_rate(&body, "EUR"), Some(0.92));
        assert_eq!(extract_rate(&body, "XXX"), None);
    }
}
