use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeraldConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Chat-server admin REST endpoint; registration commands are only
    /// registered when this is present
    #[serde(default)]
    pub registration: Option<RegistrationConfig>,
    #[serde(default)]
    pub currency: CurrencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    config_dir().join("herald.db")
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    /// Discord user ids allowed to talk to the bot; empty allows everyone
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &mask_secret(&self.token))
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bus_bind")]
    pub bind: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bus_bind(),
        }
    }
}

fn default_bus_bind() -> String {
    "127.0.0.1:8888".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub commits: AgentToggle<300>,
    #[serde(default)]
    pub sales: AgentToggle<3600>,
    #[serde(default)]
    pub game_alerts: GameAlertsConfig,
    #[serde(default)]
    pub weather: AgentToggle<300>,
    #[serde(default)]
    pub prices: AgentToggle<18000>,
}

/// Enable flag plus poll interval with a per-agent default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentToggle<const DEFAULT_SECS: u64> {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval::<DEFAULT_SECS>")]
    pub interval_secs: u64,
}

impl<const DEFAULT_SECS: u64> Default for AgentToggle<DEFAULT_SECS> {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_SECS,
        }
    }
}

fn default_interval<const SECS: u64>() -> u64 {
    SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameAlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_game_alert_interval")]
    pub interval_secs: u64,
    /// Reward item names worth broadcasting about
    #[serde(default = "default_watched_items")]
    pub watched_items: Vec<String>,
}

impl Default for GameAlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_game_alert_interval(),
            watched_items: default_watched_items(),
        }
    }
}

fn default_game_alert_interval() -> u64 {
    300
}

fn default_watched_items() -> Vec<String> {
    vec![
        "Alertium".to_string(),
        "OrokinCatalyst".to_string(),
        "OrokinReactor".to_string(),
    ]
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl std::fmt::Debug for RegistrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_secret(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_rates_url")]
    pub base_url: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            base_url: default_rates_url(),
        }
    }
}

fn default_rates_url() -> String {
    "https://open.er-api.com/v6/latest".to_string()
}

fn default_true() -> bool {
    true
}

/// Shows first 3 and last 4 chars for secrets longer than 7 chars
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".herald")
}

impl HeraldConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `herald init` first.",
                path.display()
            )
        })?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg: HeraldConfig = toml::from_str("").unwrap();
        assert!(cfg.bus.enabled);
        assert_eq!(cfg.bus.bind, "127.0.0.1:8888");
        assert_eq!(cfg.sweep.interval_secs, 60);
        assert_eq!(cfg.agents.commits.interval_secs, 300);
        assert_eq!(cfg.agents.prices.interval_secs, 18000);
        assert!(cfg.registration.is_none());
        assert_eq!(cfg.agents.game_alerts.watched_items.len(), 3);
    }

    #[test]
    fn test_partial_override() {
        let cfg: HeraldConfig = toml::from_str(
            r#"
            [discord]
            token = "abc"

            [agents.sales]
            enabled = false

            [agents.weather]
            interval_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(cfg.discord.token, "abc");
        assert!(!cfg.agents.sales.enabled);
        // Disabling one agent leaves the others' defaults alone
        assert!(cfg.agents.weather.enabled);
        assert_eq!(cfg.agents.weather.interval_secs, 120);
        assert_eq!(cfg.agents.sales.interval_secs, 3600);
    }

    #[test]
    fn test_token_masked_in_debug() {
        let cfg = DiscordConfig {
            token: "supersecrettoken".to_string(),
            allowed_users: vec![],
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("supersecrettoken"));
        assert!(rendered.contains("sup...oken"));
    }

    #[test]
    fn test_default_config_round_trips() {
        let rendered = toml::to_string_pretty(&HeraldConfig::default()).unwrap();
        let parsed: HeraldConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.sweep.interval_secs, 60);
    }
}
