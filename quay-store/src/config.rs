use serde::Deserialize;

/// Engine configuration: layered file + environment, `QUAY_` prefix.
/// `Default` gives the values tests and local runs rely on.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Global fallback hold TTL when neither the request nor the departure
    /// carries one. 15 minutes.
    #[serde(default = "default_hold_ttl_ms")]
    pub default_hold_ttl_ms: u64,

    /// Interval between reconciliation sweeps over overdue holds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_hold_ttl_ms() -> u64 {
    900_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_hold_ttl_ms: default_hold_ttl_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("QUAY"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.default_hold_ttl_ms, 900_000);
        assert_eq!(cfg.sweep_interval_secs, 60);
    }
}
