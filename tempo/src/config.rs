use serde::{Deserialize, Serialize};

/// Top-level, serializable engine configuration (SPEC_FULL.md §4.J supplement).
///
/// Grounded in `barter/src/system/config.rs::SystemConfig`'s role as the serializable top-level
/// configuration surface for a teacher-built system.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// When `false` (the default), a strategy transitioning to ERROR halts the whole engine.
    /// When `true`, the engine continues driving the surviving strategies (spec.md §4.I).
    pub continue_on_strategy_error: bool,

    /// Seeds the RNG used to break exact bar high/low-distance-from-open ties in the
    /// bar-to-order-book converter (SPEC_FULL.md §4.E). Fixed by default so backtests are
    /// reproducible; override for genuine non-determinism.
    pub bar_tie_break_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continue_on_strategy_error: false,
            bar_tie_break_seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_halts_on_strategy_error() {
        let config = EngineConfig::default();
        assert!(!config.continue_on_strategy_error);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = EngineConfig { continue_on_strategy_error: true, bar_tie_break_seed: 7 };
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
