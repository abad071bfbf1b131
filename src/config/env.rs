use super::AppConfig;

impl AppConfig {
    /// Override selected settings from `MFG_TWIN_*` env vars.
    ///
    /// Unparseable values are ignored and the file/default value is kept.
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok());
        self
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = parse(&lookup, "MFG_TWIN_MAX_HISTORY_POINTS") {
            self.twin.max_history_points = n;
        }
        if let Some(v) = parse(&lookup, "MFG_TWIN_RANDOM_EVENT_INTERVAL") {
            self.twin.random_event_interval = v;
        }
        if let Some(ms) = parse(&lookup, "MFG_TWIN_STOP_TIMEOUT_MS") {
            self.twin.stop_timeout_ms = ms;
        }
        if let Some(v) = parse(&lookup, "MFG_TWIN_EVALUATION_DURATION") {
            self.optimizer.evaluation_duration = v;
        }
        if let Some(b) = parse(&lookup, "MFG_TWIN_ENABLE_BAYESIAN") {
            self.optimizer.enable_bayesian = b;
        }
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_applied() {
        let vars: HashMap<&str, &str> = [
            ("MFG_TWIN_MAX_HISTORY_POINTS", "64"),
            ("MFG_TWIN_STOP_TIMEOUT_MS", "100"),
            ("MFG_TWIN_ENABLE_BAYESIAN", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.twin.max_history_points, 64);
        assert_eq!(config.twin.stop_timeout_ms, 100);
        assert!(!config.optimizer.enable_bayesian);
        assert_eq!(config.optimizer.evaluation_duration, 60.0);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let mut config = AppConfig::default();
        config.apply_vars(|k| {
            (k == "MFG_TWIN_RANDOM_EVENT_INTERVAL").then(|| "soon".to_string())
        });
        assert_eq!(config.twin.random_event_interval, 300.0);
    }
}
