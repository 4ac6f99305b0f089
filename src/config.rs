use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "SCHOOLD_WORKSPACE";
pub const LOG_ENV: &str = "SCHOOLD_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Opened at startup when set; otherwise the client sends `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Config {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_filter = lookup(LOG_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Config {
            workspace,
            log_filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg.workspace, None);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn blank_values_fall_back() {
        let cfg = Config::from_lookup(lookup(&[(WORKSPACE_ENV, "  "), (LOG_ENV, "")]));
        assert_eq!(cfg.workspace, None);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn reads_workspace_and_filter() {
        let cfg = Config::from_lookup(lookup(&[
            (WORKSPACE_ENV, "/srv/school"),
            (LOG_ENV, "schoold=debug"),
        ]));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/srv/school")));
        assert_eq!(cfg.log_filter, "schoold=debug");
    }
}
