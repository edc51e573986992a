use crate::dataset::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data source configuration
    pub data_source_mode: DataSourceMode,
    pub input_files: Option<Vec<String>>,
    pub internet_urls: Option<Vec<String>>,
    pub output_directory: Option<String>,
    /// CSS selector of the applicant table in HTML sources
    pub table_selector: Option<String>,
    /// Absent section means records pass through untouched
    pub dedup: Option<DedupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
    #[serde(rename = "both")]
    Both,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_source_mode: DataSourceMode::Local,
            input_files: Some(vec!["data-source/applicants.csv".to_string()]),
            internet_urls: Some(vec![
                "https://example.com/funnel-export.csv".to_string(),
            ]),
            output_directory: Some("output".to_string()),
            table_selector: Some("table".to_string()),
            dedup: Some(DedupConfig::default()),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// A step of the applicant funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Stage {
    Apply,
    Admit,
    Commit,
    Enroll,
}

impl Stage {
    /// Order in which flags are checked when deriving a record's stage.
    /// A later stage implies every earlier one was reached.
    pub const PRECEDENCE: [Stage; 4] = [Stage::Enroll, Stage::Commit, Stage::Admit, Stage::Apply];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Apply => "APPLY",
            Stage::Admit => "ADMIT",
            Stage::Commit => "COMMIT",
            Stage::Enroll => "ENROLL",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "APPLY" => Ok(Stage::Apply),
            "ADMIT" => Ok(Stage::Admit),
            "COMMIT" => Ok(Stage::Commit),
            "ENROLL" => Ok(Stage::Enroll),
            other => Err(format!("unknown funnel stage: {}", other)),
        }
    }
}

impl TryFrom<String> for Stage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Stage> for &'static str {
    fn from(stage: Stage) -> Self {
        stage.label()
    }
}

/// What a flag cell says about a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    Reached,
    NotReached,
    Missing,
}

impl FlagState {
    /// Only a value equal to 1 counts as reached; nulls are missing,
    /// everything else (0, 2, free text) is not reached.
    pub fn from_cell(cell: Option<&Value>) -> Self {
        match cell {
            None | Some(Value::Null) => FlagState::Missing,
            Some(value) => match value.as_number() {
                Some(n) if n == 1.0 => FlagState::Reached,
                _ => FlagState::NotReached,
            },
        }
    }

    pub fn is_reached(self) -> bool {
        self == FlagState::Reached
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub keys: Vec<String>,
    /// Stage -> column holding its 0/1 indicator
    #[serde(default)]
    pub flags: BTreeMap<Stage, String>,
    /// Highest priority first
    #[serde(default)]
    pub funnel_priority: Vec<Stage>,
    /// Acceptable share of removed rows, percent when > 1
    pub threshold_for_removing: Option<f64>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let flags = BTreeMap::from([
            (Stage::Apply, "FLAG_APP".to_string()),
            (Stage::Admit, "FLAG_ADM".to_string()),
            (Stage::Commit, "FLAG_CON".to_string()),
            (Stage::Enroll, "FLAG_ENR".to_string()),
        ]);

        Self {
            keys: vec!["STUDENTID".to_string()],
            flags,
            funnel_priority: vec![Stage::Enroll, Stage::Commit, Stage::Admit, Stage::Apply],
            threshold_for_removing: Some(2.0),
        }
    }
}

impl DedupConfig {
    /// Nothing configured at all, e.g. an empty `[dedup]` table.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
            && self.flags.is_empty()
            && self.funnel_priority.is_empty()
            && self.threshold_for_removing.is_none()
    }

    /// Threshold as a fraction. Values above 1 are percentages, so a literal
    /// 1 means 100% rather than 1%.
    pub fn normalized_threshold(&self) -> Option<f64> {
        self.threshold_for_removing
            .map(|t| if t > 1.0 { t / 100.0 } else { t })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_normalization() {
        let mut config = DedupConfig::default();
        assert_eq!(config.normalized_threshold(), Some(0.02));

        config.threshold_for_removing = Some(0.05);
        assert_eq!(config.normalized_threshold(), Some(0.05));

        // exactly 1 is read as a fraction
        config.threshold_for_removing = Some(1.0);
        assert_eq!(config.normalized_threshold(), Some(1.0));

        config.threshold_for_removing = None;
        assert_eq!(config.normalized_threshold(), None);
    }

    #[test]
    fn test_flag_state() {
        assert_eq!(FlagState::from_cell(Some(&Value::Number(1.0))), FlagState::Reached);
        assert_eq!(FlagState::from_cell(Some(&Value::Text(" 1".into()))), FlagState::Reached);
        assert_eq!(FlagState::from_cell(Some(&Value::Number(0.0))), FlagState::NotReached);
        assert_eq!(FlagState::from_cell(Some(&Value::Number(2.0))), FlagState::NotReached);
        assert_eq!(FlagState::from_cell(Some(&Value::Text("yes".into()))), FlagState::NotReached);
        assert_eq!(FlagState::from_cell(Some(&Value::Null)), FlagState::Missing);
        assert_eq!(FlagState::from_cell(None), FlagState::Missing);
    }

    #[test]
    fn test_dedup_config_from_toml() {
        let content = r#"
            keys = ["STUDENTID", "TERM"]
            funnel_priority = ["ENROLL", "COMMIT", "ADMIT", "APPLY"]
            threshold_for_removing = 5

            [flags]
            APPLY = "FLAG_APP"
            ENROLL = "FLAG_ENR"
        "#;
        let config: DedupConfig = toml::from_str(content).unwrap();
        assert_eq!(config.keys, vec!["STUDENTID", "TERM"]);
        assert_eq!(config.flags.get(&Stage::Enroll).map(String::as_str), Some("FLAG_ENR"));
        assert!(config.flags.get(&Stage::Admit).is_none());
        assert_eq!(config.funnel_priority[0], Stage::Enroll);
        assert_eq!(config.normalized_threshold(), Some(0.05));
    }

    #[test]
    fn test_empty_dedup_table_is_empty() {
        let config: Config = toml::from_str("data_source_mode = \"local\"\n[dedup]\n").unwrap();
        assert!(config.dedup.as_ref().map_or(false, DedupConfig::is_empty));

        let keys_only: DedupConfig = toml::from_str("keys = []\nthreshold_for_removing = 2\n").unwrap();
        assert!(!keys_only.is_empty());
        assert!(!DedupConfig::default().is_empty());
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        Config::default().save_to_file(path).unwrap();
        let loaded = Config::load_from_file(path).unwrap();
        assert_eq!(loaded.dedup, Some(DedupConfig::default()));
    }
}
