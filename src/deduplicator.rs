use crate::audit::{AuditLog, Removal};
use crate::dataset::{Dataset, Value};
use crate::error::ConfigurationError;
use crate::models::{DedupConfig, FlagState, Stage};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Result of one deduplication run.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub dataset: Dataset,
    pub audit: AuditLog,
    pub stats: DedupStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupStats {
    pub total_rows: usize,
    pub removed_rows: usize,
    pub removed_share: f64,
    /// Normalized to a fraction
    pub threshold: Option<f64>,
}

impl DedupStats {
    fn new(total_rows: usize, removed_rows: usize, threshold: Option<f64>) -> Self {
        let removed_share = if total_rows == 0 {
            0.0
        } else {
            removed_rows as f64 / total_rows as f64
        };

        Self {
            total_rows,
            removed_rows,
            removed_share,
            threshold,
        }
    }

    pub fn exceeds_threshold(&self) -> bool {
        self.threshold
            .map(|threshold| self.removed_share > threshold)
            .unwrap_or(false)
    }
}

/// Column positions of the configured flags, in stage precedence order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFlags {
    columns: Vec<(Stage, usize)>,
}

impl ResolvedFlags {
    pub fn resolve(config: &DedupConfig, dataset: &Dataset) -> Self {
        let columns = Stage::PRECEDENCE
            .iter()
            .filter_map(|stage| {
                let column = config.flags.get(stage)?;
                dataset.column_index(column).map(|idx| (*stage, idx))
            })
            .collect();
        Self { columns }
    }
}

/// Stage -> priority score lookup built from `funnel_priority`.
#[derive(Debug, Clone, Default)]
pub struct ScoreMap {
    scores: HashMap<Stage, u32>,
}

impl ScoreMap {
    /// Position `i` of an `n`-long ranking scores `n - i`. A stage listed
    /// twice keeps the score of its last position.
    pub fn from_priority(funnel_priority: &[Stage]) -> Self {
        let len = funnel_priority.len() as u32;
        let mut scores = HashMap::new();
        for (i, stage) in funnel_priority.iter().enumerate() {
            scores.insert(*stage, len - i as u32);
        }
        Self { scores }
    }

    pub fn score(&self, stage: Option<Stage>) -> u32 {
        stage
            .and_then(|s| self.scores.get(&s).copied())
            .unwrap_or(0)
    }
}

/// Records sharing identical normalized key values.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub key: Vec<String>,
    /// Row indices in original order
    pub members: Vec<usize>,
}

/// Check the config against the dataset schema.
pub fn validate(config: &DedupConfig, dataset: &Dataset) -> Result<(), ConfigurationError> {
    if config.keys.is_empty() {
        return Err(ConfigurationError::EmptyKeys);
    }

    let missing_keys: Vec<String> = config
        .keys
        .iter()
        .filter(|key| !dataset.has_column(key))
        .cloned()
        .collect();
    if !missing_keys.is_empty() {
        return Err(ConfigurationError::MissingKeyColumns(missing_keys));
    }

    let missing_flags: Vec<String> = Stage::PRECEDENCE
        .iter()
        .rev()
        .filter_map(|stage| config.flags.get(stage))
        .filter(|column| !dataset.has_column(column))
        .cloned()
        .collect();
    if !missing_flags.is_empty() {
        return Err(ConfigurationError::MissingFlagColumns(missing_flags));
    }

    Ok(())
}

/// Copy of `dataset` whose key cells hold their trimmed string form.
pub fn normalize_keys(dataset: &Dataset, keys: &[String]) -> Dataset {
    let mut normalized = dataset.clone();
    for key in keys {
        if let Some(col) = normalized.column_index(key) {
            normalized.map_column(col, |cell| Value::Text(cell.render().trim().to_string()));
        }
    }
    normalized
}

/// Highest-precedence stage whose flag is set on this row.
pub fn derive_stage(row: &[Value], flags: &ResolvedFlags) -> Option<Stage> {
    flags
        .columns
        .iter()
        .find(|(_, col)| FlagState::from_cell(row.get(*col)).is_reached())
        .map(|(stage, _)| *stage)
}

/// Groups of two or more rows with equal key values, ordered by first appearance.
pub fn find_duplicate_groups(dataset: &Dataset, key_columns: &[usize]) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut positions: HashMap<Vec<String>, usize> = HashMap::new();

    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let key: Vec<String> = key_columns.iter().map(|col| row[*col].render()).collect();
        match positions.get(&key) {
            Some(&pos) => groups[pos].members.push(row_idx),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    key,
                    members: vec![row_idx],
                });
            }
        }
    }

    groups.retain(|group| group.members.len() > 1);
    groups
}

/// Member with the highest score; the earliest one wins a tie.
pub fn select_survivor(group: &DuplicateGroup, scores: &[u32]) -> usize {
    let mut survivor = group.members[0];
    for &member in &group.members[1..] {
        if scores[member] > scores[survivor] {
            survivor = member;
        }
    }
    survivor
}

pub struct Deduplicator<'a> {
    config: &'a DedupConfig,
}

impl<'a> Deduplicator<'a> {
    pub fn new(config: &'a DedupConfig) -> Self {
        Self { config }
    }

    /// Keep one best record per duplicate group and explain every removal.
    pub fn run(&self, dataset: &Dataset) -> Result<DedupOutcome, ConfigurationError> {
        validate(self.config, dataset)?;

        let keys = &self.config.keys;
        let threshold = self.config.normalized_threshold();
        let normalized = normalize_keys(dataset, keys);
        let key_columns: Vec<usize> = keys
            .iter()
            .filter_map(|key| normalized.column_index(key))
            .collect();

        let groups = find_duplicate_groups(&normalized, &key_columns);
        if groups.is_empty() {
            let stats = DedupStats::new(dataset.len(), 0, threshold);
            info!(
                total_rows = stats.total_rows,
                removed_rows = stats.removed_rows,
                removed_share = stats.removed_share,
                threshold = ?stats.threshold,
                "No duplicates found, returning original dataset"
            );
            return Ok(DedupOutcome {
                dataset: dataset.clone(),
                audit: AuditLog::empty(keys.clone()),
                stats,
            });
        }

        // Step 1: derive a stage and its score for every record
        let flags = ResolvedFlags::resolve(self.config, &normalized);
        let score_map = ScoreMap::from_priority(&self.config.funnel_priority);
        let stages: Vec<Option<Stage>> = normalized
            .rows()
            .iter()
            .map(|row| derive_stage(row, &flags))
            .collect();
        let scores: Vec<u32> = stages.iter().map(|stage| score_map.score(*stage)).collect();

        // Step 2: pick one survivor per group, mark the rest
        let mut keep = vec![true; dataset.len()];
        let mut removals = Vec::new();
        for group in &groups {
            let survivor = select_survivor(group, &scores);
            debug!(
                key = ?group.key,
                members = group.members.len(),
                survivor,
                "Resolved duplicate group"
            );
            for &member in group.members.iter().filter(|m| **m != survivor) {
                keep[member] = false;
                removals.push(Removal {
                    removed: member,
                    survivor,
                });
            }
        }
        removals.sort_by_key(|removal| removal.removed);

        // Step 3: audit trail and final dataset
        let audit = AuditLog::build(&normalized, keys, &key_columns, &removals, &stages, &scores);

        let mut deduped = dataset.clone();
        deduped.retain_rows(&keep);

        let stats = DedupStats::new(dataset.len(), removals.len(), threshold);
        info!(
            total_rows = stats.total_rows,
            removed_rows = stats.removed_rows,
            removed_share = stats.removed_share,
            threshold = ?stats.threshold,
            "Dedup stats"
        );

        if stats.exceeds_threshold() {
            warn!(
                total_rows = stats.total_rows,
                removed_rows = stats.removed_rows,
                removed_share = stats.removed_share,
                threshold = ?stats.threshold,
                "Removed {} of {} rows ({:.2}%) due to duplication, exceeds threshold {:.2}%",
                stats.removed_rows,
                stats.total_rows,
                stats.removed_share * 100.0,
                stats.threshold.unwrap_or_default() * 100.0
            );
        }

        Ok(DedupOutcome {
            dataset: deduped,
            audit,
            stats,
        })
    }
}

/// Deduplicate `dataset` under `config`. Without a config, or with an empty
/// one, the dataset passes through unchanged with an empty audit log.
pub fn deduplicate(
    dataset: &Dataset,
    config: Option<&DedupConfig>,
) -> Result<DedupOutcome, ConfigurationError> {
    match config.filter(|config| !config.is_empty()) {
        Some(config) => Deduplicator::new(config).run(dataset),
        None => {
            info!("Config is empty, returning original dataset");
            Ok(DedupOutcome {
                dataset: dataset.clone(),
                audit: AuditLog::empty(Vec::new()),
                stats: DedupStats::new(dataset.len(), 0, None),
            })
        }
    }
}
