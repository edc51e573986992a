use crate::dataset::{Dataset, Value};
use crate::models::Stage;
use std::fmt;

pub const STAGE_COLUMN: &str = "STAGE";
pub const STAGE_KEPT_COLUMN: &str = "STAGE_kept";
pub const SCORE_COLUMN: &str = "_score";
pub const SCORE_KEPT_COLUMN: &str = "_score_kept";
pub const REASON_COLUMN: &str = "reason";

/// A discarded row paired with the survivor of its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub removed: usize,
    pub survivor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    LowerPriorityStage,
    SameStageKeptFirst,
    /// Removed record outscores its survivor; the resolver never produces this.
    Unranked,
}

impl RemovalReason {
    pub fn classify(score: u32, score_kept: u32) -> Self {
        if score < score_kept {
            RemovalReason::LowerPriorityStage
        } else if score == score_kept {
            RemovalReason::SameStageKeptFirst
        } else {
            RemovalReason::Unranked
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RemovalReason::LowerPriorityStage => "duplicate: lower-priority stage",
            RemovalReason::SameStageKeptFirst => "duplicate: same stage, kept first",
            RemovalReason::Unranked => "duplicate",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Position of the removed record in the input dataset
    pub row: usize,
    pub key_values: Vec<Value>,
    pub stage: Option<Stage>,
    pub stage_kept: Option<Stage>,
    pub score: u32,
    pub score_kept: u32,
    pub reason: RemovalReason,
}

/// One entry per removed record, explaining why it lost to its survivor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuditLog {
    keys: Vec<String>,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn empty(keys: Vec<String>) -> Self {
        Self {
            keys,
            entries: Vec::new(),
        }
    }

    /// `dataset` must be the key-normalized view the removals were computed on.
    pub fn build(
        dataset: &Dataset,
        keys: &[String],
        key_columns: &[usize],
        removals: &[Removal],
        stages: &[Option<Stage>],
        scores: &[u32],
    ) -> Self {
        let entries = removals
            .iter()
            .map(|removal| {
                let key_values = dataset
                    .row(removal.removed)
                    .map(|row| key_columns.iter().map(|col| row[*col].clone()).collect())
                    .unwrap_or_default();
                let score = scores[removal.removed];
                let score_kept = scores[removal.survivor];

                AuditEntry {
                    row: removal.removed,
                    key_values,
                    stage: stages[removal.removed],
                    stage_kept: stages[removal.survivor],
                    score,
                    score_kept,
                    reason: RemovalReason::classify(score, score_kept),
                }
            })
            .collect();

        Self {
            keys: keys.to_vec(),
            entries,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut columns = self.keys.clone();
        columns.extend(
            [STAGE_COLUMN, STAGE_KEPT_COLUMN, SCORE_COLUMN, SCORE_KEPT_COLUMN, REASON_COLUMN]
                .iter()
                .map(|c| c.to_string()),
        );
        columns
    }

    /// Tabular form: key columns, then STAGE, STAGE_kept, _score, _score_kept, reason.
    pub fn to_dataset(&self) -> Dataset {
        let stage_value = |stage: Option<Stage>| Value::from(stage.map(Stage::label));

        let rows: Vec<Vec<Value>> = self
            .entries
            .iter()
            .map(|entry| {
                let mut row = entry.key_values.clone();
                row.push(stage_value(entry.stage));
                row.push(stage_value(entry.stage_kept));
                row.push(Value::from(entry.score));
                row.push(Value::from(entry.score_kept));
                row.push(Value::from(entry.reason.label()));
                row
            })
            .collect();

        Dataset::new(self.column_names(), rows).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_classification() {
        assert_eq!(RemovalReason::classify(1, 4), RemovalReason::LowerPriorityStage);
        assert_eq!(RemovalReason::classify(0, 0), RemovalReason::SameStageKeptFirst);
        assert_eq!(RemovalReason::classify(3, 2), RemovalReason::Unranked);
        assert_eq!(RemovalReason::Unranked.to_string(), "duplicate");
    }

    #[test]
    fn test_to_dataset_schema() {
        let dataset = Dataset::new(
            vec!["ID".to_string(), "TERM".to_string()],
            vec![
                vec!["1".into(), "F24".into()],
                vec!["1".into(), "F24".into()],
            ],
        )
        .unwrap();
        let removals = [Removal { removed: 1, survivor: 0 }];
        let log = AuditLog::build(
            &dataset,
            &["ID".to_string(), "TERM".to_string()],
            &[0, 1],
            &removals,
            &[Some(Stage::Commit), None],
            &[2, 0],
        );

        let table = log.to_dataset();
        assert_eq!(
            table.columns(),
            ["ID", "TERM", "STAGE", "STAGE_kept", "_score", "_score_kept", "reason"]
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "STAGE"), Some(&Value::Null));
        assert_eq!(table.value(0, "STAGE_kept"), Some(&Value::from("COMMIT")));
        assert_eq!(table.value(0, "_score_kept"), Some(&Value::Number(2.0)));
        assert_eq!(
            table.value(0, "reason"),
            Some(&Value::from("duplicate: lower-priority stage"))
        );
    }

    #[test]
    fn test_empty_log_has_no_rows() {
        let log = AuditLog::empty(vec!["ID".to_string()]);
        assert!(log.is_empty());
        assert_eq!(log.to_dataset().len(), 0);
    }
}
