use serde::{Deserialize, Serialize};

/// One operation of a workload. Datasets are addressed by index, variables
/// by name within their dataset. Variable data is always `int64`.
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    AddVariable {
        dataset: usize,
        name: String,
        dimensions: Vec<String>,
    },
    AddReference {
        dataset: usize,
        name: String,
        target_dataset: usize,
        target: String,
    },
    Put {
        dataset: usize,
        variable: String,
        origin: Vec<usize>,
        shape: Vec<usize>,
        values: Vec<i64>,
    },
    Append {
        dataset: usize,
        variable: String,
        dimension: usize,
        shape: Vec<usize>,
        values: Vec<i64>,
    },
    /// Sets a string metadata entry; no variable addresses the dataset's
    /// global metadata.
    SetMetadata {
        dataset: usize,
        variable: Option<String>,
        key: String,
        value: String,
    },
    Commit {
        dataset: usize,
    },
    TryCommit {
        dataset: usize,
    },
    Rollback {
        dataset: usize,
    },
}

impl Step {
    #[must_use]
    pub const fn dataset(&self) -> usize {
        match self {
            Self::AddVariable { dataset, .. }
            | Self::AddReference { dataset, .. }
            | Self::Put { dataset, .. }
            | Self::Append { dataset, .. }
            | Self::SetMetadata { dataset, .. }
            | Self::Commit { dataset }
            | Self::TryCommit { dataset }
            | Self::Rollback { dataset } => *dataset,
        }
    }
}

#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Script {
    /// Number of datasets the steps address.
    pub datasets: usize,
    pub steps: Vec<Step>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_tagged_by_operation() {
        let step = Step::Append {
            dataset: 1,
            variable: "v".into(),
            dimension: 0,
            shape: vec![2],
            values: vec![4, 5],
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["op"], "append");
        assert_eq!(step.dataset(), 1);

        let parsed: Step =
            serde_json::from_str(r#"{"op":"commit","dataset":0}"#).unwrap();
        assert_eq!(parsed, Step::Commit { dataset: 0 });
    }
}
