use std::collections::HashMap;

use sdslite_core::{Array, DataSet, DataSetSchema, SchemaVersion, VariableHandle, VariableId};
use serde::{Deserialize, Serialize};

use crate::script::{Script, Step};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("script has no dataset {0}")]
    UnknownDataSet(usize),

    #[error("dataset {dataset} has no variable {name}")]
    UnknownVariable { dataset: usize, name: String },

    #[error(transparent)]
    DataSet(#[from] sdslite_core::Error),
}

/// What happened to one step.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Committed { version: u64 },
    /// `try_commit` found the proposed state inconsistent.
    Rejected,
    Failed { error: String },
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    /// Committed schema of every dataset after the last step.
    pub datasets: Vec<DataSetSchema>,
}

impl Report {
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }

    /// Names of shared dimensions that have more than one committed length
    /// in some dataset. Empty for any correct engine.
    #[must_use]
    pub fn inconsistent_dimensions(&self) -> Vec<String> {
        let mut bad = Vec::new();
        for schema in &self.datasets {
            let mut lengths: HashMap<&str, usize> = HashMap::new();
            for variable in &schema.variables {
                for dimension in variable.dimensions.iter() {
                    let length = *lengths.entry(&dimension.name).or_insert(dimension.length);
                    if length != dimension.length && !bad.contains(&dimension.name) {
                        bad.push(dimension.name.clone());
                    }
                }
            }
        }
        bad
    }
}

struct Replayer {
    datasets: Vec<DataSet>,
}

impl Replayer {
    fn dataset(&self, index: usize) -> Result<&DataSet, ReplayError> {
        self.datasets
            .get(index)
            .ok_or(ReplayError::UnknownDataSet(index))
    }

    fn variable(&self, dataset: usize, name: &str) -> Result<VariableHandle, ReplayError> {
        self.dataset(dataset)?
            .variable_by_name(name)
            .ok_or_else(|| ReplayError::UnknownVariable {
                dataset,
                name: name.to_string(),
            })
    }

    fn step(&self, step: &Step) -> Result<Outcome, ReplayError> {
        match step {
            Step::AddVariable {
                dataset,
                name,
                dimensions,
            } => {
                let names: Vec<&str> = dimensions.iter().map(String::as_str).collect();
                self.dataset(*dataset)?.add_variable::<i64>(name, &names)?;
            }
            Step::AddReference {
                dataset,
                name,
                target_dataset,
                target,
            } => {
                let target = self.variable(*target_dataset, target)?;
                self.dataset(*dataset)?.add_reference(name, &target)?;
            }
            Step::Put {
                dataset,
                variable,
                origin,
                shape,
                values,
            } => {
                let data = Array::new(shape.clone(), values.clone())?;
                self.variable(*dataset, variable)?.put_data(origin, data)?;
            }
            Step::Append {
                dataset,
                variable,
                dimension,
                shape,
                values,
            } => {
                let data = Array::new(shape.clone(), values.clone())?;
                self.variable(*dataset, variable)?.append(*dimension, data)?;
            }
            Step::SetMetadata {
                dataset,
                variable,
                key,
                value,
            } => {
                let id = match variable {
                    Some(name) => self.variable(*dataset, name)?.id(),
                    None => VariableId::GLOBAL_METADATA,
                };
                self.dataset(*dataset)?.set_metadata(id, key, value.as_str())?;
            }
            Step::Commit { dataset } => {
                let dataset = self.dataset(*dataset)?;
                dataset.commit()?;
                return Ok(Outcome::Committed {
                    version: dataset.version(),
                });
            }
            Step::TryCommit { dataset } => {
                let dataset = self.dataset(*dataset)?;
                if !dataset.try_commit()? {
                    return Ok(Outcome::Rejected);
                }
                return Ok(Outcome::Committed {
                    version: dataset.version(),
                });
            }
            Step::Rollback { dataset } => self.dataset(*dataset)?.rollback()?,
        }
        Ok(Outcome::Applied)
    }
}

/// Runs `script` against fresh in-memory datasets. A failing step is
/// recorded and the replay moves on.
#[must_use]
pub fn replay(script: &Script) -> Report {
    let replayer = Replayer {
        datasets: (0..script.datasets).map(|_| DataSet::in_memory()).collect(),
    };
    let outcomes = script
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            replayer.step(step).unwrap_or_else(|e| {
                tracing::debug!(step = index, error = %e, "step failed");
                Outcome::Failed {
                    error: e.to_string(),
                }
            })
        })
        .collect();
    let datasets = replayer
        .datasets
        .iter()
        .map(|ds| (*ds.schema(SchemaVersion::Committed)).clone())
        .collect();
    Report { outcomes, datasets }
}
