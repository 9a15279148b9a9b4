use chrono::{DateTime, Duration, Local};
use rand::distr::{Distribution, Uniform};
use rand::{Rng, RngExt};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::script::{Script, Step};

/// Shared dimensions variables are drawn over.
pub const DIMENSIONS: [&str; 2] = ["d0", "d1"];

/// Name of the reference every dataset but the first holds to `v0` of
/// dataset 0.
pub const REFERENCE: &str = "r0";

#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
pub struct WorkloadParams {
    pub id: u64,
    pub n_dataset: usize,
    pub n_variable: usize,
    pub n_step: usize,
    /// Largest extent a single put or append writes.
    #[builder(default = 4)]
    pub max_extent: usize,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct Workload {
    params: WorkloadParams,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    script: Script,
}

impl Workload {
    #[must_use]
    pub const fn new(
        params: WorkloadParams,
        info: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
        script: Script,
    ) -> Self {
        Self {
            params,
            info,
            start,
            end,
            script,
        }
    }

    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.params.id
    }

    #[must_use]
    pub const fn get_script(&self) -> &Script {
        &self.script
    }

    #[must_use]
    pub const fn get_params(&self) -> &WorkloadParams {
        &self.params
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

fn values(rng: &mut impl Rng, len: usize) -> Vec<i64> {
    (0..len).map(|_| rng.random_range(-100..100)).collect()
}

/// Generate a script over `n_dataset` datasets holding `n_variable`
/// one-dimensional `int64` variables each, followed by `n_step` random
/// operations.
///
/// Every variable lies along one of [`DIMENSIONS`], so independent writes
/// regularly disagree on a shared length and some commits fail. Every
/// dataset after the first also holds [`REFERENCE`] to `v0` of dataset 0,
/// so commits routinely span several datasets. The setup steps commit
/// each dataset once before the random part starts.
///
/// # Panics
///
/// Panics if `n_dataset`, `n_variable` or `max_extent` is zero (cannot
/// create a uniform distribution over an empty range).
#[must_use]
pub fn generate_single_script(
    n_dataset: usize,
    n_variable: usize,
    n_step: usize,
    max_extent: usize,
) -> Script {
    let mut rng = rand::rng();
    let dataset_range = Uniform::new(0, n_dataset).unwrap();
    let variable_range = Uniform::new(0, n_variable).unwrap();
    let extent_range = Uniform::new_inclusive(1, max_extent).unwrap();
    let action_range = Uniform::new(0, 10).unwrap();

    let mut steps = Vec::new();
    for dataset in 0..n_dataset {
        for v in 0..n_variable {
            let dimension = DIMENSIONS[usize::from(rng.random::<bool>())];
            steps.push(Step::AddVariable {
                dataset,
                name: format!("v{v}"),
                dimensions: vec![dimension.to_string()],
            });
        }
        if dataset > 0 {
            steps.push(Step::AddReference {
                dataset,
                name: REFERENCE.to_string(),
                target_dataset: 0,
                target: "v0".to_string(),
            });
        }
        steps.push(Step::Commit { dataset });
    }

    for _ in 0..n_step {
        let dataset = dataset_range.sample(&mut rng);
        let variable = if dataset > 0 && rng.random_ratio(1, 4) {
            REFERENCE.to_string()
        } else {
            format!("v{}", variable_range.sample(&mut rng))
        };
        let len = extent_range.sample(&mut rng);
        let step = match action_range.sample(&mut rng) {
            0..=2 => Step::Put {
                dataset,
                variable,
                origin: vec![0],
                shape: vec![len],
                values: values(&mut rng, len),
            },
            3..=5 => Step::Append {
                dataset,
                variable,
                dimension: 0,
                shape: vec![len],
                values: values(&mut rng, len),
            },
            6 => Step::SetMetadata {
                dataset,
                variable: rng.random::<bool>().then_some(variable),
                key: "step".to_string(),
                value: steps.len().to_string(),
            },
            7 => Step::Commit { dataset },
            8 => Step::TryCommit { dataset },
            _ => Step::Rollback { dataset },
        };
        steps.push(step);
    }

    Script {
        datasets: n_dataset,
        steps,
    }
}

#[must_use]
pub fn generate_mult_workloads(
    n_workload: u64,
    n_dataset: usize,
    n_variable: usize,
    n_step: usize,
    max_extent: usize,
) -> Vec<Workload> {
    (0..n_workload)
        .into_par_iter()
        .map(|id| {
            let start = Local::now();
            let script = generate_single_script(n_dataset, n_variable, n_step, max_extent);
            let end = Local::now();
            Workload {
                params: WorkloadParams {
                    id,
                    n_dataset,
                    n_variable,
                    n_step,
                    max_extent,
                },
                info: "generated".to_string(),
                start,
                end,
                script,
            }
        })
        .collect()
}
