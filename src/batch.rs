use rayon::prelude::*;

use crate::machine::{Failure, MachineConfig, execute};

/// One program and its input, queued for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub program: Vec<u8>,
    pub input: Vec<u8>,
}

impl Job {
    pub fn new(program: impl Into<Vec<u8>>, input: impl Into<Vec<u8>>) -> Self {
        Self {
            program: program.into(),
            input: input.into(),
        }
    }
}

/// Run every job on its own machine, in parallel via rayon.
///
/// Machines share no state. Results are returned in job order.
pub fn run_all(jobs: &[Job], config: &MachineConfig) -> Vec<Result<Vec<u8>, Failure>> {
    jobs.par_iter()
        .map(|job| execute(&job.program, &job.input, config))
        .collect()
}
