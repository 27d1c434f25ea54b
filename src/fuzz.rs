use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::batch::{Job, run_all};
use crate::fault::Fault;
use crate::machine::{Failure, MachineConfig};

/// The eight instructions plus a no-op, sampled uniformly.
const ALPHABET: &[u8] = b"><+-.,[] ";

/// Configuration for a random-program soak run.
pub struct FuzzConfig {
    /// Number of programs to generate and run.
    pub count: usize,
    /// Characters per program.
    pub program_size: usize,
    /// Random input bytes supplied to each program.
    pub input_size: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            count: 1 << 10,
            program_size: 64,
            input_size: 8,
        }
    }
}

/// Tally of run outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzReport {
    pub runs: usize,
    pub completed: usize,
    pub loop_limited: usize,
    pub step_limited: usize,
    pub tape_limited: usize,
    pub program_faults: usize,
    /// Total output bytes across all runs, partial output of failed runs included.
    pub output_bytes: usize,
}

impl FuzzReport {
    fn record(&mut self, result: &Result<Vec<u8>, Failure>) {
        self.runs += 1;
        match result {
            Ok(output) => {
                self.completed += 1;
                self.output_bytes += output.len();
            }
            Err(failure) => {
                self.output_bytes += failure.output.len();
                match failure.fault {
                    Fault::Program { .. } => self.program_faults += 1,
                    Fault::LoopLimitExceeded(_) => self.loop_limited += 1,
                    Fault::StepLimitExceeded(..) => self.step_limited += 1,
                    Fault::TapeLimitExceeded(..) => self.tape_limited += 1,
                }
            }
        }
    }
}

/// A random program of `size` characters drawn from [`ALPHABET`].
pub fn random_program(rng: &mut SmallRng, size: usize) -> Vec<u8> {
    (0..size)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

/// Generate `config.count` jobs deterministically from `seed`.
pub fn generate_jobs(config: &FuzzConfig, seed: u64) -> Vec<Job> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..config.count)
        .map(|_| {
            let program = random_program(&mut rng, config.program_size);
            let mut input = vec![0u8; config.input_size];
            rng.fill(&mut input[..]);
            Job::new(program, input)
        })
        .collect()
}

/// Generate random programs and run them all in parallel.
pub fn run_fuzz(config: &FuzzConfig, machine: &MachineConfig, seed: u64) -> FuzzReport {
    let jobs = generate_jobs(config, seed);
    let mut report = FuzzReport::default();
    for result in &run_all(&jobs, machine) {
        report.record(result);
    }
    report
}
