use std::io::{Read, Write};
use std::path::PathBuf;

use bfmachine::batch::{Job, run_all};
use bfmachine::fuzz::{FuzzConfig, run_fuzz};
use bfmachine::message::{MessageConfig, respond};
use bfmachine::{DUMP_SIZE, LOOP_MAX, MachineConfig};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bfmachine", about = "Loop-guarded Brainfuck interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run program files and write their output to stdout.
    Run {
        /// Program source files. Each runs on its own machine.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Input text fed to every program.
        #[arg(long, default_value = "")]
        input: String,

        #[command(flatten)]
        limits: Limits,
    },

    /// Read a chat message on stdin and print the reply messages.
    Message {
        /// Language tag that marks the code block.
        #[arg(long, default_value = "bf")]
        tag: String,

        /// Maximum characters per reply message.
        #[arg(long, default_value_t = 2000)]
        message_limit: usize,

        #[command(flatten)]
        limits: Limits,
    },

    /// Run random programs in parallel and report how they ended.
    Fuzz {
        /// Random seed for reproducibility.
        #[arg(long)]
        seed: u64,

        /// Number of programs to run.
        #[arg(long, default_value_t = 1 << 10)]
        count: usize,

        /// Characters per program.
        #[arg(long, default_value_t = 64)]
        program_size: usize,

        /// Random input bytes per program.
        #[arg(long, default_value_t = 8)]
        input_size: usize,

        #[command(flatten)]
        limits: Limits,
    },
}

#[derive(Args, Clone)]
struct Limits {
    /// Backward jumps allowed before a run is aborted.
    #[arg(long, default_value_t = LOOP_MAX)]
    loop_limit: u64,

    /// Tape cells shown in a failure dump.
    #[arg(long, default_value_t = DUMP_SIZE)]
    dump_size: usize,

    /// Abort after this many executed steps.
    #[arg(long)]
    step_limit: Option<u64>,

    /// Abort when writing at or beyond this tape address.
    #[arg(long)]
    cell_limit: Option<usize>,
}

impl From<&Limits> for MachineConfig {
    fn from(limits: &Limits) -> Self {
        MachineConfig {
            loop_limit: limits.loop_limit,
            dump_size: limits.dump_size,
            step_limit: limits.step_limit,
            cell_limit: limits.cell_limit,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bfmachine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Command::Run {
            files,
            input,
            limits,
        } => run_files(&files, &input, &MachineConfig::from(&limits)),
        Command::Message {
            tag,
            message_limit,
            limits,
        } => {
            let config = MessageConfig {
                language_tag: tag,
                message_limit,
            };
            run_message(&MachineConfig::from(&limits), &config)
        }
        Command::Fuzz {
            seed,
            count,
            program_size,
            input_size,
            limits,
        } => {
            let mut machine = MachineConfig::from(&limits);
            // Random programs loop a lot; keep each run short unless told otherwise.
            machine.step_limit.get_or_insert(1 << 16);
            let config = FuzzConfig {
                count,
                program_size,
                input_size,
            };
            run_fuzz_report(&config, &machine, seed);
            0
        }
    };
    std::process::exit(code);
}

fn run_files(files: &[PathBuf], input: &str, config: &MachineConfig) -> i32 {
    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        match std::fs::read(path) {
            Ok(program) => jobs.push(Job::new(program, input)),
            Err(e) => {
                error!("Failed to read {}: {e}", path.display());
                return 1;
            }
        }
    }

    let mut code = 0;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (path, result) in files.iter().zip(run_all(&jobs, config)) {
        let bytes = match result {
            Ok(output) => output,
            Err(failure) => {
                error!("{}: {}", path.display(), failure.fault);
                eprintln!("{}", failure.dump);
                code = 1;
                failure.output
            }
        };
        if let Err(e) = out.write_all(&bytes) {
            error!("Failed to write output: {e}");
            return 1;
        }
    }
    if let Err(e) = out.flush() {
        error!("Failed to flush output: {e}");
        return 1;
    }
    code
}

fn run_message(machine: &MachineConfig, config: &MessageConfig) -> i32 {
    let mut text = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut text) {
        error!("Failed to read message: {e}");
        return 1;
    }
    let Some(response) = respond(&text, machine, config) else {
        info!("No `{} code block found", config.language_tag);
        return 0;
    };
    for message in response.messages() {
        println!("{message}\n");
    }
    0
}

fn run_fuzz_report(config: &FuzzConfig, machine: &MachineConfig, seed: u64) {
    let start = std::time::Instant::now();
    let report = run_fuzz(config, machine, seed);
    let elapsed = start.elapsed();
    let runs_per_sec = report.runs as f64 / elapsed.as_secs_f64();

    eprintln!("Fuzz results:");
    eprintln!("  Runs:              {}", report.runs);
    eprintln!("  Completed:         {}", report.completed);
    eprintln!("  Loop limit:        {}", report.loop_limited);
    eprintln!("  Step limit:        {}", report.step_limited);
    eprintln!("  Tape limit:        {}", report.tape_limited);
    eprintln!("  Program faults:    {}", report.program_faults);
    eprintln!("  Output bytes:      {}", report.output_bytes);
    eprintln!("  Elapsed:           {elapsed:.2?}");
    eprintln!("  Runs/sec:          {runs_per_sec:.0}");
}
