pub mod program;
pub mod tape;
pub mod fault;
pub mod dump;
pub mod machine;
pub mod message;
pub mod batch;
pub mod fuzz;

pub use fault::{Diagnostic, Fault, ProgramFaultReason};
pub use machine::{DUMP_SIZE, Failure, LOOP_MAX, Machine, MachineConfig, execute};
