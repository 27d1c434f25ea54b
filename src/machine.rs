use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::dump::dump_tape;
use crate::fault::{Diagnostic, Fault, ProgramFaultReason};
use crate::program::{Instruction, Program};
use crate::tape::Tape;

/// Maximum number of backward jumps (`]` taken) in a single run.
pub const LOOP_MAX: u64 = 1_000_000;
/// Number of leading tape cells rendered in a dump.
pub const DUMP_SIZE: usize = 512;

/// Limits applied to a single machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Backward-jump ceiling. The jump that brings the counter up to this
    /// value fails the run.
    pub loop_limit: u64,
    /// Number of leading tape cells included in a failure dump.
    pub dump_size: usize,
    /// Optional ceiling on executed steps (no-ops included).
    pub step_limit: Option<u64>,
    /// Optional ceiling on materialised tape cells. Writing at an address at
    /// or beyond it fails the run.
    pub cell_limit: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            loop_limit: LOOP_MAX,
            dump_size: DUMP_SIZE,
            step_limit: None,
            cell_limit: None,
        }
    }
}

/// A failed run: the fault, whatever output had accumulated, and a tape dump.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{fault}")]
pub struct Failure {
    pub fault: Fault,
    pub output: Vec<u8>,
    pub dump: String,
}

/// One execution of one program against one input.
///
/// All run state lives here; independent machines share nothing and can be
/// driven in parallel. A machine is inert once its program is exhausted or a
/// fault is raised.
#[derive(Debug, Clone)]
pub struct Machine {
    program: Program,
    tape: Tape,
    config: MachineConfig,
    code_ptr: usize,
    tape_ptr: usize,
    back_jumps: u64,
    steps: u64,
    output: Vec<u8>,
    input: VecDeque<u8>,
    fault: Option<Fault>,
}

impl Machine {
    pub fn new(program: impl AsRef<[u8]>, input: impl AsRef<[u8]>) -> Self {
        Self::with_config(program, input, MachineConfig::default())
    }

    pub fn with_config(
        program: impl AsRef<[u8]>,
        input: impl AsRef<[u8]>,
        config: MachineConfig,
    ) -> Self {
        Self {
            program: Program::new(program),
            tape: Tape::new(),
            config,
            code_ptr: 0,
            tape_ptr: 0,
            back_jumps: 0,
            steps: 0,
            output: Vec::new(),
            input: input.as_ref().iter().copied().collect(),
            fault: None,
        }
    }

    /// Execute the instruction at the code pointer and advance past it.
    ///
    /// Returns whether program remains. Once a fault has been raised every
    /// further call returns that same fault.
    pub fn step(&mut self) -> Result<bool, Fault> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        self.execute().inspect_err(|fault| self.fault = Some(fault.clone()))
    }

    /// Step until the program is exhausted or a fault is raised.
    pub fn run(&mut self) -> Result<Vec<u8>, Failure> {
        while self.fault.is_some() || self.code_ptr < self.program.len() {
            if let Err(fault) = self.step() {
                warn!(
                    kind = fault.kind(),
                    steps = self.steps,
                    back_jumps = self.back_jumps,
                    "run failed: {fault}"
                );
                return Err(Failure {
                    fault,
                    output: self.output.clone(),
                    dump: self.dump(),
                });
            }
        }
        debug!(
            steps = self.steps,
            back_jumps = self.back_jumps,
            output_len = self.output.len(),
            "run completed"
        );
        Ok(self.output.clone())
    }

    fn execute(&mut self) -> Result<bool, Fault> {
        let len = self.program.len();
        let pos = self.code_ptr;
        if pos >= len {
            return Err(self.program_fault(ProgramFaultReason::CodePointerOutOfRange { len }));
        }

        if let Some(limit) = self.config.step_limit {
            if self.steps >= limit {
                return Err(Fault::StepLimitExceeded(self.diagnostic(), limit));
            }
        }
        self.steps += 1;

        let ptr = self.tape_ptr;
        let mut next = pos + 1;
        match self.program.instruction_at(pos) {
            Some(Instruction::Right) => self.tape_ptr = Tape::move_right(ptr),
            Some(Instruction::Left) => self.tape_ptr = Tape::move_left(ptr),
            Some(Instruction::Increment) => {
                self.check_cell_limit()?;
                self.tape.increment(ptr);
            }
            Some(Instruction::Decrement) => {
                self.check_cell_limit()?;
                self.tape.decrement(ptr);
            }
            Some(Instruction::Output) => self.output.push(self.tape.read(ptr)),
            Some(Instruction::Input) => {
                self.check_cell_limit()?;
                let value = self.input.pop_front().unwrap_or(0);
                self.tape.write(ptr, value);
            }
            Some(Instruction::JumpForward) => {
                if self.tape.read(ptr) == 0 {
                    let close = self.program.matching_close(pos).ok_or_else(|| {
                        self.program_fault(ProgramFaultReason::UnmatchedOpen)
                    })?;
                    next = close + 1;
                }
            }
            Some(Instruction::JumpBack) => {
                if self.tape.read(ptr) != 0 {
                    // Counter saturates at the limit, so it never passes it.
                    let limit = self.config.loop_limit;
                    self.back_jumps = (self.back_jumps + 1).min(limit);
                    if self.back_jumps >= limit {
                        return Err(Fault::LoopLimitExceeded(self.diagnostic()));
                    }
                    // Land on the '[' itself so its condition is re-evaluated.
                    next = self.program.matching_open(pos).ok_or_else(|| {
                        self.program_fault(ProgramFaultReason::UnmatchedClose)
                    })?;
                }
            }
            None => {}
        }

        self.code_ptr = next;
        Ok(next < len)
    }

    fn check_cell_limit(&self) -> Result<(), Fault> {
        match self.config.cell_limit {
            Some(limit) if self.tape_ptr >= limit => {
                Err(Fault::TapeLimitExceeded(self.diagnostic(), limit))
            }
            _ => Ok(()),
        }
    }

    fn program_fault(&self, reason: ProgramFaultReason) -> Fault {
        Fault::Program {
            reason,
            diagnostic: self.diagnostic(),
        }
    }

    /// Snapshot at the current code position. The instruction byte is `None`
    /// only when the code pointer is out of range.
    fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            instruction: self.program.byte_at(self.code_ptr),
            position: self.code_ptr,
            tape_pointer: self.tape_ptr,
            tape_value: self.tape.read(self.tape_ptr),
            loop_limit: self.config.loop_limit,
        }
    }

    /// Hex dump of the configured tape window.
    pub fn dump(&self) -> String {
        dump_tape(&self.tape, self.tape_ptr, self.config.dump_size)
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn code_pointer(&self) -> usize {
        self.code_ptr
    }

    pub fn tape_pointer(&self) -> usize {
        self.tape_ptr
    }

    pub fn back_jumps(&self) -> u64 {
        self.back_jumps
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Input bytes not yet consumed by `,`.
    pub fn remaining_input(&self) -> impl Iterator<Item = u8> + '_ {
        self.input.iter().copied()
    }

    /// True once the program is exhausted or a fault has been raised.
    pub fn is_halted(&self) -> bool {
        self.fault.is_some() || self.code_ptr >= self.program.len()
    }
}

/// Convenience: run `program` on `input` with `config` to completion.
pub fn execute(
    program: impl AsRef<[u8]>,
    input: impl AsRef<[u8]>,
    config: &MachineConfig,
) -> Result<Vec<u8>, Failure> {
    Machine::with_config(program, input, config.clone()).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(loop_limit: u64) -> MachineConfig {
        MachineConfig {
            loop_limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_echo_one_byte() {
        let out = Machine::new(",.", "Z").run().unwrap();
        assert_eq!(out, b"Z");
    }

    #[test]
    fn test_increment_three() {
        let out = Machine::new("+++.", "").run().unwrap();
        assert_eq!(out, vec![3]);
    }

    #[test]
    fn test_multiply_loop() {
        let mut m = Machine::new("++++[>++++<-]>.", "");
        let out = m.run().unwrap();
        assert_eq!(out, vec![16]);
        assert_eq!(m.tape().read(0), 0);
        assert_eq!(m.tape().read(1), 16);
        // Four iterations, the last `]` falls through.
        assert_eq!(m.back_jumps(), 3);
    }

    #[test]
    fn test_clear_loop_on_zero_never_entered() {
        let mut m = Machine::new("[-]", "");
        let out = m.run().unwrap();
        assert!(out.is_empty());
        assert!(m.tape().is_blank());
        assert_eq!(m.tape().materialised(), 0);
        assert_eq!(m.steps(), 1);
    }

    #[test]
    fn test_comments_only() {
        let mut m = Machine::new("hello world 123 ()", "abc");
        assert!(m.run().unwrap().is_empty());
        assert!(m.tape().is_blank());
        assert_eq!(m.remaining_input().count(), 3);
    }

    #[test]
    fn test_empty_program() {
        let mut m = Machine::new("", "");
        assert!(m.is_halted());
        assert_eq!(m.run().unwrap(), Vec::<u8>::new());
        assert_eq!(m.steps(), 0);
    }

    #[test]
    fn test_step_reports_remaining() {
        let mut m = Machine::new("+a+", "");
        assert_eq!(m.step(), Ok(true));
        assert_eq!(m.step(), Ok(true));
        assert_eq!(m.step(), Ok(false));
        assert_eq!(m.tape().read(0), 2);
    }

    #[test]
    fn test_step_past_end_is_program_fault() {
        let mut m = Machine::new("+", "");
        assert_eq!(m.step(), Ok(false));
        let fault = m.step().unwrap_err();
        assert!(matches!(
            fault,
            Fault::Program {
                reason: ProgramFaultReason::CodePointerOutOfRange { len: 1 },
                ..
            }
        ));
        assert_eq!(fault.diagnostic().instruction, None);
        assert_eq!(fault.diagnostic().position, 1);
    }

    #[test]
    fn test_wraparound_both_ways() {
        let mut m = Machine::new("-", "");
        m.run().unwrap();
        assert_eq!(m.tape().read(0), 255);

        let mut m = Machine::new("-+", "");
        m.run().unwrap();
        assert_eq!(m.tape().read(0), 0);

        let mut m = Machine::new("-+-", "");
        m.run().unwrap();
        assert_eq!(m.tape().read(0), 255);
    }

    #[test]
    fn test_left_clamps_at_zero() {
        let mut m = Machine::new("<<<<+", "");
        m.run().unwrap();
        assert_eq!(m.tape_pointer(), 0);
        assert_eq!(m.tape().read(0), 1);

        let mut m = Machine::new(">><<<<>", "");
        m.run().unwrap();
        assert_eq!(m.tape_pointer(), 1);
    }

    #[test]
    fn test_input_fifo_then_zero() {
        let mut m = Machine::new(",>,>+,", "AB");
        m.run().unwrap();
        assert_eq!(m.tape().read(0), 65);
        assert_eq!(m.tape().read(1), 66);
        // Exhausted input overwrites the cell with 0.
        assert_eq!(m.tape().read(2), 0);
        assert_eq!(m.remaining_input().count(), 0);
    }

    #[test]
    fn test_input_is_bytes() {
        let out = Machine::new(",.,.", "é").run().unwrap();
        assert_eq!(out, "é".as_bytes());
    }

    #[test]
    fn test_output_raw_bytes() {
        let out = Machine::new("-.", "").run().unwrap();
        assert_eq!(out, vec![255]);
    }

    #[test]
    fn test_skip_nested_body() {
        let mut m = Machine::new("[[+]+[.]+]+", "");
        m.run().unwrap();
        assert_eq!(m.tape().read(0), 1);
        assert!(m.output().is_empty());
        // '[' then the trailing '+'.
        assert_eq!(m.steps(), 2);
    }

    #[test]
    fn test_skip_lands_past_matching_close() {
        let mut m = Machine::new("[]+", "");
        assert_eq!(m.step(), Ok(true));
        assert_eq!(m.code_pointer(), 2);
    }

    #[test]
    fn test_backward_jump_relands_on_open() {
        let mut m = Machine::new("+[-]", "");
        m.step().unwrap(); // +
        m.step().unwrap(); // [
        m.step().unwrap(); // -
        assert_eq!(m.code_pointer(), 3);
        // cell is 0, no jump
        assert_eq!(m.step(), Ok(false));

        let mut m = Machine::new("++[-]", "");
        for _ in 0..4 {
            m.step().unwrap();
        }
        assert_eq!(m.step(), Ok(true));
        assert_eq!(m.code_pointer(), 2);
        assert_eq!(m.back_jumps(), 1);
    }

    #[test]
    fn test_loop_guard_fires_exactly_at_limit() {
        // Two backward jumps happen: 3 -> 2 (jump), 2 -> 1 (jump), 1 -> 0 (fall through).
        let mut m = Machine::with_config("+++[-]", "", limited(3));
        assert!(m.run().is_ok());
        assert_eq!(m.back_jumps(), 2);

        let mut m = Machine::with_config("+++[-]", "", limited(2));
        let failure = m.run().unwrap_err();
        assert_eq!(m.back_jumps(), 2);
        match &failure.fault {
            Fault::LoopLimitExceeded(d) => {
                assert_eq!(d.instruction, Some(b']'));
                assert_eq!(d.position, 5);
                assert_eq!(d.tape_pointer, 0);
                assert_eq!(d.tape_value, 1);
                assert_eq!(d.loop_limit, 2);
            }
            other => panic!("expected loop limit, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_loop_limit_never_overshoots() {
        let mut m = Machine::with_config("++[-]", "", limited(0));
        let failure = m.run().unwrap_err();
        assert_eq!(m.back_jumps(), 0);
        match &failure.fault {
            Fault::LoopLimitExceeded(d) => {
                assert_eq!(d.position, 4);
                assert_eq!(d.tape_value, 1);
                assert_eq!(d.loop_limit, 0);
            }
            other => panic!("expected loop limit, got {other:?}"),
        }
    }

    #[test]
    fn test_step_limit_diagnostic_reports_noop_byte() {
        let config = MachineConfig {
            step_limit: Some(1),
            ..Default::default()
        };
        let failure = Machine::with_config("+x", "", config).run().unwrap_err();
        assert_eq!(failure.fault.diagnostic().instruction, Some(b'x'));
        assert_eq!(failure.fault.diagnostic().position, 1);
    }

    #[test]
    fn test_loop_guard_keeps_partial_output() {
        let mut m = Machine::with_config("+[.]", "", limited(1000));
        let failure = m.run().unwrap_err();
        assert!(matches!(failure.fault, Fault::LoopLimitExceeded(_)));
        assert_eq!(failure.output.len(), 1000);
        assert!(failure.output.iter().all(|&b| b == 1));
        assert_eq!(m.back_jumps(), 1000);
        assert!(failure.dump.starts_with("»01«"));
    }

    #[test]
    fn test_default_loop_limit() {
        let mut m = Machine::new("+[]", "");
        let failure = m.run().unwrap_err();
        assert!(matches!(failure.fault, Fault::LoopLimitExceeded(_)));
        assert_eq!(m.back_jumps(), LOOP_MAX);
        assert!(failure.fault.to_string().contains("1,000,000 jumps backwards"));
    }

    #[test]
    fn test_faulted_machine_is_inert() {
        let mut m = Machine::with_config("+[]", "", limited(1));
        let first = m.run().unwrap_err();
        let steps = m.steps();
        assert!(m.is_halted());
        assert_eq!(m.step(), Err(first.fault.clone()));
        assert_eq!(m.run().unwrap_err().fault, first.fault);
        assert_eq!(m.steps(), steps);
    }

    #[test]
    fn test_unmatched_open_faults_at_bracket() {
        let mut m = Machine::new("ab[+", "");
        let failure = m.run().unwrap_err();
        match failure.fault {
            Fault::Program {
                reason: ProgramFaultReason::UnmatchedOpen,
                diagnostic,
            } => {
                assert_eq!(diagnostic.position, 2);
                assert_eq!(diagnostic.instruction, Some(b'['));
            }
            other => panic!("expected unmatched open, got {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_open_is_lazy() {
        // Never scanned because the cell is non-zero on arrival.
        let out = Machine::new("+[.-", "").run().unwrap();
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn test_unmatched_close_faults_at_bracket() {
        let mut m = Machine::new("+.]", "");
        let failure = m.run().unwrap_err();
        assert_eq!(failure.output, vec![1]);
        match failure.fault {
            Fault::Program {
                reason: ProgramFaultReason::UnmatchedClose,
                diagnostic,
            } => {
                assert_eq!(diagnostic.position, 2);
                assert_eq!(diagnostic.tape_value, 1);
            }
            other => panic!("expected unmatched close, got {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_close_on_zero_is_fine() {
        assert!(Machine::new("]", "").run().is_ok());
    }

    #[test]
    fn test_step_limit() {
        let config = MachineConfig {
            step_limit: Some(10),
            ..Default::default()
        };
        let mut m = Machine::with_config("+[]", "", config);
        let failure = m.run().unwrap_err();
        assert!(matches!(failure.fault, Fault::StepLimitExceeded(_, 10)));
        assert_eq!(m.steps(), 10);

        let config = MachineConfig {
            step_limit: Some(3),
            ..Default::default()
        };
        assert!(Machine::with_config("+++", "", config).run().is_ok());
    }

    #[test]
    fn test_cell_limit() {
        let config = MachineConfig {
            cell_limit: Some(4),
            ..Default::default()
        };
        let mut m = Machine::with_config(">>>+>>>>>.>+", "", config);
        let failure = m.run().unwrap_err();
        match &failure.fault {
            Fault::TapeLimitExceeded(d, 4) => {
                assert_eq!(d.tape_pointer, 9);
                assert_eq!(d.position, 11);
            }
            other => panic!("expected tape limit, got {other:?}"),
        }
        // Reading and moving past the limit is free.
        assert_eq!(failure.output, vec![0]);
        assert_eq!(m.tape().materialised(), 4);
    }

    #[test]
    fn test_dump_marks_pointer() {
        let mut m = Machine::new(">+++", "");
        m.run().unwrap();
        assert!(m.dump().starts_with(" 00»03« 00"));
    }

    #[test]
    fn test_execute_helper() {
        let out = execute("++.", "", &MachineConfig::default()).unwrap();
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn test_hello_world() {
        let program = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";
        let out = Machine::new(program, "").run().unwrap();
        assert_eq!(out, b"Hello World!\n");
    }
}
