//! Fatal conditions raised by the stepper.

use std::fmt;

use thiserror::Error;

/// Snapshot of machine state captured at the moment a run fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The offending source byte, or `None` if the code pointer was out of range.
    pub instruction: Option<u8>,
    /// Byte offset of the offending instruction in the program source.
    pub position: usize,
    pub tape_pointer: usize,
    pub tape_value: u8,
    /// The configured loop limit of the machine that failed.
    pub loop_limit: u64,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instr = self.instruction.map_or('?', char::from);
        write!(
            f,
            "»»»{instr}.{}««« (P){} (V){:02X}",
            self.position, self.tape_pointer, self.tape_value
        )
    }
}

/// Why a program fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgramFaultReason {
    #[error("code pointer is past the end of the code (length {len})")]
    CodePointerOutOfRange { len: usize },
    #[error("no matching ']' for this '['")]
    UnmatchedOpen,
    #[error("no matching '[' for this ']'")]
    UnmatchedClose,
}

/// A fatal condition. The engine never recovers from one; the run stops and
/// the machine becomes inert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("{diagnostic} {reason}")]
    Program {
        reason: ProgramFaultReason,
        diagnostic: Diagnostic,
    },
    #[error(
        "{0} Program exceeded more than {limit} jumps backwards, this may be an infinite loop!",
        limit = group_thousands(.0.loop_limit)
    )]
    LoopLimitExceeded(Diagnostic),
    #[error("{0} Program exceeded the step limit of {limit}", limit = group_thousands(.1))]
    StepLimitExceeded(Diagnostic, u64),
    #[error("{0} Program touched more than {limit} tape cells", limit = group_thousands(.1))]
    TapeLimitExceeded(Diagnostic, usize),
}

impl Fault {
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            Fault::Program { diagnostic, .. } => diagnostic,
            Fault::LoopLimitExceeded(d) => d,
            Fault::StepLimitExceeded(d, _) => d,
            Fault::TapeLimitExceeded(d, _) => d,
        }
    }

    /// Short machine-readable name of the fault kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Program { .. } => "program",
            Fault::LoopLimitExceeded(_) => "loop-limit",
            Fault::StepLimitExceeded(..) => "step-limit",
            Fault::TapeLimitExceeded(..) => "tape-limit",
        }
    }
}

/// Format `n` with comma thousands separators, e.g. `1,000,000`.
pub fn group_thousands(n: impl fmt::Display) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
