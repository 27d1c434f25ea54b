/// The eight significant characters of the language.
///
/// Every other byte in a program is a no-op and only advances the code pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `>`: move the tape pointer right.
    Right,
    /// `<`: move the tape pointer left, clamped at address 0.
    Left,
    /// `+`: increment the current cell, wrapping at 255.
    Increment,
    /// `-`: decrement the current cell, wrapping at 0.
    Decrement,
    /// `.`: append the current cell to the output.
    Output,
    /// `,`: read one input byte into the current cell (0 once input runs dry).
    Input,
    /// `[`: skip past the matching `]` if the current cell is zero.
    JumpForward,
    /// `]`: jump back to the matching `[` if the current cell is non-zero.
    JumpBack,
}

const GREATER: u8 = b'>';
const LESS: u8 = b'<';
const PLUS: u8 = b'+';
const MINUS: u8 = b'-';
const DOT: u8 = b'.';
const COMMA: u8 = b',';
const LBRACKET: u8 = b'[';
const RBRACKET: u8 = b']';

impl Instruction {
    /// Decode a single byte. Returns `None` for no-op bytes.
    #[inline(always)]
    pub fn decode(byte: u8) -> Option<Self> {
        match byte {
            GREATER => Some(Self::Right),
            LESS => Some(Self::Left),
            PLUS => Some(Self::Increment),
            MINUS => Some(Self::Decrement),
            DOT => Some(Self::Output),
            COMMA => Some(Self::Input),
            LBRACKET => Some(Self::JumpForward),
            RBRACKET => Some(Self::JumpBack),
            _ => None,
        }
    }
}

/// Immutable program text.
///
/// Positions are byte offsets into the source. Bracket balance is not checked
/// up front; the stepper discovers unmatched brackets when it scans for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    source: Box<[u8]>,
}

impl Program {
    pub fn new(source: impl AsRef<[u8]>) -> Self {
        Self {
            source: source.as_ref().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Raw byte at `position`, if in range.
    pub fn byte_at(&self, position: usize) -> Option<u8> {
        self.source.get(position).copied()
    }

    /// Decoded instruction at `position`. Out-of-range positions and no-op
    /// bytes both yield `None`.
    pub fn instruction_at(&self, position: usize) -> Option<Instruction> {
        self.byte_at(position).and_then(Instruction::decode)
    }

    /// Scan forward from the `[` at `open` for its matching `]`.
    ///
    /// Depth starts at 1, each further `[` deepens it and each `]` shallows it;
    /// the scan stops the instant depth reaches 0. Returns `None` if the
    /// program ends first.
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 1usize;
        for (pos, &byte) in self.source.iter().enumerate().skip(open + 1) {
            match byte {
                LBRACKET => depth += 1,
                RBRACKET => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Scan backward from the `]` at `close` for its matching `[`.
    ///
    /// Mirror image of [`Program::matching_close`]. Returns `None` if the
    /// start of the program is reached first.
    pub fn matching_open(&self, close: usize) -> Option<usize> {
        let mut depth = 1usize;
        for pos in (0..close.min(self.source.len())).rev() {
            match self.source[pos] {
                RBRACKET => depth += 1,
                LBRACKET => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
