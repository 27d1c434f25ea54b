/// Byte-addressable machine memory, unbounded to the right.
///
/// Backed by a growable buffer that is lazily zero-filled on the first write
/// past its current length. Reads past the end yield 0 without growing. The
/// clamp at address 0 is a pointer movement rule ([`Tape::move_left`]), not a
/// property of the buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u8>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn read(&self, addr: usize) -> u8 {
        self.cells.get(addr).copied().unwrap_or(0)
    }

    pub fn write(&mut self, addr: usize, value: u8) {
        if addr >= self.cells.len() {
            self.cells.resize(addr + 1, 0);
        }
        self.cells[addr] = value;
    }

    pub fn increment(&mut self, addr: usize) {
        self.write(addr, self.read(addr).wrapping_add(1));
    }

    pub fn decrement(&mut self, addr: usize) {
        self.write(addr, self.read(addr).wrapping_sub(1));
    }

    /// Address one to the right. Unbounded.
    #[inline(always)]
    pub fn move_right(addr: usize) -> usize {
        addr + 1
    }

    /// Address one to the left. Moving left from 0 stays at 0.
    #[inline(always)]
    pub fn move_left(addr: usize) -> usize {
        addr.saturating_sub(1)
    }

    /// Number of cells materialised so far (one past the highest written address).
    pub fn materialised(&self) -> usize {
        self.cells.len()
    }

    /// True if no cell holds a non-zero value.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|&b| b == 0)
    }
}
