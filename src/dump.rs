use crate::tape::Tape;

/// Cells per dump row.
pub const ROW_WIDTH: usize = 16;

/// Render the first `window` cells of `tape` as two-digit hex, 16 per row.
///
/// The cell under `pointer` is bracketed as `»XX«`; every other cell is
/// preceded by a space. Rows end in `" \n"`. If `pointer` lies outside the
/// window no cell is marked, and a trailing notice line says so.
pub fn dump_tape(tape: &Tape, pointer: usize, window: usize) -> String {
    // 3 chars per cell plus 2 per row terminator.
    let mut out = String::with_capacity(window * 3 + (window / ROW_WIDTH) * 2 + 64);
    for addr in 0..window {
        let value = tape.read(addr);
        if addr == pointer {
            out.push_str(&format!("»{value:02X}«"));
        } else {
            out.push_str(&format!(" {value:02X}"));
        }
        if (addr + 1) % ROW_WIDTH == 0 {
            out.push_str(" \n");
        }
    }
    if pointer >= window {
        // Close a partial last row so the notice stands on its own line.
        if window % ROW_WIDTH != 0 {
            out.push_str(" \n");
        }
        out.push_str(&format!(
            "tape pointer {pointer} outside dump range 0..{window}\n"
        ));
    }
    out
}
