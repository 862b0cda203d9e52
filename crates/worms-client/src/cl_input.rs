// cl_input.rs -- GUI key events driving the turn intent
//
// The GUI speaks newline-terminated ASCII. KEY_DOWN always wins; KEY_UP
// releases only the direction it names, so opposite-key presses interleave
// the way players expect.

use worms_common::protocol::{TURN_LEFT, TURN_RIGHT, TURN_STRAIGHT};

/// Accumulates bytes from the GUI socket and applies complete lines.
#[derive(Debug, Default)]
pub struct GuiInput {
    line: Vec<u8>,
}

impl GuiInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk read from the GUI socket, updating the turn intent for
    /// every complete line.
    pub fn feed(&mut self, bytes: &[u8], turn_direction: &mut u8) {
        for &b in bytes {
            if b == b'\n' {
                cl_apply_key_line(&self.line, turn_direction);
                self.line.clear();
            } else {
                self.line.push(b);
            }
        }
    }
}

/// One GUI line. Unknown lines are ignored.
pub fn cl_apply_key_line(line: &[u8], turn_direction: &mut u8) {
    match line {
        b"LEFT_KEY_DOWN" => *turn_direction = TURN_LEFT,
        b"RIGHT_KEY_DOWN" => *turn_direction = TURN_RIGHT,
        b"LEFT_KEY_UP" if *turn_direction == TURN_LEFT => *turn_direction = TURN_STRAIGHT,
        b"RIGHT_KEY_UP" if *turn_direction == TURN_RIGHT => *turn_direction = TURN_STRAIGHT,
        _ => {}
    }
}

// ============================================================
// Tests
// ============================================================
