//! Scoped terminal raw mode for interactive polling of stdin.
//!
//! In raw mode keystrokes reach the process immediately, without line
//! buffering or echo, which is what a [`nonblock_read`](crate::nonblock_read)
//! loop on stdin needs. The guard restores the terminal when dropped, also
//! on early return and panic unwind.

use crossterm::{cursor, execute, terminal};
use std::io;

/// Keeps the terminal in raw mode while alive.
#[derive(Debug)]
pub struct RawModeGuard {
    hide_cursor: bool,
}

impl RawModeGuard {
    /// Enter raw mode.
    ///
    /// # Errors
    ///
    /// Fails when stdin is not a terminal.
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        log::debug!("terminal raw mode enabled");
        Ok(Self { hide_cursor: false })
    }

    /// Enter raw mode and hide the cursor until the guard drops.
    ///
    /// # Errors
    ///
    /// Fails when stdin is not a terminal or the cursor cannot be hidden.
    pub fn acquire_hidden() -> io::Result<Self> {
        let mut guard = Self::acquire()?;
        execute!(io::stdout(), cursor::Hide)?;
        guard.hide_cursor = true;
        Ok(guard)
    }

    /// Run `f` with the terminal back in cooked mode, then re-enter raw mode.
    ///
    /// Useful for printing multi-line output, which raw mode renders without
    /// carriage returns.
    ///
    /// # Errors
    ///
    /// Fails if raw mode cannot be left or re-entered.
    pub fn suspend<T>(&mut self, f: impl FnOnce() -> T) -> io::Result<T> {
        terminal::disable_raw_mode()?;
        let value = f();
        terminal::enable_raw_mode()?;
        Ok(value)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.hide_cursor {
            let _ = execute!(io::stdout(), cursor::Show);
        }
        let _ = terminal::disable_raw_mode();
        log::debug!("terminal raw mode restored");
    }
}
