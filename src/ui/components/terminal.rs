use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::{execute, terminal, ExecutableCommand};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::error::Result;

pub type Backend = CrosstermBackend<std::io::Stdout>;

/// RAII wrapper that keeps terminal raw/alternate mode scoped to a UI screen.
pub struct TerminalGuard {
    terminal: Terminal<Backend>,
    mouse: bool,
    restored: bool,
}

impl TerminalGuard {
    /// Enter raw + alternate screen modes and hide the cursor.
    pub fn new() -> Result<Self> {
        Self::enter(false)
    }

    /// Same as [`TerminalGuard::new`] but also reports mouse movement and clicks.
    pub fn with_mouse() -> Result<Self> {
        Self::enter(true)
    }

    fn enter(mouse: bool) -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen)?;
        if mouse {
            execute!(stdout, EnableMouseCapture)?;
        }
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            mouse,
            restored: false,
        })
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<Backend> {
        &mut self.terminal
    }

    /// Restore the terminal once, regardless of how many times it is called.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        if self.mouse {
            self.terminal.backend_mut().execute(DisableMouseCapture)?;
        }
        self.terminal.show_cursor()?;
        self.terminal
            .backend_mut()
            .execute(terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
