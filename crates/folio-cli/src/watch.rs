//! Live session view.
//!
//! Terminal input is forwarded to the `ActivityTarget` as qualifying
//! activity, so an operator at the keyboard keeps the session alive. The
//! view ends when the session manager publishes a logout (idle timeout,
//! explicit `l`) or on `q`/Ctrl+C.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseEventKind,
    },
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, ClearType},
};
use folio_core::{ActivityKind, ActivityTarget, SessionManager};
use tracing::{debug, info, warn};

use crate::format::format_remaining;

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

enum Exit {
    Quit,
    LoggedOut,
}

pub async fn run(session: &SessionManager, activity: &ActivityTarget) -> Result<()> {
    if !session.check_expiration() {
        println!("No active session. Run `folio-admin login` first.");
        return Ok(());
    }

    let result = {
        let _terminal = TerminalGuard::enter()?;
        watch_loop(session, activity).await
    };
    println!();

    match result? {
        Exit::Quit => println!("Stopped watching; session is still active."),
        Exit::LoggedOut => println!("Session ended. Run `folio-admin login` to sign in again."),
    }
    Ok(())
}

/// Raw mode and mouse capture, restored when dropped, including when
/// setup fails halfway.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(io::stdout(), EnableMouseCapture, cursor::Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "Failed to leave raw mode");
        }
        if let Err(e) = execute!(io::stdout(), DisableMouseCapture, cursor::Show) {
            warn!(error = %e, "Failed to restore terminal");
        }
    }
}

async fn watch_loop(session: &SessionManager, activity: &ActivityTarget) -> Result<Exit> {
    let status = session.subscribe();
    let mut last_line = String::new();
    info!("Watch view started");

    loop {
        if !*status.borrow() {
            info!("Session ended while watching");
            return Ok(Exit::LoggedOut);
        }

        let line = status_line(session);
        if line != last_line {
            draw(&line)?;
            last_line = line;
        }

        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            let event = event::read()?;
            if let Event::Key(key) = event {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(Exit::Quit)
                        }
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(Exit::Quit),
                        KeyCode::Char('l') => {
                            session.logout();
                            continue;
                        }
                        _ => {}
                    }
                }
            }
            if let Some(kind) = activity_for(&event) {
                let delivered = activity.dispatch(kind);
                debug!(%kind, delivered, "Terminal activity");
            }
        }

        // Let the watchdog and debounce tasks make progress
        tokio::task::yield_now().await;
    }
}

fn status_line(session: &SessionManager) -> String {
    match session.remaining() {
        Some(remaining) => format!(
            "Session active, idle logout in {}   [q] quit  [l] log out",
            format_remaining(remaining)
        ),
        None => "Session inactive".to_string(),
    }
}

fn draw(line: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine)
    )?;
    write!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}

/// Map a terminal event to the activity it represents, if any.
pub fn activity_for(event: &Event) -> Option<ActivityKind> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => Some(ActivityKind::KeyPress),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ActivityKind::PointerMove),
            MouseEventKind::Down(_) => Some(ActivityKind::PointerDown),
            MouseEventKind::ScrollUp
            | MouseEventKind::ScrollDown
            | MouseEventKind::ScrollLeft
            | MouseEventKind::ScrollRight => Some(ActivityKind::Scroll),
            MouseEventKind::Up(_) => None,
        },
        Event::Paste(_) => Some(ActivityKind::KeyPress),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, MouseButton, MouseEvent};

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_terminal_guard_restores_raw_mode() {
        // Without a TTY, entering fails and must leave raw mode off
        if let Ok(guard) = TerminalGuard::enter() {
            drop(guard);
        }
        assert!(!terminal::is_raw_mode_enabled().unwrap_or(false));
    }

    #[test]
    fn test_activity_mapping() {
        let key = Event::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(activity_for(&key), Some(ActivityKind::KeyPress));
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Moved)),
            Some(ActivityKind::PointerMove)
        );
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(ActivityKind::PointerDown)
        );
        assert_eq!(
            activity_for(&mouse(MouseEventKind::ScrollDown)),
            Some(ActivityKind::Scroll)
        );
        assert_eq!(activity_for(&mouse(MouseEventKind::Up(MouseButton::Left))), None);
        assert_eq!(activity_for(&Event::Resize(80, 24)), None);
    }
}
