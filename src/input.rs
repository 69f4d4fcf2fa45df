use crate::pet::Command;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum InputEvent {
    Key { key: KeyCode, mods: KeyModifiers },
    /// Pointer position in terminal cells.
    Pointer { column: u16, row: u16 },
    Click { column: u16, row: u16 },
    FocusLost,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum HostAction {
    Command(Command),
    CycleColor,
    Pointer { column: u16, row: u16 },
    Click { column: u16, row: u16 },
    PointerGone,
    Dismiss,
    Quit,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        let ev = match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
                InputEvent::Key {
                    key: k.code,
                    mods: k.modifiers,
                }
            }
            Event::Mouse(m) => match m.kind {
                MouseEventKind::Moved | MouseEventKind::Drag(_) => InputEvent::Pointer {
                    column: m.column,
                    row: m.row,
                },
                MouseEventKind::Down(MouseButton::Left) => InputEvent::Click {
                    column: m.column,
                    row: m.row,
                },
                _ => continue,
            },
            Event::FocusLost => InputEvent::FocusLost,
            _ => continue,
        };
        out.push(ev);
        if out.len() >= 32 {
            break;
        }
    }
    Ok(out)
}

/// `recap` is true while the catch-up box is up; any key closes it.
pub(crate) fn map_event_to_action(recap: bool, ev: InputEvent) -> Option<HostAction> {
    let (key, mods) = match ev {
        InputEvent::Pointer { column, row } => return Some(HostAction::Pointer { column, row }),
        InputEvent::Click { column, row } if !recap => {
            return Some(HostAction::Click { column, row })
        }
        InputEvent::Click { .. } => return Some(HostAction::Dismiss),
        InputEvent::FocusLost => return Some(HostAction::PointerGone),
        InputEvent::Key { key, mods } => (key, mods),
    };

    // Raw mode swallows SIGINT.
    if matches!(key, KeyCode::Char('c') | KeyCode::Char('C'))
        && mods.contains(KeyModifiers::CONTROL)
    {
        return Some(HostAction::Quit);
    }
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Some(HostAction::Quit),
        _ if recap => return Some(HostAction::Dismiss),
        _ => {}
    }

    match key {
        KeyCode::Char('f') | KeyCode::Char('F') => Some(HostAction::Command(Command::Feed)),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(HostAction::Command(Command::Play)),
        KeyCode::Char(' ') | KeyCode::Enter => Some(HostAction::Command(Command::Pet)),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(HostAction::Command(Command::Sleep)),
        KeyCode::Char('c') | KeyCode::Char('C') => Some(HostAction::CycleColor),
        _ => None,
    }
}
