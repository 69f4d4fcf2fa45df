use crate::color::PRESETS;
use crate::config::{load_settings, save_settings_atomic, Paths, Settings};
use crate::events::{Observer, PetEvent};
use crate::input::{collect_input_nonblocking, map_event_to_action, HostAction};
use crate::pet::Command;
use crate::render::{
    canvas_to_cells, draw_center_box, draw_pet, draw_text, hit_pet, ui_overlay, Pixel, Terminal,
};
use crate::runtime::{Runtime, RuntimeOptions, Surface};
use crate::snapshot::CatchUp;
use crate::storage::JsonFileStore;
use crate::Args;
use anyhow::Context;
use chrono::Utc;
use glam::Vec2;
use std::cell::RefCell;
use std::cmp::{max, min};
use std::rc::Rc;
use std::time::{Duration, Instant};

const TOAST_TTL: Duration = Duration::from_secs(3);

/// Last notable change, shown under the meters for a few seconds.
#[derive(Clone, Default)]
struct Toast(Rc<RefCell<Option<(String, Instant)>>>);

impl Toast {
    fn current(&self) -> Option<String> {
        match &*self.0.borrow() {
            Some((msg, at)) if at.elapsed() < TOAST_TTL => Some(msg.clone()),
            _ => None,
        }
    }
}

impl Observer for Toast {
    fn notify(&mut self, event: &PetEvent) {
        let msg = match event {
            PetEvent::MoodChanged { to, .. } => format!("now feeling {}", to.label()),
            PetEvent::ColorChanged(c) => format!("new coat {c}"),
            _ => return,
        };
        *self.0.borrow_mut() = Some((msg, Instant::now()));
    }
}

pub(crate) struct App {
    settings: Settings,
    paths: Paths,
    runtime: Runtime<JsonFileStore>,
    term: Terminal,
    should_quit: bool,
    /// Mouse position in braille subpixels.
    pointer: Option<Vec2>,
    recap: Option<CatchUp>,
    anchor: Vec2,
    toast: Toast,
}

impl App {
    fn init(args: &Args, paths: Paths) -> anyhow::Result<Self> {
        let mut settings = load_settings(&paths.settings_path);
        if let Some(fps) = args.fps {
            settings.fps_cap = fps;
        }
        // ensure deterministic seed exists
        if settings.seed == 0 {
            settings.seed = Settings::default().seed;
        }

        let state_path = args
            .state_file
            .clone()
            .unwrap_or_else(|| paths.state_path.clone());
        let store = JsonFileStore::new(state_path);
        if args.reset {
            store.reset().context("could not remove the saved pet")?;
            log::info!("reset requested, starting over");
        }

        let options = RuntimeOptions {
            seed: args.seed.unwrap_or(settings.seed),
            rules: settings.rules,
            speed_multiplier: args.speed,
            walk_enabled: args.no_walk.then_some(false),
            particles_enabled: args.no_particles.then_some(false),
        };
        let mut runtime = Runtime::open(store, options, Utc::now());
        let toast = Toast::default();
        runtime.subscribe(Box::new(toast.clone()));
        log::info!("pet file: {}", runtime.store().path().display());
        let recap = runtime.catch_up();

        let term = Terminal::begin()?;
        let anchor = pet_anchor(term.cols, term.rows);

        Ok(Self {
            settings,
            paths,
            runtime,
            term,
            should_quit: false,
            pointer: None,
            recap,
            anchor,
            toast,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
        let mut last_frame = Instant::now();

        while !self.should_quit {
            if self.term.resize_if_needed()? {
                self.anchor = pet_anchor(self.term.cols, self.term.rows);
                self.pointer = None;
            }

            // input
            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(action) = map_event_to_action(self.recap.is_some(), ev) {
                    self.handle(action);
                }
                if self.should_quit {
                    break;
                }
            }

            // clocks
            let now = Instant::now();
            let real_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            let surface = Surface {
                anchor: self.anchor,
                pointer: self.pointer,
            };
            self.runtime.advance(real_dt, &surface);

            self.render_frame()?;

            // frame cap
            spin_sleep(frame_dt, Instant::now());
        }
        Ok(())
    }

    fn handle(&mut self, action: HostAction) {
        match action {
            HostAction::Command(cmd) => {
                self.runtime.command(cmd);
            }
            HostAction::CycleColor => {
                self.settings.color_cursor = (self.settings.color_cursor + 1) % PRESETS.len();
                let hex = PRESETS[self.settings.color_cursor].to_string();
                self.runtime.command(Command::SetColor(hex));
            }
            HostAction::Pointer { column, row } => {
                self.pointer = Some(cell_to_subpx(column, row));
            }
            HostAction::Click { column, row } => {
                let p = cell_to_subpx(column, row);
                self.pointer = Some(p);
                if hit_pet(&self.runtime.frame(), self.anchor, p) {
                    self.runtime.command(Command::Pet);
                }
            }
            HostAction::PointerGone => self.pointer = None,
            HostAction::Dismiss => self.recap = None,
            HostAction::Quit => self.should_quit = true,
        }
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let bg = crossterm::style::Color::Black;
        self.term.cur.clear(bg);
        self.term.canvas.clear(Pixel::default());

        let frame = self.runtime.frame();
        draw_pet(&mut self.term.canvas, &frame, self.anchor);
        canvas_to_cells(
            &self.term.canvas,
            &mut self.term.cur,
            self.settings.enable_color,
            bg,
        );

        // UI overlay on top
        ui_overlay(&mut self.term.cur, &frame, self.settings.enable_color);
        if let Some(msg) = self.toast.current() {
            draw_text(&mut self.term.cur, 1, 9, &msg, crossterm::style::Color::Cyan, bg);
        }

        if let Some(c) = &self.recap {
            draw_center_box(
                &mut self.term.cur,
                "While you were away…",
                &format!(
                    "Gone for {}\nFed       {:+.1}\nEnergy    {:+.1}\nHappiness {:+.1}\n\nPress any key",
                    c.away_text(),
                    c.hunger,
                    c.energy,
                    c.happiness
                ),
            );
        }

        self.term.present(true)?;
        Ok(())
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        self.runtime.shutdown();
        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.settings)?;
        Ok(())
    }
}

pub(crate) fn run(args: Args, paths: Paths) -> anyhow::Result<()> {
    let mut app = App::init(&args, paths)?;
    let result = app.run();
    let teardown = app.teardown();
    result.and(teardown)
}

/// Center of the pet viewport (right of the meter panel), in subpixels.
fn pet_anchor(cols: u16, rows: u16) -> Vec2 {
    let cols = cols as i32;
    let panel_w_cells = max(min(max(26, cols / 3), cols - 10), 0);
    let pet_w_cells = cols - panel_w_cells;
    let x = (panel_w_cells + pet_w_cells / 2) * 2;
    let y = rows as i32 * 4 / 2;
    Vec2::new(x as f32, y as f32)
}

/// Middle of a terminal cell, in subpixels.
fn cell_to_subpx(column: u16, row: u16) -> Vec2 {
    Vec2::new(column as f32 * 2.0 + 1.0, row as f32 * 4.0 + 2.0)
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_sits_right_of_panel() {
        let a = pet_anchor(120, 40);
        // panel is 40 cells, viewport 80: center at cell 80.
        assert_eq!(a, Vec2::new(160.0, 80.0));
    }

    #[test]
    fn tiny_terminal_does_not_go_negative() {
        let a = pet_anchor(4, 2);
        assert!(a.x >= 0.0 && a.y >= 0.0);
    }

    #[test]
    fn toast_picks_up_mood_changes_only() {
        let mut toast = Toast::default();
        toast.notify(&PetEvent::NeedsChanged(crate::needs::Needs::default()));
        assert_eq!(toast.current(), None);
        toast.notify(&PetEvent::MoodChanged {
            from: crate::needs::Mood::Content,
            to: crate::needs::Mood::Happy,
        });
        assert_eq!(toast.current().as_deref(), Some("now feeling happy"));
    }

    #[test]
    fn cells_map_to_subpixel_centers() {
        assert_eq!(cell_to_subpx(0, 0), Vec2::new(1.0, 2.0));
        assert_eq!(cell_to_subpx(10, 3), Vec2::new(21.0, 14.0));
    }
}
