use crate::behavior::{BehaviorState, Direction};
use crate::color::PetColor;
use crate::needs::{Mood, NEED_MAX};
use crate::particles::ParticleKind;
use crate::runtime::Frame;
use crossterm::{
    cursor,
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use glam::Vec2;
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
    pub(crate) bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
            bold: false,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            c.ch = ' ';
            c.fg = Color::White;
            c.bg = bg;
            c.bold = false;
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self, p: Pixel) {
        self.px.fill(p);
    }
    fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            EnableMouseCapture,
            EnableFocusChange,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);

        // Braille: 2×4 pixels per cell
        let canvas = PixelCanvas::new(cols as u32 * 2, rows as u32 * 4);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
            canvas,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            DisableFocusChange,
            DisableMouseCapture,
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;
        let mut last_bold = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }
                if last_bold != Some(c.bold) {
                    let attr = if c.bold {
                        Attribute::Bold
                    } else {
                        Attribute::NormalIntensity
                    };
                    queue!(self.out, SetAttribute(attr))?;
                    last_bold = Some(c.bold);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(
            self.out,
            SetAttribute(Attribute::Reset),
            ResetColor,
            EndSynchronizedUpdate
        )?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

pub(crate) fn canvas_to_cells(
    canvas: &PixelCanvas,
    out: &mut CellBuffer,
    enable_color: bool,
    bg: Color,
) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let px0 = cx * 2;
            let py0 = cy * 4;

            let mut mask: u8 = 0;
            let mut sum_r: u32 = 0;
            let mut sum_g: u32 = 0;
            let mut sum_b: u32 = 0;
            let mut ink_count: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = px0 + dx;
                    let y = py0 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    let a = p.a as u32;

                    // threshold: treat alpha as ink
                    if a >= 32 {
                        mask |= braille_bit(dx, dy);
                        sum_r += p.r as u32;
                        sum_g += p.g as u32;
                        sum_b += p.b as u32;
                        ink_count += 1;
                    }
                }
            }

            let ch = char::from_u32(0x2800 + (mask as u32)).unwrap_or(' ');

            let fg = if enable_color && ink_count > 0 {
                let r = (sum_r / ink_count) as u8;
                let g = (sum_g / ink_count) as u8;
                let b = (sum_b / ink_count) as u8;
                Color::Rgb { r, g, b }
            } else {
                Color::White
            };

            out.set(
                cx as u16,
                cy as u16,
                Cell {
                    ch,
                    fg,
                    bg,
                    bold: false,
                },
            );
        }
    }
}


/* -----------------------------
   Pet renderer (braille subpixels)
------------------------------ */

/// Body half-extents at rest, in subpixels.
pub(crate) const BODY_RX: f32 = 12.0;
pub(crate) const BODY_RY: f32 = 9.0;

const EYE_GAP: f32 = 4.0;
const EYE_RISE: f32 = 2.0;
/// Pupil offsets are shrunk to fit the tiny terminal eyes.
const PUPIL_SCALE: f32 = 0.5;

fn ink(c: PetColor, a: u8) -> Pixel {
    Pixel {
        r: c.r,
        g: c.g,
        b: c.b,
        a,
    }
}

fn disc(canvas: &mut PixelCanvas, c: Vec2, r: f32, p: Pixel) {
    let ri = r.ceil() as i32;
    let (cx, cy) = (c.x.round() as i32, c.y.round() as i32);
    for y in -ri..=ri {
        for x in -ri..=ri {
            if (x * x + y * y) as f32 <= r * r {
                canvas.blend_over(cx + x, cy + y, p);
            }
        }
    }
}

fn dot(canvas: &mut PixelCanvas, c: Vec2, dx: i32, dy: i32, p: Pixel) {
    canvas.blend_over(c.x.round() as i32 + dx, c.y.round() as i32 + dy, p);
}

/// Where the body is drawn this frame: rests on its feet whatever the squash.
pub(crate) fn body_center(frame: &Frame<'_>, anchor: Vec2) -> Vec2 {
    let ry = BODY_RY * frame.transform.scale_y;
    anchor + frame.position + Vec2::new(0.0, frame.transform.translate_y + BODY_RY - ry)
}

/// Is `point` on the pet's body?
pub(crate) fn hit_pet(frame: &Frame<'_>, anchor: Vec2, point: Vec2) -> bool {
    let d = point - body_center(frame, anchor);
    let rx = BODY_RX * frame.transform.scale_x;
    let ry = BODY_RY * frame.transform.scale_y;
    (d.x / rx).powi(2) + (d.y / ry).powi(2) <= 1.0
}

pub(crate) fn draw_pet(canvas: &mut PixelCanvas, frame: &Frame<'_>, anchor: Vec2) {
    let center = body_center(frame, anchor);
    let rx = BODY_RX * frame.transform.scale_x;
    let ry = BODY_RY * frame.transform.scale_y;

    // body: lit from the top left
    let (rxi, ryi) = (rx.ceil() as i32, ry.ceil() as i32);
    for y in -ryi..=ryi {
        for x in -rxi..=rxi {
            let (nx, ny) = (x as f32 / rx, y as f32 / ry);
            let d2 = nx * nx + ny * ny;
            if d2 > 1.0 {
                continue;
            }
            let light = 1.1 - 0.25 * (nx + ny + 2.0) / 4.0 - 0.15 * d2;
            let c = frame.color.scaled(light);
            dot(canvas, center, x, y, ink(c, frame.color.a));
        }
    }

    let look = match frame.direction {
        Direction::Left => -1.0,
        Direction::Right => 1.0,
    };
    let eye_y = center.y - EYE_RISE;
    let eyes = [
        Vec2::new(center.x - EYE_GAP + look, eye_y),
        Vec2::new(center.x + EYE_GAP + look, eye_y),
    ];
    let dark = Pixel {
        r: 10,
        g: 10,
        b: 16,
        a: 250,
    };
    let white = Pixel {
        r: 245,
        g: 245,
        b: 250,
        a: 250,
    };

    if frame.state == BehaviorState::Sleeping {
        for e in eyes {
            for dx in -1..=1 {
                dot(canvas, e, dx, 1, dark);
            }
        }
    } else {
        for e in eyes {
            disc(canvas, e, 1.6, white);
            dot(canvas, e + frame.pupil * PUPIL_SCALE, 0, 0, dark);
        }
    }

    // mouth
    let mouth = Vec2::new(center.x + look, center.y + 3.0);
    match frame.mood {
        m if m >= Mood::Content => {
            dot(canvas, mouth, -2, 0, dark);
            dot(canvas, mouth, -1, 1, dark);
            dot(canvas, mouth, 0, 1, dark);
            dot(canvas, mouth, 1, 1, dark);
            dot(canvas, mouth, 2, 0, dark);
        }
        Mood::Neutral => {
            for dx in -1..=1 {
                dot(canvas, mouth, dx, 1, dark);
            }
        }
        _ => {
            dot(canvas, mouth, -2, 1, dark);
            dot(canvas, mouth, -1, 0, dark);
            dot(canvas, mouth, 0, 0, dark);
            dot(canvas, mouth, 1, 0, dark);
            dot(canvas, mouth, 2, 1, dark);
        }
    }

    for p in frame.particles {
        let a = (p.alpha * 255.0) as u8;
        let at = center + p.offset;
        match p.kind {
            ParticleKind::Heart => {
                let pink = Pixel {
                    r: 255,
                    g: 105,
                    b: 180,
                    a,
                };
                for (dx, dy) in [(-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1), (0, 2)] {
                    dot(canvas, at, dx, dy, pink);
                }
            }
            ParticleKind::Crumb => dot(
                canvas,
                at,
                0,
                0,
                Pixel {
                    r: 200,
                    g: 140,
                    b: 70,
                    a,
                },
            ),
            ParticleKind::Snooze => {
                let lilac = Pixel {
                    r: 190,
                    g: 170,
                    b: 255,
                    a,
                };
                for (dx, dy) in [(-1, 0), (0, 0), (1, 0), (0, 1), (-1, 2), (0, 2), (1, 2)] {
                    dot(canvas, at, dx, dy, lilac);
                }
            }
            ParticleKind::Sparkle => {
                let gold = Pixel {
                    r: 255,
                    g: 230,
                    b: 110,
                    a,
                };
                for (dx, dy) in [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)] {
                    dot(canvas, at, dx, dy, gold);
                }
            }
            ParticleKind::Raindrop => {
                let blue = Pixel {
                    r: 110,
                    g: 160,
                    b: 255,
                    a,
                };
                dot(canvas, at, 0, 0, blue);
                dot(canvas, at, 0, 1, blue);
            }
        }
    }
}

/* -----------------------------
   UI overlay (text + meters)
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg,
                bold: false,
            },
        );
    }
}

fn bar(value01: f32, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f32 + 0.5) as usize;
    let mut s = String::new();
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

fn meter_color(v: f32, enable_color: bool) -> Color {
    if !enable_color {
        Color::White
    } else if v < 30.0 {
        Color::Red
    } else if v < 60.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

pub(crate) fn ui_overlay(buf: &mut CellBuffer, frame: &Frame<'_>, enable_color: bool) {
    let bg = Color::Black;
    let fg = Color::White;

    let title = format!(
        "deskpet  |  {}  |  mood: {}  |  age {:.0}m",
        frame.state.label(),
        frame.mood.label(),
        frame.stats.age_minutes
    );
    draw_text(buf, 1, 0, &title, fg, bg);
    for x in 1..(1 + "deskpet".len() as u16).min(buf.w) {
        let i = buf.idx(x, 0);
        buf.cells[i].bold = true;
    }

    let n = frame.needs;
    let lines = [
        ("Happy ", n.happiness()),
        ("Energy", n.energy()),
        ("Fed   ", n.hunger()),
    ];
    for (i, (name, val)) in lines.iter().enumerate() {
        let b = bar(*val / NEED_MAX, 14);
        let s = format!("{name}: {b} {:>5.1}", val);
        draw_text(buf, 1, 2 + i as u16, &s, meter_color(*val, enable_color), bg);
    }

    let s = frame.stats;
    let counts = format!(
        "fed {}  played {}  petted {}",
        s.times_fed, s.times_played, s.times_petted
    );
    draw_text(buf, 1, 6, &counts, fg, bg);

    let f = frame.flags;
    let effects: Vec<&str> = [
        (f.hearts, "hearts"),
        (f.food, "crumbs"),
        (f.sleep, "zzz"),
        (f.sparkles, "sparkles"),
        (f.rain, "rain"),
    ]
    .iter()
    .filter_map(|&(on, name)| on.then_some(name))
    .collect();
    if !effects.is_empty() {
        draw_text(buf, 1, 7, &effects.join(" "), Color::DarkGrey, bg);
    }

    let help = "Keys: f feed | p play | space pet | s sleep | c color | q quit | click pet";
    draw_text(buf, 1, buf.h.saturating_sub(1), help, fg, bg);
}

pub(crate) fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let (w, h) = (buf.w, buf.h);
    let bw = w.saturating_sub(4).min(48);
    let bh = h.saturating_sub(4).min(10);
    if bw < 4 || bh < 4 {
        return;
    }
    let x0 = (w - bw) / 2;
    let y0 = (h - bh) / 2;
    let edge = |ch| Cell {
        ch,
        fg: Color::White,
        bg: Color::Black,
        bold: false,
    };

    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            let top = y == y0;
            let bottom = y == y0 + bh - 1;
            let left = x == x0;
            let right = x == x0 + bw - 1;
            let ch = match (top, bottom, left, right) {
                (true, _, true, _) => '┌',
                (true, _, _, true) => '┐',
                (_, true, true, _) => '└',
                (_, true, _, true) => '┘',
                (true, _, _, _) | (_, true, _, _) => '─',
                (_, _, true, _) | (_, _, _, true) => '│',
                _ => ' ',
            };
            buf.set(x, y, edge(ch));
        }
    }

    draw_text(buf, x0 + 2, y0 + 1, title, Color::White, Color::Black);
    let mut yy = y0 + 3;
    for line in body.lines() {
        if yy >= y0 + bh - 1 {
            break;
        }
        draw_text(buf, x0 + 2, yy, line, Color::White, Color::Black);
        yy += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Transform;
    use crate::behavior::ParticleFlags;
    use crate::needs::{Needs, Stats};

    fn frame() -> Frame<'static> {
        Frame {
            state: BehaviorState::Idle,
            mood: Mood::Happy,
            needs: Needs::default(),
            stats: Stats::default(),
            position: Vec2::new(5.0, 0.0),
            direction: Direction::Right,
            flags: ParticleFlags::NONE,
            color: PetColor::default(),
            pupil: Vec2::ZERO,
            transform: Transform::IDENTITY,
            particles: &[],
        }
    }

    #[test]
    fn full_cell_is_all_dots() {
        let mut canvas = PixelCanvas::new(2, 4);
        canvas.clear(Pixel {
            r: 255,
            g: 0,
            b: 0,
            a: 255,
        });
        let mut cells = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut cells, true, Color::Black);
        assert_eq!(cells.cells[0].ch, '\u{28FF}');
        assert_eq!(cells.cells[0].fg, Color::Rgb { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn hit_test_uses_rendered_position() {
        let f = frame();
        let anchor = Vec2::new(100.0, 50.0);
        assert!(hit_pet(&f, anchor, Vec2::new(105.0, 50.0)));
        assert!(hit_pet(&f, anchor, Vec2::new(116.0, 50.0)));
        assert!(!hit_pet(&f, anchor, Vec2::new(90.0, 50.0)));
        assert!(!hit_pet(&f, anchor, Vec2::new(105.0, 61.0)));
    }

    #[test]
    fn squash_keeps_feet_planted() {
        let mut f = frame();
        f.transform.scale_y = 0.9;
        let c = body_center(&f, Vec2::ZERO);
        let feet = c.y + BODY_RY * 0.9;
        assert!((feet - BODY_RY).abs() < 1e-5);
    }

    #[test]
    fn drawing_stays_on_canvas() {
        let mut canvas = PixelCanvas::new(20, 20);
        draw_pet(&mut canvas, &frame(), Vec2::new(-5.0, -5.0));
        assert!(canvas.px.iter().any(|p| p.a > 0));
    }

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.5, 4), "[██  ]");
        assert_eq!(bar(2.0, 2), "[██]");
    }
}
