//! Layout and drawing: menu, bottle, sidebar, popups and overlays.

use crate::app::{ClearFx, MenuState, MenuTab, QuitOption, Screen};
use crate::theme::Theme;
use capsuletui::{
    Capsule, GameState, Phase, Segment, SegmentKind, Speed, Stage, BOTTLE_HEIGHT, BOTTLE_WIDTH,
};
use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{CellFilter, Duration as TfxDuration, EffectRenderer, Interpolation, fx, ref_count};

/// Terminal columns per bottle cell.
const CELL_W: u16 = 2;
/// Rows drawn above the bottle for capsules still in the neck.
const NECK_ROWS: u16 = 1;
/// Bottle block size including its border.
const BOTTLE_BLOCK_W: u16 = BOTTLE_WIDTH as u16 * CELL_W + 2;
const BOTTLE_BLOCK_H: u16 = BOTTLE_HEIGHT as u16 + NECK_ROWS + 2;
const SIDEBAR_WIDTH: u16 = 22;
const SIDEBAR_GAP: u16 = 2;
const MATCH_FADE_MS: u32 = 300;

const VIRUS_GLYPHS: [&str; 3] = ["▚▞", "▞▚", "◣◢"];

/// Everything a frame needs from the app.
pub struct View<'a> {
    pub screen: Screen,
    pub state: &'a GameState,
    pub theme: &'a Theme,
    pub paused: bool,
    pub menu: &'a MenuState,
    pub quit_selected: Option<QuitOption>,
    pub no_animation: bool,
    pub now: Instant,
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn centered(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

/// Fill a rect with the theme background so overlays hide what's under them.
fn clear_rect(frame: &mut Frame, rect: Rect, theme: &Theme) {
    let style = Style::default().bg(theme.bg);
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            frame.buffer_mut()[(x, y)].set_style(style);
        }
    }
}

fn glyph(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Empty => "  ",
        SegmentKind::Virus(v) => VIRUS_GLYPHS[v as usize % VIRUS_GLYPHS.len()],
        SegmentKind::Single => "◖◗",
        SegmentKind::LeftHalf => "◖█",
        SegmentKind::RightHalf => "█◗",
        SegmentKind::TopHalf => "▗▖",
        SegmentKind::BottomHalf => "▝▘",
        SegmentKind::Matched => "░░",
    }
}

fn segment_style(segment: Segment, theme: &Theme) -> Style {
    let base = Style::default().bg(theme.bg);
    match segment.kind {
        SegmentKind::Empty => base,
        SegmentKind::Virus(_) => base
            .fg(theme.pill_color(segment.colour))
            .add_modifier(Modifier::BOLD),
        SegmentKind::TopHalf | SegmentKind::BottomHalf => {
            // Block-quadrant glyphs read better with the colour as background.
            let c = theme.pill_color(segment.colour);
            Style::default().fg(theme.bg).bg(c)
        }
        _ => base.fg(theme.pill_color(segment.colour)),
    }
}

pub fn draw(frame: &mut Frame, view: View<'_>, clear_fx: &mut ClearFx) {
    let area = frame.area();
    clear_rect(frame, area, view.theme);

    let need_w = BOTTLE_BLOCK_W + SIDEBAR_GAP + SIDEBAR_WIDTH;
    if area.width < need_w || area.height < BOTTLE_BLOCK_H {
        let msg = format!("Terminal too small: need {}x{}", need_w, BOTTLE_BLOCK_H);
        Paragraph::new(msg)
            .style(Style::default().fg(view.theme.main_fg))
            .alignment(Alignment::Center)
            .render(centered(area, area.width, 1), frame.buffer_mut());
        return;
    }

    if view.screen == Screen::Menu {
        draw_menu(frame, view.theme, view.menu, area);
        return;
    }

    let outer = centered(area, need_w, BOTTLE_BLOCK_H);
    let bottle_rect = Rect {
        width: BOTTLE_BLOCK_W,
        ..outer
    };
    let sidebar_rect = Rect {
        x: outer.x + BOTTLE_BLOCK_W + SIDEBAR_GAP,
        width: SIDEBAR_WIDTH,
        ..outer
    };

    draw_bottle(frame, view.state, view.theme, bottle_rect);
    if matches!(view.state.engine().phase(), Phase::Clearing { .. }) && !view.no_animation {
        apply_match_effect(frame, view.state, view.theme, bottle_rect, clear_fx, view.now);
    }
    draw_popups(frame, view.state, view.theme, bottle_rect);
    draw_sidebar(frame, view.state, view.theme, sidebar_rect);

    match view.screen {
        Screen::LevelClear => draw_level_clear(frame, view.state, view.theme, area),
        Screen::GameOver => draw_game_over(frame, view.state, view.theme, area),
        Screen::QuitMenu => {
            if let Some(selected) = view.quit_selected {
                draw_quit_menu(frame, view.theme, selected);
            }
        }
        _ if view.paused => draw_pause_overlay(frame, view.theme, area),
        _ => {}
    }
}

/// Grid area inside the border; row 0 is the neck row.
fn bottle_inner(bottle_rect: Rect) -> Rect {
    Rect {
        x: bottle_rect.x + 1,
        y: bottle_rect.y + 1,
        width: bottle_rect.width.saturating_sub(2),
        height: bottle_rect.height.saturating_sub(2),
    }
}

/// Screen position of bottle cell (x, y); y may be negative for the neck.
fn cell_origin(inner: Rect, x: i32, y: i32) -> Option<(u16, u16)> {
    let row = y + NECK_ROWS as i32;
    if x < 0 || row < 0 || x >= BOTTLE_WIDTH as i32 || row >= inner.height as i32 {
        return None;
    }
    Some((inner.x + x as u16 * CELL_W, inner.y + row as u16))
}

fn draw_bottle(frame: &mut Frame, state: &GameState, theme: &Theme, rect: Rect) {
    let title = format!(" Lv {:02}  Viruses {:02} ", state.level(), state.virus_count());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, bold().fg(theme.title)));
    block.render(rect, frame.buffer_mut());
    let inner = bottle_inner(rect);

    // Neck: only the spawn columns are open.
    let neck_style = Style::default().fg(theme.div_line).bg(theme.bg);
    for x in 0..BOTTLE_WIDTH as i32 {
        if let Some((sx, sy)) = cell_origin(inner, x, -1) {
            let open = x == capsuletui::capsule::SPAWN_X || x == capsuletui::capsule::SPAWN_X + 1;
            let s = if open { "  " } else { "▒▒" };
            frame.buffer_mut().set_string(sx, sy, s, neck_style);
        }
    }

    let bottle = state.bottle();
    for (y, row) in bottle.rows().enumerate() {
        for (x, segment) in row.iter().enumerate() {
            if let Some((sx, sy)) = cell_origin(inner, x as i32, y as i32) {
                frame
                    .buffer_mut()
                    .set_string(sx, sy, glyph(segment.kind), segment_style(*segment, theme));
            }
        }
    }

    if let Some(capsule) = state.capsule() {
        draw_capsule(frame, capsule, theme, inner);
    }
}

fn draw_capsule(frame: &mut Frame, capsule: &Capsule, theme: &Theme, inner: Rect) {
    for (((x, y), _), segment) in capsule.cells().into_iter().zip(capsule.segments()) {
        if let Some((sx, sy)) = cell_origin(inner, x, y) {
            frame
                .buffer_mut()
                .set_string(sx, sy, glyph(segment.kind), segment_style(segment, theme));
        }
    }
}

/// Create or advance the fade over matched cells.
fn apply_match_effect(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    bottle_rect: Rect,
    clear_fx: &mut ClearFx,
    now: Instant,
) {
    let inner = bottle_inner(bottle_rect);
    let delta = clear_fx
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    clear_fx.last_process = Some(now);

    if clear_fx.effect.is_none() {
        let mut cells: HashSet<(u16, u16)> = HashSet::new();
        for &(x, y) in state.engine().matched() {
            if let Some((sx, sy)) = cell_origin(inner, x, y) {
                for dx in 0..CELL_W {
                    cells.insert((sx + dx, sy));
                }
            }
        }
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            cells.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_to(theme.bg, theme.bg, (MATCH_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(inner);
        clear_fx.effect = Some(effect);
    }

    if let Some(effect) = clear_fx.effect.as_mut() {
        frame.render_effect(effect, inner, TfxDuration::from_millis(delta_ms));
    }
}

/// Points float up from where the match happened.
fn draw_popups(frame: &mut Frame, state: &GameState, theme: &Theme, bottle_rect: Rect) {
    let inner = bottle_inner(bottle_rect);
    for popup in state.popups() {
        let x = popup.x.round() as i32;
        let y = popup.y.round() as i32;
        let Some((sx, sy)) = cell_origin(inner, x, y) else {
            continue;
        };
        let text = if popup.cascade > 0 {
            format!("{} x{}", popup.amount, popup.cascade + 1)
        } else {
            popup.amount.to_string()
        };
        let max_x = inner.x + inner.width;
        let sx = sx.min(max_x.saturating_sub(text.chars().count() as u16));
        frame
            .buffer_mut()
            .set_string(sx, sy, text, bold().fg(theme.title).bg(theme.bg));
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let block_style = Style::default().fg(theme.div_line).bg(theme.bg);
    let title_style = bold().fg(theme.title);
    let text_style = Style::default().fg(theme.main_fg);

    // --- Next ---
    let next_rect = Rect { height: 4, ..area };
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(block_style)
        .title(Span::styled(" Next ", title_style));
    let next_inner = next_block.inner(next_rect);
    next_block.render(next_rect, frame.buffer_mut());
    let next = state.next_capsule();
    let px = next_inner.x + next_inner.width.saturating_sub(2 * CELL_W) / 2;
    for (i, segment) in next.segments().into_iter().enumerate() {
        frame.buffer_mut().set_string(
            px + i as u16 * CELL_W,
            next_inner.y + next_inner.height.saturating_sub(1) / 2,
            glyph(segment.kind),
            segment_style(segment, theme),
        );
    }

    // --- Stats ---
    let stats_rect = Rect {
        y: area.y + next_rect.height,
        height: 8,
        ..area
    };
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(block_style)
        .title(Span::styled(" Stats ", title_style));
    let stats_inner = stats_block.inner(stats_rect);
    stats_block.render(stats_rect, frame.buffer_mut());
    let row = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, text_style),
        ])
    };
    let lines = vec![
        row("Top:     ", format!("{:07}", state.top_score())),
        row("Score:   ", format!("{:07}", state.score())),
        row("Level:   ", state.level().to_string()),
        row("Speed:   ", state.speed().label().to_string()),
        row("Viruses: ", state.virus_count().to_string()),
        row("Cascade: ", match state.engine().phase() {
            Phase::Idle => "-".to_string(),
            _ => (state.engine().cascade() + 1).to_string(),
        }),
    ];
    Paragraph::new(lines).render(stats_inner, frame.buffer_mut());

    // --- Progress: share of the level's viruses cleared ---
    let progress_rect = Rect {
        y: stats_rect.y + stats_rect.height,
        height: 3,
        ..area
    };
    let progress_block = Block::default()
        .borders(Borders::ALL)
        .border_style(block_style)
        .title(Span::styled(" Cleared ", title_style));
    let quota = state.virus_quota().max(1);
    let ratio = if state.stage() == Stage::Generating {
        0.0
    } else {
        1.0 - (state.virus_count().min(quota) as f64 / quota as f64)
    };
    Gauge::default()
        .block(progress_block)
        .gauge_style(Style::default().fg(theme.pill[1]).bg(theme.bg))
        .ratio(ratio)
        .render(progress_rect, frame.buffer_mut());

    // --- Controls ---
    let hint_rect = Rect {
        y: progress_rect.y + progress_rect.height,
        height: area.height.saturating_sub(next_rect.height + stats_rect.height + progress_rect.height),
        ..area
    };
    let hint = Style::default().fg(theme.inactive_fg);
    Paragraph::new(vec![
        Line::from(Span::styled("←→ move  ↓ drop", hint)),
        Line::from(Span::styled("↑/x z rotate", hint)),
        Line::from(Span::styled("space force  p pause", hint)),
    ])
    .render(hint_rect, frame.buffer_mut());
}

fn draw_menu(frame: &mut Frame, theme: &Theme, menu: &MenuState, area: Rect) {
    let popup = centered(area, 40, 14);
    clear_rect(frame, popup, theme);

    let highlight = bold().fg(theme.bg).bg(theme.title);
    let selected = bold().fg(theme.title);
    let normal = Style::default().fg(theme.main_fg);
    let hint = Style::default().fg(theme.inactive_fg);
    let style_for = |tab: MenuTab| {
        if menu.current_tab == tab {
            highlight
        } else {
            normal
        }
    };

    let speeds = [Speed::Low, Speed::Med, Speed::Hi];
    let mut speed_spans = vec![Span::styled(" Speed  ", style_for(MenuTab::Speed))];
    for speed in speeds {
        let style = if speed == menu.selected_speed {
            selected
        } else {
            normal
        };
        speed_spans.push(Span::styled(format!(" {} ", speed.label()), style));
    }

    let title = Line::from(vec![
        Span::styled(" Capsule", bold().fg(theme.pill[1])),
        Span::styled("tui ", bold().fg(theme.pill[2])),
    ]);

    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        Line::from(vec![
            Span::styled(" Level  ", style_for(MenuTab::Level)),
            Span::styled(format!(" ◀ {:02} ▶ ", menu.selected_level), selected),
        ]),
        Line::from(""),
        Line::from(speed_spans),
        Line::from(""),
        Line::from(Span::styled("  Start  ", style_for(MenuTab::Start))),
        Line::from(""),
        Line::from(Span::styled("↑↓ select  ←→ change", hint)),
        Line::from(Span::styled("Enter start  Q quit", hint)),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_message(frame: &mut Frame, theme: &Theme, area: Rect, lines: Vec<Line<'_>>) {
    let popup = centered(area, 30, lines.len() as u16 + 2);
    clear_rect(frame, popup, theme);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    draw_message(
        frame,
        theme,
        area,
        vec![
            Line::from(""),
            Line::from(Span::styled(
                " Paused ",
                Style::default().fg(Color::Black).bg(theme.title),
            )),
            Line::from(""),
            Line::from(Span::styled(
                " P resume    Q quit ",
                Style::default().fg(theme.main_fg),
            )),
        ],
    );
}

fn draw_level_clear(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    draw_message(
        frame,
        theme,
        area,
        vec![
            Line::from(""),
            Line::from(Span::styled(
                format!(" Level {} clear! ", state.level()),
                bold().fg(Color::Black).bg(theme.pill[2]),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("Score {}", state.score()),
                Style::default().fg(theme.main_fg),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Enter next level  Q quit",
                Style::default().fg(theme.inactive_fg),
            )),
        ],
    );
}

fn draw_game_over(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let top = if state.score() > 0 && state.score() >= state.top_score() {
        Span::styled("New top score!", bold().fg(theme.title))
    } else {
        Span::styled(
            format!("Top {}", state.top_score()),
            Style::default().fg(theme.main_fg),
        )
    };
    draw_message(
        frame,
        theme,
        area,
        vec![
            Line::from(""),
            Line::from(Span::styled(
                " Game over ",
                bold().fg(Color::Black).bg(theme.pill[1]),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("Score {}", state.score()),
                Style::default().fg(theme.main_fg),
            )),
            Line::from(top),
            Line::from(""),
            Line::from(Span::styled(
                "R retry  Q quit",
                Style::default().fg(theme.inactive_fg),
            )),
        ],
    );
}

fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let quit_rect = centered(frame.area(), 24, 8);
    clear_rect(frame, quit_rect, theme);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");
    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            bold().fg(theme.bg).bg(theme.title)
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + inner.width.saturating_sub(label.len() as u16) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        frame.buffer_mut().set_string(rx, ry, label, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neck_row_maps_above_bottle() {
        let inner = Rect::new(10, 5, 16, 17);
        assert_eq!(cell_origin(inner, 3, -1), Some((16, 5)));
        assert_eq!(cell_origin(inner, 0, 0), Some((10, 6)));
        assert_eq!(cell_origin(inner, 7, 15), Some((24, 21)));
        assert_eq!(cell_origin(inner, 8, 0), None);
        assert_eq!(cell_origin(inner, 0, -2), None);
    }

    #[test]
    fn every_kind_has_a_two_column_glyph() {
        let kinds = [
            SegmentKind::Empty,
            SegmentKind::Virus(0),
            SegmentKind::Virus(5),
            SegmentKind::Single,
            SegmentKind::LeftHalf,
            SegmentKind::RightHalf,
            SegmentKind::TopHalf,
            SegmentKind::BottomHalf,
            SegmentKind::Matched,
        ];
        for kind in kinds {
            assert_eq!(glyph(kind).chars().count(), CELL_W as usize, "{kind:?}");
        }
    }
}
