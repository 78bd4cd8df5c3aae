//! App: terminal init, main loop, fixed-rate ticking and key handling.

use crate::input::{key_to_action, Action};
use crate::theme::Theme;
use crate::Args;
use anyhow::Result;
use capsuletui::level::MAX_LEVEL;
use capsuletui::{GameConfig, GameEvent, GameState, Speed};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 60;
/// Most ticks simulated per frame after a stall.
const MAX_CATCH_UP_TICKS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    LevelClear,
    GameOver,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTab {
    Level,
    Speed,
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub current_tab: MenuTab,
    pub selected_level: u32,
    pub selected_speed: Speed,
}

impl MenuState {
    fn new(config: &GameConfig) -> Self {
        Self {
            current_tab: MenuTab::Level,
            selected_level: config.level,
            selected_speed: config.speed,
        }
    }

    fn next_tab(&mut self) {
        self.current_tab = match self.current_tab {
            MenuTab::Level => MenuTab::Speed,
            MenuTab::Speed => MenuTab::Start,
            MenuTab::Start => MenuTab::Level,
        };
    }

    fn prev_tab(&mut self) {
        self.current_tab = match self.current_tab {
            MenuTab::Level => MenuTab::Start,
            MenuTab::Speed => MenuTab::Level,
            MenuTab::Start => MenuTab::Speed,
        };
    }

    /// Change the value under the cursor by one step.
    fn adjust(&mut self, forward: bool) {
        match self.current_tab {
            MenuTab::Level => {
                self.selected_level = if forward {
                    (self.selected_level + 1).min(MAX_LEVEL)
                } else {
                    self.selected_level.saturating_sub(1)
                };
            }
            MenuTab::Speed => {
                self.selected_speed = match (self.selected_speed, forward) {
                    (Speed::Low, true) | (Speed::Hi, false) => Speed::Med,
                    (Speed::Med, true) | (Speed::Low, false) => Speed::Hi,
                    (Speed::Hi, true) | (Speed::Med, false) => Speed::Low,
                };
            }
            MenuTab::Start => {}
        }
    }
}

/// Fade over matched cells, alive while the engine holds them.
#[derive(Default)]
pub struct ClearFx {
    pub effect: Option<Effect>,
    pub last_process: Option<Instant>,
}

impl ClearFx {
    fn reset(&mut self) {
        self.effect = None;
        self.last_process = None;
    }
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    state: GameState,
    screen: Screen,
    paused: bool,
    tick_interval: Duration,
    last_tick: Instant,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    clear_fx: ClearFx,
    menu_state: MenuState,
    quit_selected: QuitOption,
}

impl App {
    pub fn new(args: Args, config: GameConfig, tick_rate: f64, theme: Theme) -> Self {
        let state = GameState::new(config);
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        Self {
            menu_state: MenuState::new(&config),
            args,
            config,
            theme,
            state,
            screen,
            paused: false,
            tick_interval: Duration::from_secs_f64(1.0 / tick_rate),
            last_tick: Instant::now(),
            repeat_state: None,
            last_repeat_fire: None,
            clear_fx: ClearFx::default(),
            quit_selected: QuitOption::Resume,
        }
    }

    /// Fresh session from the menu selection. A fixed `--seed` replays the same game.
    fn start_game(&mut self) {
        self.config.level = self.menu_state.selected_level;
        self.config.speed = self.menu_state.selected_speed;
        if self.args.seed.is_none() {
            self.config.seed = crate::clock_seed();
        }
        let top = self.state.top_score();
        self.state = GameState::new(self.config);
        self.state.carry_top_score(top);
        self.enter_play();
    }

    fn enter_play(&mut self) {
        self.screen = Screen::Playing;
        self.paused = false;
        self.last_tick = Instant::now();
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.clear_fx.reset();
    }

    fn apply_action(&mut self, action: Action) {
        if let Some(intent) = action.intent() {
            self.state.press(intent);
        }
        if action == Action::HardDrop {
            self.repeat_state = None;
        }
    }

    fn tick_repeat(&mut self, now: Instant) {
        let Some((action, first)) = self.repeat_state else {
            return;
        };
        if now.duration_since(first) < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next = self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    /// Run due ticks and react to what the session reports.
    fn advance(&mut self, now: Instant) {
        let mut ticks = 0;
        while now.duration_since(self.last_tick) >= self.tick_interval {
            self.last_tick += self.tick_interval;
            ticks += 1;
            if ticks > MAX_CATCH_UP_TICKS {
                self.last_tick = now;
                break;
            }
            self.state.tick();
        }

        let events: Vec<GameEvent> = self.state.drain_events().collect();
        for event in events {
            match event {
                GameEvent::MatchMade {
                    viruses, cascade, ..
                } => {
                    log::debug!("match: {} viruses, cascade {}", viruses, cascade);
                }
                GameEvent::DropComplete => {
                    // Don't carry a held direction into the next capsule's first frame.
                    self.last_repeat_fire = None;
                }
                GameEvent::BottleEmpty => {
                    self.screen = Screen::LevelClear;
                    self.repeat_state = None;
                }
                GameEvent::GameOver => {
                    self.screen = Screen::GameOver;
                    self.repeat_state = None;
                }
            }
        }

        if !matches!(self.state.engine().phase(), capsuletui::Phase::Clearing { .. }) {
            self.clear_fx.reset();
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held keys stop repeating; not every terminal supports them.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        self.last_tick = Instant::now();
        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_millis(16);
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    crate::ui::View {
                        screen: self.screen,
                        state: &self.state,
                        theme: &self.theme,
                        paused: self.paused,
                        menu: &self.menu_state,
                        quit_selected: (self.screen == Screen::QuitMenu).then_some(self.quit_selected),
                        no_animation: self.args.no_animation,
                        now,
                    },
                    &mut self.clear_fx,
                )
            })?;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    let action = key_to_action(key);
                    if key.kind != KeyEventKind::Press {
                        if key.kind == KeyEventKind::Release
                            && self.repeat_state.map(|(a, _)| a) == Some(action)
                        {
                            self.repeat_state = None;
                            self.last_repeat_fire = None;
                        }
                        continue;
                    }
                    // OS key repeat while we already auto-repeat this action.
                    if self.repeat_state.map(|(a, _)| a) == Some(action) {
                        continue;
                    }
                    if self.handle_key(action, key.code) {
                        return Ok(());
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                let now = Instant::now();
                self.tick_repeat(now);
                self.advance(now);
            } else {
                // Frozen time doesn't count toward the next tick.
                self.last_tick = Instant::now();
            }
        }
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, action: Action, code: KeyCode) -> bool {
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return true,
                Action::MoveLeft => self.menu_state.adjust(false),
                Action::MoveRight => self.menu_state.adjust(true),
                Action::SoftDrop => self.menu_state.next_tab(),
                Action::RotateRight | Action::RotateLeft => self.menu_state.prev_tab(),
                Action::HardDrop => {
                    if self.menu_state.current_tab == MenuTab::Start {
                        self.start_game();
                    } else {
                        self.menu_state.current_tab = MenuTab::Start;
                    }
                }
                _ => {}
            },
            Screen::Playing => {
                if self.paused {
                    match action {
                        Action::Pause => self.paused = false,
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                        }
                        _ => {}
                    }
                } else {
                    match action {
                        Action::Pause => self.paused = true,
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                            self.repeat_state = None;
                        }
                        _ => {
                            self.apply_action(action);
                            if action.repeats() && self.state.has_control() {
                                self.repeat_state = Some((action, Instant::now()));
                                self.last_repeat_fire = None;
                            }
                        }
                    }
                }
            }
            Screen::QuitMenu => match action {
                Action::SoftDrop | Action::MoveRight => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::MainMenu,
                        QuitOption::MainMenu => QuitOption::Exit,
                        QuitOption::Exit => QuitOption::Resume,
                    };
                }
                Action::RotateRight | Action::RotateLeft | Action::MoveLeft => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::Exit,
                        QuitOption::MainMenu => QuitOption::Resume,
                        QuitOption::Exit => QuitOption::MainMenu,
                    };
                }
                Action::HardDrop => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::MainMenu => {
                        self.menu_state = MenuState::new(&self.config);
                        self.screen = Screen::Menu;
                    }
                    QuitOption::Exit => return true,
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
            Screen::LevelClear => match action {
                Action::Quit => return true,
                Action::HardDrop => {
                    self.state.next_level();
                    self.enter_play();
                }
                _ => {}
            },
            Screen::GameOver => {
                if action == Action::Quit {
                    return true;
                }
                if matches!(code, KeyCode::Char('r') | KeyCode::Char('R')) {
                    self.state.restart();
                    self.enter_play();
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_level_is_bounded() {
        let mut menu = MenuState::new(&GameConfig::default());
        menu.adjust(false);
        assert_eq!(menu.selected_level, 0);
        for _ in 0..30 {
            menu.adjust(true);
        }
        assert_eq!(menu.selected_level, MAX_LEVEL);
    }

    #[test]
    fn menu_speed_cycles_both_ways() {
        let mut menu = MenuState::new(&GameConfig::default());
        menu.next_tab();
        assert_eq!(menu.current_tab, MenuTab::Speed);
        menu.adjust(true);
        assert_eq!(menu.selected_speed, Speed::Med);
        menu.adjust(false);
        assert_eq!(menu.selected_speed, Speed::Low);
        menu.adjust(false);
        assert_eq!(menu.selected_speed, Speed::Hi);
        menu.prev_tab();
        menu.prev_tab();
        assert_eq!(menu.current_tab, MenuTab::Start);
    }
}
