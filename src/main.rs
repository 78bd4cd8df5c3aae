//! Capsuletui: falling-capsule virus puzzle in the terminal.

mod app;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use capsuletui::{EngineConfig, GameConfig, Speed};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let config = args.game_config();
    let tick_rate = args.validated_tick_rate()?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    log::info!(
        "starting at level {} ({:?}), seed {}",
        config.level,
        config.speed,
        config.seed
    );
    let mut app = App::new(args, config, tick_rate, theme);
    app.run()?;
    Ok(())
}

/// stderr belongs to the terminal UI, so records only go to a file.
fn init_logging(path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tick rate must be a positive number of ticks per second, got {0}")]
    TickRate(f64),
}

/// Falling-capsule virus puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "capsuletui",
    version,
    about = "Falling-capsule virus puzzle in the terminal. Line up four of a colour to clear viruses.",
    long_about = "Capsuletui is a terminal puzzle game in the style of the classic vitamin-capsule puzzlers.\n\n\
        Steer two-coloured capsules into the bottle. Four or more of one colour in a row or \
        column clear; whatever is left unsupported falls and can chain into more clears. \
        Clear every virus to finish the level.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up / X     Rotate right   Z      Rotate left\n  Down        Soft drop   Enter/Space Force drop   P   Pause   Q / Esc   Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k          Rotate right   u      Rotate left\n  j           Soft drop   Space      Force drop"
)]
pub struct Args {
    /// Starting virus level (0-20; higher values are clamped).
    #[arg(short, long, default_value = "0", value_name = "N")]
    pub level: u32,

    /// Capsule fall speed.
    #[arg(short, long, default_value = "low")]
    pub speed: Speed,

    /// RNG seed for viruses and capsules. Random if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u32>,

    /// Game logic ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Ticks matched cells stay on screen before they vanish.
    #[arg(long, value_name = "TICKS")]
    pub clear_delay_ticks: Option<u32>,

    /// Ticks between gravity steps while the bottle settles.
    #[arg(long, value_name = "TICKS")]
    pub settle_ticks: Option<u32>,

    /// Run length that clears (minimum 2).
    #[arg(long, default_value = "4", value_name = "N")]
    pub match_length: usize,

    /// Skip main menu and start game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Disable the fade on matched cells.
    #[arg(long)]
    pub no_animation: bool,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Write log records to this file (filter with RUST_LOG).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn game_config(&self) -> GameConfig {
        let defaults = EngineConfig::default();
        GameConfig {
            level: capsuletui::level::clamp_level(self.level),
            speed: self.speed,
            seed: self.seed.unwrap_or_else(clock_seed),
            engine: EngineConfig {
                match_length: self.match_length.max(2),
                clear_delay_ticks: self.clear_delay_ticks.unwrap_or(defaults.clear_delay_ticks),
                settle_ticks: self.settle_ticks.unwrap_or(defaults.settle_ticks),
            },
        }
    }

    pub fn validated_tick_rate(&self) -> Result<f64, ConfigError> {
        if self.tick_rate.is_finite() && self.tick_rate > 0.0 {
            Ok(self.tick_rate)
        } else {
            Err(ConfigError::TickRate(self.tick_rate))
        }
    }
}

fn clock_seed() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped_not_rejected() {
        let args = Args::parse_from(["capsuletui", "--level", "99", "--seed", "5"]);
        let config = args.game_config();
        assert_eq!(config.level, 20);
        assert_eq!(config.seed, 5);
    }

    #[test]
    fn engine_flags_fold_into_config() {
        let args = Args::parse_from([
            "capsuletui",
            "--clear-delay-ticks",
            "7",
            "--match-length",
            "1",
            "--speed",
            "hi",
        ]);
        let config = args.game_config();
        assert_eq!(config.engine.clear_delay_ticks, 7);
        assert_eq!(config.engine.settle_ticks, EngineConfig::default().settle_ticks);
        assert_eq!(config.engine.match_length, 2);
        assert_eq!(config.speed, Speed::Hi);
    }

    #[test]
    fn bad_tick_rate_is_an_error() {
        let args = Args::parse_from(["capsuletui", "--tick-rate", "0"]);
        assert!(matches!(
            args.validated_tick_rate(),
            Err(ConfigError::TickRate(_))
        ));
    }
}
