//! Timed LED sequences.
//!
//! A pattern is a list of LED commands, each with an offset from the moment the
//! pattern started. The console plays them from its tick, so nothing here sleeps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::command::{Command, LED_COUNT};

const BLINK_CYCLES: u32 = 3;
const BLINK_PERIOD: Duration = Duration::from_millis(1000);
const BLINK_ON_TIME: Duration = Duration::from_millis(500);
const WAVE_STEP: Duration = Duration::from_millis(200);
const WAVE_ON_TIME: Duration = Duration::from_millis(500);
const CHASE_STEP: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    /// All LEDs on and off together.
    Blink,
    /// Each LED lights in turn, staggered, then goes off in the same order.
    Wave,
    /// One LED at a time, moving from LED 1 to LED 3.
    Chase,
}

impl LedPattern {
    pub const ALL: [LedPattern; 3] = [LedPattern::Blink, LedPattern::Wave, LedPattern::Chase];

    pub fn name(self) -> &'static str {
        match self {
            LedPattern::Blink => "Blink All",
            LedPattern::Wave => "Wave",
            LedPattern::Chase => "Chase",
        }
    }

    /// Commands with their offsets from the start, ordered by offset.
    pub fn steps(self) -> Vec<(Duration, Command)> {
        let mut steps = Vec::new();
        match self {
            LedPattern::Blink => {
                for cycle in 0..BLINK_CYCLES {
                    let at = BLINK_PERIOD * cycle;
                    steps.extend(Command::all_leds(true).into_iter().map(|c| (at, c)));
                    let off = at + BLINK_ON_TIME;
                    steps.extend(Command::all_leds(false).into_iter().map(|c| (off, c)));
                }
            }
            LedPattern::Wave => {
                for index in 1..=LED_COUNT {
                    let at = WAVE_STEP * u32::from(index - 1);
                    steps.push((at, Command::Led { index, on: true }));
                    steps.push((at + WAVE_ON_TIME, Command::Led { index, on: false }));
                }
            }
            LedPattern::Chase => {
                for lit in 1..=LED_COUNT {
                    let at = CHASE_STEP * u32::from(lit - 1);
                    for index in 1..=LED_COUNT {
                        steps.push((at, Command::Led { index, on: index == lit }));
                    }
                }
            }
        }
        // Stable, so commands sharing an offset keep their order.
        steps.sort_by_key(|(at, _)| *at);
        steps
    }
}

/// A pattern in progress.
#[derive(Debug, Clone)]
pub struct PatternPlayer {
    pattern: LedPattern,
    started: Instant,
    pending: VecDeque<(Duration, Command)>,
}

impl PatternPlayer {
    pub fn new(pattern: LedPattern, now: Instant) -> Self {
        Self {
            pattern,
            started: now,
            pending: pattern.steps().into(),
        }
    }

    pub fn pattern(&self) -> LedPattern {
        self.pattern
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns every step whose time has come.
    pub fn due(&mut self, now: Instant) -> Vec<Command> {
        let elapsed = now.saturating_duration_since(self.started);
        let mut commands = Vec::new();
        while let Some((at, _)) = self.pending.front() {
            if *at > elapsed {
                break;
            }
            if let Some((_, command)) = self.pending.pop_front() {
                commands.push(command);
            }
        }
        commands
    }
}
