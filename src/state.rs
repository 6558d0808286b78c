//! Last-known state of the controller board.
//!
//! Inputs change only through [`InstrumentState::apply`], which takes a whole
//! [`Update`] at a time. Outputs follow the commands that were written to the
//! device, not any display widget.

use crate::command::{Command, LED_COUNT, PWM_CHANNELS, RELAY_COUNT};
use crate::dispatch::Update;

/// Nominal full scale of the analog inputs, in millivolts.
pub const ANALOG_FULL_SCALE_MV: u32 = 3300;

/// Default PWM frequency before any `PWMn:FREQ` command.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 5000;

/// Both analog channels, always updated together.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalogReading {
    pub ch1_mv: u32,
    pub ch2_mv: u32,
}

/// The four named digital inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigitalInput {
    Button1,
    Button2,
    Sensor1,
    Sensor2,
}

impl DigitalInput {
    pub const ALL: [DigitalInput; 4] = [
        DigitalInput::Button1,
        DigitalInput::Button2,
        DigitalInput::Sensor1,
        DigitalInput::Sensor2,
    ];

    /// Key used on the wire.
    pub fn short_key(self) -> &'static str {
        match self {
            DigitalInput::Button1 => "B1",
            DigitalInput::Button2 => "B2",
            DigitalInput::Sensor1 => "S1",
            DigitalInput::Sensor2 => "S2",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            DigitalInput::Button1 => "Button 1",
            DigitalInput::Button2 => "Button 2",
            DigitalInput::Sensor1 => "Sensor 1",
            DigitalInput::Sensor2 => "Sensor 2",
        }
    }

    pub fn from_short_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|input| input.short_key() == key)
    }

    fn index(self) -> usize {
        match self {
            DigitalInput::Button1 => 0,
            DigitalInput::Button2 => 1,
            DigitalInput::Sensor1 => 2,
            DigitalInput::Sensor2 => 3,
        }
    }
}

/// Level text shown next to a digital input.
pub fn level_text(high: bool) -> &'static str {
    if high {
        "HIGH"
    } else {
        "LOW"
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DigitalInputs {
    levels: [bool; 4],
}

impl DigitalInputs {
    pub fn get(&self, input: DigitalInput) -> bool {
        self.levels[input.index()]
    }

    pub fn set(&mut self, input: DigitalInput, high: bool) {
        self.levels[input.index()] = high;
    }

    pub fn iter(&self) -> impl Iterator<Item = (DigitalInput, bool)> + '_ {
        DigitalInput::ALL.into_iter().map(|input| (input, self.get(input)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmChannel {
    pub duty_percent: u8,
    pub frequency_hz: u32,
}

impl Default for PwmChannel {
    fn default() -> Self {
        Self {
            duty_percent: 0,
            frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
        }
    }
}

/// Outputs as last commanded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputState {
    pub leds: [bool; LED_COUNT as usize],
    pub relays: [bool; RELAY_COUNT as usize],
    pub pwm: [PwmChannel; PWM_CHANNELS as usize],
}

impl OutputState {
    /// Records the effect of a command that was written successfully.
    ///
    /// Returns true when the command changed an output.
    pub fn record(&mut self, command: &Command) -> bool {
        match *command {
            Command::Led { index, on } => self.leds[usize::from(index - 1)] = on,
            Command::Relay { index, on } => self.relays[usize::from(index - 1)] = on,
            Command::PwmDuty { channel, percent } => {
                self.pwm[usize::from(channel - 1)].duty_percent = percent
            }
            Command::PwmFrequency { channel, hz } => {
                self.pwm[usize::from(channel - 1)].frequency_hz = hz
            }
            // *RST returns the board to power-on outputs.
            Command::Reset => *self = OutputState::default(),
            _ => return false,
        }
        true
    }
}

/// Snapshot of everything the console knows about the board.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstrumentState {
    pub analog: AnalogReading,
    pub digital: DigitalInputs,
    pub interrupt_count: u64,
    pub outputs: OutputState,
}

impl InstrumentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one classified update.
    pub fn apply(&mut self, update: &Update) {
        match update {
            Update::Analog(reading) => self.analog = *reading,
            Update::Digital(levels) => {
                for &(input, high) in levels {
                    self.digital.set(input, high);
                }
            }
            Update::InterruptCount(count) => self.interrupt_count = *count,
        }
    }
}
