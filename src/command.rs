//! Device command vocabulary.
//!
//! Commands are fire-and-forget text lines. The typed form validates channel
//! numbers and ranges before anything reaches the wire; free text that is not
//! part of the vocabulary goes out unchanged as [`Command::Custom`].

use std::fmt;

use crate::error::CommandError;

pub const LED_COUNT: u8 = 3;
pub const RELAY_COUNT: u8 = 4;
pub const PWM_CHANNELS: u8 = 2;

pub const PWM_DUTY_MAX: u8 = 100;
pub const PWM_FREQUENCY_MIN_HZ: u32 = 100;
pub const PWM_FREQUENCY_MAX_HZ: u32 = 20_000;

/// Duty cycles offered as one-step presets for both PWM channels.
pub const PWM_PRESETS: [u8; 5] = [0, 25, 50, 75, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // IEEE 488.2 common commands
    Identify,
    Reset,
    SelfTest,
    ClearStatus,
    EventStatus,
    StatusByte,
    // System
    SystemStatus,
    SystemError,
    // Outputs
    Led { index: u8, on: bool },
    Relay { index: u8, on: bool },
    PwmDuty { channel: u8, percent: u8 },
    PwmFrequency { channel: u8, hz: u32 },
    // Inputs
    DigitalAll,
    AnalogAll,
    InterruptCount,
    InterruptReset,
    MonitorStart,
    MonitorStop,
    /// Anything outside the vocabulary, sent verbatim.
    Custom(String),
}

/// Common commands offered as one-key shortcuts, with their descriptions.
pub const COMMON_COMMANDS: [(Command, &str); 8] = [
    (Command::Identify, "Identification"),
    (Command::Reset, "Reset"),
    (Command::SelfTest, "Self Test"),
    (Command::ClearStatus, "Clear Status"),
    (Command::EventStatus, "Event Status"),
    (Command::StatusByte, "Status Byte"),
    (Command::SystemStatus, "System Status"),
    (Command::SystemError, "System Error"),
];

fn check_channel(kind: &'static str, index: u8, max: u8) -> Result<u8, CommandError> {
    if (1..=max).contains(&index) {
        Ok(index)
    } else {
        Err(CommandError::InvalidChannel { kind, index, max })
    }
}

impl Command {
    pub fn led(index: u8, on: bool) -> Result<Self, CommandError> {
        let index = check_channel("LED", index, LED_COUNT)?;
        Ok(Command::Led { index, on })
    }

    pub fn relay(index: u8, on: bool) -> Result<Self, CommandError> {
        let index = check_channel("Relay", index, RELAY_COUNT)?;
        Ok(Command::Relay { index, on })
    }

    pub fn pwm_duty(channel: u8, percent: u8) -> Result<Self, CommandError> {
        let channel = check_channel("PWM channel", channel, PWM_CHANNELS)?;
        if percent > PWM_DUTY_MAX {
            return Err(CommandError::OutOfRange {
                what: "PWM duty",
                value: u32::from(percent),
                min: 0,
                max: u32::from(PWM_DUTY_MAX),
            });
        }
        Ok(Command::PwmDuty { channel, percent })
    }

    pub fn pwm_frequency(channel: u8, hz: u32) -> Result<Self, CommandError> {
        let channel = check_channel("PWM channel", channel, PWM_CHANNELS)?;
        if !(PWM_FREQUENCY_MIN_HZ..=PWM_FREQUENCY_MAX_HZ).contains(&hz) {
            return Err(CommandError::OutOfRange {
                what: "PWM frequency",
                value: hz,
                min: PWM_FREQUENCY_MIN_HZ,
                max: PWM_FREQUENCY_MAX_HZ,
            });
        }
        Ok(Command::PwmFrequency { channel, hz })
    }

    /// The three LED commands for "all on" / "all off".
    pub fn all_leds(on: bool) -> Vec<Command> {
        (1..=LED_COUNT).map(|index| Command::Led { index, on }).collect()
    }

    /// The same duty cycle on every PWM channel.
    pub fn pwm_preset(percent: u8) -> Result<Vec<Command>, CommandError> {
        (1..=PWM_CHANNELS)
            .map(|channel| Command::pwm_duty(channel, percent))
            .collect()
    }

    /// Parses user-typed text.
    ///
    /// Headers are matched case-insensitively. Text that is not in the vocabulary
    /// becomes `Custom`; a known header with a bad argument is an error.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(CommandError::Empty);
        }
        let upper = text.to_ascii_uppercase();

        let fixed = match upper.as_str() {
            "*IDN?" => Some(Command::Identify),
            "*RST" => Some(Command::Reset),
            "*TST?" => Some(Command::SelfTest),
            "*CLS" => Some(Command::ClearStatus),
            "*ESR?" => Some(Command::EventStatus),
            "*STB?" => Some(Command::StatusByte),
            "SYST:STAT?" => Some(Command::SystemStatus),
            "SYST:ERR?" => Some(Command::SystemError),
            "DIN:ALL?" => Some(Command::DigitalAll),
            "AIN:ALL?" => Some(Command::AnalogAll),
            "INT:COUNT?" => Some(Command::InterruptCount),
            "INT:RESET" => Some(Command::InterruptReset),
            "MON:START" => Some(Command::MonitorStart),
            "MON:STOP" => Some(Command::MonitorStop),
            _ => None,
        };
        if let Some(command) = fixed {
            return Ok(command);
        }

        let (header, argument) = match upper.split_once(char::is_whitespace) {
            Some((header, argument)) => (header, argument.trim()),
            None => (upper.as_str(), ""),
        };

        if let Some(index) = numbered(header, "GPIO:LED", "") {
            return Command::led(index, switch(header, argument)?);
        }
        if let Some(index) = numbered(header, "GPIO:RELAY", "") {
            return Command::relay(index, switch(header, argument)?);
        }
        if let Some(channel) = numbered(header, "PWM", ":DUTY") {
            let percent = number(header, argument)?;
            return match u8::try_from(percent) {
                Ok(percent) => Command::pwm_duty(channel, percent),
                Err(_) => Err(CommandError::OutOfRange {
                    what: "PWM duty",
                    value: percent,
                    min: 0,
                    max: u32::from(PWM_DUTY_MAX),
                }),
            };
        }
        if let Some(channel) = numbered(header, "PWM", ":FREQ") {
            return Command::pwm_frequency(channel, number(header, argument)?);
        }

        Ok(Command::Custom(text.to_string()))
    }
}

/// Matches `{prefix}{n}{suffix}` and returns `n`.
fn numbered(header: &str, prefix: &str, suffix: &str) -> Option<u8> {
    let digits = header.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Out-of-range numbers saturate so the channel check reports them.
    Some(digits.parse().unwrap_or(u8::MAX))
}

fn switch(header: &str, argument: &str) -> Result<bool, CommandError> {
    match argument {
        "ON" | "1" => Ok(true),
        "OFF" | "0" => Ok(false),
        _ => Err(CommandError::InvalidArgument {
            header: header.to_string(),
            argument: argument.to_string(),
        }),
    }
}

fn number(header: &str, argument: &str) -> Result<u32, CommandError> {
    argument.parse().map_err(|_| CommandError::InvalidArgument {
        header: header.to_string(),
        argument: argument.to_string(),
    })
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Identify => f.write_str("*IDN?"),
            Command::Reset => f.write_str("*RST"),
            Command::SelfTest => f.write_str("*TST?"),
            Command::ClearStatus => f.write_str("*CLS"),
            Command::EventStatus => f.write_str("*ESR?"),
            Command::StatusByte => f.write_str("*STB?"),
            Command::SystemStatus => f.write_str("SYST:STAT?"),
            Command::SystemError => f.write_str("SYST:ERR?"),
            Command::Led { index, on } => write!(f, "GPIO:LED{} {}", index, on_off(*on)),
            Command::Relay { index, on } => write!(f, "GPIO:RELAY{} {}", index, on_off(*on)),
            Command::PwmDuty { channel, percent } => write!(f, "PWM{}:DUTY {}", channel, percent),
            Command::PwmFrequency { channel, hz } => write!(f, "PWM{}:FREQ {}", channel, hz),
            Command::DigitalAll => f.write_str("DIN:ALL?"),
            Command::AnalogAll => f.write_str("AIN:ALL?"),
            Command::InterruptCount => f.write_str("INT:COUNT?"),
            Command::InterruptReset => f.write_str("INT:RESET"),
            Command::MonitorStart => f.write_str("MON:START"),
            Command::MonitorStop => f.write_str("MON:STOP"),
            Command::Custom(text) => f.write_str(text),
        }
    }
}
