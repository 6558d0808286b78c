//! # Response Dispatcher
//!
//! Maps one received line to a typed update or a raw event. Classification is
//! structural and first-match-wins:
//!
//! 1. contains `CH1:` and `CH2:`  -> analog update
//! 2. contains `B1:` and `B2:`, or is made only of `B1`/`B2`/`S1`/`S2` segments
//!                                -> digital update for the keys present
//! 3. only ASCII decimal digits   -> interrupt counter update
//! 4. anything else               -> raw
//!
//! A line that matches rule 1 or 2 but fails to parse is reported as raw; the
//! failure never reaches the caller.

use log::debug;

use crate::error::ParseError;
use crate::state::{AnalogReading, DigitalInput};

/// A state change carried by one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Analog(AnalogReading),
    /// Only the inputs named in the line, in the fixed B1, B2, S1, S2 order.
    Digital(Vec<(DigitalInput, bool)>),
    InterruptCount(u64),
}

/// Result of classifying a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Update(Update),
    Raw(String),
}

/// Classifies a single response line. Pure: no state is carried between calls.
pub fn classify(line: &str) -> Dispatch {
    let parsed = if line.contains("CH1:") && line.contains("CH2:") {
        parse_analog(line).map(Update::Analog)
    } else if (line.contains("B1:") && line.contains("B2:")) || only_digital_keys(line) {
        parse_digital(line).map(Update::Digital)
    } else if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) {
        parse_value("INT", line).map(Update::InterruptCount)
    } else {
        return Dispatch::Raw(line.to_string());
    };

    match parsed {
        Ok(update) => Dispatch::Update(update),
        Err(e) => {
            debug!("Unparsed response '{}': {}", line, e);
            Dispatch::Raw(line.to_string())
        }
    }
}

/// True for partial digital reports such as `B1:1,S2:0`.
fn only_digital_keys(line: &str) -> bool {
    line.split(',').all(|segment| {
        segment
            .split_once(':')
            .map(|(key, _)| DigitalInput::from_short_key(key.trim()).is_some())
            .unwrap_or(false)
    })
}

/// Splits `K1:V1,K2:V2,...` into trimmed key/value pairs.
fn segments(line: &str) -> Result<Vec<(&str, &str)>, ParseError> {
    line.split(',').map(pair).collect()
}

fn pair(segment: &str) -> Result<(&str, &str), ParseError> {
    let mut parts = segment.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::MalformedSegment(segment.to_string())),
    }
}

fn parse_value<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    key: &str,
    value: &str,
) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|source| ParseError::InvalidValue {
        key: key.to_string(),
        source,
    })
}

/// Only the `CH1` and `CH2` segments are read; other segments are ignored.
fn parse_analog(line: &str) -> Result<AnalogReading, ParseError> {
    let lookup = |wanted: &'static str| -> Result<u32, ParseError> {
        let segment = line
            .split(',')
            .find(|segment| {
                segment
                    .split(':')
                    .next()
                    .map(|key| key.trim() == wanted)
                    .unwrap_or(false)
            })
            .ok_or(ParseError::MissingKey(wanted))?;
        let (key, value) = pair(segment)?;
        parse_value(key, value)
    };
    // Both channels parse before either is returned.
    let ch1_mv = lookup("CH1")?;
    let ch2_mv = lookup("CH2")?;
    Ok(AnalogReading { ch1_mv, ch2_mv })
}

fn parse_digital(line: &str) -> Result<Vec<(DigitalInput, bool)>, ParseError> {
    let mut values = Vec::new();
    for (key, value) in segments(line)? {
        let value: u32 = parse_value(key, value)?;
        values.push((key, value));
    }
    Ok(DigitalInput::ALL
        .iter()
        .filter_map(|input| {
            values
                .iter()
                .rev()
                .find(|(key, _)| *key == input.short_key())
                .map(|&(_, value)| (*input, value != 0))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analog(ch1_mv: u32, ch2_mv: u32) -> Dispatch {
        Dispatch::Update(Update::Analog(AnalogReading { ch1_mv, ch2_mv }))
    }

    fn raw(line: &str) -> Dispatch {
        Dispatch::Raw(line.to_string())
    }

    // --- Analog ---

    #[test]
    fn analog_pair_across_range() {
        for (a, b) in [(0, 0), (1650, 2200), (3300, 0), (17, 3300)] {
            let line = format!("CH1:{},CH2:{}", a, b);
            assert_eq!(classify(&line), analog(a, b));
        }
    }

    #[test]
    fn analog_keys_found_by_name() {
        assert_eq!(classify("CH2:10,CH1:20"), analog(20, 10));
        assert_eq!(classify("CH1: 5 , CH2: 6"), analog(5, 6));
    }

    #[test]
    fn analog_parse_failure_is_raw() {
        assert_eq!(classify("CH1:abc,CH2:10"), raw("CH1:abc,CH2:10"));
        assert_eq!(classify("CH1:,CH2:10"), raw("CH1:,CH2:10"));
        assert_eq!(classify("CH1:10,CH2:"), raw("CH1:10,CH2:"));
        assert_eq!(classify("CH1:-5,CH2:10"), raw("CH1:-5,CH2:10"));
        assert_eq!(classify("CH1:1:2,CH2:3"), raw("CH1:1:2,CH2:3"));
    }

    #[test]
    fn analog_ignores_extra_segments() {
        assert_eq!(classify("CH1:1,CH2:2,junk"), analog(1, 2));
        assert_eq!(classify("CH1:100,CH2:200,TEMP:21:5"), analog(100, 200));
        assert_eq!(classify("CH2:7,CH1:8,"), analog(8, 7));
    }

    #[test]
    fn analog_takes_precedence_over_digital() {
        assert_eq!(classify("CH1:1,CH2:2,B1:1,B2:0"), analog(1, 2));
    }

    // --- Digital ---

    #[test]
    fn digital_full_set() {
        assert_eq!(
            classify("B1:1,B2:0,S1:1,S2:0"),
            Dispatch::Update(Update::Digital(vec![
                (DigitalInput::Button1, true),
                (DigitalInput::Button2, false),
                (DigitalInput::Sensor1, true),
                (DigitalInput::Sensor2, false),
            ]))
        );
    }

    #[test]
    fn digital_subset_and_order() {
        assert_eq!(
            classify("S2:0,B2:1,B1:0"),
            Dispatch::Update(Update::Digital(vec![
                (DigitalInput::Button1, false),
                (DigitalInput::Button2, true),
                (DigitalInput::Sensor2, false),
            ]))
        );
    }

    #[test]
    fn digital_subset_without_both_buttons() {
        assert_eq!(
            classify("B1:1,S2:0"),
            Dispatch::Update(Update::Digital(vec![
                (DigitalInput::Button1, true),
                (DigitalInput::Sensor2, false),
            ]))
        );
        assert_eq!(
            classify("S1:1"),
            Dispatch::Update(Update::Digital(vec![(DigitalInput::Sensor1, true)]))
        );
    }

    #[test]
    fn unknown_keys_without_both_buttons_are_raw() {
        assert_eq!(classify("S1:1,X9:1"), raw("S1:1,X9:1"));
        assert_eq!(classify("STATUS:OK"), raw("STATUS:OK"));
    }

    #[test]
    fn digital_ignores_unknown_keys_and_treats_nonzero_as_high() {
        assert_eq!(
            classify("B1:2,B2:0,X9:1"),
            Dispatch::Update(Update::Digital(vec![
                (DigitalInput::Button1, true),
                (DigitalInput::Button2, false),
            ]))
        );
    }

    #[test]
    fn digital_parse_failure_is_raw() {
        assert_eq!(classify("B1:x,B2:0"), raw("B1:x,B2:0"));
        assert_eq!(classify("B1:1,B2:0,junk"), raw("B1:1,B2:0,junk"));
    }

    // --- Interrupt counter ---

    #[test]
    fn interrupt_counter_digits() {
        assert_eq!(classify("042"), Dispatch::Update(Update::InterruptCount(42)));
        assert_eq!(classify("0"), Dispatch::Update(Update::InterruptCount(0)));
    }

    #[test]
    fn interrupt_counter_rejects_non_digits() {
        assert_eq!(classify("42a"), raw("42a"));
        assert_eq!(classify("-1"), raw("-1"));
        assert_eq!(classify("4 2"), raw("4 2"));
        assert_eq!(classify(""), raw(""));
    }

    #[test]
    fn interrupt_counter_overflow_is_raw() {
        let huge = "99999999999999999999999";
        assert_eq!(classify(huge), raw(huge));
    }

    // --- Raw ---

    #[test]
    fn other_lines_pass_through_verbatim() {
        let idn = "ESP32,GPIO-Controller,SN001,v1.0";
        assert_eq!(classify(idn), raw(idn));
        assert_eq!(classify("OK"), raw("OK"));
    }
}
