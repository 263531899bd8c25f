//! Typed views of the lamp's fixed-format status replies.
//!
//! The instrument reports state as short ASCII strings: the `GFS` fault
//! query answers with a 4-character bit string, the `GST` motion-controller
//! query with a 7-character bit string. This module parses those replies
//! into typed structs, and defines [`LampStatus`], the immutable telemetry
//! snapshot produced by `Hl2000Driver::get_info`.

use crate::error::{LampError, Result};
use serde::Serialize;

/// Immutable snapshot of lamp telemetry.
///
/// When `is_connected` is `false`, every other field carries its unknown
/// sentinel ("N/A" / `NaN`), never a stale value from a previous session.
#[derive(Debug, Clone, Serialize)]
pub struct LampStatus {
    /// Raw firmware identification reply, "N/A" when unknown.
    pub firmware_version: String,
    /// Whether a serial session is open.
    pub is_connected: bool,
    /// Last commanded illumination state.
    pub is_enabled: bool,
    /// Lightbulb coil temperature in °C, `NaN` when unknown.
    pub coil_temperature_c: f64,
    /// Shutter position in protocol counts, `NaN` when unknown.
    pub shutter_position: f64,
    /// Motion driver current in mA, `NaN` when unknown.
    pub driver_current_ma: f64,
}

impl Default for LampStatus {
    fn default() -> Self {
        Self {
            firmware_version: "N/A".to_string(),
            is_connected: false,
            is_enabled: false,
            coil_temperature_c: f64::NAN,
            shutter_position: f64::NAN,
            driver_current_ma: f64::NAN,
        }
    }
}

/// Fault flags reported by the `GFS` query.
///
/// Reply format: 4 characters of '0'/'1'.
/// - bit 0: over-temperature
/// - bit 1: over-current
/// - bit 2: under-voltage (< 15 VDC)
/// - bit 3: over-voltage (> 28 VDC)
///
/// "0000" means no fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FaultStatus {
    /// Coil over-temperature condition.
    pub over_temperature: bool,
    /// Drive over-current condition.
    pub over_current: bool,
    /// Supply under-voltage condition (< 15 VDC).
    pub under_voltage: bool,
    /// Supply over-voltage condition (> 28 VDC).
    pub over_voltage: bool,
}

impl FaultStatus {
    /// Parse a `GFS` reply.
    pub fn parse(reply: &str) -> Result<Self> {
        let bits = parse_bits::<4>(reply, "GFS fault status")?;
        Ok(Self {
            over_temperature: bits[0],
            over_current: bits[1],
            under_voltage: bits[2],
            over_voltage: bits[3],
        })
    }

    /// True when no fault flag is set.
    pub fn is_clear(&self) -> bool {
        !(self.over_temperature || self.over_current || self.under_voltage || self.over_voltage)
    }
}

/// Shutter motion mode (`GST` bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionMode {
    /// Closed-loop position mode.
    Position,
    /// Velocity mode.
    Velocity,
}

/// Where the speed command originates (`GST` bit 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedCommandSource {
    /// Speed command arrives over the RS-232 link.
    Rs232,
    /// Speed command is taken from the analog input.
    Analog,
}

/// How an analog speed command is encoded (`GST` bit 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedCommandSignal {
    /// Analog voltage level.
    AnalogVoltage,
    /// PWM duty cycle.
    Pwm,
}

/// Which external-switch edge is considered valid (`GST` bit 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchEdge {
    /// Falling edge on the external switch is valid.
    Falling,
    /// Rising edge on the external switch is valid.
    Rising,
}

/// Current external-switch level (`GST` bit 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchLevel {
    /// Switch input currently low.
    Low,
    /// Switch input currently high.
    High,
}

/// Motion-controller status reported by the `GST` query.
///
/// Reply format: 7 characters of '0'/'1', one field per bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotionStatus {
    /// bit 0: '1' position mode, '0' velocity mode.
    pub mode: MotionMode,
    /// bit 1: '1' analog input, '0' RS-232.
    pub speed_source: SpeedCommandSource,
    /// bit 2: '1' PWM, '0' analog voltage.
    pub speed_signal: SpeedCommandSignal,
    /// bit 3: '1' amplifier enabled.
    pub amplifier_enabled: bool,
    /// bit 4: '1' in position.
    pub in_position: bool,
    /// bit 5: '1' rising edge valid, '0' falling edge valid.
    pub switch_edge: SwitchEdge,
    /// bit 6: '1' switch high, '0' switch low.
    pub switch_level: SwitchLevel,
}

impl MotionStatus {
    /// Parse a `GST` reply.
    pub fn parse(reply: &str) -> Result<Self> {
        let bits = parse_bits::<7>(reply, "GST motion status")?;
        Ok(Self {
            mode: if bits[0] {
                MotionMode::Position
            } else {
                MotionMode::Velocity
            },
            speed_source: if bits[1] {
                SpeedCommandSource::Analog
            } else {
                SpeedCommandSource::Rs232
            },
            speed_signal: if bits[2] {
                SpeedCommandSignal::Pwm
            } else {
                SpeedCommandSignal::AnalogVoltage
            },
            amplifier_enabled: bits[3],
            in_position: bits[4],
            switch_edge: if bits[5] {
                SwitchEdge::Rising
            } else {
                SwitchEdge::Falling
            },
            switch_level: if bits[6] {
                SwitchLevel::High
            } else {
                SwitchLevel::Low
            },
        })
    }
}

/// Parse a fixed-width '0'/'1' bit string.
fn parse_bits<const N: usize>(reply: &str, what: &'static str) -> Result<[bool; N]> {
    let trimmed = reply.trim();
    if trimmed.len() != N {
        return Err(LampError::Protocol(format!(
            "{} reply must be {} bits, got '{}'",
            what, N, reply
        )));
    }
    let mut bits = [false; N];
    for (i, c) in trimmed.chars().enumerate() {
        bits[i] = match c {
            '0' => false,
            '1' => true,
            _ => {
                return Err(LampError::Protocol(format!(
                    "{} reply contains non-binary character '{}' in '{}'",
                    what, c, reply
                )))
            }
        };
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_all_unknown() {
        let status = LampStatus::default();
        assert_eq!(status.firmware_version, "N/A");
        assert!(!status.is_connected);
        assert!(!status.is_enabled);
        assert!(status.coil_temperature_c.is_nan());
        assert!(status.shutter_position.is_nan());
        assert!(status.driver_current_ma.is_nan());
    }

    #[test]
    fn fault_over_temperature_only() {
        let faults = FaultStatus::parse("1000").expect("valid reply");
        assert!(faults.over_temperature);
        assert!(!faults.over_current);
        assert!(!faults.under_voltage);
        assert!(!faults.over_voltage);
        assert!(!faults.is_clear());
    }

    #[test]
    fn fault_over_current_only() {
        let faults = FaultStatus::parse("0100").expect("valid reply");
        assert_eq!(
            faults,
            FaultStatus {
                over_current: true,
                ..FaultStatus::default()
            }
        );
    }

    #[test]
    fn fault_none() {
        let faults = FaultStatus::parse("0000").expect("valid reply");
        assert_eq!(faults, FaultStatus::default());
        assert!(faults.is_clear());
    }

    #[test]
    fn fault_all_four() {
        let faults = FaultStatus::parse("1111").expect("valid reply");
        assert!(faults.over_temperature);
        assert!(faults.over_current);
        assert!(faults.under_voltage);
        assert!(faults.over_voltage);
    }

    #[test]
    fn fault_reply_tolerates_terminator_whitespace() {
        let faults = FaultStatus::parse("0010\r\n").expect("valid reply");
        assert!(faults.under_voltage);
    }

    #[test]
    fn fault_rejects_wrong_length() {
        assert!(matches!(
            FaultStatus::parse("00000"),
            Err(LampError::Protocol(_))
        ));
        assert!(matches!(FaultStatus::parse(""), Err(LampError::Protocol(_))));
    }

    #[test]
    fn fault_rejects_non_binary() {
        assert!(matches!(
            FaultStatus::parse("0A00"),
            Err(LampError::Protocol(_))
        ));
    }

    #[test]
    fn motion_status_decodes_each_bit_independently() {
        // Walk a single '1' through every bit position.
        let all_zero = MotionStatus::parse("0000000").expect("valid reply");
        assert_eq!(all_zero.mode, MotionMode::Velocity);
        assert_eq!(all_zero.speed_source, SpeedCommandSource::Rs232);
        assert_eq!(all_zero.speed_signal, SpeedCommandSignal::AnalogVoltage);
        assert!(!all_zero.amplifier_enabled);
        assert!(!all_zero.in_position);
        assert_eq!(all_zero.switch_edge, SwitchEdge::Falling);
        assert_eq!(all_zero.switch_level, SwitchLevel::Low);

        assert_eq!(
            MotionStatus::parse("1000000").expect("valid").mode,
            MotionMode::Position
        );
        assert_eq!(
            MotionStatus::parse("0100000").expect("valid").speed_source,
            SpeedCommandSource::Analog
        );
        assert_eq!(
            MotionStatus::parse("0010000").expect("valid").speed_signal,
            SpeedCommandSignal::Pwm
        );
        assert!(MotionStatus::parse("0001000").expect("valid").amplifier_enabled);
        assert!(MotionStatus::parse("0000100").expect("valid").in_position);
        assert_eq!(
            MotionStatus::parse("0000010").expect("valid").switch_edge,
            SwitchEdge::Rising
        );
        assert_eq!(
            MotionStatus::parse("0000001").expect("valid").switch_level,
            SwitchLevel::High
        );
    }

    #[test]
    fn motion_status_decodes_mixed_word() {
        let status = MotionStatus::parse("1010110").expect("valid reply");
        assert_eq!(status.mode, MotionMode::Position);
        assert_eq!(status.speed_source, SpeedCommandSource::Rs232);
        assert_eq!(status.speed_signal, SpeedCommandSignal::Pwm);
        assert!(!status.amplifier_enabled);
        assert!(status.in_position);
        assert_eq!(status.switch_edge, SwitchEdge::Rising);
        assert_eq!(status.switch_level, SwitchLevel::Low);
    }

    #[test]
    fn motion_status_rejects_wrong_length() {
        assert!(matches!(
            MotionStatus::parse("101011"),
            Err(LampError::Protocol(_))
        ));
    }
}
