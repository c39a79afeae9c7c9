//! Sensor readings derived from an envelope's state.
//!
//! A state mapping yields at most one publishable reading. The keys are
//! checked in a fixed order, `presence`, then `temperature`, then `humidity`,
//! and the first one present wins. A `buttonevent` is read independently and
//! is only ever displayed.

use serde_json::{Map, Value};

use crate::envelope::mismatch;
use crate::error::Result;

pub const BUTTON_EVENT_KEY: &str = "buttonevent";
pub const PRESENCE_KEY: &str = "presence";
pub const TEMPERATURE_KEY: &str = "temperature";
pub const HUMIDITY_KEY: &str = "humidity";

/// Publishable keys, in priority order.
pub const PUBLISHABLE_KEYS: [&str; 3] = [PRESENCE_KEY, TEMPERATURE_KEY, HUMIDITY_KEY];

/// Temperature and humidity arrive in hundredths of a unit.
const HUNDREDTHS: f64 = 100.0;

/// A normalized value taken from a state mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    /// Button event code, display only
    ButtonEvent(f64),
    /// Presence detected
    Presence(bool),
    /// Temperature in degrees, already scaled
    Temperature(f64),
    /// Relative humidity in percent, already scaled
    Humidity(f64),
}

impl SensorReading {
    /// The state key this reading was taken from.
    pub fn key(&self) -> &'static str {
        match self {
            SensorReading::ButtonEvent(_) => BUTTON_EVENT_KEY,
            SensorReading::Presence(_) => PRESENCE_KEY,
            SensorReading::Temperature(_) => TEMPERATURE_KEY,
            SensorReading::Humidity(_) => HUMIDITY_KEY,
        }
    }

    /// Whether this reading is sent to the broker.
    pub fn is_publishable(&self) -> bool {
        !matches!(self, SensorReading::ButtonEvent(_))
    }

    /// Text form of the value.
    ///
    /// Presence renders as `true`/`false`, temperature and humidity as
    /// fixed-point with six decimals, button codes as a four-wide integer.
    pub fn payload(&self) -> String {
        match self {
            SensorReading::ButtonEvent(code) => format!("{code:4.0}"),
            SensorReading::Presence(present) => present.to_string(),
            SensorReading::Temperature(value) | SensorReading::Humidity(value) => {
                format!("{value:.6}")
            }
        }
    }
}

/// Everything derived from one state mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateReadings {
    /// Button event, if the state carried one
    pub button: Option<SensorReading>,
    /// The winning publishable reading, if any
    pub sensor: Option<SensorReading>,
    /// Publishable keys that were present but lost to `sensor`
    pub ignored: Vec<&'static str>,
}

impl StateReadings {
    /// Derive readings from a state mapping.
    ///
    /// A publishable key holding a value of the wrong type is an error, the
    /// same as a malformed envelope. A malformed `buttonevent` only drops
    /// the button reading.
    pub fn from_state(state: &Map<String, Value>) -> Result<Self> {
        let button = match state.get(BUTTON_EVENT_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => match number(BUTTON_EVENT_KEY, value) {
                Ok(code) => Some(SensorReading::ButtonEvent(code)),
                Err(error) => {
                    tracing::debug!(%error, "ignoring malformed button event");
                    None
                }
            },
        };

        let mut sensor = None;
        let mut ignored = Vec::new();

        for key in PUBLISHABLE_KEYS {
            let value = match state.get(key) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            if sensor.is_some() {
                ignored.push(key);
                continue;
            }

            sensor = Some(match key {
                PRESENCE_KEY => SensorReading::Presence(boolean(key, value)?),
                TEMPERATURE_KEY => SensorReading::Temperature(number(key, value)? / HUNDREDTHS),
                _ => SensorReading::Humidity(number(key, value)? / HUNDREDTHS),
            });
        }

        Ok(Self {
            button,
            sensor,
            ignored,
        })
    }

    /// Whether a reading will be published.
    pub fn is_publishable(&self) -> bool {
        self.sensor.is_some_and(|s| s.is_publishable())
    }
}

fn number(key: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| mismatch(format!("state.{key}"), "number", value))
}

fn boolean(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| mismatch(format!("state.{key}"), "boolean", value))
}
