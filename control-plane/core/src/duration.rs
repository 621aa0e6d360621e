use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

/// A duration in Go's `time.Duration` string form, e.g. `1m30s`.
///
/// Both Kubernetes (`metav1.Duration`) and Consul's config entries encode
/// durations this way.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct GoDuration {
    duration: Duration,
    is_negative: bool,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("duration out of range")]
    OutOfRange,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

impl From<Duration> for GoDuration {
    fn from(duration: Duration) -> Self {
        Self {
            duration,
            is_negative: false,
        }
    }
}

impl From<GoDuration> for Duration {
    fn from(GoDuration { duration, .. }: GoDuration) -> Self {
        duration
    }
}

impl GoDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
            is_negative: false,
        }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self {
            duration: Duration::from_millis(millis),
            is_negative: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.is_negative && !self.duration.is_zero()
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.duration.is_zero()
    }

    #[inline]
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Debug for GoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Formats the same way as Go's `time.Duration.String()`.
impl fmt::Display for GoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.duration.as_nanos();
        if nanos == 0 {
            return f.write_str("0s");
        }
        if self.is_negative {
            f.write_str("-")?;
        }

        if nanos < NANOS_PER_SEC {
            let (div, width, unit) = if nanos < NANOS_PER_MICRO {
                (1, 0, "ns")
            } else if nanos < NANOS_PER_MILLI {
                (NANOS_PER_MICRO, 3, "\u{00b5}s")
            } else {
                (NANOS_PER_MILLI, 6, "ms")
            };
            write_fraction(f, nanos / div, nanos % div, width)?;
            return f.write_str(unit);
        }

        let secs = self.duration.as_secs();
        let (hours, mins, secs) = (secs / 3600, (secs / 60) % 60, secs % 60);
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || mins > 0 {
            write!(f, "{mins}m")?;
        }
        write_fraction(
            f,
            u128::from(secs),
            u128::from(self.duration.subsec_nanos()),
            9,
        )?;
        f.write_str("s")
    }
}

fn write_fraction(f: &mut fmt::Formatter<'_>, int: u128, frac: u128, width: usize) -> fmt::Result {
    if frac == 0 {
        return write!(f, "{int}");
    }
    let digits = format!("{frac:0width$}");
    write!(f, "{int}.{}", digits.trim_end_matches('0'))
}

impl FromStr for GoDuration {
    type Err = ParseError;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        // implements the same format as
        // https://cs.opensource.google/go/go/+/refs/tags/go1.20.4:src/time/format.go;l=1589

        fn duration_from_units(val: f64, unit: &str) -> Result<Duration, ParseError> {
            const MINUTE: Duration = Duration::from_secs(60);
            let base = match unit {
                "ns" => Duration::from_nanos(1),
                // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
                "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => MINUTE,
                "h" => MINUTE * 60,
                _ => return Err(ParseError::InvalidUnit),
            };
            Duration::try_from_secs_f64(base.as_secs_f64() * val)
                .map_err(|_| ParseError::OutOfRange)
        }

        let is_negative = s.starts_with('-');
        s = s.trim_start_matches('+').trim_start_matches('-');

        let mut total = Duration::from_secs(0);
        while !s.is_empty() {
            if let Some(unit_start) = s.find(|c: char| c.is_alphabetic()) {
                let (val, rest) = s.split_at(unit_start);
                let val = val.parse::<f64>()?;
                let unit = if let Some(next_numeric_start) = rest.find(|c: char| !c.is_alphabetic())
                {
                    let (unit, rest) = rest.split_at(next_numeric_start);
                    s = rest;
                    unit
                } else {
                    s = "";
                    rest
                };
                total = total
                    .checked_add(duration_from_units(val, unit)?)
                    .ok_or(ParseError::OutOfRange)?;
            } else if s == "0" {
                break;
            } else {
                return Err(ParseError::NoUnit);
            }
        }

        Ok(GoDuration {
            duration: total,
            is_negative,
        })
    }
}

impl Serialize for GoDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GoDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = GoDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string in Go `time.Duration.String()` format")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse::<GoDuration>().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

impl schemars::JsonSchema for GoDuration {
    fn schema_name() -> String {
        "GoDuration".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            // Not "duration": that format means ISO 8601.
            format: None,
            ..Default::default()
        }
        .into()
    }
}
