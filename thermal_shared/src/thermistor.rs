//! Thermistor lookup tables.
//!
//! A table maps raw ADC counts to whole degrees Celsius. Raw values are
//! strictly ascending; temperatures are strictly monotonic in either
//! direction, so the same code serves tables wired with the thermistor on
//! either side of the divider. Readings between two entries are linearly
//! interpolated. Readings outside the table clamp to the nearest boundary
//! temperature and are flagged as out of range so the sampling path can
//! report a sensor fault.

use crate::Celsius;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::RangeInclusive;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempEntry {
    pub raw: u16,
    pub celsius: Celsius,
}

pub const fn entry(raw: u16, celsius: Celsius) -> TempEntry {
    TempEntry { raw, celsius }
}

/// R25 = 100 kOhm, beta25 = 4092 K, 4.7 kOhm pull-up, bed thermistor.
#[rustfmt::skip]
pub static TEMPTABLE_133: &[TempEntry] = &[
    entry(  180,  -15),
    entry(  242,  -10),
    entry(  323,   -5),
    entry(  426,    0),
    entry(  555,    5),
    entry(  716,   10),
    entry(  915,   15),
    entry( 1157,   20),
    entry( 1448,   25),
    entry( 1795,   30),
    entry( 2205,   35),
    entry( 2682,   40),
    entry( 3233,   45),
    entry( 3859,   50),
    entry( 4564,   55),
    entry( 5348,   60),
    entry( 6208,   65),
    entry( 7140,   70),
    entry( 8137,   75),
    entry( 9191,   80),
    entry(10290,   85),
    entry(11422,   90),
    entry(12575,   95),
    entry(13734,  100),
    entry(14888,  105),
    entry(16024,  110),
    entry(17132,  115),
    entry(18203,  120),
    entry(19230,  125),
    entry(20206,  130),
    entry(21129,  135),
    entry(21996,  140),
    entry(22806,  145),
    entry(23560,  150),
    entry(24258,  155),
    entry(24903,  160),
    entry(25497,  165),
    entry(26043,  170),
    entry(26544,  175),
    entry(27002,  180),
    entry(27421,  185),
    entry(27804,  190),
    entry(28154,  195),
    entry(28474,  200),
    entry(28765,  205),
    entry(29032,  210),
    entry(29275,  215),
    entry(29497,  220),
    entry(29700,  225),
    entry(29885,  230),
    entry(30055,  235),
    entry(30211,  240),
    entry(30353,  245),
    entry(30484,  250),
    entry(30604,  255),
    entry(30714,  260),
    entry(30816,  265),
    entry(30909,  270),
    entry(30995,  275),
    entry(31074,  280),
    entry(31147,  285),
    entry(31215,  290),
    entry(31278,  295),
    entry(31335,  300),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThermistorError {
    #[error("Thermistor table needs at least two entries, got {0}")]
    TooShort(usize),
    #[error("Raw values must be strictly ascending (entry {index})")]
    RawNotAscending { index: usize },
    #[error("Temperatures must be strictly monotonic (entry {index})")]
    NotMonotonic { index: usize },
    #[error("Unknown thermistor table '{0}'")]
    UnknownTable(String),
}

/// Result of converting one raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReading {
    InRange(Celsius),
    /// Below the first table entry; carries the first entry's temperature.
    BelowRange(Celsius),
    /// Above the last table entry; carries the last entry's temperature.
    AboveRange(Celsius),
}

impl SensorReading {
    pub fn celsius(self) -> Celsius {
        match self {
            Self::InRange(c) | Self::BelowRange(c) | Self::AboveRange(c) => c,
        }
    }

    pub fn is_fault(self) -> bool {
        !matches!(self, Self::InRange(_))
    }
}

#[derive(Debug, Clone)]
pub struct ThermistorTable {
    entries: Cow<'static, [TempEntry]>,
    rising: bool,
}

impl ThermistorTable {
    pub fn new(entries: impl Into<Cow<'static, [TempEntry]>>) -> Result<Self, ThermistorError> {
        let entries = entries.into();
        if entries.len() < 2 {
            return Err(ThermistorError::TooShort(entries.len()));
        }
        let rising = entries[1].celsius > entries[0].celsius;
        for (i, pair) in entries.windows(2).enumerate() {
            if pair[1].raw <= pair[0].raw {
                return Err(ThermistorError::RawNotAscending { index: i + 1 });
            }
            let monotonic = if rising {
                pair[1].celsius > pair[0].celsius
            } else {
                pair[1].celsius < pair[0].celsius
            };
            if !monotonic {
                return Err(ThermistorError::NotMonotonic { index: i + 1 });
            }
        }
        Ok(Self { entries, rising })
    }

    /// Compiled-in table by its conventional number.
    pub fn builtin(name: &str) -> Result<Self, ThermistorError> {
        match name.trim() {
            "133" => Self::new(TEMPTABLE_133),
            other => Err(ThermistorError::UnknownTable(other.to_string())),
        }
    }

    pub fn entries(&self) -> &[TempEntry] {
        &self.entries
    }

    /// True when temperature rises with the raw reading.
    pub fn is_rising(&self) -> bool {
        self.rising
    }

    pub fn raw_range(&self) -> RangeInclusive<u16> {
        self.first().raw..=self.last().raw
    }

    /// Raw reading to temperature, clamped at the table boundaries.
    pub fn lookup(&self, raw: u16) -> Celsius {
        self.read(raw).celsius()
    }

    pub fn read(&self, raw: u16) -> SensorReading {
        let (first, last) = (self.first(), self.last());
        if raw < first.raw {
            return SensorReading::BelowRange(first.celsius);
        }
        if raw > last.raw {
            return SensorReading::AboveRange(last.celsius);
        }
        // raw >= first.raw, so at least one entry satisfies the predicate
        let i = self.entries.partition_point(|e| e.raw <= raw) - 1;
        if i + 1 == self.entries.len() {
            return SensorReading::InRange(last.celsius);
        }
        let (lo, hi) = (self.entries[i], self.entries[i + 1]);
        let celsius = interpolate(raw as i64, lo.raw as i64, hi.raw as i64, lo.celsius as i64, hi.celsius as i64);
        SensorReading::InRange(celsius as Celsius)
    }

    /// Inverse lookup: the raw reading that corresponds to `celsius`,
    /// clamped to the table's raw range.
    pub fn raw_for(&self, celsius: Celsius) -> u16 {
        // Map temperatures onto an ascending key so both polarities share one search
        let key = |c: Celsius| if self.rising { c as i64 } else { -(c as i64) };
        let k = key(celsius);
        let (first, last) = (self.first(), self.last());
        if k <= key(first.celsius) {
            return first.raw;
        }
        if k >= key(last.celsius) {
            return last.raw;
        }
        let i = self.entries.partition_point(|e| key(e.celsius) <= k) - 1;
        let (lo, hi) = (self.entries[i], self.entries[i + 1]);
        interpolate(k, key(lo.celsius), key(hi.celsius), lo.raw as i64, hi.raw as i64) as u16
    }

    fn first(&self) -> TempEntry {
        self.entries[0]
    }

    fn last(&self) -> TempEntry {
        self.entries[self.entries.len() - 1]
    }
}

fn interpolate(x: i64, x0: i64, x1: i64, y0: i64, y1: i64) -> i64 {
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}
