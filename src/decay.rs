use crate::error::{Error, Result};

/// A strategy for shrinking a hyperparameter once per episode
pub trait Decay {
    /// Compute the value for the next episode from the current one
    fn next(&self, value: f32) -> f32;
}

fn validate_floor(floor: f32) -> Result<()> {
    (0.0..=1.0)
        .contains(&floor)
        .then_some(())
        .ok_or_else(|| Error::invalid("floor", format!("{floor} is outside [0, 1]")))
}

/// A constant value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constant;

impl Decay for Constant {
    fn next(&self, value: f32) -> f32 {
        value
    }
}

/// v<sub>n+1</sub> = max(v<sub>n</sub> * r, v<sub>f</sub>)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    rate: f32,
    floor: f32,
}

impl Exponential {
    /// `rate` must be in `(0, 1]` and `floor` in `[0, 1]`
    pub fn new(rate: f32, floor: f32) -> Result<Self> {
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(Error::invalid("rate", format!("{rate} is outside (0, 1]")));
        }
        validate_floor(floor)?;
        Ok(Self { rate, floor })
    }
}

impl Decay for Exponential {
    fn next(&self, value: f32) -> f32 {
        (value * self.rate).max(self.floor)
    }
}

/// v<sub>n+1</sub> = max(v<sub>n</sub> - r, v<sub>f</sub>)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    rate: f32,
    floor: f32,
}

impl Linear {
    /// `rate` must be non-negative and `floor` in `[0, 1]`
    pub fn new(rate: f32, floor: f32) -> Result<Self> {
        if !(rate >= 0.0) {
            return Err(Error::invalid("rate", format!("{rate} is negative")));
        }
        validate_floor(floor)?;
        Ok(Self { rate, floor })
    }
}

impl Decay for Linear {
    fn next(&self, value: f32) -> f32 {
        (value - self.rate).max(self.floor)
    }
}
