//! Weighted random choice of a response status.

use crate::{Error, Result};
use http::StatusCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// One candidate status and its relative weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedOutcome {
    pub code: StatusCode,
    pub weight: f64,
}

/// Parsed form of a `/status/{codes}` path segment.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChoice {
    /// A bare single code; no randomness involved.
    Fixed(StatusCode),
    /// A `code[:weight]` list to sample from.
    Weighted(Vec<WeightedOutcome>),
}

impl StatusChoice {
    /// Parses `"418"` or `"200:0.3,500:0.7,301"`. A missing weight means `1`.
    ///
    /// Every token is validated before anything is drawn.
    pub fn parse(codes: &str) -> Result<Self> {
        if !codes.contains(',') {
            return parse_code(codes).map(StatusChoice::Fixed);
        }

        let outcomes = codes
            .split(',')
            .map(|choice| {
                let (code, weight) = match choice.split_once(':') {
                    Some((code, weight)) => (code, Some(weight)),
                    None => (choice, None),
                };
                Ok(WeightedOutcome {
                    code: parse_code(code)?,
                    weight: weight.map_or(Ok(1.0), parse_weight)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total: f64 = outcomes.iter().map(|o| o.weight).sum();
        if !total.is_finite() {
            return Err(Error::InvalidWeight(codes.to_string()));
        }
        if total <= 0.0 {
            return Err(Error::ZeroTotalWeight);
        }
        Ok(StatusChoice::Weighted(outcomes))
    }
}

fn parse_code(token: &str) -> Result<StatusCode> {
    let code: u16 = token.trim().parse().map_err(|_| Error::InvalidStatusCode)?;
    StatusCode::from_u16(code).map_err(|_| Error::InvalidStatusCode)
}

fn parse_weight(token: &str) -> Result<f64> {
    match token.trim().parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight >= 0.0 => Ok(weight),
        _ => Err(Error::InvalidWeight(token.to_string())),
    }
}

/// Draws from `outcomes` with probability proportional to weight.
///
/// Inverse-CDF sampling: the result is the first entry whose cumulative weight
/// strictly exceeds a uniform draw in `[0, total)`, so zero-weight entries are
/// never chosen. Returns `None` unless the weights sum to a positive, finite value.
pub fn choose<R: Rng>(outcomes: &[WeightedOutcome], rng: &mut R) -> Option<StatusCode> {
    let total: f64 = outcomes.iter().map(|o| o.weight).sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let x = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for outcome in outcomes {
        cumulative += outcome.weight;
        if cumulative > x {
            return Some(outcome.code);
        }
    }
    // Rounding can leave `x` just above the last prefix sum; fall back to the
    // last entry that can be drawn.
    outcomes.iter().rev().find(|o| o.weight > 0.0).map(|o| o.code)
}

/// Shared status picker holding one generator seeded at construction.
#[derive(Debug)]
pub struct StatusSelector {
    rng: Mutex<StdRng>,
}

impl StatusSelector {
    /// Seeds from operating-system entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeds deterministically, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Resolves a parsed choice to a single status.
    pub fn select(&self, choice: &StatusChoice) -> Result<StatusCode> {
        match choice {
            StatusChoice::Fixed(code) => Ok(*code),
            StatusChoice::Weighted(outcomes) => {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                choose(outcomes, &mut *rng).ok_or(Error::ZeroTotalWeight)
            }
        }
    }
}

impl Default for StatusSelector {
    fn default() -> Self {
        Self::new()
    }
}
