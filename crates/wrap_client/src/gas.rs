//! Gas accounting exposed to the invocation boundary.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{InvokeError, Result};

/// Unsigned fraction used for per-byte cost rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UFraction {
    pub numerator: u64,
    pub denominator: u64,
}

impl UFraction {
    pub const ZERO: Self = Self::new(0, 1);

    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `floor(n * numerator / denominator)`, saturating at `u64::MAX`.
    ///
    /// A zero denominator prices any non-zero amount at `u64::MAX`.
    pub fn mul_floor(&self, n: u64) -> u64 {
        if n == 0 || self.numerator == 0 {
            return 0;
        }
        if self.denominator == 0 {
            return u64::MAX;
        }
        let v = u128::from(n) * u128::from(self.numerator) / u128::from(self.denominator);
        u64::try_from(v).unwrap_or(u64::MAX)
    }
}

/// Gas budget of one invocation.
///
/// `meter_consumed` is the host meter reading taken when the call started.
#[derive(Debug)]
pub struct GasTank {
    limit: u64,
    meter_consumed: u64,
    used: AtomicU64,
    exhausted: AtomicBool,
}

impl GasTank {
    pub fn new(limit: u64, meter_consumed: u64) -> Self {
        Self {
            limit,
            meter_consumed,
            used: AtomicU64::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Charge `units`; fails without charging if the limit would be exceeded.
    pub fn charge(&self, units: u64) -> Result<()> {
        let limit = self.limit;
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                let next = used.saturating_add(units);
                (next <= limit).then_some(next)
            })
            .map(|_| ())
            .map_err(|used| {
                self.exhausted.store(true, Ordering::SeqCst);
                InvokeError::OutOfGas {
                    needed: units,
                    remaining: limit.saturating_sub(used),
                }
            })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn meter_consumed(&self) -> u64 {
        self.meter_consumed
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used())
    }

    /// True once any charge was refused.
    pub fn exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}
