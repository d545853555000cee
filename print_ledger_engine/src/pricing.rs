//! Pricing and fee policies.
//!
//! [`PricingPolicy`] decides the lowest price a shop may quote for a job. [`FeePolicy`] splits a completed job's
//! payment into the platform fee and the shop's net earning.
use serde::{Deserialize, Serialize};

use crate::db_types::{ColorMode, MinorUnits, NewEarning, PaperSize};

pub const DEFAULT_MONOCHROME_RATE: i64 = 100;
pub const DEFAULT_COLOR_RATE: i64 = 300;
pub const DEFAULT_LARGE_MULTIPLIER: i64 = 2;
pub const DEFAULT_PLATFORM_FEE_BPS: i64 = 1_000;
const BPS_DENOMINATOR: i64 = 10_000;

/// Per-copy minimum rates for a standard sheet, plus the multiplier applied to large sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub monochrome_rate: MinorUnits,
    pub color_rate: MinorUnits,
    pub large_multiplier: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            monochrome_rate: MinorUnits::from(DEFAULT_MONOCHROME_RATE),
            color_rate: MinorUnits::from(DEFAULT_COLOR_RATE),
            large_multiplier: DEFAULT_LARGE_MULTIPLIER,
        }
    }
}

impl PricingPolicy {
    pub fn new(monochrome_rate: MinorUnits, color_rate: MinorUnits, large_multiplier: i64) -> Self {
        Self { monochrome_rate, color_rate, large_multiplier }
    }

    /// `copies × rate(color_mode) × multiplier(paper_size)`. Returns `None` if the result overflows.
    pub fn minimum_price(&self, copies: i64, color_mode: ColorMode, paper_size: PaperSize) -> Option<MinorUnits> {
        let rate = match color_mode {
            ColorMode::Monochrome => self.monochrome_rate,
            ColorMode::Color => self.color_rate,
        };
        let multiplier = match paper_size {
            PaperSize::Standard => 1,
            PaperSize::Large => self.large_multiplier,
        };
        rate.checked_mul(copies)?.checked_mul(multiplier)
    }
}

/// The platform's cut of each completed job, in basis points. Fees are rounded down, so the shop keeps any fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    fee_bps: i64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { fee_bps: DEFAULT_PLATFORM_FEE_BPS }
    }
}

impl FeePolicy {
    /// Creates a fee policy. `fee_bps` is clamped to `0..=10_000`.
    pub fn from_bps(fee_bps: i64) -> Self {
        Self { fee_bps: fee_bps.clamp(0, BPS_DENOMINATOR) }
    }

    pub fn fee_bps(&self) -> i64 {
        self.fee_bps
    }

    /// `floor(gross × fee_bps / 10000)`
    pub fn platform_fee(&self, gross: MinorUnits) -> MinorUnits {
        // fee_bps <= denominator, so the result always fits
        gross.floor_fraction(self.fee_bps, BPS_DENOMINATOR).unwrap_or(gross)
    }

    /// Builds the earning record for a completed job.
    pub fn earning_for(&self, shop_id: &str, job_id: i64, gross: MinorUnits) -> NewEarning {
        let platform_fee = self.platform_fee(gross);
        NewEarning {
            shop_id: shop_id.to_string(),
            job_id,
            gross_amount: gross,
            platform_fee,
            net_amount: gross - platform_fee,
        }
    }
}
