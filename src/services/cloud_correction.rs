/// ============================================================
///  Cloud-cover correction
///
///  The weather model's irradiance already carries its own idea of
///  cloudiness; models disagree on how much light an overcast sky
///  still lets through. The correction therefore blends the raw
///  estimate with a cloud-discounted one:
///
///     corrected = (1 − f) · raw + f · discounted
///     discounted = raw · (1 − d_max · (cover / 100)^k)
///
///  `f` is the user-tunable correction factor; `d_max` and `k` shape
///  the discount curve.
/// ============================================================
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_max_discount() -> f64 { 1.0 }
fn default_exponent() -> f64 { 1.0 }

/// Monotonic discount curve over total cloud cover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CloudDiscount {
    /// Fraction of power removed under full cloud cover, in [0, 1]
    #[serde(default = "default_max_discount")]
    pub max_discount: f64,
    /// Curve shape: 1 is linear, > 1 spares light cloud, < 1 punishes it
    #[serde(default = "default_exponent")]
    pub exponent: f64,
}

impl Default for CloudDiscount {
    fn default() -> Self {
        Self { max_discount: default_max_discount(), exponent: default_exponent() }
    }
}

impl CloudDiscount {
    /// Returns the offending `(field, value, range)` on failure.
    pub fn validate(&self) -> Result<(), (&'static str, f64, &'static str)> {
        if !(0.0..=1.0).contains(&self.max_discount) {
            return Err(("max_discount", self.max_discount, "[0, 1]"));
        }
        if !(self.exponent > 0.0 && self.exponent.is_finite()) {
            return Err(("exponent", self.exponent, "> 0"));
        }
        Ok(())
    }

    /// Share of the raw power kept at the given cover. Unknown cover keeps all
    /// of it.
    pub fn retained(&self, cloud_cover_total: f64) -> f64 {
        let cover = if cloud_cover_total.is_nan() {
            0.0
        } else {
            cloud_cover_total.clamp(0.0, 100.0) / 100.0
        };
        1.0 - self.max_discount * cover.powf(self.exponent)
    }

    pub fn discounted(&self, raw_power_w: f64, cloud_cover_total: f64) -> f64 {
        raw_power_w * self.retained(cloud_cover_total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudCorrectionAdjuster {
    factor: f64,
    discount: CloudDiscount,
}

impl CloudCorrectionAdjuster {
    pub const fn new(factor: f64, discount: CloudDiscount) -> Self {
        Self { factor, discount }
    }

    pub fn discounted(&self, raw_power_w: f64, cloud_cover_total: f64) -> f64 {
        self.discount.discounted(raw_power_w, cloud_cover_total)
    }

    /// Linear blend of the raw and discounted estimates. Factor 0 returns
    /// `raw_power_w` bit for bit, factor 1 returns the discounted value bit
    /// for bit.
    pub fn correct(&self, raw_power_w: f64, cloud_cover_total: f64) -> f64 {
        let discounted = self.discounted(raw_power_w, cloud_cover_total);
        (1.0 - self.factor) * raw_power_w + self.factor * discounted
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const COVERS: [f64; 6] = [0.0, 12.5, 40.0, 75.0, 99.0, 100.0];
    const RAWS: [f64; 4] = [0.0, 1.0, 873.25, 3712.9];

    fn adjuster(factor: f64) -> CloudCorrectionAdjuster {
        CloudCorrectionAdjuster::new(factor, CloudDiscount { max_discount: 0.8, exponent: 1.5 })
    }

    #[test]
    fn test_factor_zero_is_raw() {
        let adjuster = adjuster(0.0);
        for raw in RAWS {
            for cover in COVERS {
                assert_eq!(adjuster.correct(raw, cover), raw);
            }
        }
    }

    #[test]
    fn test_factor_one_is_discounted() {
        let adjuster = adjuster(1.0);
        for raw in RAWS {
            for cover in COVERS {
                assert_eq!(adjuster.correct(raw, cover), adjuster.discounted(raw, cover));
            }
        }
    }

    #[test]
    fn test_intermediate_factors_interpolate() {
        for factor in [0.25, 0.5, 0.75] {
            let adjuster = adjuster(factor);
            for raw in RAWS {
                for cover in COVERS {
                    let expected =
                        (1.0 - factor) * raw + factor * adjuster.discounted(raw, cover);
                    assert_relative_eq!(adjuster.correct(raw, cover), expected, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_discount_is_monotonic() {
        let discount = CloudDiscount { max_discount: 0.8, exponent: 1.5 };
        let retained: Vec<f64> = COVERS.iter().map(|&c| discount.retained(c)).collect();
        assert!(retained.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_relative_eq!(discount.retained(100.0), 0.2);
    }

    #[test]
    fn test_default_curve_matches_linear_reduction() {
        // With the default curve the blend is raw · (1 − cover/100 · f).
        let adjuster = CloudCorrectionAdjuster::new(0.7, CloudDiscount::default());
        assert_relative_eq!(adjuster.correct(1000.0, 50.0), 1000.0 * (1.0 - 0.5 * 0.7));
    }

    #[test]
    fn test_cover_out_of_range_or_unknown() {
        let discount = CloudDiscount::default();
        assert_eq!(discount.retained(f64::NAN), 1.0);
        assert_eq!(discount.retained(-5.0), 1.0);
        assert_eq!(discount.retained(140.0), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_curve() {
        assert!(CloudDiscount { max_discount: 1.5, exponent: 1.0 }.validate().is_err());
        assert!(CloudDiscount { max_discount: 0.5, exponent: 0.0 }.validate().is_err());
        assert!(CloudDiscount::default().validate().is_ok());
    }
}
