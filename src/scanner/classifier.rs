use crate::config::signal::{
    DELIVERY_WEIGHT, STRONG_DELIVERY_PCT, STRONG_VOL_SPIKE, VOL_SPIKE_WEIGHT,
};
use crate::types::SignalTag;

/// Tag a row that already passed the scan filters.
/// Both strong-tag comparisons are strict.
pub fn classify(vol_spike: f64, delivery_pct: f64) -> SignalTag {
    if vol_spike > STRONG_VOL_SPIKE && delivery_pct > STRONG_DELIVERY_PCT {
        SignalTag::StrongAccumulation
    } else {
        SignalTag::Accumulation
    }
}

/// Ranking score, unnormalized: a 2x spike is worth 20 points,
/// 50 % delivery is worth 50, and an extreme spike can outrank everything.
pub fn score(delivery_pct: f64, vol_spike: f64) -> f64 {
    delivery_pct * DELIVERY_WEIGHT + vol_spike * VOL_SPIKE_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_needs_both_conditions() {
        assert_eq!(classify(3.5, 55.0), SignalTag::StrongAccumulation);
        assert_eq!(classify(3.5, 45.0), SignalTag::Accumulation);
        assert_eq!(classify(2.5, 80.0), SignalTag::Accumulation);
    }

    #[test]
    fn thresholds_are_exclusive() {
        assert_eq!(classify(3.0, 90.0), SignalTag::Accumulation);
        assert_eq!(classify(10.0, 50.0), SignalTag::Accumulation);
        assert_eq!(classify(3.0001, 50.0001), SignalTag::StrongAccumulation);
    }

    #[test]
    fn score_weights_volume_spike_ten_to_one() {
        assert!((score(55.0, 3.5) - 90.0).abs() < 1e-9);
        assert!((score(0.0, 25.0) - 250.0).abs() < 1e-9);
    }
}
