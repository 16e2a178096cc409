use rust_decimal::Decimal;
use serde::Serialize;

/// GST breakdown of a tax-inclusive total. Amounts are integer cents so
/// `subtotal_cents + gst_cents == total_cents` always holds exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GstBreakdown {
    pub subtotal_cents: i64,
    pub gst_cents: i64,
    pub total_cents: i64,
    pub gst_rate: Decimal,
}

/// Computes the GST portion of tax-inclusive amounts with a fixed fraction.
/// Singapore GST at 9% means a fraction of 9/109 of the inclusive total.
#[derive(Debug, Clone, Copy)]
pub struct GstCalculator {
    numerator: i64,
    denominator: i64,
    rate: Decimal,
}

impl Default for GstCalculator {
    fn default() -> Self {
        Self::new(9, 109, Decimal::new(900, 2))
    }
}

impl GstCalculator {
    pub fn new(numerator: i64, denominator: i64, rate: Decimal) -> Self {
        Self {
            numerator,
            denominator,
            rate,
        }
    }

    /// GST = round_half_up(total * numerator / denominator), in integer
    /// arithmetic: floor((2 * total * num + den) / (2 * den)).
    pub fn calculate_from_inclusive(&self, total_cents: i64) -> GstBreakdown {
        let gst_cents =
            (2 * total_cents * self.numerator + self.denominator) / (2 * self.denominator);

        GstBreakdown {
            subtotal_cents: total_cents - gst_cents,
            gst_cents,
            total_cents,
            gst_rate: self.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_inclusive_total() {
        let breakdown = GstCalculator::default().calculate_from_inclusive(10900);

        assert_eq!(breakdown.subtotal_cents, 10000);
        assert_eq!(breakdown.gst_cents, 900);
        assert_eq!(breakdown.total_cents, 10900);
        assert_eq!(breakdown.gst_rate, Decimal::new(900, 2));
    }

    #[test]
    fn zero_total_has_zero_gst() {
        let breakdown = GstCalculator::default().calculate_from_inclusive(0);

        assert_eq!(breakdown.subtotal_cents, 0);
        assert_eq!(breakdown.gst_cents, 0);
    }

    #[test]
    fn reconstitutes_total_exactly_for_awkward_amounts() {
        let calc = GstCalculator::default();
        for total in [1, 7, 99, 101, 1090, 2799, 2800, 12345, 99999, 1_000_001] {
            let b = calc.calculate_from_inclusive(total);
            assert_eq!(b.subtotal_cents + b.gst_cents, b.total_cents, "total {total}");
            assert!(b.gst_cents >= 0 && b.gst_cents <= total);
        }
    }

    #[test]
    fn rounds_half_up() {
        // 1 * 1/2 = 0.5, which must round up to 1.
        let calc = GstCalculator::new(1, 2, Decimal::new(5000, 2));
        let b = calc.calculate_from_inclusive(1);

        assert_eq!(b.gst_cents, 1);
        assert_eq!(b.subtotal_cents, 0);
    }
}
