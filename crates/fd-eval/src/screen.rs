//! Factor validity screening.

use derive_more::Display;

/// Share of NaN/infinite values at which a sample is rejected.
pub const INVALID_RATIO_CAP: f64 = 0.9;

/// Outcome of screening a factor sample.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    /// The sample can be fitted
    #[display("usable")]
    Usable,
    /// At least 90% of the values are NaN or infinite
    #[display("too many invalid values")]
    ExcessInvalid,
    /// Every value equals the first one
    #[display("zero variance")]
    ZeroVariance,
}

impl Screening {
    /// Whether the sample passed.
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Usable)
    }
}

/// Screen a factor sample before fitting.
///
/// An empty sample counts as all-invalid.
pub fn screen(values: &[f64]) -> Screening {
    let invalid = values.iter().filter(|v| !v.is_finite()).count();
    if invalid as f64 >= values.len() as f64 * INVALID_RATIO_CAP {
        return Screening::ExcessInvalid;
    }
    // NaN never compares equal, so a NaN anywhere breaks the constant check.
    let first = values[0];
    if values.iter().all(|&v| v == first) {
        return Screening::ZeroVariance;
    }
    Screening::Usable
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::usable(&[1.0, 2.0, 3.0], Screening::Usable)]
    #[case::empty(&[], Screening::ExcessInvalid)]
    #[case::all_nan(&[f64::NAN, f64::NAN], Screening::ExcessInvalid)]
    #[case::constant(&[2.0, 2.0, 2.0], Screening::ZeroVariance)]
    #[case::single(&[2.0], Screening::ZeroVariance)]
    #[case::constant_with_nan(&[2.0, f64::NAN, 2.0], Screening::Usable)]
    #[case::some_inf(&[1.0, f64::INFINITY, 3.0], Screening::Usable)]
    fn test_screen(#[case] values: &[f64], #[case] expected: Screening) {
        assert_eq!(screen(values), expected);
    }

    #[test]
    fn test_invalid_ratio_boundary() {
        // 9 of 10 invalid: rejected
        let mut values = vec![f64::NAN; 9];
        values.push(1.0);
        assert_eq!(screen(&values), Screening::ExcessInvalid);

        // 8 of 10 invalid: kept
        let mut values = vec![f64::NEG_INFINITY; 8];
        values.extend([1.0, 2.0]);
        assert_eq!(screen(&values), Screening::Usable);
    }
}
