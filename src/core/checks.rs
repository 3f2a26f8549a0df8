use crate::error::{Error, Result};
use ordered_float::NotNan;

/// Reject NaN and infinities; `what` names the argument in the error.
pub(crate) fn finite(value: f64, what: &str) -> Result<NotNan<f64>> {
    if !value.is_finite() {
        return Err(Error::InvalidValue(format!("{what} must be finite, got {value}")));
    }
    NotNan::new(value).map_err(|_| Error::InvalidValue(format!("{what} cannot be NaN")))
}

/// Finite and `>= 0`.
pub(crate) fn non_negative(value: f64, what: &str) -> Result<f64> {
    let v = finite(value, what)?.into_inner();
    if v < 0.0 {
        return Err(Error::InvalidValue(format!("{what} must be non-negative, got {value}")));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_and_positive() -> Result<()> {
        assert_eq!(non_negative(0.0, "mass")?, 0.0);
        assert_eq!(non_negative(2.5, "mass")?, 2.5);
        assert_eq!(finite(-3.0, "angle")?.into_inner(), -3.0);
        Ok(())
    }

    #[test]
    fn rejects_out_of_domain() {
        for bad in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = non_negative(bad, "inertia").unwrap_err();
            assert!(matches!(err, Error::InvalidValue(ref m) if m.starts_with("inertia")));
        }
        assert!(finite(f64::NAN, "dt").is_err());
    }
}
