//! Errors reported when a filter is constructed with unusable parameters.

use thiserror::Error;

/// An invalid filter configuration.
///
/// Filters never fail after construction: a full cuckoo or vacuum filter reports a failed
/// insertion through the `bool` returned by `insert`, and removing an absent item returns
/// `false`.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FilterError {
    /// A size parameter (bit count, bucket count, item count, ...) was zero.
    #[error("`{name}` must be greater than 0")]
    ZeroCapacity {
        /// Name of the offending parameter.
        name: &'static str,
    },

    /// The number of hash probes was zero.
    #[error("hasher count must be greater than 0")]
    ZeroHasherCount,

    /// The fingerprint width is not representable by the packed fingerprint storage.
    #[error("fingerprint bit count must be between 2 and 32, got {bit_count}")]
    InvalidFingerprintBitCount {
        /// Requested width in bits.
        bit_count: usize,
    },

    /// The target load factor is not in `(0, 1)`.
    #[error("load factor must be in (0, 1), got {load_factor}")]
    InvalidLoadFactor {
        /// Requested load factor.
        load_factor: f64,
    },

    /// The target false positive probability is not in `(0, 1)`.
    #[error("false positive probability must be in (0, 1), got {fpp}")]
    InvalidFpp {
        /// Requested false positive probability.
        fpp: f64,
    },
}

/// Result alias used by filter constructors.
pub type Result<T> = std::result::Result<T, FilterError>;

pub(crate) fn ensure_non_zero(value: usize, name: &'static str) -> Result<()> {
    if value == 0 {
        return Err(FilterError::ZeroCapacity { name });
    }
    Ok(())
}

pub(crate) fn ensure_fingerprint_bit_count(bit_count: usize) -> Result<()> {
    if bit_count < 2 || bit_count > 32 {
        return Err(FilterError::InvalidFingerprintBitCount { bit_count });
    }
    Ok(())
}

pub(crate) fn ensure_load_factor(load_factor: f64) -> Result<()> {
    if !(load_factor > 0.0 && load_factor < 1.0) {
        return Err(FilterError::InvalidLoadFactor { load_factor });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::FilterError;

    #[test]
    fn test_display() {
        assert_eq!(
            FilterError::ZeroCapacity { name: "bit_count" }.to_string(),
            "`bit_count` must be greater than 0",
        );
        assert_eq!(
            FilterError::InvalidLoadFactor { load_factor: 1.0 }.to_string(),
            "load factor must be in (0, 1), got 1",
        );
    }
}
