//! Error types for primitive construction.
//!
//! Misuse at acquire/release time is deliberately unguarded (or made
//! unrepresentable by guard ownership); the only named error in the crate is
//! raised synchronously at construction.

/// Error returned when a primitive is constructed with an invalid parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidConfiguration {
    /// A semaphore was constructed with zero permits.
    #[error("max permits must be a positive integer, got 0")]
    ZeroPermits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_parameter() {
        let err = InvalidConfiguration::ZeroPermits;
        assert!(err.to_string().contains("positive integer"));
        assert!(format!("{err:?}").contains("ZeroPermits"));
    }
}
