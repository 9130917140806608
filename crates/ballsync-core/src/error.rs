//! Error types for API misuse.
//!
//! Gameplay rejections (illegal kicks, stale snapshots, duplicate spawn
//! requests) are not errors: they degrade to "no effect this tick" and are
//! reported through [`crate::event::BallEvent`] instead. The variants here
//! cover calls that cannot be honoured at all.

use thiserror::Error;

use crate::ball::BallId;

/// Errors returned by [`crate::simulation::Simulation`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BallSyncError {
    /// The referenced ball is not registered on this host.
    #[error("ball {0} is not registered on this host")]
    UnknownBall(BallId),

    /// An authority-only operation was invoked on an observer.
    #[error("`{0}` may only be called on the authority")]
    NotAuthority(&'static str),

    /// A configuration value failed validation.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, BallSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = BallSyncError::UnknownBall(BallId::new(7));
        assert_eq!(err.to_string(), "ball 7 is not registered on this host");

        let err = BallSyncError::InvalidConfig {
            field: "fixed_timestep",
            reason: "must be positive",
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: fixed_timestep must be positive"
        );
    }
}
