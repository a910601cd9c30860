//! Up-front validation of requested constraints against relay limits
//!
//! Advisory only: the relay enforces views and expiration once the note is
//! stored. Checking here just avoids encrypting and uploading a payload the
//! relay is guaranteed to reject.

use ephem_core::{EphemError, EphemResult, ServerStatus, ShareConstraints};

/// Validate the requested share constraints and payload size before any
/// encryption work runs.
pub fn check_constraints(
    requested: &ShareConstraints,
    payload_bytes: u64,
    limits: &ServerStatus,
) -> EphemResult<()> {
    if let Some(views) = requested.views {
        if views == 0 {
            return Err(EphemError::Constraint("views must be at least 1".into()));
        }
        if views > limits.max_views {
            return Err(EphemError::Constraint(format!(
                "requested {views} views, server allows at most {}",
                limits.max_views
            )));
        }
    }

    if let Some(minutes) = requested.expire_minutes {
        if minutes == 0 {
            return Err(EphemError::Constraint(
                "expiration must be at least 1 minute".into(),
            ));
        }
        if minutes > limits.max_expiration {
            return Err(EphemError::Constraint(format!(
                "requested {minutes} minute expiration, server allows at most {}",
                limits.max_expiration
            )));
        }
    }

    if payload_bytes > limits.max_size {
        return Err(EphemError::Constraint(format!(
            "payload is {payload_bytes} bytes, server accepts at most {}",
            limits.max_size
        )));
    }

    Ok(())
}
