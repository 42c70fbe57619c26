/// The two failure policies used at action call sites.
///
///   LogAndSwallow   — dialog-layer failures: log, then carry on as if nothing happened
///   SurfaceToState  — backend failures: render into the result slot, never propagate
use std::fmt::Display;

use crate::gateway::{GatewayError, Payload};

// ── Log-and-swallow ───────────────────────────────────────────────────────────

/// Recovers locally from an error the rest of the system must not see.
#[derive(Debug, Clone, Copy)]
pub struct LogAndSwallow {
    /// Short label for the log line, e.g. "file picker"
    pub context: &'static str,
}

impl LogAndSwallow {
    pub const fn new(context: &'static str) -> Self {
        Self { context }
    }

    /// `Ok(v)` passes through; `Err(e)` is logged at warn and becomes `None`.
    pub fn apply<T, E: Display>(&self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(context = self.context, error = %e, "recovered locally");
                None
            }
        }
    }
}

// ── Surface-to-state ──────────────────────────────────────────────────────────

/// Turns any backend outcome into display text for the result slot.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceToState {
    pub context: &'static str,
}

impl SurfaceToState {
    pub const fn new(context: &'static str) -> Self {
        Self { context }
    }

    pub fn apply(&self, result: Result<Payload, GatewayError>) -> Outcome {
        match result {
            Ok(payload) => Outcome::Success(payload.to_display()),
            Err(e) => {
                tracing::warn!(context = self.context, error = %e, "backend call failed");
                Outcome::Failure(e.to_display())
            }
        }
    }
}

/// Stringified outcome of a backend call, ready for the result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Success(s) | Outcome::Failure(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_and_swallow() {
        let policy = LogAndSwallow::new("test");
        assert_eq!(policy.apply::<_, String>(Ok(5)), Some(5));
        assert_eq!(policy.apply::<i32, _>(Err("dialog crashed")), None);
    }

    #[test]
    fn test_surface_success() {
        let policy = SurfaceToState::new("embed");
        let out = policy.apply(Ok(Payload::text("embedded:42")));
        assert_eq!(out, Outcome::Success("embedded:42".to_string()));
        assert!(!out.is_failure());
    }

    #[test]
    fn test_surface_failure() {
        let policy = SurfaceToState::new("embed");
        let out = policy.apply(Err(GatewayError::backend("no file path")));
        assert_eq!(out.text(), "\"no file path\"");
        assert!(out.is_failure());
    }
}
