//! Progress-callback trait for per-request pipeline events.
//!
//! Inject an [`Arc<dyn IdentifyProgressCallback>`] via
//! [`crate::config::IdentifyConfigBuilder::progress_callback`] to observe the
//! request state machine as it runs:
//!
//! ```text
//! Received → Acquiring → { Recognizing, Classifying } → Validating → Completed
//!     └──────────┴──────→ Failed
//! ```
//!
//! `Recognizing` and `Classifying` run on separate tasks, so their events may
//! arrive in either order and from different threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_vehicle_id::{IdentifyConfig, IdentifyProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl IdentifyProgressCallback for PrintStages {
//!     fn on_stage(&self, stage: Stage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = IdentifyConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::StageError;
use std::fmt;
use std::sync::Arc;

/// One state of the per-request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Acquiring,
    Recognizing,
    Classifying,
    Validating,
    Completed,
    /// Terminal error state. Reached from `Received` or `Acquiring`; later
    /// stages degrade instead, unless the plate worker itself crashes.
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Acquiring => "acquiring",
            Stage::Recognizing => "recognizing",
            Stage::Classifying => "classifying",
            Stage::Validating => "validating",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as a request moves through its stages.
///
/// Implementations must be `Send + Sync`. All methods default to no-ops.
pub trait IdentifyProgressCallback: Send + Sync {
    /// Called on every state transition, including the terminal one.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a branch falls back to its sentinel output.
    fn on_degraded(&self, error: &StageError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IdentifyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IdentifyConfig`].
pub type ProgressCallback = Arc<dyn IdentifyProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        degraded: Mutex<Vec<StageError>>,
    }

    impl IdentifyProgressCallback for Recorder {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_degraded(&self, error: &StageError) {
            self.degraded.lock().unwrap().push(error.clone());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::Received);
        cb.on_degraded(&StageError::Recognition {
            detail: "boom".into(),
        });
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_stage(Stage::Received);
        cb.on_stage(Stage::Acquiring);
        cb.on_degraded(&StageError::Classification {
            detail: "timeout".into(),
        });
        cb.on_stage(Stage::Completed);

        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![Stage::Received, Stage::Acquiring, Stage::Completed]
        );
        assert_eq!(rec.degraded.lock().unwrap().len(), 1);
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Completed.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Validating.is_terminal());
        assert_eq!(Stage::Classifying.to_string(), "classifying");
    }
}
