//! # soc-autonomy
//!
//! Safety controls that gate how much autonomous action the platform
//! is allowed to take: false-positive auto-closure evaluation, concept
//! drift detection, and canary rollout of autonomy itself.
//!
//! ```no_run
//! use soc_autonomy::fp_eval::{AutonomyGuard, FPEvaluationResult};
//!
//! let mut evaluation = FPEvaluationResult::new("login_brute_force");
//! evaluation.true_positives = 90;
//! evaluation.false_positives = 10;
//! evaluation.compute_metrics();
//!
//! let guard = AutonomyGuard::new();
//! if guard.should_reduce_autonomy(&evaluation) {
//!     let _raised = guard.get_adjusted_threshold(0.90, &evaluation);
//! }
//! ```

pub mod canary;
pub mod drift;
pub mod fp_eval;

pub use canary::{
    AuditSink, CanaryConfig, CanaryDecision, CanaryEvaluator, CanaryRolloutManager, CanarySlice,
    CanaryStatus, FpEvaluationSource, KillSwitch,
};
pub use drift::{effective_threshold, DriftDetector, DriftSamplingCallback, DriftState, ThresholdAdjuster};
pub use fp_eval::{AutonomyGuard, Closure, DailyFNDetector, Escalation, FPEvaluationFramework, FPEvaluationResult, FlaggedClosure};
