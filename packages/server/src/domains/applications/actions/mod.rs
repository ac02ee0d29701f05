pub mod decisions;
pub mod recovery;
pub mod stage;
pub mod sweeps;

pub use decisions::{apply_decision, DecisionInput};
pub use recovery::{recover, retry_dead_job};
pub use sweeps::{run_eligibility_sweep, run_stuck_sweep, EligibilityReport, StuckReport};
