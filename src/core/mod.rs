pub mod cleanup;
pub mod plan;
pub mod report;
pub mod sequence;

pub use crate::domain::model::{CommandOutcome, Invocation, StepReport, StepStatus};
pub use crate::domain::ports::CommandRunner;
pub use crate::utils::error::Result;
pub use plan::{ExecutionPlan, PlannedStep};
pub use report::RunReport;
pub use sequence::TaskSequence;
