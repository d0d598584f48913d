pub mod job;
pub mod loaders;
pub mod outcome;
pub mod strategy;
pub mod surface;

pub use job::{FieldValue, Job, JobStatus, TargetRef};
pub use loaders::{load_workflow_file, WorkflowFile};
pub use outcome::{Outcome, OutcomeStatus, RunReport};
pub use strategy::Strategy;
pub use surface::{ControlKind, FieldSpec, FormSpec, LoginSpec, NavigationSpec};
