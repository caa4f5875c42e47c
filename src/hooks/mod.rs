// Hook Registry and Human-in-the-Loop Suspension (spec §4.2).

pub mod definition;
pub mod registry;

pub use definition::{HookInstance, HookOptions, HookOutcome, HookStatus};
pub use registry::HookRegistry;
