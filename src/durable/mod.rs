// Durable Step Wrapper and Runtime Detector (spec §4.3, §4.4).

pub mod retry;
pub mod runtime;
pub mod step_wrapper;
pub mod timeout;

pub use retry::RetryPolicy;
pub use runtime::{NoopRuntime, Runtime, RuntimeDetector};
pub use step_wrapper::{run_step, Scheduling, StepConfig};
pub use timeout::TimeoutConfig;
