//! Following one pipeline execution: classifying polled state, detecting
//! transitions and tailing build logs.

mod classifier;
mod clock;
mod cursor;
mod projects;
mod retry;
mod tracer;

pub use classifier::Strategy;
pub use clock::SystemClock;
pub use retry::RetryPolicy;
pub use tracer::{Outcome, Target, TraceSettings, Tracer};
