//! The submit/observe pipeline: dispatcher, result channel, and job table.

pub mod channel;
pub mod dispatcher;
pub mod table;

pub use channel::{AwaitOutcome, PendingDelivery, PostOutcome, ResultChannel};
pub use dispatcher::{JobDispatcher, Submission};
pub use table::{JobEntry, JobTable};
