// Pipeline execution and monitoring module
// Runs accepted samples through window, filter, features, classifier and smoother

pub mod session;
pub mod trace;

pub use session::{RecordOutcome, RunError, SessionContext, SessionStats};
pub use trace::{read_trace_file, PredictionTrace, TraceError, TraceWriter};
