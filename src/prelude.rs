pub use crate::metrics::{LoadTestResult, RequestStats};
pub use crate::session::{Header, RequestDefinition, SessionConfig};
pub use crate::summary::SummaryMetrics;
pub use crate::{KaskadeError, LoadTest};
