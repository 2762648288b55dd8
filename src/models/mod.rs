pub mod anomaly;
pub mod execution;
pub mod record;
pub mod recommendation;
pub mod root_cause;

pub use anomaly::*;
pub use execution::*;
pub use record::*;
pub use recommendation::*;
pub use root_cause::*;
