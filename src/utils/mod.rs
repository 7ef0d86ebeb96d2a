pub mod errors;
pub mod shutdown;
pub mod tracing;

pub use errors::{GateError, GateResult};
pub use self::tracing::init_tracing;
pub use shutdown::shutdown_signal;
