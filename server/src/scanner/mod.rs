pub mod debouncer;
pub mod display;
pub mod session;

pub use debouncer::{Admission, ScanDebouncer};
pub use display::{ConsoleDisplay, DenyReason, OperatorDisplay, ScanFeedback};
pub use session::ScanSession;
