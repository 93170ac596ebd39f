pub use attenda_types::error::{AtResult, Error};
pub use attenda_types::types::{EmployeeId, Timestamp};

pub use tracing::{debug, error, info, warn};

// vim: ts=4
