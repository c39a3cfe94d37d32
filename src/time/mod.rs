pub mod session;

pub use session::{next_session_boundary, SESSION_BOUNDARY_HOUR};
