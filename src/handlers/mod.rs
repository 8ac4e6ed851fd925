// Handler modules
pub mod discover;
pub mod session;
pub mod status;

// Re-export all handler functions
pub use discover::{handle_components, handle_elect, handle_tenants};
pub use session::{Session, SessionOptions};
pub use status::{handle_status, handle_watch};
