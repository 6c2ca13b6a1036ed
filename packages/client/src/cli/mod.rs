//! Terminal chat client built on the sync driver.

mod formatter;
mod session;
mod ui;

pub use formatter::MessageFormatter;
pub use session::run_client_session;
