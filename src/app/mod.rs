//! Application-wide shared state

mod state;

pub use state::AppState;
