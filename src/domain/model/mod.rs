pub mod state;
pub mod version;

pub use state::*;
pub use version::*;
