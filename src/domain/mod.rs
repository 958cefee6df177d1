pub mod battery;
pub mod scenario;
pub mod schedule;
pub mod types;

pub use battery::*;
pub use scenario::*;
pub use schedule::*;
pub use types::*;
