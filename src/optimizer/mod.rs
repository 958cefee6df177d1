pub mod constraints;
pub mod dispatch;
pub mod economic;
pub mod imbalance;
pub mod model;
pub mod rule_based;
pub mod scheduler;
pub mod solver;
pub mod validator;

pub use dispatch::*;
pub use economic::*;
pub use imbalance::*;
pub use model::*;
pub use rule_based::*;
pub use scheduler::*;
pub use solver::*;
pub use validator::*;
