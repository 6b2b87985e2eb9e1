pub mod logistic;
pub mod parameters;
pub mod propagate;
pub mod tagger;
pub mod types;

pub use logistic::*;
pub use parameters::*;
pub use propagate::*;
pub use tagger::*;
pub use types::*;
