pub mod aggregation;
pub mod curtailment;
pub mod resolution;
pub mod selector;

pub use aggregation::*;
pub use curtailment::*;
pub use resolution::*;
pub use selector::*;
