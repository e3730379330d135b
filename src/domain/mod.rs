pub mod curtailment;
pub mod forecast;
pub mod generation;
pub mod query;
pub mod site;

pub use curtailment::*;
pub use forecast::*;
pub use generation::*;
pub use query::*;
pub use site::*;
