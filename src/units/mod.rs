//! Unit contracts and ready-made unit implementations.

mod service_fn;
mod unit;

pub use service_fn::ServiceFn;
pub use unit::{Checker, Config, Initializer, Namer, PreRunner, Service, Unit, UnitRef};
