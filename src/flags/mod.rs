//! Flag set abstraction: named option groups merged into one process-wide
//! command line with a first-registration-wins duplicate policy.

mod merged;
mod set;

pub(crate) use merged::{scan_name, MergedFlags};
pub use set::{FlagSet, Var};
