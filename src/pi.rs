pub mod engine;
pub mod error;
pub mod lower;
pub mod names;
pub mod parse;
pub mod show;
pub mod store;
pub mod subst;
pub mod sync;
pub mod term;

pub use engine::Interpreter;
pub use error::EngineError;
pub use lower::{lower, Lowered};
pub use parse::{parse_process, set_miette_hook};
