pub mod script;
pub mod traits;

pub use script::ScriptedExecutor;
pub use traits::{StepContext, StepExecutor};
