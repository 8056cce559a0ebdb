pub mod builtin;
pub mod callback;
pub mod convergence;
pub mod handler_group;

pub use builtin::ModuleRegistry;
pub use callback::{CallbackMember, Completion};
pub use convergence::{process1, process_async, Engine, Input};
pub use handler_group::{HandlerGroup, Member};
