//! Command execution for chatgate.
//!
//! Two families of commands run here. Dynamic commands come from a closed
//! catalog, accept user arguments, and are confined to a sandbox root.
//! Static commands are fixed executables with fixed arguments. Both report
//! through the same [`chatgate_commons::CommandResponse`] shape.

pub mod cwd;
pub mod dynamic;
pub mod executor;
pub mod process_group;
pub mod runner;
pub mod sandbox;
pub mod static_exec;

pub use cwd::WorkingDirectoryStore;
pub use dynamic::{DispatchError, DispatchSettings, DynamicCommand, DynamicCommandDispatcher};
pub use executor::{Executor, LocalExecutor};
pub use runner::{ProcessOptions, TRUNCATION_MARKER, run_process};
pub use sandbox::{PathSandbox, SandboxError};
pub use static_exec::StaticCommandExecutor;
