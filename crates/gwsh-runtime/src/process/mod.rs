//! OS-level process plumbing: spawning, output draining and shutdown.

mod command;
pub mod shutdown;
mod stream;

pub(crate) use command::spawn_shell;
pub use shutdown::shutdown_child;
pub use stream::spawn_output_reader;
