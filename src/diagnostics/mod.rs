pub mod dev_logging;
pub mod display;
pub mod errors;
pub mod warnings;

pub use display::{print_compiler_messages, print_error, print_warning};
pub use errors::{CompileError, CompilerMessages, ErrorKind, SourceLoc};
pub use warnings::CompilerWarning;
