//! Feature-gated tracing macros, one per pipeline stage.
//!
//! Mirrors the teacher's `compiler_dev_logging.rs`: each macro wraps
//! `saying::say!` behind its own Cargo feature and expands to nothing when
//! the feature is off, so none of this costs anything in a normal build.

#[macro_export]
#[cfg(feature = "show_tokens")]
macro_rules! token_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_tokens"))]
macro_rules! token_log {
    ($($arg:tt)*) => {};
}

#[macro_export]
#[cfg(feature = "show_pp")]
macro_rules! pp_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_pp"))]
macro_rules! pp_log {
    ($($arg:tt)*) => {};
}

#[macro_export]
#[cfg(feature = "show_ast")]
macro_rules! parse_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_ast"))]
macro_rules! parse_log {
    ($($arg:tt)*) => {};
}

#[macro_export]
#[cfg(feature = "show_ir")]
macro_rules! ir_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_ir"))]
macro_rules! ir_log {
    ($($arg:tt)*) => {};
}

#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        saying::say!($msg, Green { format!("{:?}", $time.elapsed()) });
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {};
}
