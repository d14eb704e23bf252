use super::errors::SourceLoc;
use std::fmt;

/// A non-fatal diagnostic. Printed identically to an error but never aborts
/// compilation (spec §7: "Warnings print and continue.").
#[derive(Debug, Clone)]
pub struct CompilerWarning {
    pub msg: String,
    pub loc: SourceLoc,
}

impl CompilerWarning {
    pub fn new(msg: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            msg: msg.into(),
            loc,
        }
    }
}

impl fmt::Display for CompilerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {}\n --> {}", self.msg, self.loc)
    }
}
