//! Conditional-inclusion stack for `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`
//! (spec §4.3).

/// One frame per open `#if` chain. `taken` records whether any arm of the
/// chain so far has been included, so a later `#elif`/`#else` can tell
/// whether it is even allowed to evaluate its condition.
pub struct CondFrame {
    pub taken: bool,
    pub in_else: bool,
    /// Whether this frame's body is currently active (its own condition, and
    /// every enclosing frame, are all true).
    pub active: bool,
    /// Whether every enclosing frame is active; `active` combines this with
    /// the frame's own condition.
    pub parent_active: bool,
}

#[derive(Default)]
pub struct CondStack {
    frames: Vec<CondFrame>,
}

impl CondStack {
    pub fn new() -> Self {
        CondStack::default()
    }

    /// Whether tokens at the current nesting level should be emitted.
    pub fn is_active(&self) -> bool {
        self.frames.last().map(|f| f.active).unwrap_or(true)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the chain enclosing the current (innermost) `#if` frame is
    /// itself active. `#elif`/`#else` must not evaluate their condition (nor
    /// report errors folding it) when this is false — the whole chain is
    /// already dead.
    pub fn parent_active(&self) -> bool {
        self.frames.last().map(|f| f.parent_active).unwrap_or(true)
    }

    /// Whether some earlier arm of the current `#if` chain has already been
    /// taken, meaning a following `#elif`'s condition need not be evaluated.
    pub fn current_taken(&self) -> bool {
        self.frames.last().map(|f| f.taken).unwrap_or(false)
    }

    pub fn push_if(&mut self, condition_true: bool) {
        let parent_active = self.is_active();
        let active = parent_active && condition_true;
        self.frames.push(CondFrame {
            taken: condition_true,
            in_else: false,
            active,
            parent_active,
        });
    }

    pub fn push_skipped(&mut self) {
        self.frames.push(CondFrame {
            taken: true,
            in_else: false,
            active: false,
            parent_active: false,
        });
    }

    pub fn elif(&mut self, condition_true: bool) -> Result<(), &'static str> {
        let frame = self.frames.last_mut().ok_or("#elif without #if")?;
        if frame.in_else {
            return Err("#elif after #else");
        }
        if frame.taken {
            frame.active = false;
        } else {
            frame.active = frame.parent_active && condition_true;
            frame.taken = frame.active;
        }
        Ok(())
    }

    pub fn else_(&mut self) -> Result<(), &'static str> {
        let frame = self.frames.last_mut().ok_or("#else without #if")?;
        if frame.in_else {
            return Err("duplicate #else");
        }
        frame.in_else = true;
        frame.active = frame.parent_active && !frame.taken;
        frame.taken = true;
        Ok(())
    }

    pub fn endif(&mut self) -> Result<(), &'static str> {
        if self.frames.pop().is_none() {
            return Err("#endif without #if");
        }
        Ok(())
    }

    pub fn unterminated(&self) -> bool {
        !self.frames.is_empty()
    }
}
