use crate::transform::matrix::Matrix44;

/// Matrix stack used to compose per-part draw transforms during a frame.
///
/// The stack is an explicit value owned by whoever drives the frame; there is no shared global.
/// Every frame must start with [`TransformStack::reset`] followed by
/// [`TransformStack::load_identity`] before any [`TransformStack::mult_matrix`].
///
/// Nothing here fails: this type runs in the per-frame hot path and follows a no-throw rule.
/// Mismatched `pop` calls are absorbed at depth 0 (see [`TransformStack::pop`]).
#[derive(Clone, Debug, Default)]
pub struct TransformStack {
    slots: Vec<Matrix44>,
    depth: usize,
    current: Matrix44,
}

impl TransformStack {
    /// Create an empty stack whose current matrix is the identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every pushed matrix. Backing storage is retained for the next frame.
    pub fn reset(&mut self) {
        self.depth = 0;
    }

    /// Set the current matrix to the identity.
    pub fn load_identity(&mut self) {
        self.current = Matrix44::IDENTITY;
    }

    /// Save a copy of the current matrix.
    pub fn push(&mut self) {
        if self.depth < self.slots.len() {
            self.slots[self.depth] = self.current;
        } else {
            self.slots.push(self.current);
        }
        self.depth += 1;
    }

    /// Restore the most recently pushed matrix.
    ///
    /// Popping at depth 0 is a silent no-op. This leniency is kept for frame loops that mismatch
    /// push/pop on exceptional draw paths; it can mask caller bugs, so prefer balanced calls.
    pub fn pop(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        self.current = self.slots[self.depth];
    }

    /// `current = current × m`.
    pub fn mult_matrix(&mut self, m: &Matrix44) {
        self.current = self.current.multiply(m);
    }

    /// Current matrix, valid for this frame only. Copy it to keep it longer.
    pub fn matrix(&self) -> &Matrix44 {
        &self.current
    }

    /// Number of saved matrices.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/stack.rs"]
mod tests;
