// Delta accumulation: frame[i] = frame[i-1] + delta[i] (mod 256).
//
// Archives store deltas computed with wrapping subtraction, so the addition
// must wrap too; saturating or widening would corrupt every later frame.

/// A delta buffer whose length differs from the frame it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("frame length mismatch: previous frame is {expected} bytes, delta is {actual} bytes")]
pub struct LengthMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Add `delta` to `prev` byte-wise with 8-bit wraparound, producing a new
/// buffer.
pub fn accumulate(prev: &[u8], delta: &[u8]) -> Result<Vec<u8>, LengthMismatch> {
    let mut out = delta.to_vec();
    add_into(prev, &mut out)?;
    Ok(out)
}

/// `delta[i] = prev[i] + delta[i] (mod 256)`, in place on `delta`.
fn add_into(prev: &[u8], delta: &mut [u8]) -> Result<(), LengthMismatch> {
    if prev.len() != delta.len() {
        return Err(LengthMismatch {
            expected: prev.len(),
            actual: delta.len(),
        });
    }
    for (d, &p) in delta.iter_mut().zip(prev) {
        *d = p.wrapping_add(*d);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FrameAccumulator
// ---------------------------------------------------------------------------

/// Holds the most recently reconstructed frame and applies deltas to it.
///
/// Each applied delta becomes the new current frame; the old one is dropped.
/// The delta's allocation is reused, so applying a delta never allocates.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    current: Vec<u8>,
    applied: u64,
}

impl FrameAccumulator {
    /// Start from a fully reconstructed base frame.
    pub fn new(base: Vec<u8>) -> Self {
        Self {
            current: base,
            applied: 0,
        }
    }

    /// Combine `delta` with the current frame and make the result current.
    pub fn apply(&mut self, mut delta: Vec<u8>) -> Result<&[u8], LengthMismatch> {
        add_into(&self.current, &mut delta)?;
        self.current = delta;
        self.applied += 1;
        Ok(&self.current)
    }

    /// The most recently reconstructed frame.
    #[inline]
    pub fn current(&self) -> &[u8] {
        &self.current
    }

    /// Number of deltas applied since the base frame.
    #[inline]
    pub fn deltas_applied(&self) -> u64 {
        self.applied
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.current
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
