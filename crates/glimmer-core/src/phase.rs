use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GlimmerError, GlimmerResult};

/// Lifecycle phase of a sprite, ordered by typical flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Constructed, no swatch assigned yet (possibly waiting for capacity).
    Created,
    /// Holds a swatch and has nothing pending.
    Rest,
    /// At least one enter/update/exit callback is waiting to run.
    HasCallback,
    /// A callback set a future arrival time; the GPU must capture the in-flight value first.
    NeedsRebase,
    /// CPU-side values changed and must be flashed to the target texture.
    NeedsTextureSync,
    /// Terminal. The swatch has been returned to the free pool.
    Removed,
}

impl LifecyclePhase {
    pub const COUNT: usize = 6;

    pub const ALL: [LifecyclePhase; Self::COUNT] = [
        LifecyclePhase::Created,
        LifecyclePhase::Rest,
        LifecyclePhase::HasCallback,
        LifecyclePhase::NeedsRebase,
        LifecyclePhase::NeedsTextureSync,
        LifecyclePhase::Removed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            LifecyclePhase::Created => "created",
            LifecyclePhase::Rest => "rest",
            LifecyclePhase::HasCallback => "has_callback",
            LifecyclePhase::NeedsRebase => "needs_rebase",
            LifecyclePhase::NeedsTextureSync => "needs_texture_sync",
            LifecyclePhase::Removed => "removed",
        }
    }

    /// Whether a sprite in this phase owns a swatch.
    pub fn holds_swatch(self) -> bool {
        !matches!(self, LifecyclePhase::Created | LifecyclePhase::Removed)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every legal `(from, to)` pair.
const TRANSITIONS: [(LifecyclePhase, LifecyclePhase); 10] = [
    (LifecyclePhase::Created, LifecyclePhase::Rest),
    (LifecyclePhase::Created, LifecyclePhase::Removed),
    (LifecyclePhase::Rest, LifecyclePhase::HasCallback),
    (LifecyclePhase::Rest, LifecyclePhase::NeedsTextureSync),
    (LifecyclePhase::HasCallback, LifecyclePhase::NeedsRebase),
    (LifecyclePhase::HasCallback, LifecyclePhase::NeedsTextureSync),
    (LifecyclePhase::NeedsRebase, LifecyclePhase::NeedsTextureSync),
    (LifecyclePhase::NeedsTextureSync, LifecyclePhase::Rest),
    (LifecyclePhase::NeedsTextureSync, LifecyclePhase::HasCallback),
    (LifecyclePhase::NeedsTextureSync, LifecyclePhase::Removed),
];

const fn transition_bit(from: LifecyclePhase, to: LifecyclePhase) -> u64 {
    1u64 << (from as usize * LifecyclePhase::COUNT + to as usize)
}

const fn build_transition_mask() -> u64 {
    let mut mask = 0u64;
    let mut i = 0;
    while i < TRANSITIONS.len() {
        mask |= transition_bit(TRANSITIONS[i].0, TRANSITIONS[i].1);
        i += 1;
    }
    mask
}

const TRANSITION_MASK: u64 = build_transition_mask();

/// True if moving from `from` to `to` is permitted.
pub fn is_legal_transition(from: LifecyclePhase, to: LifecyclePhase) -> bool {
    TRANSITION_MASK & transition_bit(from, to) != 0
}

/// Fail with an internal error unless `from -> to` is a legal transition.
pub fn check_transition(from: LifecyclePhase, to: LifecyclePhase) -> GlimmerResult<()> {
    if is_legal_transition(from, to) {
        Ok(())
    } else {
        Err(GlimmerError::internal(format!(
            "illegal lifecycle transition {} -> {}",
            from, to
        )))
    }
}
