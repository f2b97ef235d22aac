//! Sprite handles and the coordinator-owned properties behind them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use glimmer_core::{check_transition, GlimmerError, GlimmerResult, LifecyclePhase};

use crate::coordinator::Coordinator;
use crate::view::{SpriteView, SwatchView};

/// Generational key of a sprite inside its coordinator.
///
/// Slots of removed sprites are handed to new sprites; the generation tells a
/// stale key apart from the slot's current occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId {
    slot: usize,
    generation: u32,
}

impl SpriteId {
    pub(crate) fn new(slot: usize, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub fn slot(self) -> usize {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// One-shot user callback run with the sprite's swatch.
pub type SpriteCallback = Box<dyn FnOnce(&mut SpriteView<'_>) -> GlimmerResult<()>>;

/// The callback slots, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Enter,
    Update,
    Exit,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallbackKind::Enter => "enter",
            CallbackKind::Update => "update",
            CallbackKind::Exit => "exit",
        })
    }
}

/// Status shared between a handle and its properties, readable without
/// borrowing the coordinator.
#[derive(Debug)]
pub struct SpriteStatus {
    phase: Cell<LifecyclePhase>,
    index: Cell<Option<usize>>,
    abandoned: Cell<bool>,
}

impl SpriteStatus {
    fn new() -> Self {
        Self {
            phase: Cell::new(LifecyclePhase::Created),
            index: Cell::new(None),
            abandoned: Cell::new(false),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase.get()
    }

    pub fn index(&self) -> Option<usize> {
        self.index.get()
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.get()
    }
}

/// Internal per-sprite state. Owned by the coordinator.
pub struct SpriteProperties {
    pub(crate) status: Rc<SpriteStatus>,
    pub(crate) view: Option<SwatchView>,
    enter: Option<SpriteCallback>,
    update: Option<SpriteCallback>,
    exit: Option<SpriteCallback>,
    pub(crate) to_be_removed: bool,
}

impl SpriteProperties {
    pub(crate) fn new() -> Self {
        Self {
            status: Rc::new(SpriteStatus::new()),
            view: None,
            enter: None,
            update: None,
            exit: None,
            to_be_removed: false,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.status.phase()
    }

    pub fn index(&self) -> Option<usize> {
        self.status.index()
    }

    pub fn is_abandoned(&self) -> bool {
        self.status.is_abandoned()
    }

    pub fn to_be_removed(&self) -> bool {
        self.to_be_removed
    }

    /// Move to `phase`, failing on any transition outside the lifecycle table.
    pub(crate) fn set_phase(&mut self, phase: LifecyclePhase) -> GlimmerResult<()> {
        check_transition(self.phase(), phase)?;
        self.status.phase.set(phase);
        Ok(())
    }

    pub(crate) fn set_index(&mut self, index: Option<usize>) {
        self.status.index.set(index);
    }

    pub(crate) fn mark_abandoned(&mut self) {
        self.status.abandoned.set(true);
    }

    pub fn has_callback(&self) -> bool {
        self.enter.is_some() || self.update.is_some() || self.exit.is_some()
    }

    /// Store a callback, replacing any pending one of the same kind.
    pub(crate) fn set_callback(&mut self, kind: CallbackKind, callback: SpriteCallback) {
        let slot = match kind {
            CallbackKind::Enter => &mut self.enter,
            CallbackKind::Update => &mut self.update,
            CallbackKind::Exit => &mut self.exit,
        };
        *slot = Some(callback);
    }

    /// Consume the earliest pending callback: enter, then update, then exit.
    pub(crate) fn take_next_callback(&mut self) -> Option<(CallbackKind, SpriteCallback)> {
        if let Some(callback) = self.enter.take() {
            return Some((CallbackKind::Enter, callback));
        }
        if let Some(callback) = self.update.take() {
            return Some((CallbackKind::Update, callback));
        }
        self.exit.take().map(|callback| (CallbackKind::Exit, callback))
    }

    pub(crate) fn clear_callbacks(&mut self) {
        self.enter = None;
        self.update = None;
        self.exit = None;
    }
}

impl fmt::Debug for SpriteProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteProperties")
            .field("phase", &self.phase())
            .field("index", &self.index())
            .field("view", &self.view)
            .field("has_callback", &self.has_callback())
            .field("to_be_removed", &self.to_be_removed)
            .finish()
    }
}

/// Public handle to a sprite.
///
/// Builder methods register a one-shot callback that runs on a later scene
/// tick with access to the sprite's attributes:
///
/// ```ignore
/// scene.create_sprite()?
///     .enter(|s| {
///         s.set_position_world((0.0, 0.0))?;
///         s.set_transition_time_ms(500.0)
///     })?
///     .exit(|s| s.set_transition_time_ms(250.0))?;
/// ```
#[derive(Clone)]
pub struct Sprite {
    pub(crate) id: SpriteId,
    pub(crate) status: Rc<SpriteStatus>,
    pub(crate) coordinator: Rc<RefCell<Coordinator>>,
}

impl Sprite {
    pub fn id(&self) -> SpriteId {
        self.id
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.status.phase()
    }

    /// Swatch index, while the sprite holds one.
    pub fn index(&self) -> Option<usize> {
        self.status.index()
    }

    /// True once the sprite holds a swatch and until it is removed.
    pub fn is_active(&self) -> bool {
        self.phase().holds_swatch()
    }

    pub fn is_abandoned(&self) -> bool {
        self.status.is_abandoned()
    }

    pub fn is_removed(&self) -> bool {
        self.phase() == LifecyclePhase::Removed
    }

    pub fn enter<F>(&self, callback: F) -> GlimmerResult<&Self>
    where
        F: FnOnce(&mut SpriteView<'_>) -> GlimmerResult<()> + 'static,
    {
        self.register(CallbackKind::Enter, Box::new(callback))
    }

    pub fn update<F>(&self, callback: F) -> GlimmerResult<&Self>
    where
        F: FnOnce(&mut SpriteView<'_>) -> GlimmerResult<()> + 'static,
    {
        self.register(CallbackKind::Update, Box::new(callback))
    }

    /// Register the final callback. The sprite is removed once its exit
    /// transition has arrived; no further callbacks are accepted.
    pub fn exit<F>(&self, callback: F) -> GlimmerResult<&Self>
    where
        F: FnOnce(&mut SpriteView<'_>) -> GlimmerResult<()> + 'static,
    {
        self.register(CallbackKind::Exit, Box::new(callback))
    }

    /// Give up on a sprite still waiting for a swatch.
    pub fn abandon(&self) -> GlimmerResult<()> {
        self.borrow_coordinator()?.abandon_sprite(self.id)
    }

    /// Like [`Sprite::enter`], for callbacks already boxed by a host binding.
    pub fn set_callback(&self, kind: CallbackKind, callback: SpriteCallback) -> GlimmerResult<&Self> {
        self.register(kind, callback)
    }

    fn register(&self, kind: CallbackKind, callback: SpriteCallback) -> GlimmerResult<&Self> {
        self.borrow_coordinator()?
            .set_sprite_callback(self.id, kind, callback)?;
        Ok(self)
    }

    fn borrow_coordinator(&self) -> GlimmerResult<std::cell::RefMut<'_, Coordinator>> {
        self.coordinator
            .try_borrow_mut()
            .map_err(|_| GlimmerError::busy("sprites cannot be modified while the scene is ticking"))
    }
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("index", &self.index())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}
