//! # glimmer-engine
//!
//! Incremental lifecycle and synchronization engine for GPU-resident sprites.
//!
//! Sprites are created through a [`Scene`], receive one-shot callbacks that
//! set their target attributes, and are then carried through the lifecycle
//! (`Created -> Rest -> HasCallback -> NeedsRebase -> NeedsTextureSync -> ...`)
//! by small task functions run under a per-frame time budget. Each task only
//! visits the index range of sprites that may need it.

pub mod coordinator;
pub mod gpu;
pub mod scene;
pub mod scheduler;
pub mod sprite;
pub mod tasks;
pub mod view;

pub use coordinator::{Coordinator, SceneStats, TaskRuns};
pub use gpu::{GpuBackend, GpuCall, GpuLog, HitTestUniforms, NullBackend, RecordingBackend};
pub use scene::{HitTestParams, Scene};
pub use scheduler::{Budget, TaskId, WorkScheduler, WorkTask};
pub use sprite::{CallbackKind, Sprite, SpriteCallback, SpriteId};
pub use tasks::{HitTestArea, HitTestResult};
pub use view::SpriteView;
