//! # glimmer-core
//!
//! Core types and primitives for the Glimmer sprite engine.
//! This crate contains the leaf value types shared across all Glimmer crates:
//! numeric ranges, the sprite lifecycle table, swatch layout geometry, timing
//! sources, hit-test float packing, configuration and error types.

pub mod attributes;
pub mod config;
pub mod error;
pub mod packing;
pub mod phase;
pub mod range;
pub mod timing;

pub use config::*;

pub use attributes::{Attribute, AttributeLayout, ColorInput, Vec2Input};
pub use error::{GlimmerError, GlimmerResult};
pub use phase::{check_transition, LifecyclePhase};
pub use range::{IndexRange, NumericRange, TimeRange};
pub use timing::{FrameHandle, InstantTiming, ManualTiming, TimingSource};
