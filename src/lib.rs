//! Fixed-point BSP software renderer in the classic column/span style.
//!
//! The crate turns a validated level, a bank of indexed-colour resources
//! and a list of sprites into an 8-bit frame, deterministically:
//!
//! * [`math`]: 16.16 fixed point, binary angles and the trig tables.
//! * [`world`]: level geometry, validation, BSP walking and resources.
//! * [`renderer`]: the [`renderer::Renderer`] trait and the software
//!   back-end.
//! * [`config`]: [`config::RenderConfig`].

pub mod config;
pub mod math;
pub mod renderer;
pub mod world;
