//! Seams to the display server and the window manager, plus the geometry
//! primitives shared with them.

pub mod geometry;
pub mod headless;
pub mod output;
pub mod window_manager;
