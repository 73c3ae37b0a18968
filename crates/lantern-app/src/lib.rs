//! Application framework for the Lantern renderer.
//!
//! This crate handles the boilerplate around a presentation target:
//! - Logging setup
//! - Window creation and the winit event loop
//! - GPU context and swapchain negotiation
//! - Swapchain recreation after resizes and out-of-date presentation
//!
//! # Example
//!
//! ```no_run
//! use lantern_app::{run_app, AppConfig, AppContext, LanternApp};
//!
//! struct MyApp;
//!
//! impl LanternApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::new("My App"))
//! }
//! ```

mod app;
mod context;
mod runner;

pub use app::LanternApp;
pub use context::AppContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use lantern_gpu::{GpuConfig, GpuContext, GpuError};
pub use winit::event::WindowEvent;
