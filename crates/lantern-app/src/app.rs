//! `LanternApp` trait definition.

use crate::context::AppContext;
use winit::event::WindowEvent;

/// Trait for Lantern applications.
///
/// The framework creates the window, negotiates the GPU and swapchain, and
/// rebuilds the swapchain whenever it goes stale. Applications hook into
/// the frame loop and into swapchain recreation.
pub trait LanternApp: Sized {
    /// Initialize the application.
    ///
    /// Called once, after the window, GPU context and first swapchain exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// # Arguments
    /// * `ctx` - Application context with GPU and window access
    /// * `dt` - Delta time in seconds since last frame
    #[allow(unused_variables)]
    fn update(&mut self, ctx: &AppContext, dt: f32) {}

    /// Render a frame.
    ///
    /// Only called while the swapchain is active. Presentation errors that
    /// are recoverable (out of date, surface lost) may be returned as-is;
    /// the framework rebuilds the swapchain before the next frame.
    #[allow(unused_variables)]
    fn render(&mut self, ctx: &mut AppContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the swapchain was rebuilt.
    ///
    /// Images and extent from the previous swapchain are no longer valid.
    #[allow(unused_variables)]
    fn on_swapchain_recreated(&mut self, ctx: &mut AppContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed
    /// further.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup resources before shutdown.
    ///
    /// The GPU is idle when this is called.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
