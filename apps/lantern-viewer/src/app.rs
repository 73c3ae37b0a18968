//! Viewer application.

use lantern_app::{AppContext, LanternApp};
use lantern_gpu::SwapchainConfig;
use tracing::info;

/// Reports the negotiated device and every swapchain rebuild.
pub struct Viewer {
    generation: u64,
    rebuilds: u64,
}

impl Viewer {
    fn report(ctx: &AppContext) {
        let Some(chain) = ctx.gpu.swapchain() else {
            return;
        };
        let SwapchainConfig {
            format,
            color_space,
            present_mode,
            extent,
            image_count,
        } = *chain.config();

        info!(
            "Swapchain {}x{}: {image_count} images, {format:?} / {color_space:?}, {present_mode:?}",
            extent.width, extent.height
        );
    }
}

impl LanternApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let gpu = &ctx.gpu;
        info!(
            "Device: {} (graphics family {}, present family {})",
            gpu.device_name(),
            gpu.graphics_queue_family(),
            gpu.present_queue_family()
        );
        Self::report(ctx);

        Ok(Self {
            generation: gpu.swapchain_generation(),
            rebuilds: 0,
        })
    }

    fn on_swapchain_recreated(&mut self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let generation = ctx.gpu.swapchain_generation();
        if generation != self.generation {
            self.generation = generation;
            self.rebuilds += 1;
            Self::report(ctx);
        }
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut AppContext) {
        info!("Swapchain rebuilt {} time(s)", self.rebuilds);
    }
}
