//! Lantern viewer.
//!
//! Opens a window, negotiates a GPU and swapchain for it, logs what was
//! chosen and keeps the swapchain current while the window is resized or
//! minimized.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p lantern-viewer -- --present-mode fifo --no-validation
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use ash::vk;
use clap::{Parser, ValueEnum};
use lantern_app::{run_app, AppConfig};
use lantern_gpu::GpuConfig;

use crate::app::Viewer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Initial window width
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Window title
    #[arg(long, default_value = "Lantern Viewer")]
    title: String,

    /// Force the Khronos validation layer on
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,

    /// Force the Khronos validation layer off
    #[arg(long)]
    no_validation: bool,

    /// Preferred present mode; FIFO is used when unavailable
    #[arg(long, value_enum, default_value_t = PresentMode::Mailbox)]
    present_mode: PresentMode,

    /// Do not hand the retired swapchain to the driver on recreation
    #[arg(long)]
    no_retire: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PresentMode {
    Immediate,
    Fifo,
    FifoRelaxed,
    Mailbox,
}

impl From<PresentMode> for vk::PresentModeKHR {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Immediate => Self::IMMEDIATE,
            PresentMode::Fifo => Self::FIFO,
            PresentMode::FifoRelaxed => Self::FIFO_RELAXED,
            PresentMode::Mailbox => Self::MAILBOX,
        }
    }
}

impl Args {
    fn gpu_config(&self) -> GpuConfig {
        let validation = if self.validation {
            true
        } else if self.no_validation {
            false
        } else {
            cfg!(debug_assertions)
        };

        GpuConfig::new()
            .with_app_name(&self.title)
            .with_validation(validation)
            .with_present_mode(self.present_mode.into())
            .with_retired_swapchain_reuse(!self.no_retire)
    }

    fn app_config(&self) -> AppConfig {
        AppConfig::new(&self.title)
            .with_size(self.width, self.height)
            .with_gpu_config(self.gpu_config())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run_app::<Viewer>(args.app_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prefer_mailbox_and_reuse() {
        let args = Args::parse_from(["lantern-viewer"]);
        let config = args.gpu_config();

        assert_eq!(config.preferred_present_mode, vk::PresentModeKHR::MAILBOX);
        assert!(config.reuse_retired_swapchain);
        assert_eq!(config.enable_validation, cfg!(debug_assertions));
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Args::parse_from([
            "lantern-viewer",
            "--width",
            "1024",
            "--height",
            "768",
            "--no-validation",
            "--present-mode",
            "fifo-relaxed",
            "--no-retire",
        ]);
        let config = args.app_config();

        assert_eq!((config.width, config.height), (1024, 768));
        assert!(!config.gpu.enable_validation);
        assert_eq!(
            config.gpu.preferred_present_mode,
            vk::PresentModeKHR::FIFO_RELAXED
        );
        assert!(!config.gpu.reuse_retired_swapchain);
    }

    #[test]
    fn validation_flags_conflict() {
        let result = Args::try_parse_from(["lantern-viewer", "--validation", "--no-validation"]);
        assert!(result.is_err());
    }
}
