use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use eframe::{egui, NativeOptions};
use log::{info, warn};

use crate::gui::ArborGui;
use crate::tree::layout::TreeType;
use crate::tree::Tree;
use crate::{export, io};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "arborview",
    about = "Interactive viewer for large hierarchical trees (phylogenies)."
)]
pub struct AppConfig {
    /// Tree file to load (Newick).
    #[arg(value_name = "TREE_FILE")]
    pub tree_path: Option<PathBuf>,

    /// Export the rendered tree as a PNG file.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Layout family to start with (rectangular, circular, radial, diagonal).
    #[arg(long, default_value = "radial")]
    pub tree_type: String,

    /// Canvas width in pixels.
    #[arg(long, default_value_t = 1100)]
    pub width: u32,

    /// Canvas height in pixels.
    #[arg(long, default_value_t = 760)]
    pub height: u32,

    /// Show leaf labels at startup.
    #[arg(long)]
    pub labels: bool,

    /// Run without launching the GUI; print a summary to stdout instead.
    #[arg(long)]
    pub headless: bool,
}

pub struct ArborApp;

impl ArborApp {
    pub fn run(config: &AppConfig) -> Result<()> {
        if config.headless {
            return Self::run_headless(config);
        }
        if !Self::display_available() {
            warn!("no display detected; falling back to headless mode.");
            return Self::run_headless(config);
        }

        let mut native_options = NativeOptions::default();
        native_options.viewport = egui::ViewportBuilder::default()
            .with_title("arborview")
            .with_inner_size(egui::vec2(config.width as f32, config.height as f32));
        info!(
            "launching viewer window ({}x{}).",
            config.width, config.height
        );

        let initial_config = config.clone();
        eframe::run_native(
            "arborview",
            native_options,
            Box::new(move |cc| Ok(Box::new(ArborGui::new(cc, initial_config)))),
        )
        .map_err(|err| anyhow!(err.to_string()))
    }

    fn display_available() -> bool {
        #[cfg(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd"
        ))]
        {
            std::env::var("DISPLAY").is_ok() || std::env::var("WAYLAND_DISPLAY").is_ok()
        }
        #[cfg(not(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd"
        )))]
        {
            true
        }
    }

    fn run_headless(config: &AppConfig) -> Result<()> {
        let tree_path = config
            .tree_path
            .as_ref()
            .ok_or_else(|| anyhow!("headless mode requires a TREE_FILE argument"))?;

        let mut tree = Tree::new();
        tree.tree_type = TreeType::from_name(&config.tree_type)?;
        tree.show_labels = config.labels;
        tree.set_size(config.width as f32, config.height as f32);

        io::load_tree_file(&mut tree, tree_path)?;

        println!(
            "loaded {} with {} leaves ({} nodes), layout {}.",
            tree_path.display(),
            tree.leaves.len(),
            tree.branches.len(),
            tree.tree_type.name()
        );

        if let Some(dest) = &config.output {
            export::write_png(&tree.scene, dest)?;
            info!("wrote {}", dest.display());
        }
        Ok(())
    }
}
