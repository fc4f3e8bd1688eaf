//! Interactive viewer for large hierarchical trees (e.g. phylogenies).
//!
//! The engine lives in [`tree`]: a node arena with a viewport transform,
//! pluggable layout strategies and a retained scene graph. [`parser`]
//! holds the text-format collaborators, [`export`] the raster exporter,
//! and [`gui`]/[`app`] the eframe shell around it all.

pub mod app;
pub mod export;
pub mod gui;
pub mod io;
pub mod parser;
pub mod tree;
