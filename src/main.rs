//! Vista - headless runner for the model viewer pipeline
//!
//! Imports a scene exactly as the viewer would, uploads it through a
//! recording backend and prints what the frame loop would receive.

mod cli;
mod report;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;
use vista_assets::{Model, TextureLoader};
use vista_render::{HeadlessBackend, PackedMesh};

use crate::cli::CliArgs;
use crate::report::ModelReport;
use crate::settings::ViewerSettings;

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let (mut settings, origin) = ViewerSettings::load();
    args.apply(&mut settings);

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.logging.max_level())
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;
    origin.log();

    if args.save_settings {
        let path = settings.save().context("Failed to save settings")?;
        info!("Settings written to {}", path.display());
    }

    let (root_dir, file) = args.scene_location();
    let mut backend = HeadlessBackend::new();
    let mut loader = TextureLoader::with_config(&settings.textures);
    let mut model = Model::new();

    model
        .load(&mut loader, &mut backend, &root_dir, &file, &settings.import)
        .with_context(|| format!("Failed to load {}", args.model.display()))?;

    let render = model.upload(&mut backend);

    // light gizmo drawn by the viewer for every point light
    let gizmo = PackedMesh::sphere(0.1, 16, 32);
    gizmo.upload(&mut backend);
    debug!("Light gizmo: {} triangles", gizmo.triangle_count());

    let report = ModelReport::new(&model, &render, &backend);
    model.destroy_cpu_side_buffers();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    model.destroy(&mut backend);
    info!("Released {} textures", backend.deleted_textures.len());
    Ok(())
}
