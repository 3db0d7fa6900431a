mod demo;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ember_gpu::{GraphicsDevice, HeadlessDevice};
use ember_render_wgpu::WgpuDevice;
use ember_scene::{EngineConfig, Scene};
use ember_tools::SceneInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ember", about = "CLI tool for the ember engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and configuration
    Info,
    /// Build the demo scene and render frames without a window
    Demo {
        #[arg(short, long, value_enum, default_value_t = Backend::Headless)]
        backend: Backend,
        /// Cubes per side of the grid
        #[arg(short, long, default_value = "3")]
        grid: u32,
        /// Frames to render
        #[arg(short, long, default_value = "1")]
        frames: u32,
        /// JSON material library to use instead of the built-in palette
        #[arg(short, long)]
        materials: Option<PathBuf>,
    },
    /// Load a mesh file and print its geometry statistics
    InspectMesh {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Record device calls on the CPU
    Headless,
    /// Render into an offscreen wgpu texture
    Wgpu,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("ember v{}", env!("CARGO_PKG_VERSION"));
            println!("resource root: {}", config.resource_root.display());
            println!("shader extension: {}", config.shader_extension);
            println!("clear color: {:?}", config.renderer.clear_color);
            println!(
                "uniforms: view_projection={} material_index={}",
                config.renderer.view_projection_uniform, config.renderer.material_index_uniform
            );
        }
        Commands::Demo {
            backend,
            grid,
            frames,
            materials,
        } => {
            tracing::info!(?backend, grid, frames, "running demo scene");
            let mut device: Box<dyn GraphicsDevice> = match backend {
                Backend::Headless => Box::new(HeadlessDevice::new()),
                Backend::Wgpu => Box::new(
                    WgpuDevice::offscreen(1280, 720).context("creating offscreen wgpu device")?,
                ),
            };
            run_demo(config, device.as_mut(), grid, frames, materials)?;
        }
        Commands::InspectMesh { path } => {
            let mesh = ember_assets::load_obj(&path)
                .with_context(|| format!("loading mesh {}", path.display()))?;
            let (min, max) = mesh.vertices().iter().fold(
                (glam::Vec3::splat(f32::MAX), glam::Vec3::splat(f32::MIN)),
                |(min, max), v| {
                    let p = glam::Vec3::from(v.position);
                    (min.min(p), max.max(p))
                },
            );
            println!("Mesh: {}", mesh.name());
            println!("  vertices: {} ({} bytes)", mesh.vertex_count(), mesh.vertex_byte_size());
            println!("  indices:  {} ({} bytes)", mesh.index_count(), mesh.index_byte_size());
            println!("  indexed:  {}", mesh.is_indexed());
            if mesh.vertex_count() > 0 {
                println!("  bounds:   {min:.3} .. {max:.3}");
            }
        }
    }

    Ok(())
}

fn run_demo(
    config: EngineConfig,
    device: &mut dyn GraphicsDevice,
    grid: u32,
    frames: u32,
    materials: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut scene = Scene::new(config);
    ember_render_wgpu::register_builtin_shaders(scene.shaders_mut());
    demo::build(&mut scene, grid, materials.as_deref())?;

    scene.start(device)?;
    let dt = 1.0 / 60.0;
    for _ in 0..frames {
        scene.update(dt);
        scene.reload_if_stale(device)?;
        scene.render(device)?;
    }
    tracing::debug!(frames, entities = scene.entity_count(), "demo frames rendered");

    println!("{}", SceneInspector::summary(&scene));
    for context in SceneInspector::contexts(&scene) {
        println!("  {context}");
    }
    scene.stop(device);
    Ok(())
}
