use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use ember_assets::{
    MaterialId, MaterialProperties, MeshHandle, PhongProperties, UnlitProperties, primitives,
};
use ember_common::{EntityId, Transform};
use ember_render_wgpu::WgpuDevice;
use ember_scene::{
    CameraInput, EngineConfig, FlyCamera, NativeScript, Scene, ScriptContext,
};
use ember_tools::SceneInspector;
use glam::{Quat, Vec2, Vec3, Vec4};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "ember-sandbox", about = "Ember sandbox window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mesh file under the resource root's meshes/ directory to place at the origin
    #[arg(long)]
    mesh: Option<String>,
}

/// Rotates its entity around the Y axis.
struct Spinner {
    speed: f32,
}

impl NativeScript for Spinner {
    fn on_update(&mut self, ctx: &mut ScriptContext<'_>, dt: f32) {
        let mut transform = ctx.transform();
        transform.rotation = Quat::from_rotation_y(self.speed * dt) * transform.rotation;
        ctx.set_transform(transform);
    }
}

/// Application state.
struct AppState {
    scene: Scene,
    cube: MeshHandle,
    brass: MaterialId,
    spawned: Vec<EntityId>,
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    mouse_delta: Vec2,
    last_frame: Instant,
}

impl AppState {
    fn new(config: EngineConfig, mesh: Option<&str>) -> Result<Self> {
        let mut scene = Scene::new(config);
        ember_render_wgpu::register_builtin_shaders(scene.shaders_mut());

        let cube = scene.meshes_mut().insert(primitives::cube());
        let floor = scene.meshes_mut().insert(primitives::quad());
        let lit = scene.materials_mut().create_material(
            "brass",
            MaterialProperties::Phong(PhongProperties {
                diffuse: Vec3::new(0.78, 0.6, 0.25),
                ..PhongProperties::default()
            }),
        );
        let ground = scene.materials_mut().create_material(
            "ground",
            MaterialProperties::Unlit(UnlitProperties {
                color: Vec4::new(0.2, 0.22, 0.25, 1.0),
                ..UnlitProperties::default()
            }),
        );

        for i in 0..5 {
            let e = scene.create_entity(&format!("Cube_{i}"));
            scene.set_transform(
                e,
                Transform::from_position(Vec3::new(i as f32 * 3.0 - 6.0, 1.0, 0.0)),
            )?;
            scene.set_mesh(e, cube)?;
            scene.set_material(e, lit)?;
            if i % 2 == 0 {
                scene.add_script(e, move || Spinner {
                    speed: 0.5 + i as f32 * 0.25,
                })?;
            }
        }

        let ground_entity = scene.create_entity("Ground");
        scene.set_transform(
            ground_entity,
            Transform {
                rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
                scale: Vec3::splat(40.0),
                ..Transform::default()
            },
        )?;
        scene.set_mesh(ground_entity, floor)?;
        scene.set_material(ground_entity, ground)?;

        if let Some(filename) = mesh {
            let handle = scene
                .load_mesh(filename)
                .with_context(|| format!("loading mesh {filename}"))?;
            let e = scene.create_entity(filename);
            scene.set_mesh(e, handle)?;
            scene.set_material(e, lit)?;
        }

        scene.set_camera(FlyCamera::default());
        Ok(Self {
            scene,
            cube,
            brass: lit,
            spawned: Vec::new(),
            keys_held: HashSet::new(),
            mouse_captured: false,
            mouse_delta: Vec2::ZERO,
            last_frame: Instant::now(),
        })
    }

    fn camera_input(&mut self) -> CameraInput {
        let axis = |pos: KeyCode, neg: KeyCode| {
            f32::from(u8::from(self.keys_held.contains(&pos)))
                - f32::from(u8::from(self.keys_held.contains(&neg)))
        };
        let input = CameraInput {
            movement: Vec3::new(
                axis(KeyCode::KeyW, KeyCode::KeyS),
                axis(KeyCode::KeyD, KeyCode::KeyA),
                axis(KeyCode::Space, KeyCode::ControlLeft),
            ),
            look: self.mouse_delta,
            boost: self.keys_held.contains(&KeyCode::ShiftLeft),
        };
        self.mouse_delta = Vec2::ZERO;
        input
    }

    fn update(&mut self, dt: f32) {
        let input = self.camera_input();
        if let Some(camera) = self.scene.camera_mut() {
            camera.on_input(&input);
        }
        self.scene.update(dt);
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }

        if !pressed {
            return;
        }

        match key {
            KeyCode::KeyN => self.spawn_in_front(),
            KeyCode::Delete | KeyCode::Backspace => {
                if let Some(id) = self.spawned.pop() {
                    self.scene.destroy_entity(id);
                    tracing::info!(entity = %id, "deleted entity");
                }
            }
            KeyCode::F1 => {
                tracing::info!("{}", SceneInspector::summary(&self.scene));
                for context in SceneInspector::contexts(&self.scene) {
                    tracing::info!("  {context}");
                }
            }
            _ => {}
        }
    }

    fn spawn_in_front(&mut self) {
        let Some(camera) = self.scene.camera() else {
            return;
        };
        let world = camera.view().inverse();
        let eye = world.w_axis.truncate();
        let forward = -world.z_axis.truncate();
        let position = eye + forward * 5.0;

        let (cube, material) = (self.cube, self.brass);
        let id = self.scene.create_entity(&format!("Spawned_{}", self.spawned.len()));
        let placed = self
            .scene
            .set_transform(id, Transform::from_position(position))
            .and_then(|_| self.scene.set_mesh(id, cube))
            .and_then(|_| self.scene.set_material(id, material));
        match placed {
            Ok(()) => {
                self.spawned.push(id);
                tracing::info!(entity = %id, ?position, "spawned entity");
            }
            Err(e) => tracing::error!("spawn failed: {e}"),
        }
    }
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: WgpuDevice,
}

impl Gpu {
    fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("find adapter")?;

        let (device, queue) = pollster::block_on(
            adapter.request_device(&WgpuDevice::device_descriptor(&adapter), None),
        )
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .context("surface has no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(backend = ?adapter.get_info().backend, "GPU initialized");
        let device = WgpuDevice::for_surface(device, queue, surface_format, config.width, config.height);
        Ok(Self {
            surface,
            config,
            device,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(self.device.raw(), &self.config);
        self.device.resize(self.config.width, self.config.height);
    }
}

struct SandboxApp {
    state: AppState,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
}

impl SandboxApp {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Ember Sandbox")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);
        let mut gpu = Gpu::new(window.clone())?;

        let size = window.inner_size();
        self.state.scene.resize(size.width, size.height);
        self.state.scene.start(&mut gpu.device)?;

        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
        self.state.last_frame = now;
        self.state.update(dt);

        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        self.state.scene.reload_if_stale(&mut gpu.device)?;

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.device.raw(), &gpu.config);
                return Ok(());
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gpu.device.set_frame_view(view);
        self.state.scene.render(&mut gpu.device)?;
        output.present();
        Ok(())
    }
}

impl ApplicationHandler for SandboxApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("failed to initialize sandbox: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(gpu) = self.gpu.as_mut() {
                    self.state.scene.stop(&mut gpu.device);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size.width, new_size.height);
                }
                self.state.scene.resize(new_size.width, new_size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::Escape {
                    event_loop.exit();
                    return;
                }
                self.state
                    .handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.state.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    tracing::error!("frame failed: {e:#}");
                    event_loop.exit();
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state.mouse_delta += Vec2::new(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    tracing::info!("ember-sandbox starting");

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = SandboxApp {
        state: AppState::new(config, cli.mesh.as_deref())?,
        window: None,
        gpu: None,
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}
