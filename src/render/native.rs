use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::{error, warn};
use pollster::block_on;
use wgpu::util::DeviceExt;
use winit::window::{Window, WindowId};

use crate::camera::PerspectiveCamera;
use crate::config::{hex_color, PAGE_COLOR};
use crate::error::{BackdropError, Result};
use crate::scene::Scene;
use crate::surface::{MountPoint, RenderSurface};

use super::common::DrawList;

/// A desktop window acting as the mount point.
#[derive(Debug, Clone)]
pub struct WindowMount {
    window: Arc<Window>,
}

impl WindowMount {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl MountPoint for WindowMount {
    type Surface = GpuSurface;

    fn attach(&self, width: u32, height: u32) -> Result<GpuSurface> {
        block_on(GpuSurface::new(Arc::clone(&self.window), width, height))
    }
}

/// GPU surface backed by wgpu that draws the projected scene as lines and points.
pub struct GpuSurface {
    window: Arc<Window>,
    surface: Option<wgpu::Surface<'static>>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    line_pipeline: wgpu::RenderPipeline,
    point_pipeline: wgpu::RenderPipeline,
}

impl GpuSurface {
    /// Initializes the GPU surface for the provided window.
    pub async fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BackdropError::Surface("window has zero area".into()));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|err| BackdropError::Surface(format!("failed to create surface: {err}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackdropError::Surface("failed to acquire GPU adapter".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("backdrop-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                },
                None,
            )
            .await
            .map_err(|err| BackdropError::Surface(format!("failed to create GPU device: {err}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| BackdropError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .iter()
            .copied()
            .find(|mode| {
                matches!(
                    mode,
                    wgpu::CompositeAlphaMode::PreMultiplied | wgpu::CompositeAlphaMode::PostMultiplied
                )
            })
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("backdrop-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("backdrop-pipeline-layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let line_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::LineList,
        );
        let point_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::PointList,
        );

        Ok(Self {
            window,
            surface: Some(surface),
            device,
            queue,
            config,
            line_pipeline,
            point_pipeline,
        })
    }

    /// Returns the identifier of the window the surface renders into.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    fn present(&mut self, list: &DrawList) -> Result<(), wgpu::SurfaceError> {
        let Some(surface) = self.surface.as_ref() else {
            return Ok(());
        };
        let output = surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let line_vertices: Vec<Vertex> = list
            .lines
            .iter()
            .flat_map(|line| {
                [
                    Vertex::new(list.to_ndc(line.from).into(), line.color),
                    Vertex::new(list.to_ndc(line.to).into(), line.color),
                ]
            })
            .collect();
        let point_vertices: Vec<Vertex> = list
            .points
            .iter()
            .map(|point| Vertex::new(list.to_ndc(point.position).into(), point.color))
            .collect();

        let line_buffer = self.vertex_buffer("line-vertices", &line_vertices);
        let point_buffer = self.vertex_buffer("point-vertices", &point_vertices);

        let clear = list
            .clear
            .unwrap_or_else(|| hex_color(PAGE_COLOR).extend(1.0));
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("backdrop-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("backdrop-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.x as f64,
                            g: clear.y as f64,
                            b: clear.z as f64,
                            a: clear.w as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(buffer) = line_buffer.as_ref() {
                pass.set_pipeline(&self.line_pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..line_vertices.len() as u32, 0..1);
            }
            if let Some(buffer) = point_buffer.as_ref() {
                pass.set_pipeline(&self.point_pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..point_vertices.len() as u32, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn vertex_buffer(&self, label: &str, vertices: &[Vertex]) -> Option<wgpu::Buffer> {
        if vertices.is_empty() {
            return None;
        }
        Some(
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
        )
    }

    fn reconfigure(&mut self) {
        if let Some(surface) = self.surface.as_ref() {
            surface.configure(&self.device, &self.config);
        }
    }
}

impl RenderSurface for GpuSurface {
    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
    }

    fn draw(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
        if self.surface.is_none() {
            return Err(BackdropError::Surface("GPU surface is detached".into()));
        }
        let (width, height) = self.size();
        let list = DrawList::build(scene, camera, width, height);
        match self.present(&list) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                Ok(())
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; skipping frame");
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("GPU is out of memory");
                Err(BackdropError::Surface("GPU is out of memory".into()))
            }
        }
    }

    fn detach(&mut self) {
        self.surface = None;
    }

    fn is_attached(&self) -> bool {
        self.surface.is_some()
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("backdrop-pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4],
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 4],
}

impl Vertex {
    fn new(position: [f32; 2], color: Vec4) -> Self {
        Self {
            position,
            color: color.to_array(),
        }
    }
}

const SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(input.position, 0.0, 1.0);
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return input.color;
}
"#;
