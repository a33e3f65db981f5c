//! wgpu renderer for textured quads.
//!
//! Every quad is expanded to six clip-space vertices on the CPU as it is queued. At
//! the end of the frame the vertices are uploaded into one buffer and drawn in runs
//! of consecutive quads that share a texture, so submission order is draw order.

use std::{collections::HashMap, ops::Range};

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::{
    vertex_attr_array, AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry,
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource,
    BindingType, Buffer, BufferUsages, ColorTargetState, ColorWrites, CommandEncoderDescriptor,
    CompositeAlphaMode, DeviceDescriptor, Extent3d, FilterMode, FragmentState, Instance, LoadOp,
    MultisampleState, Operations, Origin3d, PipelineLayoutDescriptor, PresentMode, PrimitiveState,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    RequestAdapterOptions, Sampler, SamplerBindingType, SamplerDescriptor, ShaderModuleDescriptor,
    ShaderSource, SurfaceConfiguration, SurfaceTexture, TexelCopyBufferLayout,
    TexelCopyTextureInfo, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor,
    TextureViewDimension, VertexBufferLayout, VertexState, VertexStepMode,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    math::{Camera2D, Transform2D, Vec2},
    render::sprite::TextureHandle,
    render::text::{FontHandle, TextRenderer},
};

/// One textured quad, in world units unless drawn with a fixed camera.
#[derive(Clone, Copy, Debug)]
pub struct QuadDraw {
    pub texture: TextureHandle,
    /// Normalized UV rect `[x, y, w, h]`; `None` samples the whole texture.
    pub uv_rect: Option<[f32; 4]>,
    /// Unscaled on-screen size (texture or frame size in pixels).
    pub base_size: Vec2,
    pub transform: Transform2D,
    pub origin: Vec2,
    pub flip_x: bool,
    pub tint: [f32; 4],
}

/// Public face of the renderer: quads, text and texture uploads.
pub struct Renderer<'window> {
    backend: WgpuBackend<'window>,
    text: TextRenderer,
}

impl<'window> Renderer<'window> {
    pub fn new(window: &'window Window, vsync: bool) -> Result<Self> {
        Ok(Self {
            backend: WgpuBackend::new(window, vsync)?,
            text: TextRenderer::new(),
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.backend.resize(new_size);
    }

    pub fn begin_frame(&mut self) -> Result<Frame> {
        self.backend.begin_frame()
    }

    /// Fill the frame with `color` before any quads are drawn.
    pub fn clear(&mut self, frame: &mut Frame, color: [f32; 4]) -> Result<()> {
        frame.clear_color = Some(color);
        Ok(())
    }

    /// Queue a textured quad. Quads are drawn in submission order.
    pub fn draw_quad(&mut self, frame: &mut Frame, quad: &QuadDraw, camera: &Camera2D) -> Result<()> {
        self.backend.queue_quad(frame, quad, camera);
        Ok(())
    }

    /// Draw a single line of text with its top-left corner at `position`.
    pub fn draw_text(
        &mut self,
        frame: &mut Frame,
        text: &str,
        font: FontHandle,
        size: f32,
        position: Vec2,
        color: [f32; 4],
        camera: &Camera2D,
    ) -> Result<()> {
        let backend = &mut self.backend;
        let glyphs = self.text.layout(font, text, size, |data, w, h| {
            backend.upload_texture(data, w, h, FilterMode::Linear)
        })?;

        for glyph in glyphs {
            let quad = QuadDraw {
                texture: glyph.texture,
                uv_rect: None,
                base_size: glyph.size,
                transform: Transform2D::new(position + glyph.top_left, Vec2::ONE, 0.0),
                origin: Vec2::ZERO,
                flip_x: false,
                tint: color,
            };
            self.backend.queue_quad(frame, &quad, camera);
        }
        Ok(())
    }

    pub fn end_frame(&mut self, frame: Frame) -> Result<()> {
        self.backend.end_frame(frame)
    }

    /// Upload raw RGBA8 pixels (`width * height * 4` bytes) as a pixel-art texture.
    pub fn load_texture_from_rgba(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<TextureHandle> {
        self.backend
            .upload_texture(data, width, height, FilterMode::Nearest)
    }

    pub fn load_font_from_bytes(&mut self, bytes: &[u8]) -> Result<FontHandle> {
        self.text.load_font_from_bytes(bytes)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct QuadVertex {
    /// Clip-space position.
    position: [f32; 2],
    uv: [f32; 2],
    tint: [f32; 4],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

    fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Unit-quad corners (two triangles) paired with the UV they sample.
const QUAD_CORNERS: [([f32; 2], [f32; 2]); 6] = [
    ([-0.5, -0.5], [0.0, 0.0]),
    ([0.5, -0.5], [1.0, 0.0]),
    ([0.5, 0.5], [1.0, 1.0]),
    ([-0.5, -0.5], [0.0, 0.0]),
    ([0.5, 0.5], [1.0, 1.0]),
    ([-0.5, 0.5], [0.0, 1.0]),
];

const VERTICES_PER_QUAD: u32 = QUAD_CORNERS.len() as u32;

/// Vertex capacity of the first frame buffer; it grows on demand.
const INITIAL_VERTEX_CAPACITY: usize = 1024 * VERTICES_PER_QUAD as usize;

fn quad_vertices(quad: &QuadDraw, view_projection: Mat4) -> [QuadVertex; 6] {
    let mvp = view_projection
        * quad
            .transform
            .to_matrix(quad.base_size, quad.origin, quad.flip_x);
    let [u, v, w, h] = quad.uv_rect.unwrap_or([0.0, 0.0, 1.0, 1.0]);
    QUAD_CORNERS.map(|(corner, uv)| {
        let clip = mvp * Vec4::new(corner[0], corner[1], 0.0, 1.0);
        QuadVertex {
            position: [clip.x / clip.w, clip.y / clip.w],
            uv: [u + uv[0] * w, v + uv[1] * h],
            tint: quad.tint,
        }
    })
}

/// Consecutive vertices drawn with one texture.
#[derive(Clone, Debug, PartialEq)]
struct DrawRun {
    texture: TextureHandle,
    vertices: Range<u32>,
}

fn push_run(runs: &mut Vec<DrawRun>, texture: TextureHandle, vertices: Range<u32>) {
    if let Some(last) = runs.last_mut() {
        if last.texture == texture && last.vertices.end == vertices.start {
            last.vertices.end = vertices.end;
            return;
        }
    }
    runs.push(DrawRun { texture, vertices });
}

/// A frame being recorded. Dropping it without `end_frame` still presents the
/// acquired surface texture.
pub struct Frame {
    surface_texture: Option<SurfaceTexture>,
    view: TextureView,
    clear_color: Option<[f32; 4]>,
    vertices: Vec<QuadVertex>,
    runs: Vec<DrawRun>,
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(surface_texture) = self.surface_texture.take() {
            surface_texture.present();
        }
    }
}

struct GpuTexture {
    // Owned so the bind group's view stays valid.
    _texture: Texture,
    bind_group: BindGroup,
}

struct QuadPipeline {
    pipeline: RenderPipeline,
    texture_layout: BindGroupLayout,
    nearest: Sampler,
    linear: Sampler,
    vertex_buffer: Buffer,
    vertex_capacity: usize,
}

struct WgpuBackend<'window> {
    surface: wgpu::Surface<'window>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: SurfaceConfiguration,
    quads: QuadPipeline,
    textures: HashMap<TextureHandle, GpuTexture>,
    next_texture_id: u32,
}

/// 8x8 magenta/black checkerboard used for textures that failed to load.
fn missing_texture_pixels() -> Vec<u8> {
    (0..8u32)
        .flat_map(|y| (0..8u32).map(move |x| (x / 4 + y / 4) % 2 == 0))
        .flat_map(|magenta| {
            if magenta {
                [255, 0, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
        .collect()
}

impl<'window> WgpuBackend<'window> {
    fn new(window: &'window Window, vsync: bool) -> Result<Self> {
        let instance = Instance::default();
        let surface = instance.create_surface(window)?;
        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no graphics adapter can present to this window")?;
        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("arcade2d-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        }))
        .context("failed to open the graphics device")?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(TextureFormat::is_srgb)
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| anyhow!("surface supports no texture formats"))?;

        let size = window.inner_size();
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(&capabilities.present_modes, vsync),
            alpha_mode: alpha_mode(&capabilities.alpha_modes),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        log::info!(
            "surface {}x{} {:?} {:?}",
            surface_config.width,
            surface_config.height,
            format,
            surface_config.present_mode
        );

        let quads = QuadPipeline::new(&device, format);
        let mut backend = Self {
            surface,
            device,
            queue,
            surface_config,
            quads,
            textures: HashMap::new(),
            next_texture_id: 1,
        };
        let missing = backend.create_texture(&missing_texture_pixels(), 8, 8, FilterMode::Nearest);
        backend.textures.insert(TextureHandle::MISSING, missing);
        Ok(backend)
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn begin_frame(&mut self) -> Result<Frame> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Timeout) => {
                self.surface.configure(&self.device, &self.surface_config);
                self.surface
                    .get_current_texture()
                    .context("surface unavailable after reconfiguring")?
            }
            Err(err) => return Err(anyhow!("failed to acquire a surface texture: {err}")),
        };
        let view = surface_texture
            .texture
            .create_view(&TextureViewDescriptor::default());
        Ok(Frame {
            surface_texture: Some(surface_texture),
            view,
            clear_color: None,
            vertices: Vec::new(),
            runs: Vec::new(),
        })
    }

    fn queue_quad(&self, frame: &mut Frame, quad: &QuadDraw, camera: &Camera2D) {
        let texture = if self.textures.contains_key(&quad.texture) {
            quad.texture
        } else {
            TextureHandle::MISSING
        };
        // The camera viewport fills the surface regardless of its physical size.
        let view_projection =
            camera.view_projection(camera.viewport.x as u32, camera.viewport.y as u32);
        let start = frame.vertices.len() as u32;
        frame
            .vertices
            .extend_from_slice(&quad_vertices(quad, view_projection));
        push_run(&mut frame.runs, texture, start..start + VERTICES_PER_QUAD);
    }

    fn end_frame(&mut self, mut frame: Frame) -> Result<()> {
        self.upload_vertices(&frame.vertices);

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        {
            let load = match frame.clear_color {
                Some([r, g, b, a]) => LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                None => LoadOp::Load,
            };
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("quad-pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                multiview_mask: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if !frame.runs.is_empty() {
                pass.set_pipeline(&self.quads.pipeline);
                pass.set_vertex_buffer(0, self.quads.vertex_buffer.slice(..));
                for run in &frame.runs {
                    let Some(texture) = self.textures.get(&run.texture) else {
                        continue;
                    };
                    pass.set_bind_group(0, &texture.bind_group, &[]);
                    pass.draw(run.vertices.clone(), 0..1);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(surface_texture) = frame.surface_texture.take() {
            surface_texture.present();
        }
        Ok(())
    }

    fn upload_vertices(&mut self, vertices: &[QuadVertex]) {
        if vertices.is_empty() {
            return;
        }
        if vertices.len() > self.quads.vertex_capacity {
            let capacity = vertices.len().next_power_of_two();
            log::debug!("growing quad vertex buffer to {capacity} vertices");
            self.quads.vertex_buffer = create_vertex_buffer(&self.device, capacity);
            self.quads.vertex_capacity = capacity;
        }
        self.queue
            .write_buffer(&self.quads.vertex_buffer, 0, bytemuck::cast_slice(vertices));
    }

    fn upload_texture(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        filter: FilterMode,
    ) -> Result<TextureHandle> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(anyhow!(
                "RGBA buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            ));
        }
        let texture = self.create_texture(data, width, height, filter);
        let handle = TextureHandle(self.next_texture_id);
        self.next_texture_id += 1;
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn create_texture(&self, data: &[u8], width: u32, height: u32, filter: FilterMode) -> GpuTexture {
        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some("quad-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = match filter {
            FilterMode::Nearest => &self.quads.nearest,
            FilterMode::Linear => &self.quads.linear,
        };
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("quad-texture-bind-group"),
            layout: &self.quads.texture_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(sampler),
                },
            ],
        });
        GpuTexture {
            _texture: texture,
            bind_group,
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("quad-vertices"),
        size: (capacity * std::mem::size_of::<QuadVertex>()) as wgpu::BufferAddress,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_sampler(device: &wgpu::Device, filter: FilterMode) -> Sampler {
    device.create_sampler(&SamplerDescriptor {
        label: Some("quad-sampler"),
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

impl QuadPipeline {
    fn new(device: &wgpu::Device, surface_format: TextureFormat) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("quad-shader"),
            source: ShaderSource::Wgsl(include_str!("sprite.wgsl").into()),
        });

        let texture_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("quad-texture-layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("quad-pipeline-layout"),
            bind_group_layouts: &[&texture_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("quad-pipeline"),
            layout: Some(&layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            texture_layout,
            nearest: create_sampler(device, FilterMode::Nearest),
            linear: create_sampler(device, FilterMode::Linear),
            vertex_buffer: create_vertex_buffer(device, INITIAL_VERTEX_CAPACITY),
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
        }
    }
}

fn present_mode(supported: &[PresentMode], vsync: bool) -> PresentMode {
    let wanted: &[PresentMode] = if vsync {
        &[PresentMode::Fifo, PresentMode::FifoRelaxed]
    } else {
        &[PresentMode::Immediate, PresentMode::Mailbox]
    };
    supported
        .iter()
        .copied()
        .find(|mode| wanted.contains(mode))
        .unwrap_or(PresentMode::Fifo)
}

fn alpha_mode(supported: &[CompositeAlphaMode]) -> CompositeAlphaMode {
    if supported.contains(&CompositeAlphaMode::Auto) {
        return CompositeAlphaMode::Auto;
    }
    supported.first().copied().unwrap_or(CompositeAlphaMode::Opaque)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-4 && (a[1] - b[1]).abs() < 1e-4
    }

    fn quad_at(position: Vec2) -> QuadDraw {
        QuadDraw {
            texture: TextureHandle::MISSING,
            uv_rect: Some([0.25, 0.0, 0.125, 1.0]),
            base_size: Vec2::new(32.0, 32.0),
            transform: Transform2D::new(position, Vec2::ONE, 0.0),
            origin: Vec2::splat(0.5),
            flip_x: false,
            tint: [1.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn placeholder_is_a_full_rgba_checkerboard() {
        let pixels = missing_texture_pixels();
        assert_eq!(pixels.len(), 8 * 8 * 4);
        assert_eq!(&pixels[0..4], &[255, 0, 255, 255]);
        // Pixel (4, 0) is in the next checker cell.
        assert_eq!(&pixels[16..20], &[0, 0, 0, 255]);
    }

    #[test]
    fn quads_land_in_clip_space_with_frame_uvs() {
        let camera = Camera2D::new(Vec2::ZERO, Vec2::new(800.0, 600.0));
        let vp = camera.view_projection(800, 600);
        let vertices = quad_vertices(&quad_at(Vec2::new(16.0, 16.0)), vp);

        // Top-left corner of the quad is the top-left of the screen.
        assert!(close(vertices[0].position, [-1.0, 1.0]));
        assert!(close(vertices[0].uv, [0.25, 0.0]));
        assert!(close(vertices[2].uv, [0.375, 1.0]));
        assert!(vertices.iter().all(|v| v.tint == [1.0, 0.0, 0.0, 1.0]));

        let mut flipped = quad_at(Vec2::new(16.0, 16.0));
        flipped.flip_x = true;
        let mirrored = quad_vertices(&flipped, vp);
        assert!(close(mirrored[0].position, [32.0 / 400.0 - 1.0, 1.0]));
        assert!(close(mirrored[0].uv, [0.25, 0.0]));
    }

    #[test]
    fn runs_merge_only_adjacent_quads_with_the_same_texture() {
        let a = TextureHandle(1);
        let b = TextureHandle(2);
        let mut runs = Vec::new();
        push_run(&mut runs, a, 0..6);
        push_run(&mut runs, a, 6..12);
        push_run(&mut runs, b, 12..18);
        push_run(&mut runs, a, 18..24);
        assert_eq!(
            runs,
            vec![
                DrawRun { texture: a, vertices: 0..12 },
                DrawRun { texture: b, vertices: 12..18 },
                DrawRun { texture: a, vertices: 18..24 },
            ]
        );
    }

    #[test]
    fn vertex_layout_matches_the_shader() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 32);
        assert_eq!(QuadVertex::layout().attributes.len(), 3);
    }
}
