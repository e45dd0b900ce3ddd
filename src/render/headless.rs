use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::{Vec2, Vec4};
use log::debug;

use crate::camera::PerspectiveCamera;
use crate::error::{BackdropError, Result};
use crate::scene::Scene;
use crate::surface::{MountPoint, RenderSurface};

use super::common::DrawList;

/// Mount point for offscreen rendering.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessMount;

impl MountPoint for HeadlessMount {
    type Surface = PixelSurface;

    fn attach(&self, width: u32, height: u32) -> Result<PixelSurface> {
        Ok(PixelSurface::new(width, height))
    }
}

/// Software rasterizer that draws into an RGBA8 buffer.
#[derive(Debug)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    attached: bool,
    frames: u64,
    last_points: usize,
    last_lines: usize,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            attached: true,
            frames: 0,
            last_points: 0,
            last_lines: 0,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    /// Points and lines rasterized in the most recent frame.
    pub fn last_frame_primitives(&self) -> (usize, usize) {
        (self.last_points, self.last_lines)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(offset..offset + 4)
            .and_then(|rgba| rgba.try_into().ok())
    }

    /// Writes the buffer as a binary PPM, composited over `backdrop`.
    pub fn write_ppm(&self, path: &Path, backdrop: [u8; 3]) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        for rgba in self.pixels.chunks_exact(4) {
            let alpha = rgba[3] as f32 / 255.0;
            let pixel: [u8; 3] = std::array::from_fn(|i| {
                (rgba[i] as f32 * alpha + backdrop[i] as f32 * (1.0 - alpha)).round() as u8
            });
            out.write_all(&pixel)?;
        }
        out.flush()?;
        Ok(())
    }

    fn clear(&mut self, color: Option<Vec4>) {
        let rgba = color.map(to_rgba8).unwrap_or([0; 4]);
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&rgba);
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: Vec4) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let alpha = color.w.clamp(0.0, 1.0);
        let dst = &mut self.pixels[offset..offset + 4];
        let dst_alpha = dst[3] as f32 / 255.0;
        let out_alpha = alpha + dst_alpha * (1.0 - alpha);
        for i in 0..3 {
            let src = color[i].clamp(0.0, 1.0);
            let existing = dst[i] as f32 / 255.0;
            let mixed = if out_alpha > 0.0 {
                (src * alpha + existing * dst_alpha * (1.0 - alpha)) / out_alpha
            } else {
                0.0
            };
            dst[i] = (mixed * 255.0).round() as u8;
        }
        dst[3] = (out_alpha * 255.0).round() as u8;
    }

    fn splat(&mut self, center: Vec2, size: f32, color: Vec4) {
        let half = (size * 0.5).max(0.5);
        let (x0, x1) = ((center.x - half).floor() as i64, (center.x + half).ceil() as i64);
        let (y0, y1) = ((center.y - half).floor() as i64, (center.y + half).ceil() as i64);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    // Bresenham
    fn line(&mut self, from: Vec2, to: Vec2, color: Vec4) {
        let (mut x, mut y) = (from.x.round() as i64, from.y.round() as i64);
        let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let limit = (self.width as i64 + self.height as i64) * 4;
        for _ in 0..=(dx - dy).min(limit) {
            self.blend(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

fn to_rgba8(color: Vec4) -> [u8; 4] {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}

impl RenderSurface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if !self.attached || width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * 4];
    }

    fn draw(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
        if !self.attached {
            return Err(BackdropError::Surface("pixel surface is detached".into()));
        }
        let list = DrawList::build(scene, camera, self.width, self.height);
        self.clear(list.clear);
        for line in &list.lines {
            self.line(line.from, line.to, line.color);
        }
        for point in &list.points {
            self.splat(point.position, point.size, point.color);
        }
        self.last_points = list.points.len();
        self.last_lines = list.lines.len();
        self.frames += 1;
        Ok(())
    }

    fn detach(&mut self) {
        if self.attached {
            debug!("releasing {}x{} pixel surface", self.width, self.height);
        }
        self.attached = false;
        self.pixels = Vec::new();
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}
