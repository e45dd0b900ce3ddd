use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::info;

use crate::animation::{FrameInfo, ManualScheduler};
use crate::appearance::{Appearance, AppearanceFlag};
use crate::backdrop::{observe_appearance, BackgroundRenderer};
use crate::config::{BackgroundOptions, PAGE_COLOR};
use crate::render::{HeadlessMount, PixelSurface};
use crate::scene::{Scene, SceneStats};
use crate::surface::RenderSurface;
use crate::variant::Variant;
use crate::viewport::ViewportProvider;

/// Host frame interval assumed for offscreen runs.
pub const FRAME_SECONDS: f64 = 1.0 / 60.0;

/// Parameters of an offscreen run.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRun {
    pub frames: u64,
    pub appearance: Appearance,
    pub snapshot: Option<PathBuf>,
}

/// What an offscreen run produced, for printing and assertions.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub variant: Variant,
    pub size: (u32, u32),
    pub stats: SceneStats,
    pub frames: u64,
    pub rotation: Vec3,
    pub appearance: Option<Appearance>,
    pub snapshot: Option<PathBuf>,
}

/// Mounts `options` offscreen, delivers `run.frames` frames, then tears down.
pub fn run_headless(
    options: &BackgroundOptions,
    run: &HeadlessRun,
    viewport: &dyn ViewportProvider,
) -> Result<RunReport> {
    let scheduler = ManualScheduler::new();
    let renderer: BackgroundRenderer<PixelSurface, ManualScheduler> =
        BackgroundRenderer::mount(Some(&HeadlessMount), options, viewport, scheduler.clone())
            .with_context(|| format!("failed to mount {} background", options.variant.id()))?
            .ok_or_else(|| anyhow!("offscreen mount point unavailable"))?;
    let renderer = Rc::new(RefCell::new(renderer));

    let flag = AppearanceFlag::new(run.appearance);
    if options.variant.reacts_to_appearance() {
        observe_appearance(&renderer, &flag).context("failed to follow appearance")?;
    }

    for number in 0..run.frames {
        let Some(handle) = scheduler.fire() else {
            break;
        };
        let frame = FrameInfo::new(number, number as f64 * FRAME_SECONDS, FRAME_SECONDS);
        renderer
            .borrow_mut()
            .on_frame(handle, frame)
            .with_context(|| format!("frame {number} failed"))?;
    }

    let mut renderer = renderer.borrow_mut();
    let scene = renderer
        .scene()
        .ok_or_else(|| anyhow!("renderer was torn down during the run"))?;
    let stats = scene.stats();
    let rotation = first_rotation(scene);
    let surface = renderer
        .surface()
        .ok_or_else(|| anyhow!("renderer was torn down during the run"))?;
    let size = surface.size();

    if let Some(path) = run.snapshot.as_ref() {
        surface
            .write_ppm(path, rgb8(PAGE_COLOR))
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        info!("wrote snapshot to {}", path.display());
    }

    let report = RunReport {
        variant: renderer.variant(),
        size,
        stats,
        frames: renderer.frames_rendered(),
        rotation,
        appearance: renderer.appearance(),
        snapshot: run.snapshot.clone(),
    };
    renderer.teardown();
    Ok(report)
}

fn first_rotation(scene: &Scene) -> Vec3 {
    scene
        .roots()
        .first()
        .map(|id| scene.node(*id).transform.rotation)
        .unwrap_or(Vec3::ZERO)
}

fn rgb8(hex: u32) -> [u8; 3] {
    [(hex >> 16) as u8, (hex >> 8) as u8, hex as u8]
}

pub fn print_summary(report: &RunReport) {
    println!(
        "Mounted {} background ({}) at {}x{}",
        report.variant.id(),
        report.variant.name(),
        report.size.0,
        report.size.1
    );
    let stats = &report.stats;
    println!(
        "Scene: {} top-level object(s), {} primitive(s) ({} point(s), {} mesh(es), {} group(s))",
        stats.top_level,
        stats.primitives(),
        stats.points,
        stats.meshes,
        stats.groups
    );
    let glyphs = report.variant.overlay_glyphs();
    if !glyphs.is_empty() {
        let names: Vec<_> = glyphs.iter().map(|glyph| glyph.name()).collect();
        println!("Overlay: {}", names.join(", "));
    }
    if let Some(appearance) = report.appearance {
        println!("Appearance: {appearance:?}");
    }
    println!("Rendered {} frame(s)", report.frames);
    println!(
        "Root rotation=({:.3}, {:.3}, {:.3})",
        report.rotation.x, report.rotation.y, report.rotation.z
    );
    if let Some(path) = report.snapshot.as_ref() {
        println!("Snapshot: {}", path.display());
    }
}
