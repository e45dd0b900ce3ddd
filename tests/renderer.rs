use std::cell::RefCell;
use std::rc::Rc;

use folio_backdrop::config::hex_color;
use folio_backdrop::render::HeadlessMount;
use folio_backdrop::scene::PointCloud;
use folio_backdrop::{
    observe_appearance, Appearance, AppearanceFlag, AppearancePalette, BackdropError,
    BackgroundOptions, BackgroundRenderer, FrameInfo, LoopState, ManualScheduler, Motion,
    MountPoint, NodeKind, PerspectiveCamera, PixelSurface, RenderSurface, Scene, StaticViewport,
    Variant, WaveSettings,
};

type Headless = BackgroundRenderer<PixelSurface, ManualScheduler>;

const VIEWPORT: StaticViewport = StaticViewport::new(1024, 768);

fn mount(options: &BackgroundOptions) -> (Headless, ManualScheduler) {
    let scheduler = ManualScheduler::new();
    let renderer = Headless::mount(Some(&HeadlessMount), options, &VIEWPORT, scheduler.clone())
        .expect("mount succeeds")
        .expect("mount point present");
    (renderer, scheduler)
}

fn pump(renderer: &mut Headless, scheduler: &ManualScheduler, frames: u64) {
    for number in 0..frames {
        let handle = scheduler
            .fire()
            .unwrap_or_else(|| panic!("frame {number} was not scheduled"));
        renderer
            .on_frame(handle, FrameInfo::new(number, number as f64 / 60.0, 1.0 / 60.0))
            .expect("frame renders");
    }
}

fn point_cloud(scene: &Scene) -> &PointCloud {
    scene
        .nodes()
        .find_map(|(_, node)| match &node.kind {
            NodeKind::Points(cloud) => Some(cloud),
            _ => None,
        })
        .expect("scene has a point cloud")
}

#[test]
fn variants_have_documented_object_counts() {
    let counts = [
        (Variant::WireframeSolid, 1),
        (Variant::ParticleField, 5000),
        (Variant::Cluster, 3003),
        (Variant::WavePlane, 1),
    ];
    for (variant, primitives) in counts {
        let (renderer, _) = mount(&BackgroundOptions::new(variant).with_seed(11));
        let stats = renderer.scene().unwrap().stats();
        assert_eq!(stats.primitives(), primitives, "{}", variant.id());
        assert_eq!(stats.top_level, 1, "{}", variant.id());
    }
}

#[test]
fn random_positions_stay_inside_their_cubes() {
    let (field, _) = mount(&BackgroundOptions::new(Variant::ParticleField).with_seed(5));
    let cloud = point_cloud(field.scene().unwrap());
    assert!(cloud
        .geometry
        .positions
        .iter()
        .all(|p| p.abs().max_element() <= 1000.0));

    let (cluster, _) = mount(&BackgroundOptions::new(Variant::Cluster).with_seed(5));
    let Some(Motion::Cluster { shapes, .. }) = cluster.motion() else {
        panic!("cluster motion expected");
    };
    let scene = cluster.scene().unwrap();
    for shape in shapes {
        let position = scene.node(shape).transform.position;
        assert!(position.abs().max_element() <= 500.0, "{position:?}");
    }
}

#[test]
fn resize_keeps_scene_content() {
    let (mut renderer, _) = mount(&BackgroundOptions::new(Variant::Cluster).with_seed(8));
    let before = renderer.scene().unwrap().stats();
    let positions = point_cloud(renderer.scene().unwrap()).geometry.positions.clone();

    renderer.resize(800, 600);

    assert_eq!(renderer.camera().unwrap().aspect(), 800.0 / 600.0);
    assert_eq!(renderer.surface().unwrap().size(), (800, 600));
    assert_eq!(renderer.scene().unwrap().stats(), before);
    assert_eq!(point_cloud(renderer.scene().unwrap()).geometry.positions, positions);
}

#[test]
fn zero_sized_resize_is_ignored() {
    let (mut renderer, _) = mount(&BackgroundOptions::new(Variant::WavePlane).with_seed(8));
    renderer.resize(0, 300);
    assert_eq!(renderer.surface().unwrap().size(), (1024, 768));
}

#[test]
fn teardown_is_idempotent_and_releases_everything() {
    let (renderer, scheduler) = mount(&BackgroundOptions::new(Variant::ParticleField).with_seed(2));
    let renderer = Rc::new(RefCell::new(renderer));
    let flag = AppearanceFlag::new(Appearance::Light);
    observe_appearance(&renderer, &flag).unwrap();
    pump(&mut *renderer.borrow_mut(), &scheduler, 3);
    assert_eq!(flag.subscriber_count(), 1);

    renderer.borrow_mut().teardown();
    renderer.borrow_mut().teardown();

    let renderer = renderer.borrow();
    assert_eq!(renderer.state(), LoopState::Stopped);
    assert!(!renderer.has_pending_frame());
    assert!(!renderer.has_subscription());
    assert!(renderer.scene().is_none());
    assert!(scheduler.pending().is_none());
    assert_eq!(scheduler.cancelled(), 1);
    assert_eq!(flag.subscriber_count(), 0);
}

#[test]
fn wave_height_follows_frame_time() {
    let wave = WaveSettings {
        amplitude: 20.0,
        period: 50.0,
    };
    let mut options = BackgroundOptions::new(Variant::WavePlane).with_seed(3);
    options.wave = wave;
    let (mut renderer, scheduler) = mount(&options);
    let Some(Motion::Wave { plane }) = renderer.motion() else {
        panic!("wave motion expected");
    };

    let heights = |renderer: &Headless| -> Vec<glam::Vec3> {
        let NodeKind::Mesh(mesh) = &renderer.scene().unwrap().node(plane).kind else {
            panic!("plane is a mesh");
        };
        mesh.geometry.positions.clone()
    };
    let check = |vertices: &[glam::Vec3], time: f32| {
        for vertex in vertices.iter().step_by(97) {
            let expected =
                20.0 * (vertex.x / 50.0 + time).sin() + 20.0 * (vertex.y / 50.0 + time).sin();
            assert!((vertex.z - expected).abs() < 1e-3, "t={time} {vertex:?}");
        }
    };

    let handle = scheduler.fire().unwrap();
    renderer.on_frame(handle, FrameInfo::new(0, 0.75, 0.016)).unwrap();
    let first = heights(&renderer);
    check(&first, 0.75);

    let handle = scheduler.fire().unwrap();
    renderer.on_frame(handle, FrameInfo::new(1, 1.9, 1.15)).unwrap();
    let second = heights(&renderer);
    check(&second, 1.9);

    assert!(first.iter().zip(&second).any(|(a, b)| (a.z - b.z).abs() > 1e-3));
    assert!(first.iter().zip(&second).all(|(a, b)| a.x == b.x && a.y == b.y));
    let NodeKind::Mesh(mesh) = &renderer.scene().unwrap().node(plane).kind else {
        panic!("plane is a mesh");
    };
    assert_eq!(mesh.geometry.revision(), 2);
}

#[test]
fn hero_follows_every_appearance_toggle() {
    let palette = AppearancePalette::default();
    assert_eq!(palette.dark_background, hex_color(0x1f2937));
    assert_eq!(palette.light_background, hex_color(0xf0f9ff));

    let (renderer, _) = mount(&BackgroundOptions::new(Variant::ParticleField).with_seed(4));
    let renderer = Rc::new(RefCell::new(renderer));
    let flag = AppearanceFlag::new(Appearance::Dark);
    observe_appearance(&renderer, &flag).unwrap();

    let check = |dark: bool| {
        let renderer = renderer.borrow();
        let scene = renderer.scene().unwrap();
        let (background, opacity) = if dark {
            (palette.dark_background, palette.dark_opacity)
        } else {
            (palette.light_background, palette.light_opacity)
        };
        assert_eq!(scene.background, Some(background));
        let material = point_cloud(scene).material;
        assert_eq!(material.opacity, opacity);
        assert_eq!(material.color, palette.accent);
    };

    check(true);
    flag.toggle();
    check(false);
    flag.toggle();
    check(true);
    flag.set(Appearance::Dark);
    check(true);
}

#[test]
fn cube_spins_a_hundredth_radian_per_frame() {
    let (mut renderer, scheduler) = mount(&BackgroundOptions::new(Variant::WireframeSolid));
    let camera = renderer.camera().unwrap();
    assert!((camera.distance() - 2.0).abs() < 1e-6);
    assert_eq!(camera.fov_degrees, 75.0);
    assert_eq!(renderer.surface().unwrap().size(), (1024, 768));
    assert!(renderer.follows_viewport());

    pump(&mut renderer, &scheduler, 25);

    let scene = renderer.scene().unwrap();
    let rotation = scene.node(scene.roots()[0]).transform.rotation;
    assert!((rotation.x - 0.25).abs() < 1e-4);
    assert!((rotation.y - 0.25).abs() < 1e-4);
    assert_eq!(renderer.frames_rendered(), 25);
    assert_eq!(scheduler.requested(), 26);
}

struct BrokenMount;

struct BrokenSurface {
    attached: bool,
}

impl RenderSurface for BrokenSurface {
    fn size(&self) -> (u32, u32) {
        (1, 1)
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn draw(&mut self, _scene: &Scene, _camera: &PerspectiveCamera) -> folio_backdrop::Result<()> {
        Err(BackdropError::Surface("context lost".into()))
    }

    fn detach(&mut self) {
        self.attached = false;
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}

impl MountPoint for BrokenMount {
    type Surface = BrokenSurface;

    fn attach(&self, _width: u32, _height: u32) -> folio_backdrop::Result<BrokenSurface> {
        Ok(BrokenSurface { attached: true })
    }
}

#[test]
fn draw_failure_is_terminal() {
    let scheduler = ManualScheduler::new();
    let mut renderer = BackgroundRenderer::mount(
        Some(&BrokenMount),
        &BackgroundOptions::new(Variant::WireframeSolid),
        &VIEWPORT,
        scheduler.clone(),
    )
    .unwrap()
    .unwrap();

    let handle = scheduler.fire().unwrap();
    let err = renderer.on_frame(handle, FrameInfo::new(0, 0.0, 0.0)).unwrap_err();
    assert!(matches!(err, BackdropError::Surface(_)));
    assert_eq!(renderer.state(), LoopState::Stopped);
    assert!(scheduler.pending().is_none());
    assert!(renderer.surface().is_none());
    assert_eq!(scheduler.requested(), 1);
}
