use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::animation::{AnimationLoop, FrameHandle, FrameInfo, FrameScheduler, LoopState};
use crate::appearance::{apply_palette, Appearance, AppearanceSignal, Subscription};
use crate::camera::PerspectiveCamera;
use crate::config::{AppearancePalette, BackgroundOptions, WaveSettings};
use crate::error::{BackdropError, Result};
use crate::rng::ScatterRng;
use crate::scene::Scene;
use crate::surface::{MountPoint, RenderSurface};
use crate::variant::{Motion, Variant};
use crate::viewport::ViewportProvider;

/// Scene, camera and surface: created together, released together.
struct Stage<S> {
    scene: Scene,
    camera: PerspectiveCamera,
    surface: S,
    motion: Motion,
}

/// Decorative 3D background bound to one mount point.
///
/// Construction schedules the first frame; each [`on_frame`](Self::on_frame)
/// advances the variant's motion, draws, and requests the next frame until
/// [`teardown`](Self::teardown).
pub struct BackgroundRenderer<S: RenderSurface, F: FrameScheduler> {
    variant: Variant,
    /// Dimensions given at construction; they survive viewport resizes.
    explicit_size: (Option<u32>, Option<u32>),
    wave: WaveSettings,
    palette: AppearancePalette,
    stage: Option<Stage<S>>,
    scheduler: F,
    animation: AnimationLoop,
    appearance: Option<Appearance>,
    subscription: Option<Box<dyn Subscription>>,
}

impl<S: RenderSurface, F: FrameScheduler> BackgroundRenderer<S, F> {
    /// Builds the scene for `options.variant` and attaches a surface to `mount`.
    ///
    /// Returns `Ok(None)` without creating or scheduling anything when the
    /// mount point is not available yet; the caller retries on its next mount.
    pub fn mount<M>(
        mount: Option<&M>,
        options: &BackgroundOptions,
        viewport: &dyn ViewportProvider,
        scheduler: F,
    ) -> Result<Option<Self>>
    where
        M: MountPoint<Surface = S>,
    {
        let Some(mount) = mount else {
            debug!("mount point for {} not ready; deferring", options.variant.id());
            return Ok(None);
        };

        let (width, height) = options.resolve_size(viewport.viewport_size())?;
        let mut rng = match options.seed {
            Some(seed) => ScatterRng::seeded(seed),
            None => ScatterRng::from_entropy(),
        };

        let mut scene = Scene::new();
        let motion = options.variant.build(&mut scene, &mut rng);
        let mut camera = PerspectiveCamera::new(PerspectiveCamera::aspect_for(width, height));
        options.variant.position_camera(&mut camera);
        let surface = mount.attach(width, height)?;

        let mut renderer = Self {
            variant: options.variant,
            explicit_size: (options.width, options.height),
            wave: options.wave,
            palette: options.palette,
            stage: Some(Stage {
                scene,
                camera,
                surface,
                motion,
            }),
            scheduler,
            animation: AnimationLoop::new(),
            appearance: None,
            subscription: None,
        };
        if let Err(err) = renderer.animation.schedule(&mut renderer.scheduler) {
            renderer.teardown();
            return Err(err);
        }

        info!(
            "mounted {} background at {width}x{height} ({} primitives)",
            options.variant.id(),
            renderer.stats_primitives()
        );
        Ok(Some(renderer))
    }

    fn stats_primitives(&self) -> usize {
        self.stage
            .as_ref()
            .map(|stage| stage.scene.stats().primitives())
            .unwrap_or(0)
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn state(&self) -> LoopState {
        self.animation.state()
    }

    pub fn is_live(&self) -> bool {
        self.stage.is_some()
    }

    /// Whether any dimension follows the viewport rather than an explicit value.
    pub fn follows_viewport(&self) -> bool {
        self.explicit_size.0.is_none() || self.explicit_size.1.is_none()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.animation.frames()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.animation.pending().is_some()
    }

    /// The one outstanding frame request, if any.
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.animation.pending()
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn appearance(&self) -> Option<Appearance> {
        self.appearance
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.stage.as_ref().map(|stage| &stage.scene)
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.stage.as_ref().map(|stage| &stage.camera)
    }

    pub fn surface(&self) -> Option<&S> {
        self.stage.as_ref().map(|stage| &stage.surface)
    }

    pub fn motion(&self) -> Option<Motion> {
        self.stage.as_ref().map(|stage| stage.motion)
    }

    /// Runs the frame delivered for `handle`: advance, draw, reschedule.
    ///
    /// Does nothing once stopped, or when `handle` is not the outstanding
    /// request. A draw failure tears the renderer down and is returned to the
    /// host; the instance is not recovered.
    pub fn on_frame(&mut self, handle: FrameHandle, frame: FrameInfo) -> Result<()> {
        if !self.animation.begin_frame(handle) {
            return Ok(());
        }
        let Some(stage) = self.stage.as_mut() else {
            return Ok(());
        };

        stage.motion.advance(&mut stage.scene, &frame, &self.wave);
        if let Err(err) = stage.surface.draw(&stage.scene, &stage.camera) {
            error!("{} background failed to draw: {err}", self.variant.id());
            self.teardown();
            return Err(err);
        }
        self.animation.end_frame();

        if let Err(err) = self.animation.schedule(&mut self.scheduler) {
            error!("failed to schedule next frame: {err}");
            self.teardown();
            return Err(err);
        }
        Ok(())
    }

    /// Matches the camera aspect and surface size to `width` x `height`.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!("ignoring resize to {width}x{height}");
            return;
        }
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        stage
            .camera
            .set_aspect(PerspectiveCamera::aspect_for(width, height));
        stage.surface.resize(width, height);
        debug!("resized {} background to {width}x{height}", self.variant.id());
    }

    /// Follows a viewport resize in every dimension not given explicitly.
    pub fn on_viewport_resize(&mut self, viewport: &dyn ViewportProvider) {
        if !self.follows_viewport() {
            return;
        }
        let (width, height) = viewport.viewport_size();
        let (explicit_width, explicit_height) = self.explicit_size;
        self.resize(
            explicit_width.unwrap_or(width),
            explicit_height.unwrap_or(height),
        );
    }

    /// Applies the palette swatches for `appearance`.
    pub fn on_appearance_change(&mut self, appearance: Appearance) {
        if !self.variant.reacts_to_appearance() {
            return;
        }
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        apply_palette(&mut stage.scene, &self.palette, appearance);
        self.appearance = Some(appearance);
    }

    /// Keeps `subscription` alive, cancelling any previous one.
    ///
    /// After teardown the subscription is cancelled immediately.
    pub fn hold_subscription(&mut self, mut subscription: Box<dyn Subscription>) {
        if !self.is_live() {
            subscription.cancel();
            return;
        }
        if let Some(mut previous) = self.subscription.replace(subscription) {
            previous.cancel();
        }
    }

    /// Stops the frame chain and releases every resource. Idempotent.
    pub fn teardown(&mut self) {
        self.animation.stop(&mut self.scheduler);
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(mut stage) = self.stage.take() {
            stage.surface.detach();
            stage.scene.clear();
            info!(
                "tore down {} background after {} frame(s)",
                self.variant.id(),
                self.animation.frames()
            );
        }
    }
}

impl<S: RenderSurface, F: FrameScheduler> Drop for BackgroundRenderer<S, F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Reads the current appearance into the renderer, then follows `signal`.
///
/// The listener holds only a weak reference, so the renderer can be dropped
/// while the signal lives on.
pub fn observe_appearance<S, F>(
    renderer: &Rc<RefCell<BackgroundRenderer<S, F>>>,
    signal: &dyn AppearanceSignal,
) -> Result<()>
where
    S: RenderSurface + 'static,
    F: FrameScheduler + 'static,
{
    let mut guard = renderer.borrow_mut();
    if !guard.variant().reacts_to_appearance() {
        return Err(BackdropError::AppearanceUnsupported(guard.variant()));
    }
    if !guard.is_live() {
        return Ok(());
    }
    guard.on_appearance_change(signal.current());

    let weak = Rc::downgrade(renderer);
    let subscription = signal.subscribe(Box::new(move |appearance| {
        let Some(renderer) = weak.upgrade() else {
            return;
        };
        match renderer.try_borrow_mut() {
            Ok(mut renderer) => renderer.on_appearance_change(appearance),
            Err(_) => warn!("renderer busy; dropped appearance change to {appearance:?}"),
        };
    }));
    guard.hold_subscription(subscription);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ManualScheduler;
    use crate::appearance::AppearanceFlag;
    use crate::render::{HeadlessMount, PixelSurface};
    use crate::viewport::StaticViewport;

    type Headless = BackgroundRenderer<PixelSurface, ManualScheduler>;

    fn mount(options: &BackgroundOptions, scheduler: ManualScheduler) -> Headless {
        Headless::mount(
            Some(&HeadlessMount),
            options,
            &StaticViewport::new(320, 240),
            scheduler,
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn missing_mount_creates_nothing() {
        let scheduler = ManualScheduler::new();
        let renderer = Headless::mount::<HeadlessMount>(
            None,
            &BackgroundOptions::new(Variant::Cluster),
            &StaticViewport::new(320, 240),
            scheduler.clone(),
        )
        .unwrap();
        assert!(renderer.is_none());
        assert_eq!(scheduler.requested(), 0);
    }

    #[test]
    fn construction_schedules_exactly_one_frame() {
        let scheduler = ManualScheduler::new();
        let renderer = mount(
            &BackgroundOptions::new(Variant::WavePlane).with_seed(1),
            scheduler.clone(),
        );
        assert!(renderer.has_pending_frame());
        assert_eq!(scheduler.requested(), 1);
        assert_eq!(renderer.state(), LoopState::Running);
    }

    #[test]
    fn frames_after_teardown_are_ignored() {
        let scheduler = ManualScheduler::new();
        let mut renderer = mount(
            &BackgroundOptions::new(Variant::WireframeSolid).with_seed(1),
            scheduler.clone(),
        );
        let handle = renderer.pending_frame().unwrap();
        renderer.teardown();
        renderer.on_frame(handle, FrameInfo::new(0, 0.0, 0.0)).unwrap();
        assert_eq!(renderer.frames_rendered(), 0);
        assert_eq!(scheduler.requested(), 1);
        assert!(scheduler.pending().is_none());
    }

    #[test]
    fn fixed_size_ignores_viewport_changes() {
        let mut fixed = mount(
            &BackgroundOptions::new(Variant::Cluster)
                .with_size(200, 100)
                .with_seed(5),
            ManualScheduler::new(),
        );
        fixed.on_viewport_resize(&StaticViewport::new(640, 480));
        assert_eq!(fixed.surface().unwrap().size(), (200, 100));

        let mut fluid = mount(
            &BackgroundOptions::new(Variant::Cluster).with_seed(5),
            ManualScheduler::new(),
        );
        fluid.on_viewport_resize(&StaticViewport::new(640, 480));
        assert_eq!(fluid.surface().unwrap().size(), (640, 480));
        assert!((fluid.camera().unwrap().aspect() - 640.0 / 480.0).abs() < 1e-6);
    }

    #[test]
    fn explicit_width_survives_viewport_resize() {
        let mut options = BackgroundOptions::new(Variant::WavePlane).with_seed(6);
        options.width = Some(300);
        let mut renderer = mount(&options, ManualScheduler::new());
        assert_eq!(renderer.surface().unwrap().size(), (300, 240));
        assert!(renderer.follows_viewport());

        renderer.on_viewport_resize(&StaticViewport::new(640, 480));
        assert_eq!(renderer.surface().unwrap().size(), (300, 480));
        assert!((renderer.camera().unwrap().aspect() - 300.0 / 480.0).abs() < 1e-6);
    }

    #[test]
    fn non_hero_variants_reject_appearance_binding() {
        let renderer = Rc::new(RefCell::new(mount(
            &BackgroundOptions::new(Variant::Cluster).with_seed(2),
            ManualScheduler::new(),
        )));
        let flag = AppearanceFlag::new(Appearance::Dark);
        let err = observe_appearance(&renderer, &flag).unwrap_err();
        assert!(matches!(err, BackdropError::AppearanceUnsupported(Variant::Cluster)));
        assert_eq!(flag.subscriber_count(), 0);
    }

    #[test]
    fn rebinding_replaces_previous_subscription() {
        let renderer = Rc::new(RefCell::new(mount(
            &BackgroundOptions::new(Variant::ParticleField).with_seed(3),
            ManualScheduler::new(),
        )));
        let flag = AppearanceFlag::new(Appearance::Light);
        observe_appearance(&renderer, &flag).unwrap();
        observe_appearance(&renderer, &flag).unwrap();
        assert_eq!(flag.subscriber_count(), 1);
    }

    #[test]
    fn dropping_renderer_releases_subscription() {
        let flag = AppearanceFlag::new(Appearance::Light);
        {
            let renderer = Rc::new(RefCell::new(mount(
                &BackgroundOptions::new(Variant::ParticleField).with_seed(4),
                ManualScheduler::new(),
            )));
            observe_appearance(&renderer, &flag).unwrap();
            assert_eq!(flag.subscriber_count(), 1);
        }
        assert_eq!(flag.subscriber_count(), 0);
        flag.toggle();
    }

    #[test]
    fn early_frame_leaves_one_request_through_teardown() {
        let scheduler = ManualScheduler::new();
        let mut renderer = mount(
            &BackgroundOptions::new(Variant::WireframeSolid).with_seed(1),
            scheduler.clone(),
        );
        let outstanding = renderer.pending_frame().unwrap();

        renderer
            .on_frame(FrameHandle(outstanding.0 + 1), FrameInfo::new(0, 0.0, 0.0))
            .unwrap();
        assert_eq!(renderer.frames_rendered(), 0);
        assert_eq!(scheduler.requested(), 1);
        assert_eq!(renderer.pending_frame(), Some(outstanding));

        renderer.teardown();
        assert!(scheduler.pending().is_none());
        assert_eq!(scheduler.cancelled(), 1);
    }
}
