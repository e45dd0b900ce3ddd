#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = desktop::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod desktop {
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::env;
    use std::fmt;
    use std::fs;
    use std::panic::{self, AssertUnwindSafe};
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{anyhow, bail, Context, Result};
    use log::{info, warn};
    use winit::dpi::PhysicalSize;
    use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::keyboard::{KeyCode, PhysicalKey};
    use winit::window::{Window, WindowBuilder};

    use folio_backdrop::app::{print_summary, run_headless, HeadlessRun};
    use folio_backdrop::render::WindowMount;
    use folio_backdrop::{
        observe_appearance, Appearance, AppearanceFlag, BackdropError, BackgroundOptions,
        BackgroundRenderer, FrameHandle, FrameInfo, FrameScheduler, SharedViewport, StaticViewport,
        Variant,
    };

    const DEFAULT_SIZE: (u32, u32) = (1280, 720);
    const DEFAULT_FRAMES: u64 = 60;

    pub(crate) fn run() -> Result<()> {
        let cli = CliOptions::parse(env::args().skip(1))?;
        let options = cli.background_options()?;

        if cli.summary_only {
            return run_summary(&options, &cli);
        }
        if cli.snapshot.is_some() {
            warn!("--snapshot only applies to --summary-only runs; ignoring");
        }
        match run_interactive(&options, cli.appearance()) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --summary-only mode (set DISPLAY or install GPU drivers to enable rendering)."
                    );
                    run_summary(&options, &cli)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn run_summary(options: &BackgroundOptions, cli: &CliOptions) -> Result<()> {
        let run = HeadlessRun {
            frames: cli.frames,
            appearance: cli.appearance(),
            snapshot: cli.snapshot.clone(),
        };
        let viewport = StaticViewport::new(DEFAULT_SIZE.0, DEFAULT_SIZE.1);
        let report = run_headless(options, &run, &viewport)?;
        print_summary(&report);
        Ok(())
    }

    fn run_interactive(options: &BackgroundOptions, appearance: Appearance) -> Result<()> {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
        panic::set_hook(default_hook);
        let event_loop = event_loop
            .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
            .map_err(|err| WindowInitError::from_error("event loop", err))?;

        let (width, height) = (
            options.width.unwrap_or(DEFAULT_SIZE.0),
            options.height.unwrap_or(DEFAULT_SIZE.1),
        );
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(format!("Folio Backdrop - {}", options.variant.name()))
                .with_inner_size(PhysicalSize::new(width, height))
                .build(&event_loop)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let size = window.inner_size();
        let viewport = Arc::new(SharedViewport::new(size.width, size.height));

        let mount = WindowMount::new(Arc::clone(&window));
        let scheduler = WindowScheduler::new(Arc::clone(&window));
        let requested = scheduler.requested();
        let renderer = BackgroundRenderer::mount(Some(&mount), options, &*viewport, scheduler)
            .map_err(|err| {
                if matches!(err, BackdropError::Surface(_)) {
                    anyhow::Error::new(WindowInitError::from_error("GPU surface", err))
                } else {
                    anyhow::Error::new(err)
                }
            })?
            .ok_or_else(|| anyhow!("window mount point unavailable"))?;
        let renderer = Rc::new(RefCell::new(renderer));

        let flag = AppearanceFlag::new(appearance);
        if options.variant.reacts_to_appearance() {
            observe_appearance(&renderer, &flag)?;
            info!("press T to toggle dark mode");
        }

        let started = Instant::now();
        let mut last_time = 0.0;
        let mut frame_number = 0;
        let mut failure: Option<anyhow::Error> = None;

        event_loop
            .run(|event, elwt| {
                elwt.set_control_flow(ControlFlow::Wait);
                match event {
                    Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(size) => {
                            viewport.update(size.width, size.height);
                            renderer.borrow_mut().on_viewport_resize(&*viewport);
                        }
                        WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    physical_key: PhysicalKey::Code(code),
                                    state: ElementState::Pressed,
                                    repeat: false,
                                    ..
                                },
                            ..
                        } => match code {
                            KeyCode::KeyT => flag.toggle(),
                            KeyCode::Escape => elwt.exit(),
                            _ => {}
                        },
                        WindowEvent::RedrawRequested => {
                            let Some(handle) = requested.take() else {
                                return;
                            };
                            let mut renderer = renderer.borrow_mut();
                            let time = started.elapsed().as_secs_f64();
                            let frame = FrameInfo::new(frame_number, time, time - last_time);
                            last_time = time;
                            frame_number += 1;
                            if let Err(err) = renderer.on_frame(handle, frame) {
                                failure = Some(anyhow::Error::new(err).context("frame failed"));
                                elwt.exit();
                            }
                        }
                        _ => {}
                    },
                    Event::LoopExiting => renderer.borrow_mut().teardown(),
                    _ => {}
                }
            })
            .context("event loop terminated abnormally")?;

        println!(
            "Rendered {} frame(s) of {}",
            renderer.borrow().frames_rendered(),
            options.variant.id()
        );
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Turns frame requests into window redraw requests.
    ///
    /// The host takes the requested handle when the redraw arrives; redraws
    /// with no handle waiting are not frames.
    struct WindowScheduler {
        window: Arc<Window>,
        next_id: u64,
        pending: Rc<Cell<Option<FrameHandle>>>,
    }

    impl WindowScheduler {
        fn new(window: Arc<Window>) -> Self {
            Self {
                window,
                next_id: 0,
                pending: Rc::new(Cell::new(None)),
            }
        }

        fn requested(&self) -> Rc<Cell<Option<FrameHandle>>> {
            Rc::clone(&self.pending)
        }
    }

    impl FrameScheduler for WindowScheduler {
        fn request_frame(&mut self) -> folio_backdrop::Result<FrameHandle> {
            self.next_id += 1;
            let handle = FrameHandle(self.next_id);
            self.pending.set(Some(handle));
            self.window.request_redraw();
            Ok(handle)
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            // A redraw already queued with the window still arrives, without a handle.
            if self.pending.get() == Some(handle) {
                self.pending.set(None);
            }
        }
    }

    #[derive(Debug)]
    struct WindowInitError {
        message: String,
    }

    impl WindowInitError {
        fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
            Self {
                message: format!("failed to initialize {stage}: {}", panic_message(panic)),
            }
        }

        fn from_error(stage: &str, err: impl fmt::Display) -> Self {
            Self {
                message: format!("failed to initialize {stage}: {err}"),
            }
        }
    }

    impl fmt::Display for WindowInitError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl std::error::Error for WindowInitError {}

    fn panic_message(panic: Box<dyn Any + Send>) -> String {
        match panic.downcast::<String>() {
            Ok(msg) => *msg,
            Err(panic) => match panic.downcast::<&'static str>() {
                Ok(msg) => (*msg).to_string(),
                Err(_) => "unknown panic".into(),
            },
        }
    }

    const USAGE: &str = "Usage: folio-backdrop <variant|config.xml> [--summary-only] [--frames N] \
                         [--size WxH] [--seed N] [--dark] [--snapshot out.ppm]";

    #[derive(Debug)]
    struct CliOptions {
        source: String,
        summary_only: bool,
        frames: u64,
        size: Option<(u32, u32)>,
        seed: Option<u64>,
        dark: bool,
        snapshot: Option<PathBuf>,
    }

    impl CliOptions {
        fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
            let mut args = args.into_iter();
            let Some(source) = args.next() else {
                bail!("{USAGE}");
            };
            let mut options = Self {
                source,
                summary_only: false,
                frames: DEFAULT_FRAMES,
                size: None,
                seed: None,
                dark: false,
                snapshot: None,
            };
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--summary-only" => options.summary_only = true,
                    "--dark" => options.dark = true,
                    "--frames" => {
                        let value = value_for(&mut args, "--frames")?;
                        options.frames = value
                            .parse()
                            .with_context(|| format!("invalid frame count `{value}`"))?;
                    }
                    "--size" => {
                        let value = value_for(&mut args, "--size")?;
                        options.size = Some(parse_size(&value)?);
                    }
                    "--seed" => {
                        let value = value_for(&mut args, "--seed")?;
                        options.seed = Some(
                            value
                                .parse()
                                .with_context(|| format!("invalid seed `{value}`"))?,
                        );
                    }
                    "--snapshot" => {
                        options.snapshot = Some(PathBuf::from(value_for(&mut args, "--snapshot")?));
                    }
                    other => {
                        bail!("Unknown argument: {other}. {USAGE}");
                    }
                }
            }
            Ok(options)
        }

        fn appearance(&self) -> Appearance {
            Appearance::from_dark(self.dark)
        }

        /// Options from an XML file or a bare variant id, with CLI overrides applied.
        fn background_options(&self) -> Result<BackgroundOptions> {
            let mut options = if self.source.ends_with(".xml") {
                let xml = fs::read_to_string(&self.source)
                    .with_context(|| format!("failed to read {}", self.source))?;
                BackgroundOptions::from_xml(&xml)
                    .with_context(|| format!("failed to parse {}", self.source))?
            } else {
                let variant = Variant::from_id(&self.source).ok_or_else(|| {
                    let known: Vec<_> = Variant::all().iter().map(|variant| variant.id()).collect();
                    anyhow!(
                        "unknown variant `{}`; expected one of {}",
                        self.source,
                        known.join(", ")
                    )
                })?;
                BackgroundOptions::new(variant)
            };
            if let Some((width, height)) = self.size {
                options = options.with_size(width, height);
            }
            if let Some(seed) = self.seed {
                options = options.with_seed(seed);
            }
            Ok(options)
        }
    }

    fn value_for(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
        args.next()
            .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
    }

    fn parse_size(value: &str) -> Result<(u32, u32)> {
        let (width, height) = value
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("invalid size `{value}`; expected WIDTHxHEIGHT"))?;
        let width: u32 = width
            .trim()
            .parse()
            .with_context(|| format!("invalid width in `{value}`"))?;
        let height: u32 = height
            .trim()
            .parse()
            .with_context(|| format!("invalid height in `{value}`"))?;
        if width == 0 || height == 0 {
            bail!("size must be positive, got {value}");
        }
        Ok((width, height))
    }
}
