use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use cadence_core::prelude::*;
use cadence_runtime::*;

/// Surface that logs instead of drawing.
struct LogSurface {
    size: Size,
    ops: usize,
}

impl LogSurface {
    fn new(width: f32, height: f32) -> Self {
        Self {
            size: Size::new(width, height),
            ops: 0,
        }
    }
}

impl Surface for LogSurface {
    fn size(&self) -> Size {
        self.size
    }
    fn set_clip(&mut self, _clip: Option<Rect>) {}
    fn set_translate(&mut self, _offset: Vec2) {}
    fn set_alpha(&mut self, _alpha: f32) {}
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops += 1;
        log::trace!("fill {rect:?} {color:?}");
    }
    fn draw_text(&mut self, _origin: Vec2, text: &str, _color: Color) {
        self.ops += 1;
        log::info!("text: {text}");
    }
    fn flush(&mut self) {
        log::debug!("flush ({} ops)", self.ops);
        self.ops = 0;
    }
}

struct Home {
    background: Rc<RefCell<AnimatedValue<Color>>>,
}

impl ScreenHandler for Home {
    fn key_pressed(&self, _ui: &mut Scheduler, code: KeyCode) {
        log::info!("home: key {}", code.0);
        let next = if code.0 % 2 == 0 {
            Color::from_hex("#1E88E5")
        } else {
            Color::from_hex("#43A047")
        };
        self.background.borrow_mut().set_target(next);
    }

    fn pointer_released(&self, ui: &mut Scheduler, points: &[Point]) {
        log::info!("home: tap at {:?}", points.first());
        if let Some(current) = ui.current() {
            current.repaint();
        }
    }

    fn long_pointer_press(&self, _ui: &mut Scheduler, point: Point) {
        log::info!("home: long press at {},{}", point.x, point.y);
    }

    fn size_changed(&self, _ui: &mut Scheduler, width: u32, height: u32) {
        log::info!("home: resized to {width}x{height}");
    }

    fn paint(&self, surface: &mut dyn Surface, region: Rect) {
        surface.fill_rect(region, *self.background.borrow().get());
        surface.draw_text(Vec2 { x: 12.0, y: 20.0 }, "home", Color::WHITE);
    }
}

struct Banner;

impl ScreenHandler for Banner {
    fn key_released(&self, ui: &mut Scheduler, _code: KeyCode) {
        ui.dispose_modal();
    }

    fn paint(&self, surface: &mut dyn Surface, region: Rect) {
        surface.fill_rect(region, Color::from_hex("#263238"));
        surface.draw_text(Vec2 { x: 12.0, y: 20.0 }, "banner", Color::WHITE);
    }
}

fn setup(ui: &mut Scheduler) {
    let background = Rc::new(RefCell::new(AnimatedValue::new(
        Color::BLACK,
        AnimationSpec::slow(),
    )));
    let home = Screen::new(Home {
        background: background.clone(),
    });
    home.register_animated(background);
    ui.show(home, None);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = SchedulerConfig::default().with_framerate(30);
    let runtime = Runtime::new(config);
    let scheduler = runtime.spawn(LogSurface::new(480.0, 320.0), setup)?;
    let handle = runtime.handle();

    let producer = {
        let handle = handle.clone();
        thread::spawn(move || -> anyhow::Result<()> {
            handle.key_pressed(KeyCode(1))?;
            handle.key_released(KeyCode(1))?;
            thread::sleep(Duration::from_millis(200));

            handle.pointer_pressed(&[40], &[60])?;
            handle.pointer_released(&[40], &[60])?;
            handle.size_changed(640, 480)?;

            handle.call_serially(|ui| {
                let fade = Fade::new(AnimationSpec::fast());
                match ui.show_modal(
                    Screen::new(Banner),
                    Some(Box::new(fade)),
                    Some(Duration::from_millis(500)),
                ) {
                    Ok(outcome) => log::info!("banner closed: {outcome:?}"),
                    Err(e) => log::warn!("banner failed: {e}"),
                }
            })?;

            // answered from inside the banner's nested loop
            let size = handle.call_serially_and_wait(|ui| ui.size())?;
            log::info!("scheduler reports size {size:?}");

            let answer = handle.invoke_and_block(|| Ok(6 * 7))?;
            log::info!("rendezvous answer {answer}");

            thread::sleep(Duration::from_millis(700));
            let stats = handle.call_serially_and_wait(|ui| ui.stats().clone())?;
            log::info!(
                "{} iterations, {} frames ({:.1} fps), {} paints",
                stats.iterations,
                stats.frames,
                stats.fps(),
                stats.paints
            );
            handle.shutdown();
            Ok(())
        })
    };

    let produced = producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    if produced.is_err() {
        handle.shutdown();
    }
    scheduler
        .join()
        .map_err(|_| anyhow::anyhow!("scheduler thread panicked"))?;
    produced
}
