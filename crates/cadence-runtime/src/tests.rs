#[cfg(test)]
mod tests {
    use crate::*;
    use cadence_core::*;
    use parking_lot::Mutex;
    use std::cell::{Cell, RefCell};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use web_time::Instant;

    type Log = Arc<Mutex<Vec<String>>>;

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    fn count(log: &Log, entry: &str) -> usize {
        log.lock().iter().filter(|e| e.as_str() == entry).count()
    }

    fn surface() -> RecordingSurface {
        let _ = env_logger::builder().is_test(true).try_init();
        RecordingSurface::new(320.0, 240.0)
    }

    fn poll_for(ui: &mut Scheduler, dur: Duration) {
        let start = Instant::now();
        while start.elapsed() < dur {
            ui.poll();
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Screen that writes every callback to a shared log.
    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Recorder {
        fn screen(name: &'static str, log: &Log) -> Screen {
            Screen::new(Recorder {
                name,
                log: log.clone(),
            })
        }

        fn push(&self, what: String) {
            self.log.lock().push(format!("{} {}", self.name, what));
        }
    }

    impl ScreenHandler for Recorder {
        fn key_pressed(&self, _ui: &mut Scheduler, code: KeyCode) {
            self.push(format!("key {}", code.0));
        }
        fn key_repeated(&self, _ui: &mut Scheduler, code: KeyCode) {
            self.push(format!("repeat {}", code.0));
        }
        fn pointer_pressed(&self, _ui: &mut Scheduler, points: &[Point]) {
            self.push(format!("pressed {},{}", points[0].x, points[0].y));
        }
        fn pointer_released(&self, _ui: &mut Scheduler, points: &[Point]) {
            self.push(format!("released {},{}", points[0].x, points[0].y));
        }
        fn long_pointer_press(&self, _ui: &mut Scheduler, point: Point) {
            self.push(format!("long {},{}", point.x, point.y));
        }
        fn show_notify(&self, _ui: &mut Scheduler) {
            self.push("show".into());
        }
        fn hide_notify(&self, _ui: &mut Scheduler) {
            self.push("hide".into());
        }
        fn shown(&self, _ui: &mut Scheduler) {
            self.push("shown".into());
        }
        fn paint(&self, surface: &mut dyn Surface, _region: Rect) {
            surface.draw_text(Vec2::default(), self.name, Color::BLACK);
        }
    }

    struct Blank;

    impl ScreenHandler for Blank {
        fn paint(&self, _surface: &mut dyn Surface, _region: Rect) {}
    }

    #[test]
    fn test_serial_calls_keep_per_producer_order() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let ui = runtime.init(surface()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::<(usize, usize)>::new()));

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let handle = runtime.handle();
                let seen = seen.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        let seen = seen.clone();
                        handle
                            .call_serially(move |_| seen.lock().push((p, i)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        runtime
            .handle()
            .call_serially(|ui| ui.handle().shutdown())
            .unwrap();
        ui.run();

        let seen = seen.lock();
        assert_eq!(seen.len(), 100);
        for p in 0..4 {
            let order: Vec<usize> = seen.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
            assert_eq!(order, (0..25).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_calls_queued_during_a_batch_run_in_the_next_one() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();

        let l = log.clone();
        ui.call_serially(move |ui| {
            l.lock().push("a".into());
            let l = l.clone();
            ui.call_serially(move |_| l.lock().push("c".into()));
        });
        let l = log.clone();
        ui.call_serially(move |_| l.lock().push("b".into()));

        ui.poll();
        assert_eq!(entries(&log), vec!["a", "b"]);
        ui.poll();
        assert_eq!(entries(&log), vec!["a", "b", "c"]);
        ui.poll();
        assert_eq!(entries(&log).len(), 3);
    }

    #[test]
    fn test_fault_requeues_rest_of_batch() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        let faults = Rc::new(Cell::new(None::<FaultStage>));
        let f = faults.clone();
        ui.set_error_listener(move |fault| {
            assert_eq!(fault.message, "boom");
            f.set(Some(fault.stage));
        });

        let l = log.clone();
        ui.call_serially(move |_| l.lock().push("a".into()));
        ui.call_serially(|_| panic!("boom"));
        let l = log.clone();
        ui.call_serially(move |_| l.lock().push("b".into()));

        ui.poll();
        assert_eq!(entries(&log), vec!["a"]);
        assert_eq!(faults.get(), Some(FaultStage::Serial));
        assert_eq!(runtime.handle().pending_calls(), 1);

        ui.poll();
        assert_eq!(entries(&log), vec!["a", "b"]);
        assert_eq!(ui.stats().faults, 1);
    }

    struct Steps {
        name: &'static str,
        left: u32,
        log: Log,
        fail_cleanup: bool,
    }

    impl Transition for Steps {
        fn init(&mut self, _source: Option<&Screen>, _destination: &Screen) {
            self.log.lock().push(format!("init {}", self.name));
        }
        fn step(&mut self) {
            self.log.lock().push(format!("step {}", self.name));
            self.left -= 1;
        }
        fn is_finished(&self) -> bool {
            self.left == 0
        }
        fn paint(&self, _surface: &mut dyn Surface, _source: Option<&Screen>, _dest: &Screen) {}
        fn cleanup(&mut self) {
            self.log.lock().push(format!("cleanup {}", self.name));
            if self.fail_cleanup {
                panic!("cleanup failed");
            }
        }
    }

    #[test]
    fn test_transitions_play_one_at_a_time() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let screens = new_log();
        let steps = new_log();

        let a = Recorder::screen("a", &screens);
        ui.show(a, None);
        let b = Recorder::screen("b", &screens);
        let c = Recorder::screen("c", &screens);
        ui.show(
            b,
            Some(Box::new(Steps {
                name: "t1",
                left: 2,
                log: steps.clone(),
                fail_cleanup: false,
            })),
        );
        ui.show(
            c.clone(),
            Some(Box::new(Steps {
                name: "t2",
                left: 2,
                log: steps.clone(),
                fail_cleanup: false,
            })),
        );
        assert_eq!(ui.pending_transitions(), 2);
        assert_eq!(ui.transition_phase(), Some(TransitionPhase::Pending));

        for _ in 0..4 {
            ui.poll();
        }

        assert_eq!(
            entries(&steps),
            vec![
                "init t1", "step t1", "step t1", "cleanup t1", "init t2", "step t2", "step t2",
                "cleanup t2"
            ]
        );
        // b was only ever a pass-through destination
        assert_eq!(entries(&screens), vec!["a shown", "c shown"]);
        assert!(ui.current().unwrap().ptr_eq(&c));
        assert_eq!(ui.pending_transitions(), 0);
        assert_eq!(ui.stats().transition_frames, 2);
    }

    #[test]
    fn test_plain_show_waits_behind_running_transition() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let screens = new_log();
        let steps = new_log();

        ui.show(Recorder::screen("a", &screens), None);
        ui.show(
            Recorder::screen("b", &screens),
            Some(Box::new(Steps {
                name: "t1",
                left: 3,
                log: steps.clone(),
                fail_cleanup: false,
            })),
        );
        let c = Recorder::screen("c", &screens);
        ui.show(c.clone(), None);
        assert_eq!(ui.pending_transitions(), 2);

        for _ in 0..5 {
            ui.poll();
        }
        assert!(ui.current().unwrap().ptr_eq(&c));
        assert_eq!(entries(&screens), vec!["a shown", "c shown"]);
    }

    struct Exploding;

    impl Transition for Exploding {
        fn step(&mut self) {
            panic!("bad frame");
        }
        fn is_finished(&self) -> bool {
            false
        }
        fn paint(&self, _surface: &mut dyn Surface, _source: Option<&Screen>, _dest: &Screen) {}
    }

    #[test]
    fn test_faulting_transition_is_aborted_and_committed() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let stage = Rc::new(Cell::new(None));
        let s = stage.clone();
        ui.set_error_listener(move |fault| s.set(Some(fault.stage)));

        ui.show(Screen::new(Blank), None);
        let b = Screen::new(Blank);
        ui.show(b.clone(), Some(Box::new(Exploding)));
        ui.poll();

        assert_eq!(stage.get(), Some(FaultStage::Transition));
        assert!(ui.current().unwrap().ptr_eq(&b));
        assert_eq!(ui.pending_transitions(), 0);
    }

    #[test]
    fn test_cleanup_fault_keeps_next_transition() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let screens = new_log();
        let steps = new_log();
        let stages = Rc::new(RefCell::new(Vec::new()));
        let s = stages.clone();
        ui.set_error_listener(move |fault| s.borrow_mut().push(fault.stage));

        ui.show(Recorder::screen("a", &screens), None);
        ui.show(
            Recorder::screen("b", &screens),
            Some(Box::new(Steps {
                name: "t1",
                left: 1,
                log: steps.clone(),
                fail_cleanup: true,
            })),
        );
        let c = Recorder::screen("c", &screens);
        ui.show(
            c.clone(),
            Some(Box::new(Steps {
                name: "t2",
                left: 2,
                log: steps.clone(),
                fail_cleanup: false,
            })),
        );

        for _ in 0..6 {
            ui.poll();
        }

        assert_eq!(
            entries(&steps),
            vec!["init t1", "step t1", "cleanup t1", "init t2", "step t2", "step t2", "cleanup t2"]
        );
        assert_eq!(*stages.borrow(), vec![FaultStage::Transition]);
        assert_eq!(entries(&screens), vec!["a shown", "c shown"]);
        assert!(ui.current().unwrap().ptr_eq(&c));
    }

    struct Grumpy;

    impl ScreenHandler for Grumpy {
        fn shown(&self, _ui: &mut Scheduler) {
            panic!("not today");
        }
        fn paint(&self, _surface: &mut dyn Surface, _region: Rect) {}
    }

    #[test]
    fn test_commit_fault_after_transition_fault_is_contained() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let messages = Rc::new(RefCell::new(Vec::new()));
        let m = messages.clone();
        ui.set_error_listener(move |fault| m.borrow_mut().push(fault.message.clone()));

        ui.show(Screen::new(Blank), None);
        let grumpy = Screen::new(Grumpy);
        ui.show(grumpy.clone(), Some(Box::new(Exploding)));

        assert!(catch_unwind(AssertUnwindSafe(|| ui.poll())).is_ok());
        assert_eq!(*messages.borrow(), vec!["bad frame", "not today"]);
        assert!(ui.current().unwrap().ptr_eq(&grumpy));
        assert_eq!(ui.stats().faults, 2);

        let log = new_log();
        let l = log.clone();
        ui.call_serially(move |_| l.lock().push("still running".into()));
        ui.poll();
        assert_eq!(entries(&log), vec!["still running"]);
    }

    #[test]
    fn test_panicking_error_listener_is_contained() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        ui.set_error_listener(|_| panic!("listener down"));

        ui.call_serially(|_| panic!("first"));
        let l = log.clone();
        ui.call_serially(move |_| l.lock().push("after".into()));

        assert!(catch_unwind(AssertUnwindSafe(|| ui.poll())).is_ok());
        ui.poll();
        assert_eq!(entries(&log), vec!["after"]);
        assert_eq!(ui.stats().faults, 1);
    }

    #[test]
    fn test_slide_transition_paints_until_done() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let recording = surface();
        let mut ui = runtime.init(recording.clone()).unwrap();
        let log = new_log();

        ui.show(Recorder::screen("a", &log), None);
        ui.poll();
        recording.take_ops();

        let b = Recorder::screen("b", &log);
        let spec = AnimationSpec::tween(Duration::from_millis(30), Easing::Linear);
        ui.show(b.clone(), Some(Box::new(Slide::new(SlideDirection::Left, spec))));

        let start = Instant::now();
        while ui.pending_transitions() > 0 && start.elapsed() < Duration::from_secs(2) {
            ui.poll();
            thread::sleep(Duration::from_millis(2));
        }

        assert!(ui.current().unwrap().ptr_eq(&b));
        assert!(ui.stats().transition_frames >= 1);
        let ops = recording.take_ops();
        assert!(ops.iter().any(|op| matches!(op, DrawOp::Translate(v) if v.x != 0.0)));
    }

    #[test]
    fn test_invoke_and_block_keeps_loop_serviced() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let join = runtime.spawn(surface(), |_| {}).unwrap();
        let handle = runtime.handle();
        let log = new_log();
        let (tx, rx) = mpsc::channel();

        let l = log.clone();
        handle
            .call_serially(move |ui| {
                let h = ui.handle();
                let inner = l.clone();
                let result = ui.invoke_and_block(move || {
                    h.call_serially(move |_| inner.lock().push("serial".into()))?;
                    thread::sleep(Duration::from_millis(50));
                    Ok(7)
                });
                l.lock().push("returned".into());
                tx.send(result.map_err(|e| e.to_string())).unwrap();
            })
            .unwrap();

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok(7));
        assert_eq!(entries(&log), vec!["serial", "returned"]);

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn test_invoke_and_block_reports_work_errors() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();

        let err = ui
            .invoke_and_block(|| -> anyhow::Result<()> {
                Err(std::io::Error::other("disk gone").into())
            })
            .unwrap_err();
        assert_eq!(err.downcast_ref::<std::io::Error>().unwrap().to_string(), "disk gone");

        let err = ui
            .invoke_and_block(|| -> anyhow::Result<()> { panic!("kaboom") })
            .unwrap_err();
        match err.downcast_ref::<SchedulerError>() {
            Some(SchedulerError::WorkPanicked(msg)) => assert_eq!(msg, "kaboom"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ui.stats().faults, 0);
    }

    #[test]
    fn test_handle_invoke_and_block_runs_in_place() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let join = runtime.spawn(surface(), |_| {}).unwrap();
        let handle = runtime.handle();

        let here = thread::current().id();
        let ran_on = handle.invoke_and_block(|| Ok(thread::current().id())).unwrap();
        assert_eq!(ran_on, here);

        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn test_modal_times_out_and_restores_previous_screen() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let a = Screen::new(Blank);
        ui.show(a.clone(), None);

        let start = Instant::now();
        let outcome = ui
            .show_modal(Screen::new(Blank), None, Some(Duration::from_millis(100)))
            .unwrap();

        assert!(outcome.is_timed_out());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(500), "timed out after {elapsed:?}");
        assert!(ui.current().unwrap().ptr_eq(&a));
        assert!(ui.modal_session().is_none());
    }

    struct Outer {
        log: Log,
    }

    impl ScreenHandler for Outer {
        fn key_pressed(&self, ui: &mut Scheduler, code: KeyCode) {
            match code.0 {
                1 => {
                    ui.handle().key_pressed(KeyCode(2)).unwrap();
                    let inner = Screen::new(Inner {
                        log: self.log.clone(),
                    });
                    let outcome = ui.show_modal(inner, None, None).unwrap();
                    assert_eq!(outcome.value::<&str>(), Some("inner value"));
                    self.log.lock().push("inner returned".into());
                }
                3 => {
                    self.log.lock().push("outer disposed".into());
                    ui.dispose_modal();
                }
                _ => {}
            }
        }
        fn paint(&self, _surface: &mut dyn Surface, _region: Rect) {}
    }

    struct Inner {
        log: Log,
    }

    impl ScreenHandler for Inner {
        fn key_pressed(&self, ui: &mut Scheduler, code: KeyCode) {
            if code.0 == 2 {
                ui.handle().key_pressed(KeyCode(3)).unwrap();
                self.log.lock().push("inner disposed".into());
                ui.modal_session().unwrap().dispose_with("inner value");
            }
        }
        fn paint(&self, _surface: &mut dyn Surface, _region: Rect) {}
    }

    #[test]
    fn test_nested_modals_return_innermost_first() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        let a = Screen::new(Blank);
        ui.show(a.clone(), None);

        runtime.handle().key_pressed(KeyCode(1)).unwrap();
        let outcome = ui
            .show_modal(Screen::new(Outer { log: log.clone() }), None, None)
            .unwrap();

        assert!(matches!(outcome, ModalOutcome::Disposed(None)));
        assert_eq!(
            entries(&log),
            vec!["inner disposed", "inner returned", "outer disposed"]
        );
        assert!(ui.current().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_modal_disposed_from_another_thread() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        ui.show(Screen::new(Blank), None);

        let (tx, rx) = mpsc::channel::<ModalSession>();
        ui.call_serially(move |ui| {
            let session = ui.modal_session().unwrap();
            tx.send(session).unwrap();
        });
        let disposer = thread::spawn(move || {
            let session = rx.recv().unwrap();
            thread::sleep(Duration::from_millis(20));
            session.dispose_with(42u32);
        });

        let outcome = ui.show_modal(Screen::new(Blank), None, None).unwrap();
        disposer.join().unwrap();
        assert_eq!(outcome.value::<u32>(), Some(42));
    }

    #[test]
    fn test_nesting_limit() {
        let config = SchedulerConfig::default().with_max_nesting_depth(1);
        let runtime = Runtime::new(config);
        let mut ui = runtime.init(surface()).unwrap();
        ui.show(Screen::new(Blank), None);

        let refused = Arc::new(AtomicBool::new(false));
        let r = refused.clone();
        ui.call_serially(move |ui| {
            let modal = ui.show_modal(Screen::new(Blank), None, None);
            let invoke = ui.invoke_and_block(|| Ok(()));
            let invoke_refused = matches!(
                invoke.unwrap_err().downcast_ref::<SchedulerError>(),
                Some(SchedulerError::NestingTooDeep(1))
            );
            r.store(
                matches!(modal, Err(SchedulerError::NestingTooDeep(1))) && invoke_refused,
                Ordering::SeqCst,
            );
            ui.dispose_modal();
        });

        let outcome = ui.show_modal(Screen::new(Blank), None, None).unwrap();
        assert!(matches!(outcome, ModalOutcome::Disposed(None)));
        assert!(refused.load(Ordering::SeqCst));
    }

    struct Ticker(Cell<u32>);

    impl Animated for Ticker {
        fn animate(&self) -> bool {
            self.0.set(self.0.get() + 1);
            false
        }
    }

    #[test]
    fn test_framerate_throttles_animation_ticks() {
        let runtime = Runtime::new(SchedulerConfig::default().with_framerate(20));
        let mut ui = runtime.init(surface()).unwrap();
        let screen = Screen::new(Blank);
        let ticker = Rc::new(Ticker(Cell::new(0)));
        screen.register_animated(ticker.clone());
        ui.show(screen, None);

        let handle = runtime.handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            handle.shutdown();
        });
        ui.run();
        stopper.join().unwrap();

        let ticks = ticker.0.get();
        assert!((3..=9).contains(&ticks), "{ticks} ticks at 20 fps over 300ms");
    }

    #[test]
    fn test_no_sleep_ticks_every_iteration() {
        let runtime = Runtime::new(SchedulerConfig::default().with_no_sleep(true));
        let mut ui = runtime.init(surface()).unwrap();
        let screen = Screen::new(Blank);
        let ticker = Rc::new(Ticker(Cell::new(0)));
        screen.register_animated(ticker.clone());
        screen.register_animated(ticker.clone());
        ui.show(screen.clone(), None);

        for _ in 0..10 {
            ui.poll();
        }
        assert_eq!(ticker.0.get(), 10);
        assert_eq!(ui.stats().frames, 10);

        let member: Rc<dyn Animated> = ticker.clone();
        screen.deregister_animated(&member);
        ui.poll();
        assert_eq!(ticker.0.get(), 10);
    }

    #[test]
    fn test_input_keeps_per_producer_order() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        ui.show(Recorder::screen("a", &log), None);

        let producers: Vec<_> = (0..4i32)
            .map(|p| {
                let handle = runtime.handle();
                thread::spawn(move || {
                    for i in 0..25 {
                        handle.key_pressed(KeyCode(p * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        ui.poll();

        let keys: Vec<i32> = entries(&log)
            .iter()
            .filter_map(|e| e.strip_prefix("a key "))
            .map(|k| k.parse().unwrap())
            .collect();
        assert_eq!(keys.len(), 100);
        for p in 0..4 {
            let order: Vec<i32> = keys.iter().filter(|k| *k / 100 == p).map(|k| k % 100).collect();
            assert_eq!(order, (0..25).collect::<Vec<_>>());
        }
        assert_eq!(ui.stats().input_events, 100);
    }

    struct Touchy {
        log: Log,
    }

    impl ScreenHandler for Touchy {
        fn key_pressed(&self, _ui: &mut Scheduler, code: KeyCode) {
            if code.0 == 2 {
                panic!("key two");
            }
            self.log.lock().push(format!("key {}", code.0));
        }
        fn paint(&self, _surface: &mut dyn Surface, _region: Rect) {}
    }

    #[test]
    fn test_input_fault_drops_rest_of_drained_batch() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        let stage = Rc::new(Cell::new(None));
        let s = stage.clone();
        ui.set_error_listener(move |fault| s.set(Some(fault.stage)));
        ui.show(Screen::new(Touchy { log: log.clone() }), None);

        let handle = runtime.handle();
        for code in 1..=3 {
            handle.key_pressed(KeyCode(code)).unwrap();
        }
        ui.poll();
        assert_eq!(entries(&log), vec!["key 1"]);
        assert_eq!(stage.get(), Some(FaultStage::Input));

        ui.poll();
        assert_eq!(entries(&log), vec!["key 1"]);
        handle.key_pressed(KeyCode(4)).unwrap();
        ui.poll();
        assert_eq!(entries(&log), vec!["key 1", "key 4"]);
    }

    #[test]
    fn test_click_dispatches_press_then_release() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        ui.show(Recorder::screen("a", &log), None);

        let handle = runtime.handle();
        handle.pointer_pressed(&[5], &[6]).unwrap();
        handle.pointer_released(&[5], &[6]).unwrap();
        ui.poll();

        assert_eq!(
            entries(&log),
            vec!["a shown", "a pressed 5,6", "a released 5,6"]
        );
        assert_eq!(ui.stats().input_events, 2);
    }

    #[test]
    fn test_usage_errors() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let handle = runtime.handle();
        assert!(matches!(
            handle.key_pressed(KeyCode(1)),
            Err(SchedulerError::NotInitialized)
        ));
        assert!(matches!(
            handle.call_serially(|_| {}),
            Err(SchedulerError::NotInitialized)
        ));
        let err = handle.invoke_and_block(|| Ok(())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SchedulerError>(),
            Some(SchedulerError::NotInitialized)
        ));

        let ui = runtime.init(surface()).unwrap();
        assert!(matches!(
            runtime.init(surface()),
            Err(SchedulerError::AlreadyInitialized)
        ));
        assert!(handle.is_scheduler_thread());
        assert!(matches!(
            handle.call_serially_and_wait(|_| ()),
            Err(SchedulerError::IllegalUsage(_))
        ));
        let err = handle.invoke_and_block(|| Ok(())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SchedulerError>(),
            Some(SchedulerError::IllegalUsage(_))
        ));

        drop(ui);
        assert!(!runtime.is_initialized());
        let _again = runtime.init(surface()).unwrap();
    }

    #[test]
    fn test_manual_identity_tracks_scheduler_thread() {
        let ids = ManualThreads::new(ThreadTag(1));
        let runtime = Runtime::with_identity(SchedulerConfig::default(), ids.clone());
        let _ui = runtime.init(surface()).unwrap();
        let handle = runtime.handle();

        assert!(handle.is_scheduler_thread());
        ids.enter(ThreadTag(2));
        assert!(!handle.is_scheduler_thread());
        let ran = handle.invoke_and_block(|| Ok(5)).unwrap();
        assert_eq!(ran, 5);
    }

    #[test]
    fn test_call_serially_and_wait() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let join = runtime.spawn(surface(), |_| {}).unwrap();
        let handle = runtime.handle();

        assert_eq!(handle.call_serially_and_wait(|ui| ui.size()).unwrap(), (320, 240));

        let err = handle
            .call_serially_and_wait(|_| -> u32 { panic!("nope") })
            .unwrap_err();
        assert!(matches!(err, SchedulerError::WorkPanicked(ref m) if m == "nope"));

        // loop survived the fault
        assert!(handle.call_serially_and_wait(|ui| ui.stats().faults).unwrap() >= 1);

        handle.shutdown();
        join.join().unwrap();
        assert!(matches!(
            handle.call_serially(|_| {}),
            Err(SchedulerError::NotInitialized)
        ));
    }

    #[test]
    fn test_teardown_wakes_waiters() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let ui = runtime.init(surface()).unwrap();
        let handle = runtime.handle();

        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.call_serially_and_wait(|_| 1))
        };
        while handle.pending_calls() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        drop(ui);

        assert!(matches!(
            waiter.join().unwrap(),
            Err(SchedulerError::ShutDown)
        ));
    }

    #[test]
    fn test_key_repeat() {
        let config =
            SchedulerConfig::default().with_key_repeat(Duration::from_millis(30), Duration::from_millis(10));
        let runtime = Runtime::new(config);
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        ui.show(Recorder::screen("a", &log), None);
        let handle = runtime.handle();

        handle.key_pressed(KeyCode(7)).unwrap();
        poll_for(&mut ui, Duration::from_millis(100));
        handle.key_released(KeyCode(7)).unwrap();
        ui.poll();
        let repeats = count(&log, "a repeat 7");
        assert!(repeats >= 2, "only {repeats} repeats");

        poll_for(&mut ui, Duration::from_millis(50));
        assert_eq!(count(&log, "a repeat 7"), repeats);
    }

    #[test]
    fn test_long_press_and_drag_cancel() {
        let config = SchedulerConfig::default().with_long_press_delay(Duration::from_millis(40));
        let runtime = Runtime::new(config);
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        ui.show(Recorder::screen("a", &log), None);
        let handle = runtime.handle();

        handle.pointer_pressed(&[3], &[4]).unwrap();
        poll_for(&mut ui, Duration::from_millis(100));
        handle.pointer_released(&[3], &[4]).unwrap();
        ui.poll();
        assert_eq!(count(&log, "a long 3,4"), 1);

        handle.pointer_pressed(&[3], &[4]).unwrap();
        handle.pointer_dragged(&[60], &[4]).unwrap();
        poll_for(&mut ui, Duration::from_millis(100));
        assert_eq!(count(&log, "a long 3,4"), 1);
    }

    #[test]
    fn test_reduced_mode_holds_input_until_first_screen() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        let log = new_log();
        let handle = runtime.handle();

        handle.key_pressed(KeyCode(9)).unwrap();
        let l = log.clone();
        handle
            .call_serially(move |_| l.lock().push("serial".into()))
            .unwrap();
        ui.poll();
        assert_eq!(entries(&log), vec!["serial"]);
        assert_eq!(ui.stats().input_events, 0);

        ui.show(Recorder::screen("a", &log), None);
        ui.poll();
        assert_eq!(entries(&log), vec!["serial", "a shown", "a key 9"]);
    }

    #[test]
    fn test_default_error_notice() {
        let config =
            SchedulerConfig::default().with_error_notice_timeout(Some(Duration::from_millis(50)));
        let runtime = Runtime::new(config);
        let recording = surface();
        let mut ui = runtime.init(recording.clone()).unwrap();
        let a = Screen::new(Blank);
        ui.show(a.clone(), None);

        ui.call_serially(|_| panic!("broken"));
        ui.poll();

        let texts = recording.texts();
        assert!(texts.iter().any(|t| t == "Error"));
        assert!(texts.iter().any(|t| t == "serial fault: broken"));
        assert!(ui.current().unwrap().ptr_eq(&a));
        assert_eq!(ui.stats().faults, 1);
    }

    #[test]
    fn test_hide_suspends_painting() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let recording = surface();
        let mut ui = runtime.init(recording.clone()).unwrap();
        let log = new_log();
        let screen = Recorder::screen("a", &log);
        ui.show(screen.clone(), None);
        ui.poll();
        assert_eq!(recording.flushes(), 1);

        let handle = runtime.handle();
        handle.hide_notify().unwrap();
        ui.poll();
        screen.repaint();
        ui.poll();
        assert_eq!(recording.flushes(), 1);

        handle.show_notify().unwrap();
        ui.poll();
        assert_eq!(recording.flushes(), 2);
        assert_eq!(entries(&log), vec!["a shown", "a hide", "a show"]);
    }

    #[test]
    fn test_dirty_regions_collapse() {
        let screen = Screen::new(Blank);
        let full = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(screen.take_dirty(full).len(), 0);

        for i in 0..6 {
            screen.repaint_region(Rect::new(i as f32 * 10.0, 0.0, 5.0, 5.0));
        }
        let regions = screen.take_dirty(full);
        assert!(regions.len() <= 4);
        assert!(!screen.is_dirty());

        screen.repaint_region(Rect::new(1.0, 1.0, 1.0, 1.0));
        screen.repaint();
        assert_eq!(screen.take_dirty(full).as_slice(), &[full]);
    }

    #[test]
    fn test_resize_updates_size() {
        let runtime = Runtime::new(SchedulerConfig::default());
        let mut ui = runtime.init(surface()).unwrap();
        ui.show(Screen::new(Blank), None);
        assert_eq!(ui.size(), (320, 240));

        runtime.handle().size_changed(640, 480).unwrap();
        ui.poll();
        assert_eq!(ui.size(), (640, 480));
    }
}
