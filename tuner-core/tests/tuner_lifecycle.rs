//! Controller scenarios driven through an in-memory capture backend.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tuner_core::{CaptureBackend, CaptureError, FrameSource, Tuner, TunerConfig};

const SAMPLE_RATE: u32 = 44_100;
const FRAME: usize = 2048;

fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..FRAME)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

#[derive(Debug, Default)]
struct Log {
    open_attempts: usize,
    disconnected: usize,
    released: usize,
    live: usize,
    max_live: usize,
    leaked: usize,
}

type Feed = Rc<RefCell<VecDeque<Vec<f32>>>>;

struct TestBackend {
    feed: Feed,
    log: Rc<RefCell<Log>>,
    open_failures: VecDeque<CaptureError>,
    fail_disconnect: bool,
}

impl TestBackend {
    fn new() -> (Self, Feed, Rc<RefCell<Log>>) {
        let feed = Feed::default();
        let log = Rc::new(RefCell::new(Log::default()));
        let backend = Self {
            feed: Rc::clone(&feed),
            log: Rc::clone(&log),
            open_failures: VecDeque::new(),
            fail_disconnect: false,
        };
        (backend, feed, log)
    }
}

impl CaptureBackend for TestBackend {
    type Source = TestSource;

    fn open(&mut self, _config: &TunerConfig) -> Result<TestSource, CaptureError> {
        let mut log = self.log.borrow_mut();
        log.open_attempts += 1;
        if let Some(e) = self.open_failures.pop_front() {
            return Err(e);
        }
        log.live += 1;
        log.max_live = log.max_live.max(log.live);
        Ok(TestSource {
            feed: Rc::clone(&self.feed),
            log: Rc::clone(&self.log),
            fail_disconnect: self.fail_disconnect,
            released: false,
        })
    }
}

struct TestSource {
    feed: Feed,
    log: Rc<RefCell<Log>>,
    fail_disconnect: bool,
    released: bool,
}

impl FrameSource for TestSource {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn next_frame(&mut self) -> Option<Vec<f32>> {
        self.feed.borrow_mut().pop_front()
    }

    fn disconnect(&mut self) -> Result<(), CaptureError> {
        self.log.borrow_mut().disconnected += 1;
        if self.fail_disconnect {
            Err(CaptureError::Device("source stuck".into()))
        } else {
            Ok(())
        }
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        if !self.released {
            self.released = true;
            let mut log = self.log.borrow_mut();
            log.released += 1;
            log.live -= 1;
        }
        Ok(())
    }
}

impl Drop for TestSource {
    fn drop(&mut self) {
        if !self.released {
            self.log.borrow_mut().leaked += 1;
        }
    }
}

#[test]
fn open_a_string_then_silence() {
    let (backend, feed, _log) = TestBackend::new();
    let mut tuner = Tuner::new(backend, TunerConfig::default());
    tuner.start().unwrap();
    assert!(tuner.is_listening());
    assert_eq!(tuner.sample_rate(), Some(SAMPLE_RATE));

    for _ in 0..10 {
        feed.borrow_mut().push_back(sine(110.0, 0.3));
        let reading = tuner.tick().expect("open A string should be detected");
        assert_eq!(reading.note_name, "A");
        assert!(reading.cents.abs() < 5, "cents {}", reading.cents);
        assert!(reading.in_tune);
        assert!((reading.frequency_hz - 110.0).abs() < 1.1);
    }

    feed.borrow_mut().push_back(vec![0.0; FRAME]);
    assert_eq!(tuner.tick(), None);
    assert_eq!(tuner.reading(), None);
    assert_eq!(tuner.frames_processed(), 11);
}

#[test]
fn tick_without_frames_keeps_the_display() {
    let (backend, feed, _log) = TestBackend::new();
    let mut tuner = Tuner::new(backend, TunerConfig::default());
    tuner.start().unwrap();

    assert_eq!(tuner.tick(), None);

    feed.borrow_mut().push_back(sine(196.0, 0.3));
    let reading = tuner.tick().unwrap();
    assert_eq!(reading.note_name, "G");
    assert_eq!(tuner.tick(), Some(reading));
}

#[test]
fn frames_are_processed_in_arrival_order() {
    let (backend, feed, _log) = TestBackend::new();
    let mut tuner = Tuner::new(backend, TunerConfig::default());
    tuner.start().unwrap();

    feed.borrow_mut().push_back(sine(440.0, 0.3));
    feed.borrow_mut().push_back(sine(146.83, 0.3));
    let reading = tuner.tick().unwrap();
    assert_eq!(reading.note_name, "D");
    assert_eq!(tuner.frames_processed(), 2);
}

#[test]
fn idle_tuner_does_not_tick() {
    let (backend, feed, log) = TestBackend::new();
    let mut tuner = Tuner::new(backend, TunerConfig::default());
    feed.borrow_mut().push_back(sine(110.0, 0.3));

    assert_eq!(tuner.tick(), None);
    assert_eq!(tuner.frames_processed(), 0);
    assert_eq!(log.borrow().open_attempts, 0);
    assert!(tuner.stop().is_ok());
}

#[test]
fn permission_denied_leaves_tuner_off_until_retriggered() {
    let (mut backend, feed, log) = TestBackend::new();
    backend.open_failures.push_back(CaptureError::PermissionDenied);
    let mut tuner = Tuner::new(backend, TunerConfig::default());

    assert_eq!(tuner.start(), Err(CaptureError::PermissionDenied));
    assert!(!tuner.is_listening());
    assert_eq!(tuner.last_error(), Some(&CaptureError::PermissionDenied));

    // No retry behind the user's back.
    feed.borrow_mut().push_back(sine(110.0, 0.3));
    assert_eq!(tuner.tick(), None);
    assert_eq!(log.borrow().open_attempts, 1);

    tuner.start().unwrap();
    assert!(tuner.is_listening());
    assert_eq!(tuner.last_error(), None);
    assert_eq!(tuner.tick().map(|r| r.note_name), Some("A"));
}

#[test]
fn restarting_tears_down_the_old_session_first() {
    let (backend, _feed, log) = TestBackend::new();
    let mut tuner = Tuner::new(backend, TunerConfig::default());

    tuner.start().unwrap();
    tuner.start().unwrap();
    tuner.start().unwrap();

    let log = log.borrow();
    assert_eq!(log.open_attempts, 3);
    assert_eq!(log.disconnected, 2);
    assert_eq!(log.released, 2);
    assert_eq!(log.max_live, 1);
    assert_eq!(log.leaked, 0);
}

#[test]
fn stop_finishes_teardown_when_disconnect_fails() {
    let (mut backend, feed, log) = TestBackend::new();
    backend.fail_disconnect = true;
    let mut tuner = Tuner::new(backend, TunerConfig::default());
    tuner.start().unwrap();

    feed.borrow_mut().push_back(sine(329.63, 0.3));
    assert!(tuner.tick().is_some());

    assert!(matches!(tuner.stop(), Err(CaptureError::Device(_))));
    assert!(!tuner.is_listening());
    assert_eq!(tuner.reading(), None);

    let log = log.borrow();
    assert_eq!(log.disconnected, 1);
    assert_eq!(log.released, 1);
    assert_eq!(log.live, 0);
}

#[test]
fn stop_is_idempotent() {
    let (backend, _feed, log) = TestBackend::new();
    let mut tuner = Tuner::new(backend, TunerConfig::default());
    tuner.start().unwrap();

    assert!(tuner.stop().is_ok());
    assert!(tuner.stop().is_ok());
    assert_eq!(log.borrow().released, 1);
}

#[test]
fn dropping_the_tuner_releases_the_stream() {
    let (backend, _feed, log) = TestBackend::new();
    {
        let mut tuner = Tuner::new(backend, TunerConfig::default());
        tuner.start().unwrap();
    }
    let log = log.borrow();
    assert_eq!(log.disconnected, 1);
    assert_eq!(log.released, 1);
    assert_eq!(log.leaked, 0);
}

#[test]
fn median_smoothing_hides_a_stray_octave() {
    let (backend, feed, _log) = TestBackend::new();
    let config = TunerConfig {
        smoothing_window: 3,
        ..TunerConfig::default()
    };
    let mut tuner = Tuner::new(backend, config);
    tuner.start().unwrap();

    for freq in [110.0, 110.0, 220.0] {
        feed.borrow_mut().push_back(sine(freq, 0.3));
    }
    let reading = tuner.tick().unwrap();
    assert!(reading.frequency_hz < 150.0, "got {}", reading.frequency_hz);

    // Silence clears the history, so the next reading stands alone.
    feed.borrow_mut().push_back(vec![0.0; FRAME]);
    feed.borrow_mut().push_back(sine(220.0, 0.3));
    let reading = tuner.tick().unwrap();
    assert!(reading.frequency_hz > 200.0, "got {}", reading.frequency_hz);
}
