//! E2E tests for the control loop
//!
//! Runs the full pipeline on the simulated sensor: echo timing, smoothing,
//! presence decision, playback dispatch and the CSV sensor log.

use presence_player::playback::{DisabledPlayback, Playback};
use presence_player::presence::detector::{PlaybackEvent, PresenceDetector};
use presence_player::sensor::clock::{Clock, SimClock};
use presence_player::sensor::distance::DistanceSampler;
use presence_player::sensor::pulse::{PulseTimer, SensorConfig};
use presence_player::sensor::sim::{SimEcho, SimGpio};
use presence_player::signal::filter::SignalFilter;
use presence_player::telemetry::csv::CSV_HEADER;
use presence_player::telemetry::{CsvRecorder, Telemetry};
use presence_player::Orchestrator;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Plays and stops are counted; a track "plays" until stopped
#[derive(Clone, Default)]
struct Speaker {
    plays: Rc<Cell<usize>>,
    stops: Rc<Cell<usize>>,
    busy: Rc<Cell<bool>>,
}

impl Playback for Speaker {
    fn play(&mut self) {
        if !self.busy.get() {
            self.plays.set(self.plays.get() + 1);
            self.busy.set(true);
        }
    }

    fn stop(&mut self) {
        self.stops.set(self.stops.get() + 1);
        self.busy.set(false);
    }

    fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

/// A visitor standing at 40cm between 3s and 6s and again between 9s and 11s
fn visitor(at: Duration) -> SimEcho {
    let s = at.as_secs_f64();
    if (3.0..6.0).contains(&s) || (9.0..11.0).contains(&s) {
        SimEcho::at_distance(40.0)
    } else {
        SimEcho::at_distance(250.0)
    }
}

fn sampler(clock: &SimClock) -> DistanceSampler<SimGpio, SimClock> {
    let config = SensorConfig::default();
    let gpio = SimGpio::new(clock.clone(), config, visitor);
    DistanceSampler::new(PulseTimer::new(gpio, clock.clone(), config).unwrap())
}

#[test]
fn test_two_visits_play_and_stop_twice() {
    let clock = SimClock::new();
    let speaker = Speaker::default();
    let mut orch = Orchestrator::new(
        sampler(&clock),
        SignalFilter::new(),
        PresenceDetector::new(),
        speaker.clone(),
        Vec::<Box<dyn Telemetry>>::new(),
    );

    let mut events = Vec::new();
    while clock.now() < Duration::from_secs(14) {
        let report = orch.tick();
        if report.event != PlaybackEvent::None {
            events.push((report.at, report.event));
        }
        clock.sleep(Duration::from_millis(100));
    }

    let kinds: Vec<PlaybackEvent> = events.iter().map(|(_, e)| *e).collect();
    assert_eq!(
        kinds,
        vec![
            PlaybackEvent::Play,
            PlaybackEvent::Stop,
            PlaybackEvent::Play,
            PlaybackEvent::Stop
        ]
    );
    // each play comes more than the sustain time after the visitor arrived
    assert!(events[0].0 > Duration::from_millis(3500));
    assert!(events[2].0 > Duration::from_millis(9500));
    assert_eq!(speaker.plays.get(), 2);
    assert_eq!(speaker.stops.get(), 2);
    assert!(!speaker.is_busy());
}

#[test]
fn test_run_writes_csv_log() {
    let dir = tempfile::tempdir().unwrap();
    let clock = SimClock::new();
    let recorder = CsvRecorder::create_in(&dir.path().join("logs")).unwrap();
    let path = recorder.path().to_path_buf();

    // cancels itself after 60 records
    struct Limited {
        inner: CsvRecorder,
        left: usize,
        cancel: Rc<AtomicBool>,
    }

    impl Telemetry for Limited {
        fn record(
            &mut self,
            record: &presence_player::TelemetryRecord,
        ) -> Result<(), presence_player::telemetry::TelemetryError> {
            self.left -= 1;
            if self.left == 0 {
                self.cancel.store(true, Ordering::SeqCst);
            }
            self.inner.record(record)
        }
    }

    let cancel = Rc::new(AtomicBool::new(false));
    let orch = Orchestrator::new(
        sampler(&clock),
        SignalFilter::new(),
        PresenceDetector::new(),
        DisabledPlayback::new(),
        Limited {
            inner: recorder,
            left: 60,
            cancel: Rc::clone(&cancel),
        },
    );
    assert_eq!(orch.run(&cancel), 60);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 61);
    assert_eq!(lines[0], CSV_HEADER);

    let detected: Vec<bool> = lines[1..]
        .iter()
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 4, "{}", line);
            let raw: f64 = fields[1].parse().unwrap();
            assert!((2.0..=400.0).contains(&raw));
            fields[3] == "1"
        })
        .collect();

    // far until 3s, close until 6s, far again
    assert!(!detected[..25].iter().any(|&d| d));
    assert!(detected[27..54].iter().all(|&d| d));
    assert!(!detected[57..].iter().any(|&d| d));
}
