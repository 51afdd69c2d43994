//! Fixed-cadence control loop
//!
//! Owns the whole pipeline for the lifetime of the run:
//! sensor -> filter -> detector -> playback + telemetry.
//! Dropping the orchestrator releases the GPIO and audio backends, so
//! every exit path of [`Orchestrator::run`] cleans up.

use crate::playback::Playback;
use crate::presence::detector::{DetectionState, PlaybackEvent, PresenceDetector};
use crate::sensor::clock::Clock;
use crate::sensor::distance::DistanceSampler;
use crate::sensor::gpio::Gpio;
use crate::signal::filter::{Filtered, SignalFilter};
use crate::telemetry::{Telemetry, TelemetryRecord};
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One measured and smoothed distance
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceSample {
    pub timestamp: DateTime<Local>,
    pub raw_cm: f64,
    pub filtered_cm: f64,
}

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sample: DistanceSample,
    /// Clock time handed to the detector
    pub at: Duration,
    pub state: DetectionState,
    pub event: PlaybackEvent,
    /// The low-pass failed and the window mean was used
    pub fell_back: bool,
}

pub struct Orchestrator<G, C, P, T>
where
    G: Gpio,
    C: Clock,
    P: Playback,
    T: Telemetry,
{
    sampler: DistanceSampler<G, C>,
    filter: SignalFilter,
    detector: PresenceDetector,
    playback: P,
    telemetry: T,
    poll_interval: Duration,
    ticks: u64,
}

impl<G, C, P, T> Orchestrator<G, C, P, T>
where
    G: Gpio,
    C: Clock,
    P: Playback,
    T: Telemetry,
{
    pub fn new(
        sampler: DistanceSampler<G, C>,
        filter: SignalFilter,
        detector: PresenceDetector,
        playback: P,
        telemetry: T,
    ) -> Self {
        Self {
            sampler,
            filter,
            detector,
            playback,
            telemetry,
            poll_interval: crate::DEFAULT_POLL_INTERVAL,
            ticks: 0,
        }
    }

    /// Set the sleep between ticks
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Measure, smooth, detect, then dispatch the event and record telemetry
    pub fn tick(&mut self) -> TickReport {
        let raw_cm = self.sampler.distance_cm();
        let timestamp = Local::now();
        let at = self.sampler.clock().now();

        self.filter.push(raw_cm);
        let filtered = self.filter.filtered().unwrap_or(Filtered::Mean(raw_cm));
        if let Filtered::Fallback { value, reason } = &filtered {
            tracing::warn!(error = %reason, mean = value, "Filtering failed, using window mean");
        }
        let filtered_cm = filtered.value();

        let event = self.detector.update(filtered_cm, at);
        match event {
            PlaybackEvent::Play => {
                tracing::info!(distance_cm = filtered_cm, "Person detected, starting music");
                self.playback.play();
            }
            PlaybackEvent::Stop => {
                tracing::info!(distance_cm = filtered_cm, "Person left, stopping music");
                self.playback.stop();
            }
            PlaybackEvent::None => {}
        }

        let record = TelemetryRecord {
            timestamp,
            raw_cm,
            filtered_cm,
            person_detected: self.detector.person_present(),
        };
        if let Err(e) = self.telemetry.record(&record) {
            tracing::warn!(error = %e, "Failed to record telemetry");
        }

        self.ticks += 1;
        TickReport {
            sample: DistanceSample {
                timestamp,
                raw_cm,
                filtered_cm,
            },
            at,
            state: self.detector.state(),
            event,
            fell_back: filtered.is_fallback(),
        }
    }

    /// Tick until `cancel` is set, then release every resource
    ///
    /// Returns the number of ticks run.
    pub fn run(mut self, cancel: &AtomicBool) -> u64 {
        tracing::info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            threshold_cm = self.detector.threshold_cm(),
            "Presence loop started"
        );

        while !cancel.load(Ordering::SeqCst) {
            self.tick();
            self.sampler.clock().sleep(self.poll_interval);
        }

        let ticks = self.ticks;
        tracing::info!(ticks, "Shutting down...");
        drop(self);
        ticks
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn filter(&self) -> &SignalFilter {
        &self.filter
    }

    pub fn detector(&self) -> &PresenceDetector {
        &self.detector
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn sampler(&self) -> &DistanceSampler<G, C> {
        &self.sampler
    }
}

impl<G, C, P, T> Drop for Orchestrator<G, C, P, T>
where
    G: Gpio,
    C: Clock,
    P: Playback,
    T: Telemetry,
{
    fn drop(&mut self) {
        if self.detector.state() == DetectionState::Present {
            self.playback.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::clock::SimClock;
    use crate::sensor::pulse::{PulseTimer, SensorConfig};
    use crate::sensor::sim::{SimEcho, SimGpio};
    use crate::telemetry::TelemetryError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        plays: usize,
        stops: usize,
    }

    #[derive(Clone, Default)]
    struct CountingPlayback(Rc<RefCell<Calls>>);

    impl Playback for CountingPlayback {
        fn play(&mut self) {
            self.0.borrow_mut().plays += 1;
        }
        fn stop(&mut self) {
            self.0.borrow_mut().stops += 1;
        }
        fn is_busy(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct Collect(Vec<TelemetryRecord>);

    impl Telemetry for Collect {
        fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
            self.0.push(record.clone());
            Ok(())
        }
    }

    fn orchestrator(
        echoes: Vec<SimEcho>,
    ) -> (
        Orchestrator<SimGpio, SimClock, CountingPlayback, Collect>,
        CountingPlayback,
    ) {
        let clock = SimClock::new();
        let config = SensorConfig::default();
        let gpio = SimGpio::scripted(clock.clone(), config, echoes);
        let timer = PulseTimer::new(gpio, clock, config).unwrap();
        let playback = CountingPlayback::default();
        let orchestrator = Orchestrator::new(
            DistanceSampler::new(timer),
            SignalFilter::new(),
            PresenceDetector::new(),
            playback.clone(),
            Collect::default(),
        );
        (orchestrator, playback)
    }

    fn repeat(distance_cm: f64, n: usize) -> Vec<SimEcho> {
        vec![SimEcho::at_distance(distance_cm); n]
    }

    fn tick_spaced(
        orchestrator: &mut Orchestrator<SimGpio, SimClock, CountingPlayback, Collect>,
        n: usize,
    ) -> Vec<TickReport> {
        (0..n)
            .map(|_| {
                let report = orchestrator.tick();
                orchestrator.sampler().clock().advance(Duration::from_millis(100));
                report
            })
            .collect()
    }

    #[test]
    fn test_far_subject_never_plays() {
        let (mut orch, playback) = orchestrator(repeat(200.0, 30));
        let reports = tick_spaced(&mut orch, 30);

        assert!(reports.iter().all(|r| r.event == PlaybackEvent::None));
        assert!(reports.iter().all(|r| r.sample.filtered_cm >= 100.0));
        assert_eq!(playback.0.borrow().plays, 0);
        assert_eq!(orch.telemetry().0.len(), 30);
    }

    #[test]
    fn test_play_only_after_sustain() {
        let (mut orch, playback) = orchestrator(repeat(50.0, 10));
        let reports = tick_spaced(&mut orch, 10);

        let plays: Vec<usize> = reports
            .iter()
            .enumerate()
            .filter(|(_, r)| r.event == PlaybackEvent::Play)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(plays.len(), 1);
        assert_eq!(playback.0.borrow().plays, 1);

        let started = reports[0].at;
        let play = plays[0];
        assert!(reports[play].at - started > Duration::from_millis(500));
        assert!(reports[play - 1].at - started <= Duration::from_millis(500));
    }

    #[test]
    fn test_approach_and_leave() {
        let mut echoes = repeat(200.0, 20);
        echoes.extend(repeat(30.0, 20));
        echoes.extend(repeat(300.0, 30));
        let (mut orch, playback) = orchestrator(echoes);
        let reports = tick_spaced(&mut orch, 70);

        let events: Vec<PlaybackEvent> = reports
            .iter()
            .map(|r| r.event)
            .filter(|e| *e != PlaybackEvent::None)
            .collect();
        assert_eq!(events, vec![PlaybackEvent::Play, PlaybackEvent::Stop]);
        assert_eq!(playback.0.borrow().plays, 1);
        assert_eq!(playback.0.borrow().stops, 1);
        assert!(!orch.detector().is_rearmed());
    }

    #[test]
    fn test_telemetry_person_detected_tracks_streak() {
        let mut echoes = repeat(200.0, 3);
        echoes.extend(repeat(20.0, 3));
        let (mut orch, _) = orchestrator(echoes);
        tick_spaced(&mut orch, 6);

        let records = &orch.telemetry().0;
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| (2.0..=400.0).contains(&r.raw_cm)));
        assert!(!records[0].person_detected);
        // mean of [200, 200, 200, 20, 20, 20] = 110, still above threshold
        assert!(!records[5].person_detected);
    }

    #[test]
    fn test_silent_sensor_reads_max_range() {
        let (mut orch, _) = orchestrator(vec![SimEcho::Silent, SimEcho::StuckHigh]);
        let first = orch.tick();
        let second = orch.tick();
        assert_eq!(first.sample.raw_cm, 400.0);
        assert_eq!(second.sample.raw_cm, 400.0);
        assert_eq!(second.state, DetectionState::Idle);
    }

    #[test]
    fn test_run_stops_on_cancel() {
        struct CancelAfter {
            remaining: usize,
            cancel: Rc<AtomicBool>,
        }

        impl Telemetry for CancelAfter {
            fn record(&mut self, _: &TelemetryRecord) -> Result<(), TelemetryError> {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.cancel.store(true, Ordering::SeqCst);
                }
                Ok(())
            }
        }

        let clock = SimClock::new();
        let config = SensorConfig::default();
        let gpio = SimGpio::new(clock.clone(), config, |_| SimEcho::at_distance(40.0));
        let timer = PulseTimer::new(gpio, clock.clone(), config).unwrap();
        let cancel = Rc::new(AtomicBool::new(false));
        let playback = CountingPlayback::default();
        let orch = Orchestrator::new(
            DistanceSampler::new(timer),
            SignalFilter::new(),
            PresenceDetector::new(),
            playback.clone(),
            CancelAfter {
                remaining: 12,
                cancel: Rc::clone(&cancel),
            },
        );

        let start = clock.now();
        assert_eq!(orch.run(&cancel), 12);
        assert!(clock.now() - start >= Duration::from_millis(1200));

        // Subject still close on exit: the track is stopped during cleanup
        let calls = playback.0.borrow();
        assert_eq!(calls.plays, 1);
        assert_eq!(calls.stops, 1);
    }
}
