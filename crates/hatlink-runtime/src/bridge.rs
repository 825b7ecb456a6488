//! [`Bridge`] – the controller loop tying the parent pipe to the board.
//!
//! ```text
//!  control pipe ──▶ LineSource ──▶ run() loop ──▶ Dispatcher ──▶ HardwareRegistry
//!                                                    │
//!  SensorHub callbacks ──▶ DebounceFilter (analog) ──┴──▶ EventEmitter ──▶ output pipe
//! ```
//!
//! Each tick the loop waits up to `poll_timeout` for one control line,
//! dispatches it, then sleeps for `tick`. Sensor callbacks run on whatever
//! thread the [`SensorHub`] delivers them on and write straight to the shared
//! [`EventEmitter`]; the loop never waits on them.
//!
//! # Shutdown
//!
//! The loop ends on a `stop` line, on [`StopHandle::request_stop`], or (when
//! [`BridgeConfig::stop_on_eof`] is set) once the control channel has ended.
//! Shutdown then stops the [`LineSource`], brings every output to rest and
//! writes [`GOODBYE`] with no trailing newline. Nothing is written after it.
//!
//! A stop is noticed within one poll interval plus one tick. The reader
//! thread itself may only exit after its next completed read.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use hatlink_hal::{HardwareRegistry, SensorHub};
use hatlink_middleware::{EventEmitter, LineSource};
use hatlink_types::{Event, LinkError, TouchState, input_index};
use tracing::{debug, info, warn};

use crate::debounce::DebounceFilter;
use crate::dispatcher::{Dispatcher, Flow};

/// Final text written to the output channel on shutdown.
pub const GOODBYE: &str = "Goodbye";

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Timing and shutdown knobs for [`Bridge`].
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Longest wait for a control line in one tick.
    pub poll_timeout: Duration,
    /// Pause after each tick.
    pub tick: Duration,
    /// Minimum delta passed to the sensor hub when subscribing to analog
    /// changes. Applied before the fixed debounce rules.
    pub analog_threshold: f64,
    /// End the loop once the control channel is closed and drained.
    pub stop_on_eof: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            tick: Duration::from_millis(1),
            analog_threshold: 0.01,
            stop_on_eof: false,
        }
    }
}

/// Cloneable handle that asks a running [`Bridge`] to shut down, e.g. from a
/// signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bridge
// ────────────────────────────────────────────────────────────────────────────

pub struct Bridge {
    config: BridgeConfig,
    lines: LineSource,
    dispatcher: Dispatcher,
    emitter: EventEmitter,
    debounce: Arc<DebounceFilter>,
    stop: StopHandle,
    finished: bool,
}

impl Bridge {
    /// Start reading control lines from `reader` and prepare to drive
    /// `registry`. Events go to `emitter`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the reader thread cannot be spawned.
    pub fn start<R>(
        config: BridgeConfig,
        reader: R,
        registry: HardwareRegistry,
        emitter: EventEmitter,
    ) -> Result<Self, LinkError>
    where
        R: BufRead + Send + 'static,
    {
        let lines = LineSource::start(reader)?;
        Ok(Self {
            config,
            lines,
            dispatcher: Dispatcher::new(registry, emitter.clone()),
            emitter,
            debounce: Arc::new(DebounceFilter::new()),
            stop: StopHandle::default(),
            finished: false,
        })
    }

    /// Subscribe to every input on `hub`, forwarding changes as events.
    ///
    /// Analog readings pass through the bridge's [`DebounceFilter`].
    /// Input changes on pins without a known index are dropped.
    pub fn attach_sensors(&self, hub: &mut impl SensorHub) {
        let emitter = self.emitter.clone();
        hub.on_touch(Arc::new(move |channel: u8, state: TouchState| {
            emit_or_warn(&emitter, &Event::touch(channel, state));
        }));

        let emitter = self.emitter.clone();
        hub.on_input_change(Arc::new(move |pin: &str, value: u8| {
            match input_index(pin) {
                Some(index) => emit_or_warn(&emitter, &Event::Input { index, value }),
                None => warn!(pin, value, "input change on unknown pin dropped"),
            }
        }));

        let emitter = self.emitter.clone();
        let debounce = Arc::clone(&self.debounce);
        hub.on_analog_change(
            self.config.analog_threshold,
            Arc::new(move |channel: usize, value: f64| {
                if debounce.observe(channel, value, Instant::now()) {
                    emit_or_warn(&emitter, &Event::Analog { channel, value });
                }
            }),
        );
    }

    /// Handle for stopping the loop from outside it.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn registry(&self) -> &HardwareRegistry {
        self.dispatcher.registry()
    }

    /// `true` once shutdown has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run the controller loop until stopped, then shut down.
    ///
    /// Returns immediately if the bridge has already shut down.
    pub async fn run(&mut self) {
        if self.finished {
            return;
        }
        info!(
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            tick_ms = self.config.tick.as_millis() as u64,
            stop_on_eof = self.config.stop_on_eof,
            "bridge running"
        );

        loop {
            if self.stop.is_stop_requested() {
                info!("stop requested");
                break;
            }
            match self.lines.read_line(Some(self.config.poll_timeout)).await {
                Some(line) => {
                    if self.dispatcher.handle_line(&line) == Flow::Stop {
                        break;
                    }
                }
                None if self.config.stop_on_eof && self.lines.is_exhausted() => {
                    info!("control channel closed; stopping");
                    break;
                }
                None => {}
            }
            tokio::time::sleep(self.config.tick).await;
        }

        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.lines.stop();
        if let Err(e) = self.dispatcher.registry_mut().all_stop() {
            warn!(error = %e, "could not bring every output to rest");
        }
        if let Err(e) = self.emitter.finish(GOODBYE) {
            warn!(error = %e, "could not write shutdown sentinel");
        }
        self.finished = true;
        info!("bridge stopped");
    }
}

fn emit_or_warn(emitter: &EventEmitter, event: &Event) {
    match emitter.emit_event(event) {
        Ok(()) => debug!(%event, "event emitted"),
        Err(e) => warn!(error = %e, %event, "could not emit event"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use hatlink_hal::{Motor, SimBoard, SimSensors, Switch};
    use hatlink_middleware::CaptureSink;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::Mutex;
    use std::sync::mpsc as std_mpsc;
    use std::thread;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Entries `all_stop` appends at shutdown on the recording board.
    const REST_ENTRIES: usize = 4 + 4 + 2;

    struct RecSwitch {
        id: String,
        on: bool,
        journal: Journal,
    }

    impl Switch for RecSwitch {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_state(&mut self, on: bool) -> Result<(), LinkError> {
            self.on = on;
            let state = if on { "on" } else { "off" };
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{state}", self.id));
            Ok(())
        }

        fn state(&self) -> bool {
            self.on
        }
    }

    struct RecMotor {
        id: String,
        speed: i8,
        journal: Journal,
    }

    impl Motor for RecMotor {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_speed(&mut self, speed: i8) -> Result<(), LinkError> {
            self.speed = speed;
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{speed}", self.id));
            Ok(())
        }

        fn speed(&self) -> i8 {
            self.speed
        }
    }

    fn recording_board(journal: &Journal) -> HardwareRegistry {
        let switch = |id: String| {
            Box::new(RecSwitch {
                id,
                on: false,
                journal: Arc::clone(journal),
            })
        };
        let mut board = SimBoard::new();
        for n in 1..=4 {
            board = board
                .with_light(switch(format!("light.{n}")))
                .with_output(switch(format!("output.{n}")));
        }
        for n in 1..=2 {
            board = board.with_motor(Box::new(RecMotor {
                id: format!("motor.{n}"),
                speed: 0,
                journal: Arc::clone(journal),
            }));
        }
        board.build()
    }

    /// Driver calls made before the shutdown rest sequence.
    fn commanded(journal: &Journal) -> Vec<String> {
        let entries = journal.lock().unwrap();
        assert!(entries.len() >= REST_ENTRIES, "shutdown did not rest outputs");
        entries[..entries.len() - REST_ENTRIES].to_vec()
    }

    /// A control channel that stays open until the sender is dropped.
    struct OpenPipe(std_mpsc::Receiver<Vec<u8>>, Vec<u8>);

    impl Read for OpenPipe {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            if self.1.is_empty() {
                match self.0.recv() {
                    Ok(chunk) => self.1 = chunk,
                    Err(_) => return Ok(0),
                }
            }
            let n = out.len().min(self.1.len());
            out[..n].copy_from_slice(&self.1[..n]);
            self.1.drain(..n);
            Ok(n)
        }
    }

    fn open_pipe() -> (std_mpsc::Sender<Vec<u8>>, BufReader<OpenPipe>) {
        let (tx, rx) = std_mpsc::channel();
        (tx, BufReader::new(OpenPipe(rx, Vec::new())))
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            poll_timeout: Duration::from_millis(20),
            ..BridgeConfig::default()
        }
    }

    fn bridge_over(input: &str, journal: &Journal) -> (Bridge, CaptureSink) {
        let capture = CaptureSink::new();
        let bridge = Bridge::start(
            fast_config(),
            Cursor::new(input.as_bytes().to_vec()),
            recording_board(journal),
            EventEmitter::new(capture.clone()),
        )
        .unwrap();
        (bridge, capture)
    }

    async fn run_bounded(bridge: &mut Bridge) {
        tokio::time::timeout(Duration::from_secs(5), bridge.run())
            .await
            .expect("bridge did not stop");
    }

    // ------------------------------------------------------------------
    // Control channel
    // ------------------------------------------------------------------

    #[test]
    fn default_config_matches_protocol_timing() {
        let config = BridgeConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
        assert_eq!(config.tick, Duration::from_millis(1));
        assert!(!config.stop_on_eof);
    }

    #[tokio::test]
    async fn commands_actuate_in_order() {
        let journal = Journal::default();
        let (mut bridge, capture) =
            bridge_over("light.blue:on\noutput.3:off\nmotor.one:50\nstop\n", &journal);

        run_bounded(&mut bridge).await;

        assert_eq!(
            commanded(&journal),
            vec!["light.1:on", "output.3:off", "motor.1:50"]
        );
        assert_eq!(capture.contents(), GOODBYE);
    }

    #[tokio::test]
    async fn stop_alone_writes_only_goodbye() {
        let journal = Journal::default();
        let (mut bridge, capture) = bridge_over("stop\n", &journal);

        run_bounded(&mut bridge).await;

        assert!(bridge.is_finished());
        assert_eq!(capture.contents(), "Goodbye");
        assert!(commanded(&journal).is_empty());
    }

    #[tokio::test]
    async fn invalid_commands_report_errors_without_actuating() {
        let journal = Journal::default();
        let (mut bridge, capture) =
            bridge_over("light.5:on\nmotor.one:150\nhello world\nstop\n", &journal);

        run_bounded(&mut bridge).await;

        assert!(commanded(&journal).is_empty());
        assert_eq!(
            capture.contents(),
            "ERROR: Invalid channel: 5\nERROR: Invalid value: 150\nGoodbye"
        );
    }

    #[tokio::test]
    async fn lines_after_stop_are_ignored() {
        let journal = Journal::default();
        let (mut bridge, capture) = bridge_over("stop\nlight.1:on\nmotor.two:20\n", &journal);

        run_bounded(&mut bridge).await;

        assert!(commanded(&journal).is_empty());
        assert_eq!(capture.contents(), GOODBYE);
    }

    #[tokio::test]
    async fn shutdown_brings_outputs_to_rest() {
        let capture = CaptureSink::new();
        let mut bridge = Bridge::start(
            fast_config(),
            Cursor::new(b"light.2:on\nmotor.two:-30\nstop\n".to_vec()),
            SimBoard::standard().build(),
            EventEmitter::new(capture.clone()),
        )
        .unwrap();

        run_bounded(&mut bridge).await;

        assert!(!bridge.registry().light(1).unwrap().state());
        assert_eq!(bridge.registry().motor(1).unwrap().speed(), 0);
    }

    #[tokio::test]
    async fn closed_channel_keeps_polling_until_stopped() {
        let journal = Journal::default();
        let (mut bridge, capture) = bridge_over("light.1:on\n", &journal);

        let still_running =
            tokio::time::timeout(Duration::from_millis(200), bridge.run()).await;
        assert!(still_running.is_err());
        assert_eq!(capture.contents(), "");

        bridge.stop_handle().request_stop();
        run_bounded(&mut bridge).await;

        assert_eq!(commanded(&journal), vec!["light.1:on"]);
        assert_eq!(capture.contents(), GOODBYE);
    }

    #[tokio::test]
    async fn stop_on_eof_ends_after_draining() {
        let journal = Journal::default();
        let capture = CaptureSink::new();
        let config = BridgeConfig {
            stop_on_eof: true,
            ..fast_config()
        };
        let mut bridge = Bridge::start(
            config,
            Cursor::new(b"light.1:on\noutput.1:on\n".to_vec()),
            recording_board(&journal),
            EventEmitter::new(capture.clone()),
        )
        .unwrap();

        run_bounded(&mut bridge).await;

        assert_eq!(commanded(&journal), vec!["light.1:on", "output.1:on"]);
        assert_eq!(capture.contents(), GOODBYE);
    }

    #[tokio::test]
    async fn stop_handle_interrupts_idle_channel() {
        let journal = Journal::default();
        let capture = CaptureSink::new();
        let (tx, reader) = open_pipe();
        let mut bridge = Bridge::start(
            BridgeConfig::default(),
            reader,
            recording_board(&journal),
            EventEmitter::new(capture.clone()),
        )
        .unwrap();

        let handle = bridge.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.request_stop();
        });

        let started = std::time::Instant::now();
        run_bounded(&mut bridge).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(capture.contents(), GOODBYE);

        // Runs again as a no-op.
        bridge.run().await;
        assert_eq!(capture.contents(), GOODBYE);
        drop(tx);
    }

    // ------------------------------------------------------------------
    // Sensor events
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn sensor_changes_become_events() {
        let journal = Journal::default();
        let (bridge, capture) = bridge_over("", &journal);
        let mut sensors = SimSensors::new();
        bridge.attach_sensors(&mut sensors);

        sensors.press(3);
        sensors.release(3);
        sensors.set_input("two", 1);
        sensors.set_input("seven", 1);
        sensors.set_analog(0, 1.5);
        sensors.set_analog(0, 1.55);
        sensors.set_analog(0, 1.7);

        assert_eq!(
            capture.lines(),
            vec![
                "touch.3:1",
                "touch.3:0",
                "input.2:1",
                "analog.0:1.5",
                "analog.0:1.7",
            ]
        );
    }

    #[tokio::test]
    async fn sensor_events_after_goodbye_are_dropped() {
        let journal = Journal::default();
        let (mut bridge, capture) = bridge_over("stop\n", &journal);
        let mut sensors = SimSensors::new();
        bridge.attach_sensors(&mut sensors);

        run_bounded(&mut bridge).await;
        sensors.press(1);
        sensors.set_analog(2, 0.4);

        assert_eq!(capture.contents(), GOODBYE);
    }

    #[tokio::test]
    async fn concurrent_callbacks_never_tear_lines() {
        const STEPS: usize = 50;

        let journal = Journal::default();
        let (tx, reader) = open_pipe();
        let capture = CaptureSink::new();
        let mut bridge = Bridge::start(
            fast_config(),
            reader,
            recording_board(&journal),
            EventEmitter::new(capture.clone()),
        )
        .unwrap();
        let mut sensors = SimSensors::new();
        bridge.attach_sensors(&mut sensors);

        let mut workers = Vec::new();
        for channel in 0..4 {
            let sensors = sensors.clone();
            workers.push(thread::spawn(move || {
                for step in 0..STEPS {
                    sensors.set_analog(channel, step as f64 * 0.25);
                }
            }));
        }
        {
            let sensors = sensors.clone();
            workers.push(thread::spawn(move || {
                for _ in 0..STEPS {
                    sensors.press(1);
                    sensors.release(1);
                }
            }));
        }

        tx.send(b"light.1:on\nlight.1:off\n".to_vec()).unwrap();
        for w in workers {
            w.join().unwrap();
        }
        tx.send(b"stop\n".to_vec()).unwrap();
        run_bounded(&mut bridge).await;

        let lines = capture.lines();
        assert_eq!(lines.len(), 4 * STEPS + 2 * STEPS);
        for line in &lines {
            let event: Event = line.parse().unwrap_or_else(|e| panic!("torn line: {e}"));
            assert!(!matches!(event, Event::Error { .. }));
        }
        assert!(capture.contents().ends_with("\nGoodbye"));
        assert_eq!(commanded(&journal), vec!["light.1:on", "light.1:off"]);
    }
}
