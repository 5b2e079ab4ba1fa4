//! top level entry point called by main to run the engine
//!
//! This function wires everything together.  A [`DspEngine`] gets moved into
//! [`jack_thread::run`] on its own thread, where jack drives it block by
//! block.  The calling thread becomes the control loop: it owns the
//! terminal, the [`PeriodEstimator`] and the tuner, and it talks to the
//! engine over an mpsc command channel while raw input comes back through a
//! lock-free tap.  Measurement results flow to the synthesis paths through
//! [`SynthLink`] atomics, so neither side ever blocks on the other.
use crate::{
    common::{box_error::BoxError, config::Config},
    dsp::{period_estimator::PeriodEstimator, tuner},
    sound::{
        dsp_engine::{DspEngine, Mode},
        jack_thread,
        param_message::{DspParam, ParamMessage},
        synth_link::SynthLink,
    },
};
use crossterm::{
    event::{self, Event, KeyCode},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::{debug, error, info, warn};
use ringbuf::{
    traits::{Consumer, Observer, Split},
    HeapCons, HeapRb,
};
use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

/// samples the audio thread can buffer for the estimator before blocks drop
const TAP_CAPACITY: usize = 1 << 16;
/// how long to wait for jack to come up before giving up
const NEGOTIATE_TIMEOUT: Duration = Duration::from_secs(5);
/// key poll timeout, which is also the estimator tick
const CONTROL_TICK: Duration = Duration::from_millis(500);

/// measurement parameters, from defaults, settings.json and the command line
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOpts {
    pub energy_window_seconds: f32,
    pub min_freq: f32,
    pub max_freq: f32,
    pub min_level: f32,
    pub window_seconds: f32,
    pub ring_seconds: f32,
}

impl Default for EngineOpts {
    fn default() -> EngineOpts {
        EngineOpts {
            energy_window_seconds: 0.5,
            min_freq: 60.0,
            max_freq: 600.0,
            min_level: 0.5,
            window_seconds: 0.5,
            ring_seconds: 0.5,
        }
    }
}

impl EngineOpts {
    /// read options from a settings file, falling back to the defaults above
    pub fn from_config(config_file: Option<&str>) -> Result<EngineOpts, BoxError> {
        let base = EngineOpts::default();
        let default_params = json::object! {
            "energy_window_seconds": base.energy_window_seconds,
            "min_freq": base.min_freq,
            "max_freq": base.max_freq,
            "min_level": base.min_level,
            "window_seconds": base.window_seconds,
            "ring_seconds": base.ring_seconds,
        };

        let filename = config_file.unwrap_or("settings.json");
        info!("Using config file: {}", filename);
        let config = Config::build(String::from(filename), default_params).map_err(|e| {
            error!("Issue with config file or parameter: {}", e);
            e
        })?;

        Ok(EngineOpts {
            energy_window_seconds: config.get_f32_value("energy_window_seconds", None)?,
            min_freq: config.get_f32_value("min_freq", None)?,
            max_freq: config.get_f32_value("max_freq", None)?,
            min_level: config.get_f32_value("min_level", None)?,
            window_seconds: config.get_f32_value("window_seconds", None)?,
            ring_seconds: config.get_f32_value("ring_seconds", None)?,
        })
    }
}

/// local mirror of the engine state, so the key loop knows what to display
/// and which measurement to run without asking the audio thread
struct ControlState {
    mode: Mode,
    gain: f32,
    energy_mode: bool,
    period_mode: bool,
    /// energy display vs power display while energy mode is on
    show_energy: bool,
}

pub fn run(opts: EngineOpts) -> Result<(), BoxError> {
    info!("client - starting run function with {:?}", opts);

    let (status_data_tx, status_data_rx) = mpsc::channel();
    let (command_tx, command_rx) = mpsc::channel();
    let (negotiated_tx, negotiated_rx) = mpsc::channel();
    let (tap_prod, tap_cons) = HeapRb::<f32>::new(TAP_CAPACITY).split();
    let link = Arc::new(SynthLink::new());
    let running = Arc::new(AtomicBool::new(true));

    let engine = DspEngine::new(
        opts.energy_window_seconds,
        link.clone(),
        tap_prod,
        status_data_tx,
        command_rx,
    );

    let jack_command_tx = command_tx.clone();
    let jack_running = running.clone();
    let sound_handle = thread::spawn(move || {
        match jack_thread::run(engine, jack_command_tx, negotiated_tx, jack_running) {
            Ok(()) => {
                debug!("jack_thread::run OK");
            }
            Err(e) => {
                error!("Jack thread exited with error {}", e);
            }
        }
    });

    // the control side cannot size its buffers until jack tells us the rate
    let (sample_rate, block_size) = negotiated_rx.recv_timeout(NEGOTIATE_TIMEOUT)?;
    info!(
        "negotiated with jack: {} Hz, {} frame blocks",
        sample_rate, block_size
    );

    let mut estimator = PeriodEstimator::new(
        opts.min_freq,
        opts.max_freq,
        opts.min_level,
        opts.window_seconds,
    );
    estimator.negotiate(opts.ring_seconds, sample_rate)?;

    enable_raw_mode()?;
    let loop_result = control_loop(
        &command_tx,
        &status_data_rx,
        tap_cons,
        &mut estimator,
        &link,
        &running,
        opts.ring_seconds,
        sample_rate,
        block_size,
    );
    disable_raw_mode()?;
    loop_result?;

    if sound_handle.join().is_err() {
        warn!("jack thread panicked");
    }
    info!("client - done");
    Ok(())
}

/// the interactive key loop; returns when the user quits
fn control_loop(
    command_tx: &mpsc::Sender<ParamMessage>,
    status_data_rx: &mpsc::Receiver<serde_json::Value>,
    mut tap_cons: HeapCons<f32>,
    estimator: &mut PeriodEstimator,
    link: &Arc<SynthLink>,
    running: &Arc<AtomicBool>,
    ring_seconds: f32,
    mut sample_rate: usize,
    block_size: usize,
) -> Result<(), BoxError> {
    let mut state = ControlState {
        mode: Mode::Passthrough,
        gain: 1.0,
        energy_mode: false,
        period_mode: false,
        show_energy: true,
    };
    print_banner();

    loop {
        // key poll doubles as the tick timer
        if event::poll(CONTROL_TICK)? {
            if let Event::Key(key) = event::read()? {
                if let KeyCode::Char(c) = key.code {
                    if !handle_key(c, command_tx, estimator, link, &mut state)? {
                        running.store(false, Ordering::Relaxed);
                        return Ok(());
                    }
                }
            }
        }

        if let Some(new_rate) = handle_status_messages(status_data_rx, &state, sample_rate) {
            // the backend renegotiated; all time-based capacities on this
            // side are sized for the old rate
            warn!(
                "sample rate changed from {} to {}, renegotiating",
                sample_rate, new_rate
            );
            estimator.negotiate(ring_seconds, new_rate)?;
            link.reset();
            sample_rate = new_rate;
        }

        if state.period_mode {
            drain_tap(&mut tap_cons, estimator, block_size);
            run_measurement(estimator, link, &state);
        } else {
            // keep the tap from silting up while nobody is reading it
            tap_cons.clear();
        }
    }
}

/// dispatch one key press; false means quit
fn handle_key(
    key: char,
    command_tx: &mpsc::Sender<ParamMessage>,
    estimator: &mut PeriodEstimator,
    link: &Arc<SynthLink>,
    state: &mut ControlState,
) -> Result<bool, BoxError> {
    match key {
        'p' => set_mode(Mode::Passthrough, command_tx, state)?,
        'v' => {
            set_mode(Mode::GainAdjust, command_tx, state)?;
            command_tx.send(ParamMessage::new(DspParam::ResetGain, 0, 0.0))?;
            state.gain = 1.0;
        }
        'r' => set_mode(Mode::Repeater, command_tx, state)?,
        't' => set_mode(Mode::Tuner, command_tx, state)?,
        'a' => set_mode(Mode::Autotune, command_tx, state)?,
        '+' => adjust_gain(0.05, command_tx, state)?,
        '-' => adjust_gain(-0.05, command_tx, state)?,
        'e' => {
            let on = !state.energy_mode;
            command_tx.send(ParamMessage::new(DspParam::SetEnergyMode, on as i64, 0.0))?;
            state.energy_mode = on;
            if on && state.period_mode {
                stop_period_measurement(estimator, link, state);
            }
            print_line(&format!(
                "energy mode {}",
                if on { "on" } else { "off" }
            ));
        }
        'E' => state.show_energy = !state.show_energy,
        'n' => {
            let on = !state.period_mode;
            command_tx.send(ParamMessage::new(DspParam::SetPeriodMode, on as i64, 0.0))?;
            if on {
                state.period_mode = true;
                state.energy_mode = false;
            } else {
                stop_period_measurement(estimator, link, state);
            }
            print_line(&format!(
                "period mode {}",
                if on { "on" } else { "off" }
            ));
        }
        'x' => {
            command_tx.send(ParamMessage::new(DspParam::StopAudio, 0, 0.0))?;
            print_line("bye");
            return Ok(false);
        }
        '?' => print_banner(),
        _ => (),
    }
    Ok(true)
}

fn set_mode(
    mode: Mode,
    command_tx: &mpsc::Sender<ParamMessage>,
    state: &mut ControlState,
) -> Result<(), BoxError> {
    command_tx.send(ParamMessage::new(DspParam::SetOutputMode, mode as i64, 0.0))?;
    state.mode = mode;
    // the engine forces these on too; mirror it so the estimator runs
    if matches!(mode, Mode::Repeater | Mode::Tuner | Mode::Autotune) && !state.period_mode {
        state.period_mode = true;
        state.energy_mode = false;
        state.gain = 1.0;
    }
    print_line(&format!("mode: {:?}", mode));
    Ok(())
}

fn adjust_gain(
    delta: f32,
    command_tx: &mpsc::Sender<ParamMessage>,
    state: &mut ControlState,
) -> Result<(), BoxError> {
    // gain only means something on the scaled and synthesized paths
    if !matches!(state.mode, Mode::GainAdjust | Mode::Repeater | Mode::Autotune) {
        return Ok(());
    }
    command_tx.send(ParamMessage::new(DspParam::AdjustGain, 0, delta as f64))?;
    state.gain = (state.gain + delta).clamp(0.0, 10.0);
    print_line(&format!("gain: {:.2}", state.gain));
    Ok(())
}

fn stop_period_measurement(
    estimator: &mut PeriodEstimator,
    link: &Arc<SynthLink>,
    state: &mut ControlState,
) -> () {
    state.period_mode = false;
    estimator.reset();
    link.reset();
}

/// pull whatever the audio thread tapped since the last tick into the
/// estimator, one block at a time so the capture gate sees real blocks
fn drain_tap(tap_cons: &mut HeapCons<f32>, estimator: &mut PeriodEstimator, block_size: usize) -> () {
    let mut block = vec![0.0_f32; block_size];
    while tap_cons.occupied_len() >= block_size {
        tap_cons.pop_slice(&mut block);
        estimator.add_block(&block);
    }
}

/// one autocorrelation pass, then publish the results to the audio thread
fn run_measurement(
    estimator: &mut PeriodEstimator,
    link: &Arc<SynthLink>,
    state: &ControlState,
) -> () {
    estimator.calculate();
    let freq = estimator.get_freq();
    let note = tuner::nearest_note(freq);
    link.frequency.store(freq);
    link.tuned_frequency.store(note.frequency);
    link.capture_energy.store(estimator.get_capture_energy());
    debug!("period pass: {} Hz -> {}", freq, note);

    print_line(&format!(
        "period: {:.6}  freq: {:.2}",
        estimator.get_period(),
        freq
    ));
    match state.mode {
        Mode::Tuner => {
            print_line(&format!("nearest: {}", note));
            if note.frequency > 0.0 {
                if note.difference.abs() < 0.5 {
                    print_line("in tune");
                } else if note.difference < 0.0 {
                    print_line("come down");
                } else {
                    print_line("come up");
                }
            }
        }
        Mode::Autotune => {
            print_line(&format!("detected: {:.2} Hz  playing: {}", freq, note));
        }
        _ => (),
    }
}

/// drain one status payload; returns a new sample rate when the engine
/// reports one different from what this side negotiated with
fn handle_status_messages(
    status_data_rx: &mpsc::Receiver<serde_json::Value>,
    state: &ControlState,
    sample_rate: usize,
) -> Option<usize> {
    match status_data_rx.try_recv() {
        Ok(m) => {
            debug!("audio thread message: {}", m);
            if state.energy_mode {
                if state.show_energy {
                    print_line(&format!("energy: {:.6}", m["energy"].as_f64().unwrap_or(0.0)));
                } else {
                    print_line(&format!("power: {:.6}", m["power"].as_f64().unwrap_or(0.0)));
                }
            }
            renegotiated_rate(&m, sample_rate)
        }
        Err(mpsc::TryRecvError::Empty) => None,
        Err(mpsc::TryRecvError::Disconnected) => {
            warn!("audio thread: disconnected channel");
            None
        }
    }
}

/// the rate in a status payload, when it is usable and not what we have
fn renegotiated_rate(status: &serde_json::Value, sample_rate: usize) -> Option<usize> {
    match status["sampleRate"].as_u64() {
        Some(rate) if rate > 0 && rate as usize != sample_rate => Some(rate as usize),
        _ => None,
    }
}

fn print_banner() -> () {
    print_line("p: passthrough  v: gain  +/-: adjust  e: energy mode  E: energy/power display");
    print_line("n: period mode  r: repeater  t: tuner  a: autotune  x: exit");
}

// raw mode needs explicit carriage returns
fn print_line(msg: &str) -> () {
    print!("{}\r\n", msg);
    let _res = std::io::stdout().flush();
}

#[cfg(test)]
mod test_engine_opts {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let opts = EngineOpts::default();
        assert_eq!(opts.min_freq, 60.0);
        assert_eq!(opts.max_freq, 600.0);
        assert!(opts.min_freq < opts.max_freq);
        assert!(opts.energy_window_seconds > 0.0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let opts = EngineOpts::from_config(Some("no_such_settings.json")).unwrap();
        assert_eq!(opts, EngineOpts::default());
    }

    #[test]
    fn bad_file_name_is_an_error() {
        assert!(EngineOpts::from_config(Some("Illegal*File$Name")).is_err());
    }
}
