//! the DspEngine aggregates the per-block processing paths into a single
//! structure
//!
//! The audio provider calls [`DspEngine::process`] once per block from its
//! real-time thread.  The engine never blocks there: commands arrive over an
//! mpsc channel polled with try_recv, status leaves over another, raw input
//! is tapped into a lock-free ring for the control thread's period
//! estimator, and the estimator's answers come back through [`SynthLink`]
//! atomics.
use std::sync::{mpsc, Arc};

use log::{debug, info, warn};
use num_traits::FromPrimitive;
use ringbuf::{
    traits::{Observer, Producer},
    HeapProd,
};
use serde_json::json;
use simple_error::bail;

use crate::common::{
    box_error::BoxError,
    micro_timer::{get_micro_time, MicroTimer},
};
use crate::dsp::{energy_meter::EnergyPowerMeter, oscillator::ToneOscillator};
use crate::sound::BlockProcessor;

use super::{
    param_message::{DspParam, ParamMessage},
    synth_link::SynthLink,
};

pub const GAIN_MIN: f32 = 0.0;
pub const GAIN_MAX: f32 = 10.0;
/// status update cadence in microseconds
const STATUS_REFRESH: u128 = 500_000;

/// which path produces the output block
#[derive(FromPrimitive, ToPrimitive, Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Passthrough = 0,
    GainAdjust = 1,
    Repeater = 2,
    Tuner = 3,
    Autotune = 4,
}

pub struct DspEngine {
    running: bool,
    mode: Mode,
    gain: f32,
    energy_mode: bool,
    period_mode: bool,
    sample_rate: usize,
    block_size: usize,
    meter: EnergyPowerMeter,
    osc: ToneOscillator,
    tap: HeapProd<f32>,
    link: Arc<SynthLink>,
    status_data_tx: mpsc::Sender<serde_json::Value>,
    command_rx: mpsc::Receiver<ParamMessage>,
    update_timer: MicroTimer,
    now: u128,
}

impl DspEngine {
    pub fn new(
        energy_window_seconds: f32,
        link: Arc<SynthLink>,
        tap: HeapProd<f32>,
        status_data_tx: mpsc::Sender<serde_json::Value>,
        command_rx: mpsc::Receiver<ParamMessage>,
    ) -> DspEngine {
        let now = get_micro_time();
        DspEngine {
            running: true,
            mode: Mode::Passthrough,
            gain: 1.0,
            energy_mode: false,
            period_mode: false,
            sample_rate: 0,
            block_size: 0,
            meter: EnergyPowerMeter::new(energy_window_seconds),
            osc: ToneOscillator::new(),
            tap,
            link,
            status_data_tx,
            command_rx,
            // backdated so the first processed block sends a status snapshot
            update_timer: MicroTimer::new(now.saturating_sub(STATUS_REFRESH + 1), STATUS_REFRESH),
            now,
        }
    }

    /// size every time-based buffer from the negotiated rate and block size
    ///
    /// Degenerate configurations are refused here so the real-time path can
    /// assume its buffers are usable.
    pub fn negotiate(&mut self, sample_rate: usize, block_size: usize) -> Result<(), BoxError> {
        if sample_rate == 0 || block_size == 0 {
            bail!(
                "cannot negotiate {} Hz with {} frame blocks",
                sample_rate,
                block_size
            );
        }
        let blocks = self.meter.negotiate(sample_rate, block_size);
        if blocks == 0 {
            bail!("energy window is shorter than one block");
        }
        self.osc.negotiate(sample_rate);
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        info!(
            "negotiated {} Hz, {} frame blocks, {} block energy window",
            sample_rate, block_size, blocks
        );
        Ok(())
    }

    /// the audio backend renegotiated its rate; re-derive all capacities
    pub fn on_sample_rate_changed(&mut self, sample_rate: usize) -> () {
        if sample_rate == self.sample_rate {
            return;
        }
        if let Err(e) = self.negotiate(sample_rate, self.block_size) {
            warn!("sample rate change rejected: {}", e);
        }
    }

    /// the audio backend renegotiated its block size; re-derive capacities
    pub fn on_block_size_changed(&mut self, block_size: usize) -> () {
        if block_size == self.block_size {
            return;
        }
        if let Err(e) = self.negotiate(self.sample_rate, block_size) {
            warn!("block size change rejected: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
    pub fn get_mode(&self) -> Mode {
        self.mode
    }
    pub fn get_gain(&self) -> f32 {
        self.gain
    }
    pub fn get_energy_mode(&self) -> bool {
        self.energy_mode
    }
    pub fn get_period_mode(&self) -> bool {
        self.period_mode
    }
    pub fn get_energy(&self) -> f32 {
        self.meter.get_energy()
    }
    pub fn get_power(&self) -> f32 {
        self.meter.get_power()
    }

    /// run the selected output path for one block
    fn run_output_path(&mut self, input: &[f32], output: &mut [f32]) -> () {
        match self.mode {
            // Tuner echoes the input; the note matching itself happens on
            // the control thread
            Mode::Passthrough | Mode::Tuner => output.copy_from_slice(input),
            Mode::GainAdjust => {
                for (o, i) in output.iter_mut().zip(input.iter()) {
                    *o = i * self.gain;
                }
            }
            Mode::Repeater => self.synthesize(output, self.link.frequency.load()),
            Mode::Autotune => self.synthesize(output, self.link.tuned_frequency.load()),
        }
    }

    fn synthesize(&mut self, output: &mut [f32], frequency: f32) -> () {
        // nothing drives the tone while period measurement is off
        let frequency = if self.period_mode { frequency } else { -1.0 };
        let amplitude = self.gain * self.link.capture_energy.load();
        self.osc.fill(output, frequency, amplitude);
    }

    /// copy raw input to the control thread's period estimator
    fn tap_input(&mut self, input: &[f32]) -> () {
        if !self.period_mode {
            return;
        }
        // drop whole blocks when the control thread has fallen behind;
        // a partial block would corrupt the gate's energy accounting
        if self.tap.vacant_len() >= input.len() {
            self.tap.push_slice(input);
        }
    }

    // This is where we check for any commands we need to process
    fn check_command(&mut self) -> () {
        match self.command_rx.try_recv() {
            Ok(msg) => {
                self.apply_command(msg);
            }
            Err(_) => (),
        }
    }

    fn apply_command(&mut self, msg: ParamMessage) -> () {
        debug!("engine command: {}", msg);
        match msg.param {
            DspParam::SetOutputMode => match Mode::from_i64(msg.ivalue) {
                Some(mode) => self.set_mode(mode),
                None => warn!("unknown output mode: {}", msg.ivalue),
            },
            DspParam::AdjustGain => self.adjust_gain(msg.fvalue as f32),
            DspParam::ResetGain => self.gain = 1.0,
            DspParam::SetEnergyMode => self.set_energy_mode(msg.ivalue == 1),
            DspParam::SetPeriodMode => self.set_period_mode(msg.ivalue == 1),
            DspParam::SetSampleRate => self.on_sample_rate_changed(msg.ivalue as usize),
            DspParam::StopAudio => self.running = false,
        }
    }

    pub fn set_mode(&mut self, mode: Mode) -> () {
        if matches!(mode, Mode::Repeater | Mode::Tuner | Mode::Autotune) && !self.period_mode {
            // the synthesis paths are useless without period measurement
            self.set_period_mode(true);
            self.gain = 1.0;
        }
        self.mode = mode;
    }

    /// energy and period measurement are mutually exclusive; enabling one
    /// turns the other off
    pub fn set_energy_mode(&mut self, on: bool) -> () {
        self.energy_mode = on;
        if on && self.period_mode {
            self.period_mode = false;
        }
    }

    pub fn set_period_mode(&mut self, on: bool) -> () {
        self.period_mode = on;
        if on && self.energy_mode {
            self.energy_mode = false;
        }
    }

    pub fn adjust_gain(&mut self, delta: f32) -> () {
        self.gain = (self.gain + delta).clamp(GAIN_MIN, GAIN_MAX);
    }

    fn send_status(&mut self) -> () {
        if !self.update_timer.expired(self.now) {
            return;
        }
        self.update_timer.reset(self.now);
        let _res = self.status_data_tx.send(json!({
            "energy": self.meter.get_energy(),
            "power": self.meter.get_power(),
            "gain": self.gain,
            "mode": self.mode as i64,
            "energyMode": self.energy_mode,
            "periodMode": self.period_mode,
            "sampleRate": self.sample_rate as u64,
        }));
    }
}

impl BlockProcessor for DspEngine {
    /// one block in, one block out, called from the real-time thread
    ///
    /// Returns false on a fatal per-block failure; the provider should stop
    /// processing.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> bool {
        if input.len() != output.len() {
            return false;
        }
        self.now = get_micro_time();
        self.check_command();
        self.run_output_path(input, output);
        // measurement runs on the raw input no matter which output path is
        // active, gated only by its own flag
        if self.energy_mode {
            self.meter.add_block(input);
        }
        self.tap_input(input);
        self.send_status();
        self.running
    }

    fn on_block_size_changed(&mut self, block_size: usize) -> () {
        DspEngine::on_block_size_changed(self, block_size);
    }
}

#[cfg(test)]
mod test_dsp_engine {
    use super::*;
    use ringbuf::{
        traits::{Consumer, Split},
        HeapCons, HeapRb,
    };

    struct Harness {
        engine: DspEngine,
        command_tx: mpsc::Sender<ParamMessage>,
        _status_rx: mpsc::Receiver<serde_json::Value>,
        tap_cons: HeapCons<f32>,
        link: Arc<SynthLink>,
    }

    fn build_one() -> Harness {
        let (status_data_tx, _status_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();
        let (tap_prod, tap_cons) = HeapRb::<f32>::new(4096).split();
        let link = Arc::new(SynthLink::new());
        let mut engine = DspEngine::new(
            0.5,
            link.clone(),
            tap_prod,
            status_data_tx,
            command_rx,
        );
        engine.negotiate(48_000, 128).unwrap();
        Harness {
            engine,
            command_tx,
            _status_rx,
            tap_cons,
            link,
        }
    }

    #[test]
    fn rejects_degenerate_negotiation() {
        let mut h = build_one();
        assert!(h.engine.negotiate(0, 128).is_err());
        assert!(h.engine.negotiate(48_000, 0).is_err());
        // a 1ms window at 128 frame blocks holds zero blocks
        let mut engine = DspEngine::new(
            0.001,
            h.link.clone(),
            HeapRb::<f32>::new(16).split().0,
            mpsc::channel().0,
            mpsc::channel().1,
        );
        assert!(engine.negotiate(48_000, 128).is_err());
    }

    #[test]
    fn passthrough_copies_input() {
        let mut h = build_one();
        let input: Vec<f32> = (0..128).map(|i| i as f32 / 128.0).collect();
        let mut output = vec![0.0_f32; 128];
        assert!(h.engine.process(&input, &mut output));
        assert_eq!(input, output);
    }

    #[test]
    fn mismatched_blocks_are_fatal() {
        let mut h = build_one();
        let input = vec![0.0_f32; 128];
        let mut output = vec![0.0_f32; 64];
        assert!(!h.engine.process(&input, &mut output));
    }

    #[test]
    fn gain_stays_clamped() {
        let mut h = build_one();
        h.engine.set_mode(Mode::GainAdjust);
        for _ in 0..500 {
            h.engine.adjust_gain(0.05);
        }
        assert_eq!(h.engine.get_gain(), GAIN_MAX);
        for _ in 0..500 {
            h.engine.adjust_gain(-0.05);
        }
        assert_eq!(h.engine.get_gain(), GAIN_MIN);
    }

    #[test]
    fn gain_mode_scales_input() {
        let mut h = build_one();
        h.engine.set_mode(Mode::GainAdjust);
        h.engine.adjust_gain(1.0); // 1.0 -> 2.0
        let input = vec![0.25_f32; 128];
        let mut output = vec![0.0_f32; 128];
        h.engine.process(&input, &mut output);
        assert!(output.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn measurement_modes_exclude_each_other() {
        let mut h = build_one();
        h.engine.set_period_mode(true);
        assert!(h.engine.get_period_mode());
        h.engine.set_energy_mode(true);
        assert!(h.engine.get_energy_mode());
        assert!(!h.engine.get_period_mode());
        h.engine.set_period_mode(true);
        assert!(!h.engine.get_energy_mode());
        // turning one off does not resurrect the other
        h.engine.set_period_mode(false);
        assert!(!h.engine.get_energy_mode());
        assert!(!h.engine.get_period_mode());
    }

    #[test]
    fn synth_modes_force_period_measurement() {
        let mut h = build_one();
        h.engine.adjust_gain(3.0);
        h.engine.set_energy_mode(true);
        h.engine.set_mode(Mode::Repeater);
        assert!(h.engine.get_period_mode());
        assert!(!h.engine.get_energy_mode());
        assert_eq!(h.engine.get_gain(), 1.0);
    }

    #[test]
    fn repeater_is_silent_without_a_period() {
        let mut h = build_one();
        h.engine.set_mode(Mode::Repeater);
        let input = vec![0.5_f32; 128];
        let mut output = vec![1.0_f32; 128];
        h.engine.process(&input, &mut output);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn repeater_plays_the_linked_frequency() {
        let mut h = build_one();
        h.engine.set_mode(Mode::Repeater);
        h.link.frequency.store(220.0);
        h.link.capture_energy.store(0.5);
        let input = vec![0.0_f32; 128];
        let mut output = vec![0.0_f32; 128];
        h.engine.process(&input, &mut output);
        // gain 1.0 * energy 0.5 scales the sine
        let peak = output.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.0 && peak <= 0.5);
    }

    #[test]
    fn tap_only_runs_in_period_mode() {
        let mut h = build_one();
        let input = vec![0.5_f32; 128];
        let mut output = vec![0.0_f32; 128];
        h.engine.process(&input, &mut output);
        assert_eq!(h.tap_cons.occupied_len(), 0);
        h.engine.set_period_mode(true);
        h.engine.process(&input, &mut output);
        assert_eq!(h.tap_cons.occupied_len(), 128);
    }

    #[test]
    fn block_size_change_rederives_the_energy_window() {
        let mut h = build_one();
        h.engine.set_energy_mode(true);
        BlockProcessor::on_block_size_changed(&mut h.engine, 256);

        let input = vec![1.0_f32; 256]; // energy 256 per block
        let mut output = vec![0.0_f32; 256];
        for _ in 0..150 {
            assert!(h.engine.process(&input, &mut output));
        }
        // 0.5s at 48kHz with 256 frame blocks trims while len + 1 > 93.75,
        // so the window settles at 92 retained block energies
        assert!((h.engine.get_energy() - 92.0 * 256.0).abs() < 1.0);
        assert!((h.engine.get_power() - 92.0).abs() < 0.01);
    }

    #[test]
    fn commands_arrive_through_the_channel() {
        let mut h = build_one();
        h.command_tx
            .send(ParamMessage::new(
                DspParam::SetOutputMode,
                Mode::Autotune as i64,
                0.0,
            ))
            .unwrap();
        let input = vec![0.0_f32; 128];
        let mut output = vec![0.0_f32; 128];
        h.engine.process(&input, &mut output);
        assert_eq!(h.engine.get_mode(), Mode::Autotune);

        h.command_tx
            .send(ParamMessage::new(DspParam::StopAudio, 0, 0.0))
            .unwrap();
        assert!(!h.engine.process(&input, &mut output));
        assert!(!h.engine.is_running());
    }
}
