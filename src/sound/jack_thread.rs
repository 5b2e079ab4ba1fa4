//! connects the engine to a jack server
//!
//! One mono input, one mono output.  The rate and block size come from the
//! server, get negotiated into the engine, and are handed back to the caller
//! so the control side can size its own buffers.  A later sample rate change
//! is forwarded to the engine as a command, and a buffer size change arrives
//! through the process handler's buffer_size callback, which jack invokes
//! outside the real-time context; the audio callback itself never
//! reallocates.
use jack;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::sleep;
use std::time::Duration;

use crate::common::box_error::BoxError;
use crate::sound::BlockProcessor;

use super::dsp_engine::DspEngine;
use super::param_message::{DspParam, ParamMessage};

pub fn run(
    mut engine: DspEngine,
    command_tx: mpsc::Sender<ParamMessage>, // so notifications can talk to the engine
    negotiated_tx: mpsc::Sender<(usize, usize)>, // (sample_rate, block_size) back to the control side
    running: Arc<AtomicBool>,
) -> Result<(), BoxError> {
    // let's open up a jack port
    let (client, _status) = jack::Client::new("pitchbox", jack::ClientOptions::NO_START_SERVER)?;

    let in_port = client.register_port("input", jack::AudioIn::default())?;
    let out_port = client.register_port("output", jack::AudioOut::default())?;

    let sample_rate = client.sample_rate();
    let block_size = client.buffer_size() as usize;
    engine.negotiate(sample_rate, block_size)?;
    negotiated_tx.send((sample_rate, block_size))?;

    let process = EngineProcessor {
        engine,
        in_port,
        out_port,
    };

    // Activate the client, which starts the processing.
    let active_client = client.activate_async(Notifications::new(command_tx), process)?;

    // Connect system capture to us and our output to playback
    active_client
        .as_client()
        .connect_ports_by_name("system:capture_1", "pitchbox:input")?;
    active_client
        .as_client()
        .connect_ports_by_name("pitchbox:output", "system:playback_1")?;

    while running.load(Ordering::Relaxed) {
        sleep(Duration::from_millis(200));
    }
    active_client.deactivate()?;
    Ok(())
}

struct EngineProcessor {
    engine: DspEngine,
    in_port: jack::Port<jack::AudioIn>,
    out_port: jack::Port<jack::AudioOut>,
}

impl jack::ProcessHandler for EngineProcessor {
    // The callback gets called by jack whenever we have a frame
    fn process(&mut self, _: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
        let in_p = self.in_port.as_slice(ps);
        let out_p = self.out_port.as_mut_slice(ps);
        if self.engine.process(in_p, out_p) {
            jack::Control::Continue
        } else {
            jack::Control::Quit
        }
    }

    // jack calls this outside the process cycle, so resizing is safe here
    fn buffer_size(&mut self, _: &jack::Client, size: jack::Frames) -> jack::Control {
        BlockProcessor::on_block_size_changed(&mut self.engine, size as usize);
        jack::Control::Continue
    }
}

struct Notifications {
    command_tx: mpsc::Sender<ParamMessage>,
}

impl Notifications {
    fn new(command_tx: mpsc::Sender<ParamMessage>) -> Notifications {
        Notifications { command_tx }
    }
}

impl jack::NotificationHandler for Notifications {
    fn thread_init(&self, _: &jack::Client) {
        info!("JACK: thread init");
    }

    fn shutdown(&mut self, status: jack::ClientStatus, reason: &str) {
        warn!(
            "JACK: shutdown with status {:?} because \"{}\"",
            status, reason
        );
    }

    fn sample_rate(&mut self, _: &jack::Client, srate: jack::Frames) -> jack::Control {
        info!("JACK: sample rate changed to {}", srate);
        let _res = self
            .command_tx
            .send(ParamMessage::new(DspParam::SetSampleRate, srate as i64, 0.0));
        jack::Control::Continue
    }

    fn xrun(&mut self, _: &jack::Client) -> jack::Control {
        warn!("JACK: xrun occurred");
        jack::Control::Continue
    }
}
