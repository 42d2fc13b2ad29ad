use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use cpal::traits::*;
use cpal::SampleFormat;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use blit_synth::config::Config;
use blit_synth::midi_controller::MidiController;
use blit_synth::synth_controller::SynthController;
use blit_synth::{audio, midi, BlitSynth, ParamStore};

const EVENT_QUEUE_SIZE: usize = 1024;
const FAULT_QUEUE_SIZE: usize = 16;


#[derive(StructOpt)]
struct PlayOpt {
    #[structopt(short = "k", long = "keyboard")]
    /// The MIDI channel the synthesizer listens on for keyboard events.
    midi_keyboard_channel: u8,

    #[structopt(short = "c", long = "controller")]
    /// The MIDI channel the synthesizer listens on for controller events.
    midi_controller_channel: u8,

    #[structopt(long, parse(from_os_str))]
    /// TOML file with the initial patch and controller bindings.
    config: Option<PathBuf>,

    #[structopt(required = true)]
    input_midi_ports: Vec<String>,
}

#[derive(StructOpt)]
#[structopt(about = "A band-limited subtractive software synth.")]
enum SynthOpt {
    /// List all available MIDI ports.
    ListMIDI,

    /// Play the software synth.
    Play(PlayOpt),
}


fn play(opt: PlayOpt) -> Result<()> {
    let config = match &opt.config {
        Some(path) => {
            let config = Config::from_toml(path)?;
            tracing::info!(
                "loaded {} with {} controller bindings",
                path.display(),
                config.buttons.bindings().len()
            );
            config
        }
        None => Config::default(),
    };

    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device available"))?;

    let supported_config = device
        .supported_output_configs()?
        .next()
        .ok_or_else(|| anyhow!("output device has no supported config"))?
        .with_max_sample_rate();

    let sample_format = supported_config.sample_format();
    let stream_config: cpal::StreamConfig = supported_config.into();
    tracing::info!(
        "playing on {} at {} Hz, {} channels",
        device.name().unwrap_or_else(|_| "unknown device".to_owned()),
        stream_config.sample_rate.0,
        stream_config.channels
    );

    let params = Arc::new(ParamStore::new(&config.patch));
    let synth = BlitSynth::new(stream_config.sample_rate.0 as f32);

    let (midi_event_queue, _midi_connections) = midi::connect_to_ports(opt.input_midi_ports)?;
    let (kb_event_sender, kb_event_queue) = mpsc::sync_channel(EVENT_QUEUE_SIZE);
    let mut kb_ctrlr = MidiController::new(
        kb_event_sender,
        params.clone(),
        config.buttons,
        opt.midi_keyboard_channel,
        opt.midi_controller_channel,
    );
    let synth_ctrlr = SynthController::new(synth, kb_event_queue, params);

    let (fault_sender, fault_queue) = mpsc::sync_channel(FAULT_QUEUE_SIZE);
    let _stream = match sample_format {
        SampleFormat::F32 => audio::run::<f32, _>(&device, &stream_config, synth_ctrlr, fault_sender),
        SampleFormat::I16 => audio::run::<i16, _>(&device, &stream_config, synth_ctrlr, fault_sender),
        SampleFormat::U16 => audio::run::<u16, _>(&device, &stream_config, synth_ctrlr, fault_sender),
    }?;

    loop {
        match midi_event_queue.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => kb_ctrlr.handle_midi_event(event),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => bail!("all MIDI inputs closed"),
        }

        for fault in fault_queue.try_iter() {
            tracing::warn!("{}", fault);
        }
    }
}


fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opt = SynthOpt::from_args();

    match opt {
        SynthOpt::ListMIDI => {
            println!("Available devices:");
            for device_name in midi::list_devices()? {
                println!("{}", device_name);
            }
        }

        SynthOpt::Play(playopt) => {
            return play(playopt);
        }
    }

    Ok(())
}
