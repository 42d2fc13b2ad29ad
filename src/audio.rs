use anyhow::Result;
use std::sync::mpsc;

use cpal::traits::*;

use crate::synth::Synth;
use crate::synth_controller::SynthController;
use crate::util::OutputFault;

/// Frames rendered per engine call; longer device buffers are cut into blocks.
pub const MAX_BLOCK: usize = 256;


pub fn run<T, S: Synth + 'static>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut synth_controller: SynthController<S>,
    fault_output: mpsc::SyncSender<OutputFault>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as f32;
    let err_fn = |err| tracing::error!("an error occurred on stream: {}", err);

    let synth = synth_controller.synth_mut();
    synth.allocate_resources(sample_rate, MAX_BLOCK);
    synth.reset();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut left = [0.0f32; MAX_BLOCK];
            let mut right = [0.0f32; MAX_BLOCK];

            for block in data.chunks_mut(MAX_BLOCK * channels) {
                let frames = block.len() / channels;
                let fault = if channels == 1 {
                    synth_controller.process_block(&mut left[..frames], None)
                } else {
                    synth_controller.process_block(&mut left[..frames], Some(&mut right[..frames]))
                };

                // The main thread logs; a full queue just loses the report.
                if let Some(fault) = fault {
                    let _ = fault_output.try_send(fault);
                }

                for (i, frame) in block.chunks_mut(channels).enumerate() {
                    frame[0] = cpal::Sample::from(&left[i]);
                    if channels > 1 {
                        frame[1] = cpal::Sample::from(&right[i]);
                    }
                    for sample in frame.iter_mut().skip(2) {
                        *sample = cpal::Sample::from(&0.0f32);
                    }
                }
            }
        },
        err_fn,
    )?;
    stream.play()?;

    Ok(stream)
}
