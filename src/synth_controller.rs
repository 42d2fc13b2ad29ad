use std::sync::{mpsc, Arc};

use crate::params::ParamStore;
use crate::synth::Synth;
use crate::util::OutputFault;

/// Events handled per block; the rest wait in the queue for the next one.
const MAX_EVENTS_PER_BLOCK: usize = 256;

/// A raw MIDI message to deliver `offset` samples into the next block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SynthEvent {
    pub offset: usize,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl SynthEvent {
    pub fn new(offset: usize, bytes: [u8; 3]) -> Self {
        Self {
            offset,
            status: bytes[0],
            data1: bytes[1],
            data2: bytes[2],
        }
    }
}

/// Owns the engine on the audio thread and feeds it parameters and events.
pub struct SynthController<S: Synth> {
    synth: S,
    event_queue: mpsc::Receiver<SynthEvent>,
    params: Arc<ParamStore>,
    pending: Vec<SynthEvent>,
}

impl<S: Synth> SynthController<S> {
    pub fn new(synth: S, event_queue: mpsc::Receiver<SynthEvent>, params: Arc<ParamStore>) -> Self {
        Self {
            synth,
            event_queue,
            params,
            pending: Vec::with_capacity(MAX_EVENTS_PER_BLOCK),
        }
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    /// Pick up changed parameters and this block's events.
    pub fn pump_events(&mut self) {
        if let Some(settings) = self.params.take_changes() {
            self.synth.apply_settings(&settings);
        }

        self.pending.clear();
        while self.pending.len() < MAX_EVENTS_PER_BLOCK {
            match self.event_queue.try_recv() {
                Ok(event) => self.pending.push(event),
                Err(_) => break,
            }
        }
    }

    /// Render one block, splitting it wherever an event lands.
    ///
    /// Offsets past the end of the block land on its last sample boundary and
    /// an event never lands before the one queued ahead of it.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        mut right: Option<&mut [f32]>,
    ) -> Option<OutputFault> {
        self.pump_events();

        let len = match &right {
            Some(right) => left.len().min(right.len()),
            None => left.len(),
        };

        let mut fault = None;
        let mut done = 0;
        for event in self.pending.iter() {
            let offset = event.offset.min(len).max(done);
            if offset > done {
                let span = render_span(&mut self.synth, left, right.as_deref_mut(), done, offset);
                fault = fault.max(span);
                done = offset;
            }
            self.synth.midi_message(event.status, event.data1, event.data2);
        }

        if done < len {
            fault = fault.max(render_span(&mut self.synth, left, right, done, len));
        }
        fault
    }
}

fn render_span<S: Synth>(
    synth: &mut S,
    left: &mut [f32],
    right: Option<&mut [f32]>,
    start: usize,
    end: usize,
) -> Option<OutputFault> {
    synth.render(&mut left[start..end], right.map(|r| &mut r[start..end]))
}
