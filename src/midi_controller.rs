use std::sync::{mpsc, Arc};

use crate::config::ButtonMap;
use crate::midi;
use crate::params::ParamStore;
use crate::synth_controller::SynthEvent;
use crate::util::*;


/// Splits incoming MIDI between the engine and the parameter store.
///
/// Bound controllers on the controller channel turn knobs; everything on the
/// keyboard channel goes to the engine untouched.
pub struct MidiController {
    event_output: mpsc::SyncSender<SynthEvent>,
    params: Arc<ParamStore>,
    buttons: ButtonMap,
    keyboard_channel: u8,
    controller_channel: u8,
}


impl MidiController {
    pub fn new(
        event_output: mpsc::SyncSender<SynthEvent>,
        params: Arc<ParamStore>,
        buttons: ButtonMap,
        keyboard_channel: u8,
        controller_channel: u8,
    ) -> Self {
        Self {
            event_output,
            params,
            buttons,
            keyboard_channel,
            controller_channel,
        }
    }

    pub fn handle_midi_event(&mut self, event: midi::Event) {
        if event.channel == self.controller_channel {
            if let midi::EventContent::Controller { controller, value } = event.content {
                if let Some(param) = self.buttons.lookup(controller) {
                    let value = param.from_controller_value(value);
                    self.params.set(param, value);
                    return;
                }
            }
        }

        if event.channel == self.keyboard_channel {
            let bytes = event.content.to_bytes(event.channel);
            self.send_event(SynthEvent::new(0, bytes));
        }
    }

    fn send_event(&mut self, event: SynthEvent) {
        let r = self.event_output.try_send(event);
        log_if_error("synth event dropped", r);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Binding;
    use crate::midi::{Event, EventContent};
    use crate::params::{ParamId, PatchSettings};

    fn event(channel: u8, content: EventContent) -> Event {
        Event {
            timestamp: 0,
            channel,
            content,
        }
    }

    fn setup(
        keyboard: u8,
        controller: u8,
    ) -> (MidiController, mpsc::Receiver<SynthEvent>, Arc<ParamStore>) {
        let (sender, receiver) = mpsc::sync_channel(16);
        let params = Arc::new(ParamStore::new(&PatchSettings::default()));
        params.take_changes();
        let buttons = ButtonMap::new(vec![Binding {
            controller: 74,
            param: ParamId::FilterFreq,
        }]);
        let ctrl = MidiController::new(sender, params.clone(), buttons, keyboard, controller);
        (ctrl, receiver, params)
    }

    #[test]
    fn keyboard_events_are_forwarded() {
        let (mut ctrl, receiver, _params) = setup(0, 1);
        ctrl.handle_midi_event(event(0, EventContent::NoteOn { key: 60, vel: 90 }));
        ctrl.handle_midi_event(event(0, EventContent::PitchBend { bend: 8192 }));
        ctrl.handle_midi_event(event(2, EventContent::NoteOn { key: 61, vel: 90 }));

        assert_eq!(receiver.try_recv(), Ok(SynthEvent::new(0, [0x90, 60, 90])));
        assert_eq!(receiver.try_recv(), Ok(SynthEvent::new(0, [0xE0, 0, 64])));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn bound_controllers_set_parameters() {
        let (mut ctrl, receiver, params) = setup(0, 1);
        let knob = EventContent::Controller {
            controller: 74,
            value: 0,
        };
        ctrl.handle_midi_event(event(1, knob));

        assert!(receiver.try_recv().is_err());
        assert_eq!(params.take_changes().unwrap().filter_freq, 0.0);

        // Unbound controllers on the controller channel are ignored.
        let other = EventContent::Controller {
            controller: 75,
            value: 10,
        };
        ctrl.handle_midi_event(event(1, other));
        assert!(receiver.try_recv().is_err());
        assert_eq!(params.take_changes(), None);
    }

    #[test]
    fn shared_channel_keeps_unbound_controllers_for_the_engine() {
        let (mut ctrl, receiver, params) = setup(3, 3);
        let pedal = EventContent::Controller {
            controller: 64,
            value: 127,
        };
        let knob = EventContent::Controller {
            controller: 74,
            value: 127,
        };
        ctrl.handle_midi_event(event(3, pedal));
        ctrl.handle_midi_event(event(3, knob));

        assert_eq!(receiver.try_recv(), Ok(SynthEvent::new(0, [0xB3, 64, 127])));
        assert!(receiver.try_recv().is_err());
        assert_eq!(params.take_changes().unwrap().filter_freq, 100.0);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (mut ctrl, receiver, _params) = setup(0, 1);
        for key in 0..20 {
            ctrl.handle_midi_event(event(0, EventContent::NoteOn { key, vel: 1 }));
        }
        assert_eq!(receiver.try_iter().count(), 16);
    }
}
