// Purpose: voices and the realtime mix
// A TablePlayer makes the sound, a PlaybackEvent decides how long it lasts,
// and the Mixer runs all of them inside the audio callback.

pub mod event;
pub mod message;
pub mod mixer;
pub mod player;

pub use event::{EventState, PlaybackEvent};
pub use message::{VoiceCommand, VoiceHandle};
pub use mixer::{Mixer, MixerControl, MixerStats};
pub use player::{PlayerError, TablePlayer};
