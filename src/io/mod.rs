// Purpose - external interfaces: audio devices and sound files

pub mod backend;
#[cfg(feature = "cpal")]
pub mod cpal_backend;
pub mod decoder;
pub mod offline;

pub use backend::{ActiveStream, AudioBackend, BackendError, DeviceInfo, StreamConfig};
#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
pub use decoder::{decode_file, DecodeError, DecodedAudio};
pub use offline::{OfflineBackend, OfflineRenderer};
