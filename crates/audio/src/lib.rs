//! mentor-audio – Client Audio fuer den Sprach-Mentor
//!
//! - Mikrofon-Capture via cpal (16 kHz Mono, Frames zu 4096 Samples)
//! - Downmix und Resampling zwischen Geraeteformat und API-Format
//! - PCM16/Base64-Codec fuer den Transport
//! - Lautheitsmessung fuer die Pegelanzeige
//! - Gapless Playback-Scheduler mit Unterbrechung
//! - Lautsprecher-Playback via cpal (24 kHz)
//! - WAV-Kodierung fuer aufgenommene Clips

pub mod backend;
pub mod capture;
pub mod codec;
pub mod device;
pub mod error;
pub mod loudness;
pub mod pipeline;
pub mod playback;
pub mod resample;
pub mod scheduler;
pub mod wav;

// Bequeme Re-Exporte der wichtigsten Typen
pub use backend::{AudioBackend, CaptureSource, CpalBackend};
pub use capture::{record_clip, CaptureConfig, DeviceInput, DEFAULT_CAPTURE_RATE};
pub use device::{format_waehlen, list_devices, AudioDevice, GeraeteFormat, Richtung, GERAET_FRIST};
pub use error::{AudioError, AudioResult};
pub use loudness::loudness;
pub use pipeline::{AudioFrame, CapturePipeline, EncodedFrame, DEFAULT_FRAME_SIZE};
pub use playback::{DeviceOutput, Mixer, PlaybackConfig, DEFAULT_PLAYBACK_RATE};
pub use resample::{downmix, AusgabeWandler, EingangsWandler, Ratenwandler};
pub use scheduler::{PlaybackScheduler, PlaybackSink, PlaybackSlot, SlotId};
pub use wav::{encode_wav, WAV_MIME};
