//! Geraete-Abstraktion fuer die Live-Sitzung
//!
//! Die Sitzung oeffnet Ein- und Ausgabe ueber ein `AudioBackend`.
//! `CpalBackend` nutzt echte Geraete, Tests setzen eigene Backends ein.

use tokio::sync::mpsc;

use crate::capture::{CaptureConfig, DeviceInput};
use crate::error::AudioResult;
use crate::pipeline::EncodedFrame;
use crate::playback::{DeviceOutput, PlaybackConfig};
use crate::scheduler::{PlaybackSink, SlotId};

/// Geoeffnete Mikrofon-Quelle
pub trait CaptureSource: Send {
    /// Beginnt mit der Weitergabe kodierter Frames
    fn start(&mut self) -> AudioResult<()>;

    /// Stoppt die Aufnahme und gibt das Geraet frei. Muss idempotent sein.
    fn close(&mut self);
}

impl CaptureSource for DeviceInput {
    fn start(&mut self) -> AudioResult<()> {
        DeviceInput::start(self)
    }

    fn close(&mut self) {
        DeviceInput::close(self)
    }
}

/// Oeffnet Audio-Geraete fuer eine Sitzung
///
/// Beide `open_*` blockieren den aufrufenden Thread, bis der Stream-Thread
/// das Geraet geoeffnet hat. `CpalBackend` wartet dabei hoechstens
/// `GERAET_FRIST` und meldet danach einen Stream-Fehler.
pub trait AudioBackend: Send {
    type Input: CaptureSource + 'static;
    type Output: PlaybackSink + 'static;

    /// Oeffnet die Ausgabe. Der Receiver liefert abgeschlossene Slots.
    fn open_output(
        &mut self,
        config: &PlaybackConfig,
    ) -> AudioResult<(Self::Output, mpsc::UnboundedReceiver<SlotId>)>;

    /// Fordert das Mikrofon an. Der Receiver liefert kodierte Frames.
    fn open_input(
        &mut self,
        config: &CaptureConfig,
    ) -> AudioResult<(Self::Input, mpsc::Receiver<EncodedFrame>)>;
}

/// Backend ueber cpal mit optionalen Geraetenamen-Filtern
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl CpalBackend {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
        }
    }
}

impl AudioBackend for CpalBackend {
    type Input = DeviceInput;
    type Output = DeviceOutput;

    fn open_output(
        &mut self,
        config: &PlaybackConfig,
    ) -> AudioResult<(DeviceOutput, mpsc::UnboundedReceiver<SlotId>)> {
        DeviceOutput::open(self.output_device.clone(), config.clone())
    }

    fn open_input(
        &mut self,
        config: &CaptureConfig,
    ) -> AudioResult<(DeviceInput, mpsc::Receiver<EncodedFrame>)> {
        DeviceInput::open(self.input_device.clone(), config.clone())
    }
}
