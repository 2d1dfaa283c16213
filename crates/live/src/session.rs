//! Sitzungssteuerung der Live-Unterhaltung
//!
//! Besitzt alle Ressourcen einer Sitzung in einem Buendel aus `Option`s:
//! Ausgabe samt Scheduler, Mikrofon, Transport und deren Kanaele.
//! `disconnect()` nimmt jede Ressource heraus die vorhanden ist, daher
//! sind Teil-Initialisierung und doppelter Abbau unkritisch.
//!
//! ## Lifecycle
//! 1. `connect()`: Ausgabe oeffnen, Mikrofon anfordern, Transport oeffnen,
//!    auf Bestaetigung warten, erst dann Capture starten
//! 2. `step()`/`run()`: Ereignisse in Ankunftsreihenfolge verarbeiten
//! 3. `disconnect()`: alles freigeben, Zustand zuruecksetzen

use mentor_audio::{
    AudioBackend, CaptureSource, EncodedFrame, PlaybackScheduler, PlaybackSink, SlotId,
};
use mentor_core::{MentorError, Result, SessionId, SessionPhase, SessionStatus};
use mentor_protocol::pcm_mime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::config::LiveConfig;
use crate::transport::{OutboundFrame, Transport, TransportConnector, TransportEvent};

/// Zaehler einer Sitzung
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub fragments_scheduled: u64,
    pub fragments_skipped: u64,
    pub interruptions: u64,
}

/// Ressourcen-Buendel einer Sitzung
struct Ressourcen<O, I, T>
where
    O: PlaybackSink,
{
    playback: Option<PlaybackScheduler<O>>,
    completions: Option<mpsc::UnboundedReceiver<SlotId>>,
    input: Option<I>,
    frames: Option<mpsc::Receiver<EncodedFrame>>,
    transport: Option<T>,
    events: Option<mpsc::Receiver<TransportEvent>>,
}

impl<O, I, T> Default for Ressourcen<O, I, T>
where
    O: PlaybackSink,
{
    fn default() -> Self {
        Self {
            playback: None,
            completions: None,
            input: None,
            frames: None,
            transport: None,
            events: None,
        }
    }
}

impl<O, I, T> Ressourcen<O, I, T>
where
    O: PlaybackSink,
{
    fn leer(&self) -> bool {
        self.playback.is_none()
            && self.completions.is_none()
            && self.input.is_none()
            && self.frames.is_none()
            && self.transport.is_none()
            && self.events.is_none()
    }
}

/// Was `step()` als naechstes bekommen hat
enum Eingang {
    Transport(Option<TransportEvent>),
    Frame(Option<EncodedFrame>),
    Beendet(Option<SlotId>),
}

/// Live-Sitzung mit Audio-Backend `B` und Transport-Connector `C`
pub struct LiveSession<B: AudioBackend, C: TransportConnector> {
    config: LiveConfig,
    backend: B,
    connector: C,
    res: Ressourcen<B::Output, B::Input, C::Session>,
    status: watch::Sender<SessionStatus>,
    stats: SessionStats,
    session_id: Option<SessionId>,
}

impl<B: AudioBackend, C: TransportConnector> LiveSession<B, C> {
    pub fn new(config: LiveConfig, backend: B, connector: C) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            config,
            backend,
            connector,
            res: Ressourcen::default(),
            status,
            stats: SessionStats::default(),
            session_id: None,
        }
    }

    // -----------------------------------------------------------------------
    // Beobachtbarer Zustand
    // -----------------------------------------------------------------------

    /// Aktueller Zustand (Kopie)
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Empfaenger fuer Zustandsaenderungen (Phase, Fehler, Lautheit)
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Playback-Scheduler der laufenden Sitzung
    pub fn playback(&self) -> Option<&PlaybackScheduler<B::Output>> {
        self.res.playback.as_ref()
    }

    // -----------------------------------------------------------------------
    // Verbindungsaufbau
    // -----------------------------------------------------------------------

    /// Baut die Sitzung auf. No-op wenn bereits verbunden oder im Aufbau.
    ///
    /// Bei einem Fehler wird alles bereits Angeforderte freigegeben, der
    /// Zustand kehrt mit Fehlermeldung nach `Idle` zurueck.
    pub async fn connect(&mut self) -> Result<()> {
        let phase = self.status.borrow().phase;
        if phase != SessionPhase::Idle {
            debug!(?phase, "connect() ignoriert, Sitzung bereits aktiv");
            return Ok(());
        }

        let session_id = SessionId::new();
        self.session_id = Some(session_id);
        self.stats = SessionStats::default();
        self.status.send_modify(|s| {
            s.phase = SessionPhase::Connecting;
            s.error = None;
            s.loudness = 0.0;
        });
        info!(%session_id, model = %self.config.model, "Live-Sitzung wird aufgebaut");

        match self.aufbauen().await {
            Ok(()) => {
                self.status
                    .send_modify(|s| s.phase = SessionPhase::Connected);
                info!(%session_id, "Live-Sitzung verbunden");
                Ok(())
            }
            Err(e) => {
                error!(%session_id, "Verbindungsaufbau fehlgeschlagen: {}", e);
                self.abbauen();
                let meldung = e.nutzer_meldung();
                self.status.send_modify(|s| s.error = Some(meldung));
                Err(e)
            }
        }
    }

    async fn aufbauen(&mut self) -> Result<()> {
        self.config.validate()?;

        // 1. Ausgabe
        let (sink, completions) = self
            .backend
            .open_output(&self.config.playback_config())?;
        self.res.playback = Some(PlaybackScheduler::new(sink));
        self.res.completions = Some(completions);

        // 2. Mikrofon
        let (input, frames) = self
            .backend
            .open_input(&self.config.capture_config())?;
        self.res.input = Some(input);
        self.res.frames = Some(frames);
        debug!("Audio-Geraete geoeffnet");

        // 3. Transport
        let (transport, mut events) = self.connector.open(&self.config.setup()).await?;
        self.res.transport = Some(transport);

        match events.recv().await {
            Some(TransportEvent::Opened) => {}
            Some(TransportEvent::Error(msg)) => return Err(MentorError::Verbindung(msg)),
            Some(TransportEvent::Closed(grund)) => {
                return Err(MentorError::Getrennt(
                    grund.unwrap_or_else(|| "vor der Bestaetigung geschlossen".into()),
                ))
            }
            Some(anderes) => {
                return Err(MentorError::UngueltigeNachricht(format!(
                    "Erwartet Setup-Bestaetigung, erhalten: {anderes:?}"
                )))
            }
            None => {
                return Err(MentorError::Getrennt(
                    "Transport ohne Bestaetigung beendet".into(),
                ))
            }
        }
        self.res.events = Some(events);

        // 4. Erst nach Bestaetigung Frames weitergeben
        if let Some(input) = self.res.input.as_mut() {
            input.start()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Abbau
    // -----------------------------------------------------------------------

    /// Gibt alle Ressourcen frei. Aus jedem Zustand aufrufbar, idempotent.
    pub fn disconnect(&mut self) {
        let war_aktiv = !self.res.leer() || self.status.borrow().phase != SessionPhase::Idle;
        self.abbauen();
        if war_aktiv {
            info!(
                session = ?self.session_id,
                gesendet = self.stats.frames_sent,
                verworfen = self.stats.frames_dropped,
                fragmente = self.stats.fragments_scheduled,
                uebersprungen = self.stats.fragments_skipped,
                unterbrechungen = self.stats.interruptions,
                "Live-Sitzung getrennt"
            );
        }
    }

    /// Nimmt jede Ressource heraus und setzt den Zustand zurueck.
    /// Eine Fehlermeldung bleibt stehen.
    fn abbauen(&mut self) {
        if let Some(mut transport) = self.res.transport.take() {
            transport.close();
        }
        self.res.events = None;

        if let Some(mut input) = self.res.input.take() {
            input.close();
        }
        self.res.frames = None;

        if let Some(mut playback) = self.res.playback.take() {
            playback.shutdown();
        }
        self.res.completions = None;

        self.status.send_modify(|s| {
            s.phase = SessionPhase::Idle;
            s.loudness = 0.0;
        });
    }

    // -----------------------------------------------------------------------
    // Ereignisverarbeitung
    // -----------------------------------------------------------------------

    /// Verarbeitet genau ein Ereignis.
    ///
    /// Gibt `false` zurueck sobald die Sitzung nicht mehr verbunden ist.
    pub async fn step(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }

        let eingang = {
            let res = &mut self.res;
            let (Some(events), Some(frames), Some(completions)) = (
                res.events.as_mut(),
                res.frames.as_mut(),
                res.completions.as_mut(),
            ) else {
                return false;
            };

            tokio::select! {
                biased;
                event = events.recv() => Eingang::Transport(event),
                slot = completions.recv() => Eingang::Beendet(slot),
                frame = frames.recv() => Eingang::Frame(frame),
            }
        };

        match eingang {
            Eingang::Transport(Some(event)) => self.on_transport_event(event),
            Eingang::Transport(None) => self.on_transport_event(TransportEvent::Closed(None)),
            Eingang::Frame(Some(frame)) => self.on_frame(frame),
            Eingang::Frame(None) => {
                self.fehlschlag(MentorError::Geraet("Mikrofon-Stream beendet".into()))
            }
            Eingang::Beendet(Some(id)) => {
                if let Some(playback) = self.res.playback.as_mut() {
                    playback.on_completed(id);
                }
            }
            Eingang::Beendet(None) => {
                self.fehlschlag(MentorError::Geraet("Ausgabe-Stream beendet".into()))
            }
        }

        self.is_connected()
    }

    /// Verarbeitet Ereignisse bis die Sitzung endet
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Audio(data) => self.on_fragment(&data),
            TransportEvent::Interrupted => {
                if let Some(playback) = self.res.playback.as_mut() {
                    let gestoppt = playback.interrupt();
                    self.stats.interruptions += 1;
                    info!(gestoppt, "Modell unterbrochen, Playback verworfen");
                }
            }
            TransportEvent::TurnComplete => debug!("Modell-Antwort abgeschlossen"),
            TransportEvent::Opened => trace!("Doppelte Setup-Bestaetigung ignoriert"),
            TransportEvent::Closed(grund) => {
                info!(
                    grund = grund.as_deref().unwrap_or("-"),
                    "Gegenstelle hat die Sitzung beendet"
                );
                self.disconnect();
            }
            TransportEvent::Error(msg) => {
                self.fehlschlag(MentorError::Verbindung(msg));
            }
        }
    }

    fn on_fragment(&mut self, data: &str) {
        let Some(playback) = self.res.playback.as_mut() else {
            return;
        };
        match playback.schedule_fragment(data) {
            Ok(slot) => {
                self.stats.fragments_scheduled += 1;
                trace!(slot = %slot.id, start = slot.start, dauer = slot.duration, "Fragment geplant");
            }
            Err(e) => {
                // Kaputtes Fragment ueberspringen, Sitzung laeuft weiter
                self.stats.fragments_skipped += 1;
                warn!("Audio-Fragment uebersprungen: {}", e);
            }
        }
    }

    fn on_frame(&mut self, frame: EncodedFrame) {
        let loudness = frame.loudness;
        self.status.send_modify(|s| s.loudness = loudness);

        let Some(transport) = self.res.transport.as_mut() else {
            self.stats.frames_dropped += 1;
            return;
        };
        let outbound = OutboundFrame {
            mime_type: pcm_mime(frame.sample_rate),
            data: frame.data,
        };
        match transport.send(outbound) {
            Ok(()) => self.stats.frames_sent += 1,
            Err(e) => {
                self.stats.frames_dropped += 1;
                debug!(sequence = frame.sequence, "Frame verworfen: {}", e);
            }
        }
    }

    /// Fehler waehrend der Sitzung: melden und abbauen
    fn fehlschlag(&mut self, e: MentorError) {
        error!("Live-Sitzung abgebrochen: {}", e);
        let meldung = e.nutzer_meldung();
        self.status.send_modify(|s| s.error = Some(meldung));
        self.disconnect();
    }
}

impl<B: AudioBackend, C: TransportConnector> Drop for LiveSession<B, C> {
    fn drop(&mut self) {
        self.abbauen();
    }
}
