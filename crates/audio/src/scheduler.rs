//! Playback-Scheduler fuer lueckenlose Wiedergabe
//!
//! Jedes eingehende PCM-Fragment bekommt einen Startzeitpunkt auf der Uhr
//! des Ausgabegeraets:
//!
//! ```text
//! start = max(next_start_time, jetzt)
//! next_start_time = start + dauer
//! ```
//!
//! Liegt die Wiedergabe hinter dem Plan, startet das naechste Fragment
//! sofort statt einen wachsenden Rueckstand aufzubauen. Bei einer
//! Unterbrechung werden alle laufenden Slots gestoppt und `next_start_time`
//! auf 0 gesetzt.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::codec;
use crate::error::{AudioError, AudioResult};

/// ID eines geplanten Fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Geplantes Fragment auf der Geraete-Uhr
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSlot {
    pub id: SlotId,
    /// Startzeit in Sekunden (Geraete-Uhr)
    pub start: f64,
    /// Dauer in Sekunden
    pub duration: f64,
}

impl PlaybackSlot {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Ausgabegeraet mit eigener Uhr, das Rohsamples zu absoluten Zeiten abspielt
///
/// Abgeschlossene Slots meldet die Implementierung ueber einen eigenen
/// Kanal an den Besitzer des Schedulers.
pub trait PlaybackSink: Send {
    /// Aktuelle Zeit der Geraete-Uhr in Sekunden
    fn now(&self) -> f64;

    /// Abtastrate der Ausgabe
    fn sample_rate(&self) -> u32;

    /// Plant Samples zum absoluten Zeitpunkt `start`
    fn schedule(&mut self, id: SlotId, samples: Arc<[f32]>, start: f64) -> AudioResult<()>;

    /// Stoppt einen Slot sofort. Fehler bei bereits beendeten Slots sind erlaubt.
    fn stop(&mut self, id: SlotId) -> AudioResult<()>;

    /// Gibt das Geraet frei. Mehrfacher Aufruf ist ein No-op.
    fn close(&mut self);
}

/// Lueckenloser, unterbrechbarer Playback-Scheduler
pub struct PlaybackScheduler<S: PlaybackSink> {
    sink: S,
    next_start_time: f64,
    live: HashSet<SlotId>,
    next_id: u64,
}

impl<S: PlaybackSink> PlaybackScheduler<S> {
    /// Erstellt den Scheduler, `next_start_time` startet bei der aktuellen Geraetezeit
    pub fn new(sink: S) -> Self {
        let next_start_time = sink.now();
        Self {
            sink,
            next_start_time,
            live: HashSet::new(),
            next_id: 0,
        }
    }

    /// Dekodiert ein Base64-PCM16-Fragment und plant es ein
    pub fn schedule_fragment(&mut self, data: &str) -> AudioResult<PlaybackSlot> {
        let samples = codec::decode_fragment(data)?;
        self.schedule_samples(samples)
    }

    /// Plant bereits normalisierte Samples ein
    pub fn schedule_samples(&mut self, samples: Vec<f32>) -> AudioResult<PlaybackSlot> {
        let rate = self.sink.sample_rate();
        if rate == 0 {
            return Err(AudioError::Konfiguration(
                "Ausgabe-Abtastrate ist 0".into(),
            ));
        }

        let duration = samples.len() as f64 / rate as f64;
        let now = self.sink.now();
        let start = self.next_start_time.max(now);
        let id = SlotId(self.next_id);
        self.next_id += 1;

        self.sink.schedule(id, samples.into(), start)?;
        self.next_start_time = start + duration;
        self.live.insert(id);

        trace!(
            slot = %id,
            start,
            duration,
            live = self.live.len(),
            "Fragment eingeplant"
        );

        Ok(PlaybackSlot {
            id,
            start,
            duration,
        })
    }

    /// Slot ist vom Geraet fertig abgespielt worden
    ///
    /// Gibt `false` zurueck wenn der Slot nicht (mehr) live war,
    /// z.B. nach einer Unterbrechung.
    pub fn on_completed(&mut self, id: SlotId) -> bool {
        self.live.remove(&id)
    }

    /// Unterbrechung: alle Slots stoppen, Zeitplan zuruecksetzen
    ///
    /// Gibt die Anzahl gestoppter Slots zurueck.
    pub fn interrupt(&mut self) -> usize {
        let gestoppt = self.stop_live();
        self.next_start_time = 0.0;
        debug!(gestoppt, "Playback unterbrochen");
        gestoppt
    }

    /// Stoppt alle Slots und gibt das Ausgabegeraet frei
    pub fn shutdown(&mut self) {
        self.stop_live();
        self.next_start_time = 0.0;
        self.sink.close();
    }

    fn stop_live(&mut self) -> usize {
        let anzahl = self.live.len();
        for id in self.live.drain() {
            // Bereits beendete Slots sind kein Fehler
            if let Err(e) = self.sink.stop(id) {
                trace!(slot = %id, "Stop ignoriert: {}", e);
            }
        }
        anzahl
    }

    /// Anzahl aktuell geplanter, noch nicht beendeter Slots
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: SlotId) -> bool {
        self.live.contains(&id)
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, float_to_int16, int16_to_bytes};

    /// Sink mit manueller Uhr
    #[derive(Default)]
    struct TestSink {
        now: f64,
        geplant: Vec<(SlotId, usize, f64)>,
        gestoppt: Vec<SlotId>,
        beendet: HashSet<SlotId>,
        geschlossen: u32,
    }

    impl PlaybackSink for TestSink {
        fn now(&self) -> f64 {
            self.now
        }

        fn sample_rate(&self) -> u32 {
            24000
        }

        fn schedule(&mut self, id: SlotId, samples: Arc<[f32]>, start: f64) -> AudioResult<()> {
            self.geplant.push((id, samples.len(), start));
            Ok(())
        }

        fn stop(&mut self, id: SlotId) -> AudioResult<()> {
            if self.beendet.contains(&id) {
                return Err(AudioError::SlotUnbekannt(id));
            }
            self.gestoppt.push(id);
            Ok(())
        }

        fn close(&mut self) {
            self.geschlossen += 1;
        }
    }

    fn fragment(sekunden: f64) -> String {
        let n = (sekunden * 24000.0) as usize;
        encode(&int16_to_bytes(&float_to_int16(&vec![0.1; n])))
    }

    #[test]
    fn drei_fragmente_lueckenlos() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let a = s.schedule_fragment(&fragment(1.0)).unwrap();
        let b = s.schedule_fragment(&fragment(1.0)).unwrap();
        let c = s.schedule_fragment(&fragment(0.5)).unwrap();

        assert_eq!(a.start, 0.0);
        assert_eq!(b.start, 1.0);
        assert_eq!(c.start, 2.0);
        assert_eq!(c.duration, 0.5);
        assert_eq!(s.next_start_time(), 2.5);
        assert_eq!(s.live_count(), 3);
    }

    #[test]
    fn startzeiten_monoton_ohne_ueberlappung() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let dauern = [0.3, 0.01, 1.7, 0.25, 0.0, 0.6];
        let mut vorher: Option<PlaybackSlot> = None;
        for (i, d) in dauern.iter().enumerate() {
            // Uhr laeuft etwas, bleibt aber hinter dem Plan
            s.sink_mut().now = i as f64 * 0.05;
            let slot = s.schedule_samples(vec![0.0; (d * 24000.0) as usize]).unwrap();
            if let Some(p) = vorher {
                assert!(slot.start >= p.end() - 1e-12);
            }
            vorher = Some(slot);
        }
    }

    #[test]
    fn geraet_hinter_plan_startet_sofort() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        s.schedule_fragment(&fragment(0.5)).unwrap();
        // Uhr ist weit ueber das Ende des geplanten Fragments hinaus
        s.sink_mut().now = 3.0;
        let slot = s.schedule_fragment(&fragment(0.5)).unwrap();
        assert_eq!(slot.start, 3.0);
        assert_eq!(s.next_start_time(), 3.5);
    }

    #[test]
    fn startzeit_beginnt_bei_geraetezeit_der_erstellung() {
        let sink = TestSink {
            now: 7.25,
            ..Default::default()
        };
        let mut s = PlaybackScheduler::new(sink);
        assert_eq!(s.next_start_time(), 7.25);
        let slot = s.schedule_samples(vec![0.0; 2400]).unwrap();
        assert_eq!(slot.start, 7.25);
    }

    #[test]
    fn unterbrechung_leert_live_set() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let a = s.schedule_fragment(&fragment(1.0)).unwrap();
        let b = s.schedule_fragment(&fragment(1.0)).unwrap();

        assert_eq!(s.interrupt(), 2);
        assert_eq!(s.live_count(), 0);
        assert_eq!(s.next_start_time(), 0.0);

        let mut gestoppt = s.sink().gestoppt.clone();
        gestoppt.sort();
        assert_eq!(gestoppt, vec![a.id, b.id]);
    }

    #[test]
    fn nach_unterbrechung_relativ_zu_jetzt() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        s.schedule_fragment(&fragment(1.0)).unwrap();
        s.schedule_fragment(&fragment(1.0)).unwrap();
        s.sink_mut().now = 0.4;
        s.interrupt();

        let slot = s.schedule_fragment(&fragment(0.5)).unwrap();
        assert_eq!(slot.start, 0.4, "Nicht am alten Plan (2.0) ausrichten");
    }

    #[test]
    fn stop_von_beendetem_slot_wird_geschluckt() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let a = s.schedule_fragment(&fragment(0.1)).unwrap();
        // Geraet hat den Slot schon beendet, die Meldung ist aber noch unterwegs
        s.sink_mut().beendet.insert(a.id);
        assert_eq!(s.interrupt(), 1);
        assert_eq!(s.live_count(), 0);
    }

    #[test]
    fn abschluss_entfernt_aus_live_set() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let a = s.schedule_fragment(&fragment(0.1)).unwrap();
        let b = s.schedule_fragment(&fragment(0.1)).unwrap();
        assert!(s.on_completed(a.id));
        assert!(!s.on_completed(a.id));
        assert!(s.is_live(b.id));
        assert_eq!(s.live_count(), 1);
    }

    #[test]
    fn abschluss_nach_unterbrechung_ist_harmlos() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let a = s.schedule_fragment(&fragment(0.1)).unwrap();
        s.interrupt();
        assert!(!s.on_completed(a.id));
        assert_eq!(s.live_count(), 0);
    }

    #[test]
    fn fehlerhaftes_fragment_aendert_zeitplan_nicht() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        s.schedule_fragment(&fragment(1.0)).unwrap();
        assert!(s.schedule_fragment("%%%kaputt").is_err());
        assert!(s.schedule_fragment(&encode(&[1, 2, 3])).is_err());
        assert_eq!(s.next_start_time(), 1.0);
        assert_eq!(s.live_count(), 1);

        let slot = s.schedule_fragment(&fragment(1.0)).unwrap();
        assert_eq!(slot.start, 1.0);
    }

    #[test]
    fn shutdown_stoppt_und_schliesst() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        s.schedule_fragment(&fragment(0.2)).unwrap();
        s.shutdown();
        assert_eq!(s.live_count(), 0);
        assert_eq!(s.sink().gestoppt.len(), 1);
        assert_eq!(s.sink().geschlossen, 1);
    }

    #[test]
    fn slot_ids_eindeutig() {
        let mut s = PlaybackScheduler::new(TestSink::default());
        let a = s.schedule_samples(vec![0.0; 10]).unwrap();
        s.interrupt();
        let b = s.schedule_samples(vec![0.0; 10]).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(SlotId(3).to_string(), "slot:3");
    }
}
