//! Stream Round-Trip Tests
//!
//! Writes events through the blocking writer and reads them back:
//! - Every codec, mixed payload capabilities
//! - Concatenated streams and truncated streams
//! - Large events with exact field equality
//! - Partial iteration, skipping, file-backed streams

use std::io::Cursor;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tessera_core::{
    Event, EventError, PayloadError, PayloadRegistry, SelfDescribing, generic_payload,
    self_describing_payload,
};
use tessera_stream::{Compression, Reader, StreamError, Writer, WriterConfig};

// ============================================================================
// Test Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SimTrackerHit {
    cell_id: u64,
    edep: f64,
    time: f32,
    position: [f64; 3],
}

generic_payload!(SimTrackerHit, "sim.SimTrackerHit");

/// Fixed little-endian layout: pdg, then three momentum components
#[derive(Debug, Clone, PartialEq)]
struct McParticle {
    pdg: i32,
    momentum: [f32; 3],
}

impl SelfDescribing for McParticle {
    fn marshal(&self) -> Result<Vec<u8>, PayloadError> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.pdg.to_le_bytes());
        for p in self.momentum {
            out.extend_from_slice(&p.to_le_bytes());
        }
        Ok(out)
    }

    fn unmarshal(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() != 16 {
            return Err(PayloadError::decode(format!(
                "McParticle needs 16 bytes, got {}",
                bytes.len()
            )));
        }
        let word = |i: usize| [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];
        Ok(Self {
            pdg: i32::from_le_bytes(word(0)),
            momentum: [
                f32::from_le_bytes(word(4)),
                f32::from_le_bytes(word(8)),
                f32::from_le_bytes(word(12)),
            ],
        })
    }
}

self_describing_payload!(McParticle, "mc.McParticle");

/// Never registered by hand; only seen through `Event::add_entry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RawDigit {
    channel: u16,
    adc: u16,
}

generic_payload!(RawDigit, "daq.RawDigit");

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> Arc<PayloadRegistry> {
    let registry = Arc::new(PayloadRegistry::new());
    registry.register::<SimTrackerHit>().unwrap();
    registry.register::<McParticle>().unwrap();
    registry
}

fn random_hit(rng: &mut impl Rng) -> SimTrackerHit {
    SimTrackerHit {
        cell_id: rng.random(),
        edep: rng.random_range(0.0..5.0),
        time: rng.random(),
        position: [rng.random(), rng.random(), rng.random()],
    }
}

fn random_particle(rng: &mut impl Rng) -> McParticle {
    McParticle {
        pdg: rng.random_range(-2212..2212),
        momentum: [rng.random(), rng.random(), rng.random()],
    }
}

fn write_stream(events: &mut [Event], config: WriterConfig) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = Writer::with_config(&mut out, config);
        for event in events.iter_mut() {
            writer.push(event).unwrap();
        }
        writer.flush().unwrap();
    }
    out
}

fn uncompressed() -> WriterConfig {
    WriterConfig::uncompressed()
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn test_every_codec_preserves_event() {
    init_tracing();
    let mut rng = rand::rng();

    for codec in Compression::ALL {
        let mut event = Event::with_registry(registry());
        let hits: Vec<SimTrackerHit> = (0..20).map(|_| random_hit(&mut rng)).collect();
        let particle = random_particle(&mut rng);

        let hit_ids = event.add_entries("TrackerHits", hits.clone());
        let particle_id = event.add_entry(particle.clone(), &["MCParticles", "Truth"]);
        event.tag_entry(hit_ids[3], "Truth").unwrap();

        let bytes = write_stream(
            std::slice::from_mut(&mut event),
            WriterConfig::default().with_compression(codec),
        );
        let mut reader = Reader::with_registry(Cursor::new(bytes), registry());
        let mut read = reader.next_event().unwrap().unwrap();
        assert!(reader.next_event().unwrap().is_none(), "codec {codec}");

        assert_eq!(read.all_entries(), event.all_entries());
        assert_eq!(read.tags(), vec!["MCParticles", "TrackerHits", "Truth"]);
        assert_eq!(read.tagged_entries("TrackerHits"), hit_ids.as_slice());
        assert_eq!(read.tagged_entries("Truth"), &[particle_id, hit_ids[3]]);
        assert_eq!(read.type_count(), 2);

        for (id, hit) in hit_ids.iter().zip(&hits) {
            assert_eq!(read.get_entry_as::<SimTrackerHit>(*id).unwrap(), hit);
        }
        assert_eq!(
            read.get_entry_as::<McParticle>(particle_id).unwrap(),
            &particle
        );
        assert_eq!(read.entry_tags(particle_id), vec!["MCParticles", "Truth"]);
    }
}

#[test]
fn test_concatenated_streams_read_as_one() {
    init_tracing();
    let mut rng = rand::rng();

    for (first, second) in Compression::ALL.into_iter().zip(Compression::ALL.into_iter().rev()) {
        let mut a = Event::with_registry(registry());
        a.add_entry(random_hit(&mut rng), &["A"]);
        let mut b = Event::with_registry(registry());
        b.add_entry(random_particle(&mut rng), &["B"]);

        let mut bytes = write_stream(
            std::slice::from_mut(&mut a),
            WriterConfig::default().with_compression(first),
        );
        bytes.extend(write_stream(
            std::slice::from_mut(&mut b),
            WriterConfig::default().with_compression(second),
        ));

        let mut reader = Reader::with_registry(Cursor::new(bytes), registry());
        let events: Vec<Event> = reader.scan_events().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tags(), vec!["A"]);
        assert_eq!(events[1].tags(), vec!["B"]);
    }
}

#[test]
fn test_every_truncation_is_corrupt() {
    init_tracing();
    let mut event = Event::with_registry(registry());
    event.add_entry(
        McParticle {
            pdg: 11,
            momentum: [0.5, 0.0, -1.0],
        },
        &["MCParticles"],
    );
    let bytes = write_stream(std::slice::from_mut(&mut event), uncompressed());

    for len in 1..bytes.len() {
        let mut reader = Reader::with_registry(Cursor::new(bytes[..len].to_vec()), registry());
        match reader.next_event() {
            Err(StreamError::StreamCorrupt(_)) => {}
            other => panic!("prefix of {len} bytes: expected StreamCorrupt, got {other:?}"),
        }
    }
}

#[test]
fn test_large_event_every_codec() {
    init_tracing();
    let mut rng = rand::rng();

    let hits: Vec<SimTrackerHit> = (0..1000).map(|_| random_hit(&mut rng)).collect();
    let particle = random_particle(&mut rng);

    for codec in Compression::ALL {
        let mut event = Event::with_registry(registry());
        event.add_entries("A", hits.clone());
        event.add_entry(particle.clone(), &["B"]);

        let bytes = write_stream(
            std::slice::from_mut(&mut event),
            WriterConfig::default().with_compression(codec),
        );
        let mut reader = Reader::with_registry(Cursor::new(bytes), registry());
        let mut read = reader.next_event().unwrap().unwrap();

        let a = read.tagged_entries("A").to_vec();
        let b = read.tagged_entries("B").to_vec();
        assert_eq!(a.len(), 1000, "codec {codec}");
        assert_eq!(b.len(), 1);

        for (id, hit) in a.iter().zip(&hits) {
            let read_hit = read.get_entry_as::<SimTrackerHit>(*id).unwrap();
            assert_eq!(read_hit.cell_id, hit.cell_id);
            assert_eq!(read_hit.edep, hit.edep);
            assert_eq!(read_hit.time, hit.time);
            assert_eq!(read_hit.position, hit.position);
        }
        assert_eq!(read.get_entry_as::<McParticle>(b[0]).unwrap(), &particle);
    }
}

#[test]
fn test_flush_boundaries_leave_no_trace() {
    init_tracing();
    let mut rng = rand::rng();
    let hits: Vec<Vec<SimTrackerHit>> = (0..4)
        .map(|_| (0..25).map(|_| random_hit(&mut rng)).collect())
        .collect();
    let build = |chunk: &Vec<SimTrackerHit>| {
        let mut event = Event::with_registry(registry());
        event.add_entries("Hits", chunk.clone());
        event
    };

    for codec in Compression::ALL {
        let config = WriterConfig::default().with_compression(codec);

        let mut eager = Vec::new();
        {
            let mut writer = Writer::with_config(&mut eager, config.clone());
            for chunk in &hits {
                writer.push(&mut build(chunk)).unwrap();
                writer.flush().unwrap();
            }
        }

        let mut batched = Vec::new();
        {
            let mut writer = Writer::with_config(&mut batched, config);
            for chunk in &hits {
                writer.push(&mut build(chunk)).unwrap();
            }
            writer.flush().unwrap();
        }

        assert_eq!(eager, batched, "codec {codec}");
    }
}

// ============================================================================
// Iteration and Positioning
// ============================================================================

#[test]
fn test_prefix_consumption_and_skip() {
    init_tracing();
    let mut events: Vec<Event> = (0..6u64)
        .map(|n| {
            let mut event = Event::with_registry(registry());
            event.add_entry(
                SimTrackerHit {
                    cell_id: n,
                    edep: 0.0,
                    time: 0.0,
                    position: [0.0; 3],
                },
                &["Hits"],
            );
            event
        })
        .collect();
    let bytes = write_stream(&mut events, WriterConfig::default());

    let mut reader = Reader::with_registry(Cursor::new(bytes), registry());
    let first_two: Vec<Event> = reader.scan_events().take(2).map(|e| e.unwrap()).collect();
    assert_eq!(first_two.len(), 2);

    assert_eq!(reader.skip(2).unwrap(), 2);

    let cell_ids: Vec<u64> = reader
        .scan_events()
        .map(|e| {
            let mut event = e.unwrap();
            let id = event.all_entries()[0];
            event.get_entry_as::<SimTrackerHit>(id).unwrap().cell_id
        })
        .collect();
    assert_eq!(cell_ids, vec![4, 5]);
    assert_eq!(reader.events_read(), 6);
}

// ============================================================================
// Entry-Level Failures and Rewriting
// ============================================================================

#[test]
fn test_unknown_type_fails_only_that_entry() {
    init_tracing();
    let mut event = Event::with_registry(registry());
    let hit = event.add_entry(
        SimTrackerHit {
            cell_id: 1,
            edep: 0.1,
            time: 2.0,
            position: [1.0, 2.0, 3.0],
        },
        &["Hits"],
    );
    let particle = event.add_entry(
        McParticle {
            pdg: 22,
            momentum: [1.0; 3],
        },
        &["MCParticles"],
    );
    let bytes = write_stream(std::slice::from_mut(&mut event), WriterConfig::default());

    // Reader only knows about tracker hits
    let partial = Arc::new(PayloadRegistry::new());
    partial.register::<SimTrackerHit>().unwrap();

    let mut reader = Reader::with_registry(Cursor::new(bytes), partial);
    let mut read = reader.next_event().unwrap().unwrap();

    assert!(matches!(
        read.get_entry(particle),
        Err(EventError::UnknownType { .. })
    ));
    assert_eq!(read.get_entry_as::<SimTrackerHit>(hit).unwrap().cell_id, 1);
    assert_eq!(read.entry_type_name(particle), Some("mc.McParticle"));

    let printed = read.to_string();
    assert!(printed.contains("Tag: Hits"));
    assert!(printed.contains("<error:"));
}

#[test]
fn test_modified_entries_are_rewritten() {
    init_tracing();
    let mut event = Event::with_registry(registry());
    let id = event.add_entry(
        McParticle {
            pdg: 13,
            momentum: [0.0; 3],
        },
        &["MCParticles"],
    );
    let bytes = write_stream(std::slice::from_mut(&mut event), WriterConfig::default());

    let mut reader = Reader::with_registry(Cursor::new(bytes), registry());
    let mut read = reader.next_event().unwrap().unwrap();
    read.get_entry_mut(id)
        .unwrap()
        .as_any_mut()
        .downcast_mut::<McParticle>()
        .unwrap()
        .pdg = -13;

    let bytes = write_stream(std::slice::from_mut(&mut read), WriterConfig::compact());
    let mut reader = Reader::with_registry(Cursor::new(bytes), registry());
    let mut reread = reader.next_event().unwrap().unwrap();
    assert_eq!(reread.get_entry_as::<McParticle>(id).unwrap().pdg, -13);
}

#[test]
fn test_producer_reads_own_entry_after_push() {
    init_tracing();
    let mut event = Event::new();
    let id = event.add_entry(RawDigit { channel: 7, adc: 512 }, &["Digits"]);

    let mut out = Vec::new();
    {
        let mut writer = Writer::new(&mut out);
        writer.push(&mut event).unwrap();
        writer.flush().unwrap();
    }

    assert_eq!(event.cached_entries(), 0);
    assert_eq!(
        event.get_entry_as::<RawDigit>(id).unwrap(),
        &RawDigit { channel: 7, adc: 512 }
    );

    // Readers on the global registry see the type as well
    let mut reader = Reader::new(Cursor::new(out));
    let mut read = reader.next_event().unwrap().unwrap();
    assert_eq!(read.get_entry_as::<RawDigit>(id).unwrap().adc, 512);
}

// ============================================================================
// File-Backed Streams
// ============================================================================

#[test]
fn test_file_roundtrip() {
    init_tracing();
    PayloadRegistry::global()
        .register::<SimTrackerHit>()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.tsra");
    let mut rng = rand::rng();
    let hits: Vec<SimTrackerHit> = (0..50).map(|_| random_hit(&mut rng)).collect();

    {
        let mut writer = Writer::create(&path).unwrap();
        for chunk in hits.chunks(10) {
            let mut event = Event::new();
            event.add_entries("Hits", chunk.to_vec());
            writer.push(&mut event).unwrap();
        }
        writer.flush().unwrap();
        assert_eq!(writer.frames_written(), 5);
    }

    let mut reader = Reader::open(&path).unwrap();
    let mut read_hits = Vec::new();
    for event in reader.scan_events() {
        let mut event = event.unwrap();
        for id in event.tagged_entries("Hits").to_vec() {
            read_hits.push(event.get_entry_as::<SimTrackerHit>(id).unwrap().clone());
        }
    }
    assert_eq!(read_hits, hits);
}
