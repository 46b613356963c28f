use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use slidecap_core::audio::SimulatedProbe;
use slidecap_core::feed::frame_stream;
use slidecap_core::{
    command_channel, AudioProvider, CaptureConfig, CaptureError, CaptureMode, CapturePhase,
    CaptureStrategy, FeedCommand, NoCommands, Pacing, SimulatedSource, TestChunk, Waveform,
};
use tokio::sync::broadcast::error::TryRecvError;

/// 16 kHz, 512-sample (32 ms) chunks, 4-chunk (128 ms) ring.
fn small_config(strategy: CaptureStrategy) -> CaptureConfig {
    CaptureConfig {
        ring_chunks: 4,
        max_window_ms: 128,
        strategy,
        bootstrap_attempts: 5_000,
        ..CaptureConfig::default()
    }
}

fn ramp(len: usize) -> Waveform {
    Waveform::Sequence(Arc::from((0..len).map(|i| i as i16).collect::<Vec<_>>()))
}

fn lossless_source(waveform: Waveform) -> (SimulatedSource, Arc<SimulatedProbe>) {
    let source = SimulatedSource::new(16_000, waveform).with_pacing(Pacing::Lossless);
    let probe = source.probe();
    (source, probe)
}

fn wait_for_timestamp(provider: &mut AudioProvider, expected: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while provider.poll_timestamp() < expected {
        assert!(
            Instant::now() < deadline,
            "timed out at {} ms waiting for {expected} ms",
            provider.latest_timestamp()
        );
        thread::sleep(Duration::from_millis(1));
    }
}

fn live_timestamp_is_exact_multiple_of_chunks(strategy: CaptureStrategy) {
    let config = small_config(strategy);
    let chunks = 6u64;
    let (source, probe) = lossless_source(ramp(config.chunk_samples * chunks as usize));
    let mut provider =
        AudioProvider::new(config.clone(), Box::new(source), Box::new(NoCommands)).unwrap();

    provider.init_capture().unwrap();
    wait_for_timestamp(&mut provider, chunks * config.chunk_ms());

    // The source is exhausted: nothing may push the timestamp past K chunks.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(provider.poll_timestamp(), chunks * 32);
    assert_eq!(probe.produced(), chunks * 512);
    assert_eq!(provider.diagnostics_snapshot().chunks_captured, chunks);
}

#[test]
fn immediate_timestamp_after_k_chunks_is_exact() {
    live_timestamp_is_exact_multiple_of_chunks(CaptureStrategy::Immediate);
}

#[test]
fn polling_timestamp_after_k_chunks_is_exact() {
    live_timestamp_is_exact_multiple_of_chunks(CaptureStrategy::Polling);
}

#[test]
fn init_capture_twice_arms_once() {
    let (source, probe) = lossless_source(Waveform::Ramp);
    let mut provider = AudioProvider::new(
        small_config(CaptureStrategy::Immediate),
        Box::new(source),
        Box::new(NoCommands),
    )
    .unwrap();

    provider.init_capture().unwrap();
    provider.init_capture().unwrap();

    assert!(provider.is_initialized());
    assert_eq!(provider.phase(), CapturePhase::Capturing);
    assert_eq!(probe.connects(), 1);
    assert_eq!(probe.arms(), 1);
    assert!(provider.latest_timestamp() > 0);
}

#[test]
fn polling_init_twice_connects_and_spawns_once() {
    let (source, probe) = lossless_source(Waveform::Ramp);
    let mut provider = AudioProvider::new(
        small_config(CaptureStrategy::Polling),
        Box::new(source),
        Box::new(NoCommands),
    )
    .unwrap();

    provider.init_capture().unwrap();
    provider.init_capture().unwrap();

    assert_eq!(probe.connects(), 1);
    assert_eq!(probe.calibrations(), 1);
}

#[test]
fn full_ring_window_has_no_gap_or_duplicate_at_wrap() {
    let config = small_config(CaptureStrategy::Immediate);
    // One and a half ring lengths, so the window straddles the wrap point.
    let total = config.ring_capacity() + config.ring_capacity() / 2;
    let (source, _probe) = lossless_source(ramp(total));
    let mut provider =
        AudioProvider::new(config.clone(), Box::new(source), Box::new(NoCommands)).unwrap();

    provider.init_capture().unwrap();
    let end_ms = (total / config.samples_per_ms()) as u64;
    wait_for_timestamp(&mut provider, end_ms);

    let capacity_ms = config.capacity_ms();
    let start_ms = end_ms - capacity_ms;
    let window = provider.get_window(start_ms, capacity_ms).unwrap();

    assert_eq!(window.len(), config.ring_capacity());
    let first = (start_ms as usize * config.samples_per_ms()) as i16;
    for (i, &sample) in window.iter().enumerate() {
        assert_eq!(sample, first.wrapping_add(i as i16), "mismatch at {i}");
    }
}

#[test]
fn fresh_ring_window_from_zero_reads_write_order() {
    let config = small_config(CaptureStrategy::Polling);
    let (source, _probe) = lossless_source(ramp(config.ring_capacity()));
    let mut provider =
        AudioProvider::new(config.clone(), Box::new(source), Box::new(NoCommands)).unwrap();

    provider.init_capture().unwrap();
    wait_for_timestamp(&mut provider, config.capacity_ms());

    let window = provider.get_window(0, config.capacity_ms()).unwrap();
    let expected: Vec<i16> = (0..config.ring_capacity()).map(|i| i as i16).collect();
    assert_eq!(window, &expected[..]);
}

#[test]
fn oversized_window_is_a_checked_error() {
    let (source, _probe) = lossless_source(Waveform::Silence);
    let mut provider = AudioProvider::new(
        small_config(CaptureStrategy::Immediate),
        Box::new(source),
        Box::new(NoCommands),
    )
    .unwrap();

    assert!(matches!(
        provider.get_window(0, 129),
        Err(CaptureError::WindowTooLarge { .. })
    ));
}

#[test]
fn silent_source_fails_bootstrap_instead_of_hanging() {
    let mut config = small_config(CaptureStrategy::Immediate);
    config.bootstrap_attempts = 100;
    let (source, _probe) = lossless_source(ramp(0));
    let mut provider = AudioProvider::new(config, Box::new(source), Box::new(NoCommands)).unwrap();

    match provider.init_capture() {
        Err(CaptureError::BootstrapTimeout { attempts }) => assert_eq!(attempts, 100),
        other => panic!("expected BootstrapTimeout, got {other:?}"),
    }
    assert!(!provider.is_initialized());
    assert_eq!(provider.phase(), CapturePhase::Error);
}

#[test]
fn bootstrap_retry_after_timeout_does_not_rearm() {
    let config = CaptureConfig {
        bootstrap_attempts: 100,
        ..small_config(CaptureStrategy::Immediate)
    };
    let (source, stall) = SimulatedSource::new(16_000, Waveform::Ramp)
        .with_pacing(Pacing::Lossless)
        .with_stalled_start();
    let probe = source.probe();
    let mut provider =
        AudioProvider::new(config, Box::new(source), Box::new(NoCommands)).unwrap();

    assert!(matches!(
        provider.init_capture(),
        Err(CaptureError::BootstrapTimeout { attempts: 100 })
    ));
    assert_eq!(provider.phase(), CapturePhase::Error);
    assert_eq!(probe.arms(), 1);

    stall.release();
    provider.init_capture().unwrap();

    assert!(provider.is_initialized());
    assert_eq!(provider.phase(), CapturePhase::Capturing);
    assert_eq!(probe.arms(), 1);
    assert_eq!(probe.connects(), 1);
    assert_eq!(probe.calibrations(), 1);
}

#[test]
fn uncalibrated_source_reports_calibration_timeout() {
    let mut config = small_config(CaptureStrategy::Polling);
    config.calibration_attempts = 10;
    let source = SimulatedSource::new(16_000, Waveform::Ramp).with_calibration_delay(u32::MAX);
    let probe = source.probe();
    let mut provider = AudioProvider::new(config, Box::new(source), Box::new(NoCommands)).unwrap();

    assert!(matches!(
        provider.init_capture(),
        Err(CaptureError::CalibrationTimeout { attempts: 10 })
    ));
    assert_eq!(probe.calibrations(), 10);
    assert_eq!(probe.connects(), 0);
}

#[test]
fn switch_to_test_mode_tears_down_live_capture_and_continues_index_space() {
    let config = small_config(CaptureStrategy::Immediate);
    let (tx, commands) = command_channel();
    let (source, probe) = lossless_source(ramp(config.chunk_samples * 6));
    let mut provider =
        AudioProvider::new(config.clone(), Box::new(source), Box::new(commands)).unwrap();
    let mut status = provider.subscribe_status();

    provider.init_capture().unwrap();
    wait_for_timestamp(&mut provider, 192);

    tx.send(FeedCommand::EnterTestMode).unwrap();
    tx.send(FeedCommand::Chunk(TestChunk::new(0, 4, vec![9; 4]).unwrap()))
        .unwrap();
    let ts = provider.poll_timestamp();

    assert_eq!(provider.mode(), CaptureMode::Test);
    assert!(!provider.is_initialized());
    assert_eq!(probe.disarms(), 1);
    // seed 3072 + 4 + 256 silence = 3332 → floor(3332 / 1024) * 64
    assert_eq!(ts, 192);

    let window = provider.get_window(192, 1).unwrap().to_vec();
    assert_eq!(&window[..4], &[9, 9, 9, 9]);
    assert!(window[4..].iter().all(|&s| s == 0));

    // init_capture in test mode never re-arms the hardware.
    provider.init_capture().unwrap();
    assert_eq!(probe.arms(), 1);

    let mut phases = Vec::new();
    loop {
        match status.try_recv() {
            Ok(ev) => phases.push((ev.mode, ev.phase)),
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("status channel: {e}"),
        }
    }
    assert_eq!(
        phases,
        vec![
            (CaptureMode::Live, CapturePhase::Capturing),
            (CaptureMode::Live, CapturePhase::Stopped),
            (CaptureMode::Test, CapturePhase::Capturing),
        ]
    );
}

#[test]
fn switch_between_64ms_boundaries_never_moves_timestamp_back() {
    let config = small_config(CaptureStrategy::Immediate);
    let (tx, commands) = command_channel();
    let (source, _probe) = lossless_source(ramp(config.chunk_samples * 3));
    let mut provider =
        AudioProvider::new(config.clone(), Box::new(source), Box::new(commands)).unwrap();

    provider.init_capture().unwrap();
    wait_for_timestamp(&mut provider, 96);
    thread::sleep(Duration::from_millis(10));
    assert_eq!(provider.poll_timestamp(), 96);

    tx.send(FeedCommand::EnterTestMode).unwrap();
    // seed 1536 + 256 silence = 1792, which floors to 64; 96 is kept.
    assert_eq!(provider.poll_timestamp(), 96);
    assert_eq!(provider.mode(), CaptureMode::Test);

    // 2048 floors to 128, the first test-mode value past the live one.
    assert_eq!(provider.poll_timestamp(), 128);
    assert_eq!(provider.poll_timestamp(), 128);
}

#[test]
fn chunks_before_test_mode_command_are_dropped() {
    let (tx, commands) = command_channel();
    let (source, _probe) = lossless_source(Waveform::Silence);
    let mut provider = AudioProvider::new(
        CaptureConfig::default(),
        Box::new(source),
        Box::new(commands),
    )
    .unwrap();

    tx.send(FeedCommand::Chunk(TestChunk::new(0, 2, vec![5, 5]).unwrap()))
        .unwrap();
    assert_eq!(provider.poll_timestamp(), 0);
    assert_eq!(provider.mode(), CaptureMode::Live);
    assert_eq!(provider.diagnostics_snapshot().test_chunks, 0);
}

#[test]
fn test_mode_timestamp_is_floored_to_64ms() {
    let (tx, commands) = command_channel();
    let (source, _probe) = lossless_source(Waveform::Silence);
    let mut provider = AudioProvider::new(
        CaptureConfig::default(),
        Box::new(source),
        Box::new(commands),
    )
    .unwrap();

    tx.send(FeedCommand::EnterTestMode).unwrap();
    tx.send(FeedCommand::Chunk(TestChunk::new(0, 4_096, vec![1; 1_024]).unwrap()))
        .unwrap();
    assert_eq!(provider.poll_timestamp(), 64);

    tx.send(FeedCommand::Chunk(TestChunk::new(1_024, 4_096, vec![1; 1]).unwrap()))
        .unwrap();
    assert_eq!(provider.poll_timestamp(), 64);

    tx.send(FeedCommand::Chunk(TestChunk::new(1_025, 4_096, vec![1; 1_022]).unwrap()))
        .unwrap();
    assert_eq!(provider.poll_timestamp(), 64);

    tx.send(FeedCommand::Chunk(TestChunk::new(2_047, 4_096, vec![1; 1]).unwrap()))
        .unwrap();
    assert_eq!(provider.poll_timestamp(), 128);
}

#[test]
fn stream_framing_inserts_silence_only_between_streams() {
    let (tx, commands) = command_channel();
    let (source, _probe) = lossless_source(Waveform::Silence);
    let mut provider = AudioProvider::new(
        CaptureConfig::default(),
        Box::new(source),
        Box::new(commands),
    )
    .unwrap();

    tx.send(FeedCommand::EnterTestMode).unwrap();
    let first: Vec<i16> = vec![3; 320];
    let mut framed = frame_stream(&first, 160).into_iter();
    tx.send(FeedCommand::Chunk(framed.next().unwrap())).unwrap();
    provider.poll_timestamp();
    tx.send(FeedCommand::Chunk(framed.next().unwrap())).unwrap();
    provider.poll_timestamp();
    tx.send(FeedCommand::Chunk(TestChunk::new(0, 200, vec![4; 100]).unwrap()))
        .unwrap();
    provider.poll_timestamp();

    let snap = provider.diagnostics_snapshot();
    assert_eq!(snap.test_chunks, 3);
    assert_eq!(snap.silence_blocks, 1);

    let window = provider.get_window(0, 43).unwrap();
    assert!(window[..320].iter().all(|&s| s == 3));
    assert!(window[320..576].iter().all(|&s| s == 0));
    assert!(window[576..676].iter().all(|&s| s == 4));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = CaptureConfig {
        sample_rate: 22_050,
        ..CaptureConfig::default()
    };
    let source = SimulatedSource::new(22_050, Waveform::Silence);
    assert!(matches!(
        AudioProvider::new(config, Box::new(source), Box::new(NoCommands)),
        Err(CaptureError::InvalidConfig(_))
    ));
}
