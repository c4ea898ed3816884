//! E2E tests for delay measurement through the meter
//!
//! Frames are pushed the way a host would (per channel, in blocks) and the
//! published result is checked: delay, correlation and the stable texts.

use approx::assert_abs_diff_eq;
use delaymeter::{Channel, DelayMeter, NoiseGenerator, MIN_CORRELATION};

/// Push `frames` of shared noise with the target delayed by `delay` samples
///
/// A negative delay makes the target lead.
fn feed(meter: &DelayMeter, frames: usize, delay: i64, seed: u32, block: usize) {
    let d = delay.unsigned_abs() as usize;
    let source = NoiseGenerator::new(seed).take(frames + d);
    let (reference, target) = if delay >= 0 {
        (&source[d..], &source[..frames])
    } else {
        (&source[..frames], &source[d..])
    };

    for (r, t) in reference.chunks(block).zip(target.chunks(block)) {
        meter.append(Channel::Reference, r);
        meter.append(Channel::Target, t);
    }
}

fn meter_with_target(sample_rate: u32) -> DelayMeter {
    let meter = DelayMeter::new(sample_rate).unwrap();
    meter.set_target_identity("Camera");
    meter
}

// ============================================================================
// ACCEPTED MEASUREMENTS
// ============================================================================

/// 240 samples at 48kHz is a 5 ms lag
#[test]
fn test_known_lag_at_48k() {
    let meter = meter_with_target(48000);
    meter.configure(1000, 50, false);
    feed(&meter, 96000, 240, 0xA11CE, 512);

    let result = meter.measure();
    assert!(result.valid, "{}", result.detail_text);
    assert_abs_diff_eq!(result.delay_ms, 5.0, epsilon = 1000.0 / 48000.0);
    assert!(result.correlation > 0.99, "correlation {}", result.correlation);
    assert_eq!(
        result.summary_text,
        format!("  +5.0 ms (correlation: {:.3})", result.correlation)
    );
    assert_eq!(result.detail_text, "Target 'Camera' lags reference by 5.0 ms");
}

/// A leading target reports a negative delay
#[test]
fn test_known_lead_at_44k1() {
    let meter = meter_with_target(44100);
    meter.configure(500, 50, false);
    feed(&meter, 44100, -441, 0xB0B, 441);

    let result = meter.measure();
    assert!(result.valid, "{}", result.detail_text);
    assert_abs_diff_eq!(result.delay_ms, -10.0, epsilon = 1e-9);
    assert_eq!(result.detail_text, "Target 'Camera' leads reference by 10.0 ms");
}

/// Identical streams are aligned
#[test]
fn test_aligned_streams() {
    let meter = meter_with_target(16000);
    meter.configure(1000, 50, false);
    feed(&meter, 32000, 0, 0xC0DE, 160);

    let result = meter.measure();
    assert!(result.valid);
    assert_eq!(result.delay_ms, 0.0);
    assert_eq!(result.detail_text, "Target 'Camera' is aligned with reference");
    assert_abs_diff_eq!(result.correlation, 1.0, epsilon = 1e-6);
}

/// More audio than the ring holds: only the most recent window is used
#[test]
fn test_measurement_after_ring_wraps() {
    let meter = meter_with_target(8000);
    meter.configure(1000, 50, false);
    // Capacity is 40000 frames at 8kHz
    feed(&meter, 100_000, 17, 0xFEED, 333);

    let status = meter.status();
    assert_eq!(status.reference_frames, 40000);
    assert_eq!(status.target_frames, 40000);

    let result = meter.measure();
    assert!(result.valid);
    assert_abs_diff_eq!(result.delay_ms, 17.0 * 1000.0 / 8000.0, epsilon = 1e-9);
}

/// Uneven block sizes per channel do not matter once both are filled
#[test]
fn test_different_block_sizes_per_channel() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);

    let source = NoiseGenerator::new(0xD1CE).take(48000 + 96);
    for block in source[96..].chunks(480) {
        meter.on_reference_frames(block);
    }
    for block in source[..48000].chunks(1024) {
        meter.on_target_frames(block);
    }

    let result = meter.measure();
    assert!(result.valid);
    assert_abs_diff_eq!(result.delay_ms, 2.0, epsilon = 1e-9);
}

/// Settings pushed between measurements apply to the next one
#[test]
fn test_configure_applies_to_next_measurement() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    // 60 ms lag is outside a 50 ms search
    feed(&meter, 48000, 2880, 0xABCD, 1024);

    let first = meter.measure();
    assert!(!first.valid || (first.delay_ms - 60.0).abs() > 1.0);

    meter.configure(500, 100, false);
    let second = meter.measure();
    assert!(second.valid, "{}", second.detail_text);
    assert_abs_diff_eq!(second.delay_ms, 60.0, epsilon = 1e-9);
}

// ============================================================================
// REJECTED MEASUREMENTS
// ============================================================================

#[test]
fn test_silence_is_insufficient_correlation() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    meter.on_reference_frames(&vec![0.0; 48000]);
    meter.on_target_frames(&vec![0.0; 48000]);

    let result = meter.measure();
    assert!(!result.valid);
    assert_eq!(
        result.summary_text,
        "Insufficient correlation - check audio levels and similarity"
    );
    // Nothing was measured before, so the record still holds no delay
    assert_eq!(result.delay_ms, 0.0);
    assert_eq!(result.correlation, 0.0);
}

#[test]
fn test_unrelated_audio_is_rejected() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    meter.on_reference_frames(&NoiseGenerator::new(0x1111_1111).take(24000));
    meter.on_target_frames(&NoiseGenerator::new(0x7777_7777).take(24000));

    let result = meter.measure();
    assert!(!result.valid);
    assert_eq!(result.correlation, 0.0);
    assert!(
        result.detail_text.contains(&format!("< {:.1}", MIN_CORRELATION)),
        "{}",
        result.detail_text
    );
}

/// 1023 frames is one short of the floor
#[test]
fn test_buffers_too_small() {
    let meter = meter_with_target(48000);
    meter.on_reference_frames(&NoiseGenerator::new(1).take(48000));
    meter.on_target_frames(&NoiseGenerator::new(1).take(1023));

    let result = meter.measure();
    assert!(!result.valid);
    assert_eq!(result.summary_text, "Buffers too small");

    meter.on_target_frames(&NoiseGenerator::new(2).take(1));
    assert_ne!(meter.measure().summary_text, "Buffers too small");
}

#[test]
fn test_no_target_selected() {
    let meter = DelayMeter::new(48000).unwrap();
    feed(&meter, 48000, 0, 3, 480);
    assert_eq!(meter.measure().summary_text, "No target source");
}

/// An empty identity clears the target; later measurements report it
#[test]
fn test_clearing_target_stops_measurement() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    feed(&meter, 48000, 96, 8, 480);
    let valid = meter.measure();
    assert!(valid.valid, "{}", valid.detail_text);

    meter.set_target_identity("");
    feed(&meter, 48000, 96, 9, 480);
    let result = meter.measure();
    assert!(!result.valid);
    assert_eq!(result.summary_text, "No target source");
    assert_eq!(meter.last_result(), result);
    assert_eq!(meter.last_valid_result(), Some(valid));
}

/// Selecting a new target drops its old frames
#[test]
fn test_target_change_discards_target_frames() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    feed(&meter, 48000, 48, 4, 480);
    assert!(meter.measure().valid);

    meter.set_target_identity("Desktop");
    let result = meter.measure();
    assert_eq!(result.summary_text, "Buffers too small");
    assert_eq!(meter.status().reference_frames, 48000);
}

// ============================================================================
// RESULT ACCESS
// ============================================================================

#[test]
fn test_initial_result_is_ready() {
    let meter = DelayMeter::new(48000).unwrap();
    let result = meter.last_result();
    assert!(!result.valid);
    assert_eq!(result.summary_text, "Ready...");
}

/// Reading the last result has no side effects
#[test]
fn test_last_result_is_idempotent() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    feed(&meter, 48000, 100, 5, 480);
    let measured = meter.measure();

    let a = meter.last_result();
    let b = meter.last_result();
    assert_eq!(a, b);
    assert_eq!(a, measured);
    assert_eq!(meter.measurement_count(), 1);
}

/// Rejections replace the display result but not the applicable delay
#[test]
fn test_rejection_keeps_last_valid() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    feed(&meter, 48000, 100, 6, 480);
    let valid = meter.measure();
    assert!(valid.valid);

    meter.on_reference_frames(&vec![0.0; 48000]);
    meter.on_target_frames(&vec![0.0; 48000]);
    let rejected = meter.measure();
    assert!(!rejected.valid);

    assert_eq!(meter.last_result(), rejected);
    assert_eq!(meter.last_valid_result(), Some(valid));
}

/// A rejection replaces the texts of the last result but not its numbers
#[test]
fn test_rejection_keeps_published_delay() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    feed(&meter, 48000, 240, 10, 480);
    let valid = meter.measure();
    assert!(valid.valid, "{}", valid.detail_text);

    meter.on_target_frames(&NoiseGenerator::new(0x2468_ace0).take(48000));
    let rejected = meter.measure();
    assert!(!rejected.valid);

    let last = meter.last_result();
    assert_ne!(last.summary_text, valid.summary_text);
    assert_abs_diff_eq!(last.delay_ms, 5.0, epsilon = 1e-9);
    assert_eq!(last.delay_ms, valid.delay_ms);
    assert_eq!(last.correlation, valid.correlation);
    assert_eq!(last.offset_ns(), None);
}

#[test]
fn test_result_serializes_for_json_output() {
    let meter = meter_with_target(48000);
    meter.configure(500, 50, false);
    feed(&meter, 48000, 240, 7, 480);
    let result = meter.measure();

    let json: serde_json::Value = serde_json::to_value(&result).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["delay_ms"], 5.0);
    assert!(json["timestamp"].is_string());
}
