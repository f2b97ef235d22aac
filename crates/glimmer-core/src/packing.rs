//! Float packing used by hit-test readback.
//!
//! The hit-test shader writes one value per candidate into an RGBA8 texel. A
//! value in `[0, 1)` encodes `(index + 1) / (capacity + 1)`, so a miss (`-1`)
//! encodes as zero. Decoding is ordinally correct but not bit exact.

const BASE: f64 = 255.0;
const SCALES: [f64; 4] = [1.0, BASE, BASE * BASE, BASE * BASE * BASE];

/// Encode a unit-interval value into four bytes, most significant first.
pub fn pack_unit_float(value: f64) -> [u8; 4] {
    let value = value.clamp(0.0, 1.0 - f64::EPSILON);
    let mut encoded = SCALES.map(|scale| (value * scale).fract());
    for i in 0..3 {
        encoded[i] -= encoded[i + 1] / BASE;
    }
    encoded.map(|channel| (channel * BASE).round().clamp(0.0, BASE) as u8)
}

/// Decode four bytes written by [`pack_unit_float`].
pub fn unpack_unit_float(bytes: [u8; 4]) -> f64 {
    bytes
        .iter()
        .zip(SCALES)
        .map(|(byte, scale)| f64::from(*byte) / BASE / scale)
        .sum()
}

/// Pack a swatch index (or `-1` for a miss) for a scene of `capacity` swatches.
pub fn pack_hit_index(index: f64, capacity: usize) -> [u8; 4] {
    pack_unit_float((index + 1.0) / (capacity as f64 + 1.0))
}

/// Recover the swatch index encoded in `bytes`. Misses decode below zero.
pub fn unpack_hit_index(bytes: [u8; 4], capacity: usize) -> f32 {
    (unpack_unit_float(bytes) * (capacity as f64 + 1.0) - 1.0) as f32
}
