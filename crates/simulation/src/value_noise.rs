//! Hash-lattice value noise and fractal Brownian motion.
//!
//! The lattice is hashed through [`hash_coords32`], so samples are identical
//! on every platform. The periodic variants wrap lattice coordinates modulo
//! a tileable period; each fBm octave scales both the sample coordinates and
//! the period so the sum repeats at the original period.

use crate::rng::hash_coords32;

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Wrap `i` into `[0, m)`, handling negatives. `m <= 0` leaves `i` as-is.
#[inline]
fn wrap_mod(i: i32, m: i32) -> i32 {
    if m <= 0 {
        return i;
    }
    let r = i % m;
    if r < 0 { r + m } else { r }
}

/// Hash an integer lattice point to [0, 1].
#[inline]
fn hash01(ix: i32, iy: i32, seed: u32) -> f32 {
    hash_coords32(ix, iy, seed) as f32 / u32::MAX as f32
}

#[inline]
fn hash01_periodic(ix: i32, iy: i32, seed: u32, period_x: i32, period_y: i32) -> f32 {
    hash01(wrap_mod(ix, period_x), wrap_mod(iy, period_y), seed)
}

/// 2D value noise in [0, 1] with smoothstep interpolation.
pub fn value_noise2(x: f32, y: f32, seed: u32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;

    let tx = smoothstep(x - x0 as f32);
    let ty = smoothstep(y - y0 as f32);

    let v00 = hash01(x0, y0, seed);
    let v10 = hash01(x0 + 1, y0, seed);
    let v01 = hash01(x0, y0 + 1, seed);
    let v11 = hash01(x0 + 1, y0 + 1, seed);

    lerp(lerp(v00, v10, tx), lerp(v01, v11, tx), ty)
}

/// Tileable 2D value noise: samples repeat with `period_x` / `period_y`
/// lattice units. Non-positive periods fall back to the aperiodic sampler.
pub fn value_noise2_periodic(x: f32, y: f32, seed: u32, period_x: i32, period_y: i32) -> f32 {
    if period_x <= 0 || period_y <= 0 {
        return value_noise2(x, y, seed);
    }

    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;

    let tx = smoothstep(x - x0 as f32);
    let ty = smoothstep(y - y0 as f32);

    let v00 = hash01_periodic(x0, y0, seed, period_x, period_y);
    let v10 = hash01_periodic(x0 + 1, y0, seed, period_x, period_y);
    let v01 = hash01_periodic(x0, y0 + 1, seed, period_x, period_y);
    let v11 = hash01_periodic(x0 + 1, y0 + 1, seed, period_x, period_y);

    lerp(lerp(v00, v10, tx), lerp(v01, v11, tx), ty)
}

/// Normalized fBm in [0, 1]. Octave seeds are salted so octaves decorrelate.
pub fn fbm2(x: f32, y: f32, seed: u32, octaves: i32, lacunarity: f32, gain: f32) -> f32 {
    let mut amp = 1.0f32;
    let mut freq = 1.0f32;
    let mut sum = 0.0f32;
    let mut norm = 0.0f32;

    for i in 0..octaves.max(0) {
        sum += value_noise2(x * freq, y * freq, seed.wrapping_add((i as u32) * 1013)) * amp;
        norm += amp;
        amp *= gain;
        freq *= lacunarity;
    }

    if norm > 0.0 {
        sum /= norm;
    }
    sum.clamp(0.0, 1.0)
}

/// Normalized fBm that tiles with the given periods (in the same units as
/// x/y). Per-octave periods are rounded in f64 so high octaves stay exact.
pub fn fbm2_periodic(
    x: f32,
    y: f32,
    seed: u32,
    period_x: i32,
    period_y: i32,
    octaves: i32,
    lacunarity: f32,
    gain: f32,
) -> f32 {
    if period_x <= 0 || period_y <= 0 {
        return fbm2(x, y, seed, octaves, lacunarity, gain);
    }

    let mut amp = 1.0f32;
    let mut freq = 1.0f32;
    let mut sum = 0.0f32;
    let mut norm = 0.0f32;

    for i in 0..octaves.max(0) {
        let px = ((f64::from(period_x) * f64::from(freq)).round() as i32).max(1);
        let py = ((f64::from(period_y) * f64::from(freq)).round() as i32).max(1);

        sum += value_noise2_periodic(
            x * freq,
            y * freq,
            seed.wrapping_add((i as u32) * 1013),
            px,
            py,
        ) * amp;
        norm += amp;
        amp *= gain;
        freq *= lacunarity;
    }

    if norm > 0.0 {
        sum /= norm;
    }
    sum.clamp(0.0, 1.0)
}

/// Octave count used for the warp fields. Low so warps stay smooth and
/// large-scale.
const WARP_OCTAVES: i32 = 3;

/// Domain-warped periodic fBm. Both the warp field and the base field are
/// periodic with the same periods, so the result still tiles.
#[allow(clippy::too_many_arguments)]
pub fn domain_warp_fbm2_periodic(
    x: f32,
    y: f32,
    seed: u32,
    period_x: i32,
    period_y: i32,
    octaves: i32,
    lacunarity: f32,
    gain: f32,
    warp_amp: f32,
) -> f32 {
    if period_x <= 0 || period_y <= 0 {
        // Aperiodic fallback: still warped, just not tileable.
        let wx = fbm2(x + 19.37, y + 47.11, seed ^ 0x68BC_21EB, WARP_OCTAVES, lacunarity, gain);
        let wy = fbm2(x - 31.17, y + 11.83, seed ^ 0x02E5_BE93, WARP_OCTAVES, lacunarity, gain);
        let dx = (wx * 2.0 - 1.0) * warp_amp;
        let dy = (wy * 2.0 - 1.0) * warp_amp;
        return fbm2(x + dx, y + dy, seed, octaves, lacunarity, gain);
    }

    let wx = fbm2_periodic(
        x + 19.37,
        y + 47.11,
        seed ^ 0x68BC_21EB,
        period_x,
        period_y,
        WARP_OCTAVES,
        lacunarity,
        gain,
    );
    let wy = fbm2_periodic(
        x - 31.17,
        y + 11.83,
        seed ^ 0x02E5_BE93,
        period_x,
        period_y,
        WARP_OCTAVES,
        lacunarity,
        gain,
    );

    let dx = (wx * 2.0 - 1.0) * warp_amp;
    let dy = (wy * 2.0 - 1.0) * warp_amp;

    fbm2_periodic(x + dx, y + dy, seed, period_x, period_y, octaves, lacunarity, gain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_in_unit_range() {
        for i in 0..200 {
            let v = value_noise2(i as f32 * 0.37, i as f32 * -0.53, 7);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_noise_deterministic() {
        assert_eq!(value_noise2(3.2, 4.8, 11), value_noise2(3.2, 4.8, 11));
        assert_ne!(value_noise2(3.2, 4.8, 11), value_noise2(3.2, 4.8, 12));
    }

    #[test]
    fn test_periodic_noise_wraps_exactly() {
        let (px, py) = (32, 16);
        for i in 0..50 {
            let x = i as f32 * 0.71;
            let y = i as f32 * 0.29;
            let a = value_noise2_periodic(x, y, 5, px, py);
            let b = value_noise2_periodic(x + px as f32, y, 5, px, py);
            let c = value_noise2_periodic(x, y + py as f32, 5, px, py);
            assert!((a - b).abs() < 1e-4, "x-period broken at sample {i}");
            assert!((a - c).abs() < 1e-4, "y-period broken at sample {i}");
        }
    }

    #[test]
    fn test_fbm_periodic_wraps_exactly() {
        let (px, py) = (24, 24);
        for i in 0..40 {
            let x = i as f32 * 0.61;
            let y = i as f32 * 0.43;
            let a = fbm2_periodic(x, y, 9, px, py, 5, 2.0, 0.5);
            let b = fbm2_periodic(x + px as f32, y + py as f32, 9, px, py, 5, 2.0, 0.5);
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_domain_warp_periodic_wraps() {
        let (px, py) = (20, 20);
        let a = domain_warp_fbm2_periodic(3.3, 7.7, 21, px, py, 4, 2.0, 0.5, 1.5);
        let b = domain_warp_fbm2_periodic(3.3 + px as f32, 7.7, 21, px, py, 4, 2.0, 0.5, 1.5);
        assert!((a - b).abs() < 1e-4);
        assert!((0.0..=1.0).contains(&a));
    }

    #[test]
    fn test_fbm_normalized() {
        for i in 0..100 {
            let v = fbm2(i as f32 * 0.13, i as f32 * 0.17, 3, 6, 2.0, 0.5);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
