//! Nested HEALPix indexing.
//!
//! Skymap tiles are stored as ranges of nested indices at order 29 (the MOC
//! convention): a pixel `p` at order `o` covers the order-29 range
//! `[p·4^(29−o), (p+1)·4^(29−o))`. Candidates are located by converting their
//! position to an order-29 index and finding the tile range containing it.
//!
//! Base pixels 0–3 form the north polar cap, 4–7 the equatorial belt and
//! 8–11 the south polar cap. Within a base pixel, `x` runs north-east and `y`
//! north-west; the nested sub-index interleaves their bits.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

/// Deepest supported order.
pub const MAX_ORDER: u8 = 29;

/// Nside at `order`: `2^order`.
pub fn nside(order: u8) -> u64 {
    1u64 << order
}

/// Number of pixels at `order`: `12·nside²`.
pub fn npix(order: u8) -> u64 {
    12 * nside(order) * nside(order)
}

/// Solid angle (sr) of one pixel at `order`.
pub fn pixel_area(order: u8) -> f64 {
    4.0 * PI / npix(order) as f64
}

/// Nested index at `order` of the pixel containing (ra, dec) in degrees.
pub fn radec_to_nested(ra_deg: f64, dec_deg: f64, order: u8) -> u64 {
    let (base, x, y) = locate(ra_deg.to_radians(), dec_deg.to_radians(), nside(order) as f64);
    base * nside(order) * nside(order) + interleave(x, y)
}

/// Center (ra, dec) in degrees of nested pixel `index` at `order`.
pub fn nested_to_radec(index: u64, order: u8) -> (f64, f64) {
    let ns2 = nside(order) * nside(order);
    let base = index / ns2;
    let (x, y) = deinterleave(index % ns2);
    let (lon, lat) = center(base, x as f64 + 0.5, y as f64 + 0.5, nside(order) as f64);
    (lon.to_degrees(), lat.to_degrees())
}

/// Range of order-[`MAX_ORDER`] indices covered by `index` at `order`.
pub fn to_max_order_range(index: u64, order: u8) -> (u64, u64) {
    let shift = 2 * u32::from(MAX_ORDER - order.min(MAX_ORDER));
    (index << shift, (index + 1) << shift)
}

/// (base pixel, x, y) for a position in radians.
fn locate(lon: f64, lat: f64, ns: f64) -> (u64, u64, u64) {
    let z = lat.sin();
    let phi = lon.rem_euclid(TAU);
    let phi_t = phi % FRAC_PI_2;
    let column = ((phi / FRAC_PI_2).floor() as i64).rem_euclid(4) as u64;
    let last = ns as u64 - 1;

    if z.abs() >= 2.0 / 3.0 {
        let north = z >= 0.0;
        let sz = if north { z } else { -z };

        let kx = ((1.0 - sz) * 3.0 * (ns * (2.0 * phi_t - PI) / PI).powi(2))
            .max(0.0)
            .sqrt();
        let ky = ((1.0 - sz) * 3.0 * (ns * 2.0 * phi_t / PI).powi(2))
            .max(0.0)
            .sqrt();

        let (xx, yy) = if north { (ns - kx, ns - ky) } else { (ky, kx) };
        let x = (xx.floor().max(0.0) as u64).min(last);
        let y = (yy.floor().max(0.0) as u64).min(last);
        let base = if north { column } else { 8 + column };
        return (base, x, y);
    }

    let zunits = (z + 2.0 / 3.0) / (4.0 / 3.0);
    let phiunits = phi_t / FRAC_PI_2;
    let mut xx = (zunits + phiunits) * ns;
    let mut yy = (zunits - phiunits + 1.0) * ns;

    let base = match (xx >= ns, yy >= ns) {
        (true, true) => {
            xx -= ns;
            yy -= ns;
            column
        }
        (true, false) => {
            xx -= ns;
            ((column + 1) % 4) + 4
        }
        (false, true) => {
            yy -= ns;
            column + 4
        }
        (false, false) => 8 + column,
    };

    let x = (xx.floor().max(0.0) as u64).min(last);
    let y = (yy.floor().max(0.0) as u64).min(last);
    (base, x, y)
}

/// (lon, lat) in radians for continuous coordinates inside a base pixel.
fn center(base: u64, x: f64, y: f64, ns: f64) -> (f64, f64) {
    let xn = x / ns;
    let yn = y / ns;
    let north = base <= 3;
    let south = base >= 8;

    let polar = (north && xn + yn > 1.0) || (south && xn + yn < 1.0);

    let (lon, z) = if !polar {
        let (phi_off, z_off, col) = if north {
            (1.0, 0.0, base)
        } else if south {
            (1.0, -2.0, base - 8)
        } else {
            (0.0, -1.0, base - 4)
        };
        let z = (2.0 / 3.0) * (xn + yn + z_off);
        let phi = FRAC_PI_4 * (xn - yn + phi_off + 2.0 * col as f64);
        (phi, z)
    } else {
        let sign = if north { 1.0 } else { -1.0 };
        let (px, py) = if north { (x, y) } else { (ns - y, ns - x) };
        let kx = ns - px;
        let ky = ns - py;

        let phi_t = if kx + ky == 0.0 {
            0.0
        } else {
            PI * ky / (2.0 * (kx + ky))
        };
        let (k, denom) = if phi_t < FRAC_PI_4 {
            (kx, (2.0 * phi_t - PI) * ns)
        } else {
            (ky, 2.0 * phi_t * ns)
        };
        let z = if denom.abs() < 1e-15 {
            sign
        } else {
            let v = PI * k / denom;
            (1.0 - v * v / 3.0) * sign
        };
        let col = if south { base - 8 } else { base };
        (FRAC_PI_2 * col as f64 + phi_t, z)
    };

    (lon.rem_euclid(TAU), z.clamp(-1.0, 1.0).asin())
}

/// Bit-interleave (x, y): x supplies the even bits, y the odd bits.
fn interleave(x: u64, y: u64) -> u64 {
    let mut out = 0u64;
    for bit in 0..32 {
        out |= ((x >> bit) & 1) << (2 * bit);
        out |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    out
}

fn deinterleave(sub: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    for bit in 0..32 {
        x |= ((sub >> (2 * bit)) & 1) << bit;
        y |= ((sub >> (2 * bit + 1)) & 1) << bit;
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_counts() {
        assert_eq!(npix(0), 12);
        assert_eq!(npix(1), 48);
        assert_eq!(npix(29), 12 * (1u64 << 58));
    }

    #[test]
    fn pixel_areas_cover_sphere() {
        for order in [0u8, 3, 8, 29] {
            let total = pixel_area(order) * npix(order) as f64;
            assert!((total - 4.0 * PI).abs() < 1e-9);
        }
    }

    #[test]
    fn interleave_roundtrip() {
        for x in 0..40 {
            for y in 0..40 {
                assert_eq!(deinterleave(interleave(x, y)), (x, y));
            }
        }
    }

    #[test]
    fn center_lies_in_its_own_pixel() {
        for order in [2u8, 5, 9] {
            for index in (0..npix(order)).step_by(7) {
                let (ra, dec) = nested_to_radec(index, order);
                assert_eq!(radec_to_nested(ra, dec, order), index, "order {order}");
            }
        }
    }

    #[test]
    fn every_pixel_is_reachable_at_low_order() {
        let order = 2;
        let mut seen = vec![false; npix(order) as usize];
        for i in 0..360 {
            for j in 0..181 {
                let idx = radec_to_nested(i as f64, -90.0 + j as f64, order);
                seen[idx as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn coarse_pixel_contains_fine_index() {
        let (ra, dec) = (123.4, -21.7);
        let coarse = radec_to_nested(ra, dec, 6);
        let fine = radec_to_nested(ra, dec, MAX_ORDER);
        let (lo, hi) = to_max_order_range(coarse, 6);
        assert!(fine >= lo && fine < hi);
    }
}
