//! Great-circle geometry on the celestial sphere.
//!
//! Offsets between candidates and catalog sources are arcsecond-scale, where
//! `acos(a·b)` loses most of its precision, so separations use the Vincenty
//! form (stable at all angles).

/// Angular separation in degrees.
pub fn separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (l1, b1) = (ra1.to_radians(), dec1.to_radians());
    let (l2, b2) = (ra2.to_radians(), dec2.to_radians());
    let dl = l2 - l1;

    let (sb1, cb1) = b1.sin_cos();
    let (sb2, cb2) = b2.sin_cos();
    let (sdl, cdl) = dl.sin_cos();

    let num1 = cb2 * sdl;
    let num2 = cb1 * sb2 - sb1 * cb2 * cdl;
    let denom = sb1 * sb2 + cb1 * cb2 * cdl;
    num1.hypot(num2).atan2(denom).to_degrees()
}

/// Angular separation in arcseconds.
pub fn separation_arcsec(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    separation_deg(ra1, dec1, ra2, dec2) * 3600.0
}

/// Offset a position by `east`/`north` arcseconds on the tangent plane.
///
/// Used to place synthetic sources around a candidate.
pub fn offset_position(ra: f64, dec: f64, east_arcsec: f64, north_arcsec: f64) -> (f64, f64) {
    let dec_new = (dec + north_arcsec / 3600.0).clamp(-90.0, 90.0);
    let cos_dec = dec.to_radians().cos().max(1e-9);
    let ra_new = (ra + east_arcsec / 3600.0 / cos_dec).rem_euclid(360.0);
    (ra_new, dec_new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "expected {a} ~= {b} (diff = {})", (a - b).abs());
    }

    #[test]
    fn quarter_circle() {
        assert_close(separation_deg(0.0, 0.0, 90.0, 0.0), 90.0, 1e-10);
        assert_close(separation_deg(0.0, 0.0, 0.0, 90.0), 90.0, 1e-10);
        assert_close(separation_deg(10.0, -90.0, 200.0, 90.0), 180.0, 1e-10);
    }

    #[test]
    fn arcsecond_offsets_are_precise() {
        let sep = separation_arcsec(150.0, 2.0, 150.0, 2.0 + 1.0 / 3600.0);
        assert_close(sep, 1.0, 1e-8);
    }

    #[test]
    fn offset_position_roundtrip() {
        let (ra, dec) = offset_position(45.0, 30.0, 3.0, 4.0);
        let sep = separation_arcsec(45.0, 30.0, ra, dec);
        assert_close(sep, 5.0, 1e-3);
    }
}
