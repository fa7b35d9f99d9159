//! ASCII light-curve plot for terminal output.
//!
//! Fixed-size grid with deterministic output. Magnitudes run downward, so
//! brighter points sit higher.
//!
//! Plot elements:
//! - detections: `o`
//! - fitted model: `-` line
//! - model peak: `*` (when it does not coincide with a detection)

use crate::domain::CurveModel;
use crate::fit::LightCurveSample;
use crate::models::predict;

/// Render detections and an optional fitted model.
pub fn render_light_curve(
    samples: &[LightCurveSample],
    fit: Option<&CurveModel>,
    peak_time: Option<f64>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let Some((t_min, t_max)) = time_range(samples) else {
        return "Plot: not enough detections to draw a light curve\n".to_string();
    };
    let curve = fit.map(|model| sample_curve(model, t_min, t_max, width));

    let (m_min, m_max) = mag_range(samples, curve.as_deref()).unwrap_or((0.0, 1.0));
    let (m_min, m_max) = pad_range(m_min, m_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so detections overlay it.
    if let Some(curve) = &curve {
        draw_curve(&mut grid, curve, t_min, t_max, m_min, m_max);
    }
    if let (Some(model), Some(tp)) = (fit, peak_time) {
        let x = map_x(tp, t_min, t_max, width);
        let y = map_y(predict(model.name, tp, &model.params), m_min, m_max, height);
        grid[y][x] = '*';
    }
    for s in samples {
        let x = map_x(s.t, t_min, t_max, width);
        let y = map_y(s.mag, m_min, m_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.2}, {t_max:.2}] d | mag=[{m_min:.2}, {m_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn time_range(samples: &[LightCurveSample]) -> Option<(f64, f64)> {
    let (min_t, max_t) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.t), hi.max(s.t))
        });
    (min_t.is_finite() && max_t.is_finite() && max_t > min_t).then_some((min_t, max_t))
}

fn sample_curve(model: &CurveModel, t_min: f64, t_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_min + u * (t_max - t_min);
            (t, predict(model.name, t, &model.params))
        })
        .filter(|(_, m)| m.is_finite())
        .collect()
}

fn mag_range(samples: &[LightCurveSample], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mags = samples
        .iter()
        .map(|s| s.mag)
        .chain(curve.into_iter().flatten().map(|&(_, m)| m));
    let (lo, hi) = mags.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
        (lo.min(m), hi.max(m))
    });
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width.max(2) as f64 - 1.0)).round() as usize
}

/// Brightest magnitude maps to row 0.
fn map_y(mag: f64, m_min: f64, m_max: f64, height: usize) -> usize {
    let u = ((mag - m_min) / (m_max - m_min)).clamp(0.0, 1.0);
    (u * (height.max(2) as f64 - 1.0)).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    m_min: f64,
    m_max: f64,
) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, m) in curve {
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(m, m_min, m_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, y, '-'),
            None => grid[y][x] = '-',
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x0, mut y0) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y0 as usize)
            .and_then(|row| row.get_mut(x0 as usize))
        {
            if *cell == ' ' {
                *cell = ch;
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    fn spl(y0: f64, a: f64) -> CurveModel {
        CurveModel {
            name: ModelKind::SinglePowerLaw,
            display_name: ModelKind::SinglePowerLaw.display_name().to_string(),
            params: vec![y0, a],
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        // mag = 18 + 2 log10(t): fading from 18 at day 1 to 20 at day 10.
        let samples = [
            LightCurveSample { t: 1.0, mag: 18.0 },
            LightCurveSample { t: 10.0, mag: 20.0 },
        ];
        let txt = render_light_curve(&samples, Some(&spl(18.0, -2.0)), None, 10, 5);
        let expected = concat!(
            "Plot: t=[1.00, 10.00] d | mag=[17.90, 20.10]\n",
            "o         \n",
            " -        \n",
            "  --      \n",
            "    ----  \n",
            "        -o\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn single_epoch_is_not_plotted() {
        let txt = render_light_curve(&[LightCurveSample { t: 2.0, mag: 18.0 }], None, None, 20, 8);
        assert!(txt.starts_with("Plot: not enough"));
    }

    #[test]
    fn peak_marker_is_drawn() {
        let samples = [
            LightCurveSample { t: 1.0, mag: 19.0 },
            LightCurveSample { t: 3.0, mag: 18.5 },
            LightCurveSample { t: 9.0, mag: 20.0 },
        ];
        let txt = render_light_curve(&samples, Some(&spl(18.0, -2.0)), Some(5.0), 20, 8);
        assert!(txt.contains('*'));
        let points: usize = txt.lines().skip(1).map(|l| l.matches('o').count()).sum();
        assert_eq!(points, 3);
    }
}
