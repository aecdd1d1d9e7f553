//! Least-squares fit of `A·sin(2π f t + φ)` to a short tone segment.
//!
//! The starting point comes from either a caller-supplied frequency or the peak
//! of a zero-padded FFT; amplitude and phase at that frequency are solved
//! linearly, then all three parameters are refined with Levenberg–Marquardt.

use crate::error::{MorseError, Result};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Minimum number of samples a fit needs
pub const MIN_FIT_SAMPLES: usize = 4;

/// Smallest FFT used for the frequency estimate
const MIN_FFT_SIZE: usize = 4096;

/// Relative spacing of the frequency grid scanned around the FFT estimate
const GRID_STEP: f64 = 0.005;
const GRID_HALF_WIDTH: i32 = 10;

const INITIAL_LAMBDA: f64 = 1e-3;
const MAX_LAMBDA: f64 = 1e12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Starting frequency in Hz; estimated from the spectrum when `None`
    pub frequency_guess: Option<f64>,
    pub max_iterations: usize,
    /// Stop once an accepted step lowers the squared error by less than this fraction
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            frequency_guess: None,
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

/// Fitted model parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinusoidFit {
    /// Peak amplitude, always non-negative
    pub amplitude: f64,
    /// Hz
    pub frequency: f64,
    /// Radians in (-π, π], relative to t = 0 of the fitted times
    pub phase: f64,
    /// Root-mean-square of the residual
    pub rms_residual: f64,
    pub iterations: usize,
}

impl SinusoidFit {
    pub fn evaluate(&self, t: f64) -> f64 {
        model([self.amplitude, self.frequency, self.phase], t)
    }

    pub fn curve(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.evaluate(t)).collect()
    }

    /// Period of the fitted tone in seconds
    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }
}

fn model(p: [f64; 3], t: f64) -> f64 {
    p[0] * (2.0 * PI * p[1] * t + p[2]).sin()
}

fn squared_error(p: [f64; 3], times: &[f64], values: &[f64]) -> f64 {
    times
        .iter()
        .zip(values)
        .map(|(&t, &y)| {
            let r = y - model(p, t);
            r * r
        })
        .sum()
}

/// Fit a segment sampled at `sample_rate`, timed from its first sample
pub fn fit_segment(segment: &[f32], sample_rate: u32, options: &FitOptions) -> Result<SinusoidFit> {
    let times = crate::window::sample_times(segment.len(), sample_rate, 0.0);
    fit_sinusoid(&times, segment, options)
}

/// Fit `A·sin(2π f t + φ)` to `(times, values)`
pub fn fit_sinusoid(times: &[f64], values: &[f32], options: &FitOptions) -> Result<SinusoidFit> {
    if times.len() != values.len() {
        return Err(MorseError::InvalidConfig(format!(
            "{} timestamps for {} samples",
            times.len(),
            values.len()
        )));
    }
    if values.len() < MIN_FIT_SAMPLES {
        return Err(MorseError::EmptySegment(values.len()));
    }

    let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    if values.iter().all(|&v| v == 0.0) {
        log::warn!("Segment of {} samples is silent, nothing to fit", values.len());
        return Err(MorseError::FitDidNotConverge);
    }

    let frequency = match options.frequency_guess {
        Some(f) if f > 0.0 && f.is_finite() => f,
        Some(f) => {
            return Err(MorseError::InvalidConfig(format!(
                "frequency guess must be positive, got {}",
                f
            )))
        }
        None => {
            let estimate = estimate_frequency(times, &values)?;
            refine_on_grid(times, &values, estimate)
        }
    };

    let (amplitude, phase) = linear_amplitude_phase(times, &values, frequency);
    log::debug!(
        "Initial guess: A={:.4} f={:.2} Hz phi={:.4}",
        amplitude,
        frequency,
        phase
    );

    let (p, iterations, sse) =
        levenberg_marquardt([amplitude, frequency, phase], times, &values, options);

    if !p.iter().all(|v| v.is_finite()) || !sse.is_finite() || p[1] <= 0.0 {
        return Err(MorseError::FitDidNotConverge);
    }

    let (amplitude, phase) = if p[0] < 0.0 {
        (-p[0], wrap_phase(p[2] + PI))
    } else {
        (p[0], wrap_phase(p[2]))
    };

    let fit = SinusoidFit {
        amplitude,
        frequency: p[1],
        phase,
        rms_residual: (sse / values.len() as f64).sqrt(),
        iterations,
    };

    log::info!(
        "Fitted A={:.4} f={:.3} Hz phi={:.4} rad (rms residual {:.3e}, {} iterations)",
        fit.amplitude,
        fit.frequency,
        fit.phase,
        fit.rms_residual,
        fit.iterations
    );

    Ok(fit)
}

/// Map an angle into (-π, π]
fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Peak of the zero-padded magnitude spectrum, refined by parabolic interpolation
fn estimate_frequency(times: &[f64], values: &[f64]) -> Result<f64> {
    let n = values.len();
    let dt = (times[n - 1] - times[0]) / (n - 1) as f64;
    if !(dt > 0.0) {
        return Err(MorseError::InvalidConfig(
            "timestamps must be strictly increasing".into(),
        ));
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let fft_size = (8 * n).next_power_of_two().max(MIN_FFT_SIZE);

    let mut buffer: Vec<Complex<f64>> = values
        .iter()
        .map(|&v| Complex::new(v - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_size)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(fft_size).process(&mut buffer);

    let magnitudes: Vec<f64> = buffer[..fft_size / 2].iter().map(|c| c.norm()).collect();

    let (peak, _) = magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .fold((1, f64::MIN), |best, (k, &m)| if m > best.1 { (k, m) } else { best });

    let mut bin = peak as f64;
    if peak + 1 < magnitudes.len() {
        let (a, b, c) = (magnitudes[peak - 1], magnitudes[peak], magnitudes[peak + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f64::EPSILON {
            bin += 0.5 * (a - c) / denom;
        }
    }

    let frequency = bin / (fft_size as f64 * dt);
    log::debug!("Spectral peak at bin {} -> {:.2} Hz", peak, frequency);
    if !(frequency > 0.0) {
        return Err(MorseError::FitDidNotConverge);
    }
    Ok(frequency)
}

/// Pick the grid frequency near `center` whose linear fit leaves the smallest residual
fn refine_on_grid(times: &[f64], values: &[f64], center: f64) -> f64 {
    (-GRID_HALF_WIDTH..=GRID_HALF_WIDTH)
        .map(|k| center * (1.0 + k as f64 * GRID_STEP))
        .filter(|&f| f > 0.0)
        .map(|f| {
            let (a, phi) = linear_amplitude_phase(times, values, f);
            (f, squared_error([a, f, phi], times, values))
        })
        .fold((center, f64::INFINITY), |best, cand| if cand.1 < best.1 { cand } else { best })
        .0
}

/// Least-squares amplitude and phase at a fixed frequency.
///
/// `A·sin(ωt + φ) = a·sin(ωt) + b·cos(ωt)` with `a = A·cos φ`, `b = A·sin φ`.
fn linear_amplitude_phase(times: &[f64], values: &[f64], frequency: f64) -> (f64, f64) {
    let w = 2.0 * PI * frequency;
    let (mut ss, mut sc, mut cc, mut ys, mut yc) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&t, &y) in times.iter().zip(values) {
        let (s, c) = (w * t).sin_cos();
        ss += s * s;
        sc += s * c;
        cc += c * c;
        ys += y * s;
        yc += y * c;
    }

    let det = ss * cc - sc * sc;
    if det.abs() <= f64::EPSILON * (ss * cc).abs().max(1.0) {
        let peak = values.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
        return (peak, 0.0);
    }

    let a = (ys * cc - yc * sc) / det;
    let b = (yc * ss - ys * sc) / det;
    (a.hypot(b), b.atan2(a))
}

/// Returns (parameters, accepted iterations, final squared error)
fn levenberg_marquardt(
    start: [f64; 3],
    times: &[f64],
    values: &[f64],
    options: &FitOptions,
) -> ([f64; 3], usize, f64) {
    let mut p = start;
    let mut sse = squared_error(p, times, values);
    let mut lambda = INITIAL_LAMBDA;
    let mut iterations = 0;

    while iterations < options.max_iterations && sse > 0.0 {
        let mut jtj = [[0.0f64; 3]; 3];
        let mut jtr = [0.0f64; 3];
        for (&t, &y) in times.iter().zip(values) {
            let theta = 2.0 * PI * p[1] * t + p[2];
            let (s, c) = theta.sin_cos();
            let j = [s, p[0] * c * 2.0 * PI * t, p[0] * c];
            let r = y - p[0] * s;
            for row in 0..3 {
                jtr[row] += j[row] * r;
                for col in 0..3 {
                    jtj[row][col] += j[row] * j[col];
                }
            }
        }

        let mut improved = false;
        while lambda < MAX_LAMBDA {
            let mut damped = jtj;
            for d in 0..3 {
                damped[d][d] += lambda * jtj[d][d].max(f64::MIN_POSITIVE);
            }

            let Some(delta) = solve3(damped, jtr) else {
                lambda *= 10.0;
                continue;
            };

            let candidate = [p[0] + delta[0], p[1] + delta[1], p[2] + delta[2]];
            let candidate_sse = squared_error(candidate, times, values);

            if candidate_sse.is_finite() && candidate_sse < sse {
                let gain = (sse - candidate_sse) / sse;
                p = candidate;
                sse = candidate_sse;
                lambda = (lambda / 10.0).max(1e-15);
                improved = gain > options.tolerance;
                iterations += 1;
                if !improved {
                    return (p, iterations, sse);
                }
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            break;
        }
    }

    (p, iterations, sse)
}

/// Solve a 3×3 linear system with partial pivoting
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn synth(amplitude: f64, frequency: f64, phase: f64, n: usize, fs: f64) -> (Vec<f64>, Vec<f32>) {
        let times: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let values = times
            .iter()
            .map(|&t| (amplitude * (2.0 * PI * frequency * t + phase).sin()) as f32)
            .collect();
        (times, values)
    }

    #[test]
    fn test_solve3() {
        let a = [[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
        let x = solve3(a, [8.0, -11.0, -3.0]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
        assert!((x[2] + 1.0).abs() < 1e-12);
        assert!(solve3([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]], [1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_fit_silent_segment() {
        let times: Vec<f64> = (0..220).map(|i| i as f64 / 44100.0).collect();
        let result = fit_sinusoid(&times, &[0.0f32; 220], &FitOptions::default());
        assert!(matches!(result, Err(MorseError::FitDidNotConverge)));
    }

    #[test]
    fn test_wrap_phase() {
        assert!((wrap_phase(2.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((wrap_phase(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_phase(0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_phase(-1.5 * PI) - 0.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_frequency() {
        let (times, values) = synth(1.0, 1760.0, 0.0, 441, 44100.0);
        let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        let estimate = estimate_frequency(&times, &values).unwrap();
        assert!((estimate - 1760.0).abs() < 20.0, "estimate {}", estimate);
    }

    #[test]
    fn test_fit_clean_tone_without_guess() {
        let (times, values) = synth(0.8, 1760.0, 0.3, 220, 44100.0);
        let fit = fit_sinusoid(&times, &values, &FitOptions::default()).unwrap();

        assert!((fit.amplitude - 0.8).abs() < 1e-4, "amplitude {}", fit.amplitude);
        assert!((fit.frequency - 1760.0).abs() < 0.1, "frequency {}", fit.frequency);
        assert!((fit.phase - 0.3).abs() < 1e-3, "phase {}", fit.phase);
        assert!(fit.rms_residual < 1e-4);
    }

    #[test]
    fn test_fit_with_frequency_guess() {
        let (times, values) = synth(10000.0, 1760.0, -1.2, 220, 44100.0);
        let options = FitOptions {
            frequency_guess: Some(1720.0),
            ..FitOptions::default()
        };
        let fit = fit_sinusoid(&times, &values, &options).unwrap();

        assert!((fit.amplitude - 10000.0).abs() < 1.0);
        assert!((fit.frequency - 1760.0).abs() < 0.1);
        assert!((fit.phase + 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_fit_negative_amplitude_is_normalized() {
        let (times, values) = synth(-0.5, 800.0, 0.0, 441, 44100.0);
        let fit = fit_sinusoid(&times, &values, &FitOptions::default()).unwrap();

        assert!(fit.amplitude > 0.0);
        assert!((fit.amplitude - 0.5).abs() < 1e-4);
        assert!((fit.phase.abs() - PI).abs() < 1e-3);
        for (&t, &y) in times.iter().zip(&values) {
            assert!((fit.evaluate(t) - y as f64).abs() < 1e-3);
        }
    }

    #[test]
    fn test_fit_noisy_tone() {
        let (times, mut values) = synth(0.8, 1760.0, 1.0, 2205, 44100.0);
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.05).unwrap();
        for v in values.iter_mut() {
            *v += noise.sample(&mut rng) as f32;
        }

        let fit = fit_sinusoid(&times, &values, &FitOptions::default()).unwrap();
        assert!((fit.frequency - 1760.0).abs() < 2.0, "frequency {}", fit.frequency);
        assert!((fit.amplitude - 0.8).abs() < 0.02, "amplitude {}", fit.amplitude);
        assert!(fit.rms_residual < 0.07);
    }

    #[test]
    fn test_fit_segment_uses_relative_time() {
        let (_, values) = synth(1.0, 1000.0, 0.5, 400, 48000.0);
        let fit = fit_segment(&values, 48000, &FitOptions::default()).unwrap();
        assert!((fit.phase - 0.5).abs() < 1e-3);
        assert!((fit.period() - 0.001).abs() < 1e-7);
    }

    #[test]
    fn test_fit_rejects_short_or_mismatched_input() {
        assert!(matches!(
            fit_sinusoid(&[0.0, 1.0], &[0.0, 1.0], &FitOptions::default()),
            Err(MorseError::EmptySegment(2))
        ));
        assert!(fit_sinusoid(&[0.0, 1.0, 2.0], &[0.0; 4], &FitOptions::default()).is_err());

        let (times, values) = synth(1.0, 100.0, 0.0, 100, 8000.0);
        let options = FitOptions {
            frequency_guess: Some(-1.0),
            ..FitOptions::default()
        };
        assert!(fit_sinusoid(&times, &values, &options).is_err());
    }
}
