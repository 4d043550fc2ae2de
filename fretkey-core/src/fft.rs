//! # Spectral Analysis Module
//!
//! Turns a filled analysis window into a magnitude spectrum. The window is
//! tapered with a Hann window and transformed with RustFFT; only the
//! magnitudes up to the Nyquist frequency are kept.
//!
//! Nothing is cached between calls except the FFT plan itself: every ready
//! window produces a fresh `SpectralFrame` that the caller consumes at once.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Magnitude spectrum of one analysis window.
///
/// Bin `b` corresponds to `b * sample_rate / window_size` Hz.
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    pub magnitudes: Vec<f32>,
    pub sample_rate: u32,
    pub window_size: usize,
}

impl SpectralFrame {
    /// Centre frequency of a bin in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.window_size as f32
    }

    /// Bin index containing `frequency`, i.e. `floor(freq * N / sample_rate)`.
    pub fn frequency_to_bin(&self, frequency: f32) -> usize {
        (frequency * self.window_size as f32 / self.sample_rate as f32)
            .floor()
            .max(0.0) as usize
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
///
/// Coefficient for sample `i` is `0.5 * (1 - cos(2π·i / (n - 1)))`, so both
/// edges are tapered to zero.
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Calculates the magnitude of each bin below the Nyquist frequency.
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
        .collect()
}

/// Hann-windowed forward FFT for a fixed window size.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window_size: usize,
    sample_rate: u32,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("window_size", &self.window_size)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(window_size: usize, sample_rate: u32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        Self {
            fft,
            window_size,
            sample_rate,
        }
    }

    /// Computes the magnitude spectrum of one full window.
    ///
    /// Returns `None` when `window` does not hold exactly `window_size`
    /// samples; a partial window is simply not analysable.
    pub fn analyze(&self, window: &[f32]) -> Option<SpectralFrame> {
        if window.len() != self.window_size {
            return None;
        }

        let mut processed = window.to_vec();
        apply_hann_window(&mut processed);

        let mut buffer: Vec<Complex<f32>> = processed
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);

        Some(SpectralFrame {
            magnitudes: spectrum_to_magnitudes(&buffer),
            sample_rate: self.sample_rate,
            window_size: self.window_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_tapers_edges() {
        let mut buffer = vec![1.0f32; 9];
        apply_hann_window(&mut buffer);
        assert!(buffer[0].abs() < 1e-6);
        assert!(buffer[8].abs() < 1e-6);
        assert!((buffer[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_window_length() {
        let analyzer = SpectralAnalyzer::new(64, 8000);
        assert!(analyzer.analyze(&[0.0; 32]).is_none());
    }

    #[test]
    fn frame_has_half_window_bins() {
        let analyzer = SpectralAnalyzer::new(64, 8000);
        let frame = analyzer.analyze(&[0.0; 64]).unwrap();
        assert_eq!(frame.len(), 32);
        assert!(frame.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let n = 1024;
        let sample_rate = 8000;
        // Exactly on bin 32.
        let freq = 32.0 * sample_rate as f32 / n as f32;
        let signal: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        let frame = SpectralAnalyzer::new(n, sample_rate).analyze(&signal).unwrap();
        let (peak_bin, _) = frame
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak_bin, 32);
        assert_eq!(frame.frequency_to_bin(freq), 32);
        assert!((frame.bin_frequency(32) - freq).abs() < 1e-3);
    }
}
