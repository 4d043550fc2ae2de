//! # Analysis Window Module
//!
//! Accumulates incoming audio chunks into a sliding, fixed-length analysis
//! window. Chunks of any size are accepted; the newest `capacity` samples are
//! kept and the oldest are discarded.

/// Converts a buffer of 16-bit signed little-endian PCM into normalized samples.
///
/// Each sample is scaled by `1 / 32768` so the result lies in `[-1, 1)`.
/// A trailing odd byte cannot form a sample and is ignored.
pub fn pcm16le_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Sliding buffer holding the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    samples: Vec<f32>,
    capacity: usize,
}

impl WindowBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a chunk of normalized samples and keeps only the newest `capacity`.
    pub fn push(&mut self, chunk: &[f32]) {
        self.samples.extend_from_slice(chunk);
        if self.samples.len() > self.capacity {
            let excess = self.samples.len() - self.capacity;
            self.samples.drain(..excess);
        }
    }

    /// Decodes a PCM16LE chunk and appends it.
    pub fn push_pcm16le(&mut self, bytes: &[u8]) {
        let samples = pcm16le_to_samples(bytes);
        self.push(&samples);
    }

    /// A window is only analysed once it is completely filled.
    pub fn is_ready(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pcm() {
        let bytes = [0x00, 0x00, 0xFF, 0x7F, 0x00, 0x80, 0x00, 0x40, 0x12];
        let samples = pcm16le_to_samples(&bytes);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(samples[2], -1.0);
        assert_eq!(samples[3], 0.5);
    }

    #[test]
    fn partial_window_is_not_ready() {
        let mut window = WindowBuffer::new(8);
        window.push(&[0.1; 5]);
        assert!(!window.is_ready());
        assert_eq!(window.len(), 5);
        window.push(&[0.2; 3]);
        assert!(window.is_ready());
    }

    #[test]
    fn keeps_newest_samples_when_overfilled() {
        let mut window = WindowBuffer::new(4);
        window.push(&[1.0, 2.0, 3.0]);
        window.push(&[4.0, 5.0, 6.0]);
        assert!(window.is_ready());
        assert_eq!(window.samples(), &[3.0, 4.0, 5.0, 6.0]);

        // A single chunk larger than the window also keeps only its tail.
        window.push(&[7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(window.samples(), &[8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn clear_discards_everything() {
        let mut window = WindowBuffer::new(4);
        window.push_pcm16le(&[0u8; 8]);
        assert!(window.is_ready());
        window.clear();
        assert!(window.is_empty());
        assert!(!window.is_ready());
    }
}
