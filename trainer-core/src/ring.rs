//! # Ring Buffer Module
//!
//! Fixed-capacity circular sample storage between the capture callback
//! and the analysis step. Capacity is always a power of two so the wrap
//! is a single bitmask, and the window snapshot reads backward from the
//! write cursor to return the newest samples in chronological order.

/// Circular buffer of mono f32 samples with a monotonic write cursor.
#[derive(Debug)]
pub struct RingBuffer {
    data: Vec<f32>,
    write_pos: usize,
}

impl RingBuffer {
    /// Creates a zeroed buffer. `capacity` must be a power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        Self {
            data: vec![0.0; capacity],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Appends a frame at the cursor, wrapping modulo capacity, and
    /// advances the cursor by the frame length.
    pub fn write(&mut self, frame: &[f32]) {
        let mask = self.data.len() - 1;
        for (i, &sample) in frame.iter().enumerate() {
            self.data[(self.write_pos + i) & mask] = sample;
        }
        self.write_pos = (self.write_pos + frame.len()) & mask;
    }

    /// Copies the most recent `len` samples into `out`, oldest first.
    /// `len` must not exceed capacity.
    pub fn snapshot_window(&self, len: usize, out: &mut Vec<f32>) {
        assert!(len <= self.data.len(), "window longer than ring capacity");
        let mask = self.data.len() - 1;
        let start = (self.write_pos + self.data.len() - len) & mask;
        out.clear();
        out.extend((0..len).map(|i| self.data[(start + i) & mask]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, offset: usize) -> Vec<f32> {
        (0..n).map(|i| (offset + i) as f32).collect()
    }

    #[test]
    fn full_capacity_round_trip_preserves_order() {
        let mut ring = RingBuffer::new(16);
        ring.write(&ramp(16, 0));
        let mut out = Vec::new();
        ring.snapshot_window(16, &mut out);
        assert_eq!(out, ramp(16, 0));
    }

    #[test]
    fn overwrite_keeps_last_capacity_samples() {
        let mut ring = RingBuffer::new(16);
        ring.write(&ramp(16 + 5, 0));
        let mut out = Vec::new();
        ring.snapshot_window(16, &mut out);
        assert_eq!(out, ramp(16, 5));
    }

    #[test]
    fn sub_window_returns_most_recent_samples() {
        let mut ring = RingBuffer::new(16);
        for chunk in ramp(23, 0).chunks(7) {
            ring.write(chunk);
        }
        let mut out = Vec::new();
        ring.snapshot_window(8, &mut out);
        assert_eq!(out, ramp(8, 15));
    }

    #[test]
    fn snapshot_reuses_output_allocation() {
        let mut ring = RingBuffer::new(8);
        ring.write(&ramp(8, 0));
        let mut out = vec![99.0; 8];
        ring.snapshot_window(4, &mut out);
        assert_eq!(out, ramp(4, 4));
    }
}
