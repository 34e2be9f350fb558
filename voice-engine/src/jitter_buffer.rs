//! Jitter Buffer (C7).
//!
//! Wraps a [`RingBuffer`] sized for `buffer_size_ms` at the TTS sample rate
//! and decouples synthesis rate from playback rate. `ready` fires once when
//! occupancy first crosses `low_watermark`; `underrun` fires whenever a pull
//! cannot be fully satisfied; `drained` fires once the producer has signalled
//! completion and occupancy reaches zero.

use tracing::debug;

use crate::config::JitterBufferConfig;
use crate::ring_buffer::RingBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitterEvent {
    Ready,
    Underrun { requested: usize, available: usize },
    Drained,
}

pub struct JitterBuffer {
    ring: RingBuffer,
    low_watermark_samples: usize,
    ready_fired: bool,
    producer_done: bool,
}

impl JitterBuffer {
    #[must_use]
    pub fn new(config: &JitterBufferConfig, sample_rate: u32) -> Self {
        let capacity = ms_to_samples(config.buffer_size_ms, sample_rate);
        let low_watermark_samples = ms_to_samples(config.low_watermark_ms, sample_rate);
        Self {
            ring: RingBuffer::new(capacity),
            low_watermark_samples,
            ready_fired: false,
            producer_done: false,
        }
    }

    /// Admit one synthesized chunk. Lossy on overflow, per the ring
    /// buffer's own contract — a synthesizer producing faster than playback
    /// consumes is expected to be bounded by §5's "only one TTS stream
    /// active" rule, not by this buffer silently growing.
    pub fn push(&mut self, chunk: &[i16]) -> Vec<JitterEvent> {
        self.ring.write(chunk);
        let mut events = Vec::new();
        if !self.ready_fired && self.ring.is_above(self.low_watermark_samples) {
            self.ready_fired = true;
            debug!(available = self.ring.available(), "jitter buffer ready");
            events.push(JitterEvent::Ready);
        }
        events
    }

    /// Pull up to `n` samples for one playback frame.
    pub fn pull(&mut self, n: usize) -> (Vec<i16>, Vec<JitterEvent>) {
        let available_before = self.ring.available();
        let data = self.ring.read(n);
        let mut events = Vec::new();

        if data.len() < n {
            events.push(JitterEvent::Underrun {
                requested: n,
                available: available_before,
            });
        }

        if self.producer_done && self.ring.available() == 0 {
            events.push(JitterEvent::Drained);
        }

        (data, events)
    }

    /// Signal that no further chunks will be pushed (synthesis complete).
    pub fn mark_producer_done(&mut self) -> Vec<JitterEvent> {
        self.producer_done = true;
        if self.ring.available() == 0 {
            vec![JitterEvent::Drained]
        } else {
            Vec::new()
        }
    }

    /// Reset to a fresh, empty state for the next `speak()` call or a
    /// barge-in stop.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.ready_fired = false;
        self.producer_done = false;
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.ring.available()
    }
}

pub(crate) fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JitterBufferConfig {
        JitterBufferConfig {
            buffer_size_ms: 500,
            low_watermark_ms: 100,
            frame_duration_ms: 20,
        }
    }

    #[test]
    fn ready_fires_once_on_crossing_low_watermark() {
        let mut jb = JitterBuffer::new(&config(), 1_000); // 1 sample == 1ms for easy math
        assert!(jb.push(&vec![0i16; 50]).is_empty());
        let events = jb.push(&vec![0i16; 60]);
        assert_eq!(events, vec![JitterEvent::Ready]);
        // Further pushes do not re-fire ready.
        assert!(jb.push(&vec![0i16; 10]).is_empty());
    }

    #[test]
    fn underrun_fires_when_pull_cannot_be_satisfied() {
        let mut jb = JitterBuffer::new(&config(), 1_000);
        jb.push(&vec![0i16; 10]);
        let (data, events) = jb.pull(20);
        assert_eq!(data.len(), 10);
        assert_eq!(
            events,
            vec![JitterEvent::Underrun {
                requested: 20,
                available: 10
            }]
        );
    }

    #[test]
    fn drained_fires_after_producer_done_and_empty() {
        let mut jb = JitterBuffer::new(&config(), 1_000);
        jb.push(&vec![0i16; 10]);
        assert!(jb.mark_producer_done().is_empty());
        let (_data, events) = jb.pull(10);
        assert!(events.iter().any(|e| *e == JitterEvent::Drained));
    }

    #[test]
    fn mark_producer_done_on_already_empty_buffer_fires_immediately() {
        let mut jb = JitterBuffer::new(&config(), 1_000);
        assert_eq!(jb.mark_producer_done(), vec![JitterEvent::Drained]);
    }

    #[test]
    fn clear_resets_watermark_latch() {
        let mut jb = JitterBuffer::new(&config(), 1_000);
        jb.push(&vec![0i16; 200]);
        assert_eq!(jb.push(&vec![0i16; 1]).len(), 0); // already fired
        jb.clear();
        assert_eq!(jb.push(&vec![0i16; 150]), vec![JitterEvent::Ready]);
    }
}
