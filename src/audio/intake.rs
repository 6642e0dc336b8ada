use std::collections::VecDeque;

use crate::config::ChannelPolicy;

/// Counters describing what the intake has done with its input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntakeStats {
    /// Mono samples accepted into the queue
    pub accepted: u64,
    /// Mono samples dropped because the queue was full
    pub dropped: u64,
    /// Non-finite input samples replaced by silence
    pub repaired: u64,
}

/// Bounded accumulator turning interleaved capture chunks into mono frames.
///
/// Chunks may be any length. A trailing partial interleaved frame is held
/// until the next chunk completes it. When the queue is full the oldest
/// samples are discarded.
#[derive(Debug)]
pub struct SampleIntake {
    channels: usize,
    policy: ChannelPolicy,
    capacity: usize,
    queue: VecDeque<f32>,
    partial: Vec<f32>,
    overflowing: bool,
    stats: IntakeStats,
}

impl SampleIntake {
    pub fn new(channels: usize, policy: ChannelPolicy, capacity: usize) -> Self {
        Self {
            channels: channels.max(1),
            policy,
            capacity,
            queue: VecDeque::with_capacity(capacity),
            partial: Vec::with_capacity(channels),
            overflowing: false,
            stats: IntakeStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Longest interleaved slice that fits after a drain down to less than
    /// one frame of `frame_len`, so a caller draining between slices never
    /// overflows.
    pub fn burst_len(&self, frame_len: usize) -> usize {
        (self.capacity + 1).saturating_sub(frame_len).max(1) * self.channels
    }

    pub fn stats(&self) -> IntakeStats {
        self.stats
    }

    pub fn push(&mut self, chunk: &[f32]) {
        if chunk.is_empty() {
            return;
        }
        let dropped_before = self.stats.dropped;
        let mut rest = chunk;

        if !self.partial.is_empty() {
            let take = (self.channels - self.partial.len()).min(rest.len());
            self.partial.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.partial.len() == self.channels {
                let partial = std::mem::take(&mut self.partial);
                let sample = self.fold(&partial);
                self.enqueue(sample);
                self.partial = partial;
                self.partial.clear();
            }
        }

        let whole = rest.len() / self.channels * self.channels;
        for frame in rest[..whole].chunks_exact(self.channels) {
            let sample = self.fold(frame);
            self.enqueue(sample);
        }
        self.partial.extend_from_slice(&rest[whole..]);

        let dropped = self.stats.dropped - dropped_before;
        if dropped > 0 {
            if !self.overflowing {
                log::warn!(
                    "Sample intake overflow: dropped {} oldest samples (capacity {})",
                    dropped,
                    self.capacity
                );
            } else {
                log::trace!("Sample intake still overflowing: dropped {}", dropped);
            }
            self.overflowing = true;
        } else {
            self.overflowing = false;
        }
    }

    /// Moves the oldest `frame.len()` samples into `frame`, if that many are queued.
    pub fn next_frame(&mut self, frame: &mut [f32]) -> bool {
        let len = frame.len();
        if self.queue.len() < len {
            return false;
        }
        for (slot, sample) in frame.iter_mut().zip(self.queue.drain(..len)) {
            *slot = sample;
        }
        true
    }

    /// Forgets buffered input without touching the counters.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.partial.clear();
        self.overflowing = false;
    }

    /// Clears and frees the queue storage.
    pub fn release(&mut self) {
        self.queue = VecDeque::new();
        self.partial = Vec::new();
        self.overflowing = false;
    }

    fn fold(&mut self, frame: &[f32]) -> f32 {
        match self.policy {
            ChannelPolicy::Downmix => {
                let sum: f32 = frame.iter().map(|&s| self.sanitize(s)).sum();
                sum / frame.len() as f32
            }
            ChannelPolicy::Select(channel) => {
                let sample = frame.get(channel).copied().unwrap_or(0.0);
                self.sanitize(sample)
            }
        }
    }

    fn sanitize(&mut self, sample: f32) -> f32 {
        if sample.is_finite() {
            sample
        } else {
            self.stats.repaired += 1;
            0.0
        }
    }

    fn enqueue(&mut self, sample: f32) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.stats.dropped += 1;
        }
        self.queue.push_back(sample);
        self.stats.accepted += 1;
    }
}
