// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frames-in-flight pacing.
//!
//! Every per-frame resource (batch buffers, camera uniform slot) exists once per
//! frame slot. Before the host writes into a slot again, [`FramePacer::acquire`]
//! waits for the GPU work last submitted from it.
//!
//! ```text
//! frame 0 -> slot 0 ─┐
//! frame 1 -> slot 1  │  GPU may still be busy with slot 0
//! frame 2 -> slot 0 <┘  acquire() waits on frame 0's submission first
//! ```

use tessera_core::config::ConfigError;
use tessera_core::renderer::{GraphicsDevice, RenderError, SubmissionId};

/// Bounds the number of frames whose GPU work may be outstanding.
#[derive(Debug)]
pub struct FramePacer {
    slots: Vec<Option<SubmissionId>>,
    current: usize,
    frame_index: u64,
}

impl FramePacer {
    /// Creates a pacer with `frames_in_flight` slots (2 or 3).
    pub fn new(frames_in_flight: u32) -> Result<Self, ConfigError> {
        if !(2..=3).contains(&frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be 2 or 3, got {frames_in_flight}"
            )));
        }
        Ok(Self {
            slots: vec![None; frames_in_flight as usize],
            current: 0,
            frame_index: 0,
        })
    }

    /// Waits until the current slot's previous submission has completed and
    /// returns the slot index.
    ///
    /// # Errors
    ///
    /// Any device error raised while waiting, typically
    /// [`RenderError::DeviceLost`]. The slot keeps its fence in that case.
    pub fn acquire(&mut self, device: &dyn GraphicsDevice) -> Result<usize, RenderError> {
        if let Some(submission) = self.slots[self.current] {
            log::trace!(
                "FramePacer: waiting on {:?} before reusing slot {}",
                submission,
                self.current
            );
            device.wait_for_submission(submission)?;
            self.slots[self.current] = None;
        }
        Ok(self.current)
    }

    /// Records the submission made from the current slot.
    pub fn record(&mut self, submission: SubmissionId) {
        self.slots[self.current] = Some(submission);
    }

    /// Moves on to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        self.frame_index += 1;
    }

    /// Records `submission` for the current slot, then advances.
    pub fn retire(&mut self, submission: SubmissionId) {
        self.record(submission);
        self.advance();
    }

    /// The slot the next frame uses.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// The number of frames completed so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The number of slots.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// The submission outstanding in `slot`, if any.
    pub fn pending(&self, slot: usize) -> Option<SubmissionId> {
        self.slots.get(slot).copied().flatten()
    }

    /// Waits for every outstanding submission, e.g. before tearing resources down.
    pub fn wait_idle(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        for slot in &mut self.slots {
            if let Some(submission) = *slot {
                device.wait_for_submission(submission)?;
                *slot = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_in_flight_range() {
        assert!(FramePacer::new(1).is_err());
        assert!(FramePacer::new(4).is_err());
        assert_eq!(FramePacer::new(3).unwrap().frames_in_flight(), 3);
    }

    #[test]
    fn test_retire_records_and_cycles() {
        let mut pacer = FramePacer::new(2).unwrap();
        pacer.retire(SubmissionId(10));
        assert_eq!(pacer.current_slot(), 1);
        assert_eq!(pacer.pending(0), Some(SubmissionId(10)));
        pacer.retire(SubmissionId(11));
        assert_eq!(pacer.current_slot(), 0);
        assert_eq!(pacer.frame_index(), 2);
    }

    #[test]
    fn test_record_without_advance_keeps_slot() {
        let mut pacer = FramePacer::new(2).unwrap();
        pacer.record(SubmissionId(3));
        assert_eq!(pacer.current_slot(), 0);
        assert_eq!(pacer.frame_index(), 0);
        assert_eq!(pacer.pending(0), Some(SubmissionId(3)));
    }
}
