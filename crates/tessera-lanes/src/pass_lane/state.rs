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

//! The pass/subpass finite-state machine.
//!
//! ```text
//! Idle --begin_pass(i)--> PassActive --begin_subpass(j)--> SubpassActive
//!  ^                        |    ^                               |
//!  +-------end_pass---------+    +---------end_subpass-----------+
//! ```
//!
//! Every transition is validated; a rejected call leaves the state untouched.

use crate::error::PassStateError;

/// The current position of the orchestrator within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No pass is active.
    Idle,
    /// A pass is active and no subpass is open.
    PassActive {
        /// The active pass.
        pass: u32,
        /// The next subpass to begin; also the number recorded so far.
        next_subpass: u32,
    },
    /// A subpass of the active pass is open.
    SubpassActive {
        /// The active pass.
        pass: u32,
        /// The open subpass.
        subpass: u32,
    },
}

/// Validates the order of pass and subpass calls against a built structure.
#[derive(Debug, Clone)]
pub struct PassStateMachine {
    subpass_counts: Option<Vec<u32>>,
    state: PassState,
    next_pass: u32,
}

impl Default for PassStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PassStateMachine {
    /// A machine with no structure: every transition fails with
    /// [`PassStateError::NotBuilt`].
    pub fn new() -> Self {
        Self {
            subpass_counts: None,
            state: PassState::Idle,
            next_pass: 0,
        }
    }

    /// Installs the subpass count of each pass.
    ///
    /// # Errors
    ///
    /// [`PassStateError::RebuildDuringPass`] unless the machine is idle.
    pub fn rebuild(&mut self, subpass_counts: Vec<u32>) -> Result<(), PassStateError> {
        self.ensure_idle()?;
        self.subpass_counts = Some(subpass_counts);
        self.next_pass = 0;
        Ok(())
    }

    /// Drops the structure, e.g. when the render target shrinks to nothing.
    pub fn tear_down(&mut self) -> Result<(), PassStateError> {
        self.ensure_idle()?;
        self.subpass_counts = None;
        self.next_pass = 0;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), PassStateError> {
        match self.state {
            PassState::Idle => Ok(()),
            _ => Err(PassStateError::RebuildDuringPass),
        }
    }

    fn counts(&self) -> Result<&[u32], PassStateError> {
        self.subpass_counts
            .as_deref()
            .ok_or(PassStateError::NotBuilt)
    }

    /// Returns `true` once a structure is installed.
    pub fn is_built(&self) -> bool {
        self.subpass_counts.is_some()
    }

    /// The current state.
    pub fn state(&self) -> PassState {
        self.state
    }

    /// The number of declared passes, or 0 when not built.
    pub fn pass_count(&self) -> u32 {
        self.subpass_counts.as_ref().map_or(0, |c| c.len() as u32)
    }

    /// Starts a new frame at pass 0.
    ///
    /// A frame abandoned mid-pass is discarded with a warning.
    pub fn begin_frame(&mut self) -> Result<(), PassStateError> {
        self.counts()?;
        if self.state != PassState::Idle {
            log::warn!("Discarding an unfinished frame in state {:?}", self.state);
        }
        self.state = PassState::Idle;
        self.next_pass = 0;
        Ok(())
    }

    /// Abandons the current frame, closing whatever is open.
    pub fn abort_frame(&mut self) {
        self.state = PassState::Idle;
        self.next_pass = 0;
    }

    /// Begins pass `pass`, which must be the next pass of the frame.
    pub fn begin_pass(&mut self, pass: u32) -> Result<(), PassStateError> {
        self.counts()?;
        match self.state {
            PassState::Idle => {}
            PassState::PassActive { pass: active, .. }
            | PassState::SubpassActive { pass: active, .. } => {
                return Err(PassStateError::PassAlreadyActive { active });
            }
        }
        if pass != self.next_pass || pass >= self.pass_count() {
            return Err(PassStateError::PassOutOfSequence {
                expected: self.next_pass,
                found: pass,
            });
        }
        self.state = PassState::PassActive {
            pass,
            next_subpass: 0,
        };
        Ok(())
    }

    /// Opens subpass `subpass` of the active pass.
    pub fn begin_subpass(&mut self, subpass: u32) -> Result<(), PassStateError> {
        let counts = self.counts()?;
        match self.state {
            PassState::Idle => Err(PassStateError::NoActivePass),
            PassState::SubpassActive { pass, subpass: open } => {
                Err(PassStateError::SubpassAlreadyOpen { pass, open })
            }
            PassState::PassActive { pass, next_subpass } => {
                let declared = counts[pass as usize];
                if subpass >= declared {
                    return Err(PassStateError::SubpassOutOfRange {
                        pass,
                        index: subpass,
                        declared,
                    });
                }
                if subpass != next_subpass {
                    return Err(PassStateError::SubpassOutOfSequence {
                        pass,
                        expected: next_subpass,
                        found: subpass,
                    });
                }
                self.state = PassState::SubpassActive { pass, subpass };
                Ok(())
            }
        }
    }

    /// Closes the open subpass.
    pub fn end_subpass(&mut self) -> Result<(), PassStateError> {
        self.counts()?;
        match self.state {
            PassState::Idle => Err(PassStateError::NoActivePass),
            PassState::PassActive { .. } => Err(PassStateError::NoOpenSubpass),
            PassState::SubpassActive { pass, subpass } => {
                self.state = PassState::PassActive {
                    pass,
                    next_subpass: subpass + 1,
                };
                Ok(())
            }
        }
    }

    /// Ends the active pass once all of its subpasses were recorded.
    pub fn end_pass(&mut self) -> Result<(), PassStateError> {
        let counts = self.counts()?;
        match self.state {
            PassState::Idle => Err(PassStateError::NoActivePass),
            PassState::SubpassActive { pass, subpass } => {
                Err(PassStateError::SubpassStillOpen { pass, open: subpass })
            }
            PassState::PassActive { pass, next_subpass } => {
                let declared = counts[pass as usize];
                if next_subpass < declared {
                    return Err(PassStateError::IncompletePass {
                        pass,
                        recorded: next_subpass,
                        declared,
                    });
                }
                self.state = PassState::Idle;
                self.next_pass = pass + 1;
                Ok(())
            }
        }
    }

    /// Checks that the frame recorded every pass and left nothing open.
    pub fn finish_frame(&mut self) -> Result<(), PassStateError> {
        let declared = self.counts()?.len() as u32;
        let recorded = match self.state {
            PassState::Idle => self.next_pass,
            PassState::PassActive { pass, .. } | PassState::SubpassActive { pass, .. } => pass,
        };
        if self.state != PassState::Idle || recorded < declared {
            return Err(PassStateError::IncompleteFrame { recorded, declared });
        }
        self.next_pass = 0;
        Ok(())
    }
}
