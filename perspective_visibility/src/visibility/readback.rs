/// Result buffer readback
///
/// Two strategies share one state machine:
///
/// - Synchronous: `Idle -> Copying -> Processed -> Idle`, one blocking copy
///   per frame.
/// - Asynchronous: a request is kept in flight at all times. A frame whose
///   poll did not succeed is skipped without touching the buffer.
///
/// With eager retrieval the request issued at the end of a frame is polled
/// once right away to push the copy along. Whatever that poll returns is
/// dropped: it was taken before any draw of the next frame. A request that
/// completes on that poll is replaced by a fresh one.

use std::sync::Arc;
use crate::config::ReadbackStrategy;
use crate::device::{ReadbackStatus, ResultBuffer};
use crate::error::{Error, Result};
use crate::{engine_trace, engine_warn};

const SOURCE: &str = "perspective::Readback";

/// Readback pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackState {
    /// Nothing in flight
    Idle,
    /// Blocking copy in progress
    Copying,
    /// An asynchronous request is in flight
    Requested,
    /// A complete copy is in the CPU array, waiting to be resolved
    Processed,
}

pub struct ReadbackPipeline {
    strategy: ReadbackStrategy,
    state: ReadbackState,
    eager: bool,
    consecutive_misses: u32,
    stall_warning: u32,
    stall_reported: bool,
}

impl ReadbackPipeline {
    pub fn new(strategy: ReadbackStrategy, eager: bool, stall_warning: u32) -> Self {
        Self {
            strategy,
            state: ReadbackState::Idle,
            eager,
            consecutive_misses: 0,
            stall_warning,
            stall_reported: false,
        }
    }

    pub fn strategy(&self) -> ReadbackStrategy {
        self.strategy
    }

    pub fn state(&self) -> ReadbackState {
        self.state
    }

    /// Asynchronous polls in a row that did not succeed
    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Issue the first asynchronous request for a freshly allocated buffer
    pub fn prime(&mut self, buffer: &Arc<dyn ResultBuffer>) -> Result<()> {
        self.consecutive_misses = 0;
        self.stall_reported = false;
        match self.strategy {
            ReadbackStrategy::Synchronous => self.state = ReadbackState::Idle,
            ReadbackStrategy::Asynchronous => {
                buffer.request_readback()?;
                self.state = ReadbackState::Requested;
            }
        }
        Ok(())
    }

    /// Bring this frame's data into `cells`. Returns true when `cells` holds a
    /// complete copy ready to be resolved.
    pub fn fetch(&mut self, buffer: &Arc<dyn ResultBuffer>, cells: &mut [i32]) -> Result<bool> {
        match self.strategy {
            ReadbackStrategy::Synchronous => {
                self.state = ReadbackState::Copying;
                buffer.read(bytemuck::cast_slice_mut(cells))?;
                self.state = ReadbackState::Processed;
                Ok(true)
            }
            ReadbackStrategy::Asynchronous => self.fetch_async(buffer, cells),
        }
    }

    fn fetch_async(&mut self, buffer: &Arc<dyn ResultBuffer>, cells: &mut [i32]) -> Result<bool> {
        if self.state != ReadbackState::Requested {
            buffer.request_readback()?;
            self.state = ReadbackState::Requested;
            return Ok(false);
        }

        match buffer.poll_readback(bytemuck::cast_slice_mut(cells)) {
            ReadbackStatus::Succeeded => {
                self.hit();
                Ok(true)
            }
            status => {
                self.miss(status);
                Ok(false)
            }
        }
    }

    /// Close the cycle after resolution. Must run after the buffer was reset
    /// and any commit applied: issues the next asynchronous request on
    /// `buffer`, which may differ from the one fetched from if a resize
    /// happened in between.
    pub fn finish(&mut self, buffer: &Arc<dyn ResultBuffer>) -> Result<()> {
        match self.strategy {
            ReadbackStrategy::Synchronous => self.state = ReadbackState::Idle,
            ReadbackStrategy::Asynchronous => {
                buffer.request_readback()?;
                self.state = ReadbackState::Requested;
                if self.eager {
                    self.retrieve_eagerly(buffer)?;
                }
            }
        }
        Ok(())
    }

    /// Poll the fresh request once and drop the copy. A completed request
    /// holds the reset buffer only, so a new one takes its place.
    fn retrieve_eagerly(&mut self, buffer: &Arc<dyn ResultBuffer>) -> Result<()> {
        let mut scratch = vec![0i32; buffer.len() as usize];
        if buffer.poll_readback(bytemuck::cast_slice_mut(scratch.as_mut_slice()))
            == ReadbackStatus::Succeeded
        {
            engine_trace!(SOURCE, "Eager retrieval completed early, copy dropped");
            buffer.request_readback()?;
        }
        Ok(())
    }

    /// Forget everything in flight
    pub fn abandon(&mut self) {
        self.state = ReadbackState::Idle;
        self.consecutive_misses = 0;
        self.stall_reported = false;
    }

    fn hit(&mut self) {
        self.state = ReadbackState::Processed;
        self.consecutive_misses = 0;
        self.stall_reported = false;
    }

    fn miss(&mut self, status: ReadbackStatus) {
        self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        match status {
            ReadbackStatus::Failed => engine_trace!(SOURCE, "{}, frame skipped", Error::ReadbackFailed),
            _ => engine_trace!(SOURCE, "Readback pending, frame skipped"),
        }
        if self.consecutive_misses >= self.stall_warning && !self.stall_reported {
            self.stall_reported = true;
            engine_warn!(
                SOURCE,
                "No readback completed for {} consecutive frames, visibility is stale",
                self.consecutive_misses
            );
        }
    }
}

#[cfg(test)]
#[path = "readback_tests.rs"]
mod tests;
