// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod io;
mod modules;

pub use io::*;
pub use modules::*;

/// Return value of an operation that may have to wait for its data source or
/// destination. `Suspended` is not an error: the caller supplies more input
/// (or drains the output) and repeats the identical call, which resumes
/// where the previous one stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult<T> {
    Complete { result: T },
    Suspended,
}

impl<T> ProcessingResult<T> {
    pub fn is_suspended(&self) -> bool {
        matches!(self, ProcessingResult::Suspended)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProcessingResult<U> {
        match self {
            ProcessingResult::Complete { result } => ProcessingResult::Complete { result: f(result) },
            ProcessingResult::Suspended => ProcessingResult::Suspended,
        }
    }

    pub fn complete(self) -> Option<T> {
        match self {
            ProcessingResult::Complete { result } => Some(result),
            ProcessingResult::Suspended => None,
        }
    }
}

/// Outcome of one step of input consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    Suspended,
    /// A start-of-scan marker was read.
    ReachedSos,
    /// The end-of-image marker was read.
    ReachedEoi,
    /// One iMCU row of the current scan was absorbed.
    RowCompleted,
    /// The last iMCU row of the current scan was absorbed.
    ScanCompleted,
}

impl From<MarkerStatus> for InputStatus {
    fn from(value: MarkerStatus) -> Self {
        match value {
            MarkerStatus::Suspended => InputStatus::Suspended,
            MarkerStatus::ReachedSos => InputStatus::ReachedSos,
            MarkerStatus::ReachedEoi => InputStatus::ReachedEoi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// Frame parameters are available and decompression may start.
    HeaderOk,
    /// The datastream held only tables; the object has been reset.
    TablesOnly,
}

/// Counters reported to a [`ProgressMonitor`]. `pass_counter` counts work
/// units done in the current pass out of an estimated `pass_limit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub pass_counter: u64,
    pub pass_limit: u64,
    pub completed_passes: usize,
    pub total_passes: usize,
}

pub trait ProgressMonitor {
    fn progress(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressMonitor for F {
    fn progress(&mut self, progress: &Progress) {
        self(progress)
    }
}
