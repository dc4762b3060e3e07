// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Call-sequence states of compression and decompression objects.
//!
//! Every public entry point names the states it may be called from. A call
//! from any other state is a usage error; the object is left untouched and
//! the caller is expected to abort.

use std::fmt::Debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressState {
    /// Parameters may be set, nothing written yet.
    Start,
    /// First pass in progress, accepting scanlines.
    Scanning,
    /// First pass in progress, accepting raw downsampled data.
    RawOk,
    /// Output side of a transcoding operation.
    WritingCoefficients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecompressState {
    Start,
    ReadingHeader,
    HeaderReady,
    /// Absorbing a multi-scan file before output starts.
    Preload,
    /// Reserved for dummy output passes; entered only from buffered-image
    /// output setup.
    Prescan,
    Scanning,
    RawOk,
    /// Buffered-image mode, between output passes.
    BufferedImage,
    /// Buffered-image mode, looking for the end of an output pass's scan.
    BufferedPost,
    ReadingCoefficients,
    Stopping,
}

/// State of either kind of codec object, as reported in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecState {
    Compress(CompressState),
    Decompress(DecompressState),
}

impl From<CompressState> for CodecState {
    fn from(value: CompressState) -> Self {
        CodecState::Compress(value)
    }
}

impl From<DecompressState> for CodecState {
    fn from(value: DecompressState) -> Self {
        CodecState::Decompress(value)
    }
}

pub trait StateMachine: Copy + Eq + Debug + Into<CodecState> {
    const INITIAL: Self;

    /// Whether `self -> to` is a legal forward transition. Returning to the
    /// initial state is done through [`StateTracker::reset`] and is always
    /// allowed.
    fn can_transition(self, to: Self) -> bool;
}

impl StateMachine for CompressState {
    const INITIAL: Self = CompressState::Start;

    fn can_transition(self, to: Self) -> bool {
        use CompressState::*;
        match self {
            Start => matches!(to, Scanning | RawOk | WritingCoefficients),
            Scanning | RawOk | WritingCoefficients => false,
        }
    }
}

impl StateMachine for DecompressState {
    const INITIAL: Self = DecompressState::Start;

    fn can_transition(self, to: Self) -> bool {
        use DecompressState::*;
        match self {
            Start => to == ReadingHeader,
            ReadingHeader => to == HeaderReady,
            HeaderReady => matches!(
                to,
                Preload | Prescan | Scanning | RawOk | BufferedImage | ReadingCoefficients
            ),
            Preload => matches!(to, Prescan | Scanning | RawOk),
            Prescan => matches!(to, Scanning | RawOk),
            Scanning | RawOk => matches!(to, Stopping | BufferedPost),
            BufferedImage => matches!(to, Prescan | Scanning | RawOk | Stopping),
            BufferedPost => to == BufferedImage,
            ReadingCoefficients => to == Stopping,
            Stopping => false,
        }
    }
}

/// Holds the current state of one codec object.
#[derive(Debug)]
pub struct StateTracker<T: StateMachine> {
    current: T,
}

impl<T: StateMachine> Default for StateTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StateMachine> StateTracker<T> {
    pub fn new() -> Self {
        Self {
            current: T::INITIAL,
        }
    }

    pub fn get(&self) -> T {
        self.current
    }

    pub fn is(&self, state: T) -> bool {
        self.current == state
    }

    /// Fails with [`Error::BadState`] unless the current state is one of `legal`.
    pub fn require(&self, legal: &[T]) -> Result<T> {
        if legal.contains(&self.current) {
            Ok(self.current)
        } else {
            Err(Error::BadState(self.current.into()))
        }
    }

    pub fn transition(&mut self, to: T) -> Result<()> {
        if self.current == to {
            return Ok(());
        }
        if !self.current.can_transition(to) {
            return Err(Error::BadState(self.current.into()));
        }
        self.current = to;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current = T::INITIAL;
    }
}
