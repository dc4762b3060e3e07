// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Supplies compressed bytes to a decompressor.
pub trait DataSource {
    fn init_source(&mut self) {}

    /// Bytes available right now, not yet consumed.
    fn bytes(&self) -> &[u8];

    /// Marks the first `count` bytes of [`DataSource::bytes`] as consumed.
    fn consume(&mut self, count: usize);

    /// Tries to make more bytes available. Returns false if none can be
    /// obtained at the moment, which makes the caller suspend.
    fn fill_buffer(&mut self) -> bool;

    fn term_source(&mut self) {}
}

/// A byte slice advances as it is consumed; it can never be refilled, so
/// running past its end suspends.
impl DataSource for &[u8] {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn consume(&mut self, count: usize) {
        *self = &self[count.min(self.len())..];
    }

    fn fill_buffer(&mut self) -> bool {
        false
    }
}

/// Receives compressed bytes from a compressor.
pub trait DataDestination {
    fn init_destination(&mut self) {}

    /// Appends `data`. Returns false, having written nothing, if the bytes
    /// cannot be accepted now.
    fn emit(&mut self, data: &[u8]) -> bool;

    fn term_destination(&mut self) {}
}

impl DataDestination for Vec<u8> {
    fn emit(&mut self, data: &[u8]) -> bool {
        self.extend_from_slice(data);
        true
    }
}
