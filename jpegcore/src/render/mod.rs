// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Decompression-side output stages: chroma upsampling followed by color
//! conversion into interleaved pixel rows.

use crate::{
    error::Result,
    image::{Image, Sample},
};

mod color;
mod merged;
mod upsample;


pub use color::*;
pub use merged::MergedUpsampler;
pub use upsample::{SeparateUpsampler, UpsampleMethod};

/// A position within a run of rows (or row groups) and the end of the run.
/// Stages advance `position` by what they consumed or produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCursor {
    pub position: usize,
    pub limit: usize,
}

impl RowCursor {
    pub fn new(limit: usize) -> Self {
        Self { position: 0, limit }
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    pub fn is_full(&self) -> bool {
        self.position >= self.limit
    }
}

/// One component's share of a row group, as seen by color conversion. Only
/// valid until the upsampler is called again.
#[derive(Debug, Clone, Copy)]
pub enum RowGroup<'a, S: Sample> {
    /// The conversion does not use this component.
    Absent,
    /// Full-resolution rows aliased from the decoder's sample buffer,
    /// starting at `first_row`.
    Borrowed { image: &'a Image<S>, first_row: usize },
    /// Rows produced by an upsampling method.
    Resampled(&'a Image<S>),
}

impl<'a, S: Sample> RowGroup<'a, S> {
    /// Row `row` of this row group.
    ///
    /// Panics for [`RowGroup::Absent`]: converters must only read the
    /// components they declared as needed.
    pub fn row(&self, row: usize) -> &'a [S] {
        match *self {
            RowGroup::Absent => panic!("read of a component not needed by color conversion"),
            RowGroup::Borrowed { image, first_row } => image.row(first_row + row),
            RowGroup::Resampled(image) => image.row(row),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RowGroup::Absent)
    }
}

/// Converts row groups of full-resolution components into interleaved
/// output pixels.
pub trait ColorDeconverter<S: Sample> {
    /// Samples per output pixel.
    fn out_color_components(&self) -> usize;

    /// Whether `component` is read by [`ColorDeconverter::color_convert`].
    fn component_needed(&self, _component: usize) -> bool {
        true
    }

    fn start_pass(&mut self) {}

    /// Converts rows `input_row..input_row + output.len()` of each row group
    /// into the rows of `output`, `output_width` pixels each.
    fn color_convert(
        &mut self,
        input: &[RowGroup<'_, S>],
        input_row: usize,
        output: &mut [&mut [S]],
        output_width: usize,
    ) -> Result<()>;
}

/// Produces output pixel rows from iMCU rows of component samples.
pub trait Upsampler<S: Sample> {
    fn start_pass(&mut self);

    /// Consumes row groups of `input` (one plane per component) starting at
    /// `in_row_groups.position` and writes pixel rows into `output` starting
    /// at `out_rows.position`. May consume no input (serving buffered rows)
    /// or produce fewer rows than requested; both cursors are advanced by
    /// what was actually done.
    fn upsample(
        &mut self,
        input: &[Image<S>],
        in_row_groups: &mut RowCursor,
        output: &mut [&mut [S]],
        out_rows: &mut RowCursor,
    ) -> Result<()>;
}
