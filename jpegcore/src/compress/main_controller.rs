// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    api::Preprocessor,
    component::FrameGeometry,
    error::Result,
    image::{Image, Sample},
    render::RowCursor,
};

/// Collects preprocessed row groups into one iMCU row of component planes
/// and hands each complete iMCU row to the coefficient stage.
pub struct MainController<S: Sample> {
    buffer: Vec<Image<S>>,
    rowgroup_ctr: usize,
    rowgroups_per_imcu_row: usize,
    cur_imcu_row: usize,
    total_imcu_rows: usize,
    /// The coefficient stage suspended and the caller was told one row
    /// fewer than was consumed.
    suspended: bool,
}

impl<S: Sample> MainController<S> {
    pub fn new(geometry: &FrameGeometry) -> Result<Self> {
        let buffer = geometry
            .components
            .iter()
            .map(|c| Image::new((c.padded_width(), c.imcu_sample_height())))
            .collect::<Result<_>>()?;
        Ok(Self {
            buffer,
            rowgroup_ctr: 0,
            rowgroups_per_imcu_row: geometry.min_dct_v_scaled_size,
            cur_imcu_row: 0,
            total_imcu_rows: geometry.total_imcu_rows,
            suspended: false,
        })
    }

    pub fn start_pass(&mut self) {
        self.cur_imcu_row = 0;
        self.rowgroup_ctr = 0;
        self.suspended = false;
    }

    /// Consumes rows of `input` from `*in_row_ctr` on, advancing it.
    ///
    /// When `compress` suspends on a full iMCU row, `*in_row_ctr` is backed
    /// up by one row so that the caller passes that row again; the retry
    /// finds the iMCU row already complete, compresses it, and counts the row
    /// as consumed after all.
    pub fn process_data(
        &mut self,
        input: &[&[S]],
        in_row_ctr: &mut usize,
        preprocessor: &mut dyn Preprocessor<S>,
        mut compress: impl FnMut(&[Image<S>]) -> Result<bool>,
    ) -> Result<()> {
        while self.cur_imcu_row < self.total_imcu_rows {
            if self.rowgroup_ctr < self.rowgroups_per_imcu_row {
                let mut in_rows = RowCursor {
                    position: *in_row_ctr,
                    limit: input.len(),
                };
                let mut groups = RowCursor {
                    position: self.rowgroup_ctr,
                    limit: self.rowgroups_per_imcu_row,
                };
                preprocessor.pre_process(input, &mut in_rows, &mut self.buffer, &mut groups)?;
                *in_row_ctr = in_rows.position;
                self.rowgroup_ctr = groups.position;
            }
            if self.rowgroup_ctr != self.rowgroups_per_imcu_row {
                return Ok(());
            }
            if !compress(&self.buffer)? {
                if !self.suspended {
                    *in_row_ctr = in_row_ctr.saturating_sub(1);
                    self.suspended = true;
                }
                return Ok(());
            }
            if self.suspended {
                *in_row_ctr += 1;
                self.suspended = false;
            }
            self.rowgroup_ctr = 0;
            self.cur_imcu_row += 1;
        }
        Ok(())
    }

    /// The iMCU row buffer, for callers supplying downsampled data directly.
    pub fn buffer_mut(&mut self) -> &mut [Image<S>] {
        &mut self.buffer
    }

    pub fn buffer(&self) -> &[Image<S>] {
        &self.buffer
    }
}
