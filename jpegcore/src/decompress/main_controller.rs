// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    component::FrameGeometry,
    error::Result,
    image::{Image, Sample},
    render::{RowCursor, Upsampler},
};

/// Holds one iMCU row of component samples between the coefficient stage
/// and the upsampler.
pub struct MainController<S: Sample> {
    buffer: Vec<Image<S>>,
    buffer_full: bool,
    row_groups: RowCursor,
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
            buffer_full: false,
            row_groups: RowCursor::new(geometry.min_dct_v_scaled_size),
        })
    }

    pub fn start_pass(&mut self) {
        self.buffer_full = false;
        self.row_groups.position = 0;
    }

    /// Delivers pixel rows into `output` from `out_rows.position` on. The
    /// buffer is refilled by `fill` once the upsampler has used it up; if
    /// `fill` suspends, nothing is delivered.
    pub fn process_data(
        &mut self,
        fill: impl FnOnce(&mut [Image<S>]) -> Result<bool>,
        upsampler: &mut dyn Upsampler<S>,
        output: &mut [&mut [S]],
        out_rows: &mut RowCursor,
    ) -> Result<()> {
        if !self.buffer_full {
            if !fill(&mut self.buffer)? {
                return Ok(());
            }
            self.buffer_full = true;
        }
        upsampler.upsample(&self.buffer, &mut self.row_groups, output, out_rows)?;
        if self.row_groups.is_full() {
            self.buffer_full = false;
            self.row_groups.position = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::{
        headers::ComponentSpec,
        render::{GrayscaleConverter, SeparateUpsampler},
    };

    #[test]
    fn refills_only_after_buffer_is_used_up() -> Result<()> {
        let geometry = FrameGeometry::new(5, 12, &[ComponentSpec::new(1, 1, 1, 0)])?;
        let mut main = MainController::<u8>::new(&geometry)?;
        let mut upsampler = SeparateUpsampler::<u8>::new(&geometry, Box::new(GrayscaleConverter))?;
        upsampler.start_pass();
        main.start_pass();

        let mut fills = 0;
        let mut delivered = vec![];
        let mut suspend_next = true;
        while delivered.len() < 12 {
            let mut row = [0u8; 5];
            let mut output = [&mut row[..]];
            let mut out_rows = RowCursor::new(1);
            main.process_data(
                |planes| {
                    if suspend_next {
                        suspend_next = false;
                        return Ok(false);
                    }
                    fills += 1;
                    for y in 0..planes[0].height() {
                        planes[0].row_mut(y).fill((fills * 100 + y) as u8);
                    }
                    Ok(true)
                },
                &mut upsampler,
                &mut output,
                &mut out_rows,
            )?;
            if out_rows.position == 1 {
                delivered.push(row[0]);
            }
        }
        assert_eq!(fills, 2);
        assert_eq!(delivered[0], 100);
        assert_eq!(delivered[7], 107);
        assert_eq!(delivered[8], 200);
        assert_eq!(delivered[11], 203);
        Ok(())
    }
}
