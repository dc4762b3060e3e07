// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Coefficient buffering for decompression. A single-scan image is decoded
//! and transformed one iMCU row at a time as output is requested; any other
//! image is decoded into full-image arrays as input arrives, and output reads
//! from those.

use super::ScanCursors;
use crate::{
    DCTSIZE2,
    api::{DataSource, EntropyDecoder, InputStatus, InverseDct},
    coefficients::{Block, CoefArrays, CoefficientStore},
    component::{FrameGeometry, ScanLayout},
    error::{Error, Result},
    image::{Image, Sample},
    util::tracing_wrappers::*,
};

/// Blocks of the MCU at `mcu_col` and MCU row `yoffset` of the current iMCU
/// row, in the order the entropy decoder fills them, as (component, block
/// row within the iMCU row, block column).
fn mcu_blocks(
    layout: &ScanLayout,
    mcu_col: usize,
    yoffset: usize,
) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    layout.components.iter().flat_map(move |sc| {
        (0..sc.mcu_height).flat_map(move |y| {
            (0..sc.mcu_width).map(move |x| (sc.component_index, yoffset + y, mcu_col * sc.mcu_width + x))
        })
    })
}

pub struct CoefController {
    whole_image: Option<(CoefficientStore, CoefArrays)>,
    layout: Option<ScanLayout>,
    mcu_ctr: usize,
    mcu_vert_offset: usize,
    mcu_rows_per_imcu_row: usize,
    mcu_buffer: Vec<Block>,
}

impl CoefController {
    /// Decodes straight to samples; input is consumed only by output.
    pub fn single_pass() -> Self {
        Self {
            whole_image: None,
            layout: None,
            mcu_ctr: 0,
            mcu_vert_offset: 0,
            mcu_rows_per_imcu_row: 0,
            mcu_buffer: vec![],
        }
    }

    pub fn full_image(geometry: &FrameGeometry) -> Result<Self> {
        let mut store = CoefficientStore::new();
        let arrays = CoefArrays::request(&mut store, geometry);
        store.realize()?;
        Ok(Self {
            whole_image: Some((store, arrays)),
            ..Self::single_pass()
        })
    }

    pub fn has_whole_image(&self) -> bool {
        self.whole_image.is_some()
    }

    pub fn whole_image(&self) -> Option<(&CoefficientStore, &CoefArrays)> {
        self.whole_image.as_ref().map(|(store, arrays)| (store, arrays))
    }

    pub fn into_whole_image(self) -> Option<(CoefficientStore, CoefArrays)> {
        self.whole_image
    }

    pub fn start_input_pass(&mut self, layout: ScanLayout, geometry: &FrameGeometry, cursors: &mut ScanCursors) {
        cursors.input_imcu_row = 0;
        self.mcu_buffer = vec![[0; DCTSIZE2]; layout.blocks_in_mcu];
        self.layout = Some(layout);
        self.start_imcu_row(geometry, 0);
    }

    fn start_imcu_row(&mut self, geometry: &FrameGeometry, imcu_row: usize) {
        self.mcu_rows_per_imcu_row = self
            .layout
            .as_ref()
            .map_or(1, |layout| layout.mcu_rows_per_imcu_row(geometry, imcu_row));
        self.mcu_ctr = 0;
        self.mcu_vert_offset = 0;
    }

    pub fn start_output_pass(&mut self, cursors: &mut ScanCursors) {
        cursors.output_imcu_row = 0;
    }

    fn finish_input_row(&mut self, geometry: &FrameGeometry, cursors: &mut ScanCursors) -> InputStatus {
        cursors.input_imcu_row += 1;
        if cursors.input_imcu_row < geometry.total_imcu_rows {
            self.start_imcu_row(geometry, cursors.input_imcu_row);
            InputStatus::RowCompleted
        } else {
            InputStatus::ScanCompleted
        }
    }

    /// Decodes one iMCU row of the current scan into the full-image arrays.
    /// Without arrays, there is nothing to absorb ahead of output and the
    /// call reports suspension.
    pub fn consume_data(
        &mut self,
        geometry: &FrameGeometry,
        source: &mut dyn DataSource,
        entropy: &mut dyn EntropyDecoder,
        cursors: &mut ScanCursors,
    ) -> Result<InputStatus> {
        let Some((store, arrays)) = self.whole_image.as_mut() else {
            return Ok(InputStatus::Suspended);
        };
        let layout = self.layout.as_ref().ok_or(Error::BadBufferMode)?;
        let imcu_row = cursors.input_imcu_row;
        for yoffset in self.mcu_vert_offset..self.mcu_rows_per_imcu_row {
            for mcu_col in self.mcu_ctr..layout.mcus_per_row {
                // The decoder refines what earlier scans left in the blocks,
                // and sees a copy so that a suspended MCU leaves no trace.
                for (blkn, (ci, row, col)) in mcu_blocks(layout, mcu_col, yoffset).enumerate() {
                    let v = geometry.components[ci].v_samp_factor;
                    let window = store.access(arrays.component(ci), imcu_row * v, v)?;
                    self.mcu_buffer[blkn] = window.row(row)[col];
                }
                if !entropy.decode_mcu(source, &mut self.mcu_buffer)? {
                    trace!(imcu_row, mcu_col, yoffset, "input suspended");
                    self.mcu_vert_offset = yoffset;
                    self.mcu_ctr = mcu_col;
                    return Ok(InputStatus::Suspended);
                }
                for (blkn, (ci, row, col)) in mcu_blocks(layout, mcu_col, yoffset).enumerate() {
                    let v = geometry.components[ci].v_samp_factor;
                    let mut window = store.access_mut(arrays.component(ci), imcu_row * v, v)?;
                    window.row_mut(row)[col] = self.mcu_buffer[blkn];
                }
            }
            self.mcu_ctr = 0;
        }
        Ok(self.finish_input_row(geometry, cursors))
    }

    /// Decodes and transforms one iMCU row of a single-scan image into
    /// `output`. Input and output advance together.
    pub fn decompress_onepass<S: Sample>(
        &mut self,
        geometry: &FrameGeometry,
        source: &mut dyn DataSource,
        entropy: &mut dyn EntropyDecoder,
        idct: &mut dyn InverseDct<S>,
        output: &mut [Image<S>],
        cursors: &mut ScanCursors,
    ) -> Result<InputStatus> {
        let layout = self.layout.as_ref().ok_or(Error::BadBufferMode)?;
        let last_mcu_col = layout.mcus_per_row - 1;
        let last_imcu_row = geometry.total_imcu_rows - 1;
        for yoffset in self.mcu_vert_offset..self.mcu_rows_per_imcu_row {
            for mcu_col in self.mcu_ctr..layout.mcus_per_row {
                self.mcu_buffer.fill([0; DCTSIZE2]);
                if !entropy.decode_mcu(source, &mut self.mcu_buffer)? {
                    trace!(imcu_row = cursors.input_imcu_row, mcu_col, yoffset, "input suspended");
                    self.mcu_vert_offset = yoffset;
                    self.mcu_ctr = mcu_col;
                    return Ok(InputStatus::Suspended);
                }
                let mut blkn = 0;
                for sc in layout.components.iter() {
                    let comp = &geometry.components[sc.component_index];
                    if !comp.component_needed {
                        blkn += sc.mcu_blocks;
                        continue;
                    }
                    let useful_width = if mcu_col < last_mcu_col {
                        sc.mcu_width
                    } else {
                        sc.last_col_width
                    };
                    let start_col = mcu_col * sc.mcu_sample_width;
                    for yindex in 0..sc.mcu_height {
                        if cursors.input_imcu_row < last_imcu_row || yoffset + yindex < sc.last_row_height {
                            let y = (yoffset + yindex) * comp.dct_v_scaled_size;
                            for xindex in 0..useful_width {
                                idct.inverse_dct(
                                    comp,
                                    &self.mcu_buffer[blkn + xindex],
                                    &mut output[sc.component_index],
                                    start_col + xindex * comp.dct_h_scaled_size,
                                    y,
                                );
                            }
                        }
                        blkn += sc.mcu_width;
                    }
                }
            }
            self.mcu_ctr = 0;
        }
        cursors.output_imcu_row += 1;
        Ok(self.finish_input_row(geometry, cursors))
    }

    /// Transforms iMCU row `cursors.output_imcu_row` from the full-image
    /// arrays into `output`. The caller makes sure input is far enough
    /// ahead.
    pub fn decompress_from_arrays<S: Sample>(
        &mut self,
        geometry: &FrameGeometry,
        idct: &mut dyn InverseDct<S>,
        output: &mut [Image<S>],
        cursors: &mut ScanCursors,
    ) -> Result<InputStatus> {
        let (store, arrays) = self.whole_image.as_ref().ok_or(Error::BadBufferMode)?;
        let imcu_row = cursors.output_imcu_row;
        for comp in geometry.components.iter().filter(|c| c.component_needed) {
            let v = comp.v_samp_factor;
            let window = store.access(arrays.component(comp.index), imcu_row * v, v)?;
            for block_row in 0..geometry.block_rows_in_imcu_row(comp.index, imcu_row) {
                let blocks = &window.row(block_row)[..comp.width_in_blocks];
                for (block_num, block) in blocks.iter().enumerate() {
                    idct.inverse_dct(
                        comp,
                        block,
                        &mut output[comp.index],
                        block_num * comp.dct_h_scaled_size,
                        block_row * comp.dct_v_scaled_size,
                    );
                }
            }
        }
        cursors.output_imcu_row += 1;
        if cursors.output_imcu_row < geometry.total_imcu_rows {
            Ok(InputStatus::RowCompleted)
        } else {
            Ok(InputStatus::ScanCompleted)
        }
    }
}
