// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Coefficient buffering for compression: runs the forward DCT over iMCU
//! rows of component samples and hands MCUs to the entropy encoder.

use crate::{
    DCTSIZE, DCTSIZE2,
    api::{DataDestination, EntropyEncoder, ForwardDct},
    coefficients::{Block, CoefArrays, CoefficientStore},
    component::{FrameGeometry, ScanLayout},
    error::{Error, Result},
    image::{Image, Sample},
    util::tracing_wrappers::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefMode {
    /// Transform and encode each iMCU row as it arrives.
    PassThrough,
    /// Transform into the full-image buffer and encode the first scan.
    SaveAndPass,
    /// Encode from the full-image buffer; no input.
    CrankDest,
}

/// Input of one iMCU row: component planes and the transform to apply.
pub struct RowInput<'a, S: Sample> {
    pub planes: &'a [Image<S>],
    pub fdct: &'a mut dyn ForwardDct<S>,
}

pub struct CoefController {
    store: CoefficientStore,
    arrays: CoefArrays,
    full_image: bool,
    mode: CoefMode,
    layout: Option<ScanLayout>,
    imcu_row_num: usize,
    mcu_ctr: usize,
    mcu_vert_offset: usize,
    mcu_rows_per_imcu_row: usize,
    /// The current iMCU row is already in the buffer; set when encoding
    /// suspended after the transform.
    row_transformed: bool,
    mcu_buffer: Vec<Block>,
}

impl CoefController {
    /// A buffer holding one iMCU row of every component.
    pub fn single_row(geometry: &FrameGeometry) -> Result<Self> {
        let mut store = CoefficientStore::new();
        let ids = geometry
            .components
            .iter()
            .map(|comp| {
                let (width, _) = geometry.coefficient_array_size(comp.index);
                store.request(width, comp.v_samp_factor, comp.v_samp_factor)
            })
            .collect();
        store.realize()?;
        Ok(Self::with_store(store, CoefArrays::from_ids(ids), false))
    }

    pub fn full_image(geometry: &FrameGeometry) -> Result<Self> {
        let mut store = CoefficientStore::new();
        let arrays = CoefArrays::request(&mut store, geometry);
        store.realize()?;
        Ok(Self::with_store(store, arrays, true))
    }

    /// Encodes coefficients supplied by the caller, as when transcoding.
    pub fn from_arrays(
        store: CoefficientStore,
        arrays: CoefArrays,
        geometry: &FrameGeometry,
    ) -> Result<Self> {
        arrays.check_geometry(&store, geometry)?;
        Ok(Self::with_store(store, arrays, true))
    }

    fn with_store(store: CoefficientStore, arrays: CoefArrays, full_image: bool) -> Self {
        Self {
            store,
            arrays,
            full_image,
            mode: CoefMode::PassThrough,
            layout: None,
            imcu_row_num: 0,
            mcu_ctr: 0,
            mcu_vert_offset: 0,
            mcu_rows_per_imcu_row: 0,
            row_transformed: false,
            mcu_buffer: vec![],
        }
    }

    pub fn start_pass(&mut self, mode: CoefMode, layout: ScanLayout, geometry: &FrameGeometry) -> Result<()> {
        if (mode == CoefMode::PassThrough) == self.full_image {
            return Err(Error::BadBufferMode);
        }
        trace!(?mode, components = layout.components.len(), "coefficient pass");
        self.mcu_buffer = vec![[0; DCTSIZE2]; layout.blocks_in_mcu];
        self.mode = mode;
        self.layout = Some(layout);
        self.imcu_row_num = 0;
        self.row_transformed = false;
        self.start_imcu_row(geometry);
        Ok(())
    }

    fn start_imcu_row(&mut self, geometry: &FrameGeometry) {
        self.mcu_rows_per_imcu_row = self
            .layout
            .as_ref()
            .map_or(1, |layout| layout.mcu_rows_per_imcu_row(geometry, self.imcu_row_num));
        self.mcu_ctr = 0;
        self.mcu_vert_offset = 0;
    }

    pub fn imcu_row(&self) -> usize {
        self.imcu_row_num
    }

    /// Processes one iMCU row. Returns `Ok(false)` if the entropy encoder
    /// suspended; calling again with the same input resumes at the MCU that
    /// was not written.
    pub fn compress_data<S: Sample>(
        &mut self,
        geometry: &FrameGeometry,
        input: Option<RowInput<'_, S>>,
        entropy: &mut dyn EntropyEncoder,
        dest: &mut dyn DataDestination,
    ) -> Result<bool> {
        if self.mode != CoefMode::CrankDest && !self.row_transformed {
            let input = input.ok_or(Error::BadBufferMode)?;
            self.transform_imcu_row(geometry, input)?;
            self.row_transformed = true;
        }
        if !self.emit_imcu_row(geometry, entropy, dest)? {
            trace!(imcu_row = self.imcu_row_num, mcu = self.mcu_ctr, "encoder suspended");
            return Ok(false);
        }
        self.row_transformed = false;
        self.imcu_row_num += 1;
        self.start_imcu_row(geometry);
        Ok(true)
    }

    /// First block row of the current iMCU row in a component's array.
    fn block_row_base(&self, v_samp_factor: usize) -> usize {
        if self.full_image {
            self.imcu_row_num * v_samp_factor
        } else {
            0
        }
    }

    /// Runs the forward DCT over every block of the current iMCU row. Blocks
    /// beyond the image are padded: zero AC, DC copied from the nearest real
    /// block to their left, or from the block above for whole padding rows.
    fn transform_imcu_row<S: Sample>(
        &mut self,
        geometry: &FrameGeometry,
        input: RowInput<'_, S>,
    ) -> Result<()> {
        for comp in geometry.components.iter() {
            let id = self.arrays.component(comp.index);
            let base = self.block_row_base(comp.v_samp_factor);
            let block_rows = geometry.block_rows_in_imcu_row(comp.index, self.imcu_row_num);
            let h = comp.h_samp_factor;
            let mut window = self.store.access_mut(id, base, comp.v_samp_factor)?;
            let plane = &input.planes[comp.index];
            for by in 0..block_rows {
                let row = window.row_mut(by);
                let padded = row.len();
                for (bx, block) in row.iter_mut().enumerate().take(comp.width_in_blocks) {
                    input
                        .fdct
                        .forward_dct(comp, plane, bx * DCTSIZE, by * DCTSIZE, block);
                }
                let last_dc = row[comp.width_in_blocks - 1][0];
                for block in row[comp.width_in_blocks..padded].iter_mut() {
                    *block = [0; DCTSIZE2];
                    block[0] = last_dc;
                }
            }
            for by in block_rows..comp.v_samp_factor {
                let above: Vec<i16> = window
                    .row(by - 1)
                    .chunks(h)
                    .map(|group| group[group.len() - 1][0])
                    .collect();
                for (group, dc) in window.row_mut(by).chunks_mut(h).zip(above) {
                    for block in group {
                        *block = [0; DCTSIZE2];
                        block[0] = dc;
                    }
                }
            }
        }
        Ok(())
    }

    /// Encodes the MCUs of the current iMCU row from the buffer, starting at
    /// the saved MCU position. MCU positions outside the image get dummy
    /// blocks with zero AC and the DC of the preceding block.
    fn emit_imcu_row(
        &mut self,
        geometry: &FrameGeometry,
        entropy: &mut dyn EntropyEncoder,
        dest: &mut dyn DataDestination,
    ) -> Result<bool> {
        let Some(layout) = self.layout.as_ref() else {
            return Err(Error::BadBufferMode);
        };
        let last_imcu_row = self.imcu_row_num + 1 == geometry.total_imcu_rows;
        let last_mcu_col = layout.mcus_per_row - 1;
        for yoffset in self.mcu_vert_offset..self.mcu_rows_per_imcu_row {
            for mcu_col in self.mcu_ctr..layout.mcus_per_row {
                let mut blkn = 0;
                for sc in layout.components.iter() {
                    let v = geometry.components[sc.component_index].v_samp_factor;
                    let base = self.block_row_base(v);
                    let id = self.arrays.component(sc.component_index);
                    let start_col = mcu_col * sc.mcu_width;
                    let blockcnt = if mcu_col < last_mcu_col {
                        sc.mcu_width
                    } else {
                        sc.last_col_width
                    };
                    for yindex in 0..sc.mcu_height {
                        let mut xindex = 0;
                        if !last_imcu_row || yindex + yoffset < sc.last_row_height {
                            let window = self.store.access(id, base + yoffset + yindex, 1)?;
                            let row = &window.row(0)[start_col..start_col + blockcnt];
                            self.mcu_buffer[blkn..blkn + blockcnt].copy_from_slice(row);
                            blkn += blockcnt;
                            xindex = blockcnt;
                        }
                        for _ in xindex..sc.mcu_width {
                            let dc = if blkn > 0 { self.mcu_buffer[blkn - 1][0] } else { 0 };
                            self.mcu_buffer[blkn] = [0; DCTSIZE2];
                            self.mcu_buffer[blkn][0] = dc;
                            blkn += 1;
                        }
                    }
                }
                if !entropy.encode_mcu(dest, &self.mcu_buffer[..blkn])? {
                    self.mcu_vert_offset = yoffset;
                    self.mcu_ctr = mcu_col;
                    return Ok(false);
                }
            }
            self.mcu_ctr = 0;
        }
        Ok(true)
    }

    /// Gives back the coefficient buffer.
    pub fn into_arrays(self) -> (CoefficientStore, CoefArrays) {
        (self.store, self.arrays)
    }

    pub fn store(&self) -> &CoefficientStore {
        &self.store
    }

    pub fn arrays(&self) -> &CoefArrays {
        &self.arrays
    }
}
