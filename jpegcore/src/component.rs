// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Per-component and per-scan geometry.

use crate::{
    DCTSIZE, MAX_BLOCKS_IN_MCU, MAX_COMPONENTS, MAX_COMPS_IN_SCAN, MAX_DIMENSION,
    MAX_SAMP_FACTOR,
    error::{Error, Result},
    headers::{ComponentSpec, FrameHeader},
    util::tracing_wrappers::*,
};

/// Geometry of one color component, fixed for the duration of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub index: usize,
    pub id: u8,
    pub h_samp_factor: usize,
    pub v_samp_factor: usize,
    pub quant_tbl_no: usize,
    /// Size of the block the inverse DCT produces for this component.
    pub dct_h_scaled_size: usize,
    pub dct_v_scaled_size: usize,
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
    pub downsampled_width: usize,
    pub downsampled_height: usize,
    /// Whether the output color conversion reads this component.
    pub component_needed: bool,
}

impl ComponentInfo {
    /// Rows per row group at this component's resolution.
    pub fn row_group_height(&self, min_dct_v_scaled_size: usize) -> usize {
        self.v_samp_factor * self.dct_v_scaled_size / min_dct_v_scaled_size
    }

    /// Width of the sample rows the inverse DCT fills for one iMCU row.
    pub fn padded_width(&self) -> usize {
        self.width_in_blocks * self.dct_h_scaled_size
    }

    /// Height of one iMCU row of samples for this component.
    pub fn imcu_sample_height(&self) -> usize {
        self.v_samp_factor * self.dct_v_scaled_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    pub image_width: usize,
    pub image_height: usize,
    pub output_width: usize,
    pub output_height: usize,
    pub max_h_samp_factor: usize,
    pub max_v_samp_factor: usize,
    pub min_dct_h_scaled_size: usize,
    pub min_dct_v_scaled_size: usize,
    pub total_imcu_rows: usize,
    pub components: Vec<ComponentInfo>,
}

impl FrameGeometry {
    /// Validates the frame parameters and computes the unscaled geometry:
    /// block counts, downsampled sizes and the number of iMCU rows.
    #[instrument(level = "debug", skip_all, err)]
    pub fn new(width: usize, height: usize, specs: &[ComponentSpec]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage(width, height));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Error::ImageTooBig(width, height));
        }
        if specs.is_empty() || specs.len() > MAX_COMPONENTS {
            return Err(Error::ComponentCount(specs.len()));
        }
        for spec in specs {
            if !(1..=MAX_SAMP_FACTOR).contains(&spec.h_samp_factor)
                || !(1..=MAX_SAMP_FACTOR).contains(&spec.v_samp_factor)
            {
                return Err(Error::BadSamplingFactors(
                    spec.h_samp_factor,
                    spec.v_samp_factor,
                ));
            }
        }
        let max_h = specs.iter().map(|s| s.h_samp_factor).max().unwrap_or(1);
        let max_v = specs.iter().map(|s| s.v_samp_factor).max().unwrap_or(1);
        let components = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| ComponentInfo {
                index,
                id: spec.id,
                h_samp_factor: spec.h_samp_factor,
                v_samp_factor: spec.v_samp_factor,
                quant_tbl_no: spec.quant_tbl_no,
                dct_h_scaled_size: DCTSIZE,
                dct_v_scaled_size: DCTSIZE,
                width_in_blocks: (width * spec.h_samp_factor).div_ceil(max_h * DCTSIZE),
                height_in_blocks: (height * spec.v_samp_factor).div_ceil(max_v * DCTSIZE),
                downsampled_width: (width * spec.h_samp_factor).div_ceil(max_h),
                downsampled_height: (height * spec.v_samp_factor).div_ceil(max_v),
                component_needed: true,
            })
            .collect();
        Ok(Self {
            image_width: width,
            image_height: height,
            output_width: width,
            output_height: height,
            max_h_samp_factor: max_h,
            max_v_samp_factor: max_v,
            min_dct_h_scaled_size: DCTSIZE,
            min_dct_v_scaled_size: DCTSIZE,
            total_imcu_rows: height.div_ceil(max_v * DCTSIZE),
            components,
        })
    }

    pub fn from_frame(frame: &FrameHeader) -> Result<Self> {
        Self::new(frame.image_width, frame.image_height, &frame.components)
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Output geometry without any IDCT scaling: every block decodes to
    /// 8x8 samples.
    pub fn core_output_dimensions(&mut self) {
        self.output_width = self.image_width;
        self.output_height = self.image_height;
        self.min_dct_h_scaled_size = DCTSIZE;
        self.min_dct_v_scaled_size = DCTSIZE;
        for comp in self.components.iter_mut() {
            comp.dct_h_scaled_size = DCTSIZE;
            comp.dct_v_scaled_size = DCTSIZE;
        }
    }

    /// Final output geometry. With `fancy_upsampling`, subsampled
    /// components are enlarged by the inverse DCT itself (up to 16x16 per
    /// block) wherever the ratio to the largest sampling factor is a power
    /// of two, so that the upsampler has less left to do.
    pub fn calc_output_dimensions(&mut self, fancy_upsampling: bool) {
        self.core_output_dimensions();
        let limit = if fancy_upsampling { DCTSIZE } else { DCTSIZE / 2 };
        for comp in self.components.iter_mut() {
            let mut ssize = 1;
            while self.min_dct_h_scaled_size * ssize <= limit
                && self.max_h_samp_factor % (comp.h_samp_factor * ssize * 2) == 0
            {
                ssize *= 2;
            }
            comp.dct_h_scaled_size = self.min_dct_h_scaled_size * ssize;
            let mut ssize = 1;
            while self.min_dct_v_scaled_size * ssize <= limit
                && self.max_v_samp_factor % (comp.v_samp_factor * ssize * 2) == 0
            {
                ssize *= 2;
            }
            comp.dct_v_scaled_size = self.min_dct_v_scaled_size * ssize;
            // Keep the scaling uniform between the two directions.
            if comp.dct_h_scaled_size > comp.dct_v_scaled_size * 2 {
                comp.dct_h_scaled_size = comp.dct_v_scaled_size * 2;
            } else if comp.dct_v_scaled_size > comp.dct_h_scaled_size * 2 {
                comp.dct_v_scaled_size = comp.dct_h_scaled_size * 2;
            }
        }
        for comp in self.components.iter_mut() {
            comp.downsampled_width = (self.image_width
                * comp.h_samp_factor
                * comp.dct_h_scaled_size)
                .div_ceil(self.max_h_samp_factor * DCTSIZE);
            comp.downsampled_height = (self.image_height
                * comp.v_samp_factor
                * comp.dct_v_scaled_size)
                .div_ceil(self.max_v_samp_factor * DCTSIZE);
        }
        debug!(
            scaled = ?self
                .components
                .iter()
                .map(|c| (c.dct_h_scaled_size, c.dct_v_scaled_size))
                .collect::<Vec<_>>(),
            "output dimensions"
        );
    }

    /// Whether any component decodes to a block size other than the
    /// minimum one.
    pub fn has_scaled_components(&self) -> bool {
        self.components.iter().any(|c| {
            c.dct_h_scaled_size != self.min_dct_h_scaled_size
                || c.dct_v_scaled_size != self.min_dct_v_scaled_size
        })
    }

    /// Block dimensions of the full-image coefficient array for a
    /// component, padded to whole MCUs.
    pub fn coefficient_array_size(&self, component: usize) -> (usize, usize) {
        let comp = &self.components[component];
        (
            comp.width_in_blocks.next_multiple_of(comp.h_samp_factor),
            comp.height_in_blocks.next_multiple_of(comp.v_samp_factor),
        )
    }

    /// Number of block rows of `component` that hold image data in iMCU
    /// row `imcu_row`.
    pub fn block_rows_in_imcu_row(&self, component: usize, imcu_row: usize) -> usize {
        let comp = &self.components[component];
        if imcu_row + 1 < self.total_imcu_rows {
            comp.v_samp_factor
        } else {
            match comp.height_in_blocks % comp.v_samp_factor {
                0 => comp.v_samp_factor,
                rows => rows,
            }
        }
    }
}

/// MCU layout of one component within a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanComponent {
    pub component_index: usize,
    /// Blocks per MCU horizontally.
    pub mcu_width: usize,
    pub mcu_height: usize,
    pub mcu_blocks: usize,
    pub mcu_sample_width: usize,
    /// Non-dummy blocks in the last MCU column.
    pub last_col_width: usize,
    /// Non-dummy block rows in the last MCU row.
    pub last_row_height: usize,
}

/// MCU layout of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLayout {
    pub components: Vec<ScanComponent>,
    pub mcus_per_row: usize,
    pub mcu_rows_in_scan: usize,
    pub blocks_in_mcu: usize,
    /// For each block of an MCU, the position in `components` it belongs to.
    pub mcu_membership: Vec<usize>,
}

impl ScanLayout {
    pub fn new(geometry: &FrameGeometry, component_indices: &[usize]) -> Result<Self> {
        if component_indices.is_empty() || component_indices.len() > MAX_COMPS_IN_SCAN {
            return Err(Error::ComponentsInScan(component_indices.len()));
        }
        for &ci in component_indices {
            if ci >= geometry.num_components() {
                return Err(Error::CorruptData(format!(
                    "scan references component {ci} of {}",
                    geometry.num_components()
                )));
            }
        }
        if let [ci] = *component_indices {
            // Non-interleaved scans always use one block per MCU.
            let comp = &geometry.components[ci];
            let last_row_height = match comp.height_in_blocks % comp.v_samp_factor {
                0 => comp.v_samp_factor,
                rows => rows,
            };
            return Ok(Self {
                components: vec![ScanComponent {
                    component_index: ci,
                    mcu_width: 1,
                    mcu_height: 1,
                    mcu_blocks: 1,
                    mcu_sample_width: comp.dct_h_scaled_size,
                    last_col_width: 1,
                    last_row_height,
                }],
                mcus_per_row: comp.width_in_blocks,
                mcu_rows_in_scan: comp.height_in_blocks,
                blocks_in_mcu: 1,
                mcu_membership: vec![0],
            });
        }
        let mut components = Vec::with_capacity(component_indices.len());
        let mut mcu_membership = vec![];
        for (pos, &ci) in component_indices.iter().enumerate() {
            let comp = &geometry.components[ci];
            let mcu_blocks = comp.h_samp_factor * comp.v_samp_factor;
            if mcu_membership.len() + mcu_blocks > MAX_BLOCKS_IN_MCU {
                return Err(Error::McuTooLarge(mcu_membership.len() + mcu_blocks));
            }
            mcu_membership.extend(std::iter::repeat_n(pos, mcu_blocks));
            components.push(ScanComponent {
                component_index: ci,
                mcu_width: comp.h_samp_factor,
                mcu_height: comp.v_samp_factor,
                mcu_blocks,
                mcu_sample_width: comp.h_samp_factor * comp.dct_h_scaled_size,
                last_col_width: match comp.width_in_blocks % comp.h_samp_factor {
                    0 => comp.h_samp_factor,
                    cols => cols,
                },
                last_row_height: match comp.height_in_blocks % comp.v_samp_factor {
                    0 => comp.v_samp_factor,
                    rows => rows,
                },
            });
        }
        Ok(Self {
            components,
            mcus_per_row: geometry
                .image_width
                .div_ceil(geometry.max_h_samp_factor * DCTSIZE),
            mcu_rows_in_scan: geometry.total_imcu_rows,
            blocks_in_mcu: mcu_membership.len(),
            mcu_membership,
        })
    }

    pub fn is_interleaved(&self) -> bool {
        self.components.len() > 1
    }

    /// MCU rows making up iMCU row `imcu_row` of this scan.
    pub fn mcu_rows_per_imcu_row(&self, geometry: &FrameGeometry, imcu_row: usize) -> usize {
        if self.is_interleaved() {
            1
        } else if imcu_row + 1 < geometry.total_imcu_rows {
            geometry.components[self.components[0].component_index].v_samp_factor
        } else {
            self.components[0].last_row_height
        }
    }
}
