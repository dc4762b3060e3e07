// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod api;
pub mod coefficients;
pub mod component;
pub mod compress;
pub mod decompress;
pub mod error;
pub mod headers;
pub mod image;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod state;
pub mod util;

/// Edge length of a DCT block.
pub const DCTSIZE: usize = 8;
/// Number of coefficients in a DCT block.
pub const DCTSIZE2: usize = DCTSIZE * DCTSIZE;
pub const MAX_COMPONENTS: usize = 10;
pub const MAX_SAMP_FACTOR: usize = 4;
pub const MAX_COMPS_IN_SCAN: usize = 4;
/// Upper bound on blocks in one MCU, for both directions.
pub const MAX_BLOCKS_IN_MCU: usize = 10;
pub const NUM_QUANT_TBLS: usize = 4;
pub const NUM_HUFF_TBLS: usize = 4;
pub const MAX_DIMENSION: usize = 65500;
