// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::headers::{ColorSpace, ComponentSpec, FrameHeader, ScanHeader};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct DecompressOptions {
    /// Color space of the produced pixels. `None` picks the customary one
    /// for the file's color space (RGB for YCbCr, CMYK for YCCK, the file's
    /// own otherwise).
    pub out_color_space: Option<ColorSpace>,
    /// Keep all coefficients so that the image can be output several times
    /// while its scans arrive.
    pub buffered_image: bool,
    /// Deliver downsampled component planes instead of pixels.
    pub raw_data_out: bool,
    /// Let the inverse DCT enlarge subsampled components. Disables the
    /// merged upsampler.
    pub do_fancy_upsampling: bool,
    /// Co-sited chroma siting. Not implemented; setting it makes pipeline
    /// setup fail.
    pub ccir601_sampling: bool,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            out_color_space: None,
            buffered_image: false,
            raw_data_out: false,
            do_fancy_upsampling: true,
            ccir601_sampling: false,
        }
    }
}

impl DecompressOptions {
    pub fn default_out_color_space(jpeg_color_space: ColorSpace) -> ColorSpace {
        match jpeg_color_space {
            ColorSpace::YCbCr => ColorSpace::Rgb,
            ColorSpace::Ycck => ColorSpace::Cmyk,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct CompressOptions {
    pub image_width: usize,
    pub image_height: usize,
    /// Samples per pixel in the rows passed to `write_scanlines`.
    pub input_components: usize,
    pub in_color_space: ColorSpace,
    pub jpeg_color_space: ColorSpace,
    pub components: Vec<ComponentSpec>,
    /// Accept downsampled component planes instead of pixel rows.
    pub raw_data_in: bool,
    pub arith_code: bool,
    /// Gather statistics and write optimal Huffman tables. Costs an extra
    /// pass per scan.
    pub optimize_coding: bool,
    /// `None` writes a single sequential scan.
    pub scan_script: Option<Vec<ScanHeader>>,
    pub quality: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            image_width: 0,
            image_height: 0,
            input_components: 0,
            in_color_space: ColorSpace::Unknown,
            jpeg_color_space: ColorSpace::Unknown,
            components: vec![],
            raw_data_in: false,
            arith_code: false,
            optimize_coding: false,
            scan_script: None,
            quality: 75,
        }
    }
}

impl CompressOptions {
    /// Defaults for compressing `width` x `height` pixels in `color_space`.
    /// YCbCr gets 2x2 subsampled chroma; other spaces keep every component
    /// at full resolution.
    pub fn new(width: usize, height: usize, color_space: ColorSpace) -> Self {
        let components = match color_space {
            ColorSpace::YCbCr => vec![
                ComponentSpec::new(1, 2, 2, 0),
                ComponentSpec::new(2, 1, 1, 1),
                ComponentSpec::new(3, 1, 1, 1),
            ],
            ColorSpace::Ycck => vec![
                ComponentSpec::new(1, 2, 2, 0),
                ComponentSpec::new(2, 1, 1, 1),
                ComponentSpec::new(3, 1, 1, 1),
                ComponentSpec::new(4, 2, 2, 0),
            ],
            other => (0..other.num_components().unwrap_or(1))
                .map(|c| ComponentSpec::new(c as u8 + 1, 1, 1, 0))
                .collect(),
        };
        Self {
            image_width: width,
            image_height: height,
            input_components: components.len(),
            in_color_space: color_space,
            jpeg_color_space: color_space,
            components,
            ..Self::default()
        }
    }

    /// Copies the parameters that must not change when coefficients are
    /// written back unchanged: geometry, components and color space.
    pub fn from_frame(frame: &FrameHeader) -> Self {
        Self {
            image_width: frame.image_width,
            image_height: frame.image_height,
            input_components: frame.components.len(),
            in_color_space: frame.color_space,
            jpeg_color_space: frame.color_space,
            components: frame.components.clone(),
            arith_code: frame.arith_code,
            ..Self::default()
        }
    }

    pub fn is_progressive(&self) -> bool {
        self.scan_script
            .as_ref()
            .is_some_and(|scans| scans.iter().any(ScanHeader::is_progressive))
    }
}
