// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Frame and scan level parameters plus the coding tables shared between a
//! codec object and its marker writer.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    DCTSIZE2, MAX_COMPS_IN_SCAN, NUM_HUFF_TBLS, NUM_QUANT_TBLS,
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ColorSpace {
    Unknown = 0,
    Grayscale = 1,
    Rgb = 2,
    YCbCr = 3,
    Cmyk = 4,
    Ycck = 5,
}

impl ColorSpace {
    pub fn from_code(code: u32) -> Result<Self> {
        Self::from_u32(code).ok_or_else(|| Error::CorruptData(format!("color space code {code}")))
    }

    /// Number of channels, or `None` for [`ColorSpace::Unknown`].
    pub fn num_components(self) -> Option<usize> {
        match self {
            ColorSpace::Unknown => None,
            ColorSpace::Grayscale => Some(1),
            ColorSpace::Rgb | ColorSpace::YCbCr => Some(3),
            ColorSpace::Cmyk | ColorSpace::Ycck => Some(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSpec {
    pub id: u8,
    pub h_samp_factor: usize,
    pub v_samp_factor: usize,
    pub quant_tbl_no: usize,
}

impl ComponentSpec {
    pub fn new(id: u8, h_samp_factor: usize, v_samp_factor: usize, quant_tbl_no: usize) -> Self {
        Self {
            id,
            h_samp_factor,
            v_samp_factor,
            quant_tbl_no,
        }
    }
}

/// Contents of a start-of-frame marker, plus the color space deduced from
/// the file's other markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub image_width: usize,
    pub image_height: usize,
    pub data_precision: u32,
    pub color_space: ColorSpace,
    pub components: Vec<ComponentSpec>,
    pub progressive: bool,
    pub arith_code: bool,
}

/// One scan: either an entry of a compression scan script or the contents
/// of a start-of-scan marker. Component indices refer to the frame's
/// component list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub component_indices: Vec<usize>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl ScanHeader {
    /// A full-spectrum sequential scan.
    pub fn sequential(component_indices: Vec<usize>) -> Self {
        Self {
            component_indices,
            ss: 0,
            se: (DCTSIZE2 - 1) as u8,
            ah: 0,
            al: 0,
        }
    }

    pub fn is_progressive(&self) -> bool {
        self.ss != 0 || self.se as usize != DCTSIZE2 - 1 || self.ah != 0 || self.al != 0
    }

    fn band(component_indices: Vec<usize>, ss: u8, se: u8, ah: u8, al: u8) -> Self {
        Self {
            component_indices,
            ss,
            se,
            ah,
            al,
        }
    }
}

fn dc_scans(scans: &mut Vec<ScanHeader>, num_components: usize, ah: u8, al: u8) {
    if num_components <= MAX_COMPS_IN_SCAN {
        scans.push(ScanHeader::band((0..num_components).collect(), 0, 0, ah, al));
    } else {
        for c in 0..num_components {
            scans.push(ScanHeader::band(vec![c], 0, 0, ah, al));
        }
    }
}

fn ac_scans(scans: &mut Vec<ScanHeader>, num_components: usize, ss: u8, se: u8, ah: u8, al: u8) {
    for c in 0..num_components {
        scans.push(ScanHeader::band(vec![c], ss, se, ah, al));
    }
}

/// The customary progressive scan script: spectral selection plus two
/// levels of successive approximation, with a shorter chroma schedule for
/// YCbCr images.
pub fn simple_progression(num_components: usize, color_space: ColorSpace) -> Vec<ScanHeader> {
    let mut scans = vec![];
    if num_components == 3 && color_space == ColorSpace::YCbCr {
        dc_scans(&mut scans, 3, 0, 1);
        scans.push(ScanHeader::band(vec![0], 1, 5, 0, 2));
        scans.push(ScanHeader::band(vec![2], 1, 63, 0, 1));
        scans.push(ScanHeader::band(vec![1], 1, 63, 0, 1));
        scans.push(ScanHeader::band(vec![0], 6, 63, 0, 2));
        scans.push(ScanHeader::band(vec![0], 1, 63, 2, 1));
        dc_scans(&mut scans, 3, 1, 0);
        scans.push(ScanHeader::band(vec![2], 1, 63, 1, 0));
        scans.push(ScanHeader::band(vec![1], 1, 63, 1, 0));
        scans.push(ScanHeader::band(vec![0], 1, 63, 1, 0));
    } else {
        dc_scans(&mut scans, num_components, 0, 1);
        ac_scans(&mut scans, num_components, 1, 5, 0, 2);
        ac_scans(&mut scans, num_components, 6, 63, 0, 2);
        ac_scans(&mut scans, num_components, 1, 63, 2, 1);
        dc_scans(&mut scans, num_components, 1, 0);
        ac_scans(&mut scans, num_components, 1, 63, 1, 0);
    }
    scans
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    /// Quantizer values in natural (not zigzag) order.
    pub values: [u16; DCTSIZE2],
    /// Set once the table has been written; a set flag keeps it out of
    /// subsequent headers.
    pub sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// `bits[k]` is the number of codes of length `k`; `bits[0]` is unused.
    pub bits: [u8; 17],
    pub values: Vec<u8>,
    pub sent: bool,
}

impl HuffmanTable {
    fn new(bits: [u8; 17], values: &[u8]) -> Self {
        Self {
            bits,
            values: values.to_vec(),
            sent: false,
        }
    }
}

/// Quantization and Huffman tables, indexed by table slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingTables {
    pub quant: [Option<QuantTable>; NUM_QUANT_TBLS],
    pub dc_huffman: [Option<HuffmanTable>; NUM_HUFF_TBLS],
    pub ac_huffman: [Option<HuffmanTable>; NUM_HUFF_TBLS],
}

const STD_LUMINANCE_QUANT: [u16; DCTSIZE2] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

const STD_CHROMINANCE_QUANT: [u16; DCTSIZE2] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

const DC_LUMINANCE_BITS: [u8; 17] = [0, 0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const DC_CHROMINANCE_BITS: [u8; 17] = [0, 0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const AC_LUMINANCE_BITS: [u8; 17] = [0, 0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
const AC_LUMINANCE_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
    0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
    0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
    0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
    0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
    0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
    0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
    0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
    0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
    0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
];

const AC_CHROMINANCE_BITS: [u8; 17] = [0, 0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
const AC_CHROMINANCE_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
    0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33,
    0x52, 0xf0, 0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18,
    0x19, 0x1a, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44,
    0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63,
    0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a,
    0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
    0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca,
    0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7,
    0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
];

/// Maps a 1..=100 quality rating to a percentage scale factor for the
/// standard quantization tables.
pub fn quality_scaling(quality: u32) -> u32 {
    let quality = quality.clamp(1, 100);
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

fn scaled_quant_table(base: &[u16; DCTSIZE2], scale_factor: u32, force_baseline: bool) -> QuantTable {
    let limit = if force_baseline { 255 } else { 32767 };
    let values = base.map(|v| ((v as u32 * scale_factor + 50) / 100).clamp(1, limit) as u16);
    QuantTable {
        values,
        sent: false,
    }
}

impl CodingTables {
    /// The two example quantization tables scaled for `quality`, and the
    /// typical Huffman tables for luminance and chrominance.
    pub fn standard(quality: u32) -> Self {
        let scale = quality_scaling(quality);
        let mut tables = Self::default();
        tables.quant[0] = Some(scaled_quant_table(&STD_LUMINANCE_QUANT, scale, true));
        tables.quant[1] = Some(scaled_quant_table(&STD_CHROMINANCE_QUANT, scale, true));
        tables.dc_huffman[0] = Some(HuffmanTable::new(DC_LUMINANCE_BITS, &DC_VALUES));
        tables.dc_huffman[1] = Some(HuffmanTable::new(DC_CHROMINANCE_BITS, &DC_VALUES));
        tables.ac_huffman[0] = Some(HuffmanTable::new(AC_LUMINANCE_BITS, &AC_LUMINANCE_VALUES));
        tables.ac_huffman[1] = Some(HuffmanTable::new(
            AC_CHROMINANCE_BITS,
            &AC_CHROMINANCE_VALUES,
        ));
        tables
    }

    /// Marks every defined table as already written (`suppress == true`) or
    /// as still to be written.
    pub fn suppress(&mut self, suppress: bool) {
        for table in self.quant.iter_mut().flatten() {
            table.sent = suppress;
        }
        for table in self
            .dc_huffman
            .iter_mut()
            .chain(self.ac_huffman.iter_mut())
            .flatten()
        {
            table.sent = suppress;
        }
    }

    /// Sent flags of the defined tables: quantization tables first, then DC
    /// and AC Huffman tables.
    pub fn sent_flags(&self) -> Vec<bool> {
        self.quant
            .iter()
            .flatten()
            .map(|t| t.sent)
            .chain(
                self.dc_huffman
                    .iter()
                    .chain(self.ac_huffman.iter())
                    .flatten()
                    .map(|t| t.sent),
            )
            .collect()
    }
}
