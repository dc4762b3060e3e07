// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Contracts of the stages this crate drives but does not implement: marker
//! parsing and writing, entropy coding, the DCT, and compression-side
//! preprocessing.

use super::{DataDestination, DataSource};
use crate::{
    coefficients::Block,
    component::{ComponentInfo, FrameGeometry, ScanLayout},
    error::Result,
    headers::{CodingTables, FrameHeader, ScanHeader},
    image::{Image, Sample},
    render::RowCursor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStatus {
    Suspended,
    ReachedSos,
    ReachedEoi,
}

pub trait MarkerReader {
    /// Forgets everything about the previous datastream.
    fn reset(&mut self);

    /// Reads markers up to the next start-of-scan or end-of-image. On
    /// suspension, no partially read marker may be consumed.
    fn read_markers(&mut self, source: &mut dyn DataSource) -> Result<MarkerStatus>;

    fn frame_header(&self) -> Option<&FrameHeader>;

    /// Header of the most recently read scan.
    fn scan_header(&self) -> Option<&ScanHeader>;
}

pub trait EntropyDecoder {
    fn start_pass(&mut self, frame: &FrameHeader, scan: &ScanHeader, layout: &ScanLayout) -> Result<()>;

    /// Decodes one MCU into `blocks`, which arrive holding the coefficients
    /// decoded so far. Returns `Ok(false)` on suspension, in which case the
    /// decoder's own state must be unchanged; `blocks` is discarded.
    fn decode_mcu(&mut self, source: &mut dyn DataSource, blocks: &mut [Block]) -> Result<bool>;
}

pub trait MarkerWriter {
    fn write_file_header(&mut self, dest: &mut dyn DataDestination) -> Result<()>;

    /// Writes the frame header plus every table it uses whose `sent` flag is
    /// clear, setting the flag.
    fn write_frame_header(
        &mut self,
        dest: &mut dyn DataDestination,
        frame: &FrameHeader,
        tables: &mut CodingTables,
    ) -> Result<()>;

    fn write_scan_header(
        &mut self,
        dest: &mut dyn DataDestination,
        scan: &ScanHeader,
        tables: &mut CodingTables,
    ) -> Result<()>;

    fn write_file_trailer(&mut self, dest: &mut dyn DataDestination) -> Result<()>;

    /// Writes an abbreviated datastream holding only tables.
    fn write_tables_only(&mut self, dest: &mut dyn DataDestination, tables: &mut CodingTables) -> Result<()>;

    fn write_marker_header(&mut self, dest: &mut dyn DataDestination, marker: u8, length: usize) -> Result<()>;

    fn write_marker_byte(&mut self, dest: &mut dyn DataDestination, value: u8) -> Result<()>;
}

pub trait EntropyEncoder {
    fn start_pass(
        &mut self,
        frame: &FrameHeader,
        scan: &ScanHeader,
        layout: &ScanLayout,
        gather_statistics: bool,
    ) -> Result<()>;

    /// Encodes one MCU. Returns `Ok(false)` if the destination suspended,
    /// having emitted nothing for this MCU.
    fn encode_mcu(&mut self, dest: &mut dyn DataDestination, blocks: &[Block]) -> Result<bool>;

    /// Flushes the pass. After a statistics pass, stores the optimized
    /// tables in `tables` with their `sent` flags cleared.
    fn finish_pass(&mut self, dest: &mut dyn DataDestination, tables: &mut CodingTables) -> Result<()>;
}

pub trait ForwardDct<S: Sample> {
    fn start_pass(&mut self, _geometry: &FrameGeometry, _tables: &CodingTables) -> Result<()> {
        Ok(())
    }

    /// Transforms and quantizes the 8x8 samples of `plane` whose top-left
    /// corner is at (`x`, `y`).
    fn forward_dct(&mut self, component: &ComponentInfo, plane: &Image<S>, x: usize, y: usize, block: &mut Block);
}

pub trait InverseDct<S: Sample> {
    fn start_pass(&mut self, _geometry: &FrameGeometry) -> Result<()> {
        Ok(())
    }

    /// Reconstructs `block` as `dct_h_scaled_size` x `dct_v_scaled_size`
    /// samples of `component`, written to `plane` with the top-left corner
    /// at (`x`, `y`).
    fn inverse_dct(&mut self, component: &ComponentInfo, block: &Block, plane: &mut Image<S>, x: usize, y: usize);
}

/// Compression-side color conversion and downsampling.
pub trait Preprocessor<S: Sample> {
    fn start_pass(&mut self, geometry: &FrameGeometry) -> Result<()>;

    /// Consumes interleaved pixel rows from `input` starting at
    /// `in_rows.position`, producing row groups in `output` (one plane per
    /// component, one iMCU row tall) starting at `out_row_groups.position`.
    /// At the bottom of the image the remaining row groups are padded.
    fn pre_process(
        &mut self,
        input: &[&[S]],
        in_rows: &mut RowCursor,
        output: &mut [Image<S>],
        out_row_groups: &mut RowCursor,
    ) -> Result<()>;
}
