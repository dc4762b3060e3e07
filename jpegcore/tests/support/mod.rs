// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! A small collaborator codec for driving the pipeline end to end. Markers
//! are tagged records, coefficients are stored uncompressed, and the DCT is
//! the identity (a block holds its samples minus the center value).

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use jpegcore::{
    DCTSIZE, DCTSIZE2,
    api::{
        DataDestination, DataSource, EntropyDecoder, EntropyEncoder, ForwardDct, InverseDct,
        MarkerReader, MarkerStatus, MarkerWriter,
    },
    coefficients::Block,
    component::{ComponentInfo, ScanLayout},
    compress::EncoderModules,
    decompress::DecoderModules,
    error::{Error, Result},
    headers::{CodingTables, ColorSpace, ComponentSpec, FrameHeader, ScanHeader},
    image::{Image, Sample},
};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

pub const SOI: u8 = 0xd8;
pub const EOI: u8 = 0xd9;
const FRAME: u8 = b'F';
const SCAN: u8 = b'S';
const SEGMENT: u8 = b'M';
const QUANT: u8 = b'Q';
const HUFFMAN: u8 = b'H';
const FRAME_FIXED_LEN: usize = 10;

fn emit(dest: &mut dyn DataDestination, bytes: &[u8]) -> Result<()> {
    if dest.emit(bytes) {
        Ok(())
    } else {
        Err(Error::CantSuspend)
    }
}

fn write_unsent_huffman(dest: &mut dyn DataDestination, tables: &mut CodingTables) -> Result<()> {
    for (class, set) in [(0u8, &mut tables.dc_huffman), (1u8, &mut tables.ac_huffman)] {
        for (slot, table) in set.iter_mut().enumerate() {
            if let Some(table) = table.as_mut().filter(|t| !t.sent) {
                emit(dest, &[HUFFMAN, class, slot as u8])?;
                table.sent = true;
            }
        }
    }
    Ok(())
}

fn write_unsent_quant(dest: &mut dyn DataDestination, tables: &mut CodingTables, slot: usize) -> Result<()> {
    if let Some(table) = tables.quant[slot].as_mut().filter(|t| !t.sent) {
        emit(dest, &[QUANT, slot as u8])?;
        table.sent = true;
    }
    Ok(())
}

/// Writes markers as tagged records.
#[derive(Default)]
pub struct RecordWriter;

impl MarkerWriter for RecordWriter {
    fn write_file_header(&mut self, dest: &mut dyn DataDestination) -> Result<()> {
        emit(dest, &[SOI])
    }

    fn write_frame_header(
        &mut self,
        dest: &mut dyn DataDestination,
        frame: &FrameHeader,
        tables: &mut CodingTables,
    ) -> Result<()> {
        for comp in frame.components.iter() {
            write_unsent_quant(dest, tables, comp.quant_tbl_no)?;
        }
        let mut record = vec![FRAME];
        record.extend((frame.image_width as u16).to_be_bytes());
        record.extend((frame.image_height as u16).to_be_bytes());
        record.push(frame.data_precision as u8);
        record.push(frame.color_space as u8);
        record.push(frame.progressive as u8);
        record.push(frame.arith_code as u8);
        record.push(frame.components.len() as u8);
        for comp in frame.components.iter() {
            record.extend([
                comp.id,
                comp.h_samp_factor as u8,
                comp.v_samp_factor as u8,
                comp.quant_tbl_no as u8,
            ]);
        }
        emit(dest, &record)
    }

    fn write_scan_header(
        &mut self,
        dest: &mut dyn DataDestination,
        scan: &ScanHeader,
        tables: &mut CodingTables,
    ) -> Result<()> {
        write_unsent_huffman(dest, tables)?;
        let mut record = vec![SCAN, scan.component_indices.len() as u8];
        record.extend(scan.component_indices.iter().map(|&c| c as u8));
        record.extend([scan.ss, scan.se, scan.ah, scan.al]);
        emit(dest, &record)
    }

    fn write_file_trailer(&mut self, dest: &mut dyn DataDestination) -> Result<()> {
        emit(dest, &[EOI])
    }

    fn write_tables_only(&mut self, dest: &mut dyn DataDestination, tables: &mut CodingTables) -> Result<()> {
        emit(dest, &[SOI])?;
        for slot in 0..tables.quant.len() {
            write_unsent_quant(dest, tables, slot)?;
        }
        write_unsent_huffman(dest, tables)?;
        emit(dest, &[EOI])
    }

    fn write_marker_header(&mut self, dest: &mut dyn DataDestination, marker: u8, length: usize) -> Result<()> {
        let length = length as u16;
        emit(dest, &[SEGMENT, marker])?;
        emit(dest, &length.to_be_bytes())
    }

    fn write_marker_byte(&mut self, dest: &mut dyn DataDestination, value: u8) -> Result<()> {
        emit(dest, &[value])
    }
}

/// Length of the record at the start of `bytes`, or `None` if it is not
/// complete yet.
fn record_len(bytes: &[u8]) -> Result<Option<usize>> {
    let Some(&tag) = bytes.first() else {
        return Ok(None);
    };
    let len = match tag {
        SOI | EOI => Some(1),
        QUANT => Some(2),
        HUFFMAN => Some(3),
        FRAME => bytes
            .get(FRAME_FIXED_LEN - 1)
            .map(|&n| FRAME_FIXED_LEN + 4 * n as usize),
        SCAN => bytes.get(1).map(|&n| 2 + n as usize + 4),
        SEGMENT => bytes
            .get(2..4)
            .map(|len| 4 + u16::from_be_bytes([len[0], len[1]]) as usize),
        tag => return Err(Error::CorruptData(format!("unknown record {tag:#x}"))),
    };
    Ok(len.filter(|&len| len <= bytes.len()))
}

fn parse_frame(record: &[u8]) -> Result<FrameHeader> {
    let components = record[FRAME_FIXED_LEN..]
        .chunks_exact(4)
        .map(|c| ComponentSpec::new(c[0], c[1] as usize, c[2] as usize, c[3] as usize))
        .collect();
    Ok(FrameHeader {
        image_width: u16::from_be_bytes([record[1], record[2]]) as usize,
        image_height: u16::from_be_bytes([record[3], record[4]]) as usize,
        data_precision: record[5] as u32,
        color_space: ColorSpace::from_code(record[6] as u32)?,
        progressive: record[7] != 0,
        arith_code: record[8] != 0,
        components,
    })
}

fn parse_scan(record: &[u8]) -> ScanHeader {
    let n = record[1] as usize;
    let params = &record[2 + n..];
    ScanHeader {
        component_indices: record[2..2 + n].iter().map(|&c| c as usize).collect(),
        ss: params[0],
        se: params[1],
        ah: params[2],
        al: params[3],
    }
}

/// Marker segments seen by a [`RecordReader`], shared with the test.
pub type Segments = Rc<RefCell<Vec<(u8, Vec<u8>)>>>;

/// Reads what [`RecordWriter`] writes. Never consumes a partial record.
#[derive(Default)]
pub struct RecordReader {
    frame: Option<FrameHeader>,
    scan: Option<ScanHeader>,
    pub segments: Segments,
}

impl MarkerReader for RecordReader {
    fn reset(&mut self) {
        self.frame = None;
        self.scan = None;
    }

    fn read_markers(&mut self, source: &mut dyn DataSource) -> Result<MarkerStatus> {
        loop {
            let Some(len) = record_len(source.bytes())? else {
                if source.fill_buffer() {
                    continue;
                }
                return Ok(MarkerStatus::Suspended);
            };
            let record = source.bytes()[..len].to_vec();
            source.consume(len);
            match record[0] {
                FRAME => self.frame = Some(parse_frame(&record)?),
                SCAN => {
                    self.scan = Some(parse_scan(&record));
                    return Ok(MarkerStatus::ReachedSos);
                }
                EOI => return Ok(MarkerStatus::ReachedEoi),
                SEGMENT => self
                    .segments
                    .borrow_mut()
                    .push((record[1], record[4..].to_vec())),
                _ => {}
            }
        }
    }

    fn frame_header(&self) -> Option<&FrameHeader> {
        self.frame.as_ref()
    }

    fn scan_header(&self) -> Option<&ScanHeader> {
        self.scan.as_ref()
    }
}

/// What a [`RawEncoder`] was asked to do, one entry per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderPass {
    pub components: Vec<usize>,
    pub gather_statistics: bool,
}

pub type PassLog = Rc<RefCell<Vec<EncoderPass>>>;

/// Writes the coefficients of the scan's spectral band as big-endian
/// 16-bit values. Refinement scans and statistics passes write nothing.
#[derive(Default)]
pub struct RawEncoder {
    band: (usize, usize),
    silent: bool,
    pub passes: PassLog,
}

impl EntropyEncoder for RawEncoder {
    fn start_pass(
        &mut self,
        _frame: &FrameHeader,
        scan: &ScanHeader,
        _layout: &ScanLayout,
        gather_statistics: bool,
    ) -> Result<()> {
        self.band = (scan.ss as usize, scan.se as usize);
        self.silent = gather_statistics || scan.ah != 0;
        self.passes.borrow_mut().push(EncoderPass {
            components: scan.component_indices.clone(),
            gather_statistics,
        });
        Ok(())
    }

    fn encode_mcu(&mut self, dest: &mut dyn DataDestination, blocks: &[Block]) -> Result<bool> {
        if self.silent {
            return Ok(true);
        }
        let (ss, se) = self.band;
        let bytes: Vec<u8> = blocks
            .iter()
            .flat_map(|block| block[ss..=se].iter().flat_map(|c| c.to_be_bytes()))
            .collect();
        Ok(dest.emit(&bytes))
    }

    fn finish_pass(&mut self, _dest: &mut dyn DataDestination, _tables: &mut CodingTables) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RawDecoder {
    band: (usize, usize),
    refinement: bool,
}

impl EntropyDecoder for RawDecoder {
    fn start_pass(&mut self, _frame: &FrameHeader, scan: &ScanHeader, _layout: &ScanLayout) -> Result<()> {
        self.band = (scan.ss as usize, scan.se as usize);
        self.refinement = scan.ah != 0;
        Ok(())
    }

    fn decode_mcu(&mut self, source: &mut dyn DataSource, blocks: &mut [Block]) -> Result<bool> {
        if self.refinement {
            return Ok(true);
        }
        let (ss, se) = self.band;
        let needed = blocks.len() * (se - ss + 1) * 2;
        while source.bytes().len() < needed {
            if !source.fill_buffer() {
                return Ok(false);
            }
        }
        let mut values = source.bytes()[..needed]
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]));
        for block in blocks.iter_mut() {
            for coef in block[ss..=se].iter_mut() {
                *coef = values.next().unwrap_or_default();
            }
        }
        source.consume(needed);
        Ok(true)
    }
}

/// Stores samples minus the center value; the inverse replicates samples
/// when asked for a larger block.
pub struct IdentityDct;

impl<S: Sample> ForwardDct<S> for IdentityDct {
    fn forward_dct(&mut self, _component: &ComponentInfo, plane: &Image<S>, x: usize, y: usize, block: &mut Block) {
        for (k, coef) in block.iter_mut().enumerate() {
            let sample = plane.row(y + k / DCTSIZE)[x + k % DCTSIZE];
            *coef = (sample.to_i32() - S::CENTER) as i16;
        }
    }
}

impl<S: Sample> InverseDct<S> for IdentityDct {
    fn inverse_dct(&mut self, component: &ComponentInfo, block: &Block, plane: &mut Image<S>, x: usize, y: usize) {
        let (width, height) = (component.dct_h_scaled_size, component.dct_v_scaled_size);
        for v in 0..height {
            let row = plane.row_mut(y + v);
            for u in 0..width {
                let k = (v * DCTSIZE / height) * DCTSIZE + u * DCTSIZE / width;
                debug_assert!(k < DCTSIZE2);
                let value = (block[k] as i32 + S::CENTER).clamp(0, S::MAX_VALUE);
                row[x + u] = S::from_i32(value);
            }
        }
    }
}

pub fn encoder_modules<S: Sample>() -> EncoderModules<S> {
    EncoderModules::new(Box::new(RecordWriter), Box::new(RawEncoder::default())).with_fdct(Box::new(IdentityDct))
}

pub fn encoder_modules_logged<S: Sample>() -> (EncoderModules<S>, PassLog) {
    let encoder = RawEncoder::default();
    let log = encoder.passes.clone();
    let modules = EncoderModules::new(Box::new(RecordWriter), Box::new(encoder)).with_fdct(Box::new(IdentityDct));
    (modules, log)
}

pub fn decoder_modules<S: Sample>() -> DecoderModules<S> {
    DecoderModules::new(Box::new(RecordReader::default()), Box::new(RawDecoder::default()))
        .with_idct(Box::new(IdentityDct))
}

pub fn decoder_modules_with_segments<S: Sample>() -> (DecoderModules<S>, Segments) {
    let reader = RecordReader::default();
    let segments = reader.segments.clone();
    let modules =
        DecoderModules::new(Box::new(reader), Box::new(RawDecoder::default())).with_idct(Box::new(IdentityDct));
    (modules, segments)
}

/// A source that only exposes the bytes fed to it so far.
pub struct ChunkedSource {
    data: Vec<u8>,
    pos: usize,
    limit: usize,
}

impl ChunkedSource {
    pub fn new(data: Vec<u8>, available: usize) -> Self {
        let limit = available.min(data.len());
        Self { data, pos: 0, limit }
    }

    pub fn feed(&mut self, count: usize) {
        self.limit = (self.limit + count).min(self.data.len());
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit == self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl DataSource for ChunkedSource {
    fn bytes(&self) -> &[u8] {
        &self.data[self.pos..self.limit]
    }

    fn consume(&mut self, count: usize) {
        self.pos += count.min(self.limit - self.pos);
    }

    fn fill_buffer(&mut self) -> bool {
        false
    }
}

/// A destination that accepts a limited number of bytes until granted more.
pub struct ChunkedDestination {
    pub data: Vec<u8>,
    budget: usize,
    pub terminated: bool,
}

impl ChunkedDestination {
    pub fn new(budget: usize) -> Self {
        Self {
            data: vec![],
            budget,
            terminated: false,
        }
    }

    pub fn grant(&mut self, count: usize) {
        self.budget += count;
    }

    pub fn revoke(&mut self) {
        self.budget = 0;
    }
}

impl DataDestination for ChunkedDestination {
    fn init_destination(&mut self) {
        self.terminated = false;
    }

    fn emit(&mut self, data: &[u8]) -> bool {
        if data.len() > self.budget {
            return false;
        }
        self.budget -= data.len();
        self.data.extend_from_slice(data);
        true
    }

    fn term_destination(&mut self) {
        self.terminated = true;
    }
}

/// Interleaved rows of reproducible noise.
pub fn random_rows<S: Sample>(width: usize, height: usize, components: usize, seed: u64) -> Vec<Vec<S>> {
    let mut rng = XorShiftRng::seed_from_u64(seed);
    (0..height)
        .map(|_| {
            (0..width * components)
                .map(|_| S::from_i32(rng.random_range(0..=S::MAX_VALUE)))
                .collect()
        })
        .collect()
}

pub fn row_refs<S: Sample>(rows: &[Vec<S>]) -> Vec<&[S]> {
    rows.iter().map(Vec::as_slice).collect()
}
