// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod support;

use jpegcore::{
    api::ProcessingResult,
    coefficients::{Block, CoefArrays, CoefficientStore},
    compress::Compressor,
    decompress::Decompressor,
    error::{Error, Result},
    headers::{ColorSpace, FrameHeader, ScanHeader, simple_progression},
    options::{CompressOptions, DecompressOptions},
    state::{CodecState, CompressState, DecompressState},
};
use support::*;
use test_log::test;

fn compress_ycc(width: usize, height: usize, progressive: bool, seed: u64) -> Result<Vec<u8>> {
    let rows = random_rows::<u8>(width, height, 3, seed);
    let mut options = CompressOptions::new(width, height, ColorSpace::YCbCr);
    if progressive {
        options.scan_script = Some(simple_progression(3, ColorSpace::YCbCr));
    }
    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    compressor.write_scanlines(&mut out, &row_refs(&rows))?;
    compressor.finish_compress(&mut out)?;
    Ok(out)
}

struct Coefficients {
    frame: FrameHeader,
    store: CoefficientStore,
    arrays: CoefArrays,
    scans_read: usize,
}

impl Coefficients {
    fn blocks(&self) -> Vec<Vec<Block>> {
        (0..self.arrays.len())
            .map(|c| {
                let id = self.arrays.component(c);
                let (width, height) = self.store.dimensions(id).unwrap();
                (0..height)
                    .flat_map(|row| (0..width).map(move |col| (row, col)))
                    .map(|(row, col)| *self.store.block(id, row, col).unwrap())
                    .collect()
            })
            .collect()
    }
}

/// Reads every coefficient, offering the input `chunk_size` bytes at a time.
fn read_coefficients(data: &[u8], chunk_size: usize) -> Result<Coefficients> {
    let mut source = ChunkedSource::new(data.to_vec(), chunk_size);
    let mut decompressor = Decompressor::<u8>::new(DecompressOptions::default(), decoder_modules());
    while decompressor.read_header(&mut source, true)?.is_suspended() {
        assert!(!source.is_exhausted());
        source.feed(chunk_size);
    }
    let frame = decompressor.frame_header().unwrap().clone();
    loop {
        match decompressor.read_coefficients(&mut source)? {
            ProcessingResult::Complete { .. } => break,
            ProcessingResult::Suspended => {
                assert!(!source.is_exhausted());
                source.feed(chunk_size);
            }
        }
    }
    assert_eq!(decompressor.state(), DecompressState::Stopping);
    let scans_read = decompressor.scan_cursors().input_scan_number;
    let (store, arrays) = decompressor.take_coefficients().unwrap();
    assert!(!decompressor.finish_decompress(&mut source)?.is_suspended());
    assert_eq!(source.position(), data.len());
    Ok(Coefficients {
        frame,
        store,
        arrays,
        scans_read,
    })
}

fn write_coefficients(coefficients: Coefficients, scan_script: Option<Vec<ScanHeader>>) -> Result<Vec<u8>> {
    let mut options = CompressOptions::from_frame(&coefficients.frame);
    options.scan_script = scan_script;
    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut out = vec![];
    compressor.write_coefficients(&mut out, coefficients.store, coefficients.arrays)?;
    assert_eq!(compressor.state(), CompressState::WritingCoefficients);
    compressor.finish_compress(&mut out)?;
    Ok(out)
}

#[test]
fn chunk_size_does_not_matter() {
    let data = compress_ycc(35, 29, true, 41).unwrap();
    let reference = read_coefficients(&data, data.len()).unwrap();
    assert_eq!(
        reference.scans_read,
        simple_progression(3, ColorSpace::YCbCr).len()
    );
    let reference_blocks = reference.blocks();
    arbtest::arbtest(|u| {
        let chunk_size = u.arbitrary::<u8>()? as usize + 1;
        let coefficients = read_coefficients(&data, chunk_size).unwrap();
        assert_eq!(coefficients.scans_read, reference.scans_read, "chunk size {chunk_size}");
        assert_eq!(coefficients.blocks(), reference_blocks, "chunk size {chunk_size}");
        Ok(())
    });
}

#[test]
fn sequential_transcode_is_lossless() -> Result<()> {
    let data = compress_ycc(37, 23, false, 42)?;
    let coefficients = read_coefficients(&data, data.len())?;
    assert!(!coefficients.frame.progressive);
    assert_eq!(write_coefficients(coefficients, None)?, data);
    Ok(())
}

#[test]
fn progressive_transcode_is_lossless() -> Result<()> {
    let data = compress_ycc(30, 18, true, 43)?;
    let coefficients = read_coefficients(&data, 97)?;
    assert!(coefficients.frame.progressive);
    let script = simple_progression(3, ColorSpace::YCbCr);
    assert_eq!(write_coefficients(coefficients, Some(script))?, data);
    Ok(())
}

#[test]
fn sequential_to_progressive_keeps_coefficients() -> Result<()> {
    let data = compress_ycc(24, 24, false, 44)?;
    let original = read_coefficients(&data, data.len())?;
    let reference = original.blocks();
    let progressive = write_coefficients(original, Some(simple_progression(3, ColorSpace::YCbCr)))?;
    let converted = read_coefficients(&progressive, 33)?;
    assert!(converted.frame.progressive);
    assert_eq!(converted.blocks(), reference);
    Ok(())
}

#[test]
fn coefficients_are_only_read_after_the_header() -> Result<()> {
    let data = compress_ycc(16, 16, false, 45)?;
    let mut decompressor = Decompressor::<u8>::new(DecompressOptions::default(), decoder_modules());
    let mut source = &data[..];
    assert!(matches!(
        decompressor.read_coefficients(&mut source),
        Err(Error::BadState(CodecState::Decompress(DecompressState::Start)))
    ));
    assert!(decompressor.take_coefficients().is_none());
    decompressor.read_header(&mut source, true)?;
    assert!(decompressor.read_coefficients(&mut source)?.complete().is_some());
    assert!(decompressor.coefficient_store().is_some());
    // Reading the coefficients again hands out the same arrays.
    assert!(decompressor.read_coefficients(&mut source)?.complete().is_some());
    Ok(())
}

#[test]
fn mismatched_geometry_is_rejected() -> Result<()> {
    let data = compress_ycc(16, 16, false, 46)?;
    let coefficients = read_coefficients(&data, data.len())?;
    let mut options = CompressOptions::from_frame(&coefficients.frame);
    options.image_width = 40;
    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut out = vec![];
    assert!(matches!(
        compressor.write_coefficients(&mut out, coefficients.store, coefficients.arrays),
        Err(Error::CoefficientGeometry)
    ));
    Ok(())
}

#[test]
fn scanlines_are_refused_while_writing_coefficients() -> Result<()> {
    let data = compress_ycc(16, 16, false, 47)?;
    let coefficients = read_coefficients(&data, data.len())?;
    let options = CompressOptions::from_frame(&coefficients.frame);
    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut out = vec![];
    compressor.write_coefficients(&mut out, coefficients.store, coefficients.arrays)?;
    let row = [0u8; 48];
    assert!(matches!(
        compressor.write_scanlines(&mut out, &[&row[..]]),
        Err(Error::BadState(CodecState::Compress(CompressState::WritingCoefficients)))
    ));
    // Markers may still be written before the data.
    compressor.write_marker(&mut out, 0xfe, b"note")?;
    compressor.finish_compress(&mut out)?;
    assert_eq!(compressor.state(), CompressState::Start);
    Ok(())
}
