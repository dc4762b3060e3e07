// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod support;

use jpegcore::{
    api::{DataSource, HeaderStatus, ProcessingResult},
    compress::Compressor,
    decompress::Decompressor,
    error::{Error, Result},
    headers::{ColorSpace, simple_progression},
    options::{CompressOptions, DecompressOptions},
    state::{CodecState, CompressState},
};
use support::*;
use test_log::test;

fn compress_rows(options: CompressOptions, rows: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    assert_eq!(compressor.write_scanlines(&mut out, &row_refs(rows))?, rows.len());
    compressor.finish_compress(&mut out)?;
    Ok(out)
}

fn decompress_gray(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut source = data;
    let mut decompressor = Decompressor::<u8>::new(DecompressOptions::default(), decoder_modules());
    assert_eq!(
        decompressor.read_header(&mut source, true)?,
        ProcessingResult::Complete {
            result: HeaderStatus::HeaderOk
        }
    );
    assert!(!decompressor.start_decompress(&mut source)?.is_suspended());
    let (width, height) = decompressor.output_dimensions().unwrap();
    let mut rows = vec![vec![0u8; width]; height];
    for row in rows.iter_mut() {
        assert_eq!(decompressor.read_scanlines(&mut source, &mut [&mut row[..]])?, 1);
    }
    assert!(!decompressor.finish_decompress(&mut source)?.is_suspended());
    assert!(source.bytes().is_empty());
    Ok(rows)
}

#[test]
fn grayscale_round_trip() -> Result<()> {
    let rows = random_rows::<u8>(19, 13, 1, 1);
    let data = compress_rows(CompressOptions::new(19, 13, ColorSpace::Grayscale), &rows)?;
    assert_eq!(data.first(), Some(&SOI));
    assert_eq!(data.last(), Some(&EOI));
    assert_eq!(decompress_gray(&data)?, rows);
    Ok(())
}

#[test]
fn progressive_round_trip() -> Result<()> {
    let rows = random_rows::<u8>(21, 17, 1, 2);
    let mut options = CompressOptions::new(21, 17, ColorSpace::Grayscale);
    options.scan_script = Some(simple_progression(1, ColorSpace::Grayscale));
    let data = compress_rows(options, &rows)?;
    assert_eq!(decompress_gray(&data)?, rows);
    Ok(())
}

#[test]
fn optimized_coding_gathers_statistics_first() -> Result<()> {
    let rows = random_rows::<u8>(16, 16, 1, 3);
    let mut options = CompressOptions::new(16, 16, ColorSpace::Grayscale);
    options.optimize_coding = true;
    let (modules, log) = encoder_modules_logged::<u8>();
    let mut compressor = Compressor::new(options, modules);
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    compressor.write_scanlines(&mut out, &row_refs(&rows))?;
    compressor.finish_compress(&mut out)?;
    let gathered: Vec<bool> = log.borrow().iter().map(|p| p.gather_statistics).collect();
    assert_eq!(gathered, vec![true, false]);
    assert_eq!(decompress_gray(&out)?, rows);
    Ok(())
}

#[test]
fn finish_requires_every_scanline() -> Result<()> {
    let rows = random_rows::<u8>(8, 13, 1, 4);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 13, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    assert_eq!(compressor.write_scanlines(&mut out, &row_refs(&rows[..5]))?, 5);
    assert!(matches!(compressor.finish_compress(&mut out), Err(Error::TooLittleData)));
    compressor.abort();
    assert_eq!(compressor.state(), CompressState::Start);
    Ok(())
}

#[test]
fn extra_scanlines_are_ignored() -> Result<()> {
    let rows = random_rows::<u8>(8, 4, 1, 5);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 4, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    assert_eq!(compressor.write_scanlines(&mut out, &row_refs(&rows))?, 4);
    assert_eq!(compressor.write_scanlines(&mut out, &row_refs(&rows))?, 0);
    assert_eq!(compressor.next_scanline(), 4);
    compressor.finish_compress(&mut out)?;
    Ok(())
}

#[test]
fn sent_flags_survive_finish() -> Result<()> {
    let rows = random_rows::<u8>(8, 8, 1, 6);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 8, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let mut first = vec![];
    compressor.start_compress(&mut first, true)?;
    compressor.write_scanlines(&mut first, &row_refs(&rows))?;
    compressor.finish_compress(&mut first)?;
    // One quantization table is used; all four Huffman tables are written.
    assert_eq!(compressor.tables().sent_flags(), vec![true, false, true, true, true, true]);
    assert_eq!(compressor.state(), CompressState::Start);

    // Without `write_all_tables`, the second datastream carries no tables.
    let mut second = vec![];
    compressor.start_compress(&mut second, false)?;
    compressor.write_scanlines(&mut second, &row_refs(&rows))?;
    compressor.finish_compress(&mut second)?;
    assert_eq!(first.len() - second.len(), 2 + 4 * 3);
    Ok(())
}

#[test]
fn suppressed_tables_are_left_out() -> Result<()> {
    let rows = random_rows::<u8>(8, 8, 1, 12);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 8, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let compress = |compressor: &mut Compressor<u8>| -> Result<Vec<u8>> {
        let mut out = vec![];
        compressor.start_compress(&mut out, false)?;
        compressor.write_scanlines(&mut out, &row_refs(&rows))?;
        compressor.finish_compress(&mut out)?;
        Ok(out)
    };

    compressor.suppress_tables(true);
    assert_eq!(compressor.tables().sent_flags(), vec![true; 6]);
    let without_tables = compress(&mut compressor)?;

    compressor.suppress_tables(false);
    assert_eq!(compressor.tables().sent_flags(), vec![false; 6]);
    let with_tables = compress(&mut compressor)?;
    // One quantization table and four Huffman tables are forced back in.
    assert_eq!(with_tables.len() - without_tables.len(), 2 + 4 * 3);
    assert_eq!(compressor.tables().sent_flags(), vec![true, false, true, true, true, true]);

    assert_eq!(decompress_gray(&without_tables)?, rows);
    assert_eq!(decompress_gray(&with_tables)?, rows);
    Ok(())
}

#[test]
fn tables_only_datastream() -> Result<()> {
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 8, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let mut tables = vec![];
    compressor.write_tables(&mut tables)?;
    assert!(compressor.tables().sent_flags().iter().all(|&sent| sent));

    let mut source = &tables[..];
    let mut decompressor = Decompressor::<u8>::new(DecompressOptions::default(), decoder_modules());
    assert_eq!(
        decompressor.read_header(&mut source, false)?,
        ProcessingResult::Complete {
            result: HeaderStatus::TablesOnly
        }
    );
    let mut source = &tables[..];
    assert!(matches!(decompressor.read_header(&mut source, true), Err(Error::NoImage)));
    Ok(())
}

#[test]
fn suspended_destination_resumes() -> Result<()> {
    let rows = random_rows::<u8>(24, 20, 1, 7);
    let options = CompressOptions::new(24, 20, ColorSpace::Grayscale);
    let expected = compress_rows(options.clone(), &rows)?;

    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut dest = ChunkedDestination::new(64);
    compressor.start_compress(&mut dest, true)?;
    let refs = row_refs(&rows);
    let mut next = 0;
    let mut short_writes = 0;
    while next < rows.len() {
        let written = compressor.write_scanlines(&mut dest, &refs[next..])?;
        if written < rows.len() - next {
            short_writes += 1;
        }
        next += written;
        assert_eq!(compressor.next_scanline(), next);
        dest.grant(100);
    }
    assert!(short_writes > 0);
    compressor.finish_compress(&mut dest)?;
    assert!(dest.terminated);
    assert_eq!(dest.data, expected);
    Ok(())
}

#[test]
fn remaining_passes_cannot_suspend() -> Result<()> {
    let rows = random_rows::<u8>(16, 16, 1, 8);
    let mut options = CompressOptions::new(16, 16, ColorSpace::Grayscale);
    options.scan_script = Some(simple_progression(1, ColorSpace::Grayscale));
    let mut compressor = Compressor::<u8>::new(options, encoder_modules());
    let mut dest = ChunkedDestination::new(1 << 20);
    compressor.start_compress(&mut dest, true)?;
    compressor.write_scanlines(&mut dest, &row_refs(&rows))?;
    dest.revoke();
    assert!(matches!(compressor.finish_compress(&mut dest), Err(Error::CantSuspend)));
    Ok(())
}

#[test]
fn calls_out_of_order_are_rejected() -> Result<()> {
    let rows = random_rows::<u8>(8, 8, 1, 9);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 8, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let mut out = vec![];
    assert!(matches!(
        compressor.write_scanlines(&mut out, &row_refs(&rows)),
        Err(Error::BadState(CodecState::Compress(CompressState::Start)))
    ));
    assert!(matches!(
        compressor.finish_compress(&mut out),
        Err(Error::BadState(CodecState::Compress(CompressState::Start)))
    ));
    compressor.start_compress(&mut out, true)?;
    assert!(matches!(
        compressor.start_compress(&mut out, true),
        Err(Error::BadState(CodecState::Compress(CompressState::Scanning)))
    ));
    assert!(matches!(
        compressor.write_tables(&mut out),
        Err(Error::BadState(CodecState::Compress(CompressState::Scanning)))
    ));
    compressor.write_scanlines(&mut out, &row_refs(&rows[..1]))?;
    assert!(matches!(
        compressor.write_marker(&mut out, 0xe1, b"late"),
        Err(Error::BadState(CodecState::Compress(CompressState::Scanning)))
    ));
    Ok(())
}

#[test]
fn markers_precede_the_frame() -> Result<()> {
    let rows = random_rows::<u8>(8, 8, 1, 10);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 8, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    compressor.write_marker(&mut out, 0xe1, b"exif")?;
    compressor.write_m_header(&mut out, 0xfe, 2)?;
    compressor.write_m_byte(&mut out, b'h')?;
    compressor.write_m_byte(&mut out, b'i')?;
    compressor.write_scanlines(&mut out, &row_refs(&rows))?;
    compressor.finish_compress(&mut out)?;

    let (modules, segments) = decoder_modules_with_segments::<u8>();
    let mut decompressor = Decompressor::<u8>::new(DecompressOptions::default(), modules);
    let mut source = &out[..];
    decompressor.read_header(&mut source, true)?;
    assert_eq!(
        *segments.borrow(),
        vec![(0xe1, b"exif".to_vec()), (0xfe, b"hi".to_vec())]
    );
    Ok(())
}

#[test]
fn progress_reports_scanlines() -> Result<()> {
    use std::{cell::RefCell, rc::Rc};

    let rows = random_rows::<u8>(8, 24, 1, 11);
    let mut compressor = Compressor::<u8>::new(
        CompressOptions::new(8, 24, ColorSpace::Grayscale),
        encoder_modules(),
    );
    let seen = Rc::new(RefCell::new(vec![]));
    let sink = seen.clone();
    compressor.set_progress_monitor(Box::new(move |p: &jpegcore::api::Progress| {
        sink.borrow_mut().push((p.pass_counter, p.pass_limit));
    }));
    let mut out = vec![];
    compressor.start_compress(&mut out, true)?;
    for chunk in row_refs(&rows).chunks(8) {
        compressor.write_scanlines(&mut out, chunk)?;
    }
    compressor.finish_compress(&mut out)?;
    assert_eq!(*seen.borrow(), vec![(0, 24), (8, 24), (16, 24)]);
    Ok(())
}
