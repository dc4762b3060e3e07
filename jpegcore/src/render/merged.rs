// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Combined 2:1 chroma upsampling and YCbCr to RGB conversion. Each chroma
//! sample covers two (or four) luma samples, so its contribution to R, G and
//! B is computed once and shared. Eligibility is decided when the pipeline
//! is built.

use super::{RangeLimit, RowCursor, Upsampler, YccRgbTables, color::put_rgb};
use crate::{
    component::FrameGeometry,
    error::Result,
    image::{Image, Sample},
};

const RGB_PIXEL_SIZE: usize = 3;

/// Converts one row of luma plus the half-width chroma rows covering it.
fn merge_h2v1<S: Sample>(
    tables: &YccRgbTables,
    range_limit: &RangeLimit<S>,
    width: usize,
    y_row: &[S],
    cb_row: &[S],
    cr_row: &[S],
    out: &mut [S],
) {
    let pairs = width >> 1;
    for (((pixels, luma), &cb), &cr) in out
        .chunks_exact_mut(2 * RGB_PIXEL_SIZE)
        .zip(y_row.chunks_exact(2))
        .zip(cb_row)
        .zip(cr_row)
        .take(pairs)
    {
        let (cb, cr) = (cb.index(), cr.index());
        let (cred, cgreen, cblue) = (tables.red(cr), tables.green(cb, cr), tables.blue(cb));
        let (first, second) = pixels.split_at_mut(RGB_PIXEL_SIZE);
        put_rgb(range_limit, first, luma[0].to_i32(), cred, cgreen, cblue);
        put_rgb(range_limit, second, luma[1].to_i32(), cred, cgreen, cblue);
    }
    if width & 1 != 0 {
        let col = pairs;
        let (cb, cr) = (cb_row[col].index(), cr_row[col].index());
        put_rgb(
            range_limit,
            &mut out[2 * col * RGB_PIXEL_SIZE..(2 * col + 1) * RGB_PIXEL_SIZE],
            y_row[2 * col].to_i32(),
            tables.red(cr),
            tables.green(cb, cr),
            tables.blue(cb),
        );
    }
}

/// Converts two luma rows sharing one row of chroma. Only the chroma
/// lookups are shared; the per-row work is the 1:1 vertical case.
fn merge_h2v2<S: Sample>(
    tables: &YccRgbTables,
    range_limit: &RangeLimit<S>,
    width: usize,
    y_rows: [&[S]; 2],
    cb_row: &[S],
    cr_row: &[S],
    out: [&mut [S]; 2],
) {
    let [out0, out1] = out;
    let pairs = width >> 1;
    for (col, (&cb, &cr)) in cb_row.iter().zip(cr_row).take(width.div_ceil(2)).enumerate() {
        let (cb, cr) = (cb.index(), cr.index());
        let (cred, cgreen, cblue) = (tables.red(cr), tables.green(cb, cr), tables.blue(cb));
        let luma_count = if col < pairs { 2 } else { 1 };
        for (y_row, out) in [(y_rows[0], &mut *out0), (y_rows[1], &mut *out1)] {
            for x in 2 * col..2 * col + luma_count {
                put_rgb(
                    range_limit,
                    &mut out[x * RGB_PIXEL_SIZE..(x + 1) * RGB_PIXEL_SIZE],
                    y_row[x].to_i32(),
                    cred,
                    cgreen,
                    cblue,
                );
            }
        }
    }
}

/// Upsampler for YCbCr images with 2x1 or 2x2 luma sampling and 1x1 chroma,
/// producing RGB directly.
pub struct MergedUpsampler<S: Sample> {
    tables: YccRgbTables,
    range_limit: RangeLimit<S>,
    /// 1 or 2: luma rows per chroma row.
    max_v_samp_factor: usize,
    output_width: usize,
    output_height: usize,
    out_row_width: usize,
    /// Holds the second row of a pair when the caller could take only one.
    spare_row: Vec<S>,
    spare_full: bool,
    rows_to_go: usize,
}

impl<S: Sample> MergedUpsampler<S> {
    pub fn new(geometry: &FrameGeometry) -> Self {
        let out_row_width = geometry.output_width * RGB_PIXEL_SIZE;
        let max_v = geometry.max_v_samp_factor;
        Self {
            tables: YccRgbTables::new::<S>(),
            range_limit: RangeLimit::new(),
            max_v_samp_factor: max_v,
            output_width: geometry.output_width,
            output_height: geometry.output_height,
            out_row_width,
            spare_row: if max_v == 2 {
                vec![S::default(); out_row_width]
            } else {
                vec![]
            },
            spare_full: false,
            rows_to_go: geometry.output_height,
        }
    }

    fn upsample_1v(
        &mut self,
        input: &[Image<S>],
        in_row_groups: &mut RowCursor,
        output: &mut [&mut [S]],
        out_rows: &mut RowCursor,
    ) {
        if out_rows.remaining() == 0 || self.rows_to_go == 0 {
            return;
        }
        let row = in_row_groups.position;
        merge_h2v1(
            &self.tables,
            &self.range_limit,
            self.output_width,
            input[0].row(row),
            input[1].row(row),
            input[2].row(row),
            output[out_rows.position],
        );
        out_rows.position += 1;
        self.rows_to_go -= 1;
        in_row_groups.position += 1;
    }

    fn upsample_2v(
        &mut self,
        input: &[Image<S>],
        in_row_groups: &mut RowCursor,
        output: &mut [&mut [S]],
        out_rows: &mut RowCursor,
    ) {
        if out_rows.remaining() == 0 || self.rows_to_go == 0 {
            return;
        }
        let num_rows = if self.spare_full {
            output[out_rows.position][..self.out_row_width].copy_from_slice(&self.spare_row);
            self.spare_full = false;
            1
        } else {
            let num_rows = 2.min(self.rows_to_go).min(out_rows.remaining());
            let group = in_row_groups.position;
            let y_rows = [input[0].row(group * 2), input[0].row(group * 2 + 1)];
            let (cb_row, cr_row) = (input[1].row(group), input[2].row(group));
            let (first, rest) = output[out_rows.position..].split_at_mut(1);
            let second: &mut [S] = if num_rows > 1 {
                &mut rest[0][..]
            } else {
                self.spare_full = true;
                &mut self.spare_row
            };
            merge_h2v2(
                &self.tables,
                &self.range_limit,
                self.output_width,
                y_rows,
                cb_row,
                cr_row,
                [&mut first[0][..], second],
            );
            num_rows
        };
        out_rows.position += num_rows;
        self.rows_to_go -= num_rows;
        if !self.spare_full {
            in_row_groups.position += 1;
        }
    }
}

impl<S: Sample> std::fmt::Display for MergedUpsampler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "merged h2v{} upsampling with YCbCr to RGB",
            self.max_v_samp_factor
        )
    }
}

impl<S: Sample> Upsampler<S> for MergedUpsampler<S> {
    fn start_pass(&mut self) {
        self.spare_full = false;
        self.rows_to_go = self.output_height;
    }

    fn upsample(
        &mut self,
        input: &[Image<S>],
        in_row_groups: &mut RowCursor,
        output: &mut [&mut [S]],
        out_rows: &mut RowCursor,
    ) -> Result<()> {
        if self.max_v_samp_factor == 2 {
            self.upsample_2v(input, in_row_groups, output, out_rows);
        } else {
            self.upsample_1v(input, in_row_groups, output, out_rows);
        }
        Ok(())
    }
}
