// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{ColorDeconverter, RowGroup};
use crate::{
    error::{Error, Result},
    headers::ColorSpace,
    image::Sample,
};

/// Fractional bits of the fixed-point color conversion tables.
pub const SCALEBITS: i32 = 16;
const ONE_HALF: i32 = 1 << (SCALEBITS - 1);

const fn fix(x: f64) -> i32 {
    (x * (1i64 << SCALEBITS) as f64 + 0.5) as i32
}

/// Chroma contributions of YCbCr to RGB conversion (full-range BT.601, as
/// in JFIF), for every sample value:
///
/// ```text
/// R = Y                + 1.40200 * Cr
/// G = Y - 0.34414 * Cb - 0.71414 * Cr
/// B = Y + 1.77200 * Cb
/// ```
///
/// with Cb and Cr centered on zero. Red and blue entries are already
/// rounded; the green entries are kept scaled so that the two halves can be
/// summed before the final shift.
#[derive(Debug, Clone)]
pub struct YccRgbTables {
    cr_r: Vec<i32>,
    cb_b: Vec<i32>,
    cr_g: Vec<i32>,
    cb_g: Vec<i32>,
}

impl YccRgbTables {
    pub fn new<S: Sample>() -> Self {
        let size = (S::MAX_VALUE + 1) as usize;
        let mut tables = Self {
            cr_r: Vec::with_capacity(size),
            cb_b: Vec::with_capacity(size),
            cr_g: Vec::with_capacity(size),
            cb_g: Vec::with_capacity(size),
        };
        for i in 0..=S::MAX_VALUE {
            let x = i - S::CENTER;
            tables.cr_r.push((fix(1.40200) * x + ONE_HALF) >> SCALEBITS);
            tables.cb_b.push((fix(1.77200) * x + ONE_HALF) >> SCALEBITS);
            tables.cr_g.push(-fix(0.71414) * x);
            // The rounding bias for green is folded into this half.
            tables.cb_g.push(-fix(0.34414) * x + ONE_HALF);
        }
        tables
    }

    #[inline(always)]
    pub fn red(&self, cr: usize) -> i32 {
        self.cr_r[cr]
    }

    #[inline(always)]
    pub fn green(&self, cb: usize, cr: usize) -> i32 {
        (self.cb_g[cb] + self.cr_g[cr]) >> SCALEBITS
    }

    #[inline(always)]
    pub fn blue(&self, cb: usize) -> i32 {
        self.cb_b[cb]
    }
}

/// Clamps values in `-(MAX + 1)..2 * (MAX + 1)` to the sample range with a
/// table lookup.
#[derive(Debug, Clone)]
pub struct RangeLimit<S: Sample> {
    table: Vec<S>,
}

impl<S: Sample> Default for RangeLimit<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> RangeLimit<S> {
    const OFFSET: i32 = S::MAX_VALUE + 1;

    pub fn new() -> Self {
        let table = (-Self::OFFSET..2 * Self::OFFSET)
            .map(|v| S::from_i32(v.clamp(0, S::MAX_VALUE)))
            .collect();
        Self { table }
    }

    #[inline(always)]
    pub fn limit(&self, v: i32) -> S {
        self.table[(v + Self::OFFSET) as usize]
    }
}

/// Writes one pixel from a luma value and precomputed chroma deltas.
#[inline(always)]
pub(crate) fn put_rgb<S: Sample>(
    range_limit: &RangeLimit<S>,
    pixel: &mut [S],
    y: i32,
    cred: i32,
    cgreen: i32,
    cblue: i32,
) {
    pixel[0] = range_limit.limit(y + cred);
    pixel[1] = range_limit.limit(y + cgreen);
    pixel[2] = range_limit.limit(y + cblue);
}

/// YCbCr to RGB on full-resolution components.
pub struct YccRgbConverter<S: Sample> {
    tables: YccRgbTables,
    range_limit: RangeLimit<S>,
}

impl<S: Sample> Default for YccRgbConverter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> YccRgbConverter<S> {
    pub fn new() -> Self {
        Self {
            tables: YccRgbTables::new::<S>(),
            range_limit: RangeLimit::new(),
        }
    }
}

impl<S: Sample> std::fmt::Display for YccRgbConverter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "YCbCr to RGB")
    }
}

impl<S: Sample> ColorDeconverter<S> for YccRgbConverter<S> {
    fn out_color_components(&self) -> usize {
        3
    }

    fn color_convert(
        &mut self,
        input: &[RowGroup<'_, S>],
        input_row: usize,
        output: &mut [&mut [S]],
        output_width: usize,
    ) -> Result<()> {
        let [y_group, cb_group, cr_group] = input else {
            return Err(Error::ConverterComponents {
                expected: 3,
                found: input.len(),
            });
        };
        for (row, out) in output.iter_mut().enumerate() {
            let y_row = y_group.row(input_row + row);
            let cb_row = cb_group.row(input_row + row);
            let cr_row = cr_group.row(input_row + row);
            for (((pixel, &y), &cb), &cr) in out
                .chunks_exact_mut(3)
                .zip(y_row)
                .zip(cb_row)
                .zip(cr_row)
                .take(output_width)
            {
                let (cb, cr) = (cb.index(), cr.index());
                put_rgb(
                    &self.range_limit,
                    pixel,
                    y.to_i32(),
                    self.tables.red(cr),
                    self.tables.green(cb, cr),
                    self.tables.blue(cb),
                );
            }
        }
        Ok(())
    }
}

fn luma<'a, 'b, S: Sample>(input: &'a [RowGroup<'b, S>]) -> Result<&'a RowGroup<'b, S>> {
    input.first().ok_or(Error::ConverterComponents {
        expected: 1,
        found: 0,
    })
}

/// Luma only: copies the first component and ignores the rest.
pub struct GrayscaleConverter;

impl<S: Sample> ColorDeconverter<S> for GrayscaleConverter {
    fn out_color_components(&self) -> usize {
        1
    }

    fn component_needed(&self, component: usize) -> bool {
        component == 0
    }

    fn color_convert(
        &mut self,
        input: &[RowGroup<'_, S>],
        input_row: usize,
        output: &mut [&mut [S]],
        output_width: usize,
    ) -> Result<()> {
        let gray = luma(input)?;
        for (row, out) in output.iter_mut().enumerate() {
            out[..output_width].copy_from_slice(&gray.row(input_row + row)[..output_width]);
        }
        Ok(())
    }
}

/// Grayscale to RGB by replicating luma into all three channels.
pub struct GrayRgbConverter;

impl<S: Sample> ColorDeconverter<S> for GrayRgbConverter {
    fn out_color_components(&self) -> usize {
        3
    }

    fn color_convert(
        &mut self,
        input: &[RowGroup<'_, S>],
        input_row: usize,
        output: &mut [&mut [S]],
        output_width: usize,
    ) -> Result<()> {
        let gray = luma(input)?;
        for (row, out) in output.iter_mut().enumerate() {
            let gray_row = gray.row(input_row + row);
            for (pixel, &g) in out.chunks_exact_mut(3).zip(gray_row).take(output_width) {
                pixel.fill(g);
            }
        }
        Ok(())
    }
}

/// Interleaves components unchanged.
pub struct NullConverter {
    num_components: usize,
}

impl NullConverter {
    pub fn new(num_components: usize) -> Self {
        Self { num_components }
    }
}

impl<S: Sample> ColorDeconverter<S> for NullConverter {
    fn out_color_components(&self) -> usize {
        self.num_components
    }

    fn color_convert(
        &mut self,
        input: &[RowGroup<'_, S>],
        input_row: usize,
        output: &mut [&mut [S]],
        output_width: usize,
    ) -> Result<()> {
        let n = self.num_components;
        if input.len() < n {
            return Err(Error::ConverterComponents {
                expected: n,
                found: input.len(),
            });
        }
        for (row, out) in output.iter_mut().enumerate() {
            for (c, group) in input.iter().enumerate().take(n) {
                let src = group.row(input_row + row);
                for (x, &v) in src.iter().take(output_width).enumerate() {
                    out[x * n + c] = v;
                }
            }
        }
        Ok(())
    }
}

/// Picks the built-in converter for a file color space and requested output
/// color space.
pub fn select_color_deconverter<S: Sample>(
    jpeg_color_space: ColorSpace,
    out_color_space: ColorSpace,
    num_components: usize,
) -> Result<Box<dyn ColorDeconverter<S>>> {
    let expect = |n: usize| {
        if num_components == n {
            Ok(())
        } else {
            Err(Error::UnsupportedColorConversion(
                jpeg_color_space,
                out_color_space,
            ))
        }
    };
    Ok(match (jpeg_color_space, out_color_space) {
        (ColorSpace::YCbCr, ColorSpace::Rgb) => {
            expect(3)?;
            Box::new(YccRgbConverter::<S>::new())
        }
        (ColorSpace::Grayscale | ColorSpace::YCbCr, ColorSpace::Grayscale) => {
            Box::new(GrayscaleConverter)
        }
        (ColorSpace::Grayscale, ColorSpace::Rgb) => {
            expect(1)?;
            Box::new(GrayRgbConverter)
        }
        (ColorSpace::Unknown, ColorSpace::Unknown) => Box::new(NullConverter::new(num_components)),
        (from, to) if from == to => {
            expect(from.num_components().unwrap_or(num_components))?;
            Box::new(NullConverter::new(num_components))
        }
        (from, to) => return Err(Error::UnsupportedColorConversion(from, to)),
    })
}
