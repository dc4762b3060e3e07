// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Built-in compression preprocessing: splits interleaved pixel rows into
//! component planes (converting RGB to YCbCr or grayscale when asked) and
//! downsamples them with a box filter.

use crate::{
    DCTSIZE,
    api::Preprocessor,
    component::{ComponentInfo, FrameGeometry},
    error::{Error, Result},
    headers::ColorSpace,
    image::{Image, Sample},
    render::RowCursor,
    util::tracing_wrappers::*,
};

const SCALEBITS: i32 = 16;
const ONE_HALF: i32 = 1 << (SCALEBITS - 1);

const fn fix(x: f64) -> i32 {
    (x * (1 << SCALEBITS) as f64 + 0.5) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorConversion {
    /// Components are copied as they are.
    Identity,
    RgbToYcc,
    RgbToGray,
}

impl ColorConversion {
    fn select(
        in_color_space: ColorSpace,
        jpeg_color_space: ColorSpace,
        input_components: usize,
        num_components: usize,
    ) -> Result<Self> {
        let conversion = match (in_color_space, jpeg_color_space) {
            (ColorSpace::Rgb, ColorSpace::YCbCr) => ColorConversion::RgbToYcc,
            (ColorSpace::Rgb, ColorSpace::Grayscale) => ColorConversion::RgbToGray,
            (from, to) if from == to || from == ColorSpace::Unknown => ColorConversion::Identity,
            (from, to) => return Err(Error::UnsupportedColorConversion(from, to)),
        };
        let expected_input = match conversion {
            ColorConversion::Identity => num_components,
            ColorConversion::RgbToYcc | ColorConversion::RgbToGray => 3,
        };
        if input_components != expected_input {
            return Err(Error::UnsupportedColorConversion(in_color_space, jpeg_color_space));
        }
        Ok(conversion)
    }
}

/// Converts `rows` of interleaved pixels into rows `first_row..` of the
/// component planes in `output`.
fn color_convert<S: Sample>(
    conversion: ColorConversion,
    input_components: usize,
    width: usize,
    rows: &[&[S]],
    output: &mut [&mut Image<S>],
    first_row: usize,
) {
    let center = S::CENTER << SCALEBITS;
    for (r, row) in rows.iter().enumerate() {
        let out_row = first_row + r;
        match conversion {
            ColorConversion::Identity => {
                for (c, plane) in output.iter_mut().enumerate() {
                    let dst = plane.row_mut(out_row);
                    for (x, pixel) in row.chunks_exact(input_components).take(width).enumerate() {
                        dst[x] = pixel[c];
                    }
                }
            }
            ColorConversion::RgbToYcc => {
                for (x, pixel) in row.chunks_exact(3).take(width).enumerate() {
                    let (r, g, b) = (pixel[0].to_i32(), pixel[1].to_i32(), pixel[2].to_i32());
                    let y = (fix(0.29900) * r + fix(0.58700) * g + fix(0.11400) * b + ONE_HALF)
                        >> SCALEBITS;
                    let cb = (-fix(0.16874) * r - fix(0.33126) * g
                        + fix(0.50000) * b
                        + center
                        + ONE_HALF
                        - 1)
                        >> SCALEBITS;
                    let cr = (fix(0.50000) * r - fix(0.41869) * g - fix(0.08131) * b
                        + center
                        + ONE_HALF
                        - 1)
                        >> SCALEBITS;
                    output[0].row_mut(out_row)[x] = S::from_i32(y);
                    output[1].row_mut(out_row)[x] = S::from_i32(cb);
                    output[2].row_mut(out_row)[x] = S::from_i32(cr);
                }
            }
            ColorConversion::RgbToGray => {
                let dst = output[0].row_mut(out_row);
                for (x, pixel) in row.chunks_exact(3).take(width).enumerate() {
                    let (r, g, b) = (pixel[0].to_i32(), pixel[1].to_i32(), pixel[2].to_i32());
                    let y = (fix(0.29900) * r + fix(0.58700) * g + fix(0.11400) * b + ONE_HALF)
                        >> SCALEBITS;
                    dst[x] = S::from_i32(y);
                }
            }
        }
    }
}

/// Replicates the last real column of `rows` rows into the padding columns.
fn expand_right_edge<S: Sample>(
    image: &mut Image<S>,
    rows: std::ops::Range<usize>,
    input_cols: usize,
    output_cols: usize,
) {
    if input_cols == 0 || output_cols <= input_cols {
        return;
    }
    for y in rows {
        let row = image.row_mut(y);
        let last = row[input_cols - 1];
        row[input_cols..output_cols].fill(last);
    }
}

fn expand_bottom_edge<S: Sample>(image: &mut Image<S>, input_rows: usize, output_rows: usize) {
    if input_rows > 0 && output_rows > input_rows {
        image.replicate_row(input_rows - 1, input_rows..output_rows);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsampleMethod {
    Fullsize,
    /// Averages horizontal pairs, with a bias alternating between 0 and 1.
    H2V1,
    /// Averages 2x2 blocks, with a bias alternating between 1 and 2.
    H2V2,
    Integral { h_expand: usize, v_expand: usize },
}

impl DownsampleMethod {
    pub fn select(geometry: &FrameGeometry, comp: &ComponentInfo) -> Result<Self> {
        let (h_in, v_in) = (geometry.max_h_samp_factor, geometry.max_v_samp_factor);
        let (h_out, v_out) = (comp.h_samp_factor, comp.v_samp_factor);
        Ok(if h_in == h_out && v_in == v_out {
            DownsampleMethod::Fullsize
        } else if h_in == h_out * 2 && v_in == v_out {
            DownsampleMethod::H2V1
        } else if h_in == h_out * 2 && v_in == v_out * 2 {
            DownsampleMethod::H2V2
        } else if h_in % h_out == 0 && v_in % v_out == 0 {
            DownsampleMethod::Integral {
                h_expand: h_in / h_out,
                v_expand: v_in / v_out,
            }
        } else {
            return Err(Error::FractionalSampling {
                component: comp.index,
                h_in,
                v_in,
                h_out,
                v_out,
            });
        })
    }

    fn expansion(self) -> (usize, usize) {
        match self {
            DownsampleMethod::Fullsize => (1, 1),
            DownsampleMethod::H2V1 => (2, 1),
            DownsampleMethod::H2V2 => (2, 2),
            DownsampleMethod::Integral { h_expand, v_expand } => (h_expand, v_expand),
        }
    }
}

/// Downsamples one row group: the `max_v` rows of `input` become
/// `output_rows` rows of `output` starting at `first_out_row`, each
/// `output_cols` samples wide.
fn downsample<S: Sample>(
    method: DownsampleMethod,
    input: &mut Image<S>,
    image_width: usize,
    output: &mut Image<S>,
    first_out_row: usize,
    output_rows: usize,
    output_cols: usize,
) {
    let (h_expand, v_expand) = method.expansion();
    expand_right_edge(input, 0..input.height(), image_width, output_cols * h_expand);
    for out_y in 0..output_rows {
        let dst = output.row_mut(first_out_row + out_y);
        match method {
            DownsampleMethod::Fullsize => {
                dst[..output_cols].copy_from_slice(&input.row(out_y)[..output_cols]);
            }
            DownsampleMethod::H2V1 => {
                let src = input.row(out_y);
                let mut bias = 0;
                for (x, out) in dst.iter_mut().enumerate().take(output_cols) {
                    *out = S::from_i32((src[2 * x].to_i32() + src[2 * x + 1].to_i32() + bias) >> 1);
                    bias ^= 1;
                }
            }
            DownsampleMethod::H2V2 => {
                let (src0, src1) = (input.row(2 * out_y), input.row(2 * out_y + 1));
                let mut bias = 1;
                for (x, out) in dst.iter_mut().enumerate().take(output_cols) {
                    let sum = src0[2 * x].to_i32()
                        + src0[2 * x + 1].to_i32()
                        + src1[2 * x].to_i32()
                        + src1[2 * x + 1].to_i32();
                    *out = S::from_i32((sum + bias) >> 2);
                    bias ^= 3;
                }
            }
            DownsampleMethod::Integral { .. } => {
                let numpix = (h_expand * v_expand) as i32;
                for (x, out) in dst.iter_mut().enumerate().take(output_cols) {
                    let mut sum = 0;
                    for v in 0..v_expand {
                        let src = input.row(out_y * v_expand + v);
                        sum += src[x * h_expand..(x + 1) * h_expand]
                            .iter()
                            .map(|s| s.to_i32())
                            .sum::<i32>();
                    }
                    *out = S::from_i32((sum + numpix / 2) / numpix);
                }
            }
        }
    }
}

struct ComponentState<S: Sample> {
    method: DownsampleMethod,
    /// Full-resolution rows of one row group.
    color_buf: Image<S>,
    output_cols: usize,
    rows_per_group: usize,
}

/// Color conversion plus downsampling, filling one iMCU row of component
/// row groups at a time.
pub struct PlanarPreprocessor<S: Sample> {
    conversion: ColorConversion,
    input_components: usize,
    components: Vec<ComponentState<S>>,
    image_width: usize,
    max_v_samp_factor: usize,
    next_buf_row: usize,
    rows_to_go: usize,
}

impl<S: Sample> PlanarPreprocessor<S> {
    pub fn new(
        in_color_space: ColorSpace,
        jpeg_color_space: ColorSpace,
        input_components: usize,
        num_components: usize,
    ) -> Result<Self> {
        let conversion = ColorConversion::select(
            in_color_space,
            jpeg_color_space,
            input_components,
            num_components,
        )?;
        Ok(Self {
            conversion,
            input_components,
            components: vec![],
            image_width: 0,
            max_v_samp_factor: 1,
            next_buf_row: 0,
            rows_to_go: 0,
        })
    }

    pub fn methods(&self) -> Vec<DownsampleMethod> {
        self.components.iter().map(|c| c.method).collect()
    }
}

impl<S: Sample> Preprocessor<S> for PlanarPreprocessor<S> {
    #[instrument(level = "debug", skip_all, err)]
    fn start_pass(&mut self, geometry: &FrameGeometry) -> Result<()> {
        self.components = geometry
            .components
            .iter()
            .map(|comp| {
                let method = DownsampleMethod::select(geometry, comp)?;
                let width =
                    comp.width_in_blocks * DCTSIZE * geometry.max_h_samp_factor / comp.h_samp_factor;
                Ok(ComponentState {
                    method,
                    color_buf: Image::new((width.max(geometry.image_width), geometry.max_v_samp_factor))?,
                    output_cols: comp.width_in_blocks * DCTSIZE,
                    rows_per_group: comp.row_group_height(geometry.min_dct_v_scaled_size),
                })
            })
            .collect::<Result<_>>()?;
        debug!(methods = ?self.methods(), "downsampling");
        self.image_width = geometry.image_width;
        self.max_v_samp_factor = geometry.max_v_samp_factor;
        self.next_buf_row = 0;
        self.rows_to_go = geometry.image_height;
        Ok(())
    }

    fn pre_process(
        &mut self,
        input: &[&[S]],
        in_rows: &mut RowCursor,
        output: &mut [Image<S>],
        out_row_groups: &mut RowCursor,
    ) -> Result<()> {
        let needed = self.image_width * self.input_components;
        let max_v = self.max_v_samp_factor;
        while !in_rows.is_full() && !out_row_groups.is_full() {
            let numrows = (max_v - self.next_buf_row).min(in_rows.remaining());
            let rows = &input[in_rows.position..in_rows.position + numrows];
            if let Some(short) = rows.iter().find(|row| row.len() < needed) {
                return Err(Error::RowTooShort {
                    needed,
                    available: short.len(),
                });
            }
            let mut color_bufs: Vec<&mut Image<S>> =
                self.components.iter_mut().map(|c| &mut c.color_buf).collect();
            color_convert(
                self.conversion,
                self.input_components,
                self.image_width,
                rows,
                &mut color_bufs,
                self.next_buf_row,
            );
            in_rows.position += numrows;
            self.next_buf_row += numrows;
            self.rows_to_go -= numrows;

            if self.rows_to_go == 0 && self.next_buf_row < max_v {
                for comp in self.components.iter_mut() {
                    expand_bottom_edge(&mut comp.color_buf, self.next_buf_row, max_v);
                }
                self.next_buf_row = max_v;
            }

            if self.next_buf_row == max_v {
                for (comp, plane) in self.components.iter_mut().zip(output.iter_mut()) {
                    downsample(
                        comp.method,
                        &mut comp.color_buf,
                        self.image_width,
                        plane,
                        out_row_groups.position * comp.rows_per_group,
                        comp.rows_per_group,
                        comp.output_cols,
                    );
                }
                self.next_buf_row = 0;
                out_row_groups.position += 1;
            }

            if self.rows_to_go == 0 && !out_row_groups.is_full() {
                for (comp, plane) in self.components.iter().zip(output.iter_mut()) {
                    expand_bottom_edge(
                        plane,
                        out_row_groups.position * comp.rows_per_group,
                        out_row_groups.limit * comp.rows_per_group,
                    );
                }
                out_row_groups.position = out_row_groups.limit;
                break;
            }
        }
        Ok(())
    }
}
