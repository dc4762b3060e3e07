// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{ColorDeconverter, RowCursor, RowGroup, Upsampler};
use crate::{
    MAX_COMPONENTS,
    component::FrameGeometry,
    error::{Error, Result},
    image::{Image, Sample},
    util::tracing_wrappers::*,
};

/// How one component is brought to full output resolution. All methods
/// replicate samples; none interpolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsampleMethod {
    /// The component is not needed by color conversion.
    Noop,
    /// Already at full resolution; rows are used in place.
    Fullsize,
    /// Each sample becomes two horizontally.
    H2V1,
    /// Each sample becomes a 2x2 block.
    H2V2,
    /// Each sample becomes an `h_expand` x `v_expand` block.
    Integral { h_expand: usize, v_expand: usize },
}

impl UpsampleMethod {
    /// Chooses the method mapping an `h_in` x `v_in` group of input samples
    /// onto an `h_out` x `v_out` group of output samples.
    pub fn select(
        component: usize,
        needed: bool,
        (h_in, v_in): (usize, usize),
        (h_out, v_out): (usize, usize),
    ) -> Result<Self> {
        if !needed {
            return Ok(UpsampleMethod::Noop);
        }
        if h_in == h_out && v_in == v_out {
            return Ok(UpsampleMethod::Fullsize);
        }
        if h_in * 2 == h_out && v_in == v_out {
            return Ok(UpsampleMethod::H2V1);
        }
        if h_in * 2 == h_out && v_in * 2 == v_out {
            return Ok(UpsampleMethod::H2V2);
        }
        if h_in > 0 && v_in > 0 && h_out % h_in == 0 && v_out % v_in == 0 {
            return Ok(UpsampleMethod::Integral {
                h_expand: h_out / h_in,
                v_expand: v_out / v_in,
            });
        }
        Err(Error::FractionalSampling {
            component,
            h_in,
            v_in,
            h_out,
            v_out,
        })
    }

    /// Method for component `component` of `geometry`, taking into account
    /// the scaling already done by the inverse DCT.
    pub fn for_component(geometry: &FrameGeometry, component: usize) -> Result<Self> {
        let comp = &geometry.components[component];
        let h_in = comp.h_samp_factor * comp.dct_h_scaled_size / geometry.min_dct_h_scaled_size;
        let v_in = comp.v_samp_factor * comp.dct_v_scaled_size / geometry.min_dct_v_scaled_size;
        Self::select(
            component,
            comp.component_needed,
            (h_in, v_in),
            (geometry.max_h_samp_factor, geometry.max_v_samp_factor),
        )
    }

    fn expansion(self) -> Option<(usize, usize)> {
        match self {
            UpsampleMethod::Noop | UpsampleMethod::Fullsize => None,
            UpsampleMethod::H2V1 => Some((2, 1)),
            UpsampleMethod::H2V2 => Some((2, 2)),
            UpsampleMethod::Integral { h_expand, v_expand } => Some((h_expand, v_expand)),
        }
    }
}

/// Doubles each sample of a row.
fn h2v1_row<S: Sample>(input: &[S], output: &mut [S]) {
    for (pair, &v) in output.chunks_exact_mut(2).zip(input) {
        pair[0] = v;
        pair[1] = v;
    }
}

fn h_expand_row<S: Sample>(input: &[S], output: &mut [S], h_expand: usize) {
    for (group, &v) in output.chunks_exact_mut(h_expand).zip(input) {
        group.fill(v);
    }
}

/// Fills `output` (one row group at full resolution, `max_v` rows) from the
/// input rows starting at `first_row`.
fn expand_row_group<S: Sample>(
    method: UpsampleMethod,
    input: &Image<S>,
    first_row: usize,
    output: &mut Image<S>,
    max_v: usize,
) {
    let Some((h_expand, v_expand)) = method.expansion() else {
        return;
    };
    let mut in_row = first_row;
    let mut out_row = 0;
    while out_row < max_v {
        match method {
            UpsampleMethod::H2V1 | UpsampleMethod::H2V2 => {
                h2v1_row(input.row(in_row), output.row_mut(out_row))
            }
            _ => h_expand_row(input.row(in_row), output.row_mut(out_row), h_expand),
        }
        output.replicate_row(out_row, out_row + 1..out_row + v_expand);
        in_row += 1;
        out_row += v_expand;
    }
}

enum ComponentUpsampler<S: Sample> {
    Noop,
    Fullsize,
    Expand {
        method: UpsampleMethod,
        color_buf: Image<S>,
    },
}

impl<S: Sample> ComponentUpsampler<S> {
    fn method(&self) -> UpsampleMethod {
        match self {
            ComponentUpsampler::Noop => UpsampleMethod::Noop,
            ComponentUpsampler::Fullsize => UpsampleMethod::Fullsize,
            ComponentUpsampler::Expand { method, .. } => *method,
        }
    }
}

/// Upsamples each component on its own, then hands full-resolution row
/// groups to a color converter.
pub struct SeparateUpsampler<S: Sample> {
    components: Vec<ComponentUpsampler<S>>,
    rowgroup_height: Vec<usize>,
    converter: Box<dyn ColorDeconverter<S>>,
    max_v_samp_factor: usize,
    output_width: usize,
    output_height: usize,
    /// Next row of the current row group to hand out; `max_v_samp_factor`
    /// when the row group is used up.
    next_row_out: usize,
    rows_to_go: usize,
}

impl<S: Sample> SeparateUpsampler<S> {
    /// Selects a method for every component and allocates the conversion
    /// buffers of the components that need one. Fails before any data is
    /// touched if a component has a fractional sampling ratio.
    pub fn new(geometry: &FrameGeometry, converter: Box<dyn ColorDeconverter<S>>) -> Result<Self> {
        if geometry.num_components() > MAX_COMPONENTS {
            return Err(Error::ComponentCount(geometry.num_components()));
        }
        let max_v = geometry.max_v_samp_factor;
        let buf_width = geometry
            .output_width
            .next_multiple_of(geometry.max_h_samp_factor);
        let mut components = Vec::with_capacity(geometry.num_components());
        let mut rowgroup_height = Vec::with_capacity(geometry.num_components());
        for comp in geometry.components.iter() {
            let method = UpsampleMethod::for_component(geometry, comp.index)?;
            debug!(component = comp.index, ?method, "upsample method");
            rowgroup_height.push(comp.row_group_height(geometry.min_dct_v_scaled_size));
            components.push(match method {
                UpsampleMethod::Noop => ComponentUpsampler::Noop,
                UpsampleMethod::Fullsize => ComponentUpsampler::Fullsize,
                method => ComponentUpsampler::Expand {
                    method,
                    color_buf: Image::new((buf_width, max_v))?,
                },
            });
        }
        Ok(Self {
            components,
            rowgroup_height,
            converter,
            max_v_samp_factor: max_v,
            output_width: geometry.output_width,
            output_height: geometry.output_height,
            next_row_out: max_v,
            rows_to_go: geometry.output_height,
        })
    }

    pub fn methods(&self) -> Vec<UpsampleMethod> {
        self.components.iter().map(|c| c.method()).collect()
    }
}

impl<S: Sample> std::fmt::Display for SeparateUpsampler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "separate upsampling {:?}", self.methods())
    }
}

impl<S: Sample> Upsampler<S> for SeparateUpsampler<S> {
    fn start_pass(&mut self) {
        self.next_row_out = self.max_v_samp_factor;
        self.rows_to_go = self.output_height;
        self.converter.start_pass();
    }

    fn upsample(
        &mut self,
        input: &[Image<S>],
        in_row_groups: &mut RowCursor,
        output: &mut [&mut [S]],
        out_rows: &mut RowCursor,
    ) -> Result<()> {
        let max_v = self.max_v_samp_factor;
        if self.next_row_out >= max_v {
            for (ci, comp) in self.components.iter_mut().enumerate() {
                if let ComponentUpsampler::Expand { method, color_buf } = comp {
                    let first_row = in_row_groups.position * self.rowgroup_height[ci];
                    expand_row_group(*method, &input[ci], first_row, color_buf, max_v);
                }
            }
            self.next_row_out = 0;
        }

        let num_rows = (max_v - self.next_row_out)
            .min(self.rows_to_go)
            .min(out_rows.remaining());
        if num_rows > 0 {
            let num_components = self.components.len();
            let mut groups = [RowGroup::Absent; MAX_COMPONENTS];
            for (ci, (group, comp)) in groups.iter_mut().zip(self.components.iter()).enumerate() {
                *group = match comp {
                    ComponentUpsampler::Noop => RowGroup::Absent,
                    ComponentUpsampler::Fullsize => RowGroup::Borrowed {
                        image: &input[ci],
                        first_row: in_row_groups.position * self.rowgroup_height[ci],
                    },
                    ComponentUpsampler::Expand { color_buf, .. } => RowGroup::Resampled(color_buf),
                };
            }
            self.converter.color_convert(
                &groups[..num_components],
                self.next_row_out,
                &mut output[out_rows.position..out_rows.position + num_rows],
                self.output_width,
            )?;
        }

        out_rows.position += num_rows;
        self.rows_to_go -= num_rows;
        self.next_row_out += num_rows;
        if self.next_row_out >= max_v {
            in_row_groups.position += 1;
        }
        Ok(())
    }
}
