// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Chooses the stage implementations for one image. Every decision here is
//! made once, when a pass sequence starts, and never revisited mid-pass.

use crate::{
    DCTSIZE2, MAX_COMPS_IN_SCAN,
    component::FrameGeometry,
    error::{Error, Result},
    headers::{ColorSpace, ScanHeader},
    image::Sample,
    options::{CompressOptions, DecompressOptions},
    render::{
        ColorDeconverter, MergedUpsampler, SeparateUpsampler, Upsampler, select_color_deconverter,
    },
    util::tracing_wrappers::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyCoding {
    Huffman,
    Arithmetic,
}

impl EntropyCoding {
    pub fn select(arith_code: bool) -> Self {
        if arith_code {
            EntropyCoding::Arithmetic
        } else {
            EntropyCoding::Huffman
        }
    }
}

/// How many coefficients the coefficient controller keeps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefBuffering {
    /// One iMCU row at a time; enough for single-pass processing.
    SingleImcuRow,
    /// The whole image, for multi-scan or multi-pass processing.
    FullImage,
}

impl CoefBuffering {
    /// Compression needs the whole image whenever a pass has to revisit
    /// coefficients: several scans, or a statistics pass before output.
    pub fn for_compress(num_scans: usize, optimize_coding: bool) -> Self {
        if num_scans > 1 || optimize_coding {
            CoefBuffering::FullImage
        } else {
            CoefBuffering::SingleImcuRow
        }
    }

    pub fn for_decompress(has_multiple_scans: bool, buffered_image: bool) -> Self {
        if has_multiple_scans || buffered_image {
            CoefBuffering::FullImage
        } else {
            CoefBuffering::SingleImcuRow
        }
    }
}

/// Whether the merged upsampler can produce this output. It handles YCbCr
/// with 2x1 or 2x2 luma and 1x1 chroma, converted to RGB by the built-in
/// converter, with no scaling by the inverse DCT.
pub fn use_merged_upsample(
    options: &DecompressOptions,
    geometry: &FrameGeometry,
    jpeg_color_space: ColorSpace,
    out_color_space: ColorSpace,
    custom_converter: bool,
) -> bool {
    if options.do_fancy_upsampling || options.ccir601_sampling || custom_converter {
        return false;
    }
    if jpeg_color_space != ColorSpace::YCbCr
        || out_color_space != ColorSpace::Rgb
        || geometry.num_components() != 3
    {
        return false;
    }
    let [y, cb, cr] = &geometry.components[..] else {
        return false;
    };
    if y.h_samp_factor != 2
        || y.v_samp_factor > 2
        || cb.h_samp_factor != 1
        || cb.v_samp_factor != 1
        || cr.h_samp_factor != 1
        || cr.v_samp_factor != 1
    {
        return false;
    }
    !geometry.has_scaled_components()
}

/// The output side of a decompression pipeline: one upsampler feeding one
/// color converter (or the merged stage doing both).
pub struct OutputPipeline<S: Sample> {
    pub upsampler: Box<dyn Upsampler<S>>,
    pub merged: bool,
    pub out_color_space: ColorSpace,
    pub out_color_components: usize,
}

impl<S: Sample> std::fmt::Debug for OutputPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPipeline")
            .field("merged", &self.merged)
            .field("out_color_space", &self.out_color_space)
            .field("out_color_components", &self.out_color_components)
            .finish()
    }
}

/// Computes the output geometry and builds the upsampling and color
/// conversion stages. Marks the components the converter does not read as
/// not needed, so that neither the upsampler nor the inverse DCT touches
/// them. Fails before any sample is processed if a component cannot be
/// upsampled.
pub fn build_output_pipeline<S: Sample>(
    options: &DecompressOptions,
    geometry: &mut FrameGeometry,
    jpeg_color_space: ColorSpace,
    custom_converter: Option<Box<dyn ColorDeconverter<S>>>,
) -> Result<OutputPipeline<S>> {
    if options.ccir601_sampling {
        return Err(Error::Ccir601NotImplemented);
    }
    let out_color_space = options
        .out_color_space
        .unwrap_or_else(|| DecompressOptions::default_out_color_space(jpeg_color_space));
    geometry.calc_output_dimensions(options.do_fancy_upsampling);

    if use_merged_upsample(
        options,
        geometry,
        jpeg_color_space,
        out_color_space,
        custom_converter.is_some(),
    ) {
        let upsampler = MergedUpsampler::<S>::new(geometry);
        debug!(%upsampler, "output pipeline");
        return Ok(OutputPipeline {
            upsampler: Box::new(upsampler),
            merged: true,
            out_color_space,
            out_color_components: 3,
        });
    }

    let converter = match custom_converter {
        Some(converter) => converter,
        None => select_color_deconverter::<S>(
            jpeg_color_space,
            out_color_space,
            geometry.num_components(),
        )?,
    };
    for comp in geometry.components.iter_mut() {
        comp.component_needed = converter.component_needed(comp.index);
    }
    let out_color_components = converter.out_color_components();
    let upsampler = SeparateUpsampler::new(geometry, converter)?;
    debug!(%upsampler, "output pipeline");
    Ok(OutputPipeline {
        upsampler: Box::new(upsampler),
        merged: false,
        out_color_space,
        out_color_components,
    })
}

/// Compression-side decisions derived from the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressPlan {
    pub entropy: EntropyCoding,
    pub buffering: CoefBuffering,
    pub progressive: bool,
    pub scans: Vec<ScanHeader>,
}

/// The script used when none is given: one sequential scan holding every
/// component, or one scan per component when they do not fit in one.
pub fn default_scan_script(num_components: usize) -> Vec<ScanHeader> {
    if num_components <= MAX_COMPS_IN_SCAN {
        vec![ScanHeader::sequential((0..num_components).collect())]
    } else {
        (0..num_components)
            .map(|c| ScanHeader::sequential(vec![c]))
            .collect()
    }
}

#[instrument(level = "debug", skip_all, err)]
pub fn plan_compression(
    options: &CompressOptions,
    geometry: &FrameGeometry,
    data_precision: u32,
) -> Result<CompressPlan> {
    let scans = match &options.scan_script {
        Some(scans) => scans.clone(),
        None => default_scan_script(geometry.num_components()),
    };
    let max_ah_al = if data_precision <= 8 { 10 } else { 13 };
    let progressive = validate_scan_script(geometry.num_components(), &scans, max_ah_al)?;
    let entropy = EntropyCoding::select(options.arith_code);
    let buffering = CoefBuffering::for_compress(scans.len(), options.optimize_coding);
    debug!(?entropy, ?buffering, progressive, num_scans = scans.len(), "compression plan");
    Ok(CompressPlan {
        entropy,
        buffering,
        progressive,
        scans,
    })
}

/// Checks a scan script and reports whether it is progressive. `max_ah_al`
/// bounds the successive-approximation bit positions. A script is
/// progressive if its first scan is not a full sequential scan.
///
/// Sequential scripts must send each component exactly once. Progressive
/// scripts must send DC before AC for each component, keep DC and AC in
/// separate scans, put only one component in each AC scan, and refine each
/// coefficient one bit at a time; at least the DC of every component must be
/// sent.
pub fn validate_scan_script(num_components: usize, scans: &[ScanHeader], max_ah_al: u8) -> Result<bool> {
    let bad = |scan, reason| Error::InvalidScanScript { scan, reason };
    let Some(first) = scans.first() else {
        return Err(bad(0, "empty scan script"));
    };
    let progressive = first.is_progressive();
    // Last successive-approximation bit sent per component and coefficient.
    let mut last_bitpos = vec![[None::<u8>; DCTSIZE2]; num_components];
    let mut component_sent = vec![false; num_components];

    for (index, scan) in scans.iter().enumerate() {
        let n = scan.component_indices.len();
        if n == 0 || n > MAX_COMPS_IN_SCAN {
            return Err(bad(index, "bad number of components"));
        }
        for (pos, &c) in scan.component_indices.iter().enumerate() {
            if c >= num_components {
                return Err(bad(index, "component index out of range"));
            }
            if pos > 0 && c <= scan.component_indices[pos - 1] {
                return Err(bad(index, "component indices not increasing"));
            }
        }
        let (ss, se, ah, al) = (scan.ss as usize, scan.se as usize, scan.ah, scan.al);
        if !progressive {
            if scan.is_progressive() {
                return Err(bad(index, "progression parameters in sequential script"));
            }
            for &c in scan.component_indices.iter() {
                if component_sent[c] {
                    return Err(bad(index, "component sent twice"));
                }
                component_sent[c] = true;
            }
            continue;
        }
        if ss >= DCTSIZE2 || se < ss || se >= DCTSIZE2 || ah > max_ah_al || al > max_ah_al {
            return Err(bad(index, "bad progression parameters"));
        }
        if ss == 0 {
            if se != 0 {
                return Err(bad(index, "DC and AC coefficients in one scan"));
            }
        } else if n != 1 {
            return Err(bad(index, "AC scan with several components"));
        }
        for &c in scan.component_indices.iter() {
            let bitpos = &mut last_bitpos[c];
            if ss != 0 && bitpos[0].is_none() {
                return Err(bad(index, "AC scan before DC scan"));
            }
            for coef in ss..=se {
                match bitpos[coef] {
                    None if ah != 0 => return Err(bad(index, "refinement of unsent coefficient")),
                    Some(last) if ah != last || al + 1 != ah => {
                        return Err(bad(index, "refinement out of sequence"));
                    }
                    _ => {}
                }
                bitpos[coef] = Some(al);
            }
        }
    }

    let complete = if progressive {
        last_bitpos.iter().all(|bits| bits[0].is_some())
    } else {
        component_sent.iter().all(|&sent| sent)
    };
    if !complete {
        return Err(bad(scans.len(), "component never sent"));
    }
    Ok(progressive)
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::{
        headers::{ComponentSpec, simple_progression},
        render::{GrayscaleConverter, UpsampleMethod},
    };

    fn ycc(y_h: usize, y_v: usize) -> FrameGeometry {
        FrameGeometry::new(
            40,
            24,
            &[
                ComponentSpec::new(1, y_h, y_v, 0),
                ComponentSpec::new(2, 1, 1, 1),
                ComponentSpec::new(3, 1, 1, 1),
            ],
        )
        .unwrap()
    }

    fn plain_options() -> DecompressOptions {
        DecompressOptions {
            do_fancy_upsampling: false,
            ..DecompressOptions::default()
        }
    }

    #[test]
    fn merged_only_for_plain_ycc_to_rgb() {
        let options = plain_options();
        let mut geometry = ycc(2, 2);
        geometry.calc_output_dimensions(false);
        let merged = use_merged_upsample;
        assert!(merged(&options, &geometry, ColorSpace::YCbCr, ColorSpace::Rgb, false));
        assert!(!merged(&options, &geometry, ColorSpace::YCbCr, ColorSpace::Rgb, true));
        assert!(!merged(&options, &geometry, ColorSpace::YCbCr, ColorSpace::Grayscale, false));
        assert!(!merged(&options, &geometry, ColorSpace::Rgb, ColorSpace::Rgb, false));
        let fancy = DecompressOptions::default();
        assert!(!merged(&fancy, &geometry, ColorSpace::YCbCr, ColorSpace::Rgb, false));

        let mut h2v1 = ycc(2, 1);
        h2v1.calc_output_dimensions(false);
        assert!(merged(&options, &h2v1, ColorSpace::YCbCr, ColorSpace::Rgb, false));
        for (h, v) in [(1, 1), (1, 2), (4, 1), (2, 4)] {
            let Ok(mut geometry) = FrameGeometry::new(
                40,
                24,
                &[
                    ComponentSpec::new(1, h, v, 0),
                    ComponentSpec::new(2, 1, 1, 1),
                    ComponentSpec::new(3, 1, 1, 1),
                ],
            ) else {
                continue;
            };
            geometry.calc_output_dimensions(false);
            assert!(
                !merged(&options, &geometry, ColorSpace::YCbCr, ColorSpace::Rgb, false),
                "{h}x{v}"
            );
        }
    }

    #[test]
    fn builds_merged_or_separate() -> Result<()> {
        let mut geometry = ycc(2, 2);
        let pipeline = build_output_pipeline::<u8>(&plain_options(), &mut geometry, ColorSpace::YCbCr, None)?;
        assert!(pipeline.merged);
        assert_eq!(pipeline.out_color_space, ColorSpace::Rgb);
        assert_eq!(pipeline.out_color_components, 3);

        let mut geometry = ycc(2, 2);
        let pipeline =
            build_output_pipeline::<u8>(&DecompressOptions::default(), &mut geometry, ColorSpace::YCbCr, None)?;
        assert!(!pipeline.merged);
        // The inverse DCT does the 2x enlargement itself.
        assert!(geometry.has_scaled_components());
        for ci in 0..3 {
            assert_eq!(
                UpsampleMethod::for_component(&geometry, ci)?,
                UpsampleMethod::Fullsize
            );
        }
        Ok(())
    }

    #[test]
    fn unneeded_components_are_marked() -> Result<()> {
        let mut geometry = ycc(2, 2);
        let pipeline = build_output_pipeline::<u8>(
            &plain_options(),
            &mut geometry,
            ColorSpace::YCbCr,
            Some(Box::new(GrayscaleConverter)),
        )?;
        assert!(!pipeline.merged);
        assert_eq!(pipeline.out_color_components, 1);
        let needed: Vec<bool> = geometry.components.iter().map(|c| c.component_needed).collect();
        assert_eq!(needed, [true, false, false]);
        Ok(())
    }

    #[test]
    fn rejects_before_processing() {
        let mut geometry = ycc(2, 2);
        let options = DecompressOptions {
            ccir601_sampling: true,
            ..plain_options()
        };
        assert!(matches!(
            build_output_pipeline::<u8>(&options, &mut geometry, ColorSpace::YCbCr, None),
            Err(Error::Ccir601NotImplemented)
        ));

        let mut geometry = FrameGeometry::new(
            30,
            30,
            &[
                ComponentSpec::new(1, 3, 1, 0),
                ComponentSpec::new(2, 2, 1, 1),
                ComponentSpec::new(3, 2, 1, 1),
            ],
        )
        .unwrap();
        assert!(matches!(
            build_output_pipeline::<u8>(&plain_options(), &mut geometry, ColorSpace::YCbCr, None),
            Err(Error::FractionalSampling { component: 1, .. })
        ));
    }

    #[test]
    fn buffering_modes() {
        assert_eq!(CoefBuffering::for_compress(1, false), CoefBuffering::SingleImcuRow);
        assert_eq!(CoefBuffering::for_compress(1, true), CoefBuffering::FullImage);
        assert_eq!(CoefBuffering::for_compress(3, false), CoefBuffering::FullImage);
        assert_eq!(CoefBuffering::for_decompress(false, false), CoefBuffering::SingleImcuRow);
        assert_eq!(CoefBuffering::for_decompress(false, true), CoefBuffering::FullImage);
        assert_eq!(EntropyCoding::select(true), EntropyCoding::Arithmetic);
    }

    #[test]
    fn scan_scripts() {
        assert_eq!(validate_scan_script(3, &default_scan_script(3), 13).ok(), Some(false));
        assert_eq!(default_scan_script(5).len(), 5);
        assert_eq!(validate_scan_script(5, &default_scan_script(5), 13).ok(), Some(false));
        let progression = simple_progression(3, ColorSpace::YCbCr);
        assert_eq!(validate_scan_script(3, &progression, 13).ok(), Some(true));
        let progression = simple_progression(5, ColorSpace::Unknown);
        assert_eq!(validate_scan_script(5, &progression, 13).ok(), Some(true));

        let scan = |c: Vec<usize>, ss, se, ah, al| ScanHeader {
            component_indices: c,
            ss,
            se,
            ah,
            al,
        };
        let reason = |scans: &[ScanHeader], n| match validate_scan_script(n, scans, 13) {
            Err(Error::InvalidScanScript { reason, .. }) => reason,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(reason(&[], 1), "empty scan script");
        assert_eq!(
            reason(&[ScanHeader::sequential(vec![0]), ScanHeader::sequential(vec![0])], 1),
            "component sent twice"
        );
        assert_eq!(reason(&[ScanHeader::sequential(vec![0])], 2), "component never sent");
        assert_eq!(reason(&[ScanHeader::sequential(vec![1, 0])], 2), "component indices not increasing");
        assert_eq!(reason(&[scan(vec![0], 0, 5, 0, 0)], 1), "DC and AC coefficients in one scan");
        assert_eq!(reason(&[scan(vec![0], 1, 5, 0, 0)], 1), "AC scan before DC scan");
        assert_eq!(
            reason(&[scan(vec![0, 1], 0, 0, 0, 0), scan(vec![0, 1], 1, 63, 0, 0)], 2),
            "AC scan with several components"
        );
        assert_eq!(
            reason(&[scan(vec![0], 0, 0, 0, 2), scan(vec![0], 0, 0, 2, 0)], 1),
            "refinement out of sequence"
        );
        assert_eq!(
            reason(&[scan(vec![0], 0, 0, 0, 0), scan(vec![0], 1, 63, 1, 0)], 1),
            "refinement of unsent coefficient"
        );
    }
}
