// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{DecoderModules, ScanCursors, coef::CoefController};
use crate::{
    api::{DataSource, EntropyDecoder, InputStatus, MarkerStatus},
    component::{FrameGeometry, ScanLayout},
    error::{Error, Result},
    headers::FrameHeader,
    image::{Image, Sample},
    pipeline::EntropyCoding,
    util::tracing_wrappers::*,
};

pub(super) fn entropy_decoder<'a>(
    huffman: &'a mut Box<dyn EntropyDecoder>,
    arithmetic: &'a mut Option<Box<dyn EntropyDecoder>>,
    coding: EntropyCoding,
) -> Result<&'a mut (dyn EntropyDecoder + 'static)> {
    match coding {
        EntropyCoding::Huffman => Ok(&mut **huffman),
        EntropyCoding::Arithmetic => arithmetic
            .as_deref_mut()
            .ok_or(Error::ArithmeticNotSupported),
    }
}

/// The input side of a decompressor. Input is consumed either marker by
/// marker (between scans) or iMCU row by iMCU row through the coefficient
/// controller (within a scan).
pub(crate) struct InputController<S: Sample> {
    pub(crate) modules: DecoderModules<S>,
    pub(crate) coef: Option<CoefController>,
    pub(crate) cursors: ScanCursors,
    pub(crate) geometry: Option<FrameGeometry>,
    pub(crate) frame: Option<FrameHeader>,
    entropy: EntropyCoding,
    inheaders: bool,
    eoi_reached: bool,
    has_multiple_scans: bool,
    consuming_data: bool,
}

impl<S: Sample> InputController<S> {
    pub(crate) fn new(modules: DecoderModules<S>) -> Self {
        Self {
            modules,
            coef: None,
            cursors: ScanCursors::default(),
            geometry: None,
            frame: None,
            entropy: EntropyCoding::Huffman,
            inheaders: true,
            eoi_reached: false,
            has_multiple_scans: false,
            consuming_data: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.modules.markers.reset();
        self.coef = None;
        self.cursors = ScanCursors::default();
        self.geometry = None;
        self.frame = None;
        self.entropy = EntropyCoding::Huffman;
        self.inheaders = true;
        self.eoi_reached = false;
        self.has_multiple_scans = false;
        self.consuming_data = false;
    }

    pub(crate) fn eoi_reached(&self) -> bool {
        self.eoi_reached
    }

    pub(crate) fn has_multiple_scans(&self) -> bool {
        self.has_multiple_scans
    }

    pub(crate) fn entropy(&self) -> EntropyCoding {
        self.entropy
    }

    pub(crate) fn consume_input(&mut self, source: &mut dyn DataSource) -> Result<InputStatus> {
        if !self.consuming_data {
            return self.consume_markers(source);
        }
        let Self {
            modules,
            coef,
            cursors,
            geometry,
            entropy,
            ..
        } = self;
        let (Some(coef), Some(geometry)) = (coef.as_mut(), geometry.as_ref()) else {
            return Err(Error::BadBufferMode);
        };
        let decoder = entropy_decoder(&mut modules.huffman, &mut modules.arithmetic, *entropy)?;
        let status = coef.consume_data(geometry, source, decoder, cursors)?;
        if status == InputStatus::ScanCompleted {
            self.finish_input_pass();
        }
        Ok(status)
    }

    fn consume_markers(&mut self, source: &mut dyn DataSource) -> Result<InputStatus> {
        if self.eoi_reached {
            return Ok(InputStatus::ReachedEoi);
        }
        match self.modules.markers.read_markers(source)? {
            MarkerStatus::ReachedSos => {
                self.cursors.input_scan_number += 1;
                if self.inheaders {
                    self.initial_setup()?;
                    self.inheaders = false;
                } else {
                    if !self.has_multiple_scans {
                        return Err(Error::EoiExpected);
                    }
                    self.start_input_pass()?;
                }
                Ok(InputStatus::ReachedSos)
            }
            MarkerStatus::ReachedEoi => {
                self.eoi_reached = true;
                if self.inheaders {
                    if self.modules.markers.frame_header().is_some() {
                        return Err(Error::SofWithoutSos);
                    }
                } else if self.cursors.output_scan_number > self.cursors.input_scan_number {
                    // Output must never wait for a scan that will not come.
                    self.cursors.output_scan_number = self.cursors.input_scan_number;
                }
                Ok(InputStatus::ReachedEoi)
            }
            MarkerStatus::Suspended => Ok(InputStatus::Suspended),
        }
    }

    /// Runs once the first scan header is in: fixes the frame geometry and
    /// decides whether the image comes in more than one scan.
    fn initial_setup(&mut self) -> Result<()> {
        let markers = &self.modules.markers;
        let frame = markers
            .frame_header()
            .cloned()
            .ok_or_else(|| Error::CorruptData("start of scan before start of frame".into()))?;
        if frame.data_precision != S::BITS {
            return Err(Error::BadPrecision(frame.data_precision, S::BITS));
        }
        let geometry = FrameGeometry::from_frame(&frame)?;
        let scan = markers
            .scan_header()
            .ok_or_else(|| Error::CorruptData("missing scan header".into()))?;
        self.has_multiple_scans =
            scan.component_indices.len() < geometry.num_components() || frame.progressive;
        self.entropy = EntropyCoding::select(frame.arith_code);
        debug!(
            width = geometry.image_width,
            height = geometry.image_height,
            components = geometry.num_components(),
            has_multiple_scans = self.has_multiple_scans,
            "frame header"
        );
        self.geometry = Some(geometry);
        self.frame = Some(frame);
        Ok(())
    }

    /// Prepares to decode the scan whose header was just read. The
    /// coefficient controller must exist.
    pub(crate) fn start_input_pass(&mut self) -> Result<()> {
        let Self {
            modules,
            coef,
            cursors,
            geometry,
            frame,
            entropy,
            ..
        } = self;
        let (Some(coef), Some(geometry), Some(frame)) = (coef.as_mut(), geometry.as_ref(), frame.as_ref())
        else {
            return Err(Error::BadBufferMode);
        };
        let scan = modules
            .markers
            .scan_header()
            .cloned()
            .ok_or_else(|| Error::CorruptData("missing scan header".into()))?;
        let layout = ScanLayout::new(geometry, &scan.component_indices)?;
        trace!(scan = cursors.input_scan_number, ?scan, "start input pass");
        entropy_decoder(&mut modules.huffman, &mut modules.arithmetic, *entropy)?
            .start_pass(frame, &scan, &layout)?;
        coef.start_input_pass(layout, geometry, cursors);
        self.consuming_data = true;
        Ok(())
    }

    pub(crate) fn finish_input_pass(&mut self) {
        self.consuming_data = false;
    }

    /// Fills `output` with the samples of the next output iMCU row. Returns
    /// `Ok(false)` on suspension.
    pub(crate) fn decompress_data(&mut self, source: &mut dyn DataSource, output: &mut [Image<S>]) -> Result<bool> {
        let whole_image = self
            .coef
            .as_ref()
            .ok_or(Error::BadBufferMode)?
            .has_whole_image();
        if whole_image {
            // Input has to stay ahead of output.
            while self.cursors.input_scan_number < self.cursors.output_scan_number
                || (self.cursors.input_scan_number == self.cursors.output_scan_number
                    && self.cursors.input_imcu_row <= self.cursors.output_imcu_row)
            {
                match self.consume_input(source)? {
                    InputStatus::Suspended => return Ok(false),
                    InputStatus::ReachedEoi => break,
                    _ => {}
                }
            }
        }
        let Self {
            modules,
            coef,
            cursors,
            geometry,
            entropy,
            ..
        } = self;
        let (Some(coef), Some(geometry)) = (coef.as_mut(), geometry.as_ref()) else {
            return Err(Error::BadBufferMode);
        };
        let idct = modules
            .idct
            .as_deref_mut()
            .ok_or(Error::MissingModule("inverse DCT"))?;
        if whole_image {
            coef.decompress_from_arrays(geometry, idct, output, cursors)?;
            return Ok(true);
        }
        let decoder = entropy_decoder(&mut modules.huffman, &mut modules.arithmetic, *entropy)?;
        let status = coef.decompress_onepass(geometry, source, decoder, idct, output, cursors)?;
        if status == InputStatus::ScanCompleted {
            self.finish_input_pass();
        }
        Ok(status != InputStatus::Suspended)
    }
}
