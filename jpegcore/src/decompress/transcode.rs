// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reading a datastream into coefficient arrays, with no inverse DCT or
//! color conversion, so that it can be written again losslessly.

use super::{Decompressor, coef::CoefController};
use crate::{
    api::{DataSource, InputStatus, ProcessingResult, Progress},
    coefficients::{CoefArrays, CoefficientStore},
    error::{Error, Result},
    image::Sample,
    pipeline::EntropyCoding,
    state::DecompressState,
    util::tracing_wrappers::*,
};

/// Guess at the number of scans of a datastream, for progress reporting
/// before the scans have been seen.
pub(super) fn estimated_scans(progressive: bool, has_multiple_scans: bool, num_components: usize) -> usize {
    if progressive {
        2 + 3 * num_components
    } else if has_multiple_scans {
        num_components
    } else {
        1
    }
}

impl<S: Sample> Decompressor<S> {
    fn transcode_master_selection(&mut self) -> Result<()> {
        self.buffered = true;
        let mut geometry = self
            .input
            .geometry
            .clone()
            .ok_or_else(|| self.missing_frame())?;
        let progressive = self.input.frame.as_ref().is_some_and(|f| f.progressive);
        geometry.core_output_dimensions();
        if self.input.entropy() == EntropyCoding::Arithmetic && self.input.modules.arithmetic.is_none() {
            return Err(Error::ArithmeticNotSupported);
        }
        let coef = CoefController::full_image(&geometry)?;
        let scans = estimated_scans(
            progressive,
            self.input.has_multiple_scans(),
            geometry.num_components(),
        );
        self.progress = Progress {
            pass_counter: 0,
            pass_limit: (geometry.total_imcu_rows * scans) as u64,
            completed_passes: 0,
            total_passes: 1,
        };
        debug!(scans, pass_limit = self.progress.pass_limit, "reading coefficients");
        self.output = None;
        self.input.geometry = Some(geometry);
        self.input.coef = Some(coef);
        self.input.start_input_pass()
    }

    /// Absorbs input up to the end of the datastream. Returns false if the
    /// source suspended; calling again resumes where input stopped.
    ///
    /// The progress limit is only an estimate and is raised by one scan's
    /// worth of rows whenever the counter reaches it.
    pub(super) fn absorb_input(&mut self, source: &mut dyn DataSource) -> Result<bool> {
        let total_imcu_rows = self
            .input
            .geometry
            .as_ref()
            .map_or(1, |g| g.total_imcu_rows) as u64;
        loop {
            if let Some(monitor) = self.progress_monitor.as_mut() {
                monitor.progress(&self.progress);
            }
            match self.input.consume_input(source)? {
                InputStatus::Suspended => return Ok(false),
                InputStatus::ReachedEoi => return Ok(true),
                InputStatus::RowCompleted | InputStatus::ReachedSos => {
                    self.progress.pass_counter += 1;
                    if self.progress.pass_counter >= self.progress.pass_limit {
                        self.progress.pass_limit += total_imcu_rows;
                    }
                }
                InputStatus::ScanCompleted => {}
            }
        }
    }

    /// Reads the whole datastream into coefficient arrays, one per
    /// component. May suspend; repeating the call resumes without losing or
    /// repeating input. The arrays live in [`Decompressor::coefficient_store`]
    /// until taken with [`Decompressor::take_coefficients`] or until the
    /// object is reset.
    #[instrument(level = "debug", skip_all, err)]
    pub fn read_coefficients(&mut self, source: &mut impl DataSource) -> Result<ProcessingResult<CoefArrays>> {
        if self.state.is(DecompressState::HeaderReady) {
            self.transcode_master_selection()?;
            self.state.transition(DecompressState::ReadingCoefficients)?;
        }
        if self.state.is(DecompressState::ReadingCoefficients) {
            if !self.absorb_input(source)? {
                return Ok(ProcessingResult::Suspended);
            }
            self.state.transition(DecompressState::Stopping)?;
        }
        let state = self.state.get();
        if matches!(state, DecompressState::Stopping | DecompressState::BufferedImage) && self.buffered {
            if let Some((_, arrays)) = self.input.coef.as_ref().and_then(|c| c.whole_image()) {
                return Ok(ProcessingResult::Complete {
                    result: arrays.clone(),
                });
            }
        }
        Err(Error::BadState(state.into()))
    }

    pub fn coefficient_store(&self) -> Option<&CoefficientStore> {
        self.input
            .coef
            .as_ref()
            .and_then(|c| c.whole_image())
            .map(|(store, _)| store)
    }

    /// Hands over the full-image coefficient arrays, for instance to a
    /// compressor's `write_coefficients`. The datastream can still be
    /// finished afterwards.
    pub fn take_coefficients(&mut self) -> Option<(CoefficientStore, CoefArrays)> {
        if !matches!(
            self.state.get(),
            DecompressState::Stopping | DecompressState::BufferedImage
        ) {
            return None;
        }
        self.input
            .coef
            .take()
            .and_then(CoefController::into_whole_image)
    }
}
