// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Decompression objects: a JPEG datastream in through a [`DataSource`];
//! pixel rows, raw component planes or coefficient arrays out.

pub mod coef;
mod input;
pub mod main_controller;
mod transcode;

use coef::CoefController;
use input::InputController;
use main_controller::MainController;

use crate::{
    api::{
        DataSource, EntropyDecoder, HeaderStatus, InputStatus, InverseDct, MarkerReader,
        ProcessingResult, Progress, ProgressMonitor,
    },
    component::FrameGeometry,
    error::{Error, Result},
    headers::FrameHeader,
    image::{Image, Sample},
    options::DecompressOptions,
    pipeline::{CoefBuffering, EntropyCoding, OutputPipeline, build_output_pipeline},
    render::{ColorDeconverter, RowCursor},
    state::{DecompressState, StateTracker},
    util::tracing_wrappers::*,
};

/// Where input and output stand, in scans and iMCU rows. Output of a scan
/// may not overtake its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursors {
    /// Number of start-of-scan markers read so far.
    pub input_scan_number: usize,
    pub input_imcu_row: usize,
    /// Scan being displayed; only meaningful with full-image buffering.
    pub output_scan_number: usize,
    pub output_imcu_row: usize,
}

/// The stages a decompressor drives but does not implement.
pub struct DecoderModules<S: Sample> {
    pub markers: Box<dyn MarkerReader>,
    pub huffman: Box<dyn EntropyDecoder>,
    pub arithmetic: Option<Box<dyn EntropyDecoder>>,
    /// Required unless only coefficients are read.
    pub idct: Option<Box<dyn InverseDct<S>>>,
    /// Replaces the built-in color conversion. Consumed by the next
    /// [`Decompressor::start_decompress`].
    pub color: Option<Box<dyn ColorDeconverter<S>>>,
}

impl<S: Sample> DecoderModules<S> {
    pub fn new(markers: Box<dyn MarkerReader>, huffman: Box<dyn EntropyDecoder>) -> Self {
        Self {
            markers,
            huffman,
            arithmetic: None,
            idct: None,
            color: None,
        }
    }

    pub fn with_idct(mut self, idct: Box<dyn InverseDct<S>>) -> Self {
        self.idct = Some(idct);
        self
    }

    pub fn with_arithmetic(mut self, decoder: Box<dyn EntropyDecoder>) -> Self {
        self.arithmetic = Some(decoder);
        self
    }

    pub fn with_color_deconverter(mut self, converter: Box<dyn ColorDeconverter<S>>) -> Self {
        self.color = Some(converter);
        self
    }
}

struct OutputStage<S: Sample> {
    pipeline: OutputPipeline<S>,
    main: MainController<S>,
}

pub struct Decompressor<S: Sample> {
    options: DecompressOptions,
    state: StateTracker<DecompressState>,
    input: InputController<S>,
    /// Absent for raw data output.
    output: Option<OutputStage<S>>,
    /// Coefficients are kept for the whole image and output passes are
    /// started explicitly.
    buffered: bool,
    output_scanline: usize,
    output_passes: usize,
    progress_monitor: Option<Box<dyn ProgressMonitor>>,
    progress: Progress,
}

impl<S: Sample> Decompressor<S> {
    pub fn new(options: DecompressOptions, modules: DecoderModules<S>) -> Self {
        Self {
            options,
            state: StateTracker::new(),
            input: InputController::new(modules),
            output: None,
            buffered: false,
            output_scanline: 0,
            output_passes: 0,
            progress_monitor: None,
            progress: Progress::default(),
        }
    }

    pub fn options(&self) -> &DecompressOptions {
        &self.options
    }

    /// Options take effect at the next `start_decompress`.
    pub fn options_mut(&mut self) -> &mut DecompressOptions {
        &mut self.options
    }

    pub fn state(&self) -> DecompressState {
        self.state.get()
    }

    pub fn frame_header(&self) -> Option<&FrameHeader> {
        self.input.frame.as_ref()
    }

    /// Frame geometry; the output dimensions are final once decompression
    /// has started.
    pub fn geometry(&self) -> Option<&FrameGeometry> {
        self.input.geometry.as_ref()
    }

    pub fn output_dimensions(&self) -> Option<(usize, usize)> {
        self.geometry().map(|g| (g.output_width, g.output_height))
    }

    /// Samples per output pixel, once decompression has started.
    pub fn out_color_components(&self) -> Option<usize> {
        self.output
            .as_ref()
            .map(|stage| stage.pipeline.out_color_components)
    }

    /// Whether output goes through the merged upsampler.
    pub fn uses_merged_upsampling(&self) -> bool {
        self.output.as_ref().is_some_and(|stage| stage.pipeline.merged)
    }

    pub fn output_scanline(&self) -> usize {
        self.output_scanline
    }

    pub fn scan_cursors(&self) -> ScanCursors {
        self.input.cursors
    }

    pub fn set_progress_monitor(&mut self, monitor: Box<dyn ProgressMonitor>) {
        self.progress_monitor = Some(monitor);
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    fn report_progress(&mut self, counter: usize, limit: usize) {
        self.progress.pass_counter = counter as u64;
        self.progress.pass_limit = limit as u64;
        if let Some(monitor) = self.progress_monitor.as_mut() {
            monitor.progress(&self.progress);
        }
    }

    fn missing_frame(&self) -> Error {
        Error::BadState(self.state.get().into())
    }

    /// Absorbs whatever input is available. Before the first scan this reads
    /// headers; afterwards it decodes ahead of output where the coefficient
    /// buffering allows.
    pub fn consume_input(&mut self, source: &mut impl DataSource) -> Result<InputStatus> {
        use DecompressState::*;
        match self.state.get() {
            Start => {
                self.input.reset();
                source.init_source();
                self.state.transition(ReadingHeader)?;
                self.read_header_markers(source)
            }
            ReadingHeader => self.read_header_markers(source),
            HeaderReady => Ok(InputStatus::ReachedSos),
            Preload | Prescan | Scanning | RawOk | BufferedImage | BufferedPost | Stopping => {
                self.input.consume_input(source)
            }
            state => Err(Error::BadState(state.into())),
        }
    }

    fn read_header_markers(&mut self, source: &mut dyn DataSource) -> Result<InputStatus> {
        let status = self.input.consume_input(source)?;
        if status == InputStatus::ReachedSos {
            self.state.transition(DecompressState::HeaderReady)?;
        }
        Ok(status)
    }

    /// Reads markers up to the first scan. A datastream holding only tables
    /// leaves the object reset and ready for the next datastream, unless
    /// `require_image` is set, in which case it is an error.
    #[instrument(level = "debug", skip_all, err)]
    pub fn read_header(
        &mut self,
        source: &mut impl DataSource,
        require_image: bool,
    ) -> Result<ProcessingResult<HeaderStatus>> {
        self.state
            .require(&[DecompressState::Start, DecompressState::ReadingHeader])?;
        match self.consume_input(source)? {
            InputStatus::ReachedSos => Ok(ProcessingResult::Complete {
                result: HeaderStatus::HeaderOk,
            }),
            InputStatus::ReachedEoi => {
                if require_image {
                    return Err(Error::NoImage);
                }
                self.abort();
                Ok(ProcessingResult::Complete {
                    result: HeaderStatus::TablesOnly,
                })
            }
            InputStatus::Suspended => Ok(ProcessingResult::Suspended),
            InputStatus::RowCompleted | InputStatus::ScanCompleted => Err(self.missing_frame()),
        }
    }

    /// Builds the decoding pipeline for the frame just read and starts the
    /// first scan's input pass.
    fn master_selection(&mut self) -> Result<()> {
        let jpeg_color_space = self
            .input
            .frame
            .as_ref()
            .map(|frame| frame.color_space)
            .ok_or_else(|| self.missing_frame())?;
        let mut geometry = self
            .input
            .geometry
            .clone()
            .ok_or_else(|| self.missing_frame())?;
        if self.input.modules.idct.is_none() {
            return Err(Error::MissingModule("inverse DCT"));
        }
        if self.input.entropy() == EntropyCoding::Arithmetic && self.input.modules.arithmetic.is_none() {
            return Err(Error::ArithmeticNotSupported);
        }
        self.buffered = self.options.buffered_image;
        let pipeline = if self.options.raw_data_out {
            geometry.core_output_dimensions();
            None
        } else {
            Some(build_output_pipeline(
                &self.options,
                &mut geometry,
                jpeg_color_space,
                self.input.modules.color.take(),
            )?)
        };
        let has_multiple_scans = self.input.has_multiple_scans();
        let buffering = CoefBuffering::for_decompress(has_multiple_scans, self.buffered);
        let coef = match buffering {
            CoefBuffering::FullImage => CoefController::full_image(&geometry)?,
            CoefBuffering::SingleImcuRow => CoefController::single_pass(),
        };
        debug!(?buffering, entropy = ?self.input.entropy(), raw = self.options.raw_data_out, "decompression pipeline");
        self.output = match pipeline {
            Some(pipeline) => Some(OutputStage {
                main: MainController::new(&geometry)?,
                pipeline,
            }),
            None => None,
        };
        if !self.buffered && has_multiple_scans {
            let frame_progressive = self.input.frame.as_ref().is_some_and(|f| f.progressive);
            let scans = transcode::estimated_scans(
                frame_progressive,
                has_multiple_scans,
                geometry.num_components(),
            );
            self.progress = Progress {
                pass_counter: 0,
                pass_limit: (geometry.total_imcu_rows * scans) as u64,
                completed_passes: 0,
                total_passes: 2,
            };
            self.output_passes = 1;
        } else {
            self.progress = Progress::default();
            self.output_passes = 0;
        }
        self.input.geometry = Some(geometry);
        self.input.coef = Some(coef);
        self.input.start_input_pass()
    }

    /// Starts decompression. A multi-scan image is absorbed completely
    /// first (unless in buffered-image mode), which may suspend; repeat the
    /// call once more input is available.
    #[instrument(level = "debug", skip_all, err)]
    pub fn start_decompress(&mut self, source: &mut impl DataSource) -> Result<ProcessingResult<()>> {
        use DecompressState::*;
        match self.state.get() {
            HeaderReady => {
                self.master_selection()?;
                if self.buffered {
                    self.state.transition(BufferedImage)?;
                    return Ok(ProcessingResult::Complete { result: () });
                }
                self.state.transition(Preload)?;
            }
            Preload | Prescan => {}
            state => return Err(Error::BadState(state.into())),
        }
        if self.state.is(Preload) {
            if self.input.has_multiple_scans() && !self.absorb_input(source)? {
                return Ok(ProcessingResult::Suspended);
            }
            self.input.cursors.output_scan_number = self.input.cursors.input_scan_number;
        }
        self.output_pass_setup()?;
        Ok(ProcessingResult::Complete { result: () })
    }

    fn output_pass_setup(&mut self) -> Result<()> {
        use DecompressState::*;
        if !self.state.is(Prescan) {
            let input = &mut self.input;
            let geometry = input.geometry.as_ref().ok_or(Error::BadState(self.state.get().into()))?;
            if let Some(idct) = input.modules.idct.as_deref_mut() {
                idct.start_pass(geometry)?;
            }
            if let Some(coef) = input.coef.as_mut() {
                coef.start_output_pass(&mut input.cursors);
            }
            if let Some(stage) = self.output.as_mut() {
                stage.pipeline.upsampler.start_pass();
                stage.main.start_pass();
            }
            self.progress.completed_passes = self.output_passes;
            self.progress.total_passes = self.output_passes
                + 1
                + usize::from(self.buffered && !self.input.eoi_reached());
            self.output_scanline = 0;
            trace!(pass = self.output_passes, "start output pass");
            self.state.transition(Prescan)?;
        }
        self.state.transition(if self.options.raw_data_out {
            RawOk
        } else {
            Scanning
        })
    }

    /// Reads up to `rows.len()` pixel rows, each at least
    /// `output_width * out_color_components` samples long. Returns the
    /// number of rows delivered, which is 0 if input suspended.
    pub fn read_scanlines(&mut self, source: &mut impl DataSource, rows: &mut [&mut [S]]) -> Result<usize> {
        self.state.require(&[DecompressState::Scanning])?;
        let (width, height) = self
            .output_dimensions()
            .ok_or_else(|| self.missing_frame())?;
        if self.output_scanline >= height {
            warn!("application requested too many scanlines");
            return Ok(0);
        }
        self.report_progress(self.output_scanline, height);

        let Self { input, output, .. } = self;
        let stage = output.as_mut().ok_or(Error::MissingModule("upsampler"))?;
        let needed = width * stage.pipeline.out_color_components;
        if let Some(row) = rows.iter().find(|row| row.len() < needed) {
            return Err(Error::RowTooShort {
                needed,
                available: row.len(),
            });
        }
        let mut out_rows = RowCursor::new(rows.len());
        stage.main.process_data(
            |planes| input.decompress_data(source, planes),
            stage.pipeline.upsampler.as_mut(),
            rows,
            &mut out_rows,
        )?;
        self.output_scanline += out_rows.position;
        Ok(out_rows.position)
    }

    /// Planes sized for [`Decompressor::read_raw_data`].
    pub fn raw_data_planes(&self) -> Result<Vec<Image<S>>> {
        let geometry = self.geometry().ok_or_else(|| self.missing_frame())?;
        geometry
            .components
            .iter()
            .map(|comp| Image::new((comp.padded_width(), comp.imcu_sample_height())))
            .collect()
    }

    /// Reads one iMCU row of downsampled component data. Each plane must
    /// hold `v_samp_factor * 8` rows of `width_in_blocks * 8` samples.
    /// Returns the number of image rows covered, or 0 on suspension.
    pub fn read_raw_data(&mut self, source: &mut impl DataSource, planes: &mut [Image<S>]) -> Result<usize> {
        self.state.require(&[DecompressState::RawOk])?;
        let (height, lines_per_imcu_row) = {
            let geometry = self.geometry().ok_or_else(|| self.missing_frame())?;
            if planes.len() != geometry.num_components() {
                return Err(Error::ComponentCount(planes.len()));
            }
            for (comp, plane) in geometry.components.iter().zip(planes.iter()) {
                if plane.height() < comp.imcu_sample_height() {
                    return Err(Error::BufferSize {
                        needed: comp.imcu_sample_height(),
                        available: plane.height(),
                    });
                }
                if plane.width() < comp.padded_width() {
                    return Err(Error::RowTooShort {
                        needed: comp.padded_width(),
                        available: plane.width(),
                    });
                }
            }
            (
                geometry.output_height,
                geometry.max_v_samp_factor * geometry.min_dct_v_scaled_size,
            )
        };
        if self.output_scanline >= height {
            warn!("application requested too many scanlines");
            return Ok(0);
        }
        self.report_progress(self.output_scanline, height);
        if !self.input.decompress_data(source, planes)? {
            return Ok(0);
        }
        self.output_scanline += lines_per_imcu_row;
        Ok(lines_per_imcu_row)
    }

    /// Starts an output pass of a buffered-image decompression, displaying
    /// the image as of scan `scan_number` (counted from 1). A scan beyond
    /// the last one of a complete datastream is clamped to it.
    pub fn start_output(&mut self, scan_number: usize) -> Result<()> {
        self.state
            .require(&[DecompressState::BufferedImage, DecompressState::Prescan])?;
        let mut scan_number = scan_number.max(1);
        if self.input.eoi_reached() && scan_number > self.input.cursors.input_scan_number {
            scan_number = self.input.cursors.input_scan_number;
        }
        self.input.cursors.output_scan_number = scan_number;
        self.output_pass_setup()
    }

    /// Ends a buffered-image output pass, then absorbs input until the scan
    /// after the displayed one has started (or the datastream has ended).
    pub fn finish_output(&mut self, source: &mut impl DataSource) -> Result<ProcessingResult<()>> {
        use DecompressState::*;
        match self.state.get() {
            Scanning | RawOk if self.buffered => {
                self.output_passes += 1;
                self.state.transition(BufferedPost)?;
            }
            BufferedPost => {}
            state => return Err(Error::BadState(state.into())),
        }
        while self.input.cursors.input_scan_number <= self.input.cursors.output_scan_number
            && !self.input.eoi_reached()
        {
            if self.input.consume_input(source)? == InputStatus::Suspended {
                return Ok(ProcessingResult::Suspended);
            }
        }
        self.state.transition(BufferedImage)?;
        Ok(ProcessingResult::Complete { result: () })
    }

    /// Whether the end of the datastream has been read.
    pub fn input_complete(&self) -> bool {
        self.input.eoi_reached()
    }

    pub fn has_multiple_scans(&self) -> Result<bool> {
        use DecompressState::*;
        self.state.require(&[
            HeaderReady,
            Preload,
            Prescan,
            Scanning,
            RawOk,
            BufferedImage,
            BufferedPost,
            ReadingCoefficients,
            Stopping,
        ])?;
        Ok(self.input.has_multiple_scans())
    }

    /// Completes decompression: checks that every row was read, reads the
    /// rest of the datastream (which may suspend) and resets the object.
    #[instrument(level = "debug", skip_all, err)]
    pub fn finish_decompress(&mut self, source: &mut impl DataSource) -> Result<ProcessingResult<()>> {
        use DecompressState::*;
        match self.state.get() {
            Scanning | RawOk if !self.buffered => {
                let height = self
                    .output_dimensions()
                    .ok_or_else(|| self.missing_frame())?
                    .1;
                if self.output_scanline < height {
                    return Err(Error::TooLittleData);
                }
                self.output_passes += 1;
                self.state.transition(Stopping)?;
            }
            BufferedImage => self.state.transition(Stopping)?,
            Stopping => {}
            state => return Err(Error::BadState(state.into())),
        }
        while !self.input.eoi_reached() {
            if self.input.consume_input(source)? == InputStatus::Suspended {
                return Ok(ProcessingResult::Suspended);
            }
        }
        source.term_source();
        debug!("decompression finished");
        self.abort();
        Ok(ProcessingResult::Complete { result: () })
    }

    /// Abandons the current datastream and returns to the initial state.
    /// Never fails.
    pub fn abort(&mut self) {
        self.input.reset();
        self.output = None;
        self.buffered = false;
        self.output_scanline = 0;
        self.output_passes = 0;
        self.state.reset();
    }
}
