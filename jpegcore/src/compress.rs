// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Compression objects: pixel rows, raw component planes or coefficient
//! arrays in; a JPEG datastream out through a [`DataDestination`].

pub mod coef;
pub mod main_controller;
pub mod master;
pub mod sample;

use coef::{CoefController, RowInput};
use main_controller::MainController;
use master::{PassMaster, PassSetup, PassType};
use sample::PlanarPreprocessor;

use crate::{
    api::{
        DataDestination, EntropyEncoder, ForwardDct, MarkerWriter, Preprocessor, Progress,
        ProgressMonitor,
    },
    coefficients::{CoefArrays, CoefficientStore},
    component::{FrameGeometry, ScanLayout},
    error::{Error, Result},
    headers::{CodingTables, FrameHeader},
    image::Sample,
    options::CompressOptions,
    pipeline::{CoefBuffering, CompressPlan, EntropyCoding, plan_compression},
    state::{CompressState, StateTracker},
    util::tracing_wrappers::*,
};

/// The stages a compressor drives but does not implement.
pub struct EncoderModules<S: Sample> {
    pub markers: Box<dyn MarkerWriter>,
    pub huffman: Box<dyn EntropyEncoder>,
    pub arithmetic: Option<Box<dyn EntropyEncoder>>,
    /// Required unless only coefficients are written.
    pub fdct: Option<Box<dyn ForwardDct<S>>>,
    /// Replaces the built-in [`PlanarPreprocessor`].
    pub preprocessor: Option<Box<dyn Preprocessor<S>>>,
}

impl<S: Sample> EncoderModules<S> {
    pub fn new(markers: Box<dyn MarkerWriter>, huffman: Box<dyn EntropyEncoder>) -> Self {
        Self {
            markers,
            huffman,
            arithmetic: None,
            fdct: None,
            preprocessor: None,
        }
    }

    pub fn with_fdct(mut self, fdct: Box<dyn ForwardDct<S>>) -> Self {
        self.fdct = Some(fdct);
        self
    }

    pub fn with_arithmetic(mut self, encoder: Box<dyn EntropyEncoder>) -> Self {
        self.arithmetic = Some(encoder);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Box<dyn Preprocessor<S>>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }
}

fn entropy_encoder<'a>(
    huffman: &'a mut Box<dyn EntropyEncoder>,
    arithmetic: &'a mut Option<Box<dyn EntropyEncoder>>,
    coding: EntropyCoding,
) -> Result<&'a mut (dyn EntropyEncoder + 'static)> {
    match coding {
        EntropyCoding::Huffman => Ok(&mut **huffman),
        EntropyCoding::Arithmetic => arithmetic
            .as_deref_mut()
            .ok_or(Error::ArithmeticNotSupported),
    }
}

/// Resources that live from the start of compression to its end.
struct PassContext<S: Sample> {
    geometry: FrameGeometry,
    frame: FrameHeader,
    plan: CompressPlan,
    master: PassMaster,
    setup: Option<PassSetup>,
    coef: CoefController,
    /// Absent when writing coefficients.
    main: Option<MainController<S>>,
    builtin_preprocessor: Option<PlanarPreprocessor<S>>,
}

pub struct Compressor<S: Sample> {
    options: CompressOptions,
    modules: EncoderModules<S>,
    tables: CodingTables,
    state: StateTracker<CompressState>,
    progress_monitor: Option<Box<dyn ProgressMonitor>>,
    progress: Progress,
    next_scanline: usize,
    pass: Option<PassContext<S>>,
}

impl<S: Sample> Compressor<S> {
    /// Creates a compressor using the standard tables for
    /// `options.quality`.
    pub fn new(options: CompressOptions, modules: EncoderModules<S>) -> Self {
        let tables = CodingTables::standard(options.quality);
        Self {
            options,
            modules,
            tables,
            state: StateTracker::new(),
            progress_monitor: None,
            progress: Progress::default(),
            next_scanline: 0,
            pass: None,
        }
    }

    pub fn options(&self) -> &CompressOptions {
        &self.options
    }

    /// Parameters take effect at the next `start_compress` or
    /// `write_coefficients`.
    pub fn options_mut(&mut self) -> &mut CompressOptions {
        &mut self.options
    }

    pub fn state(&self) -> CompressState {
        self.state.get()
    }

    /// Number of scanlines (or raw rows) accepted so far.
    pub fn next_scanline(&self) -> usize {
        self.next_scanline
    }

    pub fn tables(&self) -> &CodingTables {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut CodingTables {
        &mut self.tables
    }

    /// The pass being run, once compression has started.
    pub fn current_pass(&self) -> Option<PassSetup> {
        self.pass.as_ref().and_then(|pass| pass.setup)
    }

    pub fn set_progress_monitor(&mut self, monitor: Box<dyn ProgressMonitor>) {
        self.progress_monitor = Some(monitor);
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Marks every table as already written (or not), so that it is left
    /// out of (or included in) the next datastream.
    pub fn suppress_tables(&mut self, suppress: bool) {
        self.tables.suppress(suppress);
    }

    fn frame_header(&self, geometry: &FrameGeometry, plan: &CompressPlan) -> FrameHeader {
        FrameHeader {
            image_width: geometry.image_width,
            image_height: geometry.image_height,
            data_precision: S::BITS,
            color_space: self.options.jpeg_color_space,
            components: self.options.components.clone(),
            progressive: plan.progressive,
            arith_code: plan.entropy == EntropyCoding::Arithmetic,
        }
    }

    fn report_progress(&mut self, counter: usize, limit: usize) {
        self.progress.pass_counter = counter as u64;
        self.progress.pass_limit = limit as u64;
        if let Some(monitor) = self.progress_monitor.as_mut() {
            monitor.progress(&self.progress);
        }
    }

    /// Starts compressing pixel rows (or raw planes when
    /// `options.raw_data_in` is set). With `write_all_tables`, every table
    /// is written even if an earlier datastream already carried it.
    #[instrument(level = "debug", skip_all, err)]
    pub fn start_compress(
        &mut self,
        dest: &mut impl DataDestination,
        write_all_tables: bool,
    ) -> Result<()> {
        self.state.require(&[CompressState::Start])?;
        if write_all_tables {
            self.tables.suppress(false);
        }
        let geometry = FrameGeometry::new(
            self.options.image_width,
            self.options.image_height,
            &self.options.components,
        )?;
        let plan = plan_compression(&self.options, &geometry, S::BITS)?;
        if plan.entropy == EntropyCoding::Arithmetic && self.modules.arithmetic.is_none() {
            return Err(Error::ArithmeticNotSupported);
        }
        if self.modules.fdct.is_none() {
            return Err(Error::MissingModule("forward DCT"));
        }
        let builtin_preprocessor = if self.options.raw_data_in || self.modules.preprocessor.is_some() {
            None
        } else {
            Some(PlanarPreprocessor::new(
                self.options.in_color_space,
                self.options.jpeg_color_space,
                self.options.input_components,
                geometry.num_components(),
            )?)
        };
        let coef = match plan.buffering {
            CoefBuffering::FullImage => CoefController::full_image(&geometry)?,
            CoefBuffering::SingleImcuRow => CoefController::single_row(&geometry)?,
        };
        let main = MainController::new(&geometry)?;
        let master = PassMaster::new(
            plan.scans.len(),
            self.options.optimize_coding,
            plan.entropy == EntropyCoding::Arithmetic,
            false,
        );
        dest.init_destination();
        self.modules.markers.write_file_header(dest)?;
        self.pass = Some(PassContext {
            frame: self.frame_header(&geometry, &plan),
            geometry,
            plan,
            master,
            setup: None,
            coef,
            main: Some(main),
            builtin_preprocessor,
        });
        self.prepare_for_pass(dest)?;
        self.next_scanline = 0;
        self.state.transition(if self.options.raw_data_in {
            CompressState::RawOk
        } else {
            CompressState::Scanning
        })
    }

    /// Starts a transcoding operation: the coefficients in `store` are
    /// written as they are, with the tables and scans of the current
    /// options. The datastream is produced by [`Compressor::finish_compress`].
    #[instrument(level = "debug", skip_all, err)]
    pub fn write_coefficients(
        &mut self,
        dest: &mut impl DataDestination,
        store: CoefficientStore,
        arrays: CoefArrays,
    ) -> Result<()> {
        self.state.require(&[CompressState::Start])?;
        self.tables.suppress(false);
        let geometry = FrameGeometry::new(
            self.options.image_width,
            self.options.image_height,
            &self.options.components,
        )?;
        let plan = plan_compression(&self.options, &geometry, S::BITS)?;
        if plan.entropy == EntropyCoding::Arithmetic && self.modules.arithmetic.is_none() {
            return Err(Error::ArithmeticNotSupported);
        }
        let coef = CoefController::from_arrays(store, arrays, &geometry)?;
        let master = PassMaster::new(
            plan.scans.len(),
            self.options.optimize_coding,
            plan.entropy == EntropyCoding::Arithmetic,
            true,
        );
        dest.init_destination();
        self.modules.markers.write_file_header(dest)?;
        self.pass = Some(PassContext {
            frame: self.frame_header(&geometry, &plan),
            geometry,
            plan,
            master,
            setup: None,
            coef,
            main: None,
            builtin_preprocessor: None,
        });
        self.next_scanline = 0;
        self.state.transition(CompressState::WritingCoefficients)
    }

    fn prepare_for_pass(&mut self, dest: &mut dyn DataDestination) -> Result<()> {
        let Self {
            options,
            modules,
            tables,
            pass,
            progress,
            ..
        } = self;
        let pass = pass.as_mut().ok_or(Error::BadState(CompressState::Start.into()))?;
        let setup = pass.master.prepare_for_pass(&pass.plan.scans);
        progress.completed_passes = pass.master.pass_number();
        progress.total_passes = pass.master.total_passes();
        let scan = &pass.plan.scans[setup.scan_index];
        let layout = ScanLayout::new(&pass.geometry, &scan.component_indices)?;
        debug!(
            pass = pass.master.pass_number(),
            pass_type = ?setup.pass_type,
            scan = setup.scan_index,
            "starting pass"
        );

        if setup.pass_type == PassType::Main {
            if let Some(main) = pass.main.as_mut() {
                main.start_pass();
            }
            if !options.raw_data_in {
                if let Some(custom) = modules.preprocessor.as_deref_mut() {
                    custom.start_pass(&pass.geometry)?;
                } else if let Some(builtin) = pass.builtin_preprocessor.as_mut() {
                    builtin.start_pass(&pass.geometry)?;
                }
            }
            if let Some(fdct) = modules.fdct.as_deref_mut() {
                fdct.start_pass(&pass.geometry, tables)?;
            }
        }
        let entropy = entropy_encoder(&mut modules.huffman, &mut modules.arithmetic, pass.plan.entropy)?;
        entropy.start_pass(&pass.frame, scan, &layout, setup.gather_statistics)?;
        pass.coef.start_pass(setup.coef_mode, layout, &pass.geometry)?;
        if setup.write_frame_header {
            modules.markers.write_frame_header(dest, &pass.frame, tables)?;
        }
        if setup.write_scan_header {
            modules.markers.write_scan_header(dest, scan, tables)?;
        }
        pass.setup = Some(setup);
        Ok(())
    }

    /// Writes the headers that a single-pass compression defers until the
    /// first data arrives, so that markers can be written before them.
    fn pass_startup(&mut self, dest: &mut dyn DataDestination) -> Result<()> {
        let Some(pass) = self.pass.as_mut() else {
            return Ok(());
        };
        if !pass.master.call_pass_startup() {
            return Ok(());
        }
        pass.master.pass_startup_done();
        let scan = &pass.plan.scans[pass.master.scan_number()];
        self.modules
            .markers
            .write_frame_header(dest, &pass.frame, &mut self.tables)?;
        self.modules
            .markers
            .write_scan_header(dest, scan, &mut self.tables)
    }

    fn finish_pass_master(&mut self, dest: &mut dyn DataDestination) -> Result<()> {
        let pass = self
            .pass
            .as_mut()
            .ok_or(Error::BadState(self.state.get().into()))?;
        let entropy = entropy_encoder(
            &mut self.modules.huffman,
            &mut self.modules.arithmetic,
            pass.plan.entropy,
        )?;
        entropy.finish_pass(dest, &mut self.tables)?;
        pass.master.finish_pass();
        Ok(())
    }

    /// Compresses up to `rows.len()` scanlines and returns how many were
    /// consumed. Fewer than offered means the destination suspended; the
    /// caller passes the unconsumed rows again once it can take more data.
    pub fn write_scanlines(
        &mut self,
        dest: &mut impl DataDestination,
        rows: &[&[S]],
    ) -> Result<usize> {
        self.state.require(&[CompressState::Scanning])?;
        let height = self.options.image_height;
        if self.next_scanline >= height {
            warn!("application transferred too many scanlines");
            return Ok(0);
        }
        self.report_progress(self.next_scanline, height);
        self.pass_startup(dest)?;

        let num_lines = rows.len().min(height - self.next_scanline);
        let mut row_ctr = 0;
        let Self { modules, pass, .. } = self;
        let pass = pass.as_mut().ok_or(Error::BadState(CompressState::Scanning.into()))?;
        let preprocessor: &mut dyn Preprocessor<S> = match (
            modules.preprocessor.as_deref_mut(),
            pass.builtin_preprocessor.as_mut(),
        ) {
            (Some(custom), _) => custom,
            (None, Some(builtin)) => builtin,
            (None, None) => return Err(Error::MissingModule("preprocessor")),
        };
        let fdct = modules
            .fdct
            .as_deref_mut()
            .ok_or(Error::MissingModule("forward DCT"))?;
        let entropy = entropy_encoder(&mut modules.huffman, &mut modules.arithmetic, pass.plan.entropy)?;
        let main = pass
            .main
            .as_mut()
            .ok_or(Error::BadState(CompressState::Scanning.into()))?;
        let coef = &mut pass.coef;
        let geometry = &pass.geometry;
        main.process_data(&rows[..num_lines], &mut row_ctr, preprocessor, |planes| {
            coef.compress_data(
                geometry,
                Some(RowInput {
                    planes,
                    fdct: &mut *fdct,
                }),
                &mut *entropy,
                &mut *dest,
            )
        })?;
        self.next_scanline += row_ctr;
        Ok(row_ctr)
    }

    /// Compresses one iMCU row of already downsampled data: for each
    /// component, `v_samp_factor * 8` rows of `width_in_blocks * 8` samples.
    /// Returns the number of image rows consumed, or 0 if the destination
    /// suspended.
    pub fn write_raw_data(
        &mut self,
        dest: &mut impl DataDestination,
        planes: &[&[&[S]]],
    ) -> Result<usize> {
        self.state.require(&[CompressState::RawOk])?;
        let height = self.options.image_height;
        if self.next_scanline >= height {
            warn!("application transferred too many scanlines");
            return Ok(0);
        }
        self.report_progress(self.next_scanline, height);
        self.pass_startup(dest)?;

        let Self { modules, pass, .. } = self;
        let pass = pass.as_mut().ok_or(Error::BadState(CompressState::RawOk.into()))?;
        let geometry = &pass.geometry;
        let lines_per_imcu_row = geometry.max_v_samp_factor * geometry.min_dct_v_scaled_size;
        if planes.len() != geometry.num_components() {
            return Err(Error::ComponentCount(planes.len()));
        }
        let main = pass
            .main
            .as_mut()
            .ok_or(Error::BadState(CompressState::RawOk.into()))?;
        for (comp, (src, dst)) in geometry
            .components
            .iter()
            .zip(planes.iter().zip(main.buffer_mut()))
        {
            let needed = comp.imcu_sample_height();
            if src.len() < needed {
                return Err(Error::BufferSize {
                    needed,
                    available: src.len(),
                });
            }
            let width = comp.padded_width();
            for (y, row) in src.iter().take(needed).enumerate() {
                if row.len() < width {
                    return Err(Error::RowTooShort {
                        needed: width,
                        available: row.len(),
                    });
                }
                dst.row_mut(y).copy_from_slice(&row[..width]);
            }
        }
        let fdct = modules
            .fdct
            .as_deref_mut()
            .ok_or(Error::MissingModule("forward DCT"))?;
        let entropy = entropy_encoder(&mut modules.huffman, &mut modules.arithmetic, pass.plan.entropy)?;
        let input = RowInput {
            planes: main.buffer(),
            fdct,
        };
        if !pass.coef.compress_data(geometry, Some(input), entropy, dest)? {
            return Ok(0);
        }
        self.next_scanline += lines_per_imcu_row;
        Ok(lines_per_imcu_row)
    }

    fn check_marker_state(&self) -> Result<()> {
        self.state.require(&[
            CompressState::Scanning,
            CompressState::RawOk,
            CompressState::WritingCoefficients,
        ])?;
        if self.next_scanline != 0 {
            return Err(Error::BadState(self.state.get().into()));
        }
        Ok(())
    }

    /// Writes a complete marker segment. Only allowed before the first
    /// scanline.
    pub fn write_marker(
        &mut self,
        dest: &mut impl DataDestination,
        marker: u8,
        data: &[u8],
    ) -> Result<()> {
        self.check_marker_state()?;
        self.modules.markers.write_marker_header(dest, marker, data.len())?;
        for &byte in data {
            self.modules.markers.write_marker_byte(dest, byte)?;
        }
        Ok(())
    }

    /// Starts a marker segment of `length` bytes whose contents follow
    /// through [`Compressor::write_m_byte`].
    pub fn write_m_header(
        &mut self,
        dest: &mut impl DataDestination,
        marker: u8,
        length: usize,
    ) -> Result<()> {
        self.check_marker_state()?;
        self.modules.markers.write_marker_header(dest, marker, length)
    }

    pub fn write_m_byte(&mut self, dest: &mut impl DataDestination, value: u8) -> Result<()> {
        self.modules.markers.write_marker_byte(dest, value)
    }

    /// Writes an abbreviated datastream holding only the tables.
    pub fn write_tables(&mut self, dest: &mut impl DataDestination) -> Result<()> {
        self.state.require(&[CompressState::Start])?;
        dest.init_destination();
        self.modules.markers.write_tables_only(dest, &mut self.tables)?;
        dest.term_destination();
        Ok(())
    }

    /// Completes the datastream: checks that the whole image was supplied,
    /// runs every remaining pass over the stored coefficients, writes the
    /// trailer and returns the object to its initial state. Table `sent`
    /// flags survive the reset.
    ///
    /// The remaining passes cannot be suspended: a destination that refuses
    /// data here causes [`Error::CantSuspend`].
    #[instrument(level = "debug", skip_all, err)]
    pub fn finish_compress(&mut self, dest: &mut impl DataDestination) -> Result<()> {
        match self.state.get() {
            CompressState::Scanning | CompressState::RawOk => {
                if self.next_scanline < self.options.image_height {
                    return Err(Error::TooLittleData);
                }
                self.finish_pass_master(dest)?;
            }
            CompressState::WritingCoefficients => {}
            state => return Err(Error::BadState(state.into())),
        }
        loop {
            let (last, total_imcu_rows) = match self.pass.as_ref() {
                Some(pass) => (pass.master.is_last_pass(), pass.geometry.total_imcu_rows),
                None => return Err(Error::BadState(self.state.get().into())),
            };
            if last {
                break;
            }
            self.prepare_for_pass(dest)?;
            for imcu_row in 0..total_imcu_rows {
                self.report_progress(imcu_row, total_imcu_rows);
                let Self { modules, pass, .. } = &mut *self;
                let pass = pass.as_mut().ok_or(Error::BadBufferMode)?;
                let entropy =
                    entropy_encoder(&mut modules.huffman, &mut modules.arithmetic, pass.plan.entropy)?;
                if !pass
                    .coef
                    .compress_data::<S>(&pass.geometry, None, entropy, dest)?
                {
                    return Err(Error::CantSuspend);
                }
            }
            self.finish_pass_master(dest)?;
        }
        self.modules.markers.write_file_trailer(dest)?;
        dest.term_destination();
        debug!("compression finished");
        self.abort();
        Ok(())
    }

    /// Abandons the current datastream and returns to the initial state.
    /// Never fails.
    pub fn abort(&mut self) {
        self.pass = None;
        self.next_scanline = 0;
        self.state.reset();
    }
}
