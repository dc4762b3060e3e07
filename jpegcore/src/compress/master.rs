// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Pass sequencing for compression.
//!
//! A full compression runs one main pass (pixels in, first scan out or
//! statistics gathered), then for every scan an optional Huffman
//! optimization pass followed by an output pass. Transcoding starts directly
//! at the first scan's optimization or output pass.

use super::coef::CoefMode;
use crate::headers::ScanHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Input data arrives; runs the forward DCT.
    Main,
    /// Gathers symbol statistics for one scan from the stored coefficients.
    HuffmanOptimization,
    /// Writes one scan from the stored coefficients.
    Output,
}

/// What the stages have to do for the pass being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSetup {
    pub pass_type: PassType,
    pub scan_index: usize,
    pub gather_statistics: bool,
    pub coef_mode: CoefMode,
    /// Write the frame header and scan header before this pass's data.
    pub write_frame_header: bool,
    pub write_scan_header: bool,
}

#[derive(Debug, Clone)]
pub struct PassMaster {
    pass_type: PassType,
    pass_number: usize,
    total_passes: usize,
    scan_number: usize,
    optimize_coding: bool,
    arith_code: bool,
    is_last_pass: bool,
    call_pass_startup: bool,
}

impl PassMaster {
    pub fn new(num_scans: usize, optimize_coding: bool, arith_code: bool, transcode_only: bool) -> Self {
        let pass_type = match (transcode_only, optimize_coding) {
            (false, _) => PassType::Main,
            (true, true) => PassType::HuffmanOptimization,
            (true, false) => PassType::Output,
        };
        Self {
            pass_type,
            pass_number: 0,
            total_passes: if optimize_coding { num_scans * 2 } else { num_scans },
            scan_number: 0,
            optimize_coding,
            arith_code,
            is_last_pass: false,
            call_pass_startup: false,
        }
    }

    /// Decides the next pass. Huffman optimization is skipped for DC
    /// refinement scans, whose symbols carry no statistics worth gathering;
    /// such a scan goes directly to its output pass.
    pub fn prepare_for_pass(&mut self, scans: &[ScanHeader]) -> PassSetup {
        let setup = match self.pass_type {
            PassType::Main => {
                self.call_pass_startup = !self.optimize_coding;
                PassSetup {
                    pass_type: PassType::Main,
                    scan_index: self.scan_number,
                    gather_statistics: self.optimize_coding,
                    coef_mode: if self.total_passes > 1 {
                        CoefMode::SaveAndPass
                    } else {
                        CoefMode::PassThrough
                    },
                    write_frame_header: false,
                    write_scan_header: false,
                }
            }
            PassType::HuffmanOptimization => {
                let scan = &scans[self.scan_number];
                if scan.ss != 0 || scan.ah == 0 || self.arith_code {
                    self.call_pass_startup = false;
                    PassSetup {
                        pass_type: PassType::HuffmanOptimization,
                        scan_index: self.scan_number,
                        gather_statistics: true,
                        coef_mode: CoefMode::CrankDest,
                        write_frame_header: false,
                        write_scan_header: false,
                    }
                } else {
                    self.pass_type = PassType::Output;
                    self.pass_number += 1;
                    self.output_setup()
                }
            }
            PassType::Output => self.output_setup(),
        };
        self.is_last_pass = self.pass_number == self.total_passes - 1;
        setup
    }

    fn output_setup(&mut self) -> PassSetup {
        self.call_pass_startup = false;
        PassSetup {
            pass_type: PassType::Output,
            scan_index: self.scan_number,
            gather_statistics: false,
            coef_mode: CoefMode::CrankDest,
            write_frame_header: self.scan_number == 0,
            write_scan_header: true,
        }
    }

    pub fn finish_pass(&mut self) {
        match self.pass_type {
            PassType::Main => {
                // The main pass either wrote scan 0 or gathered its
                // statistics; in the latter case scan 0 still needs output.
                self.pass_type = PassType::Output;
                if !self.optimize_coding {
                    self.scan_number += 1;
                }
            }
            PassType::HuffmanOptimization => self.pass_type = PassType::Output,
            PassType::Output => {
                if self.optimize_coding {
                    self.pass_type = PassType::HuffmanOptimization;
                }
                self.scan_number += 1;
            }
        }
        self.pass_number += 1;
    }

    /// Whether the headers of the main pass are still to be written when the
    /// first data arrives.
    pub fn call_pass_startup(&self) -> bool {
        self.call_pass_startup
    }

    pub fn pass_startup_done(&mut self) {
        self.call_pass_startup = false;
    }

    pub fn is_last_pass(&self) -> bool {
        self.is_last_pass
    }

    pub fn pass_number(&self) -> usize {
        self.pass_number
    }

    pub fn total_passes(&self) -> usize {
        self.total_passes
    }

    pub fn scan_number(&self) -> usize {
        self.scan_number
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::headers::{ColorSpace, simple_progression};

    fn run(master: &mut PassMaster, scans: &[ScanHeader]) -> Vec<(PassType, usize, CoefMode)> {
        let mut passes = vec![];
        loop {
            let setup = master.prepare_for_pass(scans);
            passes.push((setup.pass_type, setup.scan_index, setup.coef_mode));
            let last = master.is_last_pass();
            master.finish_pass();
            if last {
                return passes;
            }
        }
    }

    #[test]
    fn single_scan_is_one_pass() {
        let scans = [ScanHeader::sequential(vec![0, 1, 2])];
        let mut master = PassMaster::new(1, false, false, false);
        let setup = master.prepare_for_pass(&scans);
        assert_eq!(setup.coef_mode, CoefMode::PassThrough);
        assert!(master.call_pass_startup());
        assert!(master.is_last_pass());
        assert_eq!(master.total_passes(), 1);
    }

    #[test]
    fn optimized_sequential() {
        let scans = [ScanHeader::sequential(vec![0, 1, 2])];
        let mut master = PassMaster::new(1, true, false, false);
        assert_eq!(
            run(&mut master, &scans),
            [
                (PassType::Main, 0, CoefMode::SaveAndPass),
                (PassType::Output, 0, CoefMode::CrankDest),
            ]
        );
    }

    #[test]
    fn multi_scan_without_optimization() {
        let scans = simple_progression(3, ColorSpace::YCbCr);
        let mut master = PassMaster::new(scans.len(), false, false, false);
        let passes = run(&mut master, &scans);
        assert_eq!(passes.len(), scans.len());
        assert_eq!(passes[0], (PassType::Main, 0, CoefMode::SaveAndPass));
        for (i, pass) in passes.iter().enumerate().skip(1) {
            assert_eq!(*pass, (PassType::Output, i, CoefMode::CrankDest));
        }
    }

    #[test]
    fn dc_refinement_skips_optimization() {
        let scans = simple_progression(3, ColorSpace::YCbCr);
        let refinements = scans.iter().filter(|s| s.ss == 0 && s.ah != 0).count();
        assert_eq!(refinements, 1);
        let mut master = PassMaster::new(scans.len(), true, false, false);
        let passes = run(&mut master, &scans);
        assert_eq!(passes.len(), 2 * scans.len() - refinements);
        assert_eq!(master.pass_number(), master.total_passes());
        let optimized: Vec<usize> = passes
            .iter()
            .filter(|p| p.0 == PassType::HuffmanOptimization)
            .map(|p| p.1)
            .collect();
        let refinement = scans.iter().position(|s| s.ss == 0 && s.ah != 0).unwrap();
        assert!(!optimized.contains(&refinement));
        assert_eq!(optimized.len(), scans.len() - 1 - refinements);
    }

    #[test]
    fn transcoding_starts_at_first_scan() {
        let scans = [ScanHeader::sequential(vec![0])];
        let mut master = PassMaster::new(1, false, false, true);
        let setup = master.prepare_for_pass(&scans);
        assert_eq!(setup.pass_type, PassType::Output);
        assert!(setup.write_frame_header);
        assert!(master.is_last_pass());

        let mut master = PassMaster::new(1, true, false, true);
        assert_eq!(
            run(&mut master, &scans),
            [
                (PassType::HuffmanOptimization, 0, CoefMode::CrankDest),
                (PassType::Output, 0, CoefMode::CrankDest),
            ]
        );
    }
}
