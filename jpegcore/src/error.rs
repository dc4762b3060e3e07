// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::{headers::ColorSpace, state::CodecState};

/// Coarse classification of [`Error`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An entry point was called in the wrong order or with bad arguments.
    Usage,
    /// The requested geometry or color space combination cannot be handled.
    UnsupportedConfiguration,
    /// The caller supplied fewer rows than the image declares.
    DataInsufficiency,
    /// A stage that must run synchronously reported suspension.
    InternalConsistency,
    /// The datastream itself is malformed.
    CorruptData,
    /// Memory could not be obtained.
    Resource,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Improper call in state {0:?}")]
    BadState(CodecState),
    #[error(
        "Fractional sampling not implemented: component {component} maps {h_in}x{v_in} input samples to {h_out}x{v_out}"
    )]
    FractionalSampling {
        component: usize,
        h_in: usize,
        v_in: usize,
        h_out: usize,
        v_out: usize,
    },
    #[error("CCIR601 sampling not implemented yet")]
    Ccir601NotImplemented,
    #[error("Unsupported color conversion from {0:?} to {1:?}")]
    UnsupportedColorConversion(ColorSpace, ColorSpace),
    #[error("Bogus sampling factors {0}x{1}")]
    BadSamplingFactors(usize, usize),
    #[error("Invalid component count {0}, max is {max}", max = crate::MAX_COMPONENTS)]
    ComponentCount(usize),
    #[error("Invalid number of components in scan: {0}, max is {max}", max = crate::MAX_COMPS_IN_SCAN)]
    ComponentsInScan(usize),
    #[error("Sampling factors too large for interleaved scan ({0} blocks per MCU)")]
    McuTooLarge(usize),
    #[error("Empty image {0}x{1}")]
    EmptyImage(usize, usize),
    #[error("Image too big: {0}x{1}, max is {max}", max = crate::MAX_DIMENSION)]
    ImageTooBig(usize, usize),
    #[error("Unsupported sample precision {0}, expected {1}")]
    BadPrecision(u32, u32),
    #[error("Invalid scan script entry {scan}: {reason}")]
    InvalidScanScript { scan: usize, reason: &'static str },
    #[error("Application transferred too few scanlines")]
    TooLittleData,
    #[error("Suspension not allowed here")]
    CantSuspend,
    #[error("Buffer too small: need {needed} rows, got {available}")]
    BufferSize { needed: usize, available: usize },
    #[error("Row too short: need {needed} samples, got {available}")]
    RowTooShort { needed: usize, available: usize },
    #[error("Arithmetic coding is not available")]
    ArithmeticNotSupported,
    #[error("No {0} module was configured")]
    MissingModule(&'static str),
    #[error("Datastream contains no image")]
    NoImage,
    #[error("Didn't expect more than one scan")]
    EoiExpected,
    #[error("Invalid file structure: SOF marker without SOS")]
    SofWithoutSos,
    #[error("Bogus virtual array access: rows {start}..{end} of {height}")]
    BadVirtualAccess {
        start: usize,
        end: usize,
        height: usize,
    },
    #[error("Virtual array accessed before it was realized")]
    VirtualArrayNotRealized,
    #[error("Coefficient arrays do not match the image geometry")]
    CoefficientGeometry,
    #[error("Bogus buffer control mode")]
    BadBufferMode,
    #[error("Color converter expects {expected} components, got {found}")]
    ConverterComponents { expected: usize, found: usize },
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadState(_)
            | Error::BufferSize { .. }
            | Error::RowTooShort { .. }
            | Error::MissingModule(_)
            | Error::NoImage
            | Error::InvalidScanScript { .. }
            | Error::CoefficientGeometry
            | Error::BadVirtualAccess { .. }
            | Error::VirtualArrayNotRealized => ErrorKind::Usage,
            Error::FractionalSampling { .. }
            | Error::Ccir601NotImplemented
            | Error::UnsupportedColorConversion(..)
            | Error::BadSamplingFactors(..)
            | Error::ComponentCount(_)
            | Error::ComponentsInScan(_)
            | Error::McuTooLarge(_)
            | Error::EmptyImage(..)
            | Error::ImageTooBig(..)
            | Error::BadPrecision(..)
            | Error::ArithmeticNotSupported => ErrorKind::UnsupportedConfiguration,
            Error::TooLittleData => ErrorKind::DataInsufficiency,
            Error::CantSuspend | Error::BadBufferMode | Error::ConverterComponents { .. } => {
                ErrorKind::InternalConsistency
            }
            Error::EoiExpected | Error::SofWithoutSos | Error::CorruptData(_) => {
                ErrorKind::CorruptData
            }
            Error::OutOfMemory(_) => ErrorKind::Resource,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
