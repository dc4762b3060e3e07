// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::{error::Result, util::tracing_wrappers::*};

mod private {
    pub trait Sealed {}
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DataTypeTag {
    U8,
    U16,
}

/// A component sample. 8-bit files use `u8`, 12-bit files use `u16`.
pub trait Sample: private::Sealed + Copy + Default + 'static + Debug + PartialEq {
    /// ID of this data type. Different types *must* have different values.
    const DATA_TYPE_ID: DataTypeTag;
    /// Bits of precision of the samples, as stored in the frame header.
    const BITS: u32;
    const MAX_VALUE: i32;
    const CENTER: i32;

    /// Converts an in-range value. Callers clamp beforehand.
    fn from_i32(v: i32) -> Self;
    fn to_i32(self) -> i32;

    #[inline(always)]
    fn index(self) -> usize {
        self.to_i32() as usize
    }

    #[cfg(test)]
    fn random<R: rand::Rng>(rng: &mut R) -> Self {
        Self::from_i32(rng.random_range(0..=Self::MAX_VALUE))
    }
}

macro_rules! impl_sample {
    ($ty: ty, $id: ident, $bits: expr) => {
        impl private::Sealed for $ty {}
        impl Sample for $ty {
            const DATA_TYPE_ID: DataTypeTag = DataTypeTag::$id;
            const BITS: u32 = $bits;
            const MAX_VALUE: i32 = (1 << $bits) - 1;
            const CENTER: i32 = 1 << ($bits - 1);

            #[inline(always)]
            fn from_i32(v: i32) -> $ty {
                v as $ty
            }

            #[inline(always)]
            fn to_i32(self) -> i32 {
                self as i32
            }
        }
    };
}

impl_sample!(u8, U8, 8);
impl_sample!(u16, U16, 12);

/// A plane of samples stored row by row.
pub struct Image<S: Sample> {
    size: (usize, usize),
    data: Vec<S>,
}

impl<S: Sample> Debug for Image<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}x{}", S::DATA_TYPE_ID, self.size.0, self.size.1)
    }
}

impl<S: Sample> Image<S> {
    #[instrument(err)]
    pub fn new(size: (usize, usize)) -> Result<Image<S>> {
        let (xsize, ysize) = size;
        let total_size = xsize * ysize;
        let mut data = vec![];
        data.try_reserve_exact(total_size)?;
        data.resize(total_size, S::default());
        Ok(Image { size, data })
    }

    pub fn new_with_value(size: (usize, usize), value: S) -> Result<Image<S>> {
        let mut img = Self::new(size)?;
        img.data.fill(value);
        Ok(img)
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.0
    }

    pub fn height(&self) -> usize {
        self.size.1
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[S] {
        debug_assert!(row < self.size.1);
        let start = row * self.size.0;
        &self.data[start..start + self.size.0]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [S] {
        debug_assert!(row < self.size.1);
        let start = row * self.size.0;
        &mut self.data[start..start + self.size.0]
    }

    /// Copies `src_row` onto each of the rows `dst_rows`.
    pub fn replicate_row(&mut self, src_row: usize, dst_rows: std::ops::Range<usize>) {
        let width = self.size.0;
        for dst in dst_rows {
            if dst != src_row {
                self.data
                    .copy_within(src_row * width..(src_row + 1) * width, dst * width);
            }
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[S]> {
        self.data.chunks_exact(self.size.0.max(1)).take(self.size.1)
    }

    pub fn try_clone(&self) -> Result<Self> {
        let mut data = vec![];
        data.try_reserve_exact(self.data.len())?;
        data.extend_from_slice(&self.data);
        Ok(Self {
            size: self.size,
            data,
        })
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn sample_ranges() {
        assert_eq!(u8::MAX_VALUE, 255);
        assert_eq!(u8::CENTER, 128);
        assert_eq!(u16::MAX_VALUE, 4095);
        assert_eq!(u16::CENTER, 2048);
    }

    #[test]
    fn replicate_rows() -> Result<()> {
        let mut img = Image::<u8>::new((3, 4))?;
        img.row_mut(1).copy_from_slice(&[1, 2, 3]);
        img.replicate_row(1, 1..4);
        assert_eq!(img.row(3), &[1, 2, 3]);
        assert_eq!(img.row(0), &[0, 0, 0]);
        Ok(())
    }
}
