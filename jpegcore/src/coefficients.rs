// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Full-image coefficient buffers. Arrays are requested while a pipeline is
//! being built, allocated together by [`CoefficientStore::realize`], and
//! then accessed one window of block rows at a time.

use crate::{
    DCTSIZE2,
    component::FrameGeometry,
    error::{Error, Result},
};

/// Quantized DCT coefficients of one 8x8 block, in natural order.
pub type Block = [i16; DCTSIZE2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualArrayId(usize);

#[derive(Debug, Clone)]
struct BlockArray {
    width: usize,
    height: usize,
    max_access_rows: usize,
    blocks: Vec<Block>,
    realized: bool,
}

/// A read-only window of consecutive block rows.
#[derive(Debug, Clone, Copy)]
pub struct BlockWindow<'a> {
    width: usize,
    blocks: &'a [Block],
}

impl<'a> BlockWindow<'a> {
    pub fn row(&self, row: usize) -> &'a [Block] {
        &self.blocks[row * self.width..(row + 1) * self.width]
    }

    pub fn num_rows(&self) -> usize {
        self.blocks.len() / self.width.max(1)
    }
}

/// A writable window of consecutive block rows.
#[derive(Debug)]
pub struct BlockWindowMut<'a> {
    width: usize,
    blocks: &'a mut [Block],
}

impl BlockWindowMut<'_> {
    pub fn row(&self, row: usize) -> &[Block] {
        &self.blocks[row * self.width..(row + 1) * self.width]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [Block] {
        &mut self.blocks[row * self.width..(row + 1) * self.width]
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoefficientStore {
    arrays: Vec<BlockArray>,
}

impl CoefficientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an array of `width` x `height` blocks that will be accessed
    /// at most `max_access_rows` block rows at a time.
    pub fn request(&mut self, width: usize, height: usize, max_access_rows: usize) -> VirtualArrayId {
        self.arrays.push(BlockArray {
            width,
            height,
            max_access_rows: max_access_rows.min(height),
            blocks: vec![],
            realized: false,
        });
        VirtualArrayId(self.arrays.len() - 1)
    }

    /// Allocates every requested array that has no storage yet. Blocks start
    /// out zeroed.
    pub fn realize(&mut self) -> Result<()> {
        for array in self.arrays.iter_mut().filter(|a| !a.realized) {
            let total = array.width * array.height;
            array.blocks.try_reserve_exact(total)?;
            array.blocks.resize(total, [0; DCTSIZE2]);
            array.realized = true;
        }
        Ok(())
    }

    fn checked(&self, id: VirtualArrayId, start_row: usize, num_rows: usize) -> Result<&BlockArray> {
        let array = self.arrays.get(id.0).ok_or(Error::BadVirtualAccess {
            start: start_row,
            end: start_row + num_rows,
            height: 0,
        })?;
        if !array.realized {
            return Err(Error::VirtualArrayNotRealized);
        }
        if start_row + num_rows > array.height || num_rows > array.max_access_rows {
            return Err(Error::BadVirtualAccess {
                start: start_row,
                end: start_row + num_rows,
                height: array.height,
            });
        }
        Ok(array)
    }

    pub fn access(&self, id: VirtualArrayId, start_row: usize, num_rows: usize) -> Result<BlockWindow<'_>> {
        let array = self.checked(id, start_row, num_rows)?;
        Ok(BlockWindow {
            width: array.width,
            blocks: &array.blocks[start_row * array.width..(start_row + num_rows) * array.width],
        })
    }

    pub fn access_mut(
        &mut self,
        id: VirtualArrayId,
        start_row: usize,
        num_rows: usize,
    ) -> Result<BlockWindowMut<'_>> {
        self.checked(id, start_row, num_rows)?;
        let array = &mut self.arrays[id.0];
        Ok(BlockWindowMut {
            width: array.width,
            blocks: &mut array.blocks[start_row * array.width..(start_row + num_rows) * array.width],
        })
    }

    /// Size of an array in blocks, or `None` for an unknown id.
    pub fn dimensions(&self, id: VirtualArrayId) -> Option<(usize, usize)> {
        self.arrays.get(id.0).map(|a| (a.width, a.height))
    }

    /// Direct access to one block, for inspection and tests.
    pub fn block(&self, id: VirtualArrayId, row: usize, col: usize) -> Result<&Block> {
        let window = self.access(id, row, 1)?;
        window.row(0).get(col).ok_or(Error::BadVirtualAccess {
            start: row,
            end: row + 1,
            height: window.num_rows(),
        })
    }
}

/// One coefficient array per image component, as returned from
/// coefficient-reading decompression and consumed by coefficient-writing
/// compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefArrays {
    ids: Vec<VirtualArrayId>,
}

impl CoefArrays {
    /// Requests padded full-image arrays for every component of `geometry`.
    pub fn request(store: &mut CoefficientStore, geometry: &FrameGeometry) -> Self {
        let ids = geometry
            .components
            .iter()
            .map(|comp| {
                let (width, height) = geometry.coefficient_array_size(comp.index);
                store.request(width, height, comp.v_samp_factor)
            })
            .collect();
        Self { ids }
    }

    pub(crate) fn from_ids(ids: Vec<VirtualArrayId>) -> Self {
        Self { ids }
    }

    pub fn component(&self, component: usize) -> VirtualArrayId {
        self.ids[component]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checks that the arrays can hold the blocks of `geometry`.
    pub fn check_geometry(&self, store: &CoefficientStore, geometry: &FrameGeometry) -> Result<()> {
        if self.ids.len() != geometry.num_components() {
            return Err(Error::CoefficientGeometry);
        }
        for comp in geometry.components.iter() {
            let (width, height) = store
                .dimensions(self.ids[comp.index])
                .ok_or(Error::CoefficientGeometry)?;
            if (width, height) != geometry.coefficient_array_size(comp.index) {
                return Err(Error::CoefficientGeometry);
            }
        }
        Ok(())
    }
}
