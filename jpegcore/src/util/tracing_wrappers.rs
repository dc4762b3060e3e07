// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub use tracing::{debug, error, info, instrument, trace, warn};

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub use jpegcore_macros::noop as instrument;

#[cfg(not(feature = "tracing"))]
macro_rules! __disabled_log {
    ($($tt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use {
    __disabled_log as debug, __disabled_log as error, __disabled_log as info,
    __disabled_log as trace, __disabled_log as warn,
};
