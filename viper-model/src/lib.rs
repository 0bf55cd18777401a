// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![deny(unused_must_use)]

mod backend;
mod definitions;
pub mod errors;
mod heap;
mod model;
mod terms;

pub use backend::*;
pub use definitions::*;
pub use errors::{DecodeError, DecodeResult};
pub use heap::*;
pub use model::*;
pub use terms::*;
