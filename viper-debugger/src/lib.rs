// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![deny(unused_must_use)]

pub mod errors;
mod graph;
mod navigation;
mod records;
mod session;
mod strategy;
mod types;

pub use errors::{NavigationError, NavigationResult, SessionError, SessionResult};
pub use graph::*;
pub use navigation::*;
pub use records::*;
pub use session::*;
pub use strategy::*;
pub use types::*;
