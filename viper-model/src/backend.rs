// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The verification backend that produced the model under inspection.
///
/// Fixed for the lifetime of a session; selects the type-inference heuristics
/// and the canonical null-reference name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationBackend {
    Silicon,
    Carbon,
}

impl VerificationBackend {
    /// Parses the backend tag the way the host tool reports it: any tag
    /// containing `silicon` or `carbon` (case-insensitive) selects the
    /// respective backend.
    pub fn from_tag(tag: &str) -> Option<VerificationBackend> {
        let lower = tag.to_lowercase();
        if lower.contains("silicon") {
            Some(VerificationBackend::Silicon)
        } else if lower.contains("carbon") {
            Some(VerificationBackend::Carbon)
        } else {
            None
        }
    }
}

impl fmt::Display for VerificationBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VerificationBackend::Silicon => write!(f, "silicon"),
            VerificationBackend::Carbon => write!(f, "carbon"),
        }
    }
}
