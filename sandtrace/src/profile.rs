/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The sandbox profile. The tracer never looks inside it; it only moves it
//! from its own stdin to the target's stdin.

use std::io::Read;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// An opaque sandbox profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Value);

impl Profile {
    /// Decodes a single JSON document from `reader`. Trailing whitespace is
    /// allowed, anything else after the document is an error.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Encodes the profile in its wire form: compact JSON with object keys in
    /// sorted order. Encoding a decoded wire form yields the same bytes.
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

impl From<Value> for Profile {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
