//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod api;
pub mod config;
pub mod debug;
pub mod entries;
pub mod error;
pub mod events;
pub mod instance;
pub mod key;
pub mod labels;
pub mod origination;
pub mod redistribution;
pub mod sync;
pub mod tasks;
