//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]
#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod ip;
pub mod kvstore;
pub mod mpls;
pub mod prefix;
pub mod southbound;
pub mod task;

pub type Sender<T> = tokio::sync::mpsc::Sender<T>;
pub type Receiver<T> = tokio::sync::mpsc::Receiver<T>;
pub type Responder<T> = tokio::sync::oneshot::Sender<T>;
pub type UnboundedSender<T> = tokio::sync::mpsc::UnboundedSender<T>;
pub type UnboundedReceiver<T> = tokio::sync::mpsc::UnboundedReceiver<T>;
