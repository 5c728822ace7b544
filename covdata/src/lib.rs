// SPDX-License-Identifier: GPL-3.0-or-later

pub mod args;
pub mod codec;
pub mod combine;
pub mod config;
pub mod context;
pub mod data;
pub mod modes;
pub mod paths;
