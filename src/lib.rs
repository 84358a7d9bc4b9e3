// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod containers;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod pause;
pub mod reconcilers;
pub mod triggers;
pub mod upgrade;
pub mod workload;

#[cfg(test)]
pub mod test_utils;
