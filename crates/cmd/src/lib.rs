// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The `dfs` command: boots a cluster over host directories and runs one
//! filesystem command through the naming server.

pub mod cluster;
pub mod commands;
