// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Study tree engine.
//!
//! A study is a directory of record files, numeric matrices, and opaque
//! artifacts laid out after a fixed schema. This crate exposes a study as a
//! lazily built tree of nodes addressable by slash-delimited paths, and
//! layers a command system on top of it: serializable mutations that can be
//! matched, diffed, and replayed in order to regenerate a variant study from
//! a base study.
//!
//! # Layers
//!
//! - [`ini`]: record file codec.
//! - [`matrix`]: matrices and content-addressed matrix repositories.
//! - [`study`]: study configuration and the [`study::FileStudy`] bundle.
//! - [`tree`]: schema-driven node tree with addressing and references.
//! - [`command`]: study mutations.
//! - [`variant`]: variant generation from a command log.
//! - [`settings`] and [`path`]: settings file and default locations.

pub mod command;
pub mod ini;
pub mod matrix;
pub mod path;
pub mod settings;
pub mod study;
pub mod tree;
pub mod variant;
