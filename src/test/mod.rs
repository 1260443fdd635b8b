//! Shared test fixtures: a synthetic PE/CLI image builder and instrumented collaborators.

mod factories;

pub(crate) use builder::{version_block, ImageBuilder};
pub(crate) use factories::{CountingFactory, FailingFactory, PanickingFactory};
