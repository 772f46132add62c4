//! Renderer collaborator interface

use lp_core::ErrorKind;

use crate::spec::{FigurePatch, FigureSpec};

/// Where published figures go.
///
/// Implemented by the renderer collaborator. `on_figure` carries a
/// full specification, `on_patch` an incremental change to the last
/// published one, `on_error` a terminal failure after which no further
/// publications arrive for the chart instance.
pub trait FigureSink: Send + Sync {
    fn on_figure(&self, figure: &FigureSpec);

    fn on_patch(&self, patch: &FigurePatch);

    fn on_error(&self, kind: ErrorKind, message: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl FigureSink for NullSink {
    fn on_figure(&self, _figure: &FigureSpec) {}

    fn on_patch(&self, _patch: &FigurePatch) {}

    fn on_error(&self, _kind: ErrorKind, _message: &str) {}
}
