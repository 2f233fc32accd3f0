//! `ensemble join [--session <name>] [--shape x,y,w,h | --shape-file <path>] [--meta <json>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use ensemble_core::Shape;
use ensemble_host::{parse_shape, start_blocking, JoinOptions, ShapeSpec};

const DEFAULT_SHAPE: Shape = Shape {
    x: 0.0,
    y: 0.0,
    width: 800.0,
    height: 600.0,
};

/// Join a session as a new instance.
#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Session to join (defaults to the configured session).
    #[arg(long, short = 's')]
    pub session: Option<String>,

    /// Fixed shape as x,y,width,height.
    #[arg(long, value_parser = parse_shape_arg, allow_hyphen_values = true)]
    pub shape: Option<Shape>,

    /// JSON file holding the shape; re-read on every tick.
    #[arg(long, conflicts_with = "shape")]
    pub shape_file: Option<PathBuf>,

    /// Application metadata stored with this instance (any JSON value).
    #[arg(long, value_parser = parse_meta_arg)]
    pub meta: Option<Value>,

    /// How often to re-check the shape, in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl JoinArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let shape = match (self.shape, self.shape_file) {
            (_, Some(path)) => ShapeSpec::File(path),
            (Some(shape), None) => ShapeSpec::Fixed(shape),
            (None, None) => ShapeSpec::Fixed(DEFAULT_SHAPE),
        };

        start_blocking(JoinOptions {
            home,
            session: self.session,
            poll_interval_ms: self.interval_ms,
            shape,
            metadata: self.meta.unwrap_or(Value::Null),
        })
        .context("instance exited with error")
    }
}

fn parse_shape_arg(raw: &str) -> std::result::Result<Shape, String> {
    parse_shape(raw).map_err(|err| err.to_string())
}

fn parse_meta_arg(raw: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(raw).map_err(|err| format!("metadata must be JSON: {err}"))
}
