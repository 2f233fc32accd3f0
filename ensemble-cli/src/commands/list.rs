//! `ensemble list`: show the registry of a session.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ensemble_core::coordinator::{load_counter, load_registry};
use ensemble_core::Registry;
use ensemble_store::{session_dir_at, FileStore};

/// Arguments for `ensemble list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Session to inspect (defaults to the configured session).
    #[arg(long, short = 's')]
    pub session: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ListReport {
    session: String,
    counter: u64,
    instances: Registry,
}

#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "x")]
    x: f64,
    #[tabled(rename = "y")]
    y: f64,
    #[tabled(rename = "width")]
    width: f64,
    #[tabled(rename = "height")]
    height: f64,
    #[tabled(rename = "metadata")]
    metadata: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let session = super::resolve_session(&home, self.session)?;

        let report = if session_dir_at(&home, &session).exists() {
            let store = FileStore::open_at(&home, &session)
                .with_context(|| format!("failed to open session '{session}'"))?;
            ListReport {
                counter: load_counter(&store)
                    .with_context(|| format!("failed to read counter of '{session}'"))?,
                instances: load_registry(&store)
                    .with_context(|| format!("failed to read registry of '{session}'"))?,
                session,
            }
        } else {
            ListReport {
                session,
                counter: 0,
                instances: Registry::new(),
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render JSON")?
            );
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

fn print_table(report: ListReport) {
    println!(
        "{} {}  {} instance(s), counter {}",
        "session".bold(),
        report.session.cyan(),
        report.instances.len(),
        report.counter
    );
    if report.instances.is_empty() {
        println!("{}", "no instances registered".dimmed());
        return;
    }

    let rows: Vec<InstanceRow> = report
        .instances
        .iter()
        .map(|record| InstanceRow {
            id: record.id.0,
            x: record.shape.x,
            y: record.shape.y,
            width: record.shape.width,
            height: record.shape.height,
            metadata: record.metadata.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
