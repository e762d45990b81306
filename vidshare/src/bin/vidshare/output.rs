use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use vidshare::{CascadeReport, ChannelStats, integrity::StepStatus};

use crate::theme::{ICONS, THEME};

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Data that can be rendered as a table.
pub trait TableDisplay {
    fn to_table(&self, output: &OutputManager) -> Table;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }
        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Table => println!("{}", data.to_table(self)),
        }
        Ok(())
    }

    fn line(&self, icon: &str, message: &str, color: Color) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.success, message, THEME.success));
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(ICONS.error, message, THEME.error));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.warning, message, THEME.warning));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.info, message, THEME.info));
        }
    }

    pub fn bullet(&self, text: &str) {
        if self.options.quiet {
            return;
        }
        if self.options.no_color {
            println!("  {} {text}", ICONS.bullet);
        } else {
            println!("  {} {text}", ICONS.bullet.color(THEME.muted));
        }
    }

    pub fn create_table(&self) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }
        table
    }

    pub fn add_table_header(&self, table: &mut Table, headers: &[&str]) {
        let cells = headers.iter().map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if self.options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        });
        table.set_header(cells.collect::<Vec<_>>());
    }

    pub fn key_value(&self, table: &mut Table, key: &str, value: impl ToString) {
        let key_cell = Cell::new(key).add_attribute(Attribute::Bold);
        let key_cell = if self.options.no_color {
            key_cell
        } else {
            key_cell.fg(TableColor::Cyan)
        };
        table.add_row(vec![key_cell, Cell::new(value.to_string())]);
    }

    pub fn heading(&self, text: &str) {
        if self.options.quiet {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.len()));
        } else {
            println!("\n{}", text.color(THEME.primary).bold());
        }
    }
}

impl TableDisplay for ChannelStats {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Field", "Value"]);
        output.key_value(&mut table, "Channel", &self.profile.username);
        output.key_value(&mut table, "Name", &self.profile.full_name);
        output.key_value(&mut table, "Videos", self.total_videos);
        output.key_value(&mut table, "Views", self.total_views);
        output.key_value(&mut table, "Subscribers", self.total_subscribers);
        output.key_value(&mut table, "Likes", self.total_likes);
        table
    }
}

impl TableDisplay for CascadeReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Step", "Subject", "Result"]);
        for outcome in &self.steps {
            let (icon, detail, color) = match &outcome.status {
                StepStatus::Done { affected } => (ICONS.check, format!("{affected} affected"), TableColor::Green),
                StepStatus::Failed { error } => (ICONS.cross, error.clone(), TableColor::Red),
            };
            let result = Cell::new(format!("{icon} {detail}"));
            let result = if output.options.no_color { result } else { result.fg(color) };
            table.add_row(vec![
                Cell::new(outcome.step.as_str()),
                Cell::new(outcome.subject.as_deref().unwrap_or("-")),
                result,
            ]);
        }
        table
    }
}
