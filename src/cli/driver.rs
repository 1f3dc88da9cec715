//! Interactive menu loop for choosing which asset to chart

use super::chart::ChartRenderer;
use super::ui;
use crate::core::dataset::{SecondaryAssetError, SecondaryAssetSource};
use crate::core::table::Table;
use anyhow::{Result, bail};
use std::io::BufRead;
use tracing::{debug, warn};

/// Line-oriented user interaction.
pub trait Console {
    /// Shows `prompt` and reads one line. `None` means input is closed.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
    fn message(&mut self, text: &str);
}

/// Reads from stdin and writes to stdout.
pub struct TerminalConsole {
    term: console::Term,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            term: console::Term::stdout(),
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let styled = ui::style_text(prompt, ui::StyleType::Prompt);
        self.term.write_str(&styled)?;
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn message(&mut self, text: &str) {
        println!("{text}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Primary,
    Secondary(String),
}

#[derive(Debug)]
pub enum DriverState {
    AwaitSelector,
    AwaitCode,
    Rendering {
        selection: Selection,
        dataset: Table,
    },
    Exited,
}

pub struct Driver<'a> {
    console: &'a mut dyn Console,
    renderer: &'a mut dyn ChartRenderer,
    source: &'a dyn SecondaryAssetSource,
    primary: Table,
    primary_name: String,
    price_column: String,
}

impl<'a> Driver<'a> {
    pub fn new(
        console: &'a mut dyn Console,
        renderer: &'a mut dyn ChartRenderer,
        source: &'a dyn SecondaryAssetSource,
        primary: Table,
        primary_name: &str,
        price_column: &str,
    ) -> Self {
        Driver {
            console,
            renderer,
            source,
            primary,
            primary_name: primary_name.to_string(),
            price_column: price_column.to_string(),
        }
    }

    /// Runs until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        let mut state = DriverState::AwaitSelector;
        while !matches!(state, DriverState::Exited) {
            state = self.step(state).await?;
        }
        Ok(())
    }

    /// Advances the loop by one transition.
    ///
    /// A selector that is not an integer is an error, as is failing to chart
    /// the primary asset. Secondary asset failures are reported and the loop
    /// continues.
    pub async fn step(&mut self, state: DriverState) -> Result<DriverState> {
        match state {
            DriverState::AwaitSelector => {
                let prompt = format!(
                    "\nType 1 for {} and 2 for any altcoin (-1 to exit): ",
                    self.primary_name
                );
                let Some(input) = self.console.read_line(&prompt)? else {
                    return Ok(DriverState::Exited);
                };
                let choice: i64 = match input.trim().parse() {
                    Ok(choice) => choice,
                    Err(e) => bail!("Invalid selector '{}': {}", input.trim(), e),
                };
                debug!("Selected {}", choice);
                Ok(match choice {
                    1 => DriverState::Rendering {
                        selection: Selection::Primary,
                        dataset: self.primary.clone(),
                    },
                    2 => DriverState::AwaitCode,
                    -1 => DriverState::Exited,
                    _ => {
                        self.report("\nInvalid choice.");
                        DriverState::AwaitSelector
                    }
                })
            }
            DriverState::AwaitCode => {
                let Some(code) = self.console.read_line("Enter altcoin code: ")? else {
                    return Ok(DriverState::Exited);
                };
                match self.source.secondary_dataset(&code, &self.primary).await {
                    Ok(dataset) => Ok(DriverState::Rendering {
                        selection: Selection::Secondary(code.trim().to_uppercase()),
                        dataset,
                    }),
                    Err(SecondaryAssetError::UnknownCode(code)) => {
                        debug!("Unknown code {}", code);
                        self.report("\nInvalid code.");
                        Ok(DriverState::AwaitSelector)
                    }
                    Err(e) => {
                        warn!("{}", e);
                        self.report(&format!("\n{e}"));
                        Ok(DriverState::AwaitSelector)
                    }
                }
            }
            DriverState::Rendering { selection, dataset } => {
                let title = match &selection {
                    Selection::Primary => format!("{} ({})", self.primary_name, self.price_column),
                    Selection::Secondary(code) => format!("{code} ({})", self.price_column),
                };
                let result = self.renderer.render(&title, &dataset, &self.price_column);
                match (result, selection) {
                    (Ok(()), _) => Ok(DriverState::AwaitSelector),
                    (Err(e), Selection::Primary) => Err(e),
                    (Err(e), Selection::Secondary(code)) => {
                        warn!("Failed to chart {}: {}", code, e);
                        self.report(&format!("\nCould not chart {code}: {e}"));
                        Ok(DriverState::AwaitSelector)
                    }
                }
            }
            DriverState::Exited => Ok(DriverState::Exited),
        }
    }

    fn report(&mut self, text: &str) {
        let styled = ui::style_text(text, ui::StyleType::Error);
        self.console.message(&styled);
    }
}
