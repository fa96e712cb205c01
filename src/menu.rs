//! Interactive target selection.
//!
//! The menu reads from any [`BufRead`] and writes its prompts to any
//! [`Write`], so it can be driven from stdin or from a buffer.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::address::{
    cloudflare_targets, parse_cloudflare_choice, parse_target, Target, TargetError,
    CLOUDFLARE_CIDRS,
};

/// Why a menu action produced no target.
#[derive(Debug, Error)]
pub enum MenuError {
    /// The top-level choice is not one of the listed entries.
    #[error("Invalid selection '{0}'. Pick 1, 2 or 3")]
    InvalidSelection(String),

    /// The address or table entry typed by the operator is invalid.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Reading input or writing a prompt failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Input ended before the action completed.
    #[error("Input closed")]
    Closed,
}

/// Prompts the operator for a target.
pub struct Menu<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    /// Creates a menu over an input and an output.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Runs one action of the menu and returns the targets it selected.
    ///
    /// Manual and single-block scans give one target, the full table gives
    /// one per block. An error aborts only this action; callers may run the
    /// menu again.
    pub fn run(&mut self) -> Result<Vec<Target>, MenuError> {
        writeln!(self.output, "[1] Manual Scan (Custom IP/Subnet)")?;
        writeln!(self.output, "[2] Auto Scan (Choose One Cloudflare CIDR)")?;
        writeln!(self.output, "[3] Auto Scan (All Cloudflare CIDRs)")?;
        let choice = self.prompt("Choose option: ")?;

        match choice.as_str() {
            "1" => Ok(vec![self.manual()?]),
            "2" => Ok(vec![self.single_cidr()?]),
            "3" => Ok(cloudflare_targets()?),
            _ => Err(MenuError::InvalidSelection(choice)),
        }
    }

    fn manual(&mut self) -> Result<Target, MenuError> {
        writeln!(self.output, "IP Example: 192.168.1.1/24")?;
        let start = self.prompt("Please Enter start IP: ")?;
        if start.contains('/') {
            return Ok(parse_target(&start, None)?);
        }

        let end = self.prompt("Please Enter last IP of the network: ")?;
        Ok(parse_target(&start, Some(&end))?)
    }

    fn single_cidr(&mut self) -> Result<Target, MenuError> {
        writeln!(self.output, "Cloudflare CIDRs:")?;
        for (number, cidr) in CLOUDFLARE_CIDRS.iter().enumerate() {
            writeln!(self.output, "[{}] {cidr}", number + 1)?;
        }
        let choice = self.prompt("Choose CIDR (number): ")?;
        Ok(parse_cloudflare_choice(&choice)?)
    }

    fn prompt(&mut self, label: &str) -> Result<String, MenuError> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(MenuError::Closed);
        }
        Ok(line.trim().to_owned())
    }
}
