//! This crate exposes the internal functionality of the `ipsweep` IPv4
//! sweeper.
//!
//! `ipsweep` walks an IPv4 range, pings every address and sends a plain HTTP
//! request to each host that answers. The status line of every reply is
//! recorded and appended to a results file.
//!
//! ## Architecture Overview
//!
//! The core scanning behaviour is managed by
//! [`Scanner`](crate::scanner::Scanner) which in turn requires an
//! [`AddressRange`](crate::range::AddressRange) and a
//! [`Probe`](crate::scanner::Probe). The scanning process follows this flow:
//!
//! 1. **Target selection**: command line flags, the interactive menu or the
//!    Cloudflare CIDR table produce address ranges
//! 2. **Enumeration**: each range hands out its addresses in increasing order
//! 3. **Probing**: a bounded number of tokio tasks ping addresses and query
//!    the HTTP server of live hosts
//! 4. **Result processing**: answers are collected, printed and appended to
//!    the results file
//!
//! ## Basic Usage Example
//!
//! Any type implementing [`Probe`](crate::scanner::Probe) can drive a scan.
//! The production probe is [`HttpProbe`](crate::scanner::HttpProbe); the
//! example below answers for every address without touching the network:
//!
//! ```rust
//! use futures::future::{self, BoxFuture, FutureExt};
//! use std::net::Ipv4Addr;
//!
//! use ipsweep::range::AddressRange;
//! use ipsweep::scanner::{Outcome, Probe, ScanConfig, ScanResult, Scanner};
//!
//! struct Everyone;
//!
//! impl Probe for Everyone {
//!     fn probe(&self, address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>> {
//!         future::ready(Some(ScanResult::new(address, Outcome::Status(200)))).boxed()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let range: AddressRange = "192.168.1.0/28".parse().unwrap();
//!
//!     let config = ScanConfig {
//!         concurrency: 4,
//!         greppable: true,
//!         ..ScanConfig::default()
//!     };
//!     let report = Scanner::new(Everyone, config).run(&range).await;
//!
//!     // The start and end bounds are never probed.
//!     assert_eq!(report.results.len(), 14);
//!     println!("{report}");
//! }
//! ```
#![allow(clippy::needless_doctest_main)]
#![warn(missing_docs)]

pub mod tui;

pub mod input;

pub mod range;

pub mod scanner;

pub mod address;

pub mod menu;

pub mod output;
