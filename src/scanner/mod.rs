//! Core functionality for sweeping an address range.
//!
//! [`Scanner`] walks an [`AddressRange`] once, in order, and hands every
//! address to a [`Probe`] running on its own tokio task. At most
//! `concurrency` probes are in flight at any time. Completed probes are
//! drained by a single stream, which is the only place results are appended
//! to, so no lock guards the result list.
mod probe;
pub use probe::{HttpProbe, IcmpLiveness, Liveness, Outcome, Probe, ProbeConfig, ScanResult};

use crate::range::AddressRange;
use colored::Colorize;
use futures::{future, stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::{
    fmt,
    net::Ipv4Addr,
    num::NonZeroUsize,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

/// Probes are network bound, so many more of them than cores can run at once.
const WORKERS_PER_CPU: usize = 50;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} IP ({per_sec}, {eta})";

/// Number of available processing units times fifty.
#[must_use]
pub fn default_concurrency() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get) * WORKERS_PER_CPU
}

/// How a scan runs and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Maximum number of probes in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Print every result as soon as it arrives.
    pub verbose: bool,
    /// No progress bar or decorations, only result lines.
    pub greppable: bool,
    /// No colours or animations.
    pub accessible: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            verbose: true,
            greppable: false,
            accessible: false,
        }
    }
}

/// What a finished scan found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Results in the order probes completed.
    pub results: Vec<ScanResult>,
    /// Wall-clock duration of the scan.
    pub elapsed: Duration,
    /// Start bound of the scanned range.
    pub start: Ipv4Addr,
    /// End bound of the scanned range.
    pub end: Ipv4Addr,
    /// Number of probes that completed, responsive or not.
    pub probed: u64,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "It took {:.2}s to scan IPs from {} to {}",
            self.elapsed.as_secs_f64(),
            self.start,
            self.end
        )
    }
}

/// Runs a probe against every address of a range.
///
/// The scanner can be reused for several ranges; each call to
/// [`Scanner::run`] takes a fresh cursor from the range.
pub struct Scanner<P> {
    probe: Arc<P>,
    config: ScanConfig,
}

impl<P: Probe + 'static> Scanner<P> {
    /// Creates a scanner around a probe.
    pub fn new(probe: P, config: ScanConfig) -> Self {
        Self {
            probe: Arc::new(probe),
            config,
        }
    }

    /// Settings this scanner was built with.
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Probes every address of `range` and returns what answered.
    ///
    /// The progress total is [`AddressRange::len`], so the bar may end short
    /// of or past 100% for ranges spanning several octets.
    pub async fn run(&self, range: &AddressRange) -> ScanReport {
        let concurrency = self.config.concurrency.max(1);
        let progress = self.progress_bar(range.len());

        debug!(
            "Start scanning {}.\nConcurrency {}\nEstimated addresses {}\nActual addresses {}",
            range,
            concurrency,
            range.len(),
            range.address_count()
        );

        let started = Instant::now();
        let mut probed: u64 = 0;

        let results = stream::iter(range.iter())
            .map(|address| {
                let probe = Arc::clone(&self.probe);
                tokio::spawn(async move { probe.probe(address).await })
            })
            .buffer_unordered(concurrency)
            .filter_map(|joined| {
                probed += 1;
                progress.inc(1);

                let result = joined.unwrap_or_else(|e| {
                    warn!("Probe task failed: {e}");
                    None
                });
                if let Some(result) = &result {
                    self.report(&progress, result);
                }
                future::ready(result)
            })
            .collect::<Vec<_>>()
            .await;

        progress.finish();
        let elapsed = started.elapsed();

        debug!("Probed {probed} addresses, {} answered", results.len());
        ScanReport {
            results,
            elapsed,
            start: range.start_ip(),
            end: range.end_ip(),
            probed,
        }
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if self.config.greppable || self.config.accessible {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        ProgressBar::new(total).with_style(style)
    }

    fn report(&self, progress: &ProgressBar, result: &ScanResult) {
        if self.config.greppable {
            println!("{result}");
        } else if self.config.verbose {
            if self.config.accessible {
                println!("Live {result}");
            } else {
                progress.println(format!(
                    "Live {} {}",
                    result.address.to_string().purple(),
                    result.outcome
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quiet(concurrency: usize) -> ScanConfig {
        ScanConfig {
            concurrency,
            verbose: false,
            greppable: true,
            accessible: true,
        }
    }

    fn ten_addresses() -> AddressRange {
        let mut range = AddressRange::new(10, 0, 0, 0);
        range.set_end(10, 0, 0, 11).unwrap();
        range
    }

    struct AlwaysOk;

    impl Probe for AlwaysOk {
        fn probe(&self, address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>> {
            future::ready(Some(ScanResult::new(address, Outcome::Status(200)))).boxed()
        }
    }

    struct NeverAlive;

    impl Probe for NeverAlive {
        fn probe(&self, _address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>> {
            future::ready(None).boxed()
        }
    }

    struct PanicsOnEven;

    impl Probe for PanicsOnEven {
        fn probe(&self, address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>> {
            async move {
                assert!(address.octets()[3] % 2 == 1, "even address");
                Some(ScanResult::new(address, Outcome::Status(200)))
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct CountsInFlight {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Probe for CountsInFlight {
        fn probe(&self, address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>> {
            async move {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Some(ScanResult::new(address, Outcome::Status(204)))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn live_hosts_are_all_collected() {
        let scanner = Scanner::new(AlwaysOk, quiet(4));
        let report = scanner.run(&ten_addresses()).await;

        assert_eq!(report.results.len(), 10);
        assert!(report
            .results
            .iter()
            .all(|result| result.outcome == Outcome::Status(200)));
        assert!(report.elapsed > Duration::ZERO);
        assert_eq!(report.probed, 10);
        assert_eq!(report.start, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(report.end, Ipv4Addr::new(10, 0, 0, 11));
    }

    #[tokio::test]
    async fn dead_hosts_are_dropped() {
        let scanner = Scanner::new(NeverAlive, quiet(4));
        let report = scanner.run(&ten_addresses()).await;

        assert!(report.results.is_empty());
        assert_eq!(report.probed, 10);
    }

    #[tokio::test]
    async fn panicking_probe_does_not_abort_the_scan() {
        let scanner = Scanner::new(PanicsOnEven, quiet(3));
        let report = scanner.run(&ten_addresses()).await;

        let mut found = report
            .results
            .iter()
            .map(|result| result.address.octets()[3])
            .collect::<Vec<_>>();
        found.sort_unstable();
        assert_eq!(found, [1, 3, 5, 7, 9]);
        assert_eq!(report.probed, 10);
    }

    #[tokio::test]
    async fn in_flight_probes_never_exceed_concurrency() {
        let mut range = AddressRange::new(10, 0, 0, 0);
        range.set_end(10, 0, 1, 0).unwrap();

        let scanner = Scanner::new(CountsInFlight::default(), quiet(8));
        let report = scanner.run(&range).await;

        assert_eq!(report.results.len(), 255);
        assert!(scanner.probe.peak.load(Ordering::SeqCst) <= 8);
    }

    #[tokio::test]
    async fn zero_concurrency_still_scans() {
        let scanner = Scanner::new(AlwaysOk, quiet(0));
        let report = scanner.run(&ten_addresses()).await;
        assert_eq!(report.results.len(), 10);
    }

    #[tokio::test]
    async fn empty_range_finishes_immediately() {
        let mut range = AddressRange::new(10, 0, 0, 1);
        range.set_end(10, 0, 0, 1).unwrap();

        let scanner = Scanner::new(AlwaysOk, quiet(4));
        let report = scanner.run(&range).await;
        assert!(report.results.is_empty());
        assert_eq!(report.probed, 0);
    }

    #[test]
    fn summary_line() {
        let report = ScanReport {
            results: vec![],
            elapsed: Duration::from_millis(1_234),
            start: Ipv4Addr::new(104, 16, 0, 0),
            end: Ipv4Addr::new(104, 31, 255, 255),
            probed: 0,
        };
        assert_eq!(
            report.to_string(),
            "It took 1.23s to scan IPs from 104.16.0.0 to 104.31.255.255"
        );
    }

    #[test]
    fn default_concurrency_scales_with_cores() {
        let concurrency = default_concurrency();
        assert!(concurrency >= WORKERS_PER_CPU);
        assert_eq!(concurrency % WORKERS_PER_CPU, 0);
        assert_eq!(ScanConfig::default().concurrency, concurrency);
    }
}
