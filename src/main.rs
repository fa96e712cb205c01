//! Command line entry point of the sweeper.

use anyhow::Context;
use ipsweep::address::{cloudflare_target, cloudflare_targets, parse_target, Target};
use ipsweep::input::{Config, Opts};
use ipsweep::menu::{Menu, MenuError};
use ipsweep::output::{append_results, resolved_path};
use ipsweep::scanner::{HttpProbe, Scanner};
use ipsweep::tui::print_banner;
use ipsweep::{detail, output, warning};
use log::debug;
use std::io;
use std::process;

#[cfg(unix)]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;
#[cfg(unix)]
const AVERAGE_CONCURRENCY: u64 = 3000;
// Descriptors kept back for stdio, the ICMP socket and the results file.
#[cfg(unix)]
const RESERVED_DESCRIPTORS: u64 = 100;

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = if opts.no_config {
        Config::default()
    } else {
        Config::read(opts.config_path.clone())?
    };
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    print_banner(opts.no_banner, opts.greppable, opts.accessible);

    let targets = match collect_targets(&opts) {
        Ok(targets) => targets,
        Err(message) => {
            warning!(message, opts.greppable, opts.accessible);
            process::exit(1);
        }
    };
    if targets.is_empty() {
        return Ok(());
    }

    let mut scan_config = opts.scan_config();

    #[cfg(unix)]
    {
        let ulimit = adjust_ulimit_size(&opts);
        scan_config.concurrency = infer_concurrency(&opts, scan_config.concurrency, ulimit);
    }

    let probe = HttpProbe::new(opts.probe_config())
        .context("Could not open the ICMP socket. Ping needs raw socket privileges")?;
    let scanner = Scanner::new(probe, scan_config);

    let several = targets.len() > 1;
    for target in &targets {
        if several {
            detail!(
                format!("=== Scanning {target} ==="),
                opts.greppable,
                opts.accessible
            );
        }
        if target.is_unaligned() {
            if let Some(network) = target.conventional_network() {
                warning!(
                    format!(
                        "{} is not a network address. Scanning {} instead of {network}",
                        target.range.start_ip(),
                        target.range
                    ),
                    opts.greppable,
                    opts.accessible
                );
            }
        }
        detail!(
            format!("Total number of IPs on the network is {}", target.range.len()),
            opts.greppable,
            opts.accessible
        );

        let report = scanner.run(&target.range).await;
        output!(report, opts.greppable, opts.accessible);

        append_results(&opts.output, &report.results)
            .await
            .with_context(|| format!("Could not write results to {}", opts.output.display()))?;

        let saved = resolved_path(&opts.output);
        detail!(
            format!(
                "Results saved as {} at {}",
                opts.output.display(),
                saved.parent().unwrap_or(&saved).display()
            ),
            opts.greppable,
            opts.accessible
        );
    }

    Ok(())
}

/// Targets requested on the command line, or picked from the menu when no
/// target flag is given. A command line error is returned as the message
/// to show before exiting.
fn collect_targets(opts: &Opts) -> Result<Vec<Target>, String> {
    if opts.all_cidrs {
        return cloudflare_targets().map_err(|e| e.to_string());
    }
    if let Some(choice) = opts.cidr {
        return cloudflare_target(choice)
            .map(|target| vec![target])
            .map_err(|e| e.to_string());
    }
    if let Some(address) = &opts.address {
        return parse_target(address, opts.end.as_deref())
            .map(|target| vec![target])
            .map_err(|e| e.to_string());
    }

    let stdin = io::stdin();
    let mut menu = Menu::new(stdin.lock(), io::stdout());
    match menu.run() {
        Ok(targets) => Ok(targets),
        Err(MenuError::Closed) => Ok(Vec::new()),
        Err(e) => {
            warning!(e, opts.greppable, opts.accessible);
            Ok(Vec::new())
        }
    }
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Resource::NOFILE
        .get()
        .map_or(DEFAULT_FILE_DESCRIPTORS_LIMIT, |(soft, _)| soft)
}

#[cfg(unix)]
fn infer_concurrency(opts: &Opts, requested: usize, ulimit: u64) -> usize {
    let mut concurrency = u64::try_from(requested).unwrap_or(u64::MAX);

    if ulimit < concurrency {
        warning!("File limit is lower than the concurrency. Consider upping with --ulimit. May cause harm to sensitive servers",
            opts.greppable, opts.accessible
        );

        if ulimit < AVERAGE_CONCURRENCY {
            warning!("Your file limit is very small, which negatively impacts the sweep speed. Up the Ulimit with '--ulimit 5000'. ", opts.greppable, opts.accessible);
            debug!("Halving concurrency because ulimit is smaller than average concurrency");
            concurrency = ulimit / 2;
        } else if ulimit > DEFAULT_FILE_DESCRIPTORS_LIMIT {
            debug!("Concurrency is now average concurrency");
            concurrency = AVERAGE_CONCURRENCY;
        } else {
            concurrency = ulimit - RESERVED_DESCRIPTORS;
        }
    } else if ulimit + 2 > concurrency && opts.ulimit.is_none() && ulimit > RESERVED_DESCRIPTORS {
        detail!(format!("File limit higher than concurrency. Can increase speed by increasing concurrency '-c {}'.", ulimit - RESERVED_DESCRIPTORS),
            opts.greppable, opts.accessible
        );
    }

    usize::try_from(concurrency).unwrap_or(usize::MAX).max(1)
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use super::{adjust_ulimit_size, infer_concurrency};
    use super::collect_targets;
    use ipsweep::input::Opts;

    #[test]
    #[cfg(unix)]
    fn concurrency_lowered() {
        let opts = Opts::default();
        let concurrency = infer_concurrency(&opts, 50_000, 120);

        assert_eq!(concurrency, 60);
    }

    #[test]
    #[cfg(unix)]
    fn concurrency_lowered_average_size() {
        let opts = Opts::default();
        let concurrency = infer_concurrency(&opts, 50_000, 9_000);

        assert_eq!(concurrency, 3_000);
    }

    #[test]
    #[cfg(unix)]
    fn concurrency_equals_ulimit_lowered() {
        let opts = Opts::default();
        let concurrency = infer_concurrency(&opts, 50_000, 5_000);

        assert_eq!(concurrency, 4_900);
    }

    #[test]
    #[cfg(unix)]
    fn concurrency_kept_under_ulimit() {
        let opts = Opts::default();
        let concurrency = infer_concurrency(&opts, 400, 1_024);

        assert_eq!(concurrency, 400);
    }

    #[test]
    #[cfg(unix)]
    fn concurrency_never_zero() {
        let opts = Opts::default();
        assert_eq!(infer_concurrency(&opts, 400, 1), 1);
    }

    #[test]
    #[cfg(unix)]
    fn test_high_ulimit_no_greppable_mode() {
        let opts = Opts {
            greppable: false,
            ..Opts::default()
        };

        let concurrency = infer_concurrency(&opts, 10, 1_000_000);

        assert_eq!(concurrency, 10);
    }

    #[test]
    #[cfg(unix)]
    fn current_ulimit_is_reported() {
        assert!(adjust_ulimit_size(&Opts::default()) > 0);
    }

    #[test]
    fn flags_select_targets() {
        let opts = Opts {
            all_cidrs: true,
            ..Opts::default()
        };
        assert_eq!(collect_targets(&opts).unwrap().len(), 13);

        let opts = Opts {
            cidr: Some(2),
            ..Opts::default()
        };
        assert_eq!(collect_targets(&opts).unwrap()[0].label, "172.64.0.0/13");

        let opts = Opts {
            address: Some("10.0.0.1".to_owned()),
            end: Some("10.0.0.9".to_owned()),
            ..Opts::default()
        };
        assert_eq!(collect_targets(&opts).unwrap()[0].range.address_count(), 7);
    }

    #[test]
    fn flag_errors_become_messages() {
        let opts = Opts {
            cidr: Some(14),
            ..Opts::default()
        };
        assert_eq!(
            collect_targets(&opts).unwrap_err(),
            "Invalid choice '14'. Pick a number between 1 and 13"
        );

        let opts = Opts {
            address: Some("10.0.0.1/33".to_owned()),
            ..Opts::default()
        };
        assert!(collect_targets(&opts).is_err());
    }
}
