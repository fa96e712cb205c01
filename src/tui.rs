//! Terminal output helpers: status macros and the banner.
//!
//! Every macro takes the greppable and accessible flags. Greppable mode
//! prints nothing here, and accessible mode drops the coloured markers.

#[doc(hidden)]
pub use colored::Colorize;

/// Prints a warning prefixed with a red `[!]`.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!(
            "{} {}",
            $crate::tui::Colorize::bold($crate::tui::Colorize::red("[!]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                $crate::warning!($name);
            }
        }
    };
}

/// Prints a detail prefixed with a blue `[~]`.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!(
            "{} {}",
            $crate::tui::Colorize::bold($crate::tui::Colorize::blue("[~]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                $crate::detail!($name);
            }
        }
    };
}

/// Prints an outcome prefixed with a green `[>]`.
#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!(
            "{} {}",
            $crate::tui::Colorize::bold($crate::tui::Colorize::green("[>]")),
            $name
        );
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                $crate::output!($name);
            }
        }
    };
}

/// Lines of the start-up banner.
#[must_use]
pub fn banner() -> Vec<String> {
    let rule = "_".repeat(37);
    vec![
        "     Welcome to the IP header scanner".to_owned(),
        rule.clone(),
        format!("ipsweep {}", env!("CARGO_PKG_VERSION")),
        "Finds live hosts and records their HTTP answers".to_owned(),
        rule,
    ]
}

/// Prints the banner unless the output must stay plain.
pub fn print_banner(no_banner: bool, greppable: bool, accessible: bool) {
    if no_banner || greppable || accessible {
        return;
    }
    for line in banner() {
        println!("{}", line.green());
    }
    println!();
}
