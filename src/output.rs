//! Appends scan results to a text file, one line per result.
//!
//! The file is opened in append mode and created when missing. It is never
//! truncated, so results from several scans and sessions pile up.
use crate::scanner::ScanResult;
use std::io;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

/// Default results file, relative to the working directory.
pub const DEFAULT_RESULTS_FILE: &str = "results.txt";

/// Appends every result as a line of `path`.
pub async fn append_results(path: &Path, results: &[ScanResult]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let lines = results
        .iter()
        .map(|result| format!("{result}\n"))
        .collect::<String>();

    file.write_all(lines.as_bytes()).await?;
    file.flush().await
}

/// Absolute location of the results file, for the closing message.
#[must_use]
pub fn resolved_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::{append_results, resolved_path};
    use crate::scanner::{Outcome, ScanResult};
    use std::net::Ipv4Addr;
    use std::path::{Path, PathBuf};

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "ipsweep-output-{}-{name}.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn appends_without_truncating() {
        let path = scratch_file("append");
        std::fs::write(&path, "earlier session\n").unwrap();

        let results = [
            ScanResult::new(Ipv4Addr::new(10, 0, 0, 1), Outcome::Status(200)),
            ScanResult::new(
                Ipv4Addr::new(10, 0, 0, 2),
                Outcome::Failed("connection reset by peer".to_owned()),
            ),
        ];
        append_results(&path, &results).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "earlier session\n10.0.0.1 200\n10.0.0.2 PING-Reply connection reset by peer\n"
        );
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn empty_results_create_an_empty_file() {
        let path = scratch_file("empty");
        append_results(&path, &[]).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let resolved = resolved_path(Path::new("results.txt"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("results.txt"));

        let absolute = std::env::temp_dir().join("results.txt");
        assert_eq!(resolved_path(&absolute), absolute);
    }
}
