use crate::Result;
use crate::collect::raw_item::RawItem;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

const LOG_TARGET: &str = "       git";

/// Produces a local copy of a repository's content.
pub trait ContentFetcher: Send + Sync {
    /// Materialize `item`'s content at `destination`, which must not exist yet.
    fn fetch(&self, item: &RawItem, destination: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Fetches content with a shallow `git clone`.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    timeout: Duration,
}

impl GitFetcher {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ContentFetcher for GitFetcher {
    async fn fetch(&self, item: &RawItem, destination: &Path) -> Result<()> {
        let Some(clone_url) = item.clone_url.as_deref() else {
            bail!("repository '{}' has no clone URL", item.full_name);
        };

        shallow_clone(clone_url, destination, self.timeout).await
    }
}

/// Clone only the latest commit of `clone_url` into `destination`.
pub async fn shallow_clone(clone_url: &str, destination: &Path, timeout: Duration) -> Result<()> {
    let start_time = std::time::Instant::now();
    let path_str = destination.to_str().into_app_err("invalid UTF-8 in clone destination")?;

    log::info!(target: LOG_TARGET, "Cloning '{clone_url}'");
    let output = run_git_with_timeout(&["clone", "--depth", "1", "--single-branch", "--no-tags", clone_url, path_str], timeout).await?;
    check_git_output(&output, "git clone")?;

    log::debug!(target: LOG_TARGET, "Cloned '{clone_url}' in {:.3}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn check_git_output(output: &Output, operation: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{operation} failed: {}", stderr.trim());
    }
    Ok(())
}

async fn run_git_with_timeout(args: &[&str], timeout: Duration) -> Result<Output> {
    let child = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .into_app_err("could not spawn git command")?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
        Err(_) => {
            bail!("'git {}' timed out after {} seconds", args.join(" "), timeout.as_secs());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitStatus;

    fn exit_status(code: i32) -> ExitStatus {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(code << 8)
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(code.cast_unsigned())
        }
    }

    #[test]
    fn test_check_git_output_success() {
        let output = Output {
            status: exit_status(0),
            stdout: vec![],
            stderr: vec![],
        };

        check_git_output(&output, "git clone").unwrap();
    }

    #[test]
    fn test_check_git_output_failure() {
        let output = Output {
            status: exit_status(128),
            stdout: vec![],
            stderr: b"fatal: repository 'https://github.com/gone/away.git/' not found\n".to_vec(),
        };

        let error_msg = check_git_output(&output, "git clone").unwrap_err().to_string();
        assert!(error_msg.contains("git clone failed"));
        assert!(error_msg.contains("not found"));
    }

    #[tokio::test]
    async fn test_fetch_without_clone_url() {
        let tmp = tempfile::tempdir().unwrap();
        let item: RawItem = serde_json::from_str(r#"{ "full_name": "octo/widget" }"#).unwrap();

        let err = GitFetcher::new(Duration::from_secs(5))
            .fetch(&item, &tmp.path().join("content"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no clone URL"));
    }

    #[tokio::test]
    async fn test_clone_of_missing_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("no-such-repo");
        let result = shallow_clone(missing.to_str().unwrap(), &tmp.path().join("content"), Duration::from_secs(30)).await;

        // Fails whether git is installed or not
        assert!(result.is_err());
        assert!(!tmp.path().join("content").exists());
    }
}
