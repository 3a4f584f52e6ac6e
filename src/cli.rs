use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

#[derive(Parser, Debug, Clone)]
#[command(name = "gitpkg")]
#[command(version)]
#[command(about = "Serve a subdirectory of a GitHub repository as an npm package tarball", long_about = None)]
#[command(after_help = "Examples:\n  \
  gitpkg --port 8080                      listen on port 8080\n  \
  PORT=3000 gitpkg -q                     listen on $PORT with warnings only\n  \
  npm install http://localhost:3000/acme/libs/packages/utils?ref=main")]
pub struct Cli {
    /// Address to bind the HTTP listener to
    #[arg(long, env = "GITPKG_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the hosting provider's REST API
    #[arg(long, env = "GITPKG_UPSTREAM_URL", default_value = "https://api.github.com")]
    pub upstream_url: String,

    /// User-Agent sent to the hosting provider
    #[arg(long, env = "GITPKG_USER_AGENT", default_value = "gitpkg-selfhost")]
    pub user_agent: String,

    /// Directory under which per-request workspaces are created (default: system temp dir)
    #[arg(long, env = "GITPKG_WORK_DIR", value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Maximum size in bytes of a downloaded repository tarball
    #[arg(long, env = "GITPKG_MAX_ARCHIVE_SIZE", default_value_t = 512 * MIB)]
    pub max_archive_size: u64,

    /// Maximum total size in bytes of the extracted package contents
    #[arg(long, env = "GITPKG_MAX_EXTRACTED_SIZE", default_value_t = 512 * MIB)]
    pub max_extracted_size: u64,

    /// Upstream connect timeout in seconds
    #[arg(long, env = "GITPKG_CONNECT_TIMEOUT", default_value_t = 30)]
    pub connect_timeout: u64,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

/// Settings shared read-only by every request.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub upstream_url: String,
    pub user_agent: String,
    pub work_dir: PathBuf,
    pub max_archive_size: u64,
    pub max_extracted_size: u64,
    pub connect_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_url: "https://api.github.com".to_string(),
            user_agent: "gitpkg-selfhost".to_string(),
            work_dir: std::env::temp_dir(),
            max_archive_size: 512 * MIB,
            max_extracted_size: 512 * MIB,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl Cli {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            upstream_url: self.upstream_url.trim_end_matches('/').to_string(),
            user_agent: self.user_agent.clone(),
            work_dir: self.work_dir.clone().unwrap_or_else(std::env::temp_dir),
            max_archive_size: self.max_archive_size,
            max_extracted_size: self.max_extracted_size,
            connect_timeout: Duration::from_secs(self.connect_timeout),
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self.quiet {
            0 => "info,gitpkg=debug",
            1 => "warn",
            _ => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["gitpkg"]).unwrap();
        assert_eq!(cli.port, 3000);
        assert_eq!(cli.bind_addr().to_string(), "0.0.0.0:3000");

        let config = cli.proxy_config();
        assert_eq!(config.upstream_url, "https://api.github.com");
        assert_eq!(config.user_agent, "gitpkg-selfhost");
        assert_eq!(config.max_archive_size, 512 * MIB);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn upstream_url_trailing_slash_is_trimmed() {
        let cli =
            Cli::try_parse_from(["gitpkg", "--upstream-url", "http://127.0.0.1:9000/"]).unwrap();
        assert_eq!(cli.proxy_config().upstream_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn quiet_flag_lowers_log_filter() {
        let cli = Cli::try_parse_from(["gitpkg"]).unwrap();
        assert_eq!(cli.default_log_filter(), "info,gitpkg=debug");
        let cli = Cli::try_parse_from(["gitpkg", "-q"]).unwrap();
        assert_eq!(cli.default_log_filter(), "warn");
        let cli = Cli::try_parse_from(["gitpkg", "-qq"]).unwrap();
        assert_eq!(cli.default_log_filter(), "error");
    }
}
