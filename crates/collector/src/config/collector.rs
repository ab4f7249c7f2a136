use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use dns_lookup::getaddrinfo;
use dns_lookup::AddrInfoHints;
use error_stack::Report;
use error_stack::ResultExt;
use regex::Regex;
use tracing::debug;

use super::ConfigError;
use crate::domain::sanitize;
use crate::domain::sanitize::DEFAULT_MAX_NAME_LEN;

/// Pid and client id of a ceph admin socket, in that group order.
pub const PID_CCTID_REGEX: &str = r"ceph-([0-9]*)\.([0-9]*).*";

/// Device identifier of a librbd perf counter group, in group 1.
pub const DEVICE_REGEX: &str = r"^librbd-(?:.*-)?(one-[0-9]+(?:-[0-9]+){0,2})$";

/// Settings shared by every subcommand that runs collection cycles
#[derive(Args, Debug, Clone)]
pub struct CollectorArgs {
    #[arg(
        long,
        env = "CEPH_SOCKET_PATH",
        default_value = "/var/run/ceph",
        value_hint = clap::ValueHint::DirPath,
        help = "Directory holding the ceph admin sockets"
    )]
    pub socket_path: PathBuf,

    #[arg(
        long,
        env = "CEPH_SOCKET_PREFIX",
        default_value = "ceph-",
        help = "File name prefix of admin sockets"
    )]
    pub socket_prefix: String,

    #[arg(
        long,
        env = "CEPH_SOCKET_EXT",
        default_value = "asok",
        help = "File name extension of admin sockets, without the dot"
    )]
    pub socket_ext: String,

    #[arg(
        long,
        env = "PID_CCTID_REGEX",
        default_value = PID_CCTID_REGEX,
        help = "Regex matched against the whole socket file name; \
                group 1 is the pid, group 2 the client id"
    )]
    pub pid_cctid_regex: String,

    #[arg(
        long,
        env = "DEVICE_REGEX",
        default_value = DEVICE_REGEX,
        help = "Regex matched against stat group names; group 1 is the device identifier"
    )]
    pub device_regex: String,

    #[arg(
        long,
        env = "QEMU_PID_PATH",
        default_value = "/var/run/libvirt/qemu",
        value_hint = clap::ValueHint::DirPath,
        help = "Directory of the qemu pid files"
    )]
    pub qemu_pid_path: PathBuf,

    #[arg(
        long,
        default_value = "one",
        help = "Pid files are named <prefix>-<vm id>.pid"
    )]
    pub pid_file_prefix: String,

    #[arg(
        long,
        env = "DEFAULT_METRIC_PREFIX",
        default_value = "nebulaceph",
        help = "Metric prefix for VMs without a template override"
    )]
    pub default_prefix: String,

    #[arg(
        long,
        env = "PREFIX_VARIABLE",
        default_value = "DIAMOND_PREFIX",
        help = "VM template variable overriding the metric prefix"
    )]
    pub prefix_variable: String,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_NAME_LEN,
        help = "Maximum length of a sanitized VM name or prefix"
    )]
    pub max_metric_name_len: usize,

    #[arg(
        long,
        env = "INVENTORY_COMMAND",
        value_delimiter = ' ',
        default_value = "onevm list -x",
        help = "Command printing the VM pool as XML"
    )]
    pub inventory_command: Vec<String>,

    #[arg(long, default_value = "30", help = "Timeout of the inventory command in seconds")]
    pub inventory_timeout_secs: u64,

    #[arg(long, default_value = "5", help = "Timeout of one admin socket query in seconds")]
    pub socket_timeout_secs: u64,

    #[arg(
        long,
        env = "NODE_HOSTNAME",
        help = "Short hostname of this node (detected when unset)"
    )]
    pub hostname: Option<String>,

    #[arg(
        long,
        env = "NODE_FQDN",
        help = "Fully-qualified hostname of this node (detected when unset)"
    )]
    pub fqdn: Option<String>,

    #[arg(
        long,
        env = "METRICS_FILE",
        value_hint = clap::ValueHint::FilePath,
        default_value = "/logs/nebula-ceph-metrics.log",
        help = "Path the gauges are written to, rotated daily"
    )]
    pub metrics_file: PathBuf,

    #[arg(
        long,
        env = "METRICS_FORMAT",
        default_value = "influx",
        help = "Metrics format, either 'influx' or 'json'"
    )]
    pub metrics_format: String,
}

/// Names this host may appear under in the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub short: String,
    pub fqdn: String,
}

impl HostIdentity {
    pub fn new(short: impl Into<String>, fqdn: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            fqdn: fqdn.into(),
        }
    }

    /// Fills in whatever was not given from the kernel hostname.
    ///
    /// The fully-qualified name is the resolver's canonical name of the
    /// kernel hostname, falling back to the kernel hostname itself.
    pub fn detect(
        short: Option<String>,
        fqdn: Option<String>,
    ) -> Result<Self, Report<ConfigError>> {
        if let (Some(short), Some(fqdn)) = (&short, &fqdn) {
            return Ok(Self::new(short.clone(), fqdn.clone()));
        }

        let kernel = hostname::get()
            .change_context(ConfigError::Hostname)?
            .into_string()
            .map_err(|raw| {
                Report::new(ConfigError::Hostname)
                    .attach_printable(format!("hostname is not valid UTF-8: {raw:?}"))
            })?;
        let canonical = canonical_name(&kernel);
        let detected = Self::from_names(&kernel, canonical.as_deref());

        Ok(Self {
            short: short.unwrap_or(detected.short),
            fqdn: fqdn.unwrap_or(detected.fqdn),
        })
    }

    /// Builds the identity from the kernel hostname and its canonical name.
    ///
    /// A canonical name without a domain part is ignored.
    pub fn from_names(kernel: &str, canonical: Option<&str>) -> Self {
        let short = kernel.split('.').next().unwrap_or(kernel);
        let fqdn = canonical
            .filter(|name| name.contains('.'))
            .unwrap_or(kernel);
        Self::new(short, fqdn)
    }

    pub fn matches(&self, hostname: &str) -> bool {
        hostname == self.short || hostname == self.fqdn
    }
}

/// Canonical name of `hostname` according to the system resolver.
fn canonical_name(hostname: &str) -> Option<String> {
    let hints = AddrInfoHints {
        flags: libc::AI_CANONNAME,
        ..AddrInfoHints::default()
    };
    let mut addrs = match getaddrinfo(Some(hostname), None, Some(hints)) {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!(hostname, error = ?e, "Canonical hostname lookup failed");
            return None;
        }
    };
    addrs.find_map(|addr| addr.ok().and_then(|addr| addr.canonname))
}

/// Validated settings of the collection pipeline
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub socket_dir: PathBuf,
    pub socket_prefix: String,
    pub socket_ext: String,
    /// Anchored; group 1 is the pid, group 2 the client id
    pub pid_cctid_regex: Regex,
    /// Group 1 is the device identifier
    pub device_regex: Regex,
    pub qemu_pid_path: PathBuf,
    pub pid_file_prefix: String,
    /// Already sanitized
    pub default_prefix: String,
    pub prefix_variable: String,
    pub max_metric_name_len: usize,
    pub inventory_command: Vec<String>,
    pub inventory_timeout: Duration,
    pub socket_timeout: Duration,
    pub host: HostIdentity,
    pub metrics_format: String,
}

impl CollectorConfig {
    pub fn from_args(args: &CollectorArgs) -> Result<Self, Report<ConfigError>> {
        let host = HostIdentity::detect(args.hostname.clone(), args.fqdn.clone())?;
        Self::with_host(args, host)
    }

    /// Validates `args` against an explicit host identity.
    pub fn with_host(
        args: &CollectorArgs,
        host: HostIdentity,
    ) -> Result<Self, Report<ConfigError>> {
        let pid_cctid_regex =
            compile("pid-cctid-regex", &format!("^(?:{})$", args.pid_cctid_regex), 2)?;
        let device_regex = compile("device-regex", &args.device_regex, 1)?;

        if args.max_metric_name_len == 0 {
            return Err(Report::new(ConfigError::InvalidValue {
                name: "max-metric-name-len".to_string(),
                message: "must be at least 1".to_string(),
            }));
        }

        let default_prefix = sanitize(&args.default_prefix, args.max_metric_name_len);
        if default_prefix.is_empty() {
            return Err(Report::new(ConfigError::InvalidValue {
                name: "default-prefix".to_string(),
                message: "must not be empty".to_string(),
            }));
        }

        let inventory_command: Vec<String> = args
            .inventory_command
            .iter()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect();
        if inventory_command.is_empty() {
            return Err(Report::new(ConfigError::InvalidValue {
                name: "inventory-command".to_string(),
                message: "must not be empty".to_string(),
            }));
        }

        Ok(Self {
            socket_dir: args.socket_path.clone(),
            socket_prefix: args.socket_prefix.clone(),
            socket_ext: args.socket_ext.clone(),
            pid_cctid_regex,
            device_regex,
            qemu_pid_path: args.qemu_pid_path.clone(),
            pid_file_prefix: args.pid_file_prefix.clone(),
            default_prefix,
            prefix_variable: args.prefix_variable.clone(),
            max_metric_name_len: args.max_metric_name_len,
            inventory_command,
            inventory_timeout: Duration::from_secs(args.inventory_timeout_secs),
            socket_timeout: Duration::from_secs(args.socket_timeout_secs),
            host,
            metrics_format: args.metrics_format.clone(),
        })
    }
}

/// Compiles `pattern`, requiring at least `min_groups` capture groups.
fn compile(name: &str, pattern: &str, min_groups: usize) -> Result<Regex, Report<ConfigError>> {
    let regex = Regex::new(pattern).change_context_lazy(|| ConfigError::InvalidPattern {
        name: name.to_string(),
        pattern: pattern.to_string(),
    })?;

    // captures_len counts the implicit whole-match group
    let groups = regex.captures_len() - 1;
    if groups < min_groups {
        return Err(Report::new(ConfigError::CaptureGroups {
            name: name.to_string(),
            expected: min_groups,
            found: groups,
        }));
    }
    Ok(regex)
}
