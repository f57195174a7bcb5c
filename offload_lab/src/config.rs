//! Run configuration and `--key=value` argument parsing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use offload_core::{Tolerance, Workload};
use offload_device::DeviceClass;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format `{other}` (expected text or json)")),
        }
    }
}

/// Everything one run needs, built once in `main` and passed down by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub workload: Workload,
    pub size: usize,
    pub local_size: u32,
    /// Kernel source file; defaults to the shipped kernel for `workload`.
    pub kernel_path: Option<PathBuf>,
    /// Entry point; defaults to the shipped kernel's entry for `workload`.
    pub entry_point: Option<String>,
    pub coeff: f32,
    pub tolerance: f32,
    pub seed: u64,
    pub device: DeviceClass,
    pub report: ReportFormat,
    pub list_devices: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workload: Workload::IntSum,
            size: 1 << 24,
            local_size: 8,
            kernel_path: None,
            entry_point: None,
            coeff: 3.14159,
            tolerance: Tolerance::DEFAULT_ABSOLUTE,
            seed: 0xA11CE,
            device: DeviceClass::All,
            report: ReportFormat::Text,
            list_devices: false,
        }
    }
}

impl HarnessConfig {
    pub fn kernel_path(&self) -> PathBuf {
        self.kernel_path
            .clone()
            .unwrap_or_else(|| offload_kernels::kernel_path(self.workload.kernel_file()))
    }

    pub fn entry_point(&self) -> &str {
        self.entry_point
            .as_deref()
            .unwrap_or(self.workload.entry_point())
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::absolute(self.tolerance)
    }
}

/// Applies `--key=value` overrides on top of [`HarnessConfig::default`].
pub fn parse_args<I>(args: I) -> Result<HarnessConfig>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut config = HarnessConfig::default();

    for arg in args {
        let arg = arg.as_ref();
        if let Some(value) = arg.strip_prefix("--workload=") {
            config.workload = value
                .parse::<Workload>()
                .map_err(|err: String| anyhow!(err))?;
        } else if let Some(value) = arg.strip_prefix("--size=") {
            config.size = value.parse().context("invalid --size value")?;
        } else if let Some(value) = arg.strip_prefix("--local-size=") {
            config.local_size = value.parse().context("invalid --local-size value")?;
        } else if let Some(value) = arg.strip_prefix("--kernel=") {
            config.kernel_path = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--entry=") {
            config.entry_point = Some(value.to_owned());
        } else if let Some(value) = arg.strip_prefix("--coeff=") {
            config.coeff = value.parse().context("invalid --coeff value")?;
        } else if let Some(value) = arg.strip_prefix("--tolerance=") {
            config.tolerance = value.parse().context("invalid --tolerance value")?;
        } else if let Some(value) = arg.strip_prefix("--seed=") {
            config.seed = parse_seed(value).context("invalid --seed value")?;
        } else if let Some(value) = arg.strip_prefix("--device=") {
            config.device = value
                .parse::<DeviceClass>()
                .map_err(|err: String| anyhow!(err))?;
        } else if let Some(value) = arg.strip_prefix("--report=") {
            config.report = value
                .parse::<ReportFormat>()
                .map_err(|err: String| anyhow!(err))?;
        } else if arg == "--list-devices" {
            config.list_devices = true;
        } else {
            bail!("unrecognized argument: {arg}");
        }
    }

    if config.local_size == 0 {
        bail!("--local-size must be non-zero");
    }
    if config.tolerance.is_nan() || config.tolerance <= 0.0 {
        bail!("--tolerance must be positive");
    }
    Ok(config)
}

fn parse_seed(value: &str) -> Result<u64> {
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).context("expected hex literal")
    } else {
        value.parse().context("expected integer seed")
    }
}
