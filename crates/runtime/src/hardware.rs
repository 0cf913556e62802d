//! Hardware selection for the inference process.
//!
//! The launcher never touches a GPU itself. It picks the device for the child
//! process through `CUDA_VISIBLE_DEVICES`, and asks the architecture's Python
//! environment what it can see.

use std::path::Path;
use std::time::Duration;

use launcher_core::{GpuId, InferenceJob, JobRunner, LauncherError, LauncherResult};
use tracing::{debug, info};

/// Environment variable that restricts which CUDA devices a process sees.
pub const CUDA_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";

/// Probe run with the architecture's interpreter by [`query_gpu_info`].
/// Prints a JSON array with one object per visible CUDA device.
pub const GPU_PROBE_SCRIPT: &str = r#"import json
devices = []
try:
    import torch
    if torch.cuda.is_available():
        for index in range(torch.cuda.device_count()):
            props = torch.cuda.get_device_properties(index)
            devices.append({
                "ID": index,
                "Name": props.name,
                "Total Memory": props.total_memory,
            })
except ImportError:
    pass
print(json.dumps(devices))
"#;

const GPU_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Device a job runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hardware {
    /// No GPU visible.
    Cpu,
    /// The given CUDA device list, e.g. `0` or `0,1`.
    Cuda(String),
}

impl Hardware {
    /// Interpret a client GPU selector.
    ///
    /// Empty, `cpu` and negative indices select the CPU; anything else is
    /// passed through as a CUDA device list.
    pub fn from_gpu_id(gpu_id: &GpuId) -> Self {
        match gpu_id {
            GpuId::Index(index) if *index < 0 => Self::Cpu,
            GpuId::Index(index) => Self::Cuda(index.to_string()),
            GpuId::Name(name) => {
                let name = name.trim();
                if name.is_empty() || name.eq_ignore_ascii_case("cpu") {
                    Self::Cpu
                } else {
                    Self::Cuda(name.to_owned())
                }
            }
        }
    }

    /// Environment overrides for the child process.
    pub fn env(&self) -> Vec<(String, String)> {
        let devices = match self {
            Self::Cpu => String::new(),
            Self::Cuda(devices) => devices.clone(),
        };
        vec![(CUDA_VISIBLE_DEVICES.to_string(), devices)]
    }
}

impl std::fmt::Display for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(devices) => write!(f, "cuda:{devices}"),
        }
    }
}

/// Environment for a job on the requested hardware.
pub fn select_hardware(gpu_id: &GpuId) -> Vec<(String, String)> {
    let hardware = Hardware::from_gpu_id(gpu_id);
    debug!(%gpu_id, %hardware, "Selected hardware");
    hardware.env()
}

/// Ask the given interpreter which GPUs it can use.
///
/// # Returns
/// The JSON document printed by [`GPU_PROBE_SCRIPT`].
pub async fn query_gpu_info(
    runner: &dyn JobRunner,
    python: &Path,
) -> LauncherResult<serde_json::Value> {
    let job = InferenceJob::new(python)
        .args(["-c", GPU_PROBE_SCRIPT])
        .timeout(Some(GPU_PROBE_TIMEOUT));

    let output = runner.run(&job).await?;
    if !output.success() {
        return Err(LauncherError::gpu_info(format!(
            "probe exited with {:?}: {}",
            output.code,
            output.stderr.trim()
        )));
    }

    let info: serde_json::Value = serde_json::from_str(output.stdout.trim())
        .map_err(|e| LauncherError::gpu_info(format!("probe printed invalid JSON: {e}")))?;
    info!(devices = %info, "Queried GPU info");
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use launcher_core::JobOutput;

    #[test]
    fn test_hardware_from_gpu_id() {
        assert_eq!(Hardware::from_gpu_id(&GpuId::Name(String::new())), Hardware::Cpu);
        assert_eq!(Hardware::from_gpu_id(&GpuId::Name("CPU".into())), Hardware::Cpu);
        assert_eq!(Hardware::from_gpu_id(&GpuId::Index(-1)), Hardware::Cpu);
        assert_eq!(
            Hardware::from_gpu_id(&GpuId::Index(1)),
            Hardware::Cuda("1".into())
        );
        assert_eq!(
            Hardware::from_gpu_id(&GpuId::Name("0,1".into())),
            Hardware::Cuda("0,1".into())
        );
    }

    #[test]
    fn test_select_hardware_env() {
        assert_eq!(
            select_hardware(&GpuId::Name("0".into())),
            vec![(CUDA_VISIBLE_DEVICES.to_string(), "0".to_string())]
        );
        assert_eq!(
            select_hardware(&GpuId::Name(String::new())),
            vec![(CUDA_VISIBLE_DEVICES.to_string(), String::new())]
        );
    }

    struct CannedRunner(JobOutput);

    #[async_trait::async_trait]
    impl JobRunner for CannedRunner {
        async fn run(&self, job: &InferenceJob) -> LauncherResult<JobOutput> {
            assert_eq!(job.args_lossy()[0], "-c");
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_query_gpu_info() {
        let runner = CannedRunner(JobOutput {
            code: Some(0),
            stdout: "[{\"ID\": 0, \"Name\": \"RTX\"}]\n".into(),
            stderr: String::new(),
        });
        let info = query_gpu_info(&runner, Path::new("python")).await.unwrap();
        assert_eq!(info[0]["Name"], "RTX");
    }

    #[tokio::test]
    async fn test_query_gpu_info_failures() {
        let runner = CannedRunner(JobOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "ModuleNotFoundError".into(),
        });
        let err = query_gpu_info(&runner, Path::new("python")).await.unwrap_err();
        assert!(err.to_string().contains("ModuleNotFoundError"));

        let runner = CannedRunner(JobOutput {
            code: Some(0),
            stdout: "not json".into(),
            stderr: String::new(),
        });
        let err = query_gpu_info(&runner, Path::new("python")).await.unwrap_err();
        assert!(matches!(err, LauncherError::GpuInfo(_)));
    }
}
