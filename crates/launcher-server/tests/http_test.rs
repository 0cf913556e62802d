//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

use std::fs;
use std::sync::Arc;

use audio_cache::MemoryCache;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use launcher_core::{
    AudioCache, InferenceJob, JobOutput, JobRunner, LauncherConfig, LauncherResult, PathsConfig,
    Stage,
};
use launcher_server::{AppState, MessageBody, build_router};
use runtime::SynthesisPipeline;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

/// Writes a short WAV for synthesis jobs and answers GPU queries.
struct ScriptedRunner {
    gpu_report: JobOutput,
}

#[async_trait::async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(&self, job: &InferenceJob) -> LauncherResult<JobOutput> {
        let args = job.args_lossy();
        if args.first().map(String::as_str) == Some("-c") {
            return Ok(self.gpu_report.clone());
        }

        let output = args
            .iter()
            .position(|a| a == "--output_filepath")
            .map(|i| args[i + 1].clone())
            .expect("output path argument");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(output, spec).unwrap();
        for _ in 0..240 {
            writer.write_sample(0.25f32).unwrap();
        }
        writer.finalize().unwrap();

        Ok(JobOutput {
            code: Some(0),
            ..Default::default()
        })
    }
}

struct TestApp {
    root: TempDir,
    cache: Arc<MemoryCache>,
    router: axum::Router,
}

impl TestApp {
    fn new(gpu_report: JobOutput) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = LauncherConfig::default();
        config.paths = PathsConfig::with_root(root.path());

        let cache = Arc::new(MemoryCache::new());
        let runner = Arc::new(ScriptedRunner { gpu_report });
        let pipeline = Arc::new(SynthesisPipeline::with_runner(&config, cache.clone(), runner));
        let router = build_router(Arc::new(AppState::new(pipeline, None)));

        Self {
            root,
            cache,
            router,
        }
    }

    fn install_voice(&self) {
        let dir = PathsConfig::with_root(self.root.path())
            .characters_dir()
            .join("voiceA");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("voiceA.pth"), b"weights").unwrap();
        fs::write(dir.join("config.yml"), b"model_params: {}").unwrap();
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn generate(&self, body: impl Into<Body>) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/generate")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let (status, bytes) = self.send(request).await;
        let envelope: MessageBody = serde_json::from_slice(&bytes).unwrap();
        (status, envelope.decode().unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }
}

fn no_gpus() -> JobOutput {
    JobOutput {
        code: Some(0),
        stdout: "[]\n".into(),
        stderr: String::new(),
    }
}

fn request_body() -> Value {
    json!({
        "Inputs": {"User Text": "hello"},
        "Options": {
            "Character": "voiceA",
            "Noise": 0.5,
            "Style Blend": 0.3,
            "Diffusion Steps": 5,
            "Embedding Scale": 1.0,
            "Use Long Form": false
        },
        "Output File": "out1",
        "GPU ID": "0",
        "Session ID": "s1"
    })
}

#[tokio::test]
async fn test_generate_success() {
    let app = TestApp::new(no_gpus());
    app.install_voice();

    let (status, message) = app.generate(request_body().to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(message, "");
    let audio = app.cache.read_audio(Stage::Output, Some("s1"), "out1").unwrap();
    assert_eq!(audio.num_samples(), 240);
    assert_eq!(audio.sample_rate, 24000);
}

#[tokio::test]
async fn test_generate_response_is_pretty_json() {
    let app = TestApp::new(no_gpus());
    app.install_voice();

    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .body(Body::from(request_body().to_string()))
        .unwrap();
    let (_, bytes) = app.send(request).await;
    let text = String::from_utf8(bytes).unwrap();

    assert_eq!(text, "{\n  \"message\": \"\"\n}");
}

#[tokio::test]
async fn test_generate_bad_input() {
    let app = TestApp::new(no_gpus());
    app.install_voice();

    let mut body = request_body();
    body["Options"]["Style Blend"] = json!(1.5);
    let (status, message) = app.generate(body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        message,
        "'Options.Style Blend' 1.5 is greater than the maximum of 1"
    );

    let (status, message) = app.generate("{\"Inputs\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message.starts_with("request body malformed JSON"));

    assert!(app.cache.is_empty());
}

#[tokio::test]
async fn test_generate_internal_error() {
    let app = TestApp::new(no_gpus());

    let (status, message) = app.generate(request_body().to_string()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(message.starts_with("character 'voiceA' not found"));
    assert!(message.contains("Failed while preparing."));
    assert!(message.contains("No input files to report"));
    assert!(message.contains("No output files to report"));
}

#[tokio::test]
async fn test_gpu_info() {
    let app = TestApp::new(JobOutput {
        code: Some(0),
        stdout: "[{\"ID\": 0, \"Name\": \"RTX 3090\", \"Total Memory\": 25447170048}]".into(),
        stderr: String::new(),
    });

    let (status, bytes) = app.get("/gpu-info").await;

    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(info[0]["Name"], "RTX 3090");
}

#[tokio::test]
async fn test_gpu_info_failure() {
    let app = TestApp::new(JobOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: "No module named 'torch'".into(),
    });

    let (status, bytes) = app.get("/gpu-info").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let envelope: MessageBody = serde_json::from_slice(&bytes).unwrap();
    assert!(envelope.decode().unwrap().contains("No module named 'torch'"));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = TestApp::new(no_gpus());

    let (status, bytes) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["cache"], "memory");

    let (status, _) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_requires_post() {
    let app = TestApp::new(no_gpus());
    let (status, _) = app.get("/generate").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
