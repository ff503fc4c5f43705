use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use maskwatch::config::MaskwatchConfig;
use maskwatch::ModelArch;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MASKWATCH_CONFIG",
        "MASKWATCH_STREAM_URL",
        "MASKWATCH_INTERVAL_MS",
        "MASKWATCH_COUNT",
        "MASKWATCH_MODEL_ARCH",
        "MASKWATCH_MODEL_PATH",
        "MASKWATCH_QUEUE_CAPACITY",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "stream": {
                "url": "http://camera-1:5000/stream",
                "interval_ms": 250,
                "count": 100
            },
            "model": {
                "arch": "resnet34",
                "path": "/opt/models/resnet.onnx"
            },
            "pipeline": {
                "queue_capacity": 4
            },
            "display": {
                "window_title": "lobby",
                "enabled": false
            }
        }"#,
    );

    std::env::set_var("MASKWATCH_CONFIG", file.path());
    std::env::set_var("MASKWATCH_COUNT", "500");
    std::env::set_var("MASKWATCH_QUEUE_CAPACITY", "8");

    let cfg = MaskwatchConfig::load().expect("load config");

    assert_eq!(cfg.stream.url, "http://camera-1:5000/stream");
    assert_eq!(cfg.stream.interval_ms, 250);
    assert_eq!(cfg.stream.count, 500);
    assert_eq!(cfg.model.arch, ModelArch::Resnet34);
    assert_eq!(
        cfg.model.resolved_path(),
        PathBuf::from("/opt/models/resnet.onnx")
    );
    assert_eq!(cfg.queue_capacity, 8);
    assert_eq!(cfg.display.window_title, "lobby");
    assert!(!cfg.display.enabled);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
[stream]
url = "https://frames.local/stream"

[model]
arch = "mobilenet_v3_small"
"#,
    );

    let cfg = MaskwatchConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.stream.url, "https://frames.local/stream");
    assert_eq!(cfg.stream.interval_ms, 1000);
    assert_eq!(cfg.stream.count, 20);
    assert_eq!(cfg.model.arch, ModelArch::MobilenetV3Small);
    assert_eq!(
        cfg.model.resolved_path(),
        ModelArch::MobilenetV3Small.default_model_path()
    );
    assert_eq!(cfg.queue_capacity, 0);

    clear_env();
}

#[test]
fn env_only_configuration_uses_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MASKWATCH_MODEL_ARCH", "resnet34");
    std::env::set_var("MASKWATCH_STREAM_URL", "http://10.0.0.5:5000/stream");

    let cfg = MaskwatchConfig::load().expect("load config");
    assert_eq!(cfg.model.arch, ModelArch::Resnet34);
    assert_eq!(
        cfg.model.resolved_path(),
        ModelArch::Resnet34.default_model_path()
    );
    assert_eq!(cfg.stream.url, "http://10.0.0.5:5000/stream");
    assert!(cfg.display.enabled);

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("MASKWATCH_INTERVAL_MS", "soon");
    assert!(MaskwatchConfig::load().is_err());
    clear_env();

    std::env::set_var("MASKWATCH_COUNT", "0");
    assert!(MaskwatchConfig::load().is_err());
    clear_env();

    std::env::set_var("MASKWATCH_MODEL_ARCH", "vgg16");
    assert!(MaskwatchConfig::load().is_err());
    clear_env();

    let file = write_config(".json", r#"{"stream": {"url": "rtsp://camera/stream"}}"#);
    assert!(MaskwatchConfig::load_from(Some(file.path())).is_err());

    let file = write_config(".json", "{ not json");
    assert!(MaskwatchConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
