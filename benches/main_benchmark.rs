use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use std::hint::black_box;
use tasmoforge::compile::{extract_version, format_version, render_build_env, render_defines};
use tasmoforge::config::BuildRequest;

const MOCK_REQUEST: &str = r#"{
    "network": {
        "STA_SSID1": "benchwifi",
        "STA_PASS1": "benchpass",
        "WIFI_IP_ADDRESS": "",
        "ipType": "dhcp"
    },
    "features": {
        "USE_MQTT_TLS": true,
        "USE_DOMOTICZ": false,
        "USE_KNX": true,
        "TELEPERIOD": "60",
        "platformio_entries#display": { "build_flags": "-DUSE_DISPLAY" },
        "platformio_entries#sensors": { "build_flags": "-DUSE_BMP -DUSE_SHT" },
        "board": {
            "name": "esp32dev",
            "defines": { "MODULE": "USER_MODULE" },
            "platformio_entries": { "board": "esp32dev", "build_flags": "-DBOARD" }
        }
    },
    "version": { "tasmotaVersion": "v14.1.0" },
    "customParams": ""
}"#;

fn mock_request() -> BuildRequest {
    serde_json::from_str(MOCK_REQUEST).unwrap()
}

fn bench_request_parse(c: &mut Criterion) {
    c.bench_function("parse_build_request", |b| {
        b.iter(|| {
            let _: BuildRequest = serde_json::from_str(black_box(MOCK_REQUEST)).unwrap();
        })
    });
}

fn bench_render_defines(c: &mut Criterion) {
    let request = mock_request();
    c.bench_function("render_defines_features", |b| {
        b.iter(|| render_defines(black_box(&request.features)))
    });

    let mut wide: Map<String, Value> = Map::new();
    for i in 0..100 {
        wide.insert(format!("SYMBOL_{i}"), json!(format!("value{i}")));
    }
    c.bench_function("render_defines_wide_map", |b| {
        b.iter(|| render_defines(black_box(&wide)))
    });
}

fn bench_render_build_env(c: &mut Criterion) {
    let request = mock_request();
    let board = request.board();
    c.bench_function("render_build_env", |b| {
        b.iter(|| render_build_env(black_box(&board), black_box(&request.features)))
    });
}

fn bench_version_extract(c: &mut Criterion) {
    let dir = std::env::temp_dir().join("tasmoforge_bench_version");
    std::fs::create_dir_all(&dir).unwrap();
    let header = dir.join("tasmota_version.h");
    std::fs::write(&header, "const uint32_t VERSION = 0x0E010000;\n").unwrap();

    c.bench_function("extract_version", |b| {
        b.iter(|| extract_version(black_box(&header)).unwrap())
    });

    c.bench_function("format_version", |b| {
        b.iter(|| format_version(black_box(0x0E010000)))
    });
}

criterion_group!(
    benches,
    bench_request_parse,
    bench_render_defines,
    bench_render_build_env,
    bench_version_extract
);
criterion_main!(benches);
