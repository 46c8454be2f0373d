#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use api::config::ConfigStore;
use api::state::AppState;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;
use uuid::Uuid;

pub struct TempModelDir {
    pub path: PathBuf,
}

impl TempModelDir {
    pub fn new() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("ai-backend-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    /// Defaults with `model_dir` pointed at this directory.
    pub fn config(&self) -> ConfigStore {
        let config = ConfigStore::from_path(self.path.join("config.json"));
        config.set_string("model_dir", self.path.to_string_lossy());
        config
    }

    pub fn state(&self) -> AppState {
        AppState::from_config(self.config())
    }
}

impl Drop for TempModelDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// `.npy` bytes for a float64 array, as `np.save` writes them.
pub fn npy_f64(shape: &[usize], data: &[f64]) -> Vec<u8> {
    let raw: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    npy("<f8", shape, &raw)
}

pub fn npy_i64(shape: &[usize], data: &[i64]) -> Vec<u8> {
    let raw: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    npy("<i8", shape, &raw)
}

fn npy(descr: &str, shape: &[usize], raw: &[u8]) -> Vec<u8> {
    let dims = match shape {
        [n] => format!("({n},)"),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {dims}, }}");
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(raw);
    out
}

pub fn npz(members: &[(&str, Vec<u8>)], compressed: bool) -> Vec<u8> {
    let method = if compressed {
        zip::CompressionMethod::Deflated
    } else {
        zip::CompressionMethod::Stored
    };
    let options = zip::write::SimpleFileOptions::default().compression_method(method);

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, bytes) in members {
        writer
            .start_file(format!("{name}.npy"), options)
            .expect("start zip member");
        writer.write_all(bytes).expect("write zip member");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Archive with `x` (float64, rows × width) and `y` (int64 labels).
pub fn training_archive(rows: &[Vec<f64>], labels: &[i64]) -> Vec<u8> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    npz(
        &[
            ("x", npy_f64(&[rows.len(), width], &flat)),
            ("y", npy_i64(&[labels.len()], labels)),
        ],
        false,
    )
}

pub fn f32_buffer(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

const BOUNDARY: &str = "----ai-backend-test-boundary";

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.bin\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn train_request(config: &str, archive: &[u8]) -> Request<Body> {
    multipart_request(
        "/train",
        &[Part::Text("config", config), Part::File("file", archive)],
    )
}

pub fn predict_request(features: &[f32]) -> Request<Body> {
    let buf = f32_buffer(features);
    multipart_request("/predict", &[Part::File("file", &buf)])
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// `[[0]*width]*n + [[1]*width]*n` with labels `[0]*n + [1]*n`.
pub fn two_cluster_set(n: usize, width: usize) -> (Vec<Vec<f64>>, Vec<i64>) {
    let mut x = vec![vec![0.0; width]; n];
    x.extend(vec![vec![1.0; width]; n]);
    let mut y = vec![0; n];
    y.extend(vec![1; n]);
    (x, y)
}
