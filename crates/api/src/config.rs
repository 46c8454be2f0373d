use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;

pub const CONFIG_PATH_ENV: &str = "AI_BACKEND_CONFIG";

#[derive(Clone)]
pub struct ConfigStore {
    data: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl ConfigStore {
    /// Defaults, overlaid by the config file, overlaid by env vars.
    pub fn load() -> Self {
        let store = Self::from_path(detect_config_path());
        store.apply_env();
        store
    }

    /// Defaults overlaid by the JSON object at `path`, if it can be read.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut data = default_config();

        if path.exists() {
            match fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|b| serde_json::from_slice::<Value>(&b).map_err(|e| e.to_string()))
            {
                Ok(Value::Object(map)) => data.extend(map),
                Ok(_) => tracing::warn!(path = %path.display(), "config file is not a JSON object"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to read config"),
            }
        }

        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    fn apply_env(&self) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(port) = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
        {
            guard.insert("port".into(), Value::Number(port.into()));
        }
        if let Some(limit) = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
        {
            guard.insert("max_upload_bytes".into(), Value::Number(limit.into()));
        }
        for (env, key) in [
            ("HOST", "host"),
            ("MODEL_DIR", "model_dir"),
            ("MODEL_FILE", "model_file"),
        ] {
            if let Ok(v) = std::env::var(env)
                && !v.trim().is_empty()
            {
                guard.insert(key.into(), Value::String(v));
            }
        }
        if let Ok(debug) = std::env::var("DEBUG") {
            guard.insert("debug".into(), Value::Bool(debug.to_lowercase() == "true"));
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        match guard.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default() != 0,
            _ => default,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        match guard.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        match guard.get(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            Some(Value::String(s)) => s.parse::<i64>().unwrap_or(default),
            _ => default,
        }
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), Value::String(value.into()));
    }

    pub fn host(&self) -> String {
        self.get_string("host")
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn port(&self) -> u16 {
        u16::try_from(self.get_i64("port", 5000)).unwrap_or(5000)
    }

    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from(self.get_string("model_dir").unwrap_or_else(|| ".".to_string()))
    }

    pub fn model_file(&self) -> String {
        self.get_string("model_file")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string())
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join(self.model_file())
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.get_i64("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES as usize)
            .max(1024)
    }

    pub fn debug(&self) -> bool {
        self.get_bool("debug", false)
    }
}

pub const DEFAULT_MODEL_FILE: &str = "model.json";
const DEFAULT_MAX_UPLOAD_BYTES: i64 = 64 * 1024 * 1024;

fn default_config() -> BTreeMap<String, Value> {
    let mut m = BTreeMap::new();
    m.insert("host".into(), Value::String("0.0.0.0".into()));
    m.insert("port".into(), Value::Number(5000.into()));
    m.insert("model_dir".into(), Value::String(".".into()));
    m.insert("model_file".into(), Value::String(DEFAULT_MODEL_FILE.into()));
    m.insert(
        "max_upload_bytes".into(),
        Value::Number(DEFAULT_MAX_UPLOAD_BYTES.into()),
    );
    m.insert("debug".into(), Value::Bool(false));
    m
}

fn detect_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from("config.json"),
    }
}
