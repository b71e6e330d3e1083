//! 告警通知/持久化 (Notification & persistence collaborators)
//!
//! - LocalImageStore:   快照写入本地目录 `{dir}/{TYPE}_{timestamp}.jpg`
//! - RemoteAlertClient: 以 JSON (含 base64 快照) 提交到远程接口

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use serde::Serialize;
use tracing::debug;

use super::types::Alert;
use crate::{Result, SentinelError};

/// 通知方接口 (失败不影响检测循环)
pub trait Notifier: Send {
    /// 返回写入的本地路径 (如有)
    fn deliver(&self, alert: &Alert, jpeg: &[u8]) -> Result<Option<PathBuf>>;

    fn name(&self) -> &str;
}

/// 本地快照存储
pub struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, alert: &Alert) -> PathBuf {
        self.dir
            .join(format!("{}_{}.jpg", alert.kind.tag(), alert.timestamp))
    }
}

impl Notifier for LocalImageStore {
    fn deliver(&self, alert: &Alert, jpeg: &[u8]) -> Result<Option<PathBuf>> {
        let path = self.path_for(alert);
        std::fs::write(&path, jpeg)
            .map_err(|e| SentinelError::Emission(format!("{}: {}", path.display(), e)))?;
        Ok(Some(path))
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[derive(Serialize)]
struct ImagePayload<'a> {
    data: String,
    #[serde(rename = "contentType")]
    content_type: &'a str,
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
    date: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    img: ImagePayload<'a>,
}

/// 远程告警提交
pub struct RemoteAlertClient {
    endpoint: String,
    camera_id: Option<String>,
    user_id: Option<String>,
    agent: ureq::Agent,
}

impl RemoteAlertClient {
    pub fn new(endpoint: impl Into<String>, camera_id: Option<String>, user_id: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            endpoint: endpoint.into(),
            camera_id,
            user_id,
            agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn payload<'a>(&'a self, alert: &'a Alert, jpeg: &[u8]) -> AlertPayload<'a> {
        AlertPayload {
            kind: alert.kind.tag(),
            message: &alert.message,
            date: &alert.timestamp,
            camera: self.camera_id.as_deref(),
            user: self.user_id.as_deref(),
            img: ImagePayload {
                data: base64::engine::general_purpose::STANDARD.encode(jpeg),
                content_type: "image/jpeg",
            },
        }
    }
}

impl Notifier for RemoteAlertClient {
    fn deliver(&self, alert: &Alert, jpeg: &[u8]) -> Result<Option<PathBuf>> {
        let body = serde_json::to_value(self.payload(alert, jpeg))
            .map_err(|e| SentinelError::Emission(e.to_string()))?;

        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(body)
            .map_err(|e| SentinelError::Emission(format!("POST {}: {}", self.endpoint, e)))?;

        debug!("📡 告警已提交: {} → HTTP {}", self.endpoint, response.status());
        Ok(None)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::types::AlertKind;

    fn alert() -> Alert {
        Alert {
            kind: AlertKind::Zone,
            message: "Person in protected zone for 3s".into(),
            timestamp: "20260101_120000_000000".into(),
            track: None,
            frame_index: 2,
            image: None,
        }
    }

    #[test]
    fn local_store_writes_typed_file_names() {
        let dir = std::env::temp_dir().join(format!("sentinel-notify-{}", std::process::id()));
        let store = LocalImageStore::new(&dir).unwrap();
        let path = store.deliver(&alert(), b"jpeg").unwrap().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "ZONE_20260101_120000_000000.jpg"
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn remote_payload_carries_metadata_and_image() {
        let client = RemoteAlertClient::new("http://localhost:0/api/alert", Some("cam-1".into()), None);
        let alert = alert();
        let value = serde_json::to_value(client.payload(&alert, b"abc")).unwrap();
        assert_eq!(value["type"], "ZONE");
        assert_eq!(value["camera"], "cam-1");
        assert!(value.get("user").is_none());
        assert_eq!(value["img"]["data"], "YWJj");
        assert_eq!(value["img"]["contentType"], "image/jpeg");
    }

    #[test]
    fn unreachable_endpoint_is_an_emission_error() {
        let client = RemoteAlertClient::new("http://127.0.0.1:9/unreachable", None, None);
        let err = client.deliver(&alert(), b"x").unwrap_err();
        assert!(matches!(err, SentinelError::Emission(_)));
    }
}
