//! 외부 알림 전송 -- 채팅 웹훅 클라이언트
//!
//! [`Notifier`]는 JSON 페이로드 하나를 전송하고 결과를 [`NotifyOutcome`]으로
//! 돌려줍니다. 전송 실패는 에러가 아니라 `ok = false` 결과로 표현되며,
//! 재시도 여부는 호출자(디스패처)가 결정합니다.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::LogPipelineError;

/// 전송 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// 성공 여부 (2xx)
    pub ok: bool,
    /// HTTP 상태 코드 (응답을 받은 경우)
    pub status: Option<u16>,
    /// 응답 헤더 (이름은 소문자)
    pub headers: HashMap<String, String>,
    /// 실패 사유
    pub error: Option<String>,
}

impl NotifyOutcome {
    /// 비활성/미설정 결과
    pub fn disabled() -> Self {
        Self {
            error: Some("disabled".to_owned()),
            ..Default::default()
        }
    }

    /// 헤더 값을 대소문자 구분 없이 조회합니다.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// HTTP 429 응답인지 확인합니다.
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }
}

/// 외부 알림 전송 trait
pub trait Notifier: Send + Sync + 'static {
    /// 페이로드 하나를 전송합니다.
    fn send(&self, payload: &serde_json::Value) -> impl Future<Output = NotifyOutcome> + Send;
}

/// 웹훅 전송기
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    disabled: bool,
}

impl WebhookNotifier {
    /// 새 웹훅 전송기를 생성합니다.
    ///
    /// 모든 요청에 `timeout`이 적용됩니다.
    pub fn new(url: &str, timeout: Duration, disabled: bool) -> Result<Self, LogPipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogPipelineError::Notify(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_owned(),
            disabled,
        })
    }

    /// 전송이 가능한 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.url.is_empty()
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, payload: &serde_json::Value) -> NotifyOutcome {
        if !self.is_active() {
            return NotifyOutcome::disabled();
        }

        match self.client.post(&self.url).json(payload).send().await {
            Ok(resp) => {
                let status = resp.status();
                let headers = resp
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
                    })
                    .collect();
                let error = (!status.is_success()).then(|| format!("HTTP {status}"));
                if let Some(ref reason) = error {
                    tracing::warn!(status = status.as_u16(), reason = %reason, "webhook returned non-success status");
                }
                NotifyOutcome {
                    ok: status.is_success(),
                    status: Some(status.as_u16()),
                    headers,
                    error,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "webhook send failed");
                NotifyOutcome {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}
