//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 수집 루프, 알림 엔진, 관리 도구가 공유하는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 레코드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    /// 헤더 라인
    Header,
    /// 정상 데이터 라인
    Data,
    /// 무시된 라인
    Ignore,
    /// 구조를 해석하지 못한 라인
    Unknown,
}

impl RecordKind {
    /// 저장용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "HEADER",
            Self::Data => "DATA",
            Self::Ignore => "IGNORE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEADER" => Ok(Self::Header),
            "DATA" => Ok(Self::Data),
            "IGNORE" => Ok(Self::Ignore),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// 파싱 실패 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorCode {
    /// 토큰이 3개 미만
    NotEnoughFields,
    /// 시퀀스/그룹 번호가 정수가 아님
    SeqOrGrpInvalid,
    /// 값 추출 중 변환 실패
    ValueParseError,
    /// 허용 범위를 벗어난 값 개수
    ValueCountOutOfRange,
}

impl ParseErrorCode {
    /// 저장용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotEnoughFields => "not_enough_fields",
            Self::SeqOrGrpInvalid => "seq_or_grp_invalid",
            Self::ValueParseError => "value_parse_error",
            Self::ValueCountOutOfRange => "value_count_out_of_range",
        }
    }
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParseErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_enough_fields" => Ok(Self::NotEnoughFields),
            "seq_or_grp_invalid" => Ok(Self::SeqOrGrpInvalid),
            "value_parse_error" => Ok(Self::ValueParseError),
            "value_count_out_of_range" => Ok(Self::ValueCountOutOfRange),
            other => Err(format!("unknown parse error code: {other}")),
        }
    }
}

/// 수치 값
///
/// `.`이 포함된 문자열에서 추출된 값은 실수, 그 외는 정수입니다.
/// JSON에서는 일반 숫자로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    /// 64비트 정수
    Int(i64),
    /// 64비트 실수
    Float(f64),
}

impl NumericValue {
    /// f64로 변환
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// 실수로 강제 변환
    pub fn to_float(self) -> Self {
        Self::Float(self.as_f64())
    }

    /// 음수 여부
    pub fn is_negative(&self) -> bool {
        self.as_f64() < 0.0
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// 수집된 라인 하나에 대응하는 불변 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 저장 후 부여되는 ID (저장 전에는 0)
    #[serde(default)]
    pub id: i64,
    /// 원본 파일 경로
    pub file_path: String,
    /// 규칙 적용 후 라인
    pub raw_line: String,
    /// 레코드 종류
    pub record_kind: RecordKind,
    /// 파싱 성공 여부
    pub parse_ok: bool,
    /// 파싱 실패 코드
    pub parse_error: Option<ParseErrorCode>,
    /// 장비 ID
    pub device_id: Option<String>,
    /// 시퀀스 번호
    pub seq: Option<i64>,
    /// 그룹 번호
    pub grp: Option<i64>,
    /// 추출된 수치 값
    pub values: Vec<NumericValue>,
    /// 값 개수
    pub value_count: usize,
    /// 최소값
    pub min_val: Option<f64>,
    /// 최대값
    pub max_val: Option<f64>,
    /// 평균값
    pub mean_val: Option<f64>,
    /// 음수 포함 여부
    pub has_negative: bool,
    /// 적용된 규칙 ID (적용 순서)
    pub rule_ids: Vec<i64>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// 적용된 규칙 개수
    pub fn rule_count(&self) -> usize {
        self.rule_ids.len()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} device={} values={}",
            self.record_kind,
            self.file_path,
            self.device_id.as_deref().unwrap_or("-"),
            self.value_count,
        )
    }
}

/// 알림 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 정보
    Info,
    /// 경고
    Warn,
    /// 치명
    Critical,
}

impl Severity {
    /// 저장용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// 알림 상태
///
/// `Pending` -> `Sent` | `Failed`, 그리고 어느 상태에서든 `Ack`(종료 상태)로 전이합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    /// 전송 대기
    Pending,
    /// 전송 성공
    Sent,
    /// 전송 실패
    Failed,
    /// 운영자 확인
    Ack,
}

impl AlertStatus {
    /// 저장용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::Ack => "ACK",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            "ACK" => Ok(Self::Ack),
            other => Err(format!("unknown alert status: {other}")),
        }
    }
}

/// 파일 수집 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// 새 데이터를 읽음
    Ok,
    /// 새 데이터 없음
    Idle,
    /// 파일 열기/조회 실패
    Missing,
}

impl FileStatus {
    /// 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Idle => "idle",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_value_serializes_as_plain_number() {
        let values = vec![NumericValue::Int(3), NumericValue::Float(-1.5)];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, "[3,-1.5]");
        let back: Vec<NumericValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn numeric_value_coerces_to_float() {
        assert_eq!(NumericValue::Int(4).to_float(), NumericValue::Float(4.0));
        assert!(NumericValue::Int(-1).is_negative());
        assert!(!NumericValue::Float(0.0).is_negative());
    }

    #[test]
    fn severity_parses_case_insensitive() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Critical);
    }

    #[test]
    fn parse_error_code_string_forms() {
        for code in [
            ParseErrorCode::NotEnoughFields,
            ParseErrorCode::SeqOrGrpInvalid,
            ParseErrorCode::ValueParseError,
            ParseErrorCode::ValueCountOutOfRange,
        ] {
            assert_eq!(code.as_str().parse::<ParseErrorCode>().unwrap(), code);
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn alert_status_string_forms() {
        assert_eq!(AlertStatus::Pending.to_string(), "PENDING");
        assert_eq!("ACK".parse::<AlertStatus>().unwrap(), AlertStatus::Ack);
    }

    #[test]
    fn file_status_display() {
        assert_eq!(FileStatus::Missing.to_string(), "missing");
        let json = serde_json::to_string(&FileStatus::Idle).unwrap();
        assert_eq!(json, "\"idle\"");
    }
}
