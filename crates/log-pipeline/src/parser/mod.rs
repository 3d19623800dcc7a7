//! 라인 파서 -- 구분자 기반 필드 장비 로그를 구조화된 레코드로 변환
//!
//! 한 라인은 `장비;시퀀스;그룹;값...` 형태이며, 구분자는 규칙 오버라이드,
//! `;`, 탭, 공백 순서로 결정됩니다.
//!
//! # 분류
//! - 앞뒤 공백 제거 후 `#` 또는 대소문자 무시 `header`로 시작 → HEADER
//! - 공백만 있는 라인 → IGNORE
//! - 필드가 3개 미만 → UNKNOWN (`not_enough_fields`)
//! - 그 외 → DATA (시퀀스/그룹/값 오류는 `parse_ok = false`로 표시)
//!
//! # 사용 예시
//! ```ignore
//! use fieldtail_log_pipeline::parser::parse_line;
//! use fieldtail_log_pipeline::rule::ParseOverrides;
//!
//! let record = parse_line("DEV_A;1;2;3;4;-1; 419", &ParseOverrides::default());
//! assert_eq!(record.device_id.as_deref(), Some("DEV_A"));
//! assert_eq!(record.value_count, 4);
//! ```

pub mod values;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fieldtail_core::types::{Event, NumericValue, ParseErrorCode, RecordKind};

use crate::rule::matcher::ParseOverrides;

pub use values::{ValueSummary, extract_values};

/// 최소 필드 수 (장비, 시퀀스, 그룹)
const MIN_FIELDS: usize = 3;

/// 필드 구분자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter<'a> {
    /// 규칙으로 지정된 구분자
    Custom(&'a str),
    /// `;`
    Semicolon,
    /// 탭
    Tab,
    /// 연속 공백
    Whitespace,
}

impl<'a> Delimiter<'a> {
    /// 라인을 필드로 나눕니다.
    ///
    /// 공백 분리는 빈 필드를 만들지 않고, 나머지는 빈 필드를 유지합니다.
    pub fn split(self, line: &'a str) -> Vec<&'a str> {
        match self {
            Self::Custom(d) => line.split(d).collect(),
            Self::Semicolon => line.split(';').collect(),
            Self::Tab => line.split('\t').collect(),
            Self::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// 구분자를 결정합니다: 오버라이드 > `;` > 탭 > 공백
pub fn detect_delimiter<'a>(line: &str, override_delim: Option<&'a str>) -> Delimiter<'a> {
    match override_delim {
        Some(d) if !d.is_empty() => Delimiter::Custom(d),
        _ if line.contains(';') => Delimiter::Semicolon,
        _ if line.contains('\t') => Delimiter::Tab,
        _ => Delimiter::Whitespace,
    }
}

fn is_device_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// 필드에서 `[A-Za-z0-9_-]`가 처음 연속되는 구간을 장비 ID로 추출합니다.
pub fn extract_device(token: &str) -> Option<&str> {
    let start = token.find(is_device_char)?;
    let rest = &token[start..];
    let end = rest.find(|c: char| !is_device_char(c)).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// 규칙 적용 전 라인에서 장비 ID를 미리 추출합니다 (DEVICE 범위 규칙용).
pub fn pre_scan_device(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\r', '\n']);
    let first = detect_delimiter(line, None).split(line).into_iter().next()?;
    extract_device(first)
}

fn is_header(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || trimmed
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("header"))
}

/// 파싱된 라인
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecord {
    /// 줄바꿈을 제거한 라인
    pub raw_line: String,
    /// 레코드 종류
    pub record_kind: RecordKind,
    /// 파싱 성공 여부
    pub parse_ok: bool,
    /// 실패 코드
    pub parse_error: Option<ParseErrorCode>,
    /// 장비 ID
    pub device_id: Option<String>,
    /// 시퀀스 번호
    pub seq: Option<i64>,
    /// 그룹 번호
    pub grp: Option<i64>,
    /// 값 목록
    pub values: Vec<NumericValue>,
    /// 값 개수
    pub value_count: usize,
    /// 최소값
    pub min_val: Option<f64>,
    /// 최대값
    pub max_val: Option<f64>,
    /// 평균
    pub mean_val: Option<f64>,
    /// 음수 포함 여부
    pub has_negative: bool,
}

impl ParsedRecord {
    fn bare(raw_line: &str, kind: RecordKind, error: Option<ParseErrorCode>) -> Self {
        Self {
            raw_line: raw_line.to_owned(),
            record_kind: kind,
            parse_ok: error.is_none(),
            parse_error: error,
            device_id: None,
            seq: None,
            grp: None,
            values: Vec::new(),
            value_count: 0,
            min_val: None,
            max_val: None,
            mean_val: None,
            has_negative: false,
        }
    }

    /// 값 없이 HEADER로 분류된 레코드
    pub fn header(line: &str) -> Self {
        Self::bare(line.trim_end_matches(['\r', '\n']), RecordKind::Header, None)
    }

    /// 파일 경로, 적용 규칙, 생성 시각을 붙여 이벤트로 변환합니다.
    pub fn into_event(self, file_path: &str, rule_ids: Vec<i64>, created_at: DateTime<Utc>) -> Event {
        Event {
            id: 0,
            file_path: file_path.to_owned(),
            raw_line: self.raw_line,
            record_kind: self.record_kind,
            parse_ok: self.parse_ok,
            parse_error: self.parse_error,
            device_id: self.device_id,
            seq: self.seq,
            grp: self.grp,
            values: self.values,
            value_count: self.value_count,
            min_val: self.min_val,
            max_val: self.max_val,
            mean_val: self.mean_val,
            has_negative: self.has_negative,
            rule_ids,
            created_at,
        }
    }
}

/// 라인 하나를 파싱합니다.
///
/// 실패는 에러가 아니라 `parse_ok = false`와 실패 코드로 표현됩니다.
pub fn parse_line(line: &str, overrides: &ParseOverrides) -> ParsedRecord {
    let raw_line = line.trim_end_matches(['\r', '\n']);
    let trimmed = raw_line.trim();

    if is_header(trimmed) {
        return ParsedRecord::bare(raw_line, RecordKind::Header, None);
    }
    if trimmed.is_empty() {
        return ParsedRecord::bare(raw_line, RecordKind::Ignore, None);
    }

    let delimiter = detect_delimiter(raw_line, overrides.delimiter.as_deref());
    let tokens = delimiter.split(raw_line);
    if tokens.len() < MIN_FIELDS {
        return ParsedRecord::bare(
            raw_line,
            RecordKind::Unknown,
            Some(ParseErrorCode::NotEnoughFields),
        );
    }

    let mut record = ParsedRecord::bare(raw_line, RecordKind::Data, None);
    record.device_id = extract_device(tokens[0]).map(str::to_owned);

    let (Ok(seq), Ok(grp)) = (
        tokens[1].trim().parse::<i64>(),
        tokens[2].trim().parse::<i64>(),
    ) else {
        record.parse_ok = false;
        record.parse_error = Some(ParseErrorCode::SeqOrGrpInvalid);
        return record;
    };
    record.seq = Some(seq);
    record.grp = Some(grp);

    let extracted = extract_values(&tokens[MIN_FIELDS..]);
    if extracted.had_error {
        record.parse_ok = false;
        record.parse_error = Some(ParseErrorCode::ValueParseError);
    }

    let mut values = extracted.values;
    if !overrides.drop_indexes.is_empty() {
        values = values
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !overrides.drop_indexes.contains(idx))
            .map(|(_, v)| v)
            .collect();
    }
    if overrides.coerce_numeric {
        values = values.into_iter().map(NumericValue::to_float).collect();
    }

    let summary = ValueSummary::of(&values);
    record.value_count = values.len();
    record.min_val = summary.min;
    record.max_val = summary.max;
    record.mean_val = summary.mean;
    record.has_negative = summary.has_negative;
    record.values = values;

    if let Some((min, max)) = overrides.value_count_range {
        let too_few = min.is_some_and(|m| record.value_count < m);
        let too_many = max.is_some_and(|m| record.value_count > m);
        if too_few || too_many {
            record.parse_ok = false;
            record.parse_error = Some(ParseErrorCode::ValueCountOutOfRange);
        }
    }

    record
}
