//! 수치 값 추출 및 요약 통계

use fieldtail_core::types::NumericValue;

/// 값 추출 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// 추출된 값 (등장 순서)
    pub values: Vec<NumericValue>,
    /// 변환에 실패한 부분 문자열이 있었는지
    pub had_error: bool,
}

/// 필드 목록에서 `[-+]?\d+(\.\d+)?` 형태의 부분 문자열을 모두 추출합니다.
///
/// `.`을 포함하면 실수, 아니면 정수입니다. 정수 범위를 넘는 값은 건너뛰고
/// `had_error`를 표시합니다.
pub fn extract_values(tokens: &[&str]) -> Extracted {
    let mut out = Extracted::default();
    for token in tokens {
        for span in numeric_spans(token) {
            if span.contains('.') {
                match span.parse::<f64>() {
                    Ok(v) => out.values.push(NumericValue::Float(v)),
                    Err(_) => out.had_error = true,
                }
            } else {
                match span.parse::<i64>() {
                    Ok(v) => out.values.push(NumericValue::Int(v)),
                    Err(_) => out.had_error = true,
                }
            }
        }
    }
    out
}

/// 왼쪽부터 겹치지 않는 수치 구간을 찾습니다.
fn numeric_spans(token: &str) -> Vec<&str> {
    let bytes = token.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let mut j = i;
        if matches!(bytes[j], b'-' | b'+') {
            j += 1;
        }
        if j >= bytes.len() || !bytes[j].is_ascii_digit() {
            i += 1;
            continue;
        }
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j + 1 < bytes.len() && bytes[j] == b'.' && bytes[j + 1].is_ascii_digit() {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
        }
        // 구간 경계는 모두 ASCII 바이트이므로 char 경계와 일치
        spans.push(&token[start..j]);
        i = j;
    }
    spans
}

/// 값 목록 요약
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueSummary {
    /// 최소값
    pub min: Option<f64>,
    /// 최대값
    pub max: Option<f64>,
    /// 산술 평균
    pub mean: Option<f64>,
    /// 음수 포함 여부
    pub has_negative: bool,
}

impl ValueSummary {
    /// 값 목록의 요약을 계산합니다. 빈 목록이면 모두 `None`.
    pub fn of(values: &[NumericValue]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut has_negative = false;
        for v in values {
            let f = v.as_f64();
            min = min.min(f);
            max = max.max(f);
            sum += f;
            has_negative |= v.is_negative();
        }
        Self {
            min: Some(min),
            max: Some(max),
            mean: Some(sum / values.len() as f64),
            has_negative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_follow_leftmost_matching() {
        assert_eq!(numeric_spans("1.2.3"), vec!["1.2", "3"]);
        assert_eq!(numeric_spans("+-5"), vec!["-5"]);
        assert_eq!(numeric_spans("7."), vec!["7"]);
        assert_eq!(numeric_spans("온도 25.5도"), vec!["25.5"]);
        assert!(numeric_spans("abc").is_empty());
    }

    #[test]
    fn extract_marks_float_by_dot() {
        let out = extract_values(&["3", "+4.0", " 419"]);
        assert_eq!(
            out.values,
            vec![
                NumericValue::Int(3),
                NumericValue::Float(4.0),
                NumericValue::Int(419)
            ]
        );
        assert!(!out.had_error);
    }

    #[test]
    fn summary_of_empty_is_none() {
        assert_eq!(ValueSummary::of(&[]), ValueSummary::default());
    }

    #[test]
    fn summary_mixes_int_and_float() {
        let s = ValueSummary::of(&[NumericValue::Int(2), NumericValue::Float(-1.0)]);
        assert_eq!(s.min, Some(-1.0));
        assert_eq!(s.max, Some(2.0));
        assert_eq!(s.mean, Some(0.5));
        assert!(s.has_negative);
    }
}
