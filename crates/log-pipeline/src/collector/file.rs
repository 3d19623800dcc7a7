//! 파일 탐색과 증분 읽기
//!
//! 로그 디렉토리에 glob 패턴을 붙여 대상 파일을 찾고, 저장된 오프셋 이후의
//! 바이트만 읽습니다. 데이터가 없어도 기다리지 않습니다.
//!
//! # 로테이션 감지
//! - 파일 식별자(Unix에서는 inode) 변경
//! - 파일 크기가 저장된 오프셋보다 작아짐 (truncation)
//!
//! 두 경우 모두 호출자가 오프셋을 0으로 되돌립니다.
//!
//! # 인코딩
//! UTF-8로 먼저 디코딩하고, 실패하면 청크 전체를 EUC-KR(CP949)로 다시
//! 디코딩합니다. 이때 해석할 수 없는 바이트는 U+FFFD로 바뀝니다.
//!
//! # 라인 분리
//! `\r\n`, `\n`, 단독 `\r`을 모두 줄바꿈으로 봅니다. 두 인코딩 모두 이
//! 바이트를 멀티바이트 문자 안에 쓰지 않으므로, 원시 바이트에서 먼저 나눈 뒤
//! 라인별로 디코딩합니다. 각 라인은 원시 바이트 기준 끝 위치를 가지므로
//! 호출자는 처리한 라인까지만 오프셋을 전진시킬 수 있습니다.

use std::collections::BTreeSet;
use std::fs::{File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use encoding_rs::EUC_KR;

/// 디코딩된 라인 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLine {
    /// 줄바꿈을 제외한 텍스트
    pub text: String,
    /// 청크 시작 기준, 줄바꿈까지 포함한 원시 바이트 끝 위치
    pub end: u64,
}

/// 디코딩된 읽기 청크
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 디코딩된 라인 (파일 순서)
    pub lines: Vec<ChunkLine>,
    /// 소비한 원시 바이트 수
    pub consumed: u64,
    /// 레거시 인코딩으로 디코딩했는지
    pub legacy: bool,
}

/// 로그 디렉토리에서 패턴에 맞는 파일을 찾습니다.
///
/// 결과는 정렬되고 중복이 제거됩니다. 잘못된 패턴은 경고 후 건너뜁니다.
pub fn discover_files(log_dir: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for pattern in patterns {
        let full = log_dir.join(pattern);
        let full = full.to_string_lossy();
        let paths = match glob::glob(&full) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(pattern = %full, error = %e, "invalid include pattern");
                continue;
            }
        };
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    found.insert(path);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "unreadable glob entry"),
            }
        }
    }
    found.into_iter().collect()
}

/// 파일 식별자를 반환합니다.
#[cfg(unix)]
pub fn file_identity(meta: &Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    meta.ino().to_string()
}

/// 파일 식별자를 반환합니다.
///
/// inode가 없는 플랫폼에서는 생성 시각을 사용합니다.
#[cfg(not(unix))]
pub fn file_identity(meta: &Metadata) -> String {
    meta.created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos().to_string())
        .unwrap_or_else(|| "0".to_owned())
}

/// `offset` 이후의 모든 바이트를 읽습니다.
pub fn read_from(path: &Path, offset: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// 읽은 바이트를 라인 단위 텍스트로 디코딩합니다.
///
/// 끝에 줄바꿈이 없는 마지막 라인도 포함하며, 모든 바이트를 소비한 것으로 봅니다.
pub fn decode_chunk(bytes: Vec<u8>) -> Chunk {
    let consumed = bytes.len() as u64;
    let legacy = std::str::from_utf8(&bytes).is_err();

    let mut replaced = false;
    let lines = split_lines(&bytes)
        .into_iter()
        .map(|(start, content_end, end)| {
            let raw = &bytes[start..content_end];
            let text = if legacy {
                let (text, had_errors) = EUC_KR.decode_without_bom_handling(raw);
                replaced |= had_errors;
                text.into_owned()
            } else {
                String::from_utf8_lossy(raw).into_owned()
            };
            ChunkLine {
                text,
                end: end as u64,
            }
        })
        .collect();

    if replaced {
        tracing::debug!(bytes = consumed, "legacy decode replaced invalid sequences");
    }
    Chunk {
        lines,
        consumed,
        legacy,
    }
}

/// 원시 바이트를 라인 범위 `(시작, 내용 끝, 줄바꿈 포함 끝)`으로 나눕니다.
fn split_lines(bytes: &[u8]) -> Vec<(usize, usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                ranges.push((start, i, i + 1));
                i += 1;
                start = i;
            }
            b'\r' => {
                let end = if bytes.get(i + 1) == Some(&b'\n') { i + 2 } else { i + 1 };
                ranges.push((start, i, end));
                i = end;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        ranges.push((start, bytes.len(), bytes.len()));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn discover_matches_patterns_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.log", "b.log", "c.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.log")).unwrap();

        let patterns = vec!["*.log".to_owned(), "a.*".to_owned()];
        let found = discover_files(dir.path(), &patterns);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.log", "b.log"]);
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "x").unwrap();
        let patterns = vec!["[".to_owned(), "*.log".to_owned()];
        assert_eq!(discover_files(dir.path(), &patterns).len(), 1);
    }

    #[test]
    fn read_from_offset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"line1\nline2\n").unwrap();
        assert_eq!(read_from(file.path(), 6).unwrap(), b"line2\n");
        assert!(read_from(file.path(), 12).unwrap().is_empty());
    }

    #[test]
    fn read_missing_file_fails() {
        assert!(read_from(Path::new("/nonexistent/fieldtail.log"), 0).is_err());
    }

    fn texts(chunk: &Chunk) -> Vec<&str> {
        chunk.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn utf8_is_decoded_directly() {
        let chunk = decode_chunk("온도;1;2;3\n".as_bytes().to_vec());
        assert!(!chunk.legacy);
        assert_eq!(texts(&chunk), vec!["온도;1;2;3"]);
        assert_eq!(chunk.lines[0].end, chunk.consumed);
    }

    #[test]
    fn all_line_endings_split() {
        let chunk = decode_chunk(b"a;1;2\r\nb;1;2\rc;1;2\n\nd;1;2".to_vec());
        assert_eq!(texts(&chunk), vec!["a;1;2", "b;1;2", "c;1;2", "", "d;1;2"]);
        let ends: Vec<u64> = chunk.lines.iter().map(|l| l.end).collect();
        assert_eq!(ends, vec![7, 13, 19, 20, 25]);
        assert_eq!(chunk.consumed, 25);
    }

    #[test]
    fn legacy_lines_keep_raw_offsets() {
        // "한;1" + CR + "글" in EUC-KR
        let bytes = vec![0xC7, 0xD1, b';', b'1', b'\r', 0xB1, 0xDB];
        let chunk = decode_chunk(bytes);
        assert!(chunk.legacy);
        assert_eq!(texts(&chunk), vec!["한;1", "글"]);
        assert_eq!(chunk.lines[0].end, 5);
        assert_eq!(chunk.lines[1].end, 7);
    }

    #[test]
    fn euc_kr_falls_back() {
        // "한글" in EUC-KR
        let bytes = vec![0xC7, 0xD1, 0xB1, 0xDB, b';', b'1'];
        let chunk = decode_chunk(bytes);
        assert!(chunk.legacy);
        assert_eq!(texts(&chunk), vec!["한글;1"]);
        assert_eq!(chunk.consumed, 6);
    }

    #[test]
    fn undecodable_bytes_are_replaced() {
        let chunk = decode_chunk(vec![b'A', 0xFF, b'B']);
        assert!(chunk.legacy);
        assert!(chunk.lines[0].text.contains('\u{FFFD}'));
        assert_eq!(chunk.consumed, 3);
    }

    #[cfg(unix)]
    #[test]
    fn identity_changes_on_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one").unwrap();
        let first = file_identity(&std::fs::metadata(&path).unwrap());

        let replacement = dir.path().join("a.log.new");
        std::fs::write(&replacement, "two").unwrap();
        std::fs::rename(&replacement, &path).unwrap();
        let second = file_identity(&std::fs::metadata(&path).unwrap());
        assert_ne!(first, second);
    }
}
