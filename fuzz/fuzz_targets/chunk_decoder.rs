#![no_main]

use libfuzzer_sys::fuzz_target;

use fieldtail_log_pipeline::collector::decode_chunk;

fuzz_target!(|data: &[u8]| {
    let chunk = decode_chunk(data.to_vec());

    // 디코딩 결과와 무관하게 소비한 바이트 수는 입력 길이와 같아야 한다
    assert_eq!(chunk.consumed, data.len() as u64);
    if std::str::from_utf8(data).is_ok() {
        assert!(!chunk.legacy);
    }

    // 라인 끝 위치는 증가하며 청크를 벗어나지 않는다
    let mut prev = 0;
    for line in &chunk.lines {
        assert!(line.end > prev && line.end <= chunk.consumed);
        assert!(!line.text.contains(['\n', '\r']));
        prev = line.end;
    }
});
