#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use fieldtail_log_pipeline::parser::parse_line;
use fieldtail_log_pipeline::rule::ParseOverrides;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    line: String,
    delimiter: Option<String>,
    min: Option<u8>,
    max: Option<u8>,
    drop_indexes: Vec<u8>,
    coerce_numeric: bool,
}

fuzz_target!(|input: FuzzInput| {
    let overrides = ParseOverrides {
        delimiter: input.delimiter,
        value_count_range: match (input.min, input.max) {
            (None, None) => None,
            (min, max) => Some((min.map(usize::from), max.map(usize::from))),
        },
        drop_indexes: input.drop_indexes.into_iter().map(usize::from).collect(),
        coerce_numeric: input.coerce_numeric,
    };

    // 어떤 입력에도 패닉 없이 레코드를 만들어야 한다
    let record = parse_line(&input.line, &overrides);
    assert_eq!(record.value_count, record.values.len());
    if record.parse_ok {
        assert!(record.parse_error.is_none());
    }
});
