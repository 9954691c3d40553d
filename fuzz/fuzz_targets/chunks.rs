#![no_main]

use libfuzzer_sys::fuzz_target;

use sniff_csv::Reader;

fuzz_target!(|data: &[u8]| {
    let reader = match Reader::from_bytes(data) {
        Ok(reader) => reader,
        Err(_) => return,
    };

    if let Ok(offsets) = reader.chunks(3) {
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(offsets.last().copied(), Some(reader.end_offset()));
    }
});
