#![no_main]

use libfuzzer_sys::fuzz_target;

use sniff_csv::{ByteRecord, Reader};

fuzz_target!(|data: &[u8]| {
    let mut reader = match Reader::from_bytes(data) {
        Ok(reader) => reader,
        Err(_) => return,
    };

    let mut record = ByteRecord::new();

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => assert_eq!(record.len(), reader.field_count()),
            Ok(false) => break,
            Err(_) => {
                let pos = reader.position();

                if reader.resync().is_err() || reader.position() == pos {
                    break;
                }
            }
        }
    }
});
