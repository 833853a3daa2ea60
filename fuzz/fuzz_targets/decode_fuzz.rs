#![no_main]
use libfuzzer_sys::fuzz_target;
use pltdecode::plt::{KeyStream, decode_all, read_index, rle};

fuzz_target!(|data: &[u8]| {
    // Arbitrary archives must only ever produce errors, never panics.
    let Ok(keys) = KeyStream::new(vec![0xA5, 0x5A, 0x0F]) else {
        return;
    };
    let _ = decode_all(data, &keys);
    let _ = read_index(data);

    // Raw delta payloads, with size and band count taken from the input.
    if data.len() >= 3 {
        let size = usize::from(u16::from_le_bytes([data[0], data[1]]));
        let bands = usize::from(data[2] % 8);
        if let Ok(out) = rle::decode(&data[3..], size, bands) {
            assert_eq!(out.len(), size);
        }
    }
});
