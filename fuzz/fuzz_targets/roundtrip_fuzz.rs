#![no_main]
use libfuzzer_sys::fuzz_target;
use pltdecode::plt::rle;
use pltdecode::testkit::rle_encode;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the band count, the rest is the frame.
    let frame = &data[1..];
    let bands = 1 + usize::from(data[0]) % frame.len().min(8);

    let payload = rle_encode(frame, bands);
    let decoded = rle::decode(&payload, frame.len(), bands).unwrap();
    assert_eq!(decoded, frame);

    if let Some(short) = payload.len().checked_sub(1) {
        let err = rle::decode(&payload[..short], frame.len(), bands).unwrap_err();
        assert!(err.is_truncation());
    }
});
