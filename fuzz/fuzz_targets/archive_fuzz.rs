#![no_main]
use libfuzzer_sys::fuzz_target;
use pltdecode::plt::{KeyStream, decode_all};
use pltdecode::testkit::ArchiveBuilder;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let w = 1 + u32::from(data[0] % 16);
    let h = 1 + u32::from(data[1] % 16);
    let c = if data[2] & 1 == 0 { 3 } else { 4 };
    let Ok(keys) = KeyStream::new(vec![data[3], 0x77]) else {
        return;
    };

    let size = (w * h * c) as usize;
    let frames: Vec<&[u8]> = data[4..].chunks_exact(size).take(8).collect();
    let Some((base, rest)) = frames.split_first() else {
        return;
    };

    let mut builder = ArchiveBuilder::new(w, h, c).base(base);
    for frame in rest {
        builder = builder.delta(frame);
    }
    let archive = builder.build(&keys);

    let decoded = decode_all(&archive, &keys).unwrap();
    assert_eq!(decoded.len(), frames.len());
    for (got, want) in decoded.iter().zip(&frames) {
        assert_eq!(got.as_slice(), *want);
    }
});
