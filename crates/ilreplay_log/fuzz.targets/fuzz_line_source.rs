#![no_main]
use libfuzzer_sys::fuzz_target;
use ilreplay_log::LineSource;

fuzz_target!(|data: &[u8]| {
    let mut last = 0;
    for line in LineSource::new(data) {
        match line {
            Ok(line) => {
                assert!(line.number > last);
                last = line.number;
            }
            Err(_) => break,
        }
    }
});
