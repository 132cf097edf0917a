#![no_main]
use libfuzzer_sys::fuzz_target;
use ilreplay_log::{classify, Line};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Classifying and draining the arguments must never panic
    if let Ok(Line::Statement(mut stmt)) = classify(text) {
        while !stmt.args.is_end() {
            if stmt.args.next_token().is_err() {
                break;
            }
        }
    }
});
