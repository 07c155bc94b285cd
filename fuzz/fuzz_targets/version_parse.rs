#![no_main]

use ironcheck_resolver::version;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Some(parsed) = version::parse(text) {
            let _ = parsed.to_string();
            let _ = version::parse_version(text, true);
        }
    }
});
