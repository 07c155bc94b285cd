#![no_main]

use ironcheck_core::identifier::{Cpe, PackageUrl};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = std::str::from_utf8(data) {
        if let Some(cpe) = Cpe::parse(value) {
            let _ = cpe.to_string();
        }
        if let Some(purl) = PackageUrl::parse(value) {
            let _ = purl.to_string();
        }
    }
});
