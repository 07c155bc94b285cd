#![no_main]

use ironcheck_resolver::hints::HintFile;
use ironcheck_resolver::suppression::RuleLoader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let _ = RuleLoader::parse_yaml::<HintFile>(yaml_str, "fuzz-input.yml");
    }
});
