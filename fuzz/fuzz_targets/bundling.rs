#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use ironcheck_core::Component;
use ironcheck_core::types::{Confidence, Ecosystem};
use ironcheck_resolver::DependencyBundler;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzComponent {
    dir: u8,
    file_name: String,
    sha1: Option<u8>,
    npm: bool,
    is_virtual: bool,
    name: String,
    version: String,
}

fuzz_target!(|input: Vec<FuzzComponent>| {
    // 컴포넌트 수 제한 (쌍별 비교는 O(n^2))
    let mut components: Vec<Component> = input
        .into_iter()
        .take(32)
        .map(|f| {
            let path = format!("/app{}/lib/{}", f.dir % 4, f.file_name);
            let mut c = if f.is_virtual {
                Component::new_virtual(path, Ecosystem::Npm, f.name, Some(f.version))
            } else {
                let mut c = Component::new(path);
                c.ecosystem = Some(if f.npm { Ecosystem::Npm } else { Ecosystem::Java });
                c.name = Some(f.name);
                c.version = Some(f.version);
                c
            };
            c.sha1 = f.sha1.map(|h| format!("{h:040}"));
            c.evidence.add_evidence(
                ironcheck_core::types::EvidenceType::Product,
                "file",
                "name",
                c.file_name.clone(),
                Confidence::High,
            );
            c
        })
        .collect();

    let before: usize = components.iter().map(|c| 1 + c.related.len()).sum();
    DependencyBundler::bundle(&mut components);
    let after: usize = components.iter().map(|c| 1 + c.related.len()).sum();

    // 병합은 컴포넌트를 잃지 않으며 related는 평탄하게 유지됨
    assert_eq!(before, after);
    assert!(components.iter().all(|c| c.related.iter().all(|r| r.related.is_empty())));
});
