//! 리졸버 벤치마크
//!
//! 버전 파싱, 후보 인덱스 검색, CPE 식별, 번들링 성능을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::pipeline::{Analyzer, CandidateIndex};
use ironcheck_core::types::{CandidateQuery, Confidence, Ecosystem, EvidenceType, QueryTerm};
use ironcheck_core::Component;
use ironcheck_resolver::index::IndexEntry;
use ironcheck_resolver::{
    CpeAnalyzer, DependencyBundler, MemoryCandidateIndex, MemoryVulnerabilityDb, ResolverConfig,
    version,
};

const VERSION_SAMPLES: &[&str] = &[
    "struts2-core-2.3.20.jar",
    "spring-webmvc-5.3.31.RELEASE",
    "Implementation-Version: 1.2.17",
    "jquery-3.6.0.min.js",
    "openssl 1.0.2k-fips",
    "no version here",
];

/// `n`개 벤더/제품 엔트리를 가진 인덱스
fn generate_index(n: usize) -> MemoryCandidateIndex {
    let mut entries = vec![IndexEntry {
        vendor: "apache".to_owned(),
        product: "struts".to_owned(),
    }];
    for i in 0..n {
        entries.push(IndexEntry {
            vendor: format!("vendor{}", i % 50),
            product: format!("product_{i}"),
        });
    }
    MemoryCandidateIndex::from_entries(entries)
}

fn struts(path: &str, sha1: &str) -> Component {
    let mut c = Component::new(path);
    c.ecosystem = Some(Ecosystem::Java);
    c.sha1 = Some(sha1.to_owned());
    let ev = &mut c.evidence;
    ev.add_evidence(EvidenceType::Vendor, "pom", "groupid", "org.apache.struts", Confidence::Highest);
    ev.add_evidence(EvidenceType::Product, "pom", "artifactid", "struts2-core", Confidence::Highest);
    ev.add_evidence(EvidenceType::Version, "pom", "version", "2.3.20", Confidence::Highest);
    c
}

fn bench_version_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_parse");
    group.throughput(Throughput::Elements(VERSION_SAMPLES.len() as u64));
    group.bench_function("mixed_samples", |b| {
        b.iter(|| {
            for text in VERSION_SAMPLES {
                let _ = version::parse(black_box(text));
            }
        })
    });
    group.finish();
}

fn bench_index_search(c: &mut Criterion) {
    let term = |text: &str| QueryTerm {
        text: text.to_owned(),
        boost: 1.0,
    };
    let query = CandidateQuery {
        vendor: vec![term("apache"), term("struts")],
        product: vec![term("struts"), term("core")],
    };

    let mut group = c.benchmark_group("index_search");
    for size in [100, 1_000, 10_000].iter() {
        let index = generate_index(*size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| index.search(black_box(&query), 25).unwrap())
        });
    }
    group.finish();
}

fn bench_cpe_identification(c: &mut Criterion) {
    let db = MemoryVulnerabilityDb::from_json(
        r#"{"software": [{"vendor": "apache", "product": "struts", "version": "2.3.20"}]}"#,
    )
    .unwrap();
    let ctx = AnalysisContext::new()
        .with_index(Arc::new(generate_index(1_000)))
        .with_database(Arc::new(db));
    let analyzer = CpeAnalyzer::new(&ResolverConfig::default());

    let mut group = c.benchmark_group("cpe_identification");
    group.throughput(Throughput::Elements(1));
    group.bench_function("struts_exact_match", |b| {
        b.iter(|| {
            let mut component = struts("/lib/struts2-core-2.3.20.jar", "aa");
            analyzer.process(black_box(&mut component), &ctx).unwrap();
            component
        })
    });
    group.finish();
}

fn bench_bundling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundling");
    for size in [10, 100, 500].iter() {
        let components: Vec<Component> = (0..*size)
            .map(|i| struts(&format!("/app{}/lib/struts2-core-2.3.20.jar", i % 7), &format!("{:040}", i % 13)))
            .collect();
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut list = components.clone();
                DependencyBundler::bundle(black_box(&mut list))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_version_parse,
    bench_index_search,
    bench_cpe_identification,
    bench_bundling
);
criterion_main!(benches);
