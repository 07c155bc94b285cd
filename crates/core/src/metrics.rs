//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않은 경우 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `ironcheck_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(ironcheck_core::metrics::IDENTIFIERS_ADDED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 분석기 레이블 키 (cpe, false_positive, bundling, ...)
pub const LABEL_ANALYZER: &str = "analyzer";

/// 에코시스템 레이블 키 (java, npm, ...)
pub const LABEL_ECOSYSTEM: &str = "ecosystem";

/// 식별 결과 레이블 키 (exact, best_guess, broad)
pub const LABEL_MATCH: &str = "match";

// ─── 엔진 메트릭 ───────────────────────────────────────────────────

/// 분석된 컴포넌트 수 (counter)
pub const COMPONENTS_ANALYZED_TOTAL: &str = "ironcheck_components_analyzed_total";

/// 부착된 취약 소프트웨어 식별자 수 (counter, label: match)
pub const IDENTIFIERS_ADDED_TOTAL: &str = "ironcheck_identifiers_added_total";

/// 억제 규칙 또는 오탐 필터로 제거된 식별자 수 (counter, label: analyzer)
pub const IDENTIFIERS_SUPPRESSED_TOTAL: &str = "ironcheck_identifiers_suppressed_total";

/// 후보 검색 실패 수 (counter)
pub const SEARCH_FAILURES_TOTAL: &str = "ironcheck_search_failures_total";

/// 병합/번들링으로 흡수된 컴포넌트 수 (counter, label: analyzer)
pub const COMPONENTS_MERGED_TOTAL: &str = "ironcheck_components_merged_total";

/// 분석 실행 소요 시간 (histogram, 초)
pub const ANALYSIS_DURATION_SECONDS: &str = "ironcheck_analysis_duration_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 분석 소요 시간 히스토그램 버킷 (초)
pub const ANALYSIS_DURATION_BUCKETS: [f64; 9] = [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0, 300.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        COMPONENTS_ANALYZED_TOTAL,
        "Total number of components passed through the analysis pipeline"
    );
    describe_counter!(
        IDENTIFIERS_ADDED_TOTAL,
        "Total number of vulnerable software identifiers attached to components"
    );
    describe_counter!(
        IDENTIFIERS_SUPPRESSED_TOTAL,
        "Total number of identifiers removed by suppression rules or false positive filtering"
    );
    describe_counter!(
        SEARCH_FAILURES_TOTAL,
        "Total number of candidate index searches that failed"
    );
    describe_counter!(
        COMPONENTS_MERGED_TOTAL,
        "Total number of components absorbed into another component"
    );
    describe_histogram!(
        ANALYSIS_DURATION_SECONDS,
        "Time to complete a full analysis run in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        COMPONENTS_ANALYZED_TOTAL,
        IDENTIFIERS_ADDED_TOTAL,
        IDENTIFIERS_SUPPRESSED_TOTAL,
        SEARCH_FAILURES_TOTAL,
        COMPONENTS_MERGED_TOTAL,
        ANALYSIS_DURATION_SECONDS,
    ];

    #[test]
    fn metric_names_have_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("ironcheck_"),
                "Metric '{}' should start with 'ironcheck_'",
                name
            );
        }
    }

    #[test]
    fn counter_names_end_with_total() {
        for name in &ALL_METRIC_NAMES[..5] {
            assert!(name.ends_with("_total"), "Counter '{}' should end with _total", name);
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn analysis_duration_buckets_are_sorted() {
        for pair in ANALYSIS_DURATION_BUCKETS.windows(2) {
            assert!(pair[1] > pair[0], "Bucket values must be in ascending order");
        }
    }

    #[test]
    fn describe_without_recorder_is_noop() {
        describe_metrics();
    }
}
