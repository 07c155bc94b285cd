//! 후보 검색 -- 증거 값으로 가중치 질의를 만들고 인덱스 결과를 거릅니다.
//!
//! # 흐름
//! ```text
//! EvidenceCollection ──▶ collect_terms ──▶ TermMap(빈도)
//!                                            │
//!            가중치 토큰 ──▶ build_query ◀────┘
//!                                │
//!                                ▼
//!                 CandidateIndex::search ──▶ 점수 필터 ──▶ (vendor, product) 중복 제거
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;

use ironcheck_core::component::Component;
use ironcheck_core::error::IndexError;
use ironcheck_core::evidence::Evidence;
use ironcheck_core::pipeline::CandidateIndex;
use ironcheck_core::types::{CandidateEntry, CandidateQuery, QueryTerm};

use crate::config::ResolverConfig;
use crate::patterns::{self, StaticRegex};
use crate::version;

/// 증거 값 하나의 최대 길이
const MAX_TERM_LENGTH: usize = 1000;

/// 인덱스 어휘에 없는 문자
static RX_CLEANSE: StaticRegex = LazyLock::new(|| patterns::compile(r"[^A-Za-z0-9 ._:/-]"));

/// 검색어 → 등장 빈도
pub type TermMap = BTreeMap<String, u32>;

/// 인덱스가 사용하지 않는 문자를 공백으로 바꿉니다.
pub fn cleanse_text(text: &str) -> String {
    match patterns::get(&RX_CLEANSE) {
        Some(rx) => rx.replace_all(text, " ").into_owned(),
        None => text.to_owned(),
    }
}

/// 1000자를 넘는 값을 단어 경계에서 자릅니다.
///
/// 1000번째 문자 이전의 마지막 공백, 없으면 `.` `-` `_` `/` 순으로 찾고
/// 모두 없으면 1000자에서 자릅니다.
pub fn truncate_term(value: &str) -> &str {
    if value.len() <= MAX_TERM_LENGTH {
        return value;
    }
    // cleanse_text 이후에는 ASCII만 남지만 원본 값에 대해서도 안전하게 경계를 맞춘다
    let mut limit = MAX_TERM_LENGTH;
    while !value.is_char_boundary(limit) {
        limit -= 1;
    }
    let window = &value[..limit];
    for sep in [' ', '.', '-', '_', '/'] {
        if let Some(pos) = window.rfind(sep).filter(|p| *p > 0) {
            return &value[..pos];
        }
    }
    window
}

/// 증거 값을 정제하여 빈도 맵에 누적합니다.
pub fn collect_terms<'a, I>(terms: &mut TermMap, evidence: I)
where
    I: IntoIterator<Item = &'a Evidence>,
{
    for e in evidence {
        let value = cleanse_text(&e.value);
        if value.trim().is_empty() {
            continue;
        }
        let value = truncate_term(&value);
        *terms.entry(value.to_owned()).or_insert(0) += 1;
    }
}

/// 패키지 URL 식별자의 주 버전 집합
pub fn major_versions(component: &Component) -> BTreeSet<String> {
    component
        .software_identifiers
        .iter()
        .filter_map(|i| i.as_purl())
        .filter_map(|p| p.version)
        .filter_map(|v| version::parse_version(&v, false))
        .filter_map(|v| v.major().map(str::to_owned))
        .collect()
}

/// 제품 검색어에 주 버전을 붙인 변형(`term5`, `termv5`)을 추가합니다.
///
/// 숫자로 끝나거나 이미 해당 버전으로 끝나는 검색어에는 붙이지 않습니다.
pub fn add_major_version_terms(major_versions: &BTreeSet<String>, products: &mut TermMap) {
    let mut extra = TermMap::new();
    for prefixed in [false, true] {
        for term in products.keys() {
            if term.ends_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            for major in major_versions {
                let suffix = if prefixed {
                    format!("v{major}")
                } else {
                    major.clone()
                };
                let candidate = format!("{term}{suffix}");
                if term.ends_with(&suffix) || products.contains_key(&candidate) {
                    continue;
                }
                *extra.entry(candidate).or_insert(0) += 1;
            }
        }
    }
    products.extend(extra);
}

/// 알파벳만 남기고 대소문자 무시 비교합니다.
fn equals_ignore_case_and_non_alpha(left: &str, right: &str) -> bool {
    let l = left.chars().filter(char::is_ascii_alphabetic);
    let r = right.chars().filter(char::is_ascii_alphabetic);
    l.map(|c| c.to_ascii_lowercase())
        .eq(r.map(|c| c.to_ascii_lowercase()))
}

fn find_boost_term<'a>(word: &str, weightings: &'a BTreeSet<String>) -> Option<&'a str> {
    weightings
        .iter()
        .find(|w| equals_ignore_case_and_non_alpha(word, w))
        .map(String::as_str)
}

/// 하나의 필드에 대한 가중치 검색어 목록을 만듭니다.
///
/// 검색어 부스트는 빈도이며, 가중치 토큰과 일치하는 단어는 빈도 × `weighting_boost`를
/// 받고 가중치 토큰 자체도 같은 부스트로 추가됩니다.
fn weighted_terms(
    terms: &TermMap,
    weightings: &BTreeSet<String>,
    weighting_boost: f32,
) -> Vec<QueryTerm> {
    let mut out = Vec::new();
    for (phrase, frequency) in terms {
        let frequency = *frequency as f32;
        let mut boosted = Vec::new();
        for word in phrase.split(' ').filter(|w| !w.is_empty()) {
            match find_boost_term(word, weightings) {
                Some(boost_term) => {
                    let boost = frequency * weighting_boost;
                    out.push(QueryTerm {
                        text: word.to_owned(),
                        boost,
                    });
                    if !boost_term.eq_ignore_ascii_case(word) {
                        boosted.push(QueryTerm {
                            text: boost_term.to_owned(),
                            boost,
                        });
                    }
                }
                None => out.push(QueryTerm {
                    text: word.to_owned(),
                    boost: frequency,
                }),
            }
        }
        out.extend(boosted);
    }
    out
}

/// 벤더/제품 검색어로 질의를 만듭니다. 어느 한쪽이 비어 있으면 `None`입니다.
pub fn build_query(
    vendor: &TermMap,
    product: &TermMap,
    vendor_weightings: &BTreeSet<String>,
    product_weightings: &BTreeSet<String>,
    weighting_boost: f32,
) -> Option<CandidateQuery> {
    let product = weighted_terms(product, product_weightings, weighting_boost);
    let vendor = weighted_terms(vendor, vendor_weightings, weighting_boost);
    if product.is_empty() || vendor.is_empty() {
        return None;
    }
    Some(CandidateQuery { vendor, product })
}

/// 인덱스 검색기
///
/// 결과 수 상한, 최소 점수, 가중치 배수를 적용합니다.
#[derive(Debug, Clone)]
pub struct CandidateSearch {
    max_results: usize,
    min_score: f32,
    weighting_boost: f32,
}

impl CandidateSearch {
    /// 리졸버 설정으로 검색기를 생성합니다.
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            max_results: config.max_query_results,
            min_score: config.min_search_score,
            weighting_boost: config.weighting_boost,
        }
    }

    /// 검색어로 후보를 조회합니다.
    ///
    /// 질의를 만들 수 없으면 빈 목록을 반환합니다.
    ///
    /// # Errors
    ///
    /// 인덱스 조회 실패 시 `IndexError`
    pub fn search(
        &self,
        index: &dyn CandidateIndex,
        vendor: &TermMap,
        product: &TermMap,
        vendor_weightings: &BTreeSet<String>,
        product_weightings: &BTreeSet<String>,
    ) -> Result<Vec<CandidateEntry>, IndexError> {
        let Some(query) = build_query(
            vendor,
            product,
            vendor_weightings,
            product_weightings,
            self.weighting_boost,
        ) else {
            return Ok(Vec::new());
        };
        tracing::trace!(query = %query, "candidate search");

        let entries = index.search(&query, self.max_results)?;
        let mut seen = HashSet::new();
        let results = entries
            .into_iter()
            .filter(|e| e.score >= self.min_score)
            .filter(|e| seen.insert((e.vendor.clone(), e.product.clone())))
            .take(self.max_results)
            .collect();
        Ok(results)
    }
}
