//! 후보 검증 -- 검색 결과의 벤더/제품 단어가 실제 증거에 있는지 확인합니다.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use ironcheck_core::component::Component;
use ironcheck_core::evidence::Evidence;
use ironcheck_core::types::{CandidateEntry, Ecosystem, EvidenceType};

use crate::patterns::{self, StaticRegex};

/// 단어 분리 패턴
static RX_WORD_SEPARATOR: StaticRegex = LazyLock::new(|| patterns::compile(r"[\s_-]+"));

/// 검증과 선언 버전 판단에서 무시하는 단어
const STOP_WORDS: &[&str] = &[
    // 영어 불용어
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
    // 벤더/제품 이름에 흔한 일반어
    "software", "framework", "inc", "com", "org", "net", "www", "consulting", "ltd",
    "foundation", "project",
];

/// 불용어인지 확인합니다 (대소문자 무시).
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.iter().any(|s| s.eq_ignore_ascii_case(word))
}

/// 패키지 이름에서 영숫자만 남깁니다.
pub fn clean_package_name(name: &str) -> String {
    name.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn split_words(text: &str) -> Vec<&str> {
    match patterns::get(&RX_WORD_SEPARATOR) {
        Some(rx) => rx.split(text).filter(|w| !w.is_empty()).collect(),
        None => text.split_whitespace().collect(),
    }
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// 증거 값들이 주어진 텍스트의 모든 내용어를 포함하는지 확인합니다.
///
/// 1. 대소문자 무시 완전 일치가 있으면 즉시 참
/// 2. 텍스트를 `[\s_-]+`로 나누고 불용어를 버림
/// 3. 두 글자 이하 단어는 다음 단어와 합침 (마지막 짧은 단어는 앞 단어에 붙인 변형 추가)
/// 4. 각 단어가 구분자를 제거한 어떤 증거 값의 부분 문자열이어야 함
pub fn collection_contains_string<'a, I>(evidence: I, text: &str) -> bool
where
    I: IntoIterator<Item = &'a Evidence>,
{
    let evidence: Vec<&Evidence> = evidence.into_iter().collect();
    let text_lower = text.to_lowercase();
    if evidence.iter().any(|e| e.value.to_lowercase() == text_lower) {
        return true;
    }

    let mut words: Vec<String> = Vec::new();
    let mut pending: Option<&str> = None;
    for word in split_words(text) {
        if let Some(short) = pending.take() {
            words.push(format!("{short}{word}"));
        } else if word.len() <= 2 {
            pending = Some(word);
        } else if !is_stop_word(word) {
            words.push(word.to_owned());
        }
    }
    if let Some(short) = pending {
        match words.last() {
            Some(last) => {
                let joined = format!("{last}{short}");
                words.push(joined);
            }
            None => words.push(short.to_owned()),
        }
    }
    if words.is_empty() {
        return false;
    }

    let values: Vec<String> = evidence.iter().map(|e| strip_separators(&e.value)).collect();
    words.iter().all(|word| {
        let word = word.to_lowercase();
        values
            .iter()
            .any(|v| v.contains(&word) && !(word == "http" && v.contains("http:")))
    })
}

/// 후보가 컴포넌트의 증거와 일치하는지 확인합니다.
///
/// npm 컴포넌트는 패키지 URL 이름과 제품을 영숫자만 남겨 비교합니다.
/// 그 외에는 벤더/제품 증거에 후보 단어가 모두 있어야 하며, 제품은 끝의
/// 주 버전(`5`, `v5`)을 떼어낸 형태로도 비교합니다.
pub fn verify(
    candidate: &CandidateEntry,
    component: &Component,
    major_versions: &BTreeSet<String>,
) -> bool {
    if component.ecosystem == Some(Ecosystem::Npm) {
        let product = clean_package_name(&candidate.product);
        return component
            .software_identifiers
            .iter()
            .filter_map(|i| i.as_purl())
            .any(|p| clean_package_name(&p.name) == product);
    }

    let vendors = component.evidence.evidence(EvidenceType::Vendor);
    if !collection_contains_string(vendors, &candidate.vendor) {
        return false;
    }
    let products = || component.evidence.evidence(EvidenceType::Product);
    if collection_contains_string(products(), &candidate.product) {
        return true;
    }

    major_versions.iter().any(|major| {
        [format!("v{major}"), major.clone()].iter().any(|suffix| {
            candidate
                .product
                .strip_suffix(suffix.as_str())
                .filter(|base| !base.is_empty())
                .is_some_and(|base| collection_contains_string(products(), base))
        })
    })
}
