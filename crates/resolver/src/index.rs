//! 메모리 후보 인덱스 -- JSON에서 로드한 벤더/제품 이름 목록 검색
//!
//! [`MemoryCandidateIndex`]는 [`CandidateIndex`]의 기본 구현입니다.
//!
//! # JSON 형식
//!
//! ```json
//! [
//!   { "vendor": "apache", "product": "struts" },
//!   { "vendor": "pivotal_software", "product": "spring_framework" }
//! ]
//! ```
//!
//! # 점수
//!
//! 각 필드 값은 영숫자 토큰과, 토큰이 둘 이상이면 이를 이어붙인 토큰으로 나뉩니다.
//! 필드 적중률은 질의에 등장한 토큰 비율이고, 점수는 두 필드 적중률의 기하평균에
//! 적중 검색어 부스트 합 `w`로 `w / (w + 1)`을 곱한 값입니다. 두 필드가 모두
//! 적중해야 결과에 포함됩니다.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use ironcheck_core::error::IndexError;
use ironcheck_core::pipeline::CandidateIndex;
use ironcheck_core::types::{CandidateEntry, CandidateQuery, QueryTerm};

use crate::error::ResolverError;

/// 인덱스 파일 최대 크기 (200 MB)
const MAX_INDEX_FILE_SIZE: u64 = 200 * 1024 * 1024;

/// 인덱스 엔트리 최대 개수
const MAX_INDEX_ENTRIES: usize = 2_000_000;

/// 인덱스 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// 벤더
    pub vendor: String,
    /// 제품
    pub product: String,
}

#[derive(Debug)]
struct Document {
    vendor: BTreeSet<String>,
    product: BTreeSet<String>,
}

/// 메모리 후보 인덱스
#[derive(Debug)]
pub struct MemoryCandidateIndex {
    entries: Vec<IndexEntry>,
    documents: Vec<Document>,
    /// 제품 토큰 → 문서 번호
    postings: HashMap<String, Vec<usize>>,
}

fn tokenize(text: &str) -> BTreeSet<String> {
    let parts: Vec<String> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    let mut tokens: BTreeSet<String> = parts.iter().cloned().collect();
    if parts.len() > 1 {
        tokens.insert(parts.concat());
    }
    tokens
}

/// 질의 검색어를 토큰별 최대 부스트로 펼칩니다.
fn query_tokens(terms: &[QueryTerm]) -> HashMap<String, f32> {
    let mut tokens: HashMap<String, f32> = HashMap::new();
    for term in terms {
        for token in tokenize(&term.text) {
            let boost = tokens.entry(token).or_insert(0.0);
            if term.boost > *boost {
                *boost = term.boost;
            }
        }
    }
    tokens
}

/// 필드 적중률과 적중 부스트 합
fn field_match(doc: &BTreeSet<String>, query: &HashMap<String, f32>) -> (f32, f32) {
    if doc.is_empty() {
        return (0.0, 0.0);
    }
    let mut matched = 0usize;
    let mut weight = 0.0f32;
    for token in doc {
        if let Some(boost) = query.get(token) {
            matched += 1;
            weight += *boost;
        }
    }
    (matched as f32 / doc.len() as f32, weight)
}

impl MemoryCandidateIndex {
    /// 빈 인덱스를 생성합니다.
    pub fn empty() -> Self {
        Self::from_entries(Vec::new())
    }

    /// 엔트리 목록으로 인덱스를 생성합니다.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        let mut documents = Vec::with_capacity(entries.len());
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let doc = Document {
                vendor: tokenize(&entry.vendor),
                product: tokenize(&entry.product),
            };
            for token in &doc.product {
                postings.entry(token.clone()).or_default().push(idx);
            }
            documents.push(doc);
        }
        Self {
            entries,
            documents,
            postings,
        }
    }

    /// JSON 문자열에서 인덱스를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, ResolverError> {
        let entries: Vec<IndexEntry> =
            serde_json::from_str(json).map_err(|e| ResolverError::IndexLoad {
                path: "<inline>".to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_entries(entries))
    }

    /// JSON 파일에서 인덱스를 로드합니다.
    ///
    /// # 보안 제한
    ///
    /// - 파일 최대 200MB
    /// - 엔트리 최대 2,000,000개 (초과분은 경고 후 버림)
    ///
    /// # Note
    ///
    /// 동기 I/O를 수행합니다. async 컨텍스트에서는 `spawn_blocking`으로 감싸세요.
    pub fn load(path: &Path) -> Result<Self, ResolverError> {
        let metadata = std::fs::metadata(path).map_err(|e| ResolverError::IndexLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if metadata.len() > MAX_INDEX_FILE_SIZE {
            return Err(ResolverError::FileTooBig {
                path: path.display().to_string(),
                size: metadata.len(),
                max: MAX_INDEX_FILE_SIZE,
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ResolverError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut entries: Vec<IndexEntry> =
            serde_json::from_str(&content).map_err(|e| ResolverError::IndexLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if entries.len() > MAX_INDEX_ENTRIES {
            tracing::warn!(
                path = %path.display(),
                entries = entries.len(),
                max = MAX_INDEX_ENTRIES,
                "candidate index entry limit reached, truncating"
            );
            entries.truncate(MAX_INDEX_ENTRIES);
        }

        tracing::info!(path = %path.display(), entries = entries.len(), "candidate index loaded");
        Ok(Self::from_entries(entries))
    }

    /// 엔트리 개수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CandidateIndex for MemoryCandidateIndex {
    fn search(
        &self,
        query: &CandidateQuery,
        limit: usize,
    ) -> Result<Vec<CandidateEntry>, IndexError> {
        if query.vendor.is_empty() || query.product.is_empty() {
            return Err(IndexError::Query(
                "query requires both vendor and product terms".to_owned(),
            ));
        }
        let vendor_q = query_tokens(&query.vendor);
        let product_q = query_tokens(&query.product);

        let candidates: BTreeSet<usize> = product_q
            .keys()
            .filter_map(|t| self.postings.get(t))
            .flatten()
            .copied()
            .collect();

        let mut results: Vec<CandidateEntry> = Vec::new();
        for idx in candidates {
            let (Some(doc), Some(entry)) = (self.documents.get(idx), self.entries.get(idx)) else {
                continue;
            };
            let (product_cov, product_w) = field_match(&doc.product, &product_q);
            let (vendor_cov, vendor_w) = field_match(&doc.vendor, &vendor_q);
            if product_cov == 0.0 || vendor_cov == 0.0 {
                continue;
            }
            let w = product_w + vendor_w;
            let score = (product_cov * vendor_cov).sqrt() * (w / (w + 1.0));
            results.push(CandidateEntry {
                vendor: entry.vendor.clone(),
                product: entry.product.clone(),
                score,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.vendor.cmp(&b.vendor))
                .then_with(|| a.product.cmp(&b.product))
        });
        results.truncate(limit);
        Ok(results)
    }
}
