//! 버전 파서 -- 자유 텍스트에서 구조화된 버전 추출
//!
//! [`parse_version`]은 파일 이름, 매니페스트 값 등 임의 텍스트에서 버전처럼 보이는 부분을
//! 찾아 [`StructuredVersion`]으로 분해합니다.
//!
//! # 동등성
//!
//! `StructuredVersion`의 동등성은 "뒤쪽의 0은 무시" 규칙을 따르므로 추이적이지 않습니다
//! (`1 == 1.0`, `1.0 == 1.0.0`이지만 `1 != 1.0.0`). 따라서 `PartialEq`만 구현하고
//! 정렬은 [`StructuredVersion::compare`]로 따로 제공합니다.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::patterns::{self, StaticRegex};

/// 여러 단계로 구성된 버전 (예: `1.2.3`, `2.0.0-rc1`)
static RX_VERSION: StaticRegex = LazyLock::new(|| {
    patterns::compile(
        r"(?i)[0-9]+(\.[0-9]+){1,6}([._-]?(snapshot|release|final|alpha|beta|rc$|[a-z]{1,3}[_-]?[0-9]{1,8}|[a-z]\b|[0-9]{1,8}\b))?",
    )
});

/// 단일 단계를 허용하는 버전 (예: `7`, `12-beta`)
static RX_SINGLE_VERSION: StaticRegex = LazyLock::new(|| {
    patterns::compile(
        r"[0-9]+(\.[0-9]+){0,6}([._-]?(snapshot|release|final|alpha|beta|rc$|[a-zA-Z]{1,3}[_-]?[0-9]{1,8}))?",
    )
});

/// 버전 문자열을 부분으로 나누는 패턴
static RX_VERSION_PARTS: StaticRegex = LazyLock::new(|| {
    patterns::compile(
        r"(?i)([0-9]+[a-z]{1,3}$|[a-z]{1,3}[_-]?[0-9]+|[0-9]+|(rc|release|snapshot|beta|alpha)$)",
    )
});

/// 순서가 있는 버전 부분의 나열
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredVersion {
    parts: Vec<String>,
}

impl StructuredVersion {
    /// 이미 추출된 버전 문자열을 부분으로 분해합니다.
    ///
    /// 부분 패턴이 하나도 일치하지 않으면 문자열 전체가 하나의 부분이 됩니다.
    pub fn new(version: &str) -> Self {
        let lower = version.to_lowercase();
        let mut parts: Vec<String> = patterns::get(&RX_VERSION_PARTS)
            .map(|rx| rx.find_iter(&lower).map(|m| m.as_str().to_owned()).collect())
            .unwrap_or_default();
        if parts.is_empty() {
            parts.push(version.to_owned());
        }
        Self { parts }
    }

    /// 부분 목록으로 직접 생성합니다.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// 버전 부분
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// 부분 개수
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// 부분이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// 첫 번째 부분 (주 버전)
    pub fn major(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    /// 앞의 세 단계가 같고, 그 이후 단계에서는 이 버전이 더 작은지 확인합니다.
    ///
    /// 부분 개수 차이가 3 이상이면 항상 `false`입니다.
    /// 네 번째 이후 단계는 대소문자 무시 문자열 비교를 사용합니다.
    pub fn matches_at_least_three_levels(&self, other: &StructuredVersion) -> bool {
        if self.parts.len().abs_diff(other.parts.len()) >= 3 {
            return false;
        }
        let common = self.parts.len().min(other.parts.len());
        for i in 0..common {
            let this = &self.parts[i];
            let that = &other.parts[i];
            if i >= 3 {
                if this.to_lowercase() >= that.to_lowercase() {
                    return false;
                }
            } else if this != that {
                return false;
            }
        }
        true
    }

    /// 버전을 정렬 순서로 비교합니다.
    ///
    /// 두 부분이 모두 정수이면 숫자로, 아니면 문자열로 비교하고
    /// 공통 부분이 같으면 부분 개수로 비교합니다.
    pub fn compare(&self, other: &StructuredVersion) -> Ordering {
        for (left, right) in self.parts.iter().zip(other.parts.iter()) {
            if left == right {
                continue;
            }
            let ord = match (left.parse::<u64>(), right.parse::<u64>()) {
                (Ok(l), Ok(r)) => l.cmp(&r),
                _ => left.cmp(right),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.parts.len().cmp(&other.parts.len())
    }
}

impl PartialEq for StructuredVersion {
    fn eq(&self, other: &Self) -> bool {
        let min = self.parts.len().min(other.parts.len());
        let max = self.parts.len().max(other.parts.len());
        if min == 1 && max >= 3 {
            return false;
        }
        if self.parts[..min] != other.parts[..min] {
            return false;
        }
        self.parts[min..].iter().all(|p| p == "0") && other.parts[min..].iter().all(|p| p == "0")
    }
}

impl fmt::Display for StructuredVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// 임의 텍스트에서 버전을 추출합니다.
///
/// - `"-"`는 단일 부분 `-`로 취급합니다.
/// - 여러 단계 패턴을 먼저 시도하고, `first_match_only`가 아닌데 두 번째 일치가 있으면 `None`
/// - 여러 단계 패턴이 없으면 단일 단계 패턴을 시도하고, 두 번째 일치가 있으면 `None`
/// - 끝의 `-py2`는 제거합니다.
pub fn parse_version(text: &str, first_match_only: bool) -> Option<StructuredVersion> {
    if text == "-" {
        return Some(StructuredVersion::from_parts(["-"]));
    }

    let mut version = None;
    if let Some(rx) = patterns::get(&RX_VERSION) {
        let mut matches = rx.find_iter(text);
        if let Some(first) = matches.next() {
            version = Some(first.as_str());
        }
        if !first_match_only && matches.next().is_some() {
            return None;
        }
    }

    let version = match version {
        Some(v) => v,
        None => {
            let rx = patterns::get(&RX_SINGLE_VERSION)?;
            let mut matches = rx.find_iter(text);
            let first = matches.next()?.as_str();
            if matches.next().is_some() {
                return None;
            }
            first
        }
    };

    let version = match version.strip_suffix("-py2") {
        Some(stripped) if version.len() > 4 => stripped,
        _ => version,
    };
    Some(StructuredVersion::new(version))
}

/// 두 번 이상 나타나는 버전 후보를 거부하는 기본 파싱
pub fn parse(text: &str) -> Option<StructuredVersion> {
    parse_version(text, false)
}
