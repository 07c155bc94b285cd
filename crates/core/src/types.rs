//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 신뢰도, 생태계, 취약점, 취약 소프트웨어 레코드 등
//! 모든 분석 단계가 공유하는 데이터 구조를 정의합니다.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 증거 신뢰도
///
/// `Ord` 구현은 `Low < Medium < High < Highest` 순서입니다.
/// 식별 로직은 항상 [`Confidence::DESCENDING`] 순서(가장 높은 단계부터)로 순회합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// 낮은 신뢰도
    #[default]
    Low,
    /// 중간 신뢰도
    Medium,
    /// 높은 신뢰도
    High,
    /// 가장 높은 신뢰도
    Highest,
}

impl Confidence {
    /// 가장 높은 단계부터 가장 낮은 단계까지의 순회 순서
    pub const DESCENDING: [Confidence; 4] = [
        Confidence::Highest,
        Confidence::High,
        Confidence::Medium,
        Confidence::Low,
    ];

    /// 문자열에서 신뢰도를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "highest" => Some(Self::Highest),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Highest => write!(f, "HIGHEST"),
        }
    }
}

/// 증거 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    /// 벤더 정보
    Vendor,
    /// 제품 정보
    Product,
    /// 버전 정보
    Version,
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vendor => write!(f, "vendor"),
            Self::Product => write!(f, "product"),
            Self::Version => write!(f, "version"),
        }
    }
}

/// 패키지 생태계
///
/// 컴포넌트가 속한 패키징/언어 계열을 나타냅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Java (jar, war, ear, pom.xml)
    Java,
    /// JavaScript (package.json, package-lock.json)
    Npm,
    /// .NET (nuspec, dll, exe)
    Dotnet,
    /// Ruby (gemspec, Gemfile.lock)
    Ruby,
    /// iOS/Swift (podspec, Package.swift)
    Ios,
    /// 네이티브 라이브러리 (C/C++)
    Native,
    /// Go (go.mod)
    Golang,
    /// Python (setup.py, requirements.txt)
    Python,
    /// PHP (composer.lock)
    Php,
    /// Dart (pubspec)
    Dart,
    /// Rust (Cargo.lock)
    Cargo,
}

impl Ecosystem {
    /// 문자열에서 생태계를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "java" | "maven" | "jar" => Some(Self::Java),
            "npm" | "node" | "nodejs" | "js" | "javascript" => Some(Self::Npm),
            "dotnet" | ".net" | "nuget" => Some(Self::Dotnet),
            "ruby" | "gem" | "rubygems" => Some(Self::Ruby),
            "ios" | "swift" | "cocoapods" => Some(Self::Ios),
            "native" | "c" | "cpp" => Some(Self::Native),
            "go" | "golang" => Some(Self::Golang),
            "python" | "pypi" | "pip" => Some(Self::Python),
            "php" | "composer" => Some(Self::Php),
            "dart" | "pub" => Some(Self::Dart),
            "cargo" | "rust" | "crates" => Some(Self::Cargo),
            _ => None,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Java => "java",
            Self::Npm => "npm",
            Self::Dotnet => "dotnet",
            Self::Ruby => "ruby",
            Self::Ios => "ios",
            Self::Native => "native",
            Self::Golang => "golang",
            Self::Python => "python",
            Self::Php => "php",
            Self::Dart => "dart",
            Self::Cargo => "cargo",
        };
        write!(f, "{name}")
    }
}

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 정보성
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" | "none" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }

    /// CVSS 기본 점수에서 심각도를 도출합니다 (CVSS v3 구간).
    pub fn from_cvss(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::Info
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 알려진 취약점
///
/// 동일성과 정렬은 이름(CVE ID) 기준입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    /// 취약점 이름 (예: CVE-2024-1234)
    pub name: String,
    /// 취약점 설명
    #[serde(default)]
    pub description: String,
    /// 심각도
    #[serde(default)]
    pub severity: Severity,
    /// CVSS 기본 점수
    #[serde(default)]
    pub cvss_score: Option<f64>,
    /// 관련 CWE 목록 (예: "CWE-79")
    #[serde(default)]
    pub cwes: Vec<String>,
    /// 억제 규칙이 남긴 메모
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PartialEq for Vulnerability {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Vulnerability {}

impl PartialOrd for Vulnerability {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Vulnerability {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cvss_score {
            Some(score) => write!(f, "{} [{}] cvss={score:.1}", self.name, self.severity),
            None => write!(f, "{} [{}]", self.name, self.severity),
        }
    }
}

/// 취약 소프트웨어 레코드
///
/// 취약점 데이터베이스가 (vendor, product) 쌍에 대해 반환하는 단위입니다.
/// `version`이 없으면 해당 제품의 모든 버전이 영향을 받습니다 (broad match).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VulnerableSoftwareRecord {
    /// 벤더
    pub vendor: String,
    /// 제품
    pub product: String,
    /// 버전 (없으면 전체 버전)
    #[serde(default)]
    pub version: Option<String>,
    /// 업데이트/패치 한정자
    #[serde(default)]
    pub update: Option<String>,
    /// 레코드가 한정된 생태계
    #[serde(default)]
    pub ecosystem: Option<Ecosystem>,
}

impl VulnerableSoftwareRecord {
    /// 버전이 지정되지 않은 레코드인지 확인합니다.
    ///
    /// `*`, `-`, 빈 문자열은 버전 없음으로 취급합니다.
    pub fn is_versionless(&self) -> bool {
        match self.version.as_deref() {
            None => true,
            Some(v) => v.is_empty() || v == "*",
        }
    }
}

impl fmt::Display for VulnerableSoftwareRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.vendor,
            self.product,
            self.version.as_deref().unwrap_or("*")
        )?;
        if let Some(update) = &self.update {
            write!(f, ":{update}")?;
        }
        Ok(())
    }
}

/// 후보 검색 결과 항목
///
/// 분석 패스 동안만 유지되는 일시적인 값입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// 인덱스 문서의 벤더
    pub vendor: String,
    /// 인덱스 문서의 제품
    pub product: String,
    /// 검색 점수 (0.0 ~ 1.0)
    pub score: f32,
}

/// 검색 질의의 가중치 부여 단어
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    /// 단어 (공백 없는 토큰)
    pub text: String,
    /// 가중치
    pub boost: f32,
}

/// 후보 인덱스 질의
///
/// 두 필드는 AND 결합됩니다. 각 필드에서 하나 이상의 단어가 일치해야 합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateQuery {
    /// 벤더 필드 단어
    pub vendor: Vec<QueryTerm>,
    /// 제품 필드 단어
    pub product: Vec<QueryTerm>,
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |terms: &[QueryTerm]| {
            terms
                .iter()
                .map(|t| {
                    if (t.boost - 1.0).abs() < f32::EPSILON {
                        t.text.clone()
                    } else {
                        format!("{}^{}", t.text, t.boost)
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        };
        write!(
            f,
            "product:({}) AND vendor:({})",
            render(&self.product),
            render(&self.vendor)
        )
    }
}
