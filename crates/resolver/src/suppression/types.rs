//! 억제 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체들을 정의합니다.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::patterns;

/// 문자열 매칭 조건
///
/// YAML에서는 문자열 하나(대소문자 무시 완전 일치) 또는 맵으로 작성합니다.
///
/// ```yaml
/// file_path: "/app/lib/struts2-core-2.3.20.jar"
/// gav:
///   value: "^org\\.apache\\.struts:.*$"
///   regex: true
///   case_sensitive: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PropertyRepr")]
pub struct PropertyType {
    /// 비교 값 또는 정규식
    pub value: String,
    /// 정규식 여부 (전체 일치)
    pub regex: bool,
    /// 대소문자 구분 여부
    pub case_sensitive: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyRepr {
    Plain(String),
    Full {
        value: String,
        #[serde(default)]
        regex: bool,
        #[serde(default)]
        case_sensitive: bool,
    },
}

impl From<PropertyRepr> for PropertyType {
    fn from(repr: PropertyRepr) -> Self {
        match repr {
            PropertyRepr::Plain(value) => Self {
                value,
                regex: false,
                case_sensitive: false,
            },
            PropertyRepr::Full {
                value,
                regex,
                case_sensitive,
            } => Self {
                value,
                regex,
                case_sensitive,
            },
        }
    }
}

impl PropertyType {
    /// 대소문자를 무시하는 완전 일치 조건
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            regex: false,
            case_sensitive: false,
        }
    }

    /// 정규식 조건
    pub fn regex(value: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            value: value.into(),
            regex: true,
            case_sensitive,
        }
    }

    /// 정규식 조건이면 컴파일합니다.
    pub fn compile(&self) -> Result<Option<Regex>, ResolverError> {
        if !self.regex {
            return Ok(None);
        }
        patterns::compile_anchored(&self.value, !self.case_sensitive)
            .map(Some)
            .map_err(|e| ResolverError::Pattern {
                pattern: self.value.clone(),
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)?;
        if self.regex {
            write!(f, " (regex)")?;
        }
        Ok(())
    }
}

/// 억제 규칙 -- 하나의 알려진 오탐을 기술합니다.
///
/// 선택 조건(`file_path`, `sha1`, `gav`, `package_url`)은 모두 AND로 결합되며,
/// 조건을 통과한 컴포넌트에서 억제 대상(`cpe`, `cve`, `cwe`,
/// `vulnerability_name`, `cvss_below`)에 해당하는 항목을 제거합니다.
///
/// # YAML 스키마
/// ```yaml
/// suppressions:
///   - notes: "log4j-api is not affected by the JNDI lookup flaw"
///     gav:
///       value: "^org\\.apache\\.logging\\.log4j:log4j-api:.*$"
///       regex: true
///     cpe:
///       - "cpe:/a:apache:log4j"
///     until: 2027-01-01
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionRule {
    /// 규칙 메모 (억제된 항목에 기록)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// 내장 규칙 여부 (억제 내역과 미사용 보고에서 제외)
    pub base: bool,
    /// 이 날짜 이후 규칙 만료
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,

    /// 표시 경로 조건
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PropertyType>,
    /// SHA-1 조건 (대소문자 무시)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    /// GAV 조건
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gav: Option<PropertyType>,
    /// 패키지 URL 조건
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_url: Option<PropertyType>,

    /// 억제할 CPE (정규식 전체 일치 또는 접두 일치)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpe: Vec<PropertyType>,
    /// 억제할 CVE 이름
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cve: Vec<String>,
    /// 억제할 CWE 번호 (`79` → `CWE-79`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cwe: Vec<String>,
    /// 억제할 취약점 이름 조건
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vulnerability_name: Vec<PropertyType>,
    /// 이 점수 미만의 CVSS 취약점 억제
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cvss_below: Vec<f64>,
}

impl SuppressionRule {
    /// 취약점 억제 조건이 있는지 확인합니다.
    pub fn has_vulnerability_targets(&self) -> bool {
        !self.cve.is_empty()
            || !self.cwe.is_empty()
            || !self.vulnerability_name.is_empty()
            || !self.cvss_below.is_empty()
    }

    /// 만료 여부
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.until.is_some_and(|until| until < today)
    }

    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.cpe.is_empty() && !self.has_vulnerability_targets() {
            return Err(ResolverError::RuleParse {
                source_name: self.to_string(),
                reason: "rule must name at least one cpe, cve, cwe, vulnerability_name or cvss_below"
                    .to_owned(),
            });
        }
        if self.gav.is_some() && self.package_url.is_some() {
            return Err(ResolverError::RuleParse {
                source_name: self.to_string(),
                reason: "gav and package_url are mutually exclusive".to_owned(),
            });
        }
        if let Some(score) = self
            .cvss_below
            .iter()
            .find(|s| !s.is_finite() || **s < 0.0 || **s > 10.0)
        {
            return Err(ResolverError::RuleParse {
                source_name: self.to_string(),
                reason: format!("cvss_below {score} must be 0.0-10.0"),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for SuppressionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(p) = &self.file_path {
            parts.push(format!("file_path={p}"));
        }
        if let Some(s) = &self.sha1 {
            parts.push(format!("sha1={s}"));
        }
        if let Some(p) = &self.gav {
            parts.push(format!("gav={p}"));
        }
        if let Some(p) = &self.package_url {
            parts.push(format!("package_url={p}"));
        }
        for p in &self.cpe {
            parts.push(format!("cpe={p}"));
        }
        for c in &self.cve {
            parts.push(format!("cve={c}"));
        }
        for c in &self.cwe {
            parts.push(format!("cwe={c}"));
        }
        for p in &self.vulnerability_name {
            parts.push(format!("vulnerability_name={p}"));
        }
        for s in &self.cvss_below {
            parts.push(format!("cvss_below={s}"));
        }
        write!(f, "SuppressionRule{{{}}}", parts.join(", "))
    }
}

/// 억제 규칙 파일
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionFile {
    /// 규칙 목록
    pub suppressions: Vec<SuppressionRule>,
}
