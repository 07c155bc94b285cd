//! 취약점 데이터베이스 -- 로컬 JSON 파일 로딩 및 조회
//!
//! [`MemoryVulnerabilityDb`]는 [`VulnerabilityDatabase`]의 기본 구현입니다.
//!
//! # JSON 형식
//!
//! ```json
//! {
//!   "software": [
//!     { "vendor": "apache", "product": "struts", "version": "2.3.20", "ecosystem": "java" }
//!   ],
//!   "vulnerabilities": [
//!     {
//!       "name": "CVE-2017-5638",
//!       "severity": "Critical",
//!       "cvss_score": 10.0,
//!       "cwes": ["CWE-20"],
//!       "affects": ["cpe:/a:apache:struts:2.3.20"]
//!     }
//!   ]
//! }
//! ```
//!
//! `affects`의 CPE는 `software`에 없어도 버전 레코드로 등록됩니다.
//! 버전이 없는 CPE는 모든 버전에 영향을 줍니다.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use ironcheck_core::error::DatabaseError;
use ironcheck_core::identifier::Cpe;
use ironcheck_core::pipeline::VulnerabilityDatabase;
use ironcheck_core::types::{Vulnerability, VulnerableSoftwareRecord};

use crate::error::ResolverError;

/// 데이터베이스 파일 최대 크기 (50 MB)
const MAX_DB_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 소프트웨어 레코드와 취약점을 합친 최대 엔트리 수
const MAX_DB_ENTRIES: usize = 1_000_000;

/// 취약점 엔트리
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityEntry {
    /// 취약점 정보
    #[serde(flatten)]
    pub vulnerability: Vulnerability,
    /// 영향받는 CPE 목록
    #[serde(default)]
    pub affects: Vec<String>,
}

/// 데이터베이스 파일 내용
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseFile {
    /// 취약 소프트웨어 버전 레코드
    pub software: Vec<VulnerableSoftwareRecord>,
    /// 취약점 목록
    pub vulnerabilities: Vec<VulnerabilityEntry>,
}

type ProductKey = (String, String);

/// 메모리 취약점 데이터베이스
///
/// `(vendor, product)` 쌍으로 인덱싱된 HashMap으로 조회합니다.
#[derive(Default)]
pub struct MemoryVulnerabilityDb {
    records: HashMap<ProductKey, BTreeSet<VulnerableSoftwareRecord>>,
    affected: HashMap<ProductKey, Vec<(Cpe, Vulnerability)>>,
}

fn key(vendor: &str, product: &str) -> ProductKey {
    (vendor.to_owned(), product.to_owned())
}

/// 영향 CPE가 조회 CPE를 포함하는지 확인합니다.
///
/// 버전이 없으면 모든 버전, 업데이트가 없으면 모든 업데이트에 해당합니다.
fn affects(affected: &Cpe, cpe: &Cpe) -> bool {
    if !affected.same_product(cpe) {
        return false;
    }
    let version_ok = match (&affected.version, &cpe.version) {
        (None, _) => true,
        (Some(a), Some(c)) => a == c,
        (Some(_), None) => false,
    };
    let update_ok = match (&affected.update, &cpe.update) {
        (None, _) => true,
        (Some(a), Some(c)) => a == c,
        (Some(_), None) => false,
    };
    version_ok && update_ok
}

impl MemoryVulnerabilityDb {
    /// 빈 데이터베이스를 생성합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 파일 내용으로 데이터베이스를 구축합니다.
    ///
    /// 파싱할 수 없는 `affects` CPE는 경고 후 건너뜁니다.
    pub fn from_file_contents(file: DatabaseFile) -> Self {
        let mut db = Self::default();
        for record in file.software {
            db.records
                .entry(key(&record.vendor, &record.product))
                .or_default()
                .insert(record);
        }
        for entry in file.vulnerabilities {
            for value in &entry.affects {
                let Some(cpe) = Cpe::parse(value) else {
                    tracing::warn!(
                        vulnerability = %entry.vulnerability.name,
                        cpe = %value,
                        "skipping unparseable affected cpe"
                    );
                    continue;
                };
                let product_key = key(&cpe.vendor, &cpe.product);
                db.records
                    .entry(product_key.clone())
                    .or_default()
                    .insert(VulnerableSoftwareRecord {
                        vendor: cpe.vendor.clone(),
                        product: cpe.product.clone(),
                        version: cpe.version.clone(),
                        update: cpe.update.clone(),
                        ecosystem: None,
                    });
                db.affected
                    .entry(product_key)
                    .or_default()
                    .push((cpe, entry.vulnerability.clone()));
            }
        }
        db
    }

    /// JSON 문자열에서 데이터베이스를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, ResolverError> {
        let file: DatabaseFile =
            serde_json::from_str(json).map_err(|e| ResolverError::DatabaseLoad {
                path: "<inline>".to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_file_contents(file))
    }

    /// JSON 파일에서 데이터베이스를 로드합니다.
    ///
    /// # 보안 제한
    ///
    /// - 파일 최대 50MB (`MAX_DB_FILE_SIZE`)
    /// - 레코드와 취약점 합계 최대 1,000,000개 (`MAX_DB_ENTRIES`)
    ///
    /// # Note
    ///
    /// 이 함수는 동기 I/O를 수행합니다. async 컨텍스트에서 호출할 때는
    /// `tokio::task::spawn_blocking`으로 감싸세요.
    pub fn load(path: &Path) -> Result<Self, ResolverError> {
        let metadata = std::fs::metadata(path).map_err(|e| ResolverError::DatabaseLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let file_size = metadata.len();
        if file_size > MAX_DB_FILE_SIZE {
            return Err(ResolverError::DatabaseLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file size {} bytes exceeds maximum {} bytes",
                    file_size, MAX_DB_FILE_SIZE
                ),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ResolverError::DatabaseLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut file: DatabaseFile =
            serde_json::from_str(&content).map_err(|e| ResolverError::DatabaseLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let total = file.software.len() + file.vulnerabilities.len();
        if total > MAX_DB_ENTRIES {
            tracing::warn!(
                path = %path.display(),
                entries = total,
                max = MAX_DB_ENTRIES,
                "vulnerability database entry limit reached, truncating"
            );
            file.software.truncate(MAX_DB_ENTRIES);
            let remaining = MAX_DB_ENTRIES - file.software.len();
            file.vulnerabilities.truncate(remaining);
        }

        let db = Self::from_file_contents(file);
        tracing::info!(
            path = %path.display(),
            products = db.records.len(),
            "vulnerability database loaded"
        );
        Ok(db)
    }

    /// 등록된 `(vendor, product)` 쌍 수
    pub fn product_count(&self) -> usize {
        self.records.len()
    }
}

impl VulnerabilityDatabase for MemoryVulnerabilityDb {
    fn records_for(
        &self,
        vendor: &str,
        product: &str,
    ) -> Result<Vec<VulnerableSoftwareRecord>, DatabaseError> {
        Ok(self
            .records
            .get(&key(vendor, product))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn vulnerabilities_for(&self, cpe: &Cpe) -> Result<Vec<Vulnerability>, DatabaseError> {
        let Some(entries) = self.affected.get(&key(&cpe.vendor, &cpe.product)) else {
            return Ok(Vec::new());
        };
        let found: BTreeSet<Vulnerability> = entries
            .iter()
            .filter(|(affected, _)| affects(affected, cpe))
            .map(|(_, v)| v.clone())
            .collect();
        Ok(found.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironcheck_core::types::{Ecosystem, Severity};
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "software": [
            { "vendor": "apache", "product": "struts", "version": "2.3.20", "ecosystem": "java" }
        ],
        "vulnerabilities": [
            {
                "name": "CVE-2017-5638",
                "severity": "Critical",
                "cvss_score": 10.0,
                "affects": ["cpe:/a:apache:struts:2.3.20", "cpe:/a:apache:struts:2.5.10"]
            },
            {
                "name": "CVE-2099-0001",
                "affects": ["cpe:/a:example:libx"]
            },
            {
                "name": "CVE-2099-0002",
                "affects": ["not-a-cpe"]
            }
        ]
    }"#;

    #[test]
    fn records_include_affected_versions() {
        let db = MemoryVulnerabilityDb::from_json(SAMPLE).unwrap();
        let records = db.records_for("apache", "struts").unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().any(|r| r.ecosystem == Some(Ecosystem::Java)));
        assert!(db.records_for("apache", "tomcat").unwrap().is_empty());
    }

    #[test]
    fn versionless_record_is_broad() {
        let db = MemoryVulnerabilityDb::from_json(SAMPLE).unwrap();
        let records = db.records_for("example", "libx").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_versionless());
    }

    #[test]
    fn vulnerabilities_match_version() {
        let db = MemoryVulnerabilityDb::from_json(SAMPLE).unwrap();
        let hit = Cpe::application("apache", "struts", Some("2.3.20".to_owned()), None);
        let vulns = db.vulnerabilities_for(&hit).unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].severity, Severity::Critical);

        let miss = Cpe::application("apache", "struts", Some("2.5.26".to_owned()), None);
        assert!(db.vulnerabilities_for(&miss).unwrap().is_empty());

        let any = Cpe::application("example", "libx", Some("0.1".to_owned()), None);
        assert_eq!(db.vulnerabilities_for(&any).unwrap().len(), 1);
    }

    #[test]
    fn affected_update_must_match() {
        let affected = Cpe::parse("cpe:/a:oracle:jdk:1.8.0:update_101").unwrap();
        let same = Cpe::parse("cpe:/a:oracle:jdk:1.8.0:update_101").unwrap();
        let other = Cpe::parse("cpe:/a:oracle:jdk:1.8.0:update_102").unwrap();
        assert!(affects(&affected, &same));
        assert!(!affects(&affected, &other));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();
        let db = MemoryVulnerabilityDb::load(file.path()).unwrap();
        assert_eq!(db.product_count(), 2);
    }

    #[test]
    fn load_invalid_json_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ broken").unwrap();
        assert!(matches!(
            MemoryVulnerabilityDb::load(file.path()),
            Err(ResolverError::DatabaseLoad { .. })
        ));
    }
}
