//! 취약점 조회 -- CPE 식별자마다 데이터베이스의 취약점을 부착합니다.

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::pipeline::{AnalysisPhase, Analyzer};

/// 취약점 조회 분석기
///
/// 식별자가 없는 컴포넌트는 취약점 없이 보고됩니다.
pub struct VulnerabilityLookup;

impl Analyzer for VulnerabilityLookup {
    fn name(&self) -> &str {
        "vulnerability_lookup"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::FindingAnalysis
    }

    fn accepts(&self, component: &Component) -> bool {
        !component.vulnerable_software_identifiers.is_empty()
    }

    fn process(
        &self,
        component: &mut Component,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        let Some(database) = ctx.database() else {
            return Ok(());
        };

        let cpes: Vec<_> = component.cpes().map(|(_, cpe)| cpe).collect();
        let mut added = 0usize;
        for cpe in cpes {
            for vulnerability in database.vulnerabilities_for(&cpe)? {
                if component.add_vulnerability(vulnerability) {
                    added += 1;
                }
            }
        }
        if added > 0 {
            tracing::debug!(component = %component, count = added, "attached vulnerabilities");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ironcheck_core::identifier::{Cpe, Identifier};
    use ironcheck_core::types::Confidence;

    use crate::db::MemoryVulnerabilityDb;

    const DB: &str = r#"{
        "vulnerabilities": [
            {"name": "CVE-2017-5638", "cvss_score": 10.0, "affects": ["cpe:/a:apache:struts:2.3.20"]},
            {"name": "CVE-2099-0001", "cvss_score": 5.0, "affects": ["cpe:/a:apache:tomcat"]}
        ]
    }"#;

    fn component() -> Component {
        let mut c = Component::new("/lib/struts2-core-2.3.20.jar");
        let cpe = Cpe::application("apache", "struts", Some("2.3.20".to_owned()), None);
        c.add_vulnerable_software_identifier(Identifier::cpe(&cpe, Confidence::Highest, None));
        c
    }

    #[test]
    fn attaches_vulnerabilities_for_each_cpe() {
        let db = MemoryVulnerabilityDb::from_json(DB).unwrap();
        let ctx = AnalysisContext::new().with_database(Arc::new(db));
        let mut c = component();
        VulnerabilityLookup.process(&mut c, &ctx).unwrap();
        let names: Vec<_> = c.vulnerabilities.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["CVE-2017-5638"]);
    }

    #[test]
    fn component_without_identifiers_is_skipped() {
        let c = Component::new("/lib/unknown.jar");
        assert!(!VulnerabilityLookup.accepts(&c));
    }
}
