//! CPE 분석기 -- 증거로 후보를 검색하고 검증된 후보의 식별자를 해석합니다.
//!
//! 신뢰도 등급을 HIGHEST부터 LOW까지 내려가며 검색어를 누적하고,
//! 식별자가 하나라도 부착된 등급에서 멈춥니다.

use std::collections::{BTreeSet, HashSet};

use metrics::counter;

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::{AnalysisError, IroncheckError};
use ironcheck_core::metrics as m;
use ironcheck_core::pipeline::{AnalysisPhase, Analyzer};
use ironcheck_core::types::{Confidence, Ecosystem, EvidenceType};

use crate::config::ResolverConfig;
use crate::identifier::IdentifierResolver;
use crate::search::{self, CandidateSearch, TermMap};
use crate::verify;

/// CPE 식별 분석기
pub struct CpeAnalyzer {
    search: CandidateSearch,
    skip_ecosystems: BTreeSet<Ecosystem>,
}

impl CpeAnalyzer {
    /// 리졸버 설정으로 분석기를 생성합니다.
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            search: CandidateSearch::new(config),
            skip_ecosystems: config.skip_ecosystems.iter().copied().collect(),
        }
    }

    fn determine_cpe(
        &self,
        component: &mut Component,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        let (Some(index), Some(database)) = (ctx.index(), ctx.database()) else {
            tracing::debug!(component = %component, "no candidate index or database, skipping cpe analysis");
            return Ok(());
        };
        let resolver =
            IdentifierResolver::new(database.as_ref(), ctx.suppressor().map(|s| s.as_ref()));

        let majors = search::major_versions(component);
        let mut vendors = TermMap::new();
        let mut products = TermMap::new();
        let mut previously_found: HashSet<(String, String)> = HashSet::new();

        for confidence in Confidence::DESCENDING {
            search::collect_terms(
                &mut vendors,
                component.evidence.evidence_at(EvidenceType::Vendor, confidence),
            );
            search::collect_terms(
                &mut products,
                component.evidence.evidence_at(EvidenceType::Product, confidence),
            );
            search::add_major_version_terms(&majors, &mut products);
            tracing::trace!(?vendors, ?products, %confidence, "search terms");

            if vendors.is_empty() || products.is_empty() {
                continue;
            }

            let candidates = match self.search.search(
                index.as_ref(),
                &vendors,
                &products,
                &component.vendor_weightings,
                &component.product_weightings,
            ) {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(component = %component, error = %e, "candidate search failed");
                    counter!(m::SEARCH_FAILURES_TOTAL).increment(1);
                    return Ok(());
                }
            };

            let mut identifier_added = false;
            for candidate in candidates {
                let key = (candidate.vendor.clone(), candidate.product.clone());
                if !previously_found.insert(key) {
                    continue;
                }
                if !verify::verify(&candidate, component, &majors) {
                    continue;
                }
                tracing::debug!(
                    vendor = %candidate.vendor,
                    product = %candidate.product,
                    score = candidate.score,
                    "identified vendor/product"
                );
                identifier_added |= resolver.resolve(
                    component,
                    &candidate.vendor,
                    &candidate.product,
                    confidence,
                )?;
            }
            if identifier_added {
                break;
            }
        }
        Ok(())
    }
}

impl Analyzer for CpeAnalyzer {
    fn name(&self) -> &str {
        "cpe"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::IdentifierAnalysis
    }

    fn accepts(&self, component: &Component) -> bool {
        component
            .ecosystem
            .is_none_or(|e| !self.skip_ecosystems.contains(&e))
    }

    fn prepare(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        if ctx.index().is_none() || ctx.database().is_none() {
            tracing::warn!("cpe analyzer enabled without candidate index or vulnerability database");
        }
        Ok(())
    }

    fn process(
        &self,
        component: &mut Component,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        self.determine_cpe(component, ctx).map_err(|e| match e {
            IroncheckError::Database(_) => e,
            other => IroncheckError::Analysis(AnalysisError::Process {
                analyzer: self.name().to_owned(),
                component: component.file_path.clone(),
                reason: other.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ironcheck_core::error::IndexError;
    use ironcheck_core::pipeline::CandidateIndex;
    use ironcheck_core::types::{CandidateEntry, CandidateQuery};

    use crate::db::MemoryVulnerabilityDb;
    use crate::index::MemoryCandidateIndex;

    fn context() -> AnalysisContext {
        let index = MemoryCandidateIndex::from_json(
            r#"[
                {"vendor": "apache", "product": "struts"},
                {"vendor": "apache", "product": "tomcat"}
            ]"#,
        )
        .unwrap();
        let db = MemoryVulnerabilityDb::from_json(
            r#"{"software": [
                {"vendor": "apache", "product": "struts", "version": "2.3.20"},
                {"vendor": "apache", "product": "tomcat", "version": "8.0"}
            ]}"#,
        )
        .unwrap();
        AnalysisContext::new()
            .with_index(Arc::new(index))
            .with_database(Arc::new(db))
    }

    fn struts() -> Component {
        let mut c = Component::new("/app/WEB-INF/lib/struts2-core-2.3.20.jar");
        c.ecosystem = Some(Ecosystem::Java);
        let ev = &mut c.evidence;
        ev.add_evidence(EvidenceType::Vendor, "pom", "groupid", "org.apache.struts", Confidence::Highest);
        ev.add_evidence(EvidenceType::Product, "pom", "artifactid", "struts2-core", Confidence::Highest);
        ev.add_evidence(EvidenceType::Product, "pom", "name", "Struts Core", Confidence::High);
        ev.add_evidence(EvidenceType::Version, "pom", "version", "2.3.20", Confidence::Highest);
        c
    }

    #[test]
    fn identifies_struts_exact_match() {
        let ctx = context();
        let analyzer = CpeAnalyzer::new(&ResolverConfig::default());
        let mut component = struts();
        analyzer.process(&mut component, &ctx).unwrap();

        let values: Vec<_> = component
            .vulnerable_software_identifiers
            .iter()
            .map(|i| i.value.as_str())
            .collect();
        assert_eq!(values, ["cpe:/a:apache:struts:2.3.20"]);
    }

    #[test]
    fn skipped_ecosystem_is_not_accepted() {
        let config = ResolverConfig {
            skip_ecosystems: vec![Ecosystem::Java],
            ..Default::default()
        };
        let analyzer = CpeAnalyzer::new(&config);
        assert!(!analyzer.accepts(&struts()));
        assert!(analyzer.accepts(&Component::new("/lib/unknown.bin")));
    }

    #[test]
    fn missing_collaborators_is_noop() {
        let analyzer = CpeAnalyzer::new(&ResolverConfig::default());
        let mut component = struts();
        analyzer.process(&mut component, &AnalysisContext::new()).unwrap();
        assert!(component.vulnerable_software_identifiers.is_empty());
    }

    #[test]
    fn index_failure_degrades_only_this_component() {
        struct Broken;
        impl CandidateIndex for Broken {
            fn search(&self, _: &CandidateQuery, _: usize) -> Result<Vec<CandidateEntry>, IndexError> {
                Err(IndexError::Corrupt("segment missing".to_owned()))
            }
        }
        let ctx = AnalysisContext::new()
            .with_index(Arc::new(Broken))
            .with_database(Arc::new(MemoryVulnerabilityDb::empty()));
        let analyzer = CpeAnalyzer::new(&ResolverConfig::default());
        let mut component = struts();
        assert!(analyzer.process(&mut component, &ctx).is_ok());
        assert!(component.vulnerable_software_identifiers.is_empty());
    }

    #[test]
    fn database_failure_surfaces() {
        use ironcheck_core::error::DatabaseError;
        use ironcheck_core::identifier::Cpe;
        use ironcheck_core::pipeline::VulnerabilityDatabase;
        use ironcheck_core::types::{Vulnerability, VulnerableSoftwareRecord};

        struct Down;
        impl VulnerabilityDatabase for Down {
            fn records_for(&self, _: &str, _: &str) -> Result<Vec<VulnerableSoftwareRecord>, DatabaseError> {
                Err(DatabaseError::Connection("refused".to_owned()))
            }
            fn vulnerabilities_for(&self, _: &Cpe) -> Result<Vec<Vulnerability>, DatabaseError> {
                Err(DatabaseError::Connection("refused".to_owned()))
            }
        }
        let index = MemoryCandidateIndex::from_json(r#"[{"vendor": "apache", "product": "struts"}]"#)
            .unwrap();
        let ctx = AnalysisContext::new()
            .with_index(Arc::new(index))
            .with_database(Arc::new(Down));
        let analyzer = CpeAnalyzer::new(&ResolverConfig::default());
        let mut component = struts();
        let err = analyzer.process(&mut component, &ctx).unwrap_err();
        assert!(matches!(err, IroncheckError::Database(_)));
    }
}
