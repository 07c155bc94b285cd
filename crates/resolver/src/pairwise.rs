//! 쌍 비교 병합 -- 컴포넌트 목록을 한 번 훑으며 중복을 흡수합니다.
//!
//! 각 컴포넌트를 뒤따르는 모든 컴포넌트와 비교하고, 규칙이 병합을 결정하면
//! 흡수되는 쪽을 제거 표시합니다. 제거 표시된 컴포넌트는 양쪽 모두에서
//! 건너뜁니다. 바깥 컴포넌트가 뒤쪽에 흡수되면 다음 바깥 컴포넌트로 넘어갑니다.

use metrics::counter;

use ironcheck_core::component::Component;
use ironcheck_core::metrics as m;

/// 병합에서 살아남는 쪽
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survivor {
    /// 앞쪽(바깥 반복) 컴포넌트
    First,
    /// 뒤쪽(안쪽 반복) 컴포넌트
    Second,
}

/// 병합 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePlan {
    /// 살아남는 쪽
    pub survivor: Survivor,
    /// 식별자와 취약점 복사 여부
    pub copy_findings: bool,
    /// 증거와 모든 프로젝트 참조 복사 여부
    pub copy_evidence: bool,
    /// 흡수된 컴포넌트를 관련 목록에 남기지 않음
    pub detach: bool,
}

impl MergePlan {
    /// 관련 목록에만 추가하는 기본 병합
    pub fn keep(survivor: Survivor) -> Self {
        Self {
            survivor,
            copy_findings: false,
            copy_evidence: false,
            detach: false,
        }
    }

    /// `first_wins`가 참이면 앞쪽이 살아남습니다.
    pub fn keep_first_if(first_wins: bool) -> Self {
        Self::keep(if first_wins {
            Survivor::First
        } else {
            Survivor::Second
        })
    }
}

/// SHA-1이 같은지 확인합니다 (대소문자 무시).
pub fn sha1_equal(a: &Component, b: &Component) -> bool {
    match (&a.sha1, &b.sha1) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

/// `absorbed`를 `survivor`에 병합합니다.
///
/// 흡수된 컴포넌트의 관련 목록은 평탄화되어 옮겨지고, SHA-1이 같으면
/// 프로젝트 참조를 복사합니다.
pub fn merge_into(survivor: &mut Component, mut absorbed: Component, plan: &MergePlan) {
    if plan.copy_evidence {
        survivor.evidence.extend_from(&absorbed.evidence);
    }
    if plan.copy_findings {
        survivor
            .software_identifiers
            .extend(absorbed.software_identifiers.iter().cloned());
        survivor
            .vulnerable_software_identifiers
            .extend(absorbed.vulnerable_software_identifiers.iter().cloned());
        survivor
            .vulnerabilities
            .extend(absorbed.vulnerabilities.iter().cloned());
    }
    if plan.copy_evidence || sha1_equal(survivor, &absorbed) {
        survivor
            .project_references
            .extend(std::mem::take(&mut absorbed.project_references));
    }

    if plan.detach {
        let nested = std::mem::take(&mut absorbed.related);
        for child in nested {
            survivor.add_related(child);
        }
    } else {
        survivor.add_related(absorbed);
    }
}

/// 목록 전체에 쌍 비교 병합을 수행하고 흡수된 컴포넌트 수를 반환합니다.
///
/// 결과 목록은 원래 순서를 유지합니다.
pub fn merge_pairwise<F>(components: &mut Vec<Component>, analyzer: &'static str, mut evaluate: F) -> usize
where
    F: FnMut(&Component, &Component) -> Option<MergePlan>,
{
    let n = components.len();
    let mut removed = vec![false; n];

    for i in 0..n {
        if removed[i] {
            continue;
        }
        for j in (i + 1)..n {
            if removed[j] {
                continue;
            }
            let Some(plan) = evaluate(&components[i], &components[j]) else {
                continue;
            };
            let (keep, drop) = match plan.survivor {
                Survivor::First => (i, j),
                Survivor::Second => (j, i),
            };
            let absorbed = std::mem::take(&mut components[drop]);
            tracing::debug!(
                analyzer,
                survivor = %components[keep],
                absorbed = %absorbed,
                "merged duplicate component"
            );
            merge_into(&mut components[keep], absorbed, &plan);
            removed[drop] = true;
            if drop == i {
                break;
            }
        }
    }

    let merged = removed.iter().filter(|r| **r).count();
    if merged > 0 {
        let mut flags = removed.into_iter();
        components.retain(|_| !flags.next().unwrap_or(false));
        counter!(m::COMPONENTS_MERGED_TOTAL, m::LABEL_ANALYZER => analyzer)
            .increment(merged as u64);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(path: &str, sha1: &str) -> Component {
        let mut c = Component::new(path);
        c.sha1 = Some(sha1.to_owned());
        c.project_references.insert(path.to_owned());
        c
    }

    #[test]
    fn merge_flattens_related_and_copies_references() {
        let mut survivor = named("/a/x.jar", "aa");
        let mut absorbed = named("/b/x.jar", "AA");
        absorbed.add_related(named("/c/x.jar", "aa"));

        merge_into(&mut survivor, absorbed, &MergePlan::keep(Survivor::First));
        let paths: Vec<_> = survivor.related.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(paths, ["/b/x.jar", "/c/x.jar"]);
        assert!(survivor.related.iter().all(|r| r.related.is_empty()));
        assert_eq!(survivor.project_references.len(), 2);
    }

    #[test]
    fn detach_drops_absorbed_from_related() {
        let mut survivor = named("/a/x.jar", "aa");
        let absorbed = named("/a/pom.xml", "bb");
        let plan = MergePlan {
            detach: true,
            ..MergePlan::keep(Survivor::First)
        };
        merge_into(&mut survivor, absorbed, &plan);
        assert!(survivor.related.is_empty());
        assert_eq!(survivor.project_references.len(), 1);
    }

    #[test]
    fn merging_into_second_skips_to_next_outer() {
        let mut list = vec![
            named("/z/long/a.jar", "1"),
            named("/a.jar", "1"),
            named("/other.jar", "2"),
        ];
        let mut calls = Vec::new();
        let merged = merge_pairwise(&mut list, "test", |a, b| {
            calls.push((a.file_path.clone(), b.file_path.clone()));
            sha1_equal(a, b).then(|| MergePlan::keep_first_if(a.file_path.len() < b.file_path.len()))
        });
        assert_eq!(merged, 1);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].file_path, "/a.jar");
        assert_eq!(list[0].related.len(), 1);
        // 첫 번째가 흡수된 뒤에는 세 번째와 비교하지 않는다
        assert!(!calls.contains(&("/z/long/a.jar".to_owned(), "/other.jar".to_owned())));
    }
}
