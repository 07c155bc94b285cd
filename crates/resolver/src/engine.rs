//! 분석 엔진 -- 단계별로 분석기를 실행하는 오케스트레이터
//!
//! [`Engine`]은 [`AnalysisPhase::ALL`] 순서로 단계를 진행합니다. 각 단계에서
//! 컴포넌트별 분석기를 먼저 실행하고, 모든 컴포넌트가 끝난 뒤(배리어)
//! 목록 전체 분석기를 단일 스레드로 실행합니다.
//!
//! # 동시성
//!
//! 컴포넌트는 공유 `Arc` 핸들(인덱스, 데이터베이스, 억제 규칙)과 함께
//! `tokio::task::spawn_blocking` 태스크로 옮겨졌다가 원래 순서대로 돌아옵니다.
//! 동시 실행 수는 `workers`로 제한됩니다.
//!
//! # 실패 처리
//!
//! - 데이터베이스 실패는 실행 전체를 중단합니다.
//! - 그 밖의 분석기 실패는 해당 컴포넌트에서만 경고로 기록됩니다.
//! - 사용자 규칙 파일 로딩 실패는 경고 후 내장 규칙만으로 진행합니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};

use ironcheck_core::component::Component;
use ironcheck_core::config::IroncheckConfig;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::{AnalysisError, IroncheckError};
use ironcheck_core::metrics as m;
use ironcheck_core::pipeline::{
    AnalysisPhase, Analyzer, CandidateIndex, GlobalAnalyzer, Toggle, VulnerabilityDatabase,
};

use crate::bundling::DependencyBundler;
use crate::config::ResolverConfig;
use crate::cpe::CpeAnalyzer;
use crate::db::MemoryVulnerabilityDb;
use crate::error::ResolverError;
use crate::false_positive::{ArchiveDuplicateFilter, FalsePositiveFilter};
use crate::hints::{HintAnalyzer, HintRuleSet};
use crate::index::MemoryCandidateIndex;
use crate::merging::DependencyMerger;
use crate::suppression::{RuleLimits, SuppressionAnalyzer, SuppressionRule, SuppressionRuleSet};
use crate::version_filter::VersionFilter;
use crate::vulnerability::VulnerabilityLookup;

/// 분석 엔진
pub struct Engine {
    config: ResolverConfig,
    analyzers: Vec<Arc<dyn Analyzer>>,
    global_analyzers: Vec<Box<dyn GlobalAnalyzer>>,
    context: Arc<AnalysisContext>,
    suppressions: Arc<SuppressionRuleSet>,
}

impl Engine {
    /// 엔진 빌더를 생성합니다.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// 전체 설정으로 엔진을 구성합니다.
    ///
    /// 데이터 경로가 설정되어 있으면 인덱스와 데이터베이스를 로드하고,
    /// 설정된 규칙 경로에서 사용자 규칙을 추가로 로드합니다.
    ///
    /// # Errors
    ///
    /// - 설정 값이 유효하지 않은 경우
    /// - 인덱스 또는 데이터베이스 파일을 로드할 수 없는 경우
    pub async fn from_config(config: &IroncheckConfig) -> Result<Self, ResolverError> {
        let resolver_config = ResolverConfig::from_core(config);
        let mut builder = EngineBuilder::new()
            .config(resolver_config)
            .temp_root(&config.general.temp_dir);

        if !config.data.index_path.is_empty() {
            let path = PathBuf::from(&config.data.index_path);
            let index = tokio::task::spawn_blocking(move || MemoryCandidateIndex::load(&path))
                .await
                .map_err(|e| ResolverError::Task(format!("spawn_blocking failed: {e}")))??;
            builder = builder.index(Arc::new(index));
        }
        if !config.data.database_path.is_empty() {
            let path = PathBuf::from(&config.data.database_path);
            let db = tokio::task::spawn_blocking(move || MemoryVulnerabilityDb::load(&path))
                .await
                .map_err(|e| ResolverError::Task(format!("spawn_blocking failed: {e}")))??;
            builder = builder.database(Arc::new(db));
        }

        builder
            .suppression_paths(config.rules.suppression_paths.iter().map(PathBuf::from))
            .hint_paths(config.rules.hint_paths.iter().map(PathBuf::from))
            .build()
            .await
    }

    /// 실행 컨텍스트
    pub fn context(&self) -> &AnalysisContext {
        &self.context
    }

    /// 엔진 설정
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// 등록된 분석기 이름을 단계 순서대로 반환합니다.
    pub fn analyzer_names(&self) -> Vec<(AnalysisPhase, String)> {
        let mut names: Vec<(AnalysisPhase, String)> = self
            .analyzers
            .iter()
            .map(|a| (a.phase(), a.name().to_owned()))
            .chain(
                self.global_analyzers
                    .iter()
                    .map(|g| (g.phase(), g.name().to_owned())),
            )
            .collect();
        names.sort_by_key(|(phase, _)| *phase);
        names
    }

    /// 한 번도 일치하지 않은 사용자 억제 규칙
    pub fn unused_suppression_rules(&self) -> Vec<&SuppressionRule> {
        self.suppressions.unused_rules()
    }

    /// 컴포넌트 목록을 분석합니다.
    ///
    /// 결과 목록은 입력 순서를 유지하며, 병합된 컴포넌트는 살아남은 컴포넌트의
    /// `related`로 옮겨집니다.
    ///
    /// # Errors
    ///
    /// - 분석기 준비/정리 실패
    /// - 취약점 데이터베이스 실패
    /// - 워커 태스크 실패
    pub async fn analyze(
        &self,
        mut components: Vec<Component>,
    ) -> Result<Vec<Component>, IroncheckError> {
        let started = Instant::now();
        let input = components.len();
        let ctx = self.context.as_ref();
        tracing::info!(run_id = %ctx.run_id(), components = input, "analysis started");

        for component in &mut components {
            component.normalize();
        }
        for analyzer in &self.analyzers {
            analyzer.prepare(ctx)?;
        }
        for analyzer in &self.global_analyzers {
            analyzer.prepare(ctx)?;
        }

        for phase in AnalysisPhase::ALL {
            let phase_analyzers: Vec<Arc<dyn Analyzer>> = self
                .analyzers
                .iter()
                .filter(|a| a.phase() == phase)
                .cloned()
                .collect();
            if !phase_analyzers.is_empty() {
                tracing::debug!(%phase, analyzers = phase_analyzers.len(), "running phase");
                components = self.run_phase(phase_analyzers, components).await?;
            }

            for analyzer in self.global_analyzers.iter().filter(|g| g.phase() == phase) {
                tracing::debug!(%phase, analyzer = analyzer.name(), "running global analyzer");
                analyzer.process_all(&mut components, ctx)?;
            }
        }

        for analyzer in &self.analyzers {
            analyzer.close(ctx)?;
        }
        for analyzer in &self.global_analyzers {
            analyzer.close(ctx)?;
        }

        let unused = self.suppressions.report_unused();
        let elapsed = started.elapsed().as_secs_f64();
        counter!(m::COMPONENTS_ANALYZED_TOTAL).increment(input as u64);
        histogram!(m::ANALYSIS_DURATION_SECONDS).record(elapsed);
        tracing::info!(
            run_id = %ctx.run_id(),
            components = input,
            remaining = components.len(),
            unused_suppressions = unused,
            elapsed_secs = elapsed,
            "analysis completed"
        );
        Ok(components)
    }

    /// 한 단계의 컴포넌트별 분석기를 실행합니다.
    async fn run_phase(
        &self,
        analyzers: Vec<Arc<dyn Analyzer>>,
        components: Vec<Component>,
    ) -> Result<Vec<Component>, IroncheckError> {
        let analyzers = Arc::new(analyzers);
        let mut results = Vec::with_capacity(components.len());
        let mut pending = components.into_iter();

        loop {
            let batch: Vec<Component> = pending.by_ref().take(self.config.workers).collect();
            if batch.is_empty() {
                break;
            }

            let handles: Vec<_> = batch
                .into_iter()
                .map(|mut component| {
                    let analyzers = Arc::clone(&analyzers);
                    let ctx = Arc::clone(&self.context);
                    tokio::task::spawn_blocking(move || {
                        let result = process_component(&analyzers, &mut component, &ctx);
                        (component, result)
                    })
                })
                .collect();

            for handle in handles {
                let (component, result) = handle.await.map_err(|e| {
                    AnalysisError::Task(format!("component task failed: {e}"))
                })?;
                result?;
                results.push(component);
            }
        }
        Ok(results)
    }
}

/// 컴포넌트 하나에 분석기를 차례로 적용합니다.
///
/// 데이터베이스 실패만 호출자에게 전파합니다.
fn process_component(
    analyzers: &[Arc<dyn Analyzer>],
    component: &mut Component,
    ctx: &AnalysisContext,
) -> Result<(), IroncheckError> {
    for analyzer in analyzers {
        if !analyzer.accepts(component) {
            continue;
        }
        match analyzer.process(component, ctx) {
            Ok(()) => {}
            Err(e @ IroncheckError::Database(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    analyzer = analyzer.name(),
                    component = %component,
                    error = %e,
                    "analyzer failed, continuing"
                );
            }
        }
    }
    Ok(())
}

// ─── 빌더 ─────────────────────────────────────────────────────────

/// 엔진 빌더
///
/// 내장 억제/힌트 규칙은 항상 로드됩니다.
pub struct EngineBuilder {
    config: ResolverConfig,
    index: Option<Arc<dyn CandidateIndex>>,
    database: Option<Arc<dyn VulnerabilityDatabase>>,
    temp_root: Option<PathBuf>,
    suppression_paths: Vec<PathBuf>,
    hint_paths: Vec<PathBuf>,
}

impl EngineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
            index: None,
            database: None,
            temp_root: None,
            suppression_paths: Vec::new(),
            hint_paths: Vec::new(),
        }
    }

    /// 리졸버 설정을 지정합니다.
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// 후보 인덱스를 지정합니다.
    pub fn index(mut self, index: Arc<dyn CandidateIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// 취약점 데이터베이스를 지정합니다.
    pub fn database(mut self, database: Arc<dyn VulnerabilityDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// 임시 디렉토리 루트를 지정합니다. 빈 값은 시스템 기본값을 사용합니다.
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// 사용자 억제 규칙 경로를 추가합니다.
    pub fn suppression_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.suppression_paths.extend(paths);
        self
    }

    /// 사용자 힌트 규칙 경로를 추가합니다.
    pub fn hint_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.hint_paths.extend(paths);
        self
    }

    /// 엔진을 빌드합니다.
    ///
    /// 사용자 규칙 파일 로딩 실패는 경고만 남깁니다.
    ///
    /// # Errors
    ///
    /// - 설정 검증 실패
    /// - 내장 규칙이 손상된 경우
    pub async fn build(self) -> Result<Engine, ResolverError> {
        self.config.validate()?;
        let limits = RuleLimits::from_config(&self.config);
        let enabled = self.config.analyzers.clone();

        let mut suppressions = SuppressionRuleSet::with_base_rules()?;
        for path in &self.suppression_paths {
            if let Err(e) = suppressions.load_overlay(path, limits).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to load suppression rules, skipping");
            }
        }
        let suppressions = Arc::new(suppressions);

        let mut hints = HintRuleSet::with_base_rules()?;
        for path in &self.hint_paths {
            if let Err(e) = hints.load_overlay(path, limits).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to load hint rules, skipping");
            }
        }

        let mut context = AnalysisContext::new();
        if let Some(root) = self.temp_root {
            context = context.with_temp_root(root);
        }
        if let Some(index) = self.index {
            context = context.with_index(index);
        }
        if let Some(database) = self.database {
            context = context.with_database(database);
        }
        if enabled.suppression {
            context = context.with_suppressor(suppressions.clone());
        }

        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(Toggle::new(VersionFilter, enabled.version_filter)),
            Arc::new(Toggle::new(HintAnalyzer::new(hints), enabled.hints)),
            Arc::new(Toggle::new(CpeAnalyzer::new(&self.config), enabled.cpe)),
            Arc::new(Toggle::new(FalsePositiveFilter, enabled.false_positive)),
            Arc::new(Toggle::new(VulnerabilityLookup, enabled.vulnerability_lookup)),
            Arc::new(Toggle::new(SuppressionAnalyzer, enabled.suppression)),
        ];
        let global_analyzers: Vec<Box<dyn GlobalAnalyzer>> = vec![
            Box::new(Toggle::new(DependencyMerger, enabled.merging)),
            Box::new(Toggle::new(ArchiveDuplicateFilter, enabled.false_positive)),
            Box::new(Toggle::new(DependencyBundler, enabled.bundling)),
        ];

        tracing::info!(
            suppression_rules = suppressions.len(),
            analyzers = analyzers.len() + global_analyzers.len(),
            "analysis engine built"
        );

        Ok(Engine {
            config: self.config,
            analyzers,
            global_analyzers,
            context: Arc::new(context),
            suppressions,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
