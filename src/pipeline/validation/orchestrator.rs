use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::aggregate::{aggregate, summarize_batch, SegmentCounts};
use super::rubric::{recheck_all, Rubric};
use super::DocumentError;
use crate::config::ValidatorConfig;
use crate::models::{BatchSummary, DocumentFailure, DocumentSegment, Requirement, ValidationResult};
use crate::pipeline::cache::SegmentCache;
use crate::pipeline::import::decode_document;
use crate::pipeline::segmentation::{clean_text, Segmenter};
use crate::pipeline::structuring::{
    build_evaluation_prompt, build_extraction_prompt, disambiguate, generate_with_retry,
    parse_evaluation, try_parse_extraction, LlmClient, RetryPolicy, StructuringError,
    EVALUATION_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT,
};

/// Runs extract → evaluate for one segment, memoized through the cache.
/// Cheap to clone; each worker task owns a copy.
#[derive(Clone)]
pub struct SegmentProcessor {
    llm: Arc<dyn LlmClient>,
    cache: Option<Arc<dyn SegmentCache>>,
    model: String,
    retry: RetryPolicy,
    prompt_text_limit: usize,
}

impl SegmentProcessor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        cache: Option<Arc<dyn SegmentCache>>,
        model: impl Into<String>,
        retry: RetryPolicy,
        prompt_text_limit: usize,
    ) -> Self {
        Self {
            llm,
            cache,
            model: model.into(),
            retry,
            prompt_text_limit,
        }
    }

    /// Process one segment. Blocks on the extraction service; call from a
    /// blocking context.
    ///
    /// A cache hit skips both service calls. Cache read and write failures
    /// are logged and otherwise ignored. An extraction reply that cannot be
    /// decoded fails the segment and leaves the cache untouched.
    pub fn process(
        &self,
        segment: &DocumentSegment,
        rubric: &Rubric,
    ) -> Result<Vec<Requirement>, StructuringError> {
        if let Some(cache) = &self.cache {
            match cache.get(segment) {
                Ok(Some(cached)) => {
                    tracing::debug!(segment_id = %segment.id, count = cached.len(), "Segment cache hit");
                    return Ok(cached);
                }
                Ok(None) => tracing::debug!(segment_id = %segment.id, "Segment cache miss"),
                Err(e) => {
                    tracing::warn!(segment_id = %segment.id, error = %e, "Unreadable cache entry, reprocessing")
                }
            }
        }

        let prompt = build_extraction_prompt(&segment.text, self.prompt_text_limit);
        let response = generate_with_retry(
            self.llm.as_ref(),
            &self.retry,
            &self.model,
            &prompt,
            EXTRACTION_SYSTEM_PROMPT,
            &segment.id,
        )?;
        let mut requirements = try_parse_extraction(&response)?;

        if !requirements.is_empty() {
            let prompt = build_evaluation_prompt(rubric, &requirements);
            let response = generate_with_retry(
                self.llm.as_ref(),
                &self.retry,
                &self.model,
                &prompt,
                EVALUATION_SYSTEM_PROMPT,
                &segment.id,
            )?;
            requirements = parse_evaluation(&response, requirements);
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(segment, &requirements) {
                tracing::warn!(segment_id = %segment.id, error = %e, "Failed to write cache entry");
            }
        }

        Ok(requirements)
    }
}

/// Results of a batch run. Failed documents are listed, never raised.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<ValidationResult>,
    pub failures: Vec<DocumentFailure>,
}

impl BatchOutcome {
    pub fn summary(&self) -> BatchSummary {
        summarize_batch(&self.results, &self.failures)
    }
}

/// Document and batch validation: segment, fan out per-segment work on a
/// bounded pool, merge, re-check against the rubric, aggregate.
pub struct RequirementValidator {
    processor: SegmentProcessor,
    segmenter: Segmenter,
    rubric: Arc<Rubric>,
    workers: usize,
}

impl RequirementValidator {
    pub fn new(
        config: &ValidatorConfig,
        llm: Arc<dyn LlmClient>,
        cache: Option<Arc<dyn SegmentCache>>,
    ) -> Self {
        Self {
            processor: SegmentProcessor::new(
                llm,
                cache,
                config.service.model.clone(),
                RetryPolicy::from_config(&config.service),
                config.prompt_text_limit,
            ),
            segmenter: Segmenter::new(config.max_segment_length),
            rubric: Arc::new(config.rubric.clone()),
            workers: config.batch_size.max(1),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.processor.retry = retry;
        self
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Validate one file against the configured rubric.
    pub async fn validate_document(&self, path: &Path) -> Result<ValidationResult, DocumentError> {
        self.validate_document_with_rubric(path, self.rubric.clone())
            .await
    }

    /// Validate one file against an explicit rubric.
    pub async fn validate_document_with_rubric(
        &self,
        path: &Path,
        rubric: Arc<Rubric>,
    ) -> Result<ValidationResult, DocumentError> {
        let document = display_name(path);
        let span = tracing::info_span!("validate_document", document = %document);

        async move {
            let started = Instant::now();
            let owned_path = path.to_path_buf();
            let decoded = tokio::task::spawn_blocking(move || decode_document(&owned_path))
                .await
                .map_err(|e| DocumentError::TaskFailed {
                    document: document.clone(),
                    reason: e.to_string(),
                })?
                .map_err(|source| DocumentError::Import {
                    document: document.clone(),
                    source,
                })?;

            self.validate_decoded(&decoded.name, &decoded.text, rubric, started)
                .await
        }
        .instrument(span)
        .await
    }

    /// Validate already-decoded text. `document_name` is used for segment
    /// ids and the result.
    pub async fn validate_text(
        &self,
        document_name: &str,
        raw_text: &str,
        rubric: Arc<Rubric>,
    ) -> Result<ValidationResult, DocumentError> {
        self.validate_decoded(document_name, raw_text, rubric, Instant::now())
            .await
    }

    async fn validate_decoded(
        &self,
        document_name: &str,
        raw_text: &str,
        rubric: Arc<Rubric>,
        started: Instant,
    ) -> Result<ValidationResult, DocumentError> {
        let cleaned = clean_text(raw_text);
        let segments = self.segmenter.segment(&cleaned, document_name);
        if segments.is_empty() {
            return Err(DocumentError::Segmentation {
                document: document_name.to_string(),
                reason: "no text left after cleaning".into(),
            });
        }

        let total = segments.len();
        let (mut requirements, failed) =
            self.run_segments(document_name, segments, rubric.clone()).await?;

        let mut seen = HashSet::new();
        for requirement in &mut requirements {
            requirement.id = disambiguate(&mut seen, std::mem::take(&mut requirement.id));
        }
        recheck_all(&mut requirements, &rubric);

        let result = aggregate(
            document_name,
            requirements,
            started.elapsed(),
            SegmentCounts { total, failed },
        );
        tracing::info!(
            document = %document_name,
            requirements = result.total_requirements,
            complete = result.complete_requirements,
            score = result.completeness_score,
            segments = total,
            failed_segments = failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document validated"
        );
        Ok(result)
    }

    /// Run every segment on at most `workers` blocking tasks and wait for
    /// all of them. Requirements come back in segment order, stamped with
    /// their segment id. Returns the merged requirements and the number of
    /// segments that failed.
    async fn run_segments(
        &self,
        document_name: &str,
        segments: Vec<DocumentSegment>,
        rubric: Arc<Rubric>,
    ) -> Result<(Vec<Requirement>, usize), DocumentError> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let segment_count = segments.len();

        for (index, segment) in segments.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                DocumentError::TaskFailed {
                    document: document_name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let processor = self.processor.clone();
            let rubric = rubric.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = processor.process(&segment, &rubric);
                (index, segment.id, outcome)
            });
        }

        let mut per_segment: Vec<Vec<Requirement>> = vec![Vec::new(); segment_count];
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, segment_id, Ok(mut requirements))) => {
                    for requirement in &mut requirements {
                        requirement.segment_id = segment_id.clone();
                    }
                    per_segment[index] = requirements;
                }
                Ok((_, segment_id, Err(e))) => {
                    failed += 1;
                    tracing::warn!(segment_id = %segment_id, error = %e, "Segment processing failed, skipping");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(document = %document_name, error = %e, "Segment task aborted");
                }
            }
        }

        Ok((per_segment.into_iter().flatten().collect(), failed))
    }

    /// Validate every regular, non-hidden file in `dir`, one document at a
    /// time. Never fails as a whole.
    pub async fn validate_batch(&self, dir: &Path) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let files = match list_documents(dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "Cannot read batch directory");
                outcome.failures.push(DocumentFailure {
                    document_name: dir.display().to_string(),
                    reason: e.to_string(),
                });
                return outcome;
            }
        };

        for path in files {
            match self.validate_document(&path).await {
                Ok(result) => outcome.results.push(result),
                Err(e) => {
                    tracing::error!(document = %e.document(), error = %e, "Document validation failed");
                    outcome.failures.push(DocumentFailure {
                        document_name: e.document().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            validated = outcome.results.len(),
            failed = outcome.failures.len(),
            "Batch validation finished"
        );
        outcome
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular, non-hidden files directly under `dir`, sorted by name.
fn list_documents(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
