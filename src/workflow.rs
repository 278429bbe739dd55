use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::analysis::{AnalysisRequest, VisualAnalyzer};
use crate::error::FreeCadError;
use crate::model::common::ViewName;

pub const DESCRIBE_PROMPT: &str = "Describe this FreeCAD 3D model in detail: structural elements visible, positions, colors, and spatial arrangement.";

pub const DEFAULT_QUESTION: &str = "Describe what you see in this 3D model. What structural elements are visible, how are they positioned, and does anything look spatially wrong or misaligned?";

/// One stored before-capture.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotRecord {
    pub image: String,
    /// Empty when no analyzer was available or it failed.
    pub pre_analysis: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnalysisOutcome {
    pub analysis: Option<String>,
    pub analyzer_available: bool,
}

/// Before/after state shared by `snapshot_view` and `analyze_view`. One record per
/// view name; a later snapshot replaces the earlier one and comparisons never
/// consume it.
pub struct VisualWorkflow {
    analyzer: Arc<dyn VisualAnalyzer>,
    snapshots: Mutex<HashMap<ViewName, SnapshotRecord>>,
}

impl std::fmt::Debug for VisualWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualWorkflow")
            .field("analyzer_available", &self.analyzer.is_available())
            .finish_non_exhaustive()
    }
}

impl VisualWorkflow {
    pub fn new(analyzer: Arc<dyn VisualAnalyzer>) -> Self {
        Self {
            analyzer,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    pub fn analyzer_available(&self) -> bool {
        self.analyzer.is_available()
    }

    /// Describes `image` (when an analyzer is installed) and stores it as the
    /// before-state of `view`.
    pub async fn snapshot(
        &self,
        view: ViewName,
        image: &str,
    ) -> Result<SnapshotRecord, FreeCadError> {
        let pre_analysis = self
            .run_analyzer(image, &AnalysisRequest::new(DESCRIBE_PROMPT))
            .await
            .unwrap_or_default();

        let record = SnapshotRecord {
            image: image.to_string(),
            pre_analysis,
        };

        self.snapshots
            .lock()
            .map_err(|_| FreeCadError::InternalPoisoned)?
            .insert(view, record.clone());

        Ok(record)
    }

    pub fn stored(&self, view: ViewName) -> Result<Option<SnapshotRecord>, FreeCadError> {
        Ok(self
            .snapshots
            .lock()
            .map_err(|_| FreeCadError::InternalPoisoned)?
            .get(&view)
            .cloned())
    }

    /// Analyzes `image`. With `compare`, a non-empty pre-analysis stored for `view`
    /// becomes the prompt's before-context.
    pub async fn analyze(
        &self,
        view: ViewName,
        image: &str,
        question: &str,
        compare: bool,
    ) -> Result<AnalysisOutcome, FreeCadError> {
        let mut request = AnalysisRequest::new(question);
        if compare {
            if let Some(record) = self.stored(view)? {
                request = request.with_before(record.pre_analysis);
            }
        }

        Ok(AnalysisOutcome {
            analysis: self.run_analyzer(image, &request).await,
            analyzer_available: self.analyzer.is_available(),
        })
    }

    pub fn clear(&self) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.clear();
        }
    }

    async fn run_analyzer(&self, image: &str, request: &AnalysisRequest) -> Option<String> {
        if !self.analyzer.is_available() {
            return None;
        }

        match self.analyzer.analyze(image, request).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(error = %err, "visual analysis failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{VisualWorkflow, DESCRIBE_PROMPT};
    use crate::analysis::{AnalysisError, AnalysisRequest, VisualAnalyzer};
    use crate::model::common::ViewName;

    #[derive(Default)]
    struct ScriptedAnalyzer {
        seen: Mutex<Vec<AnalysisRequest>>,
    }

    #[async_trait]
    impl VisualAnalyzer for ScriptedAnalyzer {
        fn is_available(&self) -> bool {
            true
        }

        async fn analyze(
            &self,
            _image_b64: &str,
            request: &AnalysisRequest,
        ) -> Result<String, AnalysisError> {
            let mut seen = self.seen.lock().expect("lock");
            seen.push(request.clone());
            Ok(format!("analysis #{}", seen.len()))
        }
    }

    struct MissingAnalyzer;

    #[async_trait]
    impl VisualAnalyzer for MissingAnalyzer {
        fn is_available(&self) -> bool {
            false
        }

        async fn analyze(
            &self,
            _image_b64: &str,
            _request: &AnalysisRequest,
        ) -> Result<String, AnalysisError> {
            Err(AnalysisError::NotInstalled)
        }
    }

    #[tokio::test]
    async fn compare_uses_stored_pre_analysis_for_same_view() {
        let analyzer = Arc::new(ScriptedAnalyzer::default());
        let workflow = VisualWorkflow::new(analyzer.clone());

        let record = workflow
            .snapshot(ViewName::Top, "AAAA")
            .await
            .expect("snapshot");
        assert_eq!(record.pre_analysis, "analysis #1");

        let outcome = workflow
            .analyze(ViewName::Top, "BBBB", "What changed?", true)
            .await
            .expect("analyze");
        assert_eq!(outcome.analysis.as_deref(), Some("analysis #2"));

        let seen = analyzer.seen.lock().expect("lock");
        assert_eq!(seen[0].question, DESCRIBE_PROMPT);
        assert_eq!(seen[1].before.as_deref(), Some("analysis #1"));
    }

    #[tokio::test]
    async fn compare_without_snapshot_or_flag_has_no_before_context() {
        let analyzer = Arc::new(ScriptedAnalyzer::default());
        let workflow = VisualWorkflow::new(analyzer.clone());

        workflow
            .snapshot(ViewName::Front, "AAAA")
            .await
            .expect("snapshot");
        workflow
            .analyze(ViewName::Top, "BBBB", "q", true)
            .await
            .expect("analyze other view");
        workflow
            .analyze(ViewName::Front, "BBBB", "q", false)
            .await
            .expect("analyze without compare");

        let seen = analyzer.seen.lock().expect("lock");
        assert_eq!(seen[1].before, None);
        assert_eq!(seen[2].before, None);
    }

    #[tokio::test]
    async fn comparisons_do_not_consume_snapshot_and_later_snapshot_replaces() {
        let workflow = VisualWorkflow::new(Arc::new(ScriptedAnalyzer::default()));
        workflow.snapshot(ViewName::Top, "A").await.expect("snapshot");
        workflow
            .analyze(ViewName::Top, "B", "q", true)
            .await
            .expect("analyze");
        assert!(workflow.stored(ViewName::Top).expect("stored").is_some());

        workflow.snapshot(ViewName::Top, "C").await.expect("snapshot");
        let record = workflow
            .stored(ViewName::Top)
            .expect("stored")
            .expect("record");
        assert_eq!(record.image, "C");
    }

    #[tokio::test]
    async fn missing_analyzer_stores_empty_pre_analysis() {
        let workflow = VisualWorkflow::new(Arc::new(MissingAnalyzer));
        let record = workflow
            .snapshot(ViewName::Isometric, "A")
            .await
            .expect("snapshot");
        assert!(record.pre_analysis.is_empty());

        let outcome = workflow
            .analyze(ViewName::Isometric, "B", "q", true)
            .await
            .expect("analyze");
        assert_eq!(outcome.analysis, None);
        assert!(!outcome.analyzer_available);
    }
}
