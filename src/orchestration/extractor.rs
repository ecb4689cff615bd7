//! Per-context metadata extraction
//!
//! Runs the analysis toolchain against one context directory and collects
//! the results into [`ContextMetadata`]. Context directories never share
//! mutable state, so the same routine serves the root, submodules and
//! examples alike; only cost estimation depends on the context kind.

use crate::core::error::ExtractError;
use crate::core::metadata::{ContextMetadata, ModuleContext};
use crate::core::traits::AnalysisToolchain;
use crate::validation::readme;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Extracts the full metadata set for context directories
#[derive(Clone)]
pub struct MetadataExtractor {
    toolchain: Arc<dyn AnalysisToolchain>,
}

impl MetadataExtractor {
    pub fn new(toolchain: Arc<dyn AnalysisToolchain>) -> Self {
        Self { toolchain }
    }

    /// Extract everything for one context directory
    pub async fn extract_context(
        &self,
        module_root: &Path,
        context: &ModuleContext,
    ) -> Result<ContextMetadata, ExtractError> {
        let dir = match context.relative_path() {
            Some(path) => module_root.join(path),
            None => module_root.to_path_buf(),
        };
        info!("{}: メタデータを抽出します", context);

        let docs = self.toolchain.generate_docs(&dir).await?;
        let security_findings = self.toolchain.scan_security(&dir).await?;
        let cost_estimate = if context.cost_estimation_enabled() {
            self.toolchain.estimate_cost(&dir).await?
        } else {
            None
        };
        let analysis = self.toolchain.analyze_terraform(&dir).await?;
        let readme_content = readme::read_readme(&dir)?;

        Ok(ContextMetadata {
            docs,
            security_findings,
            cost_estimate,
            dependency_graph: Some(analysis.dependency_graph),
            version_facts: Some(analysis.version_facts),
            module_calls: analysis.module_calls,
            readme_content,
        })
    }
}

/// Discover child contexts one level below the module root
///
/// Submodules live directly under `modules/`, examples directly under
/// `examples/`. Files and dot-directories are ignored, and the scan does
/// not recurse further. Results are ordered by relative path.
pub fn discover_children(module_root: &Path) -> Result<Vec<ModuleContext>, ExtractError> {
    let mut children = Vec::new();

    for path in child_directories(module_root, "modules")? {
        children.push(ModuleContext::Submodule { path });
    }
    for path in child_directories(module_root, "examples")? {
        children.push(ModuleContext::Example { path });
    }

    Ok(children)
}

fn child_directories(module_root: &Path, kind: &str) -> Result<Vec<String>, ExtractError> {
    let parent = module_root.join(kind);
    if !parent.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    let entries = std::fs::read_dir(&parent).map_err(|e| ExtractError::Filesystem {
        message: format!("{}: {}", parent.display(), e),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ExtractError::Filesystem {
            message: format!("{}: {}", parent.display(), e),
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| ExtractError::Filesystem {
            message: format!("{}: {}", entry.path().display(), e),
        })?;
        if file_type.is_dir() {
            paths.push(format!("{}/{}", kind, name));
        }
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{ModuleDocs, SecurityFinding};
    use crate::core::traits::TerraformAnalysis;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records which directories each tool was pointed at
    struct RecordingToolchain {
        calls: Mutex<Vec<String>>,
        fail_docs: bool,
    }

    impl RecordingToolchain {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_docs: false,
            }
        }

        fn record(&self, tool: &str, dir: &Path) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", tool, dir.display()));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnalysisToolchain for RecordingToolchain {
        async fn generate_docs(&self, module_dir: &Path) -> Result<ModuleDocs, ExtractError> {
            self.record("docs", module_dir);
            if self.fail_docs {
                return Err(ExtractError::UnableToProcessTerraform {
                    message: "boom".to_string(),
                });
            }
            Ok(ModuleDocs::default())
        }

        async fn scan_security(
            &self,
            module_dir: &Path,
        ) -> Result<Vec<SecurityFinding>, ExtractError> {
            self.record("scan", module_dir);
            Ok(Vec::new())
        }

        async fn estimate_cost(
            &self,
            module_dir: &Path,
        ) -> Result<Option<serde_json::Value>, ExtractError> {
            self.record("cost", module_dir);
            Ok(Some(serde_json::json!({"totalMonthlyCost": "1.00"})))
        }

        async fn analyze_terraform(
            &self,
            module_dir: &Path,
        ) -> Result<TerraformAnalysis, ExtractError> {
            self.record("terraform", module_dir);
            Ok(TerraformAnalysis {
                dependency_graph: "digraph {}".to_string(),
                version_facts: Default::default(),
                module_calls: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_root_context_skips_cost_estimation() {
        let temp_dir = TempDir::new().unwrap();
        let toolchain = Arc::new(RecordingToolchain::new());
        let extractor = MetadataExtractor::new(toolchain.clone());

        let metadata = extractor
            .extract_context(temp_dir.path(), &ModuleContext::Root)
            .await
            .unwrap();

        assert!(metadata.cost_estimate.is_none());
        assert_eq!(metadata.dependency_graph.as_deref(), Some("digraph {}"));
        let calls = toolchain.calls();
        assert!(calls.iter().all(|c| !c.starts_with("cost:")));
    }

    #[tokio::test]
    async fn test_example_context_estimates_cost_in_its_own_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("examples/basic")).unwrap();
        let toolchain = Arc::new(RecordingToolchain::new());
        let extractor = MetadataExtractor::new(toolchain.clone());

        let context = ModuleContext::Example {
            path: "examples/basic".to_string(),
        };
        let metadata = extractor
            .extract_context(temp_dir.path(), &context)
            .await
            .unwrap();

        assert!(metadata.cost_estimate.is_some());
        let expected_dir = temp_dir.path().join("examples/basic");
        assert!(
            toolchain
                .calls()
                .contains(&format!("cost:{}", expected_dir.display()))
        );
    }

    #[tokio::test]
    async fn test_context_captures_its_readme() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("README.md"), b"# root readme").unwrap();

        let extractor = MetadataExtractor::new(Arc::new(RecordingToolchain::new()));
        let metadata = extractor
            .extract_context(temp_dir.path(), &ModuleContext::Root)
            .await
            .unwrap();

        assert_eq!(metadata.readme_content.as_deref(), Some(b"# root readme".as_slice()));
    }

    #[tokio::test]
    async fn test_docs_failure_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let toolchain = Arc::new(RecordingToolchain {
            calls: Mutex::new(Vec::new()),
            fail_docs: true,
        });
        let extractor = MetadataExtractor::new(toolchain);

        let error = extractor
            .extract_context(temp_dir.path(), &ModuleContext::Root)
            .await
            .unwrap_err();
        assert_eq!(error.code(), "UNABLE_TO_PROCESS_TERRAFORM");
    }

    #[test]
    fn test_discover_children_one_level_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("modules/vpc/deep")).unwrap();
        std::fs::create_dir_all(root.join("modules/subnets")).unwrap();
        std::fs::create_dir_all(root.join("modules/.hidden")).unwrap();
        std::fs::create_dir_all(root.join("examples/basic")).unwrap();
        std::fs::write(root.join("modules/README.md"), b"not a module").unwrap();

        let children = discover_children(root).unwrap();

        let rendered: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "submodule modules/subnets",
                "submodule modules/vpc",
                "example examples/basic"
            ]
        );
    }

    #[test]
    fn test_discover_children_without_child_directories() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_children(temp_dir.path()).unwrap().is_empty());
    }
}
