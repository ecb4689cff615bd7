//! Publishing pipeline
//!
//! Drives one module version through the extraction state machine: acquire
//! the source, unpack it, extract metadata for the root and all child
//! contexts, reconcile with the metadata file, build and store the source
//! archives, and commit the version row. All intermediate files live in a
//! run-scoped temporary directory that is removed on every exit path, and
//! the catalog is only touched in the final Committing step.

use crate::archive::builder::ArchiveBuilder;
use crate::archive::unpack::{SafeUnpacker, resolve_entry_destination};
use crate::core::config::{ExtractorConfig, RepositoryConfig};
use crate::core::error::ExtractError;
use crate::core::metadata::{
    ArchiveArtifact, ArchiveFormat, ChildContext, ContextMetadata, ExtractionResult, ModuleContext,
    ModuleKey, ModuleVersionDraft,
};
use crate::core::state_machine::{ExtractionState, ExtractionStateMachine};
use crate::core::traits::{AnalysisToolchain, CatalogStore, FileStorage, VersionRecord};
use crate::orchestration::extractor::{MetadataExtractor, discover_children};
use crate::source::templates::validate_url_template;
use crate::source::{GitAcquirer, UploadedArchive};
use crate::validation::manifest::{self, LoadedManifest};
use crate::validation::{merge_variable_template, readme};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Where the module source comes from
#[derive(Debug, Clone)]
pub enum PublishSource {
    /// Clone the configured repository at the tag for the requested version
    Git,

    /// Unpack an archive uploaded by the caller
    Upload(UploadedArchive),
}

/// One publish invocation
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Module identity
    pub module: ModuleKey,

    /// Version to publish; callers parse before invoking
    pub version: semver::Version,

    /// Repository settings for this request, overriding the configured ones
    pub repository: Option<RepositoryConfig>,

    /// Source acquisition mode
    pub source: PublishSource,
}

/// Source staged on local disk, before unpacking
enum Acquired {
    /// Checked-out working tree; unpacking is a pass-through
    Tree(PathBuf),

    /// Staged archive file awaiting extraction
    Archive(PathBuf, ArchiveFormat),
}

/// Runs the publish pipeline for module versions
pub struct ModulePublisher {
    config: ExtractorConfig,
    toolchain: Arc<dyn AnalysisToolchain>,
    storage: Arc<dyn FileStorage>,
    store: Arc<dyn CatalogStore>,
}

impl ModulePublisher {
    pub fn new(
        config: ExtractorConfig,
        toolchain: Arc<dyn AnalysisToolchain>,
        storage: Arc<dyn FileStorage>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            config,
            toolchain,
            storage,
            store,
        }
    }

    /// Publish one module version end to end
    ///
    /// On failure the state machine records the terminal Failed transition
    /// with the error code as detail, and the scratch directory is removed
    /// either way.
    pub async fn publish(
        &self,
        request: PublishRequest,
    ) -> Result<ExtractionResult, ExtractError> {
        let run_id = Uuid::new_v4().to_string();
        info!(
            "🚀 [{}] {} {} の公開を開始します",
            run_id, request.module, request.version
        );

        let scratch = TempDir::new().map_err(|e| ExtractError::Filesystem {
            message: format!("一時ディレクトリを作成できません: {}", e),
        })?;

        let mut machine = ExtractionStateMachine::new();
        let result = self
            .run_pipeline(&request, &mut machine, scratch.path(), &run_id)
            .await;

        if let Err(error) = &result {
            let _ = machine.fail(error.code());
            warn!(
                "❌ [{}] 公開に失敗しました [{}]: {}",
                run_id,
                error.code(),
                error
            );
            debug!("[{}] 状態遷移履歴:\n{}", run_id, machine.history());
        }

        result
    }

    async fn run_pipeline(
        &self,
        request: &PublishRequest,
        machine: &mut ExtractionStateMachine,
        scratch: &Path,
        run_id: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let repository = self.repository_for(request);

        machine.advance(ExtractionState::Acquiring)?;
        let acquired = self.acquire(request, repository, scratch).await?;

        machine.advance(ExtractionState::Unpacking)?;
        let module_root = self.unpack(acquired, scratch)?;
        let context_root = self.context_root(repository, &module_root)?;

        machine.advance(ExtractionState::ExtractingRoot)?;
        let extractor = MetadataExtractor::new(self.toolchain.clone());
        let root = extractor
            .extract_context(&context_root, &ModuleContext::Root)
            .await?;

        machine.advance(ExtractionState::ExtractingChildren)?;
        let (submodules, examples) = self.extract_children(&extractor, &context_root).await?;
        info!(
            "📦 [{}] サブモジュール{}件、使用例{}件を抽出しました",
            run_id,
            submodules.len(),
            examples.len()
        );

        machine.advance(ExtractionState::Reconciling)?;
        let manifest = manifest::load(&context_root)?;
        manifest.check_required_attributes(&self.config.required_metadata_attributes)?;
        let draft = self.reconcile(repository, &manifest, root, submodules, examples)?;

        machine.advance(ExtractionState::Archiving)?;
        let artifacts = self.archive_and_store(request, &context_root, scratch).await?;

        machine.advance(ExtractionState::Committing)?;
        let record = VersionRecord {
            module: request.module.clone(),
            version: request.version.to_string(),
            published: false,
            draft,
            artifacts,
        };
        let previous_version_published = self
            .store
            .replace_version(&record)
            .await
            .map_err(|e| ExtractError::CatalogCommit {
                message: e.to_string(),
            })?;

        machine.advance(ExtractionState::Done)?;
        info!(
            "✅ [{}] {} {} の公開が完了しました ({}ms)",
            run_id,
            request.module,
            request.version,
            machine.elapsed_ms()
        );

        let VersionRecord {
            module,
            version,
            draft,
            artifacts,
            ..
        } = record;

        Ok(ExtractionResult {
            module,
            version,
            description: draft.description,
            owner: draft.owner,
            variable_template: draft.variable_template,
            root: draft.root,
            submodules: draft.submodules,
            examples: draft.examples,
            artifacts,
            previous_version_published,
            run_id: run_id.to_string(),
            duration_ms: machine.elapsed_ms().max(0) as u64,
            state_history: machine.transitions().to_vec(),
        })
    }

    /// Repository settings for this request, falling back to the configured ones
    fn repository_for<'a>(&'a self, request: &'a PublishRequest) -> Option<&'a RepositoryConfig> {
        request.repository.as_ref().or(self.config.repository.as_ref())
    }

    async fn acquire(
        &self,
        request: &PublishRequest,
        repository: Option<&RepositoryConfig>,
        scratch: &Path,
    ) -> Result<Acquired, ExtractError> {
        match &request.source {
            PublishSource::Git => {
                let repository = repository.ok_or(ExtractError::MissingCloneUrl)?;
                let dest = scratch.join("source");
                let acquirer = GitAcquirer::new(
                    scratch,
                    Duration::from_secs(self.config.tool_timeout_secs),
                )?;
                acquirer
                    .clone_version(repository, &request.module, &request.version, &dest)
                    .await?;
                Ok(Acquired::Tree(dest))
            }
            PublishSource::Upload(archive) => {
                let staging = scratch.join("upload");
                std::fs::create_dir_all(&staging).map_err(|e| ExtractError::Filesystem {
                    message: format!("{}: {}", staging.display(), e),
                })?;
                let format = archive.format()?;
                let staged = archive.stage(&staging).await?;
                Ok(Acquired::Archive(staged, format))
            }
        }
    }

    fn unpack(&self, acquired: Acquired, scratch: &Path) -> Result<PathBuf, ExtractError> {
        match acquired {
            Acquired::Tree(path) => Ok(path),
            Acquired::Archive(staged, format) => {
                let dest = scratch.join("tree");
                std::fs::create_dir_all(&dest).map_err(|e| ExtractError::Filesystem {
                    message: format!("{}: {}", dest.display(), e),
                })?;
                SafeUnpacker::unpack(&staged, format, &dest)?;
                Ok(dest)
            }
        }
    }

    /// Resolve the directory all extraction and archiving runs against
    ///
    /// With a git subpath configured the module lives in a subdirectory of
    /// the repository. The subpath gets the same lexical containment check
    /// as archive entries, and the resulting directory must canonicalize to
    /// a path still under the module root; a cloned tree can carry symlinks.
    fn context_root(
        &self,
        repository: Option<&RepositoryConfig>,
        module_root: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let Some(subpath) = repository.and_then(|r| r.git_subpath.as_deref()) else {
            return Ok(module_root.to_path_buf());
        };

        let adjusted = resolve_entry_destination(module_root, Path::new(subpath))?;
        if !adjusted.is_dir() {
            return Err(ExtractError::Filesystem {
                message: format!("gitサブパスのディレクトリが存在しません: {}", subpath),
            });
        }

        let canonical = adjusted
            .canonicalize()
            .map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", adjusted.display(), e),
            })?;
        let canonical_root = module_root
            .canonicalize()
            .map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", module_root.display(), e),
            })?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ExtractError::PathIsNotWithinBaseDirectory {
                path: subpath.to_string(),
            });
        }

        Ok(canonical)
    }

    /// Extract all submodule and example contexts, bounded by the worker limit
    ///
    /// The first failing child fails the run; remaining tasks are aborted
    /// when the join set is dropped. Results are ordered by relative path,
    /// not completion order.
    async fn extract_children(
        &self,
        extractor: &MetadataExtractor,
        context_root: &Path,
    ) -> Result<(Vec<ChildContext>, Vec<ChildContext>), ExtractError> {
        let children = discover_children(context_root)?;
        if children.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.worker_limit.max(1)));
        let mut tasks = JoinSet::new();
        for context in children {
            let semaphore = semaphore.clone();
            let extractor = extractor.clone();
            let root = context_root.to_path_buf();
            tasks.spawn(async move {
                let _permit =
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ExtractError::Filesystem {
                            message: "ワーカープールが停止しました".to_string(),
                        })?;
                let metadata = extractor.extract_context(&root, &context).await?;
                Ok::<_, ExtractError>((context, metadata))
            });
        }

        let mut submodules = Vec::new();
        let mut examples = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (context, metadata) = joined.map_err(|e| ExtractError::Filesystem {
                message: format!("抽出タスクの実行に失敗しました: {}", e),
            })??;

            let path = context.relative_path().unwrap_or_default().to_string();
            let child = ChildContext { path, metadata };
            match context {
                ModuleContext::Submodule { .. } => submodules.push(child),
                ModuleContext::Example { .. } => examples.push(child),
                ModuleContext::Root => {}
            }
        }

        submodules.sort_by(|a, b| a.path.cmp(&b.path));
        examples.sort_by(|a, b| a.path.cmp(&b.path));
        Ok((submodules, examples))
    }

    /// Merge request, metadata file and extracted data into the version draft
    ///
    /// The metadata file wins over request settings for every attribute it
    /// carries, and is removed from the tree afterwards so it never ships in
    /// the archives.
    fn reconcile(
        &self,
        repository: Option<&RepositoryConfig>,
        manifest: &LoadedManifest,
        root: ContextMetadata,
        submodules: Vec<ChildContext>,
        examples: Vec<ChildContext>,
    ) -> Result<ModuleVersionDraft, ExtractError> {
        let description = match manifest.metadata.description.clone() {
            Some(description) => Some(description),
            None if self.config.autogenerate_description => root
                .readme_content
                .as_deref()
                .and_then(|bytes| readme::derive_description(&String::from_utf8_lossy(bytes))),
            None => None,
        };

        let repo_clone_url_template = manifest
            .metadata
            .repo_clone_url_template
            .clone()
            .or_else(|| repository.and_then(|r| r.clone_url_template.clone()))
            .or_else(|| {
                repository.and_then(|r| {
                    r.git_provider
                        .as_ref()
                        .map(|p| p.clone_url_template.clone())
                })
            });
        let repo_base_url_template = manifest
            .metadata
            .repo_base_url_template
            .clone()
            .or_else(|| repository.and_then(|r| r.base_url_template.clone()))
            .or_else(|| {
                repository.and_then(|r| {
                    r.git_provider
                        .as_ref()
                        .and_then(|p| p.base_url_template.clone())
                })
            });
        let repo_browse_url_template = manifest
            .metadata
            .repo_browse_url_template
            .clone()
            .or_else(|| repository.and_then(|r| r.browse_url_template.clone()))
            .or_else(|| {
                repository.and_then(|r| {
                    r.git_provider
                        .as_ref()
                        .and_then(|p| p.browse_url_template.clone())
                })
            });

        for (template, field) in [
            (&repo_clone_url_template, "repo_clone_url_template"),
            (&repo_base_url_template, "repo_base_url_template"),
            (&repo_browse_url_template, "repo_browse_url_template"),
        ] {
            if let Some(template) = template {
                validate_url_template(template, field)?;
            }
        }

        let variable_template =
            merge_variable_template(&manifest.metadata.variable_template, &root.docs.inputs);

        // Registry metadata, not module source
        manifest.remove_file()?;

        Ok(ModuleVersionDraft {
            description,
            owner: manifest.metadata.owner.clone(),
            variable_template,
            repo_clone_url_template,
            repo_base_url_template,
            repo_browse_url_template,
            root,
            submodules,
            examples,
        })
    }

    /// Build both archive formats and upload them to storage
    async fn archive_and_store(
        &self,
        request: &PublishRequest,
        context_root: &Path,
        scratch: &Path,
    ) -> Result<Vec<ArchiveArtifact>, ExtractError> {
        let staging = scratch.join("artifacts");
        std::fs::create_dir_all(&staging).map_err(|e| ExtractError::Filesystem {
            message: format!("{}: {}", staging.display(), e),
        })?;

        let built = ArchiveBuilder::build(context_root, &staging)?;

        let storage_dir = request.module.storage_directory(&request.version);
        self.storage
            .make_directory(&storage_dir)
            .await
            .map_err(|e| ExtractError::ArchiveStorage {
                message: e.to_string(),
            })?;

        let mut artifacts = Vec::with_capacity(built.len());
        for archive in built {
            self.storage
                .upload_file(&archive.local_path, &storage_dir, archive.format.file_name())
                .await
                .map_err(|e| ExtractError::ArchiveStorage {
                    message: e.to_string(),
                })?;
            info!(
                "💾 アーカイブを保存しました: {}/{}",
                storage_dir,
                archive.format.file_name()
            );
            artifacts.push(ArchiveArtifact {
                format: archive.format,
                storage_path: format!("{}/{}", storage_dir, archive.format.file_name()),
                sha256: archive.sha256,
                size_bytes: archive.size_bytes,
            });
        }

        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::storage::LocalFileStorage;
    use crate::core::metadata::{ModuleDocs, SecurityFinding};
    use crate::core::traits::TerraformAnalysis;
    use crate::store::MemoryCatalogStore;
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    struct StubToolchain;

    #[async_trait]
    impl AnalysisToolchain for StubToolchain {
        async fn generate_docs(&self, _: &Path) -> Result<ModuleDocs, ExtractError> {
            let raw = r#"{
                "inputs": [
                    {"name": "cidr", "type": "string", "description": "CIDR block", "required": true},
                    {"name": "name", "type": "string", "default": "vpc", "required": false}
                ]
            }"#;
            Ok(serde_json::from_str(raw).unwrap())
        }

        async fn scan_security(&self, _: &Path) -> Result<Vec<SecurityFinding>, ExtractError> {
            let raw = r#"[
                {"rule_id": "aws-vpc-no-flow-logs", "severity": "HIGH", "status": 0},
                {"rule_id": "aws-vpc-tags", "severity": "LOW", "status": 1}
            ]"#;
            Ok(serde_json::from_str(raw).unwrap())
        }

        async fn estimate_cost(
            &self,
            _: &Path,
        ) -> Result<Option<serde_json::Value>, ExtractError> {
            Ok(Some(serde_json::json!({"totalMonthlyCost": "9.99"})))
        }

        async fn analyze_terraform(&self, _: &Path) -> Result<TerraformAnalysis, ExtractError> {
            Ok(TerraformAnalysis {
                dependency_graph: "digraph G {}".to_string(),
                version_facts: Default::default(),
                module_calls: Vec::new(),
            })
        }
    }

    struct FailingDocsToolchain;

    #[async_trait]
    impl AnalysisToolchain for FailingDocsToolchain {
        async fn generate_docs(&self, _: &Path) -> Result<ModuleDocs, ExtractError> {
            Err(ExtractError::UnableToProcessTerraform {
                message: "terraform-docs exited with 1".to_string(),
            })
        }

        async fn scan_security(&self, _: &Path) -> Result<Vec<SecurityFinding>, ExtractError> {
            Ok(Vec::new())
        }

        async fn estimate_cost(
            &self,
            _: &Path,
        ) -> Result<Option<serde_json::Value>, ExtractError> {
            Ok(None)
        }

        async fn analyze_terraform(&self, _: &Path) -> Result<TerraformAnalysis, ExtractError> {
            Ok(TerraformAnalysis {
                dependency_graph: String::new(),
                version_facts: Default::default(),
                module_calls: Vec::new(),
            })
        }
    }

    fn tar_gz_with(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    const MANIFEST: &str = r#"{
        "description": "VPC networking module",
        "owner": "platform-team",
        "variable_template": [
            {"name": "cidr", "type": "cidr_block", "quote_value": true}
        ],
        "repo_browse_url_template": "https://manifest.example.com/{namespace}/{module}/browse/{tag}/{path}"
    }"#;

    const README: &str =
        "# Network module\n\nProvisions a production ready VPC with sensible defaults.\n";

    fn module_fixture() -> Vec<u8> {
        tar_gz_with(&[
            ("main.tf", b"resource \"aws_vpc\" \"this\" {}\n" as &[u8]),
            ("README.md", README.as_bytes()),
            ("module-publisher.json", MANIFEST.as_bytes()),
            ("modules/vpc/main.tf", b"# vpc\n"),
            ("modules/subnets/main.tf", b"# subnets\n"),
            ("examples/basic/main.tf", b"module \"net\" { source = \"../..\" }\n"),
            (".git/config", b"[core]\n"),
        ])
    }

    fn publisher(
        config: ExtractorConfig,
        toolchain: Arc<dyn AnalysisToolchain>,
    ) -> (ModulePublisher, Arc<MemoryCatalogStore>, TempDir) {
        let storage_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryCatalogStore::new());
        let publisher = ModulePublisher::new(
            config,
            toolchain,
            Arc::new(LocalFileStorage::new(storage_dir.path())),
            store.clone(),
        );
        (publisher, store, storage_dir)
    }

    fn request(source: PublishSource) -> PublishRequest {
        PublishRequest {
            module: ModuleKey::new("myns", "network", "aws"),
            version: semver::Version::parse("1.0.0").unwrap(),
            repository: None,
            source,
        }
    }

    #[tokio::test]
    async fn test_publish_upload_end_to_end() {
        let (publisher, store, storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let mut req = request(PublishSource::Upload(UploadedArchive::new(
            "network.tar.gz",
            module_fixture(),
        )));
        req.repository = Some(RepositoryConfig {
            clone_url_template: Some("ssh://git@req.example.com/{namespace}/{module}.git".to_string()),
            browse_url_template: Some(
                "https://req.example.com/{namespace}/{module}/{tag}/{path}".to_string(),
            ),
            ..Default::default()
        });

        let result = publisher.publish(req).await.unwrap();

        assert_eq!(result.description.as_deref(), Some("VPC networking module"));
        assert_eq!(result.owner.as_deref(), Some("platform-team"));

        // Metadata file entry wins for cidr; documented-only input is appended
        assert_eq!(result.variable_template.len(), 2);
        assert_eq!(result.variable_template[0].name, "cidr");
        assert_eq!(result.variable_template[0].variable_type, "cidr_block");
        assert_eq!(result.variable_template[1].name, "name");
        assert_eq!(result.variable_template[1].variable_type, "string");

        assert_eq!(result.submodules.len(), 2);
        assert_eq!(result.submodules[0].path, "modules/subnets");
        assert_eq!(result.submodules[1].path, "modules/vpc");
        assert!(result.submodules[0].metadata.cost_estimate.is_none());
        assert_eq!(result.examples.len(), 1);
        assert_eq!(result.examples[0].path, "examples/basic");
        assert!(result.examples[0].metadata.cost_estimate.is_some());

        assert_eq!(result.root.security_failures().len(), 1);
        assert!(result.root.readme_content.is_some());
        assert!(!result.previous_version_published);

        // Both formats, addressed under the version's storage directory
        assert_eq!(result.artifacts.len(), 2);
        assert_eq!(
            result.artifacts[0].storage_path,
            "modules/myns/network/aws/1.0.0/source.tar.gz"
        );
        assert_eq!(
            result.artifacts[1].storage_path,
            "modules/myns/network/aws/1.0.0/source.zip"
        );
        let version_dir = storage_dir.path().join("modules/myns/network/aws/1.0.0");
        assert!(version_dir.join("source.tar.gz").is_file());
        assert!(version_dir.join("source.zip").is_file());

        // Full history from Pending through Done
        assert_eq!(result.state_history.len(), 8);
        assert_eq!(result.state_history[0].from, ExtractionState::Pending);
        assert_eq!(result.state_history[0].to, ExtractionState::Acquiring);
        assert_eq!(
            result.state_history[7].from,
            ExtractionState::Committing
        );
        assert_eq!(result.state_history[7].to, ExtractionState::Done);

        // Committed row is unpublished and carries the manifest-won template
        let row = store.get(&result.module, "1.0.0").await.unwrap();
        assert!(!row.published);
        assert_eq!(row.artifacts.len(), 2);
        assert_eq!(
            row.draft.repo_clone_url_template.as_deref(),
            Some("ssh://git@req.example.com/{namespace}/{module}.git")
        );
        assert_eq!(
            row.draft.repo_browse_url_template.as_deref(),
            Some("https://manifest.example.com/{namespace}/{module}/browse/{tag}/{path}")
        );
        assert_eq!(row.draft.repo_base_url_template, None);

        // Stored archive excludes .git and the metadata file
        let out = TempDir::new().unwrap();
        SafeUnpacker::unpack(
            &version_dir.join("source.tar.gz"),
            ArchiveFormat::TarGz,
            out.path(),
        )
        .unwrap();
        assert!(out.path().join("main.tf").is_file());
        assert!(out.path().join("modules/vpc/main.tf").is_file());
        assert!(!out.path().join(".git").exists());
        assert!(!out.path().join("module-publisher.json").exists());
    }

    #[tokio::test]
    async fn test_republish_replaces_row_and_reports_prior_publication() {
        let (publisher, store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));
        let archive = UploadedArchive::new("network.tar.gz", module_fixture());

        let first = publisher
            .publish(request(PublishSource::Upload(archive.clone())))
            .await
            .unwrap();
        assert!(!first.previous_version_published);

        store.set_published(&first.module, "1.0.0").await;

        let second = publisher
            .publish(request(PublishSource::Upload(archive)))
            .await
            .unwrap();
        assert!(second.previous_version_published);

        // Still a single row, and re-publication resets the approval flag
        assert_eq!(store.len().await, 1);
        let row = store.get(&second.module, "1.0.0").await.unwrap();
        assert!(!row.published);
    }

    #[tokio::test]
    async fn test_missing_required_attribute_fails_before_any_write() {
        let config = ExtractorConfig {
            required_metadata_attributes: vec!["description".to_string(), "owner".to_string()],
            ..Default::default()
        };
        let (publisher, store, storage_dir) = publisher(config, Arc::new(StubToolchain));

        let fixture = tar_gz_with(&[
            ("main.tf", b"# tf\n" as &[u8]),
            (
                "module-publisher.json",
                br#"{"description": "VPC networking module"}"#,
            ),
        ]);
        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.tar.gz",
                fixture,
            ))))
            .await;

        match result {
            Err(ExtractError::MetadataDoesNotContainRequiredAttribute { attribute }) => {
                assert_eq!(attribute, "owner");
            }
            other => panic!("expected required attribute error, got {:?}", other.map(|r| r.version)),
        }

        assert!(store.is_empty().await);
        assert!(std::fs::read_dir(storage_dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unknown_upload_filetype_is_rejected() {
        let (publisher, store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "module.rar",
                b"not an archive".to_vec(),
            ))))
            .await;

        assert!(matches!(
            result,
            Err(ExtractError::UnknownFiletype { .. })
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_traversal_entry_aborts_run_without_commit() {
        let (publisher, store, storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("good.tf", options).unwrap();
            writer.write_all(b"ok").unwrap();
            writer.start_file("../escape.txt", options).unwrap();
            writer.write_all(b"evil").unwrap();
            writer.finish().unwrap();
        }

        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.zip",
                cursor.into_inner(),
            ))))
            .await;

        assert!(matches!(
            result,
            Err(ExtractError::PathIsNotWithinBaseDirectory { .. })
        ));
        assert!(store.is_empty().await);
        assert!(std::fs::read_dir(storage_dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_git_source_without_repository_settings() {
        let (publisher, store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let result = publisher.publish(request(PublishSource::Git)).await;

        assert!(matches!(result, Err(ExtractError::MissingCloneUrl)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_docs_failure_is_fatal_and_nothing_is_committed() {
        let (publisher, store, storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(FailingDocsToolchain));

        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.tar.gz",
                module_fixture(),
            ))))
            .await;

        assert!(matches!(
            result,
            Err(ExtractError::UnableToProcessTerraform { .. })
        ));
        assert!(store.is_empty().await);
        assert!(std::fs::read_dir(storage_dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_description_derived_from_readme_when_manifest_silent() {
        let (publisher, _store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let fixture = tar_gz_with(&[
            ("main.tf", b"# tf\n" as &[u8]),
            ("README.md", README.as_bytes()),
        ]);
        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.tar.gz",
                fixture,
            ))))
            .await
            .unwrap();

        assert_eq!(
            result.description.as_deref(),
            Some("Provisions a production ready VPC with sensible defaults.")
        );
        assert_eq!(result.owner, None);
    }

    #[tokio::test]
    async fn test_description_not_derived_when_autogenerate_disabled() {
        let config = ExtractorConfig {
            autogenerate_description: false,
            ..Default::default()
        };
        let (publisher, _store, _storage_dir) = publisher(config, Arc::new(StubToolchain));

        let fixture = tar_gz_with(&[
            ("main.tf", b"# tf\n" as &[u8]),
            ("README.md", README.as_bytes()),
        ]);
        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.tar.gz",
                fixture,
            ))))
            .await
            .unwrap();

        assert_eq!(result.description, None);
    }

    #[tokio::test]
    async fn test_git_subpath_restricts_extraction_and_archives() {
        let (publisher, _store, storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let fixture = tar_gz_with(&[
            ("top-level-note.txt", b"repo readme\n" as &[u8]),
            ("infra/main.tf", b"# tf\n"),
            ("infra/README.md", README.as_bytes()),
        ]);
        let mut req = request(PublishSource::Upload(UploadedArchive::new(
            "network.tar.gz",
            fixture,
        )));
        req.repository = Some(RepositoryConfig {
            git_subpath: Some("infra".to_string()),
            ..Default::default()
        });

        let result = publisher.publish(req).await.unwrap();
        assert_eq!(
            result.description.as_deref(),
            Some("Provisions a production ready VPC with sensible defaults.")
        );

        let out = TempDir::new().unwrap();
        SafeUnpacker::unpack(
            &storage_dir
                .path()
                .join("modules/myns/network/aws/1.0.0/source.tar.gz"),
            ArchiveFormat::TarGz,
            out.path(),
        )
        .unwrap();
        assert!(out.path().join("main.tf").is_file());
        assert!(out.path().join("README.md").is_file());
        assert!(!out.path().join("top-level-note.txt").exists());
        assert!(!out.path().join("infra").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_git_subpath_symlink_out_of_clone_is_rejected() {
        let (publisher, _store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let scratch = TempDir::new().unwrap();
        let clone = scratch.path().join("source");
        std::fs::create_dir_all(&clone).unwrap();
        std::fs::write(clone.join("main.tf"), b"# tf\n").unwrap();

        // The subpath entry is a link pointing outside the checked-out tree
        let outside = scratch.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), b"host data").unwrap();
        std::os::unix::fs::symlink(&outside, clone.join("infra")).unwrap();

        let repository = RepositoryConfig {
            git_subpath: Some("infra".to_string()),
            ..Default::default()
        };

        let result = publisher.context_root(Some(&repository), &clone);
        match result {
            Err(ExtractError::PathIsNotWithinBaseDirectory { path }) => {
                assert_eq!(path, "infra");
            }
            other => panic!("expected containment error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_git_subpath_symlink_within_clone_is_allowed() {
        let (publisher, _store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let scratch = TempDir::new().unwrap();
        let clone = scratch.path().join("source");
        let real = clone.join("terraform/network");
        std::fs::create_dir_all(&real).unwrap();
        std::fs::write(real.join("main.tf"), b"# tf\n").unwrap();
        std::os::unix::fs::symlink(Path::new("terraform/network"), clone.join("infra")).unwrap();

        let repository = RepositoryConfig {
            git_subpath: Some("infra".to_string()),
            ..Default::default()
        };

        let resolved = publisher.context_root(Some(&repository), &clone).unwrap();
        assert_eq!(resolved, real.canonicalize().unwrap());
        assert!(resolved.join("main.tf").is_file());
    }

    #[tokio::test]
    async fn test_invalid_manifest_url_template_fails_run() {
        let (publisher, store, _storage_dir) =
            publisher(ExtractorConfig::default(), Arc::new(StubToolchain));

        let fixture = tar_gz_with(&[
            ("main.tf", b"# tf\n" as &[u8]),
            (
                "module-publisher.json",
                br#"{"repo_clone_url_template": "https://git.example.com/{namespace}/{unknown}.git"}"#,
            ),
        ]);
        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.tar.gz",
                fixture,
            ))))
            .await;

        match result {
            Err(ExtractError::InvalidRepositoryUrlTemplate { field, .. }) => {
                assert_eq!(field, "repo_clone_url_template");
            }
            other => panic!("expected template error, got {:?}", other.map(|r| r.version)),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_worker_limit_of_one_still_extracts_every_child() {
        let config = ExtractorConfig {
            worker_limit: 1,
            ..Default::default()
        };
        let (publisher, _store, _storage_dir) = publisher(config, Arc::new(StubToolchain));

        let result = publisher
            .publish(request(PublishSource::Upload(UploadedArchive::new(
                "network.tar.gz",
                module_fixture(),
            ))))
            .await
            .unwrap();

        assert_eq!(result.submodules.len(), 2);
        assert_eq!(result.examples.len(), 1);
    }
}
