//! Module Publisher CLI
//!
//! Terraform module version extraction and publishing pipeline

use anyhow::Result;
use clap::{Parser, Subcommand};
use module_publisher::core::config::{ConfigLoader, ExtractorConfig};
use module_publisher::core::metadata::{ExtractionResult, ModuleContext, ModuleKey};
use module_publisher::orchestration::{MetadataExtractor, discover_children};
use module_publisher::{
    CliToolchain, CostCredentials, LocalFileStorage, MemoryCatalogStore, ModulePublisher,
    PublishRequest, PublishSource, UploadedArchive,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// Terraform module version extraction and publishing pipeline
#[derive(Parser)]
#[command(name = "module-publisher")]
#[command(version = "0.1.0")]
#[command(about = "Terraform module version extraction and publishing pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and publish one module version
    Publish {
        /// Module namespace
        #[arg(value_name = "NAMESPACE")]
        namespace: String,

        /// Module name
        #[arg(value_name = "MODULE")]
        module: String,

        /// Provider name
        #[arg(value_name = "PROVIDER")]
        provider: String,

        /// Semantic version to publish
        #[arg(value_name = "VERSION")]
        version: String,

        /// Publish from a local archive file instead of cloning the repository
        #[arg(long, value_name = "FILE")]
        archive: Option<PathBuf>,

        /// Project directory holding .module-publisher.yaml
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Local directory generated archives are stored under
        #[arg(long, default_value = "storage", value_name = "DIR")]
        storage_dir: PathBuf,

        /// Print the full extraction result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the analysis tools against a local module directory
    Analyze {
        /// Module directory (defaults to current directory)
        #[arg(value_name = "MODULE_PATH")]
        module_path: Option<PathBuf>,

        /// Project directory holding .module-publisher.yaml
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Print the extracted metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the project configuration
    Check {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            namespace,
            module,
            provider,
            version,
            archive,
            project,
            storage_dir,
            json,
        } => {
            let key = ModuleKey::new(&namespace, &module, &provider);
            publish_command(key, version, archive, project, storage_dir, json).await
        }
        Commands::Analyze {
            module_path,
            project,
            json,
        } => {
            let path = module_path.unwrap_or_else(|| PathBuf::from("."));
            analyze_command(path, project, json).await
        }
        Commands::Check { project_path } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            check_command(path).await
        }
    }
}

async fn publish_command(
    key: ModuleKey,
    version: String,
    archive: Option<PathBuf>,
    project: PathBuf,
    storage_dir: PathBuf,
    json: bool,
) -> Result<i32> {
    println!("\n📦 module-publisher\n");

    let version = semver::Version::parse(&version)
        .map_err(|e| anyhow::anyhow!("バージョン {} を解釈できません: {}", version, e))?;
    let config = ConfigLoader::load(&project).await?;

    let source = match archive {
        Some(path) => {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let data = tokio::fs::read(&path).await?;
            println!("📤 Uploading archive: {} ({} bytes)", filename, data.len());
            PublishSource::Upload(UploadedArchive::new(filename, data))
        }
        None => {
            println!("🔀 Cloning from the configured repository");
            PublishSource::Git
        }
    };

    let publisher = build_publisher(&config, &storage_dir);
    let request = PublishRequest {
        module: key,
        version,
        repository: None,
        source,
    };

    match publisher.publish(request).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result_summary(&result);
            }
            println!("\n✅ Publishing completed successfully!");
            Ok(0)
        }
        Err(e) => {
            eprintln!("\n❌ Publishing failed [{}]: {}", e.code(), e);
            for action in e.suggested_actions() {
                eprintln!("  💡 {}", action);
            }
            Ok(1)
        }
    }
}

fn build_publisher(config: &ExtractorConfig, storage_dir: &Path) -> ModulePublisher {
    let toolchain = CliToolchain::from_config(config, CostCredentials::from_env());
    ModulePublisher::new(
        config.clone(),
        Arc::new(toolchain),
        Arc::new(LocalFileStorage::new(storage_dir)),
        Arc::new(MemoryCatalogStore::new()),
    )
}

fn print_result_summary(result: &ExtractionResult) {
    println!("  Module:     {}", result.module);
    println!("  Version:    {}", result.version);
    if let Some(description) = &result.description {
        println!("  Description: {}", description);
    }
    if let Some(owner) = &result.owner {
        println!("  Owner:      {}", owner);
    }
    println!("  Variables:  {}", result.variable_template.len());
    println!("  Submodules: {}", result.submodules.len());
    println!("  Examples:   {}", result.examples.len());

    let failures = result.root.security_failures();
    if failures.is_empty() {
        println!("  🟢 Security: no failed checks");
    } else {
        println!("  🔴 Security: {} failed checks", failures.len());
        for finding in failures {
            println!("     - [{}] {}", finding.severity, finding.rule_id);
        }
    }

    for artifact in &result.artifacts {
        println!(
            "  💾 {} ({} bytes, sha256:{})",
            artifact.storage_path, artifact.size_bytes, artifact.sha256
        );
    }

    if result.previous_version_published {
        println!("  ⚠️  Replaced a published version; re-approval is required");
    }
    println!("  ⏱️  Completed in {} ms ({})", result.duration_ms, result.run_id);
}

async fn analyze_command(module_path: PathBuf, project: PathBuf, json: bool) -> Result<i32> {
    println!("\n🔍 Module Analysis\n");

    let config = ConfigLoader::load(&project).await?;
    let toolchain = CliToolchain::from_config(&config, CostCredentials::from_env());
    let extractor = MetadataExtractor::new(Arc::new(toolchain));

    let metadata = extractor
        .extract_context(&module_path, &ModuleContext::Root)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(0);
    }

    println!("  Inputs:    {}", metadata.docs.inputs.len());
    println!("  Outputs:   {}", metadata.docs.outputs.len());
    println!("  Providers: {}", metadata.docs.providers.len());
    println!("  Resources: {}", metadata.docs.resources.len());
    println!("  Module calls: {}", metadata.module_calls.len());
    if let Some(facts) = &metadata.version_facts {
        println!("  Terraform: {} ({})", facts.terraform_version, facts.platform);
    }
    if metadata.cost_estimate.is_some() {
        println!("  💰 Cost estimate available");
    }

    let failures = metadata.security_failures();
    if failures.is_empty() {
        println!("  🟢 Security: no failed checks");
    } else {
        println!("  🔴 Security: {} failed checks", failures.len());
        for finding in failures {
            println!("     - [{}] {} {}", finding.severity, finding.rule_id, finding.rule_description);
        }
    }

    let children = discover_children(&module_path)?;
    if !children.is_empty() {
        println!("\n  Detected child contexts:");
        for child in &children {
            println!("    - {}", child);
        }
    }

    println!();
    Ok(0)
}

async fn check_command(project_path: PathBuf) -> Result<i32> {
    println!("\n🔍 Configuration Check\n");

    let config = ConfigLoader::load(&project_path).await?;
    let result = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&result));

    println!(
        "\n  Tools: terraform={} terraform-docs={} tfsec={} infracost={}",
        config.tools.terraform,
        config.tools.terraform_docs,
        config.tools.tfsec,
        config.tools.infracost
    );
    println!("  Worker limit: {}", config.worker_limit);
    println!("  Tool timeout: {}s", config.tool_timeout_secs);
    let credentials = CostCredentials::from_env();
    if credentials.is_configured() {
        println!("  Cost API key: {}", credentials.masked());
    } else {
        println!("  Cost API key: not configured (estimation disabled)");
    }

    println!();
    Ok(if result.valid { 0 } else { 1 })
}
