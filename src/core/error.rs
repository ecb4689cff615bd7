//! Error handling for module version extraction
//!
//! This module provides comprehensive error types with recovery guidance
//! using the thiserror crate for ergonomic error handling.

use thiserror::Error;

/// Failure category used by the invoking layer for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network/git failures while obtaining source
    Acquisition,
    /// Unsafe or unreadable archive content
    Integrity,
    /// External analysis tool failures
    Tooling,
    /// Manifest/template policy violations
    Policy,
    /// Storage, catalog or pipeline plumbing failures
    Internal,
}

/// Main error type for module version extraction operations
#[derive(Error, Debug)]
pub enum ExtractError {
    // Acquisition errors
    #[error("アップロードされたファイル形式に対応していません: {filename}")]
    UnknownFiletype { filename: String },

    #[error("gitクローンに失敗しました: {message}")]
    GitClone { message: String },

    #[error("クローンURLが設定されていません（モジュールプロバイダーまたはgitプロバイダーに設定してください）")]
    MissingCloneUrl,

    // Integrity errors
    #[error("アーカイブ内のパスが展開先ディレクトリの外を指しています: {path}")]
    PathIsNotWithinBaseDirectory { path: String },

    #[error("アーカイブを読み込めません: {message}")]
    UnreadableArchive { message: String },

    // Tooling errors
    #[error("Terraformモジュールを処理できません: {message}")]
    UnableToProcessTerraform { message: String },

    #[error("セキュリティスキャン結果の形式が不正です: {message}")]
    InvalidSecurityScanResult { message: String },

    // Policy errors
    #[error("メタデータファイルを解析できません: {message}")]
    InvalidMetadataFile { message: String },

    #[error("メタデータに必須属性がありません: {attribute}")]
    MetadataDoesNotContainRequiredAttribute { attribute: String },

    #[error("タグフォーマットに{{version}}プレースホルダがありません: {tag_format}")]
    InvalidGitTagFormat { tag_format: String },

    #[error("リポジトリURLテンプレートが不正です（{field}）: {message}")]
    InvalidRepositoryUrlTemplate { field: String, message: String },

    #[error("設定ファイルを読み込めません: {message}")]
    Config { message: String },

    // Internal errors
    #[error("作業ディレクトリの操作に失敗しました: {message}")]
    Filesystem { message: String },

    #[error("アーカイブの保存に失敗しました: {message}")]
    ArchiveStorage { message: String },

    #[error("カタログへのコミットに失敗しました: {message}")]
    CatalogCommit { message: String },

    #[error("不正な状態遷移です: {from} から {to}")]
    IllegalStateTransition { from: String, to: String },
}

impl ExtractError {
    /// Get the failure category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownFiletype { .. } | Self::GitClone { .. } | Self::MissingCloneUrl => {
                ErrorCategory::Acquisition
            }
            Self::PathIsNotWithinBaseDirectory { .. } | Self::UnreadableArchive { .. } => {
                ErrorCategory::Integrity
            }
            Self::UnableToProcessTerraform { .. } | Self::InvalidSecurityScanResult { .. } => {
                ErrorCategory::Tooling
            }
            Self::InvalidMetadataFile { .. }
            | Self::MetadataDoesNotContainRequiredAttribute { .. }
            | Self::InvalidGitTagFormat { .. }
            | Self::InvalidRepositoryUrlTemplate { .. }
            | Self::Config { .. } => ErrorCategory::Policy,
            Self::Filesystem { .. }
            | Self::ArchiveStorage { .. }
            | Self::CatalogCommit { .. }
            | Self::IllegalStateTransition { .. } => ErrorCategory::Internal,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::UnknownFiletype { .. } => vec![
                "tar.gz / tgz / zip のいずれかの形式でアップロードしてください",
                "ファイル名の拡張子を確認してください",
            ],
            Self::GitClone { .. } => vec![
                "クローンURLとタグが存在するか確認してください",
                "SSH鍵またはアクセストークンの設定を確認してください",
            ],
            Self::MissingCloneUrl => vec![
                "モジュールプロバイダーにclone URLテンプレートを設定してください",
                "共有gitプロバイダーを関連付けてください",
            ],
            Self::PathIsNotWithinBaseDirectory { .. } => vec![
                "アーカイブの作成元を確認してください",
                "相対パス（../）や絶対パスを含むエントリは受け付けられません",
            ],
            Self::UnreadableArchive { .. } => {
                vec!["アーカイブが破損していないか確認してください"]
            }
            Self::UnableToProcessTerraform { .. } => vec![
                "terraform validateがローカルで成功するか確認してください",
                "解析ツールのバージョンを確認してください",
            ],
            Self::InvalidSecurityScanResult { .. } => {
                vec!["セキュリティスキャナーのバージョンを確認してください"]
            }
            Self::InvalidMetadataFile { .. } => {
                vec!["メタデータファイルが有効なJSONか確認してください"]
            }
            Self::MetadataDoesNotContainRequiredAttribute { .. } => {
                vec!["メタデータファイルに必須属性を追加してください"]
            }
            Self::InvalidGitTagFormat { .. } => {
                vec!["タグフォーマットに{version}を含めてください（例: v{version}）"]
            }
            Self::InvalidRepositoryUrlTemplate { .. } => vec![
                "テンプレートのプレースホルダを確認してください",
                "URLにスキーム（ssh:// https:// など）を含めてください",
            ],
            Self::Config { .. } => vec![
                ".module-publisher.yaml の構文を確認してください",
            ],
            Self::Filesystem { .. } => {
                vec!["一時ディレクトリの空き容量と権限を確認してください"]
            }
            Self::ArchiveStorage { .. } => {
                vec!["ストレージバックエンドの設定と権限を確認してください"]
            }
            Self::CatalogCommit { .. } => vec![
                "カタログストアへの接続を確認してください",
                "同一バージョンへの同時公開が行われていないか確認してください",
            ],
            Self::IllegalStateTransition { .. } => {
                vec!["再実行してください（パイプライン内部の不整合です）"]
            }
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFiletype { .. } => "UNKNOWN_FILETYPE",
            Self::GitClone { .. } => "GIT_CLONE_ERROR",
            Self::MissingCloneUrl => "MISSING_CLONE_URL",
            Self::PathIsNotWithinBaseDirectory { .. } => "PATH_IS_NOT_WITHIN_BASE_DIRECTORY",
            Self::UnreadableArchive { .. } => "UNREADABLE_ARCHIVE",
            Self::UnableToProcessTerraform { .. } => "UNABLE_TO_PROCESS_TERRAFORM",
            Self::InvalidSecurityScanResult { .. } => "INVALID_SECURITY_SCAN_RESULT",
            Self::InvalidMetadataFile { .. } => "INVALID_METADATA_FILE",
            Self::MetadataDoesNotContainRequiredAttribute { .. } => {
                "METADATA_DOES_NOT_CONTAIN_REQUIRED_ATTRIBUTE"
            }
            Self::InvalidGitTagFormat { .. } => "INVALID_GIT_TAG_FORMAT",
            Self::InvalidRepositoryUrlTemplate { .. } => "INVALID_REPOSITORY_URL_TEMPLATE",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Filesystem { .. } => "FILESYSTEM_ERROR",
            Self::ArchiveStorage { .. } => "ARCHIVE_STORAGE_ERROR",
            Self::CatalogCommit { .. } => "CATALOG_COMMIT_ERROR",
            Self::IllegalStateTransition { .. } => "ILLEGAL_STATE_TRANSITION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_filetype_error() {
        let error = ExtractError::UnknownFiletype {
            filename: "module.rar".to_string(),
        };

        assert_eq!(error.code(), "UNKNOWN_FILETYPE");
        assert_eq!(error.category(), ErrorCategory::Acquisition);
        assert!(error.to_string().contains("module.rar"));
        assert!(error.suggested_actions().len() > 0);
    }

    #[test]
    fn test_git_clone_error_with_message() {
        let error = ExtractError::GitClone {
            message: "fatal: Remote branch v9.9.9 not found".to_string(),
        };

        assert_eq!(error.code(), "GIT_CLONE_ERROR");
        assert_eq!(error.category(), ErrorCategory::Acquisition);
        let display = error.to_string();
        assert!(display.contains("fatal: Remote branch v9.9.9 not found"));
    }

    #[test]
    fn test_path_is_not_within_base_directory_error() {
        let error = ExtractError::PathIsNotWithinBaseDirectory {
            path: "../../etc/passwd".to_string(),
        };

        assert_eq!(error.code(), "PATH_IS_NOT_WITHIN_BASE_DIRECTORY");
        assert_eq!(error.category(), ErrorCategory::Integrity);
        assert!(error.to_string().contains("../../etc/passwd"));
    }

    #[test]
    fn test_unable_to_process_terraform_error() {
        let error = ExtractError::UnableToProcessTerraform {
            message: "terraform-docs exited with status 1".to_string(),
        };

        assert_eq!(error.code(), "UNABLE_TO_PROCESS_TERRAFORM");
        assert_eq!(error.category(), ErrorCategory::Tooling);
    }

    #[test]
    fn test_invalid_metadata_file_error() {
        let error = ExtractError::InvalidMetadataFile {
            message: "expected value at line 1 column 2".to_string(),
        };

        assert_eq!(error.code(), "INVALID_METADATA_FILE");
        assert_eq!(error.category(), ErrorCategory::Policy);
    }

    #[test]
    fn test_missing_required_attribute_error() {
        let error = ExtractError::MetadataDoesNotContainRequiredAttribute {
            attribute: "owner".to_string(),
        };

        assert_eq!(
            error.code(),
            "METADATA_DOES_NOT_CONTAIN_REQUIRED_ATTRIBUTE"
        );
        assert_eq!(error.category(), ErrorCategory::Policy);
        assert!(error.to_string().contains("owner"));
    }

    #[test]
    fn test_invalid_git_tag_format_error() {
        let error = ExtractError::InvalidGitTagFormat {
            tag_format: "release".to_string(),
        };

        assert_eq!(error.code(), "INVALID_GIT_TAG_FORMAT");
        assert_eq!(error.category(), ErrorCategory::Policy);
        let actions = error.suggested_actions();
        assert!(actions.iter().any(|&a| a.contains("{version}")));
    }

    #[test]
    fn test_catalog_commit_error() {
        let error = ExtractError::CatalogCommit {
            message: "connection reset".to_string(),
        };

        assert_eq!(error.code(), "CATALOG_COMMIT_ERROR");
        assert_eq!(error.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_illegal_state_transition_error() {
        let error = ExtractError::IllegalStateTransition {
            from: "Acquiring".to_string(),
            to: "Committing".to_string(),
        };

        assert_eq!(error.code(), "ILLEGAL_STATE_TRANSITION");
        assert_eq!(error.category(), ErrorCategory::Internal);
        let display = error.to_string();
        assert!(display.contains("Acquiring"));
        assert!(display.contains("Committing"));
    }

    #[test]
    fn test_error_display_japanese() {
        let error = ExtractError::MissingCloneUrl;
        let display = format!("{}", error);
        assert!(display.contains("クローンURL"));
    }
}
