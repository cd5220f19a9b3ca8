//! Meanings compiler.
//!
//! Folds a decoded token sequence into a single [`CompiledFileRecord`]:
//! platform attributes, container chain, templated filename and the program
//! the file belongs to. Two tokens disagreeing on an attribute make the whole
//! file unclassifiable.

use relscan_schema::{
    ContainerKind, DecodedToken, TAG_PLACEHOLDER, TokenKind, TokenMeaning, VERSION_PLACEHOLDER,
    join_chain,
};
use thiserror::Error;

use crate::archive::ArchiveMember;
use crate::resource::LocalResource;
use crate::source::ReleaseAsset;

/// Errors raised while compiling a token sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Two tokens set the same attribute to different values.
    #[error("conflicting {attribute}: {existing} vs {incoming}")]
    Conflict {
        /// Attribute name (`keyword`, `os` or `toolchain`).
        attribute: &'static str,
        /// Value already held.
        existing: String,
        /// Value the offending token tried to set.
        incoming: String,
    },
}

/// Handle of a record stored in a [`RecordArena`](crate::classify::RecordArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A file before decoding: a release asset or an extracted archive member.
#[derive(Debug, Clone)]
pub struct RawFile {
    /// Filename without directories.
    pub name: String,
    /// Directory inside the enclosing archive, empty for release assets.
    pub directory: String,
    /// Full path inside the enclosing archive.
    pub archive_path: Option<String>,
    /// Executable bit from the archive entry.
    pub is_executable: bool,
    /// Release asset the bytes ultimately come from.
    pub asset: ReleaseAsset,
    /// Enclosing archive.
    pub container: Option<RecordId>,
    /// Local copy, if already materialized.
    pub resource: Option<LocalResource>,
}

impl RawFile {
    /// A top-level release asset.
    pub fn from_asset(asset: ReleaseAsset) -> Self {
        Self {
            name: asset.name.clone(),
            directory: String::new(),
            archive_path: None,
            is_executable: false,
            asset,
            container: None,
            resource: None,
        }
    }

    /// A member extracted from the archive `container`.
    pub fn from_member(container: RecordId, asset: &ReleaseAsset, member: ArchiveMember) -> Self {
        Self {
            name: member.name,
            directory: member.directory,
            archive_path: Some(member.path),
            is_executable: member.is_executable,
            asset: asset.clone(),
            container: Some(container),
            resource: Some(member.resource),
        }
    }
}

/// Everything learned about one file.
#[derive(Debug, Clone)]
pub struct CompiledFileRecord {
    /// Filename as published.
    pub filename: String,
    /// Filename with version and tag replaced by placeholders.
    pub templated_filename: String,
    /// Name to install the file under.
    pub installed_name: String,
    /// Program the file belongs to.
    pub program_name: Option<String>,
    /// Architecture keyword, e.g. `~amd64`.
    pub keyword: Option<String>,
    /// The keyword was filled in by default rather than read from a token.
    pub keyword_defaulted: bool,
    /// Operating system.
    pub os: Option<String>,
    /// Toolchain.
    pub toolchain: Option<String>,
    /// Container chain, outer to inner.
    pub containers: Vec<ContainerKind>,
    /// A version token was present.
    pub has_version: bool,
    /// A tag token was present.
    pub has_tag: bool,
    /// The project name token was present.
    pub has_project_name: bool,
    /// Free text that could not be attributed.
    pub unmatched: Vec<String>,
    /// Executable bit from the archive entry.
    pub is_executable: bool,
    /// Candidate for the binary bucket.
    pub is_binary: bool,
    /// Documentation file.
    pub is_document: bool,
    /// Installer.
    pub is_installer: bool,
    /// `AppImage` bundle.
    pub is_app_image: bool,
    /// Manual page section.
    pub manual_page: Option<u8>,
    /// Shell the file is for.
    pub shell: Option<String>,
    /// Shell completion script.
    pub is_shell_completion: bool,
    /// Full path inside the enclosing archive.
    pub archive_path: Option<String>,
    /// Enclosing archive.
    pub container: Option<RecordId>,
    /// Release asset the bytes ultimately come from.
    pub asset: ReleaseAsset,
    /// Local copy, if materialized.
    pub resource: Option<LocalResource>,
}

impl CompiledFileRecord {
    fn seed(file: RawFile) -> Self {
        Self {
            filename: file.name,
            templated_filename: String::new(),
            installed_name: String::new(),
            program_name: None,
            keyword: None,
            keyword_defaulted: false,
            os: None,
            toolchain: None,
            containers: Vec::new(),
            has_version: false,
            has_tag: false,
            has_project_name: false,
            unmatched: Vec::new(),
            is_executable: file.is_executable,
            is_binary: file.is_executable,
            is_document: false,
            is_installer: false,
            is_app_image: false,
            manual_page: None,
            shell: None,
            is_shell_completion: false,
            archive_path: file.archive_path,
            container: file.container,
            asset: file.asset,
            resource: file.resource,
        }
    }

    fn inherit(&mut self, parent: &CompiledFileRecord) {
        // Only a container named after the project passes its program on;
        // otherwise the member's own name decides.
        if parent.has_project_name {
            self.unmatched.clone_from(&parent.unmatched);
            self.program_name.clone_from(&parent.program_name);
        }
        if self.keyword.is_none() {
            self.keyword.clone_from(&parent.keyword);
            self.keyword_defaulted = parent.keyword_defaulted;
        }
        if self.os.is_none() {
            self.os.clone_from(&parent.os);
        }
        if self.toolchain.is_none() {
            self.toolchain.clone_from(&parent.toolchain);
        }
    }

    fn absorb(&mut self, meaning: &TokenMeaning) -> Result<(), CompileError> {
        if let Some(keyword) = &meaning.keyword {
            match &self.keyword {
                Some(existing) if existing != keyword && !self.keyword_defaulted => {
                    return Err(conflict("keyword", existing, keyword));
                }
                _ => {
                    self.keyword = Some(keyword.clone());
                    self.keyword_defaulted = false;
                }
            }
        }
        merge_attribute("os", &mut self.os, meaning.os.as_ref())?;
        merge_attribute("toolchain", &mut self.toolchain, meaning.toolchain.as_ref())?;

        self.has_version |= meaning.version;
        self.has_tag |= meaning.tag;
        self.has_project_name |= meaning.project_name;
        self.is_installer |= meaning.installer;
        self.is_document |= meaning.document;
        self.is_shell_completion |= meaning.shell_completion;
        self.is_app_image |= meaning.app_image;
        if meaning.manual_page.is_some() {
            self.manual_page = meaning.manual_page;
        }
        if meaning.shell.is_some() {
            self.shell.clone_from(&meaning.shell);
        }
        Ok(())
    }

    fn take_unmatched(&mut self, text: &str, suffix_only: bool) {
        match &self.program_name {
            Some(name) if name == text => {}
            Some(_) => self.unmatched.push(text.to_string()),
            None if suffix_only => self.unmatched.push(text.to_string()),
            None => self.program_name = Some(text.to_string()),
        }
    }

    /// Whether the container chain includes a multi-file archive.
    pub fn is_archive(&self) -> bool {
        self.containers.iter().any(|kind| kind.is_archive())
    }

    /// Installed name without the compression extensions, e.g. `hugo.1`
    /// for `hugo.1.gz`.
    pub fn installed_name_without_containers(&self) -> &str {
        if self.containers.is_empty() {
            return &self.installed_name;
        }
        let suffix = format!(".{}", join_chain(&self.containers));
        self.installed_name
            .strip_suffix(&suffix)
            .unwrap_or(&self.installed_name)
    }
}

fn conflict(attribute: &'static str, existing: &str, incoming: &str) -> CompileError {
    CompileError::Conflict {
        attribute,
        existing: existing.to_string(),
        incoming: incoming.to_string(),
    }
}

fn merge_attribute(
    attribute: &'static str,
    slot: &mut Option<String>,
    incoming: Option<&String>,
) -> Result<(), CompileError> {
    let Some(incoming) = incoming else {
        return Ok(());
    };
    match slot {
        Some(existing) if existing != incoming => Err(conflict(attribute, existing, incoming)),
        Some(_) => Ok(()),
        None => {
            *slot = Some(incoming.clone());
            Ok(())
        }
    }
}

/// Compile `tokens` for `file`, inheriting from the enclosing `container`.
///
/// Folder tokens contribute attributes but no text, no containers and no
/// program name.
///
/// # Errors
///
/// Returns [`CompileError::Conflict`] if two tokens (or a token and an
/// inherited value) disagree on the keyword, OS or toolchain. A keyword
/// that was only defaulted can be replaced.
pub fn compile(
    tokens: &[DecodedToken],
    file: RawFile,
    container: Option<&CompiledFileRecord>,
) -> Result<CompiledFileRecord, CompileError> {
    let mut record = CompiledFileRecord::seed(file);
    if let Some(parent) = container {
        record.inherit(parent);
    }

    let mut templated = String::new();
    let mut project_text: Option<&str> = None;
    let mut simple = true;

    for token in tokens {
        match &token.kind {
            TokenKind::Separator => {
                if !token.folder {
                    templated.push_str(&token.captured);
                }
            }
            TokenKind::Unmatched { suffix_only } => {
                if !token.folder {
                    templated.push_str(&token.captured);
                    record.take_unmatched(&token.captured, *suffix_only);
                }
            }
            TokenKind::Matched(meaning) => {
                if !token.folder {
                    if meaning.version {
                        templated.push_str(VERSION_PLACEHOLDER);
                    } else if meaning.tag {
                        templated.push_str(TAG_PLACEHOLDER);
                    } else {
                        templated.push_str(&token.captured);
                        if meaning.project_name {
                            project_text = Some(&token.captured);
                        } else {
                            simple = false;
                        }
                    }
                    if let Some(kind) = meaning.container {
                        record.containers.push(kind);
                    }
                }
                record.absorb(meaning)?;
            }
        }
    }

    if record.program_name.is_none() {
        record.program_name = project_text.map(str::to_string);
    }

    record.installed_name = match &record.program_name {
        Some(program)
            if !simple
                && record.manual_page.is_none()
                && !record.is_document
                && !record.is_shell_completion =>
        {
            program.clone()
        }
        _ => templated.clone(),
    };
    record.templated_filename = templated;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode, decode_directory};
    use crate::dictionary::Dictionary;

    fn dict() -> Dictionary {
        Dictionary::for_release("hugo", &["0.120.0".to_string()], &["v0.120.0".to_string()])
    }

    fn asset(name: &str) -> RawFile {
        RawFile::from_asset(ReleaseAsset::new(name, format!("memory://{name}")))
    }

    fn compile_name(name: &str) -> Result<CompiledFileRecord, CompileError> {
        compile(&decode(&dict(), name), asset(name), None)
    }

    fn member(directory: &str, name: &str, executable: bool) -> RawFile {
        let mut file = asset(name);
        file.directory = directory.to_string();
        file.archive_path = Some(format!("{directory}{name}"));
        file.is_executable = executable;
        file.container = Some(RecordId(0));
        file
    }

    fn compile_member(
        parent: &CompiledFileRecord,
        directory: &str,
        name: &str,
    ) -> Result<CompiledFileRecord, CompileError> {
        let d = dict();
        let mut tokens = decode_directory(&d, directory);
        tokens.extend(decode(&d, name));
        compile(&tokens, member(directory, name, true), Some(parent))
    }

    #[test]
    fn test_compile_appimage() {
        let d = Dictionary::for_release("jan", &["0.5.1".to_string()], &["v0.5.1".to_string()]);
        let name = "jan-linux-x86_64-0.5.1.AppImage";
        let record = compile(&decode(&d, name), asset(name), None).unwrap();
        assert_eq!(record.keyword.as_deref(), Some("~amd64"));
        assert_eq!(record.os.as_deref(), Some("linux"));
        assert_eq!(record.templated_filename, "jan-linux-x86_64-${VERSION}.AppImage");
        assert!(record.is_app_image);
        assert!(record.has_version && record.has_project_name);
        assert_eq!(record.program_name.as_deref(), Some("jan"));
        assert!(record.unmatched.is_empty());
    }

    #[test]
    fn test_compile_leftover_after_suffix() {
        let d = Dictionary::for_release("go-appimage", &["0".to_string()], &["v0".to_string()]);
        let name = "appimaged-838-aarch64.AppImage.zsync";
        let record = compile(&decode(&d, name), asset(name), None).unwrap();
        assert_eq!(record.program_name.as_deref(), Some("appimaged-838"));
        assert_eq!(record.unmatched, vec!["zsync"]);
    }

    #[test]
    fn test_compile_archive_name() {
        let record = compile_name("hugo_extended_0.120.0_Linux-64bit.tar.gz").unwrap();
        assert_eq!(record.program_name.as_deref(), Some("extended"));
        assert_eq!(record.containers, vec![ContainerKind::Tar, ContainerKind::Gz]);
        assert_eq!(record.keyword.as_deref(), Some("~amd64"));
        assert_eq!(record.os.as_deref(), Some("linux"));
        assert_eq!(
            record.templated_filename,
            "hugo_extended_${VERSION}_Linux-64bit.tar.gz"
        );
        assert_eq!(record.installed_name, "extended");
        assert!(record.is_archive());
    }

    #[test]
    fn test_compile_second_unmatched_is_leftover() {
        let record = compile_name("beta-linux-gamma").unwrap();
        assert_eq!(record.program_name.as_deref(), Some("beta"));
        assert_eq!(record.unmatched, vec!["gamma"]);
    }

    #[test]
    fn test_conflict_in_either_order() {
        for name in ["tool_linux_windows", "tool_windows_linux"] {
            let err = compile_name(name).unwrap_err();
            assert!(matches!(err, CompileError::Conflict { attribute: "os", .. }));
        }
        for name in ["tool_arm64_amd64", "tool_amd64_arm64"] {
            let err = compile_name(name).unwrap_err();
            assert!(matches!(err, CompileError::Conflict { attribute: "keyword", .. }));
        }
        for name in ["tool_musl_msvc", "tool_msvc_musl"] {
            assert!(compile_name(name).is_err());
        }
    }

    #[test]
    fn test_agreeing_tokens_do_not_conflict() {
        let record = compile_name("tool-x86_64-unknown-linux-gnu-linux").unwrap();
        assert_eq!(record.toolchain.as_deref(), Some("gnu"));
    }

    #[test]
    fn test_member_inherits_from_project_container() {
        let parent = compile_name("hugo_extended_0.120.0_Linux-64bit.tar.gz").unwrap();
        let child = compile_member(&parent, "", "hugo").unwrap();
        assert_eq!(child.program_name.as_deref(), Some("extended"));
        assert_eq!(child.keyword.as_deref(), Some("~amd64"));
        assert_eq!(child.os.as_deref(), Some("linux"));
        assert_eq!(child.installed_name, "hugo");
        assert!(child.is_binary);
        assert!(child.unmatched.is_empty());
    }

    #[test]
    fn test_member_conflicting_with_container() {
        let parent = compile_name("hugo_0.120.0_linux-amd64.tar.gz").unwrap();
        let err = compile_member(&parent, "", "hugo-arm64").unwrap_err();
        assert!(matches!(err, CompileError::Conflict { attribute: "keyword", .. }));
    }

    #[test]
    fn test_defaulted_keyword_can_be_replaced() {
        let mut parent = compile_name("hugo_0.120.0_linux.tar.gz").unwrap();
        parent.keyword = Some("~amd64".to_string());
        parent.keyword_defaulted = true;
        let child = compile_member(&parent, "", "hugo-arm64").unwrap();
        assert_eq!(child.keyword.as_deref(), Some("~arm64"));
        assert!(!child.keyword_defaulted);
    }

    #[test]
    fn test_folder_tokens_add_attributes_only() {
        let parent = compile_name("hugo_0.120.0_linux-amd64.tar.gz").unwrap();
        let child = compile_member(&parent, "share/completions/", "hugo.bash").unwrap();
        assert!(child.is_shell_completion);
        assert_eq!(child.shell.as_deref(), Some("bash"));
        // Neither `share` nor the folder text leaks into names.
        assert_eq!(child.templated_filename, "hugo.bash");
        assert_eq!(child.installed_name, "hugo.bash");
        assert!(child.unmatched.is_empty());
    }

    #[test]
    fn test_manual_page_keeps_templated_name() {
        let record = compile_name("hugo.1.gz").unwrap();
        assert_eq!(record.manual_page, Some(1));
        assert_eq!(record.installed_name, "hugo.1.gz");
        assert_eq!(record.installed_name_without_containers(), "hugo.1");
        assert!(!record.is_archive());
    }

    #[test]
    fn test_installed_name_for_non_simple_binary() {
        let record = compile_name("tool-linux-amd64").unwrap();
        assert_eq!(record.program_name.as_deref(), Some("tool"));
        assert_eq!(record.installed_name, "tool");

        let record = compile_name("hugo-0.120.0").unwrap();
        assert_eq!(record.installed_name, "hugo-${VERSION}");
    }
}
