//! File classification engine.
//!
//! Every file of a scope is decoded, compiled and sorted into one bucket of
//! a [`ClassificationTree`]. When a scope holds archives but no binaries,
//! the archives are opened and their members classified as a nested scope.
//! Finally, if nothing anywhere was recognised as a binary, the ambiguous
//! candidates are probed for an ELF header.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use goblin::Object;
use relscan_schema::TokenKind;
use tracing::{debug, info};

use crate::archive::{ContainerFormat, extract_members};
use crate::compile::{CompiledFileRecord, RawFile, RecordId, compile};
use crate::config::ScanConfig;
use crate::decode::{decode, decode_directory};
use crate::dictionary::Dictionary;
use crate::error::ScanError;
use crate::resource::LocalResource;
use crate::source::{AssetSource, ReleaseAsset, SourceError};

/// Owns every record produced by one classification run.
///
/// Records refer to their enclosing archive by [`RecordId`], so a container
/// can give up its local copy while its members are still in use.
#[derive(Debug, Default)]
pub struct RecordArena {
    records: Vec<CompiledFileRecord>,
}

impl RecordArena {
    /// An empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record and return its handle.
    pub fn push(&mut self, record: CompiledFileRecord) -> RecordId {
        self.records.push(record);
        RecordId(self.records.len() - 1)
    }

    /// Record behind `id`, if any.
    pub fn get(&self, id: RecordId) -> Option<&CompiledFileRecord> {
        self.records.get(id.0)
    }

    /// Mutable record behind `id`, if any.
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut CompiledFileRecord> {
        self.records.get_mut(id.0)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record with its handle, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &CompiledFileRecord)> {
        self.records.iter().enumerate().map(|(i, r)| (RecordId(i), r))
    }

    /// The outermost enclosing archive of `id`, or `id` itself.
    pub fn outermost(&self, id: RecordId) -> RecordId {
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|r| r.container) {
            current = parent;
        }
        current
    }
}

impl Index<RecordId> for RecordArena {
    type Output = CompiledFileRecord;

    fn index(&self, id: RecordId) -> &Self::Output {
        &self.records[id.0]
    }
}

/// Bucket a classified file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Executable program.
    Binary,
    /// Archive to search for binaries.
    CompressedArchive,
    /// Documentation.
    Document,
    /// Manual page.
    ManualPage,
    /// Shell completion script.
    ShellCompletion,
    /// Unknown role, possibly a binary.
    Ambiguous,
}

impl FileClass {
    /// Lowercase name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::CompressedArchive => "archive",
            Self::Document => "document",
            Self::ManualPage => "manual_page",
            Self::ShellCompletion => "shell_completion",
            Self::Ambiguous => "ambiguous",
        }
    }
}

/// Classified files of one scope, plus the scopes of opened archives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationTree {
    /// Executables.
    pub binaries: Vec<RecordId>,
    /// Archives.
    pub archives: Vec<RecordId>,
    /// Documents.
    pub documents: Vec<RecordId>,
    /// Manual pages.
    pub manual_pages: Vec<RecordId>,
    /// Shell completion scripts.
    pub shell_completions: Vec<RecordId>,
    /// Files whose role is unknown.
    pub ambiguous: Vec<RecordId>,
    /// Scope of each opened archive.
    pub nested: BTreeMap<RecordId, ClassificationTree>,
}

impl ClassificationTree {
    /// Add a record to the bucket for `class`.
    pub fn insert(&mut self, class: FileClass, id: RecordId) {
        let bucket = match class {
            FileClass::Binary => &mut self.binaries,
            FileClass::CompressedArchive => &mut self.archives,
            FileClass::Document => &mut self.documents,
            FileClass::ManualPage => &mut self.manual_pages,
            FileClass::ShellCompletion => &mut self.shell_completions,
            FileClass::Ambiguous => &mut self.ambiguous,
        };
        bucket.push(id);
    }

    /// Binaries in this scope and every nested one.
    pub fn binary_count(&self) -> usize {
        self.binaries.len() + self.nested.values().map(Self::binary_count).sum::<usize>()
    }

    /// Archives in this scope and every nested one.
    pub fn archive_count(&self) -> usize {
        self.archives.len() + self.nested.values().map(Self::archive_count).sum::<usize>()
    }

    /// Ambiguous candidates in this scope and every nested one.
    pub fn ambiguous_count(&self) -> usize {
        self.ambiguous.len() + self.nested.values().map(Self::ambiguous_count).sum::<usize>()
    }

    /// Every binary, this scope first, then nested scopes in archive order.
    pub fn all_binaries(&self) -> Vec<RecordId> {
        let mut ids = self.binaries.clone();
        for child in self.nested.values() {
            ids.extend(child.all_binaries());
        }
        ids
    }
}

/// Decide the bucket for one compiled record, or `None` to skip it.
///
/// `candidates` is the number of files in the record's scope. A missing
/// keyword is filled in from the configuration here.
pub fn classify_record(
    record: &mut CompiledFileRecord,
    candidates: usize,
    config: &ScanConfig,
) -> Option<FileClass> {
    let name = &record.filename;
    if !record.unmatched.is_empty() {
        debug!("Skipping {name}: unmatched {:?}", record.unmatched);
        return None;
    }
    if record.is_installer {
        debug!("Skipping {name}: installer");
        return None;
    }
    if record.is_app_image {
        debug!("Skipping {name}: AppImage");
        return None;
    }
    if let Some(os) = record.os.as_ref().filter(|os| **os != config.target_os) {
        debug!("Skipping {name}: built for {os}");
        return None;
    }
    if record.keyword.is_none() {
        record.keyword = Some(config.default_keyword.clone());
        record.keyword_defaulted = true;
    }

    if record.is_archive() {
        let noncommittal = record.os.is_none()
            && record.has_project_name
            && (record.has_version || record.has_tag)
            && record.keyword_defaulted
            && candidates > config.source_archive_threshold;
        if noncommittal {
            debug!("Skipping {name}: looks like a source tarball");
            return None;
        }
        return Some(FileClass::CompressedArchive);
    }
    if record.is_binary && record.containers.is_empty() {
        return Some(FileClass::Binary);
    }
    if record.is_document {
        return Some(FileClass::Document);
    }
    if record.shell.is_some() {
        if record.is_shell_completion {
            return Some(FileClass::ShellCompletion);
        }
        debug!("Skipping {name}: shell script");
        return None;
    }
    if record.manual_page.is_some() {
        return Some(FileClass::ManualPage);
    }
    Some(FileClass::Ambiguous)
}

/// Records and classification of one release.
#[derive(Debug)]
pub struct ReleaseClassification {
    /// Every classified record.
    pub records: RecordArena,
    /// Root scope.
    pub tree: ClassificationTree,
}

/// Runs the classification of one release.
pub struct Classifier<'a> {
    dictionary: &'a Dictionary,
    config: &'a ScanConfig,
    source: &'a dyn AssetSource,
    arena: RecordArena,
}

impl std::fmt::Debug for Classifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("config", self.config)
            .field("records", &self.arena.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Classifier<'a> {
    /// Classifier reading file content from `source`.
    pub fn new(
        dictionary: &'a Dictionary,
        config: &'a ScanConfig,
        source: &'a dyn AssetSource,
    ) -> Self {
        Self {
            dictionary,
            config,
            source,
            arena: RecordArena::new(),
        }
    }

    /// Classify the release's assets.
    ///
    /// # Errors
    ///
    /// Returns an error if an archive cannot be fetched or read, its
    /// container chain is unsupported, a candidate cannot be probed, or
    /// nothing installable was found at all.
    pub fn classify_release(
        mut self,
        assets: Vec<ReleaseAsset>,
    ) -> Result<ReleaseClassification, ScanError> {
        let files = assets.into_iter().map(RawFile::from_asset).collect();
        let mut tree = self.classify_scope(files);
        self.traverse(&mut tree, 0)?;

        if tree.binary_count() == 0 && tree.ambiguous_count() > 0 {
            info!("No binaries found, probing ambiguous candidates");
            self.resolve_ambiguous(&mut tree)?;
        }
        if tree.binary_count() == 0 && tree.archive_count() == 0 {
            return Err(ScanError::NothingFound);
        }

        self.release_unused(&tree);
        Ok(ReleaseClassification {
            records: self.arena,
            tree,
        })
    }

    /// Decode, compile and bucket one scope's files.
    fn classify_scope(&mut self, files: Vec<RawFile>) -> ClassificationTree {
        let candidates = files.len();
        let mut tree = ClassificationTree::default();

        for file in files {
            let name = file.name.clone();
            let name_tokens = decode(self.dictionary, &file.name);
            if name_tokens
                .iter()
                .all(|token| token.kind == TokenKind::Separator)
            {
                debug!("Skipping {name:?}: nothing to decode");
                continue;
            }
            let mut tokens = decode_directory(self.dictionary, &file.directory);
            tokens.extend(name_tokens);

            let parent = file.container.map(|id| &self.arena[id]);
            let mut record = match compile(&tokens, file, parent) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Skipping {name}: {e}");
                    continue;
                }
            };

            if let Some(class) = classify_record(&mut record, candidates, self.config) {
                debug!("What is {name}? {class:?}");
                let id = self.arena.push(record);
                tree.insert(class, id);
            }
        }

        tree
    }

    /// Open archives of a scope that has no binaries.
    fn traverse(&mut self, tree: &mut ClassificationTree, depth: usize) -> Result<(), ScanError> {
        if !tree.binaries.is_empty() || tree.archives.is_empty() {
            return Ok(());
        }
        if depth >= self.config.max_archive_depth {
            debug!("Not opening {} archives at depth {depth}", tree.archives.len());
            return Ok(());
        }

        info!("No binaries found, searching {} archives", tree.archives.len());
        for id in tree.archives.clone() {
            let (asset, format) = {
                let record = &self.arena[id];
                let format = ContainerFormat::from_chain(&record.containers)
                    .map_err(|source| archive_error(&record.asset, source))?;
                (record.asset.clone(), format)
            };
            if !format.is_extracted() {
                debug!("Not opening {} ({format:?})", asset.name);
                continue;
            }

            let resource = self.materialize(id)?;
            let members = extract_members(format, resource.path())
                .map_err(|source| archive_error(&asset, source))?;
            debug!("{} holds {} files", asset.name, members.len());

            let files = members
                .into_iter()
                .map(|member| RawFile::from_member(id, &asset, member))
                .collect();
            let mut child = self.classify_scope(files);
            self.traverse(&mut child, depth + 1)?;

            // Members carry their own copies from here on.
            if let Some(record) = self.arena.get_mut(id) {
                record.resource = None;
            }
            drop(resource);
            tree.nested.insert(id, child);
        }
        Ok(())
    }

    /// Local copy of a record's content, fetching it on first use.
    fn materialize(&mut self, id: RecordId) -> Result<LocalResource, ScanError> {
        if let Some(resource) = &self.arena[id].resource {
            return Ok(resource.clone());
        }

        let asset = self.arena[id].asset.clone();
        let source = self.source;
        let fetch_error = |source: SourceError| ScanError::Fetch {
            asset: asset.name.clone(),
            url: asset.download_url.clone(),
            source,
        };
        let mut reader = source.fetch(&asset).map_err(fetch_error)?;
        let resource = LocalResource::from_reader(&asset.name, &mut reader)
            .map_err(|e| fetch_error(SourceError::Io(e)))?;

        if let Some(record) = self.arena.get_mut(id) {
            record.resource = Some(resource.clone());
        }
        Ok(resource)
    }

    /// Promote ambiguous candidates that parse as ELF; drop the rest.
    fn resolve_ambiguous(&mut self, tree: &mut ClassificationTree) -> Result<(), ScanError> {
        for id in std::mem::take(&mut tree.ambiguous) {
            let resource = self.materialize(id)?;
            let name = self.arena[id].filename.clone();
            let bytes = resource.read().map_err(|source| ScanError::Probe {
                file: name.clone(),
                source,
            })?;

            if let Ok(Object::Elf(_)) = Object::parse(&bytes) {
                debug!("{name} is an ELF binary");
                if let Some(record) = self.arena.get_mut(id) {
                    record.is_binary = true;
                }
                tree.binaries.push(id);
            } else {
                debug!("Discarding {name}: not an ELF binary");
                if let Some(record) = self.arena.get_mut(id) {
                    record.resource = None;
                }
            }
        }
        for child in tree.nested.values_mut() {
            self.resolve_ambiguous(child)?;
        }
        Ok(())
    }

    /// Drop local copies nothing downstream needs.
    fn release_unused(&mut self, tree: &ClassificationTree) {
        let keep: BTreeSet<RecordId> = tree.all_binaries().into_iter().collect();
        for (i, record) in self.arena.records.iter_mut().enumerate() {
            if !keep.contains(&RecordId(i)) {
                record.resource = None;
            }
        }
    }
}

fn archive_error(asset: &ReleaseAsset, source: crate::archive::ArchiveError) -> ScanError {
    ScanError::Archive {
        asset: asset.name.clone(),
        url: asset.download_url.clone(),
        source,
    }
}
