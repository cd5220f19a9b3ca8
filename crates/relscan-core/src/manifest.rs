//! Program manifest assembly.
//!
//! Folds the binaries of a classified release into [`Program`]s, attaches
//! the documents, manual pages and completion scripts shipped next to
//! them, resolves their library dependencies and detects alternate builds.

use std::collections::BTreeMap;

use relscan_schema::{FileReference, Manifest, ManualPage, Program};
use tracing::{debug, info};

use crate::classify::{ClassificationTree, RecordArena, ReleaseClassification};
use crate::compile::{CompiledFileRecord, RecordId};
use crate::config::ScanConfig;
use crate::deps::DependencyTable;
use crate::error::ScanError;
use crate::useflags::{self, Alternatives};

struct Assembler<'a> {
    records: &'a RecordArena,
    config: &'a ScanConfig,
    table: &'a DependencyTable,
    programs: BTreeMap<String, Program>,
    /// Program currently supplying each (keyword, installed name).
    owners: BTreeMap<(String, String), String>,
    detected: Alternatives,
}

impl Assembler<'_> {
    fn is_default(&self, program: &str) -> bool {
        program.is_empty() || program == self.config.repository
    }

    fn keyword_of(&self, record: &CompiledFileRecord) -> String {
        record
            .keyword
            .as_deref()
            .unwrap_or(&self.config.default_keyword)
            .trim_start_matches('~')
            .to_string()
    }

    fn reference(&self, id: RecordId, installed_name: &str) -> FileReference {
        let record = &self.records[id];
        let outermost = &self.records[self.records.outermost(id)];
        FileReference {
            release_filename: outermost.templated_filename.clone(),
            archive_path: record.archive_path.clone(),
            installed_name: installed_name.to_string(),
        }
    }

    fn visit(&mut self, tree: &ClassificationTree) -> Result<(), ScanError> {
        for &id in &tree.binaries {
            self.add_binary(id, tree)?;
        }
        for child in tree.nested.values() {
            self.visit(child)?;
        }
        Ok(())
    }

    fn add_binary(&mut self, id: RecordId, scope: &ClassificationTree) -> Result<(), ScanError> {
        let records = self.records;
        let record = &records[id];
        let name = record
            .program_name
            .clone()
            .unwrap_or_else(|| self.config.repository.clone());
        let keyword = self.keyword_of(record);
        if self
            .programs
            .get(&name)
            .is_some_and(|program| program.binaries.contains_key(&keyword))
        {
            debug!("{name} already has a binary for {keyword}, ignoring {}", record.filename);
            return Ok(());
        }
        debug!("{} supplies {name} for {keyword}", record.filename);

        self.detect_alternate(&name, &keyword, &record.installed_name);
        let packages = self.dependencies(record)?;

        let reference = self.reference(id, &record.installed_name);
        let documents: Vec<FileReference> = scope
            .documents
            .iter()
            .filter(|&&doc| travels_with(record, &records[doc]))
            .map(|&doc| self.reference(doc, &records[doc].installed_name))
            .collect();
        let manual_pages: Vec<ManualPage> = scope
            .manual_pages
            .iter()
            .filter(|&&page| travels_with(record, &records[page]))
            .filter_map(|&page| {
                let page_record = &records[page];
                Some(ManualPage {
                    section: page_record.manual_page?,
                    file: self.reference(page, page_record.installed_name_without_containers()),
                })
            })
            .collect();
        let completions: Vec<(String, FileReference)> = scope
            .shell_completions
            .iter()
            .filter(|&&script| travels_with(record, &records[script]))
            .filter_map(|&script| {
                let script_record = &records[script];
                let shell = script_record.shell.clone()?;
                Some((shell, self.reference(script, &script_record.installed_name)))
            })
            .collect();

        let program = self
            .programs
            .entry(name.clone())
            .or_insert_with(|| Program::new(name.clone()));
        program.binaries.insert(keyword.clone(), reference);
        for package in &packages {
            program.add_dependency(package);
        }

        let entry = program.documents.entry(keyword.clone()).or_default();
        for document in documents {
            if !entry.contains(&document) {
                entry.push(document);
            }
        }
        if entry.is_empty() {
            program.documents.remove(&keyword);
        }

        let entry = program.manual_pages.entry(keyword.clone()).or_default();
        for page in manual_pages {
            if !entry.contains(&page) {
                entry.push(page);
            }
        }
        if entry.is_empty() {
            program.manual_pages.remove(&keyword);
        }

        let entry = program.shell_completions.entry(keyword.clone()).or_default();
        for (shell, script) in completions {
            entry.entry(shell).or_insert(script);
        }
        if entry.is_empty() {
            program.shell_completions.remove(&keyword);
        }

        Ok(())
    }

    /// Record `program` or the program it displaces as an alternate when
    /// two programs install the same file for one keyword.
    fn detect_alternate(&mut self, program: &str, keyword: &str, installed_name: &str) {
        let key = (keyword.to_string(), installed_name.to_string());
        let Some(owner) = self.owners.get(&key).cloned() else {
            self.owners.insert(key, program.to_string());
            return;
        };
        if owner == program {
            return;
        }

        let flag = if self.is_default(program) {
            self.owners.insert(key, program.to_string());
            owner
        } else {
            program.to_string()
        };
        if !self.is_default(&flag) {
            info!("{flag} is an alternate build for {keyword}");
            self.detected.add(keyword, &flag);
        }
    }

    fn dependencies(&self, record: &CompiledFileRecord) -> Result<Vec<String>, ScanError> {
        let resource = record
            .resource
            .as_ref()
            .ok_or_else(|| ScanError::MissingContent(record.filename.clone()))?;
        let resolution =
            self.table
                .resolve(resource.path())
                .map_err(|source| ScanError::Dependency {
                    binary: record.filename.clone(),
                    source,
                })?;
        if !resolution.is_complete() {
            return Err(ScanError::UnresolvedDependencies {
                binary: record.filename.clone(),
                libraries: resolution.unresolved,
            });
        }
        Ok(resolution.packages)
    }
}

/// Whether `other` belongs with `binary`: same keyword, or no keyword of its
/// own.
fn travels_with(binary: &CompiledFileRecord, other: &CompiledFileRecord) -> bool {
    other.keyword_defaulted || other.keyword == binary.keyword
}

/// Build the manifest for a classified release.
///
/// # Errors
///
/// Returns an error if a binary's dependencies cannot be read or include a
/// library missing from `table`.
pub fn assemble(
    classification: &ReleaseClassification,
    config: &ScanConfig,
    table: &DependencyTable,
) -> Result<Manifest, ScanError> {
    let mut assembler = Assembler {
        records: &classification.records,
        config,
        table,
        programs: BTreeMap::new(),
        owners: BTreeMap::new(),
        detected: Alternatives::new(),
    };
    assembler.visit(&classification.tree)?;

    let mut alternatives = assembler.detected;
    alternatives.merge(&config.declared_alternatives());
    let use_flags = useflags::infer(&assembler.programs, &alternatives, &config.repository);

    Ok(Manifest {
        repository: config.repository.clone(),
        programs: assembler.programs,
        alternatives: alternatives.to_pairs(),
        use_flags,
    })
}
