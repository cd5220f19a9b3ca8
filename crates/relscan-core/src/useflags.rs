//! USE flag inference for alternate builds.
//!
//! Some releases ship several builds of the same program for one
//! architecture, e.g. `hugo` and `hugo_extended`. Each alternate becomes a
//! USE flag: the default build must not have any of them, and an alternate
//! build must have its own flag and none of the others.

use std::collections::BTreeMap;

use relscan_schema::{Program, UseFlags};

/// Programs declared as alternates, by architecture keyword.
///
/// Keywords are stored without the `~` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alternatives {
    by_keyword: BTreeMap<String, Vec<String>>,
}

impl Alternatives {
    /// No alternates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space separated list of `keyword:program` pairs.
    ///
    /// Malformed pairs are ignored.
    pub fn parse(list: &str) -> Self {
        let mut alternatives = Self::new();
        for pair in list.split_whitespace() {
            let mut parts = pair.split(':');
            if let (Some(keyword), Some(program), None) = (parts.next(), parts.next(), parts.next()) {
                alternatives.add(keyword.trim(), program.trim());
            }
        }
        alternatives
    }

    /// Declare `program` an alternate for `keyword`.
    pub fn add(&mut self, keyword: &str, program: &str) {
        let keyword = keyword.trim_start_matches('~');
        if keyword.is_empty() || program.is_empty() {
            return;
        }
        let programs = self.by_keyword.entry(keyword.to_string()).or_default();
        if !programs.iter().any(|p| p == program) {
            programs.push(program.to_string());
        }
    }

    /// Merge another set of declarations into this one.
    pub fn merge(&mut self, other: &Alternatives) {
        for (keyword, programs) in &other.by_keyword {
            for program in programs {
                self.add(keyword, program);
            }
        }
    }

    /// Alternates declared for `keyword`.
    pub fn for_keyword(&self, keyword: &str) -> &[String] {
        self.by_keyword
            .get(keyword.trim_start_matches('~'))
            .map_or(&[], Vec::as_slice)
    }

    /// Keywords each program is an alternate for.
    pub fn reverse(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut reverse: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (keyword, programs) in &self.by_keyword {
            for program in programs {
                reverse.entry(program.as_str()).or_default().push(keyword.as_str());
            }
        }
        reverse
    }

    /// Every declaration as `keyword:program`, sorted.
    pub fn to_pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self
            .by_keyword
            .iter()
            .flat_map(|(k, programs)| programs.iter().map(move |p| format!("{k}:{p}")))
            .collect();
        pairs.sort();
        pairs
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.by_keyword.is_empty()
    }
}

/// Whether `program` is the unnamed build of the repository.
fn is_default_program(program: &str, repository: &str) -> bool {
    program.is_empty() || program == repository
}

/// Flags for one (program, keyword) pair.
///
/// `keyword` is given without the `~` prefix. Pairs with no alternation
/// relationship get empty sets.
pub fn flags_for(
    program: &str,
    keyword: &str,
    alternatives: &Alternatives,
    repository: &str,
) -> UseFlags {
    let alternates = alternatives.for_keyword(keyword);
    let mut flags = UseFlags::default();
    if alternates.is_empty() {
        return flags;
    }

    if is_default_program(program, repository) {
        flags.must_have.push(keyword.to_string());
        flags.must_not_have.extend(alternates.iter().cloned());
    } else if alternates.iter().any(|a| a == program) {
        flags.must_have.push(keyword.to_string());
        flags.must_have.push(program.to_string());
        flags
            .must_not_have
            .extend(alternates.iter().filter(|a| *a != program).cloned());
    }
    flags
}

/// Flags for every (program, keyword) pair that has a binary.
///
/// Only pairs with a constraint are included.
pub fn infer(
    programs: &BTreeMap<String, Program>,
    alternatives: &Alternatives,
    repository: &str,
) -> BTreeMap<String, BTreeMap<String, UseFlags>> {
    let mut result: BTreeMap<String, BTreeMap<String, UseFlags>> = BTreeMap::new();
    for (name, program) in programs {
        for keyword in program.keywords() {
            let flags = flags_for(name, keyword, alternatives, repository);
            if !flags.is_empty() {
                result
                    .entry(name.clone())
                    .or_default()
                    .insert(keyword.to_string(), flags);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use relscan_schema::FileReference;

    fn program(name: &str, keywords: &[&str]) -> (String, Program) {
        let mut program = Program::new(name);
        for keyword in keywords {
            program.binaries.insert(
                (*keyword).to_string(),
                FileReference {
                    release_filename: format!("{name}_{keyword}.tar.gz"),
                    archive_path: Some(name.to_string()),
                    installed_name: name.to_string(),
                },
            );
        }
        (name.to_string(), program)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_ignores_malformed_pairs() {
        let alts = Alternatives::parse("amd64:extended  arm64:extended bogus a:b:c ~ppc64:le");
        assert_eq!(alts.for_keyword("amd64"), ["extended"]);
        assert_eq!(alts.for_keyword("~arm64"), ["extended"]);
        assert_eq!(alts.for_keyword("ppc64"), ["le"]);
        assert!(alts.for_keyword("arm").is_empty());
        assert_eq!(
            alts.to_pairs(),
            vec!["amd64:extended", "arm64:extended", "ppc64:le"]
        );
        assert_eq!(alts.reverse().get("extended"), Some(&vec!["amd64", "arm64"]));
    }

    #[test]
    fn test_hugo_extended() {
        let alts = Alternatives::parse("amd64:extended arm64:extended");
        let hugo = flags_for("hugo", "amd64", &alts, "hugo");
        assert_eq!(hugo.must_have, strings(&["amd64"]));
        assert_eq!(hugo.must_not_have, strings(&["extended"]));

        let extended = flags_for("extended", "amd64", &alts, "hugo");
        assert_eq!(extended.must_have, strings(&["amd64", "extended"]));
        assert!(extended.must_not_have.is_empty());

        // No alternates declared for arm
        assert!(flags_for("hugo", "arm", &alts, "hugo").is_empty());
    }

    #[test]
    fn test_chezmoi_several_alternates() {
        let alts = Alternatives::parse("amd64:glibc amd64:loong64 arm64:android ppc64:le");

        let chezmoi = flags_for("chezmoi", "arm64", &alts, "chezmoi");
        assert_eq!(chezmoi.must_have, strings(&["arm64"]));
        assert_eq!(chezmoi.must_not_have, strings(&["android"]));

        let android = flags_for("android", "arm64", &alts, "chezmoi");
        assert_eq!(android.must_have, strings(&["arm64", "android"]));
        assert!(android.must_not_have.is_empty());

        let glibc = flags_for("glibc", "amd64", &alts, "chezmoi");
        assert_eq!(glibc.must_have, strings(&["amd64", "glibc"]));
        assert_eq!(glibc.must_not_have, strings(&["loong64"]));

        let default = flags_for("", "ppc64", &alts, "chezmoi");
        assert_eq!(default.must_not_have, strings(&["le"]));
    }

    #[test]
    fn test_unrelated_program_gets_nothing() {
        let alts = Alternatives::parse("arm:ecguess");
        assert!(flags_for("other", "arm", &alts, "editorconfig-guesser").is_empty());
    }

    #[test]
    fn test_infer_only_lists_constrained_pairs() {
        let programs: BTreeMap<String, Program> = [
            program("hugo", &["amd64", "arm", "arm64"]),
            program("extended", &["amd64", "arm64"]),
        ]
        .into_iter()
        .collect();
        let alts = Alternatives::parse("amd64:extended arm64:extended");

        let flags = infer(&programs, &alts, "hugo");
        assert_eq!(flags["hugo"].len(), 2);
        assert!(!flags["hugo"].contains_key("arm"));
        assert_eq!(flags["hugo"]["amd64"].must_not_have, strings(&["extended"]));
        assert_eq!(
            flags["extended"]["arm64"].must_have,
            strings(&["arm64", "extended"])
        );
    }

    #[test]
    fn test_infer_without_alternates() {
        let programs: BTreeMap<String, Program> =
            [program("tool", &["amd64"])].into_iter().collect();
        assert!(infer(&programs, &Alternatives::new(), "tool").is_empty());
        assert!(infer(&BTreeMap::new(), &Alternatives::parse("amd64:x"), "tool").is_empty());
    }
}
