//! Token dictionary and matcher.
//!
//! A [`Vocabulary`] is the flat table of literal keys and their meanings.
//! Grouping it yields a [`Dictionary`]: candidates bucketed by first byte,
//! longest key first, so the decoder can try the most specific spelling
//! (`x86_64`) before its prefixes (`x86`).

use std::collections::BTreeMap;

use relscan_schema::{ContainerKind, TokenMeaning};

/// Bare Gentoo keywords; each is accepted with and without the `~` prefix.
const GENTOO_KEYWORDS: &[&str] = &[
    "alpha", "amd64", "arm", "arm64", "hppa", "ia64", "loong", "mips", "ppc", "ppc64", "riscv",
    "s390", "sparc", "x86",
];

/// Vendor spellings of an architecture.
const ARCH_ALIASES: &[(&str, &str)] = &[
    ("x86-64", "~amd64"),
    ("x86_64", "~amd64"),
    ("x64", "~amd64"),
    ("64bit", "~amd64"),
    ("arm32", "~arm"),
    ("armv6", "~arm"),
    ("armv7", "~arm"),
    ("armel", "~arm"),
    ("armhf", "~arm"),
    ("aarch64", "~arm64"),
    ("i386", "~x86"),
    ("386", "~x86"),
    ("i686", "~x86"),
    ("32bit", "~x86"),
    ("powerpc", "~ppc"),
    ("powerpc64", "~ppc64"),
    ("powerpc64le", "~ppc64"),
    ("ppc64le", "~ppc64"),
    ("loong64", "~loong"),
    ("riscv64", "~riscv"),
    ("riscv64gc", "~riscv"),
    ("s390x", "~s390"),
];

/// Rust target triples: (triple, keyword, os, toolchain).
const TARGET_TRIPLES: &[(&str, &str, &str, Option<&str>)] = &[
    ("aarch64-unknown-linux-gnu", "~arm64", "linux", Some("gnu")),
    ("aarch64-unknown-linux-musl", "~arm64", "linux", Some("musl")),
    ("arm-unknown-linux-gnueabi", "~arm", "linux", Some("gnueabi")),
    ("arm-unknown-linux-gnueabihf", "~arm", "linux", Some("gnueabihf")),
    ("armv7-unknown-linux-gnueabihf", "~arm", "linux", Some("gnueabihf")),
    ("i686-pc-windows-gnu", "~x86", "windows", Some("gnu")),
    ("i686-pc-windows-msvc", "~x86", "windows", Some("msvc")),
    ("i686-unknown-linux-gnu", "~x86", "linux", Some("gnu")),
    ("powerpc-unknown-linux-gnu", "~ppc", "linux", Some("gnu")),
    ("powerpc64-unknown-linux-gnu", "~ppc64", "linux", Some("gnu")),
    ("powerpc64le-unknown-linux-gnu", "~ppc64", "linux", Some("gnu")),
    ("riscv64gc-unknown-linux-gnu", "~riscv", "linux", Some("gnu")),
    ("s390x-unknown-linux-gnu", "~s390", "linux", Some("gnu")),
    ("x86_64-apple-darwin", "~amd64", "macosx", None),
    ("aarch64-apple-darwin", "~arm64", "macosx", None),
    ("x86_64-pc-windows-gnu", "~amd64", "windows", Some("gnu")),
    ("x86_64-pc-windows-msvc", "~amd64", "windows", Some("msvc")),
    ("x86_64-unknown-linux-gnu", "~amd64", "linux", Some("gnu")),
    ("x86_64-unknown-linux-musl", "~amd64", "linux", Some("musl")),
];

fn standard_entries() -> Vec<TokenMeaning> {
    let mut entries = Vec::new();

    for keyword in GENTOO_KEYWORDS {
        let tilde = format!("~{keyword}");
        entries.push(TokenMeaning::new(*keyword).keyword(&tilde));
        entries.push(TokenMeaning::new(tilde.clone()).keyword(&tilde));
    }
    for (key, keyword) in ARCH_ALIASES {
        entries.push(TokenMeaning::new(*key).keyword(keyword));
    }
    for (triple, keyword, os, toolchain) in TARGET_TRIPLES {
        let mut meaning = TokenMeaning::new(*triple).keyword(keyword).os(os);
        if let Some(toolchain) = toolchain {
            meaning = meaning.toolchain(toolchain);
        }
        entries.push(meaning);
    }

    entries.push(TokenMeaning::new("unknown"));

    // Operating systems
    entries.extend([
        TokenMeaning::new("linux").os("linux").case_insensitive(),
        TokenMeaning::new("lin").os("linux").case_insensitive(),
        TokenMeaning::new("windows").os("windows").case_insensitive(),
        TokenMeaning::new("win").os("windows").case_insensitive(),
        TokenMeaning::new("win32")
            .os("windows")
            .keyword("~x86")
            .case_insensitive(),
        TokenMeaning::new("win64")
            .os("windows")
            .keyword("~amd64")
            .case_insensitive(),
        TokenMeaning::new("macosx").os("macosx"),
        TokenMeaning::new("macos").os("macosx"),
        TokenMeaning::new("osx").os("macosx"),
        TokenMeaning::new("darwin").os("macosx").case_insensitive(),
        TokenMeaning::new("freebsd").os("freebsd").case_insensitive(),
        TokenMeaning::new("netbsd").os("netbsd").case_insensitive(),
        TokenMeaning::new("openbsd").os("openbsd").case_insensitive(),
        TokenMeaning::new("android").os("android").case_insensitive(),
    ]);

    // Toolchains
    entries.extend([
        TokenMeaning::new("gnu").toolchain("gnu").case_insensitive(),
        TokenMeaning::new("musl").toolchain("musl"),
        TokenMeaning::new("gnueabi").toolchain("gnueabi"),
        TokenMeaning::new("gnueabihf").toolchain("gnueabihf"),
        TokenMeaning::new("msvc").toolchain("msvc"),
    ]);

    // Packaging suffixes
    entries.extend([
        TokenMeaning::new("AppImage").app_image().os("linux").suffix_only(),
        TokenMeaning::new("deb")
            .container(ContainerKind::Deb)
            .os("linux")
            .suffix_only(),
        TokenMeaning::new("rpm")
            .container(ContainerKind::Rpm)
            .os("linux")
            .suffix_only(),
        TokenMeaning::new("exe").os("windows").suffix_only(),
        TokenMeaning::new("msi").os("windows").installer().suffix_only(),
        TokenMeaning::new("dmg").os("macosx").suffix_only(),
        TokenMeaning::new("pkg").os("macosx").suffix_only(),
        TokenMeaning::new("gz").container(ContainerKind::Gz).suffix_only(),
        TokenMeaning::new("bz2").container(ContainerKind::Bz2).suffix_only(),
        TokenMeaning::new("tar").container(ContainerKind::Tar).suffix_only(),
        TokenMeaning::new("zip").container(ContainerKind::Zip).suffix_only(),
    ]);

    // Documents
    for key in ["README", "LICENSE", "CHANGELOG", "COPYING", "NOTICE", "AUTHORS"] {
        entries.push(TokenMeaning::new(key).document().case_insensitive());
    }
    entries.push(TokenMeaning::new("md").document().suffix_only());
    entries.push(TokenMeaning::new("txt").document().suffix_only());

    // Manual page sections
    for section in 1..=9u8 {
        entries.push(
            TokenMeaning::new(section.to_string())
                .manual_page(section)
                .suffix_only(),
        );
    }

    // Shells and completion scripts
    entries.extend([
        TokenMeaning::new("sh").shell("sh").suffix_only(),
        TokenMeaning::new("bash").shell("bash").suffix_only(),
        TokenMeaning::new("zsh").shell("zsh").suffix_only(),
        TokenMeaning::new("fish").shell("fish").suffix_only(),
        TokenMeaning::new("bash-completion")
            .shell("bash")
            .shell_completion()
            .suffix_only(),
        TokenMeaning::new("completion").shell_completion(),
        TokenMeaning::new("completions").shell_completion(),
        TokenMeaning::new("autocomplete").shell_completion(),
    ]);

    // Installers
    entries.extend([
        TokenMeaning::new("setup").installer().case_insensitive(),
        TokenMeaning::new("installer").installer().case_insensitive(),
    ]);

    entries
}

/// Flat table of literal keys and their meanings.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: BTreeMap<String, TokenMeaning>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl Vocabulary {
    /// An empty table, mostly useful for fixtures.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The built-in table of architectures, platforms, containers and file roles.
    pub fn standard() -> Self {
        let mut vocabulary = Self::empty();
        for meaning in standard_entries() {
            vocabulary.insert(meaning);
        }
        vocabulary
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, meaning: TokenMeaning) {
        self.entries.insert(meaning.key.clone(), meaning);
    }

    /// Look up an entry by its exact key.
    pub fn get(&self, key: &str) -> Option<&TokenMeaning> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register the repository name.
    ///
    /// An existing entry keeps its meaning and gains the project flag; a new
    /// entry matches case-insensitively.
    pub fn with_project(mut self, name: &str) -> Self {
        if name.is_empty() {
            return self;
        }
        self.entries
            .entry(name.to_string())
            .and_modify(|m| m.project_name = true)
            .or_insert_with(|| {
                let mut meaning = TokenMeaning::new(name).case_insensitive();
                meaning.project_name = true;
                meaning
            });
        self
    }

    /// Register the release's version strings.
    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for version in versions {
            self.flag(version.as_ref(), |m| m.version = true);
        }
        self
    }

    /// Register the release's tag strings.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.flag(tag.as_ref(), |m| m.tag = true);
        }
        self
    }

    fn flag(&mut self, key: &str, set: impl Fn(&mut TokenMeaning)) {
        if key.is_empty() {
            return;
        }
        let meaning = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| TokenMeaning::new(key));
        set(meaning);
    }

    /// Bucket the entries by first byte for scanning.
    pub fn group(&self) -> Dictionary {
        let mut buckets: BTreeMap<u8, Vec<TokenMeaning>> = BTreeMap::new();
        for meaning in self.entries.values() {
            let Some(&first) = meaning.key.as_bytes().first() else {
                continue;
            };
            buckets.entry(first).or_default().push(meaning.clone());
            if meaning.case_insensitive {
                let other = if first.is_ascii_uppercase() {
                    first.to_ascii_lowercase()
                } else {
                    first.to_ascii_uppercase()
                };
                if other != first {
                    buckets.entry(other).or_default().push(meaning.clone());
                }
            }
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by(|a, b| b.key.len().cmp(&a.key.len()).then_with(|| a.key.cmp(&b.key)));
        }
        Dictionary { buckets }
    }
}

/// Scan-ready dictionary: candidates by first byte, longest key first.
#[derive(Debug, Clone)]
pub struct Dictionary {
    buckets: BTreeMap<u8, Vec<TokenMeaning>>,
}

impl Dictionary {
    /// Build the standard dictionary seeded for one release.
    pub fn for_release(project: &str, versions: &[String], tags: &[String]) -> Self {
        Vocabulary::standard()
            .with_project(project)
            .with_versions(versions)
            .with_tags(tags)
            .group()
    }

    /// Candidates whose key starts with `first`, in match order.
    pub fn candidates(&self, first: u8) -> &[TokenMeaning] {
        self.buckets.get(&first).map_or(&[], Vec::as_slice)
    }

    /// First acceptable entry matching `name` at byte offset `pos`.
    ///
    /// Once `suffix_only` is set only suffix-only entries are acceptable.
    pub fn match_at(&self, name: &str, pos: usize, suffix_only: bool) -> Option<&TokenMeaning> {
        let first = *name.as_bytes().get(pos)?;
        self.candidates(first)
            .iter()
            .filter(|m| !suffix_only || m.suffix_only)
            .find(|m| matches_at(m, name, pos))
    }
}

fn is_separator(byte: u8) -> bool {
    matches!(byte, b'-' | b'_' | b'.')
}

/// Textual match of one entry at `pos`, honouring case sensitivity.
///
/// Suffix-only entries must span a whole separator-delimited segment, and a
/// manual page section must follow a dot.
fn matches_at(meaning: &TokenMeaning, name: &str, pos: usize) -> bool {
    let end = pos + meaning.key.len();
    let Some(text) = name.get(pos..end) else {
        return false;
    };
    let equal = if meaning.case_insensitive {
        text.eq_ignore_ascii_case(&meaning.key)
    } else {
        text == meaning.key
    };
    if !equal {
        return false;
    }
    if meaning.suffix_only {
        let bytes = name.as_bytes();
        let before = pos.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(end).copied();
        if !before.is_some_and(is_separator) || !after.is_none_or(is_separator) {
            return false;
        }
        if meaning.manual_page.is_some() && before != Some(b'.') {
            return false;
        }
    }
    true
}
