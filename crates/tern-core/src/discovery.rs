//! Migration discovery.
//!
//! Migrations live below a root directory. Every subdirectory is a scope
//! segment, so `migrations/billing/eu/20240101120000_add_vat.sql` belongs to
//! scope `billing/eu`. Two layouts are recognised:
//!
//! - a single file `<id>_<name>.sql` with `-- up` / `-- down` marker lines;
//! - a script pair `<id>_<name>.up.sql` plus an optional `<id>_<name>.down.sql`.
//!
//! Discovery first indexes file names (cheap, and where all naming errors are
//! reported), then yields units in ascending identifier order, reading file
//! contents only as each unit is pulled from the iterator.

use crate::config::Config;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::migration_name::MigrationName;
use crate::scope::Scope;
use crate::unit::{is_blank_sql, MigrationUnit, Procedure};
use crate::unit_id::UnitId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const INLINE_SUFFIX: &str = ".sql";
const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// Where migrations are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSource {
    /// Absolute migrations root
    pub root: PathBuf,
}

impl MigrationSource {
    /// Use `root` as the migrations directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the configured migrations directory against a project root.
    pub fn from_config(config: &Config, project_root: &Path) -> Self {
        Self::new(config.migrations_dir_absolute(project_root))
    }
}

/// Enumerates migration units from a [`MigrationSource`].
#[derive(Debug, Clone)]
pub struct Loader {
    source: MigrationSource,
}

impl Loader {
    /// Create a loader over `source`.
    pub fn new(source: MigrationSource) -> Self {
        Self { source }
    }

    /// Migrations root directory.
    pub fn root(&self) -> &Path {
        &self.source.root
    }

    /// Index the migrations below the root (or below `scope`, if given) and
    /// return them as an ordered, lazily-loaded sequence.
    ///
    /// A missing directory yields an empty sequence. Each call re-reads the
    /// file system.
    pub fn discover(&self, scope: Option<&Scope>) -> DiscoveryResult<Discovery> {
        let start_scope = scope.cloned().unwrap_or_default();
        let start_dir = self.source.root.join(start_scope.to_relative_path());

        let mut index: BTreeMap<(Scope, UnitId), IndexedUnit> = BTreeMap::new();
        if start_dir.is_dir() {
            index_dir(&start_dir, &start_scope, &mut index)?;
        } else {
            log::debug!(
                "Migration directory {} does not exist, nothing to discover",
                start_dir.display()
            );
        }

        let mut entries = index
            .into_values()
            .map(IndexedUnit::finish)
            .collect::<DiscoveryResult<Vec<_>>>()?;
        entries.sort_by(|a, b| {
            (a.id, &a.scope, &a.name).cmp(&(b.id, &b.scope, &b.name))
        });

        log::debug!(
            "Discovered {} migration(s) under {}",
            entries.len(),
            start_dir.display()
        );

        Ok(Discovery {
            entries: entries.into_iter(),
        })
    }
}

/// Ordered sequence of discovered migration units.
///
/// Iterating reads each unit's files on demand; a read failure is yielded as
/// an `Err` item in the unit's position.
#[derive(Debug)]
pub struct Discovery {
    entries: std::vec::IntoIter<UnitEntry>,
}

impl Discovery {
    /// Number of units not yet yielded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no units remain.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// Load every remaining unit, stopping at the first error.
    pub fn collect_units(self) -> DiscoveryResult<Vec<MigrationUnit>> {
        self.collect()
    }
}

impl Iterator for Discovery {
    type Item = DiscoveryResult<MigrationUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(UnitEntry::load)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// A unit whose files are known but not yet read.
#[derive(Debug)]
struct UnitEntry {
    id: UnitId,
    name: MigrationName,
    scope: Scope,
    layout: Layout,
}

#[derive(Debug)]
enum Layout {
    Inline(PathBuf),
    Pair { up: PathBuf, down: Option<PathBuf> },
}

impl UnitEntry {
    fn load(self) -> DiscoveryResult<MigrationUnit> {
        let (up, down, artifacts) = match self.layout {
            Layout::Inline(path) => {
                let content = read_file(&path)?;
                let (up, down) = split_sections(&content);
                (
                    Procedure::Inline { sql: up },
                    down.map(|sql| Procedure::Inline { sql }),
                    vec![path],
                )
            }
            Layout::Pair { up, down } => {
                let up_proc = Procedure::Script {
                    sql: read_file(&up)?,
                    path: up.clone(),
                };
                let mut artifacts = vec![up];
                let down_proc = match down {
                    Some(path) => {
                        let sql = read_file(&path)?;
                        artifacts.push(path.clone());
                        // A blank down script is the same as having none
                        (!is_blank_sql(&sql)).then_some(Procedure::Script { path, sql })
                    }
                    None => None,
                };
                (up_proc, down_proc, artifacts)
            }
        };

        if up.is_empty() {
            log::warn!(
                "Migration {}_{} has an empty up section",
                self.id,
                self.name
            );
        }

        Ok(MigrationUnit {
            id: self.id,
            name: self.name,
            scope: self.scope,
            up,
            down,
            artifacts,
        })
    }
}

/// Files seen so far for one `(scope, id)`.
#[derive(Debug)]
struct IndexedUnit {
    id: UnitId,
    name: MigrationName,
    scope: Scope,
    inline: Option<PathBuf>,
    up: Option<PathBuf>,
    down: Option<PathBuf>,
}

impl IndexedUnit {
    fn finish(self) -> DiscoveryResult<UnitEntry> {
        let layout = match (self.inline, self.up, self.down) {
            (Some(inline), None, None) => Layout::Inline(inline),
            (Some(inline), Some(other), _) | (Some(inline), None, Some(other)) => {
                return Err(DiscoveryError::DuplicateUnit {
                    id: self.id.to_string(),
                    scope: self.scope.to_string(),
                    first: inline.display().to_string(),
                    second: other.display().to_string(),
                });
            }
            (None, Some(up), down) => Layout::Pair { up, down },
            (None, None, Some(down)) => {
                return Err(DiscoveryError::OrphanDownScript {
                    file: down.display().to_string(),
                });
            }
            (None, None, None) => unreachable!("indexed unit without files"),
        };
        Ok(UnitEntry {
            id: self.id,
            name: self.name,
            scope: self.scope,
            layout,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Inline,
    Up,
    Down,
}

/// Split a file name into its stem and kind. Non-SQL files return `None`.
fn classify(file_name: &str) -> Option<(&str, FileKind)> {
    if let Some(stem) = file_name.strip_suffix(UP_SUFFIX) {
        Some((stem, FileKind::Up))
    } else if let Some(stem) = file_name.strip_suffix(DOWN_SUFFIX) {
        Some((stem, FileKind::Down))
    } else {
        file_name
            .strip_suffix(INLINE_SUFFIX)
            .map(|stem| (stem, FileKind::Inline))
    }
}

/// Parse `<digits>_<name>` into its identifier and name.
fn parse_stem(stem: &str, file: &str) -> DiscoveryResult<(UnitId, MigrationName)> {
    let Some((digits, name)) = stem.split_once('_') else {
        return Err(DiscoveryError::BadIdentifier {
            file: file.to_string(),
            reason: "expected '<id>_<name>'".to_string(),
        });
    };
    let id = digits
        .parse::<UnitId>()
        .map_err(|reason| DiscoveryError::BadIdentifier {
            file: file.to_string(),
            reason,
        })?;
    let name = MigrationName::parse(name).map_err(|e| DiscoveryError::BadName {
        file: file.to_string(),
        reason: e.to_string(),
    })?;
    Ok((id, name))
}

fn index_dir(
    dir: &Path,
    scope: &Scope,
    index: &mut BTreeMap<(Scope, UnitId), IndexedUnit>,
) -> DiscoveryResult<()> {
    let unreadable = |source| DiscoveryError::Unreadable {
        path: dir.display().to_string(),
        source,
    };

    let mut children: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        children.push(entry.map_err(unreadable)?.path());
    }
    children.sort();

    for path in children {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping non UTF-8 path {}", path.display());
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            let child = scope
                .child(file_name)
                .map_err(|reason| DiscoveryError::BadScope {
                    path: path.display().to_string(),
                    reason,
                })?;
            index_dir(&path, &child, index)?;
            continue;
        }

        let Some((stem, kind)) = classify(file_name) else {
            continue;
        };
        let (id, name) = parse_stem(stem, &path.display().to_string())?;

        let slot = index
            .entry((scope.clone(), id))
            .or_insert_with(|| IndexedUnit {
                id,
                name: name.clone(),
                scope: scope.clone(),
                inline: None,
                up: None,
                down: None,
            });

        // A second file for the same id must share the name and add a new kind.
        let conflict = if slot.name != name {
            slot_any(&slot.inline, &slot.up, &slot.down).cloned()
        } else {
            match kind {
                FileKind::Inline => slot.inline.clone(),
                FileKind::Up => slot.up.clone(),
                FileKind::Down => slot.down.clone(),
            }
        };
        if let Some(first) = conflict {
            return Err(DiscoveryError::DuplicateUnit {
                id: id.to_string(),
                scope: scope.to_string(),
                first: first.display().to_string(),
                second: path.display().to_string(),
            });
        }
        match kind {
            FileKind::Inline => slot.inline = Some(path),
            FileKind::Up => slot.up = Some(path),
            FileKind::Down => slot.down = Some(path),
        }
    }
    Ok(())
}

fn slot_any<'a>(
    inline: &'a Option<PathBuf>,
    up: &'a Option<PathBuf>,
    down: &'a Option<PathBuf>,
) -> Option<&'a PathBuf> {
    inline.as_ref().or(up.as_ref()).or(down.as_ref())
}

fn read_file(path: &Path) -> DiscoveryResult<String> {
    std::fs::read_to_string(path).map_err(|source| DiscoveryError::UnreadableFile {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Up,
    Down,
}

/// Recognise a section marker comment such as `-- up`, `-- migrate:down`,
/// `-- +up` or `-- Down migration`.
fn section_marker(line: &str) -> Option<Section> {
    let text = line.trim().strip_prefix("--")?;
    let text = text.trim_start_matches('-').trim().to_ascii_lowercase();
    let text = text
        .strip_prefix("migrate:")
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text.as_str())
        .trim();
    let (word, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let rest = rest.trim();
    if !(rest.is_empty() || rest == "migration") {
        return None;
    }
    match word {
        "up" => Some(Section::Up),
        "down" => Some(Section::Down),
        _ => None,
    }
}

/// Split an inline migration file into its up and down SQL.
///
/// Text before the first marker is treated as a header and dropped. A file
/// without any marker is entirely forward SQL. An empty or absent down
/// section means the unit is irreversible.
pub fn split_sections(content: &str) -> (String, Option<String>) {
    let has_markers = content.lines().any(|l| section_marker(l).is_some());
    if !has_markers {
        return (content.trim().to_string(), None);
    }

    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut current = None;
    for line in content.lines() {
        if let Some(section) = section_marker(line) {
            current = Some(section);
            continue;
        }
        match current {
            Some(Section::Up) => up.push(line),
            Some(Section::Down) => down.push(line),
            None => {}
        }
    }

    let up = up.join("\n").trim().to_string();
    let down = down.join("\n").trim().to_string();
    let down = (!is_blank_sql(&down)).then_some(down);
    (up, down)
}

#[cfg(test)]
#[path = "discovery_test.rs"]
mod tests;
