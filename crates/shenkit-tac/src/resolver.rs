//! The archive resolver: data files to a virtual filesystem of typed entries.

use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use rustc_hash::FxHashMap;
use shenkit_common::{ByteSource, FourCC, SharedBytes};
use tracing::{debug, info, warn};

use crate::cache::InflateCache;
use crate::container::{parse_container, DirectoryRecord};
use crate::decompress::SeekableInflate;
use crate::entry::{Entry, EntryId};
use crate::index::{read_index, validate_records, IndexRecord};
use crate::kind::{classify, classify_extension, is_gzip, FileKind};
use crate::textures::{TextureIndex, TextureNameEntry, TextureScope};
use crate::{Error, Result};

/// A directory of `.tac`/`.tad` pairs, addressed by a short label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    /// First segment of every logical path from this directory.
    pub label: String,
    /// Directory holding the data files.
    pub dir: PathBuf,
}

impl SourceRoot {
    /// Create a source root.
    pub fn new(label: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            dir: dir.into(),
        }
    }
}

/// Resolver build options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Deepest container nesting that is expanded. Top-level packs are at
    /// depth 0.
    pub max_depth: usize,
    /// Glob pattern selecting data files inside each source directory.
    pub pattern: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_depth: 8,
            pattern: "*.tac".to_string(),
        }
    }
}

/// One data file and its index.
pub struct Archive {
    /// Source label.
    pub source: String,
    /// Data-file stem up to the first `_`.
    pub container_id: String,
    /// Path of the `.tac` data file.
    pub data_path: PathBuf,
    /// Path of the `.tad` index file.
    pub index_path: PathBuf,
    /// Index records, in file order.
    pub records: Vec<IndexRecord>,
    data: SharedBytes,
    paths: FxHashMap<String, EntryId>,
    top_level: Vec<EntryId>,
}

impl Archive {
    /// `source/container` prefix of every path in this archive.
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.source, self.container_id)
    }

    /// Size of the data file.
    pub fn data_len(&self) -> usize {
        (*self.data).as_ref().len()
    }

    /// Top-level entries, in index order.
    pub fn top_level(&self) -> &[EntryId] {
        &self.top_level
    }

    /// Number of entries addressable in this archive, nested ones included.
    pub fn entry_count(&self) -> usize {
        self.paths.len()
    }

    fn data_source(&self) -> ByteSource {
        ByteSource::from_shared(Arc::clone(&self.data))
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("source", &self.source)
            .field("container_id", &self.container_id)
            .field("data_path", &self.data_path)
            .field("records", &self.records.len())
            .finish()
    }
}

/// Summary counts over a resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverStats {
    /// Data files loaded.
    pub archives: usize,
    /// All entries, nested ones included.
    pub entries: usize,
    /// Entries with no parent.
    pub top_level: usize,
    /// Gzip-compressed entries.
    pub compressed: usize,
    /// Entries with at least one child.
    pub containers: usize,
    /// Distinct registered texture names.
    pub texture_names: usize,
    /// Entries whose type was not recognised.
    pub unknown: usize,
    /// Entries per recognised kind, in table order.
    pub by_kind: Vec<(FileKind, usize)>,
    /// Payloads currently held by the inflate cache.
    pub cached_payloads: usize,
}

/// First look at an entry's raw bytes.
#[derive(Debug, Clone, Copy)]
struct Sniff {
    magic: FourCC,
    compressed: bool,
    content_length: u64,
}

fn sniff(raw: &[u8]) -> Sniff {
    if is_gzip(raw) {
        match inflate_head(raw) {
            Ok((magic, content_length)) => {
                return Sniff {
                    magic,
                    compressed: true,
                    content_length,
                }
            }
            Err(e) => warn!(error = %e, "unreadable gzip member, treating as raw bytes"),
        }
    }

    Sniff {
        magic: FourCC::from_prefix(raw),
        compressed: false,
        content_length: raw.len() as u64,
    }
}

fn inflate_head(raw: &[u8]) -> Result<(FourCC, u64)> {
    let inflate = SeekableInflate::new(Cursor::new(raw))?;
    let len = inflate.len();
    let mut head = Vec::with_capacity(4);
    inflate
        .take(4)
        .read_to_end(&mut head)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    Ok((FourCC::from_prefix(&head), len))
}

/// Container id of a data file: its stem up to the first `_`.
///
/// The remainder of the stem is a per-release hash.
pub fn container_id(data_path: &Path) -> String {
    let stem = data_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.find('_') {
        Some(pos) => stem[..pos].to_string(),
        None => stem,
    }
}

/// Navigable view over every entry of a set of data files.
///
/// Built eagerly: every index is read, every entry sniffed, and every
/// container expanded before the resolver is returned. Content is inflated
/// lazily on [`open_entry`](Self::open_entry).
pub struct ArchiveResolver {
    options: ResolverOptions,
    archives: Vec<Archive>,
    by_prefix: FxHashMap<String, usize>,
    entries: Vec<Entry>,
    by_kind: FxHashMap<FileKind, Vec<EntryId>>,
    unknown: FxHashMap<String, usize>,
    model_owners: FxHashMap<String, Vec<EntryId>>,
    textures: TextureIndex,
    cache: InflateCache,
}

impl ArchiveResolver {
    /// Create an empty resolver.
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            archives: Vec::new(),
            by_prefix: FxHashMap::default(),
            entries: Vec::new(),
            by_kind: FxHashMap::default(),
            unknown: FxHashMap::default(),
            model_owners: FxHashMap::default(),
            textures: TextureIndex::new(),
            cache: InflateCache::new(),
        }
    }

    /// Load every data file matched under each source root.
    ///
    /// Any missing index or corrupt index aborts the whole build.
    pub fn open(sources: &[SourceRoot], options: ResolverOptions) -> Result<Self> {
        let mut resolver = Self::new(options);

        for source in sources {
            if !source.dir.is_dir() {
                return Err(Error::MissingDataFile(source.dir.clone()));
            }

            let pattern = source.dir.join(&resolver.options.pattern);
            let mut data_files = Vec::new();
            for path in glob::glob(&pattern.to_string_lossy())? {
                data_files.push(path.map_err(|e| Error::Io(e.into_error()))?);
            }
            data_files.sort();

            for data_path in data_files {
                resolver.add_archive(&source.label, &data_path)?;
            }
        }

        info!(
            archives = resolver.archives.len(),
            entries = resolver.entries.len(),
            "archive tree built"
        );
        Ok(resolver)
    }

    /// Load one data file and its sibling `.tad` index.
    ///
    /// Returns the archive's position in [`archives`](Self::archives).
    pub fn add_archive(&mut self, source: &str, data_path: &Path) -> Result<usize> {
        let index_path = data_path.with_extension("tad");
        if !data_path.is_file() {
            return Err(Error::MissingDataFile(data_path.to_path_buf()));
        }
        let records = read_index(&index_path)?;

        let file = File::open(data_path)?;
        // SAFETY: the data file is opened read-only and not modified while
        // the resolver is alive.
        let mmap = unsafe { Mmap::map(&file)? };
        validate_records(&records, mmap.len() as u64)
            .map_err(|e| Error::CorruptIndex(format!("{}: {e}", index_path.display())))?;

        let archive_index = self.archives.len();
        let archive = Archive {
            source: source.to_string(),
            container_id: container_id(data_path),
            data_path: data_path.to_path_buf(),
            index_path,
            records,
            data: Arc::new(mmap),
            paths: FxHashMap::default(),
            top_level: Vec::new(),
        };
        let prefix = archive.prefix();
        debug!(%prefix, records = archive.records.len(), "loading archive");

        let sniffed = Self::sniff_records(&archive);
        let records = archive.records.clone();
        self.by_prefix.insert(prefix.clone(), archive_index);
        self.archives.push(archive);

        let mut containers = Vec::new();
        for (record, sniffed) in records.iter().zip(sniffed) {
            let hash = record.hash_hex();
            let (kind, type_tag) = self.kind_of(&sniffed.magic, None);
            let key = self.unique_key(archive_index, hash);
            let id = self.push_entry(Entry {
                path: format!("{prefix}/{key}"),
                name: sniffed.magic.to_text(),
                archive: archive_index,
                parent: None,
                children: Vec::new(),
                offset: u64::from(record.offset),
                length: u64::from(record.length),
                compressed: sniffed.compressed,
                content_length: sniffed.content_length,
                magic: sniffed.magic,
                type_tag,
                kind,
            });
            self.archives[archive_index].paths.insert(key, id);
            self.archives[archive_index].top_level.push(id);

            if kind.and_then(FileKind::container).is_some() {
                containers.push(id);
            }
        }

        for id in containers {
            self.expand_container(id, 0);
        }

        Ok(archive_index)
    }

    #[cfg(feature = "parallel")]
    fn sniff_records(archive: &Archive) -> Vec<Sniff> {
        use rayon::prelude::*;

        let data = (*archive.data).as_ref();
        archive
            .records
            .par_iter()
            .map(|record| sniff(record_bytes(data, record)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn sniff_records(archive: &Archive) -> Vec<Sniff> {
        let data = (*archive.data).as_ref();
        archive
            .records
            .iter()
            .map(|record| sniff(record_bytes(data, record)))
            .collect()
    }

    /// Unpack a container entry's directory into child entries.
    ///
    /// Failures only skip this container; the rest of the tree still builds.
    fn expand_container(&mut self, id: EntryId, depth: usize) {
        let Some(container) = self.entries[id.index()].kind.and_then(FileKind::container) else {
            return;
        };
        if depth > self.options.max_depth {
            warn!(path = %self.entries[id.index()].path, depth, "container nesting too deep, not expanded");
            return;
        }

        let content = match self.open_entry(id) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.entries[id.index()].path, error = %e, "cannot open container");
                return;
            }
        };
        let layout = match parse_container(container, content.as_slice()) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(path = %self.entries[id.index()].path, error = %e, "malformed container");
                return;
            }
        };

        for texture in layout.textures {
            self.textures.register(texture.name, id, texture.offset);
        }

        let mut nested = Vec::new();
        for record in &layout.records {
            if let Some(child) = self.push_child(id, record, &content) {
                if self.entries[child.index()].kind.and_then(FileKind::container).is_some() {
                    nested.push(child);
                }
            }
        }

        for child in nested {
            self.expand_container(child, depth + 1);
        }
    }

    fn push_child(&mut self, parent: EntryId, record: &DirectoryRecord, content: &ByteSource) -> Option<EntryId> {
        let (archive_index, parent_path) = {
            let parent_entry = &self.entries[parent.index()];
            (parent_entry.archive, parent_entry.path.clone())
        };

        let raw = match content.sub_source(record.offset as usize, record.length as usize) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    parent = %parent_path,
                    child = %record.name,
                    error = %e,
                    "directory record outside its container"
                );
                return None;
            }
        };
        let sniffed = sniff(raw.as_slice());
        let (kind, type_tag) = self.kind_of(&sniffed.magic, Some(&record.ext));

        let (dir, parent_key) = parent_path.rsplit_once('/').unwrap_or(("", &parent_path));
        let key = self.unique_key(archive_index, format!("{parent_key}_{}", record.name));
        let path = format!("{dir}/{key}");

        let id = self.push_entry(Entry {
            path,
            name: format!("{}.{}", record.name, record.ext),
            archive: archive_index,
            parent: Some(parent),
            children: Vec::new(),
            offset: record.offset,
            length: record.length,
            compressed: sniffed.compressed,
            content_length: sniffed.content_length,
            magic: sniffed.magic,
            type_tag,
            kind,
        });
        self.archives[archive_index].paths.insert(key, id);
        self.entries[parent.index()].children.push(id);

        if kind == Some(FileKind::Model) {
            let owners = self.model_owners.entry(record.name.to_ascii_uppercase()).or_default();
            if !owners.contains(&parent) {
                owners.push(parent);
            }
        }

        Some(id)
    }

    /// Resolve the kind and type tag, tallying unrecognised types.
    fn kind_of(&mut self, magic: &FourCC, ext: Option<&str>) -> (Option<FileKind>, String) {
        if let Some(kind) = classify(magic) {
            return (Some(kind), magic.to_text());
        }
        if let Some(kind) = ext.and_then(classify_extension) {
            return (Some(kind), ext.unwrap_or_default().to_string());
        }

        let tag = magic.to_text();
        let count = self.unknown.entry(tag.clone()).or_insert(0);
        if *count == 0 {
            warn!(tag = %tag, "unrecognised entry type");
        }
        *count += 1;
        (None, tag)
    }

    /// Apply the collision rule: the first claimant keeps `base`, later ones
    /// get `base1`, `base2`, ... in discovery order.
    fn unique_key(&self, archive_index: usize, base: String) -> String {
        let paths = &self.archives[archive_index].paths;
        if !paths.contains_key(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !paths.contains_key(candidate))
            .unwrap_or(base)
    }

    fn push_entry(&mut self, entry: Entry) -> EntryId {
        let id = EntryId(self.entries.len() as u32);
        if let Some(kind) = entry.kind {
            self.by_kind.entry(kind).or_default().push(id);
        }
        self.entries.push(entry);
        id
    }

    /// Build options in effect.
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Loaded data files, in load order.
    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    /// Look up an entry.
    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.index())
    }

    fn get(&self, id: EntryId) -> Result<&Entry> {
        self.entry(id)
            .ok_or_else(|| Error::EntryNotFound(format!("entry {id}")))
    }

    /// Every entry with its id, in discovery order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &Entry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (EntryId(i as u32), entry))
    }

    /// Number of entries, nested ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one kind, in discovery order.
    pub fn list_entries(&self, kind: FileKind) -> &[EntryId] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Map a logical path `source/container/HASH[_child[N]]` to its entry.
    pub fn resolve(&self, path: &str) -> Result<EntryId> {
        let path = path.trim_matches('/');
        let mut parts = path.splitn(3, '/');
        let (Some(source), Some(container), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidPath(path.to_string()));
        };

        self.by_prefix
            .get(&format!("{source}/{container}"))
            .and_then(|&archive| self.archives[archive].paths.get(rest))
            .copied()
            .ok_or_else(|| Error::EntryNotFound(path.to_string()))
    }

    /// Bounded, independently seekable view over an entry's content.
    ///
    /// Compressed entries are inflated once and served from the cache. A
    /// child's range is cut from its parent's content, so nesting under
    /// compressed parents needs no special casing.
    pub fn open_entry(&self, id: EntryId) -> Result<ByteSource> {
        let entry = self.get(id)?;
        let container = match entry.parent {
            Some(parent) => self.open_entry(parent)?,
            None => self.archives[entry.archive].data_source(),
        };
        let raw = container.sub_source(entry.offset as usize, entry.length as usize)?;
        if !entry.compressed {
            return Ok(raw);
        }

        let bytes = self
            .cache
            .get_or_try_insert_with(id, || SeekableInflate::new(raw)?.read_all())?;
        Ok(ByteSource::from_shared(bytes))
    }

    /// Raw, still-compressed bytes of an entry.
    pub fn open_raw(&self, id: EntryId) -> Result<ByteSource> {
        let entry = self.get(id)?;
        let container = match entry.parent {
            Some(parent) => self.open_entry(parent)?,
            None => self.archives[entry.archive].data_source(),
        };
        Ok(container.sub_source(entry.offset as usize, entry.length as usize)?)
    }

    /// Containers that own a model child for every one of `names`.
    ///
    /// Names compare ASCII case-insensitively. No names, or no container
    /// common to all of them, yields an empty list.
    pub fn find_container_candidates<I, S>(&self, names: I) -> Vec<EntryId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates: Option<Vec<EntryId>> = None;

        for name in names {
            let owners = self
                .model_owners
                .get(&name.as_ref().to_ascii_uppercase())
                .map_or(&[][..], Vec::as_slice);

            let next = match candidates {
                None => owners.to_vec(),
                Some(current) => current.into_iter().filter(|c| owners.contains(c)).collect(),
            };
            if next.is_empty() {
                return Vec::new();
            }
            candidates = Some(next);
        }

        candidates.unwrap_or_default()
    }

    /// Containers owning a model child named `name`.
    pub fn model_owners(&self, name: &str) -> &[EntryId] {
        self.model_owners
            .get(&name.to_ascii_uppercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Whether `id` is `ancestor` or nested anywhere below it.
    pub fn is_within(&self, id: EntryId, ancestor: EntryId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.entry(cur).and_then(|e| e.parent);
        }
        false
    }

    /// Registration chosen for a texture name under `scope`.
    pub fn texture_entry(&self, name: &str, scope: TextureScope) -> Option<TextureNameEntry> {
        self.textures
            .lookup(name, scope, |candidate, container| self.is_within(candidate, container))
    }

    /// Content of a named texture, starting at its texture node.
    pub fn texture_source(&self, name: &str, scope: TextureScope) -> Result<ByteSource> {
        let texture = self
            .texture_entry(name, scope)
            .ok_or_else(|| Error::EntryNotFound(format!("texture {name}")))?;
        Ok(self.open_entry(texture.entry)?.tail(texture.offset as usize)?)
    }

    /// The texture-name index.
    pub fn textures(&self) -> &TextureIndex {
        &self.textures
    }

    /// Unrecognised type tags with their counts, most frequent first.
    pub fn unknown_types(&self) -> Vec<(String, usize)> {
        let mut tally: Vec<_> = self.unknown.iter().map(|(k, &v)| (k.clone(), v)).collect();
        tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tally
    }

    /// Write an entry's content to `root/<logical path>`.
    pub fn extract(&self, id: EntryId, root: &Path) -> Result<PathBuf> {
        let entry = self.get(id)?;
        let target = root.join(&entry.path);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&target, self.open_entry(id)?.as_slice())?;
        Ok(target)
    }

    /// The inflate cache.
    pub fn cache(&self) -> &InflateCache {
        &self.cache
    }

    /// Summary counts.
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            archives: self.archives.len(),
            entries: self.entries.len(),
            top_level: self.entries.iter().filter(|e| e.parent.is_none()).count(),
            compressed: self.entries.iter().filter(|e| e.compressed).count(),
            containers: self.entries.iter().filter(|e| !e.children.is_empty()).count(),
            texture_names: self.textures.len(),
            unknown: self.unknown.values().sum(),
            by_kind: FileKind::ALL
                .into_iter()
                .map(|kind| (kind, self.list_entries(kind).len()))
                .filter(|(_, count)| *count > 0)
                .collect(),
            cached_payloads: self.cache.len(),
        }
    }
}

fn record_bytes<'a>(data: &'a [u8], record: &IndexRecord) -> &'a [u8] {
    let (offset, length) = (record.offset as usize, record.length as usize);
    data.get(offset..offset + length).unwrap_or_default()
}
