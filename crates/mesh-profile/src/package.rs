//! Open Packaging Conventions document and archive writer.
//!
//! A [`PackageDocument`] holds the payload parts, the content-type manifest,
//! and the relationship graph. The manifest (`[Content_Types].xml`) and the
//! relationship parts (`_rels/*.rels`) are generated from that state when the
//! archive is written, so they always agree with it.
//!
//! [`PackageDocument::validate`] checks the structural rules a consumer
//! relies on: every relationship target and every content-type override
//! names an existing part, every part has a content type, no part is the
//! target of more than one 3D-model relationship, and the relationship
//! graph has no cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use hashbrown::HashMap;
use quick_xml::escape::escape;
use tracing::{debug, info};

use crate::error::{ProfileError, ProfileResult};
use crate::tracing_ext::{OperationTimer, log_artifact, log_package_part};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

pub const RELATIONSHIPS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-package.relationships+xml";
pub const MODEL_CONTENT_TYPE: &str = "application/vnd.ms-package.3dmanufacturing-3dmodel+xml";
pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "application/xml";

pub const MODEL_RELATIONSHIP: &str = "http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel";
pub const THUMBNAIL_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// A directed edge in the package relationship graph.
///
/// Part names are stored without a leading slash. An empty `source` is the
/// package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub source: String,
    pub id: String,
    pub target: String,
    pub kind: String,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        id: impl Into<String>,
        target: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            target: target.into(),
            kind: kind.into(),
        }
    }

    /// Name of the `.rels` part that stores relationships of `source`.
    pub fn rels_part_for(source: &str) -> String {
        match source.rsplit_once('/') {
            None if source.is_empty() => "_rels/.rels".to_string(),
            None => format!("_rels/{}.rels", source),
            Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        }
    }
}

/// Content-type manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Extension (lowercase, no dot) to content type.
    pub defaults: BTreeMap<String, String>,
    /// Part name to content type.
    pub overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    /// Content type a part resolves to; overrides win.
    pub fn resolve(&self, part: &str) -> Option<&str> {
        if let Some(ct) = self.overrides.get(part) {
            return Some(ct);
        }
        let ext = part.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<Types xmlns=\"{}\">\n", CONTENT_TYPES_NS));
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                "  <Default Extension=\"{}\" ContentType=\"{}\"/>\n",
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                "  <Override PartName=\"/{}\" ContentType=\"{}\"/>\n",
                escape(part.as_str()),
                escape(ct.as_str())
            ));
        }
        xml.push_str("</Types>\n");
        xml
    }
}

/// An in-memory package, built fresh for each export.
#[derive(Debug, Clone, Default)]
pub struct PackageDocument {
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
    relationships: Vec<Relationship>,
}

impl PackageDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a payload part.
    pub fn add_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        let name = name.into();
        log_package_part(&name, bytes.len());
        self.parts.insert(name, bytes);
        self
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) -> &mut Self {
        self.content_types
            .defaults
            .insert(extension.to_ascii_lowercase(), content_type.to_string());
        self
    }

    pub fn add_override(&mut self, part: &str, content_type: &str) -> &mut Self {
        self.content_types
            .overrides
            .insert(part.to_string(), content_type.to_string());
        self
    }

    pub fn add_relationship(&mut self, rel: Relationship) -> &mut Self {
        self.relationships.push(rel);
        self
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships grouped by the `.rels` part that stores them.
    fn rels_parts(&self) -> BTreeMap<String, Vec<&Relationship>> {
        let mut grouped: BTreeMap<String, Vec<&Relationship>> = BTreeMap::new();
        for rel in &self.relationships {
            grouped
                .entry(Relationship::rels_part_for(&rel.source))
                .or_default()
                .push(rel);
        }
        grouped
    }

    fn relationships_xml(rels: &[&Relationship]) -> String {
        let mut xml = String::with_capacity(256);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<Relationships xmlns=\"{}\">\n", RELATIONSHIPS_NS));
        for rel in rels {
            xml.push_str(&format!(
                "  <Relationship Target=\"/{}\" Id=\"{}\" Type=\"{}\"/>\n",
                escape(rel.target.as_str()),
                escape(rel.id.as_str()),
                escape(rel.kind.as_str())
            ));
        }
        xml.push_str("</Relationships>\n");
        xml
    }

    /// Every archive entry in write order: manifest, relationship parts,
    /// then payload parts.
    pub fn archive_entries(&self) -> Vec<(String, Vec<u8>)> {
        let mut entries = Vec::with_capacity(self.parts.len() + 3);
        entries.push((
            CONTENT_TYPES_PART.to_string(),
            self.content_types.to_xml().into_bytes(),
        ));
        for (name, rels) in self.rels_parts() {
            entries.push((name, Self::relationships_xml(&rels).into_bytes()));
        }
        for (name, bytes) in &self.parts {
            entries.push((name.clone(), bytes.clone()));
        }
        entries
    }

    /// Check the structural rules of the package.
    pub fn validate(&self) -> ProfileResult<()> {
        let exists = |name: &str| self.parts.contains_key(name);

        for rel in &self.relationships {
            let referrer = Relationship::rels_part_for(&rel.source);
            if !rel.source.is_empty() && !exists(&rel.source) {
                return Err(ProfileError::missing_part(referrer, rel.source.clone()));
            }
            if !exists(&rel.target) {
                return Err(ProfileError::missing_part(referrer, rel.target.clone()));
            }
        }

        for part in self.content_types.overrides.keys() {
            if !exists(part) {
                return Err(ProfileError::missing_part(CONTENT_TYPES_PART, part.clone()));
            }
        }

        for part in self.parts.keys() {
            if self.content_types.resolve(part).is_none() {
                return Err(ProfileError::UncoveredContentType { part: part.clone() });
            }
        }
        for rels_part in self.rels_parts().keys() {
            if self.content_types.resolve(rels_part).is_none() {
                return Err(ProfileError::UncoveredContentType {
                    part: rels_part.clone(),
                });
            }
        }

        let mut ids = BTreeSet::new();
        let mut model_edges: HashMap<&str, usize> = HashMap::new();
        for rel in &self.relationships {
            if !ids.insert((rel.source.as_str(), rel.id.as_str())) {
                return Err(ProfileError::InvalidRelationships {
                    details: format!(
                        "duplicate relationship id {} in {}",
                        rel.id,
                        Relationship::rels_part_for(&rel.source)
                    ),
                });
            }
            if rel.kind == MODEL_RELATIONSHIP {
                let count = model_edges.entry(rel.target.as_str()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    return Err(ProfileError::InvalidRelationships {
                        details: format!("{} is the target of more than one model relationship", rel.target),
                    });
                }
            }
        }

        if !self
            .relationships
            .iter()
            .any(|r| r.source.is_empty() && r.kind == MODEL_RELATIONSHIP)
        {
            return Err(ProfileError::InvalidRelationships {
                details: "package root has no 3D model relationship".to_string(),
            });
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> ProfileResult<()> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for rel in &self.relationships {
            edges
                .entry(rel.source.as_str())
                .or_default()
                .push(rel.target.as_str());
        }

        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<&str, u8> = HashMap::new();
        let mut starts: Vec<&str> = edges.keys().copied().collect();
        starts.sort_unstable();

        for start in starts {
            if state.get(start).copied().unwrap_or(0) != 0 {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            state.insert(start, 1);
            while let Some((node, next)) = stack.pop() {
                let children = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
                if next < children.len() {
                    stack.push((node, next + 1));
                    let child = children[next];
                    match state.get(child).copied().unwrap_or(0) {
                        1 => {
                            return Err(ProfileError::InvalidRelationships {
                                details: format!("relationship cycle through {}", child),
                            });
                        }
                        0 => {
                            state.insert(child, 1);
                            stack.push((child, 0));
                        }
                        _ => {}
                    }
                } else {
                    state.insert(node, 2);
                }
            }
        }
        Ok(())
    }
}

/// Validate and write a package to `path`.
///
/// The archive is written to a temporary file in the destination directory
/// and renamed into place, so a failure never leaves a partial archive at
/// `path`. Every entry is Deflate-compressed.
pub fn write_package(doc: &PackageDocument, path: &Path) -> ProfileResult<()> {
    let _timer = OperationTimer::new("write_package");
    doc.validate()?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".mesh-profile-")
        .suffix(".3mf.tmp")
        .tempfile_in(dir)
        .map_err(|e| ProfileError::ArchiveWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

    {
        let mut zip = zip::ZipWriter::new(tmp.as_file_mut());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in doc.archive_entries() {
            zip.start_file(name.as_str(), options)
                .map_err(|e| ProfileError::archive_write(path, e))?;
            zip.write_all(&bytes).map_err(|e| ProfileError::ArchiveWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
            debug!(part = %name, bytes = bytes.len(), "Archived part");
        }
        zip.finish().map_err(|e| ProfileError::archive_write(path, e))?;
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| ProfileError::ArchiveWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    let file = tmp.persist(path).map_err(|e| ProfileError::ArchiveWrite {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    let bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
    log_artifact("package", path, bytes);
    info!(parts = doc.part_count(), "Package written");
    Ok(())
}
