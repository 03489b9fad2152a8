//! Mesh loading for STL, OBJ, PLY, and 3MF.
//!
//! Every loader produces sub-meshes that are merged through
//! [`MeshBuilder`], so multi-object files come out as one mesh with valid
//! indices. Files without any face are rejected.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use hashbrown::HashMap;
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::builder::MeshBuilder;
use crate::error::{ProfileError, ProfileResult};
use crate::tracing_ext::OperationTimer;
use crate::types::Mesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Obj,
    Ply,
    ThreeMf,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "stl" => Some(MeshFormat::Stl),
                "obj" => Some(MeshFormat::Obj),
                "ply" => Some(MeshFormat::Ply),
                "3mf" => Some(MeshFormat::ThreeMf),
                _ => None,
            })
    }
}

/// Options controlling what a loader accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Fail with `DegenerateGeometry` when the total surface area is zero.
    ///
    /// Off by default: extraction guards every division and records a
    /// warning instead.
    #[serde(default)]
    pub reject_zero_area: bool,
}

impl Mesh {
    /// Load a mesh from file, auto-detecting format from extension.
    pub fn load(path: impl AsRef<Path>) -> ProfileResult<Self> {
        load_mesh(path.as_ref())
    }
}

/// Load a mesh with default options.
pub fn load_mesh(path: &Path) -> ProfileResult<Mesh> {
    load_mesh_with(path, &LoadOptions::default())
}

/// Load a mesh, auto-detecting format from extension.
pub fn load_mesh_with(path: &Path, options: &LoadOptions) -> ProfileResult<Mesh> {
    let format = MeshFormat::from_path(path).ok_or_else(|| ProfileError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })?;

    let _timer = OperationTimer::new("load_mesh");
    info!("Loading mesh from {:?} (format: {:?})", path, format);

    let mesh = match format {
        MeshFormat::Stl => load_stl(path)?,
        MeshFormat::Obj => load_obj(path)?,
        MeshFormat::Ply => load_ply(path)?,
        MeshFormat::ThreeMf => load_3mf(path)?,
    };

    if mesh.face_count() == 0 {
        return Err(ProfileError::empty_mesh(format!(
            "{} contains no triangles",
            path.display()
        )));
    }

    if let Some(bounds) = mesh.bounds() {
        let dims = bounds.extents();
        info!(
            "Loaded mesh: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
        debug!(
            "Bounding box: [{:.1}, {:.1}, {:.1}] to [{:.1}, {:.1}, {:.1}]",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );

        let max_dim = dims.x.max(dims.y).max(dims.z);
        if max_dim < 0.1 {
            warn!(
                "Mesh largest dimension is {:.6} - may be in meters rather than millimeters",
                max_dim
            );
        }
    }

    if options.reject_zero_area && mesh.surface_area() <= 0.0 {
        return Err(ProfileError::DegenerateGeometry {
            details: format!("{} faces with zero total area", mesh.face_count()),
        });
    }

    Ok(mesh)
}

fn open(path: &Path) -> ProfileResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ProfileError::io_read(path, e))
}

/// Load mesh from STL file (binary or ASCII).
fn load_stl(path: &Path) -> ProfileResult<Mesh> {
    let mut reader = open(path)?;

    let stl = stl_io::read_stl(&mut reader)
        .map_err(|e| ProfileError::parse_error(path, e.to_string()))?;

    let vertices: Vec<Point3<f64>> = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v.0[0] as f64, v.0[1] as f64, v.0[2] as f64))
        .collect();

    // stl_io merges identical positions, so collapsed triangles show up as
    // repeated indices.
    let faces = drop_collapsed_faces(
        stl.faces
            .iter()
            .map(|f| {
                [
                    f.vertices[0] as u32,
                    f.vertices[1] as u32,
                    f.vertices[2] as u32,
                ]
            })
            .collect(),
        "STL",
    );

    let mut builder = MeshBuilder::with_capacity(vertices.len(), faces.len());
    builder.push_part(vertices, faces)?;
    builder.build()
}

/// Load mesh from OBJ file; every object in the file becomes one scene part.
fn load_obj(path: &Path) -> ProfileResult<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| ProfileError::parse_error(path, e.to_string()))?;

    let mut builder = MeshBuilder::new();
    for model in models {
        let positions = &model.mesh.positions;
        let vertices: Vec<Point3<f64>> = positions
            .chunks_exact(3)
            .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64))
            .collect();
        let faces: Vec<[u32; 3]> = model
            .mesh
            .indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let faces = drop_collapsed_faces(faces, "OBJ");

        debug!(
            "OBJ model '{}': {} vertices, {} faces",
            model.name,
            vertices.len(),
            faces.len()
        );
        builder.push_part(vertices, faces)?;
    }

    debug!("OBJ merged {} models", builder.part_count());
    builder.build()
}

/// Load mesh from PLY file (ASCII or binary). Polygons are fan-triangulated.
fn load_ply(path: &Path) -> ProfileResult<Mesh> {
    use ply_rs::parser::Parser;
    use ply_rs::ply::Property;

    let mut reader = open(path)?;
    let parser = Parser::<ply_rs::ply::DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| ProfileError::parse_error(path, format!("PLY parse error: {:?}", e)))?;

    let mut vertices = Vec::new();
    if let Some(elements) = ply.payload.get("vertex") {
        vertices.reserve(elements.len());
        for element in elements {
            let x = ply_float(element.get("x"), "x", path)?;
            let y = ply_float(element.get("y"), "y", path)?;
            let z = ply_float(element.get("z"), "z", path)?;
            vertices.push(Point3::new(x, y, z));
        }
    }

    let mut faces = Vec::new();
    if let Some(elements) = ply.payload.get("face") {
        for element in elements {
            let polygon: Vec<u32> = match element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"))
            {
                Some(Property::ListInt(ids)) => ids.iter().map(|&i| i as u32).collect(),
                Some(Property::ListUInt(ids)) => ids.clone(),
                Some(Property::ListUChar(ids)) => ids.iter().map(|&i| i as u32).collect(),
                Some(Property::ListUShort(ids)) => ids.iter().map(|&i| i as u32).collect(),
                _ => continue,
            };
            if polygon.len() >= 3 {
                for i in 1..polygon.len() - 1 {
                    faces.push([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
        }
    }

    let faces = drop_collapsed_faces(faces, "PLY");
    debug!(
        "PLY loaded: {} vertices, {} faces",
        vertices.len(),
        faces.len()
    );

    let mut builder = MeshBuilder::with_capacity(vertices.len(), faces.len());
    builder.push_part(vertices, faces)?;
    builder.build()
}

fn ply_float(prop: Option<&ply_rs::ply::Property>, name: &str, path: &Path) -> ProfileResult<f64> {
    use ply_rs::ply::Property;

    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(ProfileError::parse_error(
            path,
            format!("missing or invalid PLY property: {}", name),
        )),
    }
}

/// Component nesting deeper than this is reported as a reference cycle.
const MAX_COMPONENT_DEPTH: usize = 16;
/// Upper bound on placed instances in one package.
const MAX_3MF_INSTANCES: usize = 65_536;

/// Load mesh from a 3MF package.
///
/// Every `<build><item>` becomes one placed instance: its object is expanded
/// through nested `<component>`s (following `p:path` into other model parts)
/// and each mesh is moved by the composed item and component transforms.
/// Two items naming the same object yield two copies. A root model without
/// build items instantiates each of its mesh objects in place.
fn load_3mf(path: &Path) -> ProfileResult<Mesh> {
    let file = File::open(path).map_err(|e| ProfileError::io_read(path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ProfileError::parse_error(path, format!("invalid 3MF archive: {}", e)))?;

    let root_name = find_3mf_model_path(&mut archive, path)?;
    let mut part_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.to_ascii_lowercase().ends_with(".model"))
        .map(String::from)
        .collect();
    if !part_names.contains(&root_name) {
        part_names.push(root_name.clone());
    }

    let mut models = HashMap::with_capacity(part_names.len());
    for name in part_names {
        let xml = read_archive_text(&mut archive, &name, path)?;
        let model = parse_3mf_model(&xml, path)?;
        models.insert(name, model);
    }

    let scene = ThreeMfScene {
        models: &models,
        path,
    };
    let root = scene.model(&root_name)?;
    let mut builder = MeshBuilder::new();
    if root.build.is_empty() {
        for (&id, object) in &root.objects {
            if matches!(object, ObjectDef::Mesh { .. }) {
                scene.instantiate(&root_name, id, &Matrix4::identity(), 0, &mut builder)?;
            }
        }
    } else {
        for item in &root.build {
            let part = item.path.as_deref().map_or(root_name.as_str(), part_name);
            scene.instantiate(part, item.object_id, &item.transform, 0, &mut builder)?;
        }
    }

    debug!("3MF merged {} placed instances", builder.part_count());
    builder.build()
}

/// Archive entry name for a `p:path` reference.
fn part_name(reference: &str) -> &str {
    reference.trim_start_matches('/')
}

/// Every model part of a package, parsed once, for instance expansion.
struct ThreeMfScene<'a> {
    models: &'a HashMap<String, ParsedModel>,
    path: &'a Path,
}

impl ThreeMfScene<'_> {
    fn model(&self, part: &str) -> ProfileResult<&ParsedModel> {
        self.models.get(part).ok_or_else(|| {
            ProfileError::parse_error(self.path, format!("missing model part '{}'", part))
        })
    }

    fn instantiate(
        &self,
        part: &str,
        object_id: u32,
        transform: &Matrix4<f64>,
        depth: usize,
        builder: &mut MeshBuilder,
    ) -> ProfileResult<()> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(ProfileError::parse_error(
                self.path,
                format!("components of object {} nest too deeply or form a cycle", object_id),
            ));
        }
        let object = self.model(part)?.objects.get(&object_id).ok_or_else(|| {
            ProfileError::parse_error(
                self.path,
                format!("object {} not found in '{}'", object_id, part),
            )
        })?;

        match object {
            ObjectDef::Mesh { vertices, faces } => {
                if builder.part_count() >= MAX_3MF_INSTANCES {
                    return Err(ProfileError::parse_error(
                        self.path,
                        format!("more than {} placed instances", MAX_3MF_INSTANCES),
                    ));
                }
                let placed = vertices.iter().map(|p| transform.transform_point(p)).collect();
                builder.push_part(placed, faces.clone())?;
            }
            ObjectDef::Components(components) => {
                for component in components {
                    let child = component.path.as_deref().map_or(part, part_name);
                    self.instantiate(
                        child,
                        component.object_id,
                        &(transform * component.transform),
                        depth + 1,
                        builder,
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn read_archive_text(
    archive: &mut zip::ZipArchive<File>,
    name: &str,
    path: &Path,
) -> ProfileResult<String> {
    let mut entry = archive.by_name(name).map_err(|e| {
        ProfileError::parse_error(path, format!("cannot open model part '{}': {}", name, e))
    })?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| ProfileError::io_read(path, e))?;
    Ok(text)
}

/// Find the root model part in a 3MF archive.
fn find_3mf_model_path(archive: &mut zip::ZipArchive<File>, path: &Path) -> ProfileResult<String> {
    let candidates = ["3D/3dmodel.model", "3d/3dmodel.model", "3D/3DModel.model"];
    for candidate in candidates {
        if archive.by_name(candidate).is_ok() {
            return Ok(candidate.to_string());
        }
    }

    for i in 0..archive.len() {
        if let Ok(file) = archive.by_index(i) {
            if file.name().to_lowercase().ends_with(".model") {
                return Ok(file.name().to_string());
            }
        }
    }

    Err(ProfileError::parse_error(path, "no model part found in 3MF archive"))
}

/// A reference to an object: a build item or a component.
#[derive(Debug, Clone, PartialEq)]
struct Instance {
    object_id: u32,
    /// Model part holding the object, when it is not the current one.
    path: Option<String>,
    transform: Matrix4<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum ObjectDef {
    Mesh {
        vertices: Vec<Point3<f64>>,
        faces: Vec<[u32; 3]>,
    },
    Components(Vec<Instance>),
}

#[derive(Debug, Default)]
struct ParsedModel {
    objects: BTreeMap<u32, ObjectDef>,
    build: Vec<Instance>,
}

/// Parse a 3MF `transform` attribute.
///
/// The twelve values are the 4×3 matrix `m00 m01 m02 m10 m11 m12 m20 m21 m22
/// m30 m31 m32` applied to row vectors, so the last three are the
/// translation.
fn parse_3mf_transform(text: &str, path: &Path) -> ProfileResult<Matrix4<f64>> {
    let invalid = || ProfileError::parse_error(path, format!("invalid transform '{}'", text));
    let values: Vec<f64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    let &[m00, m01, m02, m10, m11, m12, m20, m21, m22, m30, m31, m32] = values.as_slice() else {
        return Err(invalid());
    };
    if !values.iter().all(|v| v.is_finite()) {
        return Err(invalid());
    }
    Ok(Matrix4::new(
        m00, m10, m20, m30, //
        m01, m11, m21, m31, //
        m02, m12, m22, m32, //
        0.0, 0.0, 0.0, 1.0,
    ))
}

/// Parse 3MF model XML into objects and build items.
fn parse_3mf_model(xml: &str, path: &Path) -> ProfileResult<ParsedModel> {
    use quick_xml::Reader;
    use quick_xml::events::{BytesStart, Event};

    fn attr_str(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
        e.attributes()
            .flatten()
            .find(|a| a.key.local_name().as_ref() == key)
            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
    }

    fn attr_parse<T: FromStr>(e: &BytesStart<'_>, key: &[u8], path: &Path) -> ProfileResult<T> {
        let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let name = String::from_utf8_lossy(key).into_owned();
        let raw = attr_str(e, key).ok_or_else(|| {
            ProfileError::parse_error(path, format!("<{}> is missing '{}'", tag, name))
        })?;
        raw.trim().parse().map_err(|_| {
            ProfileError::parse_error(path, format!("<{}> has an invalid '{}': {}", tag, name, raw))
        })
    }

    fn instance(e: &BytesStart<'_>, path: &Path) -> ProfileResult<Instance> {
        let transform = match attr_str(e, b"transform") {
            Some(text) => parse_3mf_transform(&text, path)?,
            None => Matrix4::identity(),
        };
        Ok(Instance {
            object_id: attr_parse(e, b"objectid", path)?,
            path: attr_str(e, b"path"),
            transform,
        })
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut model = ParsedModel::default();
    let mut current_object: Option<u32> = None;
    let mut components = Vec::new();
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    let mut in_mesh = false;

    loop {
        let (e, opens) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, true),
            Ok(Event::Empty(e)) => (e, false),
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"mesh" if in_mesh => {
                        in_mesh = false;
                        if let Some(id) = current_object {
                            let faces = drop_collapsed_faces(std::mem::take(&mut faces), "3MF");
                            model.objects.insert(
                                id,
                                ObjectDef::Mesh {
                                    vertices: std::mem::take(&mut vertices),
                                    faces,
                                },
                            );
                        }
                    }
                    b"object" => {
                        if let Some(id) = current_object.take() {
                            if !components.is_empty() {
                                model
                                    .objects
                                    .entry(id)
                                    .or_insert(ObjectDef::Components(std::mem::take(
                                        &mut components,
                                    )));
                            }
                        }
                    }
                    _ => {}
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProfileError::parse_error(
                    path,
                    format!("XML parse error: {}", e),
                ));
            }
            _ => continue,
        };

        match e.local_name().as_ref() {
            b"object" if opens => {
                current_object = Some(attr_parse(&e, b"id", path)?);
                components.clear();
            }
            b"mesh" if opens => {
                in_mesh = true;
                vertices.clear();
                faces.clear();
            }
            b"vertex" if in_mesh => {
                vertices.push(Point3::new(
                    attr_parse(&e, b"x", path)?,
                    attr_parse(&e, b"y", path)?,
                    attr_parse(&e, b"z", path)?,
                ));
            }
            b"triangle" if in_mesh => {
                faces.push([
                    attr_parse(&e, b"v1", path)?,
                    attr_parse(&e, b"v2", path)?,
                    attr_parse(&e, b"v3", path)?,
                ]);
            }
            b"component" if current_object.is_some() => components.push(instance(&e, path)?),
            b"item" => model.build.push(instance(&e, path)?),
            _ => {}
        }
    }

    Ok(model)
}

/// Drop triangles that repeat a vertex index. They have no area and no
/// proper edges, so every loader removes them before building the mesh.
fn drop_collapsed_faces(faces: Vec<[u32; 3]>, format: &str) -> Vec<[u32; 3]> {
    let total = faces.len();
    let kept: Vec<[u32; 3]> = faces
        .into_iter()
        .filter(|&[a, b, c]| a != b && b != c && a != c)
        .collect();
    if kept.len() < total {
        debug!(
            "Skipped {} {} triangles with repeated vertices",
            total - kept.len(),
            format
        );
    }
    kept
}
