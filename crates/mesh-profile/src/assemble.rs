//! Build a [`PackageDocument`] for a placed mesh.
//!
//! Geometry is written re-centered (X/Y around the bounding-box center, Z
//! from 0) and the placement is carried only by the build item's
//! `transform` attribute. Which metadata parts are added is decided by the
//! consumer's [`ConsumerPolicy`](crate::consumer::ConsumerPolicy).

use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consumer::{ConsumerPolicy, ConsumerVariant, OBJECT_MODEL_PART, ROOT_MODEL_PART};
use crate::error::{ProfileError, ProfileResult};
use crate::package::{
    JSON_CONTENT_TYPE, MODEL_CONTENT_TYPE, MODEL_RELATIONSHIP, PNG_CONTENT_TYPE, PackageDocument,
    RELATIONSHIPS_CONTENT_TYPE, Relationship, THUMBNAIL_RELATIONSHIP, XML_CONTENT_TYPE,
    write_package,
};
use crate::settings::SettingsTable;
use crate::tracing_ext::OperationTimer;
use crate::transform::{AffineTransform, format_number};
use crate::types::Mesh;

const CORE_NS: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";
const PRODUCTION_NS: &str = "http://schemas.microsoft.com/3dmanufacturing/production/2015/06";
const BAMBU_NS: &str = "http://schemas.bambulab.com/package/2021";

const IDENTITY_3MF: &str = "1 0 0 0 1 0 0 0 1 0 0 0";

/// Descriptive values written into the package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    pub title: String,
    pub application: String,
    /// Object name shown by the slicer.
    pub object_name: String,
    /// Layer height recorded in the plate metadata.
    pub layer_height: f64,
    pub created: DateTime<Utc>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            title: "Mesh Profile Model".to_string(),
            application: format!("mesh-profile {}", env!("CARGO_PKG_VERSION")),
            object_name: "Object_1".to_string(),
            layer_height: 0.2,
            created: Utc::now(),
        }
    }
}

/// Assemble the package for one mesh.
pub fn assemble_package(
    mesh: &Mesh,
    transform: &AffineTransform,
    settings: &SettingsTable,
    variant: ConsumerVariant,
    options: &PackageOptions,
) -> ProfileResult<PackageDocument> {
    let _timer = OperationTimer::for_mesh("assemble_package", mesh);
    if mesh.face_count() == 0 {
        return Err(ProfileError::EmptyGeometry);
    }

    let policy = variant.policy();
    let centered = mesh.centered();
    let mut doc = PackageDocument::new();

    doc.add_default("rels", RELATIONSHIPS_CONTENT_TYPE)
        .add_default("model", MODEL_CONTENT_TYPE)
        .add_override(ROOT_MODEL_PART, MODEL_CONTENT_TYPE)
        .add_relationship(Relationship::new(
            "",
            "rel-1",
            ROOT_MODEL_PART,
            MODEL_RELATIONSHIP,
        ));

    if policy.split_object_part {
        doc.add_part(OBJECT_MODEL_PART, object_model_xml(&centered, policy).into_bytes());
        doc.add_part(
            ROOT_MODEL_PART,
            root_model_xml(None, transform, policy, options).into_bytes(),
        );
        doc.add_relationship(Relationship::new(
            ROOT_MODEL_PART,
            "rel-1",
            OBJECT_MODEL_PART,
            MODEL_RELATIONSHIP,
        ));
    } else {
        doc.add_part(
            ROOT_MODEL_PART,
            root_model_xml(Some(&centered), transform, policy, options).into_bytes(),
        );
    }

    add_metadata_parts(&mut doc, &centered, transform, settings, policy, options)?;

    info!(
        consumer = %variant,
        parts = doc.part_count(),
        relationships = doc.relationships().len(),
        "Package assembled"
    );
    Ok(doc)
}

/// Assemble and write in one step.
pub fn export_package(
    mesh: &Mesh,
    transform: &AffineTransform,
    settings: &SettingsTable,
    variant: ConsumerVariant,
    options: &PackageOptions,
    path: &Path,
) -> ProfileResult<()> {
    let doc = assemble_package(mesh, transform, settings, variant, options)?;
    write_package(&doc, path)
}

fn mesh_xml(mesh: &Mesh, out: &mut String) {
    out.push_str("   <mesh>\n    <vertices>\n");
    for v in mesh.vertices() {
        out.push_str(&format!(
            "     <vertex x=\"{}\" y=\"{}\" z=\"{}\"/>\n",
            v.x, v.y, v.z
        ));
    }
    out.push_str("    </vertices>\n    <triangles>\n");
    for [a, b, c] in mesh.faces() {
        out.push_str(&format!(
            "     <triangle v1=\"{}\" v2=\"{}\" v3=\"{}\"/>\n",
            a, b, c
        ));
    }
    out.push_str("    </triangles>\n   </mesh>\n");
}

fn model_open(policy: &ConsumerPolicy, out: &mut String) {
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    if policy.bambu_model_metadata {
        out.push_str(&format!(
            "<model unit=\"millimeter\" xml:lang=\"en-US\" xmlns=\"{}\" xmlns:BambuStudio=\"{}\" xmlns:p=\"{}\" requiredextensions=\"p\">\n",
            CORE_NS, BAMBU_NS, PRODUCTION_NS
        ));
    } else {
        out.push_str(&format!(
            "<model unit=\"millimeter\" xml:lang=\"en-US\" xmlns=\"{}\">\n",
            CORE_NS
        ));
    }
}

/// Sub-object part holding the mesh (split layouts only).
fn object_model_xml(centered: &Mesh, policy: &ConsumerPolicy) -> String {
    let mut xml = String::with_capacity(centered.vertex_count() * 60 + centered.face_count() * 50 + 512);
    model_open(policy, &mut xml);
    xml.push_str(" <resources>\n");
    xml.push_str("  <object id=\"1\" p:UUID=\"00010000-0000-0000-0000-000000000001\" type=\"model\">\n");
    mesh_xml(centered, &mut xml);
    xml.push_str("  </object>\n </resources>\n <build/>\n</model>\n");
    xml
}

/// Root model part. With `mesh` the object carries the geometry; without
/// it the object references the sub-object part as a component.
fn root_model_xml(
    mesh: Option<&Mesh>,
    transform: &AffineTransform,
    policy: &ConsumerPolicy,
    options: &PackageOptions,
) -> String {
    let capacity = mesh.map_or(2048, |m| m.vertex_count() * 60 + m.face_count() * 50 + 2048);
    let mut xml = String::with_capacity(capacity);
    model_open(policy, &mut xml);

    let date = options.created.format("%Y-%m-%d").to_string();
    let mut metadata = vec![
        ("Application", options.application.clone()),
        ("Title", options.title.clone()),
    ];
    if policy.bambu_model_metadata {
        metadata.extend([
            ("BambuStudio:3mfVersion", "1".to_string()),
            ("CreationDate", date.clone()),
            ("ModificationDate", date),
            ("Description", "Generated print profile".to_string()),
        ]);
    }
    for (name, value) in metadata {
        xml.push_str(&format!(
            " <metadata name=\"{}\">{}</metadata>\n",
            name,
            escape(value.as_str())
        ));
    }

    xml.push_str(" <resources>\n");
    let object_id = match mesh {
        Some(mesh) => {
            xml.push_str("  <object id=\"1\" type=\"model\">\n");
            mesh_xml(mesh, &mut xml);
            xml.push_str("  </object>\n");
            1
        }
        None => {
            xml.push_str(
                "  <object id=\"2\" p:UUID=\"00010000-0000-0000-0000-000000000002\" type=\"model\">\n",
            );
            xml.push_str("   <components>\n");
            xml.push_str(&format!(
                "    <component p:path=\"/{}\" objectid=\"1\" p:UUID=\"00010000-0000-0000-0000-000000000003\" transform=\"{}\"/>\n",
                OBJECT_MODEL_PART, IDENTITY_3MF
            ));
            xml.push_str("   </components>\n  </object>\n");
            2
        }
    };
    xml.push_str(" </resources>\n");

    if policy.bambu_model_metadata {
        xml.push_str(" <build p:UUID=\"00000000-0000-0000-0000-000000000000\">\n");
        xml.push_str(&format!(
            "  <item objectid=\"{}\" p:UUID=\"00000002-0000-0000-0000-000000000002\" transform=\"{}\" printable=\"1\"/>\n",
            object_id,
            transform.to_3mf_matrix()
        ));
    } else {
        xml.push_str(" <build>\n");
        xml.push_str(&format!(
            "  <item objectid=\"{}\" transform=\"{}\"/>\n",
            object_id,
            transform.to_3mf_matrix()
        ));
    }
    xml.push_str(" </build>\n</model>\n");
    xml
}

fn add_metadata_parts(
    doc: &mut PackageDocument,
    centered: &Mesh,
    transform: &AffineTransform,
    settings: &SettingsTable,
    policy: &ConsumerPolicy,
    options: &PackageOptions,
) -> ProfileResult<()> {
    if !policy.settings_parts.is_empty() {
        let json = settings.to_json_pretty()?;
        for part in policy.settings_parts {
            doc.add_part(*part, json.clone().into_bytes());
            if part.ends_with(".json") {
                doc.add_default("json", JSON_CONTENT_TYPE);
            } else {
                doc.add_override(part, JSON_CONTENT_TYPE);
            }
        }
    }

    if let Some(part) = policy.positioning_part {
        doc.add_part(part, positioning_xml(centered, transform, options).into_bytes());
        doc.add_default("config", XML_CONTENT_TYPE);
    }

    if let Some(part) = policy.plate_part {
        let plate = plate_json(centered, transform, options);
        let bytes = serde_json::to_vec_pretty(&plate).map_err(|e| ProfileError::part_encoding(part, e))?;
        doc.add_part(part, bytes);
        doc.add_default("json", JSON_CONTENT_TYPE);
    }

    if let Some(part) = policy.slice_info_part {
        doc.add_part(part, SLICE_INFO_XML.as_bytes().to_vec());
        doc.add_default("config", XML_CONTENT_TYPE);
    }

    if !policy.thumbnails.is_empty() {
        let png = placeholder_png().map_err(|e| ProfileError::part_encoding(policy.thumbnails[0], e))?;
        for part in policy.thumbnails {
            doc.add_part(*part, png.clone());
        }
        doc.add_default("png", PNG_CONTENT_TYPE);
        doc.add_relationship(Relationship::new(
            "",
            "rel-2",
            policy.thumbnails[0],
            THUMBNAIL_RELATIONSHIP,
        ));
    }
    Ok(())
}

/// Object, part, plate and assembly records for Bambu-lineage consumers.
fn positioning_xml(centered: &Mesh, transform: &AffineTransform, options: &PackageOptions) -> String {
    let height = centered.bounds().map(|b| b.extents().z).unwrap_or(0.0);
    let name = escape(options.object_name.as_str()).into_owned();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <object id="2">
    <metadata key="name" value="{name}"/>
    <metadata key="extruder" value="1"/>
    <part id="1" subtype="normal_part">
      <metadata key="name" value="{name}"/>
      <metadata key="matrix" value="1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1"/>
      <metadata key="source_file" value="{source}"/>
      <metadata key="source_object_id" value="0"/>
      <metadata key="source_volume_id" value="0"/>
      <metadata key="source_offset_x" value="0"/>
      <metadata key="source_offset_y" value="0"/>
      <metadata key="source_offset_z" value="{offset_z}"/>
      <mesh_stat edges_fixed="0" degenerate_facets="0" facets_removed="0" facets_reversed="0" backwards_edges="0"/>
    </part>
  </object>
  <plate>
    <metadata key="plater_id" value="1"/>
    <metadata key="plater_name" value=""/>
    <metadata key="locked" value="false"/>
    <model_instance>
      <metadata key="object_id" value="2"/>
      <metadata key="instance_id" value="0"/>
      <metadata key="identify_id" value="1"/>
    </model_instance>
  </plate>
  <assemble>
   <assemble_item object_id="2" instance_id="0" transform="{transform}" offset="0 0 0"/>
  </assemble>
</config>
"#,
        name = name,
        source = escape(options.title.as_str()),
        offset_z = format_number(height / 2.0),
        transform = transform.to_3mf_matrix(),
    )
}

/// Plate summary: the placed footprint of the single object.
fn plate_json(centered: &Mesh, transform: &AffineTransform, options: &PackageOptions) -> serde_json::Value {
    let placed = centered.bounds().map(|b| transform.apply_bounds(&b));
    let (x, y, w, d) = placed.map_or((0.0, 0.0, 0.0, 0.0), |b| {
        let e = b.extents();
        (b.min.x, b.min.y, e.x, e.y)
    });
    serde_json::json!({
        "bbox_objects": [{
            "id": 1,
            "name": options.object_name,
            "bbox": [x, y, w, d],
            "layer_height": options.layer_height,
            "area": w * d,
        }],
        "bed_type": "textured_plate",
        "filament_colors": [],
        "filament_ids": [],
        "first_extruder": 0,
        "is_seq_print": false,
        "nozzle_diameter": 0.4,
        "version": 2,
    })
}

const SLICE_INFO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <header>
    <header_item key="X-BBL-Client-Type" value="slicer"/>
    <header_item key="X-BBL-Client-Version" value="01.01.08.02"/>
  </header>
</config>
"#;

/// A 1x1 transparent PNG.
fn placeholder_png() -> image::ImageResult<Vec<u8>> {
    let img = DynamicImage::ImageRgba8(RgbaImage::new(1, 1));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Baseline, ProfileRecord};
    use crate::transform::BuildPlate;
    use crate::types::test_meshes::cube_at;

    fn fixture(variant: ConsumerVariant) -> PackageDocument {
        let mesh = cube_at([50.0, 50.0, 3.0], 10.0);
        let transform = mesh.solve_placement(&BuildPlate::square(220.0), 5.0).unwrap();
        let settings = SettingsTable::for_consumer(
            &Baseline::empty(),
            &ProfileRecord::default(),
            "PLA",
            variant,
        );
        assemble_package(&mesh, &transform, &settings, variant, &PackageOptions::default()).unwrap()
    }

    fn text(doc: &PackageDocument, part: &str) -> String {
        String::from_utf8(doc.part(part).unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_core_package() {
        let doc = fixture(ConsumerVariant::Core);
        doc.validate().unwrap();
        assert_eq!(doc.part_names().collect::<Vec<_>>(), [ROOT_MODEL_PART]);
        let model = text(&doc, ROOT_MODEL_PART);
        assert!(model.contains("transform=\"1 0 0 0 1 0 0 0 1 110 110 0\""));
        assert!(model.contains("<vertex x=\"-5\" y=\"-5\" z=\"0\"/>"));
        assert!(!model.contains("p:UUID"));
    }

    #[test]
    fn test_orca_package() {
        let doc = fixture(ConsumerVariant::Orca);
        doc.validate().unwrap();
        assert_eq!(doc.part_count(), 4);
        let settings: serde_json::Value =
            serde_json::from_slice(doc.part("Metadata/Slic3r_PE.json").unwrap()).unwrap();
        assert_eq!(settings["bed_temperature"], "60");
        assert_eq!(doc.content_types().resolve("Metadata/model_settings.json"), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn test_elegoo_package() {
        let doc = fixture(ConsumerVariant::ElegooOrca);
        doc.validate().unwrap();
        assert_eq!(doc.part_count(), 11);

        let root = text(&doc, ROOT_MODEL_PART);
        assert!(root.contains("p:path=\"/3D/Objects/object_1.model\""));
        assert!(root.contains("printable=\"1\""));
        assert!(!root.contains("<vertex"));
        assert!(text(&doc, OBJECT_MODEL_PART).contains("<triangle v1="));

        let positioning = text(&doc, "Metadata/model_settings.config");
        assert!(positioning.contains("transform=\"1 0 0 0 1 0 0 0 1 110 110 0\""));
        assert!(positioning.contains("key=\"source_offset_z\" value=\"5\""));

        let plate: serde_json::Value =
            serde_json::from_slice(doc.part("Metadata/plate_1.json").unwrap()).unwrap();
        assert_eq!(plate["bbox_objects"][0]["bbox"], serde_json::json!([105.0, 105.0, 10.0, 10.0]));

        let settings: serde_json::Value =
            serde_json::from_slice(doc.part("Metadata/project_settings.config").unwrap()).unwrap();
        assert_eq!(settings["filament_settings_id"], serde_json::json!(["PLA @ECC"]));
        assert_eq!(
            doc.content_types().resolve("Metadata/project_settings.config"),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(
            doc.content_types().resolve("Metadata/slice_info.config"),
            Some(XML_CONTENT_TYPE)
        );

        let png = doc.part("Metadata/plate_1.png").unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert!(doc
            .relationships()
            .iter()
            .any(|r| r.kind == THUMBNAIL_RELATIONSHIP && r.target == "Metadata/plate_1.png"));
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mesh = Mesh::from_parts(vec![], vec![]).unwrap();
        let err = assemble_package(
            &mesh,
            &AffineTransform::identity(),
            &SettingsTable::default(),
            ConsumerVariant::Core,
            &PackageOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::EmptyGeometry));
    }
}
