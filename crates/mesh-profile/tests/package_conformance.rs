//! Archive conformance: written packages are read back with `zip` and
//! `quick-xml` and checked against the packaging rules a consumer relies on.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use mesh_profile::{
    Baseline, BuildPlate, ConsumerVariant, Mesh, PackageOptions, ProfileRecord, SettingsTable,
    export_package,
};
use nalgebra::Point3;
use quick_xml::Reader;
use quick_xml::events::Event;
use tempfile::TempDir;

fn cube_at(origin: [f64; 3], size: f64) -> Mesh {
    let [x, y, z] = origin;
    let s = size;
    let vertices = vec![
        Point3::new(x, y, z),
        Point3::new(x + s, y, z),
        Point3::new(x + s, y + s, z),
        Point3::new(x, y + s, z),
        Point3::new(x, y, z + s),
        Point3::new(x + s, y, z + s),
        Point3::new(x + s, y + s, z + s),
        Point3::new(x, y + s, z + s),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    Mesh::from_parts(vertices, faces).unwrap()
}

/// Every archive entry, in archive order.
fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes)
        })
        .collect()
}

/// (element local name, attributes) for every start or empty element.
fn elements(xml: &[u8]) -> Vec<(String, BTreeMap<String, String>)> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).unwrap() {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let attrs = e
                    .attributes()
                    .map(|a| {
                        let a = a.unwrap();
                        (
                            String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                            a.unescape_value().unwrap().into_owned(),
                        )
                    })
                    .collect();
                out.push((name, attrs));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    out
}

fn write_variant(dir: &TempDir, variant: ConsumerVariant) -> std::path::PathBuf {
    let mesh = cube_at([40.0, -20.0, 5.0], 20.0);
    let transform = mesh.solve_placement(&BuildPlate::new(256.0, 200.0), 5.0).unwrap();
    let settings =
        SettingsTable::for_consumer(&Baseline::empty(), &ProfileRecord::default(), "PETG", variant);
    let path = dir.path().join(format!("{}.3mf", variant));
    export_package(&mesh, &transform, &settings, variant, &PackageOptions::default(), &path).unwrap();
    path
}

fn check_conformance(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let entries = read_archive(path);
    assert_eq!(entries[0].0, "[Content_Types].xml", "manifest must come first");

    let names: BTreeSet<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.len(), entries.len(), "duplicate entry names");

    // Content types cover every entry.
    let manifest = elements(&entries[0].1);
    let defaults: BTreeMap<String, String> = manifest
        .iter()
        .filter(|(n, _)| n == "Default")
        .map(|(_, a)| (a["Extension"].to_lowercase(), a["ContentType"].clone()))
        .collect();
    let overrides: BTreeMap<String, String> = manifest
        .iter()
        .filter(|(n, _)| n == "Override")
        .map(|(_, a)| (a["PartName"].trim_start_matches('/').to_string(), a["ContentType"].clone()))
        .collect();
    for name in names.iter().filter(|n| **n != "[Content_Types].xml") {
        let ext = name.rsplit('.').next().unwrap().to_lowercase();
        assert!(
            overrides.contains_key(*name) || defaults.contains_key(&ext),
            "{name} has no content type"
        );
    }
    for part in overrides.keys() {
        assert!(names.contains(part.as_str()), "override for missing part {part}");
    }

    // Every relationship target exists; the root points at the model.
    assert!(names.contains("_rels/.rels"));
    let mut model_targets = Vec::new();
    for (name, bytes) in entries.iter().filter(|(n, _)| n.ends_with(".rels")) {
        for (_, attrs) in elements(bytes).into_iter().filter(|(n, _)| n == "Relationship") {
            let target = attrs["Target"].trim_start_matches('/').to_string();
            assert!(names.contains(target.as_str()), "{name} -> missing {target}");
            if attrs["Type"].ends_with("/3dmodel") {
                model_targets.push(target);
            }
        }
    }
    assert!(model_targets.contains(&"3D/3dmodel.model".to_string()));
    let unique: BTreeSet<_> = model_targets.iter().collect();
    assert_eq!(unique.len(), model_targets.len(), "model part referenced twice");

    let stray: Vec<_> = path
        .parent()
        .unwrap()
        .read_dir()
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(stray.is_empty(), "temporary files left behind");

    entries.into_iter().collect()
}

fn build_item_transform(model: &[u8]) -> String {
    elements(model)
        .into_iter()
        .find(|(n, _)| n == "item")
        .map(|(_, a)| a["transform"].clone())
        .unwrap()
}

#[test]
fn test_core_conformance() {
    let dir = TempDir::new().unwrap();
    let parts = check_conformance(&write_variant(&dir, ConsumerVariant::Core));
    assert_eq!(parts.len(), 3);

    let model = &parts["3D/3dmodel.model"];
    let vertices: Vec<_> = elements(model).into_iter().filter(|(n, _)| n == "vertex").collect();
    assert_eq!(vertices.len(), 8);
    // Re-centered: X/Y symmetric about 0, Z from 0.
    let zs: Vec<f64> = vertices.iter().map(|(_, a)| a["z"].parse().unwrap()).collect();
    assert_eq!(zs.iter().cloned().fold(f64::INFINITY, f64::min), 0.0);
    let xs: Vec<f64> = vertices.iter().map(|(_, a)| a["x"].parse().unwrap()).collect();
    assert_eq!(xs.iter().cloned().fold(f64::INFINITY, f64::min), -10.0);

    assert_eq!(build_item_transform(model), "1 0 0 0 1 0 0 0 1 128 100 0");
}

#[test]
fn test_orca_conformance() {
    let dir = TempDir::new().unwrap();
    let parts = check_conformance(&write_variant(&dir, ConsumerVariant::Orca));
    for part in [
        "Metadata/Slic3r_PE.json",
        "Metadata/Slic3r_PE_model.json",
        "Metadata/model_settings.json",
    ] {
        let settings: serde_json::Value = serde_json::from_slice(&parts[part]).unwrap();
        assert_eq!(settings["filament_type"], "PETG", "{part}");
    }
}

#[test]
fn test_elegoo_conformance() {
    let dir = TempDir::new().unwrap();
    let parts = check_conformance(&write_variant(&dir, ConsumerVariant::ElegooOrca));

    for part in [
        "3D/3dmodel.model",
        "3D/Objects/object_1.model",
        "3D/_rels/3dmodel.model.rels",
        "Metadata/project_settings.config",
        "Metadata/model_settings.config",
        "Metadata/plate_1.json",
        "Metadata/slice_info.config",
        "Metadata/plate_1.png",
        "Metadata/plate_1_small.png",
        "Metadata/plate_no_light_1.png",
        "Metadata/top_1.png",
        "Metadata/pick_1.png",
    ] {
        assert!(parts.contains_key(part), "missing {part}");
    }

    let root = elements(&parts["3D/3dmodel.model"]);
    let component = root.iter().find(|(n, _)| n == "component").unwrap();
    assert_eq!(component.1["p:path"], "/3D/Objects/object_1.model");
    let item = root.iter().find(|(n, _)| n == "item").unwrap();
    assert_eq!(item.1["printable"], "1");
    assert_eq!(item.1["objectid"], "2");

    let transform = build_item_transform(&parts["3D/3dmodel.model"]);
    let positioning = elements(&parts["Metadata/model_settings.config"]);
    let assemble = positioning.iter().find(|(n, _)| n == "assemble_item").unwrap();
    assert_eq!(assemble.1["transform"], transform);

    let project: serde_json::Value =
        serde_json::from_slice(&parts["Metadata/project_settings.config"]).unwrap();
    let changed = project["different_settings_to_system"][0].as_str().unwrap();
    assert!(changed.split(';').any(|k| k == "filament_type"));

    let header = elements(&parts["Metadata/slice_info.config"]);
    assert!(header
        .iter()
        .any(|(n, a)| n == "header_item" && a["key"] == "X-BBL-Client-Type" && a["value"] == "slicer"));

    let png = image::load_from_memory(&parts["Metadata/plate_1.png"]).unwrap();
    assert_eq!((png.width(), png.height()), (1, 1));
}
