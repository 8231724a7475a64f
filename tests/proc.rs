use std::fs;

use id_engine::{format::Bake, prelude::*, proc::BspChild};

fn read(file: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = env!("CARGO_MANIFEST_DIR");
    fs::read_to_string(format!("{root}/tests/data/{file}")).unwrap()
}

#[test]
pub fn test_rooms() {
    let scene = ProcScene::parse(&read("rooms.proc")).expect("Failed to parse scene");

    assert_eq!(scene.version, 3);
    assert_eq!(scene.areas.len(), 2);
    assert_eq!(scene.areas[0].surfaces.len(), 2);
    assert_eq!(scene.areas[0].surfaces[0].indices, vec![2, 1, 0, 3, 2, 0]);

    // z-up walls become y-up
    let wall = &scene.areas[0].surfaces[1];
    assert_eq!(wall.bounds.maxs.y, 96.0);
    assert_eq!(wall.bounds.mins.z, -64.0);

    for area in &scene.areas {
        for surface in &area.surfaces {
            assert!(area.bounds.contains(&surface.bounds));
        }
        assert!(scene.bounds.contains(&area.bounds));
    }
    assert_eq!(scene.bounds.mins, Vec3::new(0.0, 0.0, -64.0));
    assert_eq!(scene.bounds.maxs, Vec3::new(128.0, 96.0, 0.0));

    assert_eq!(scene.portals[0].areas, [1, 0]);
    assert_eq!(scene.areas[1].portals, vec![0]);
    assert_eq!(scene.nodes[0].front, BspChild::Area(1));
    assert_eq!(scene.point_in_area(Vec3::new(100.0, 10.0, -10.0)), Some(1));
    assert_eq!(scene.point_in_area(Vec3::new(10.0, 10.0, -10.0)), Some(0));

    let mesh = scene.scene_mesh_data();
    assert_eq!(mesh.vertex_count(), 11);
    assert_eq!(mesh.draws.len(), 3);
    assert_eq!(&mesh.indices[9..], &[9, 8, 7, 10, 9, 7]);
    assert_eq!(scene.materials().len(), 2);

    let baked = ProcScene::from_bytes(&scene.to_bytes().unwrap()).unwrap();
    assert_eq!(baked, scene);
}

#[test]
pub fn test_rooms_scaled() {
    let meta = ImportMeta::parse(&std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/rooms.toml"))
        .expect("Failed to parse meta");
    assert_eq!(meta.proc.unknown_blocks, UnknownBlockPolicy::Reject);

    let scene = ProcScene::parse_with(&read("rooms.proc"), &meta.proc).expect("Failed to parse scene");
    assert_eq!(scene.bounds.maxs, Vec3::new(12.8, 9.6, 0.0));
    assert!((scene.nodes[0].plane.w + 6.4).abs() < 1e-6);
}
