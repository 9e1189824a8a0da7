use std::f32::consts::PI;
use std::thread;

use cgmath::Rad;
use voxel_world::engine_state::voxels::block::block_type::BlockType;
use voxel_world::{
    BlockAction, BlockEdit, EditLog, EngineState, HeadlessRenderer, PlayerAction, Seeds, WorldError,
    WorldSettings,
};

fn settings() -> WorldSettings {
    WorldSettings {
        seeds: Some(Seeds {
            terrain: 12,
            cloud: 13,
            tree: 14,
        }),
        biome: Some(1),
        stage_size: 16,
        threads: 1,
        ..WorldSettings::default()
    }
}

#[test]
fn saved_logs_reload_in_any_order() {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut log = EditLog::new();
    let mut edits = Vec::new();
    for _ in 0..300 {
        let (x, y, z) = (rng.i32(-40..40), rng.i32(-10..30), rng.i32(-40..40));
        let edit = if rng.bool() {
            BlockEdit::remove(x, y, z)
        } else {
            BlockEdit::place(x, y, z, BlockType::ALL[rng.usize(..BlockType::COUNT)])
        };
        log.insert(edit);
        edits.push(edit);
    }

    let json = log.to_json().unwrap();
    let mut reloaded = EditLog::from_json(&json).unwrap();
    assert_eq!(reloaded.len(), log.len());
    for edit in &edits {
        let expected = log.query(edit.x, edit.y, edit.z).copied();
        assert_eq!(reloaded.query(edit.x, edit.y, edit.z).copied(), expected);
    }

    let mut shuffled = log.export();
    rng.shuffle(&mut shuffled);
    let mut replayed = EditLog::from_edits(shuffled);
    assert_eq!(replayed.export(), log.export());
    assert_eq!(
        replayed.query_area(-5, 5, -5, 5),
        log.query_area(-5, 5, -5, 5)
    );
}

#[test]
fn unknown_block_ids_are_rejected() {
    let err = EditLog::from_json(r#"[{"x":0,"y":0,"z":0,"type":250}]"#).unwrap_err();
    assert!(matches!(err, WorldError::Json(_)));
    let log = EditLog::from_json(r#"[{"x":1,"y":2,"z":3,"type":null}]"#).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn invalid_settings_never_start_an_engine() {
    let zero_threads = WorldSettings {
        threads: 0,
        ..settings()
    };
    let result = EngineState::new(HeadlessRenderer::new(), zero_threads, EditLog::new());
    assert!(matches!(result, Err(WorldError::InvalidSettings(_))));

    let unseeded = WorldSettings {
        seeds: None,
        ..settings()
    };
    let mut engine = EngineState::new(HeadlessRenderer::new(), unseeded, EditLog::new()).unwrap();
    assert!(!engine.start().unwrap());
    assert_eq!(engine.handle_block_action(BlockAction::Remove), None);
}

#[test]
fn digging_and_building_are_logged() {
    let mut engine = EngineState::new(HeadlessRenderer::new(), settings(), EditLog::new()).unwrap();
    assert!(engine.start().unwrap());

    let h = engine.terrain().floor_height(0, 0);
    engine.camera.position = cgmath::Point3::new(0.0, h as f32 + 3.0, 0.0);
    engine.camera.rotate(Rad(0.0), Rad(-PI));

    let removed = engine.handle_block_action(BlockAction::Remove).unwrap();
    assert!(removed.is_removal());
    assert_eq!((removed.x, removed.z), (0, 0));
    assert!(removed.y <= h + 2);

    let placed = engine.handle_block_action(BlockAction::Add).unwrap();
    assert_eq!(placed.block_type, Some(BlockType::STONE));
    assert_eq!((placed.x, placed.z), (0, 0));
    assert!(placed.y <= removed.y);

    let saved = engine.export_edit_log().unwrap();
    let mut reloaded = EditLog::from_json(&saved).unwrap();
    assert_eq!(reloaded.len(), engine.edit_log().len());
    assert_eq!(
        reloaded.query(placed.x, placed.y, placed.z).copied(),
        Some(placed)
    );
}

#[test]
fn remote_edits_take_the_local_path() {
    let mut engine = EngineState::new(HeadlessRenderer::new(), settings(), EditLog::new()).unwrap();
    assert!(engine.start().unwrap());

    let sender = engine.remote_sender();
    let network = thread::spawn(move || {
        for y in 50..53 {
            sender.send(BlockEdit::place(2, y, 2, BlockType::GLASS)).unwrap();
        }
    });
    network.join().unwrap();
    assert_eq!(engine.receive_remote_edits(), 3);
    assert_eq!(engine.edit_log().len(), 3);

    engine
        .remote_sender()
        .send(BlockEdit::remove(2, 51, 2))
        .unwrap();
    engine.update(0.0, PlayerAction::default());
    assert_eq!(engine.edit_log().len(), 3);
    let mut log = EditLog::from_edits(engine.edit_log().export());
    assert_eq!(log.query(2, 51, 2).copied(), Some(BlockEdit::remove(2, 51, 2)));
}
