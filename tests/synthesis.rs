use voxel_world::engine_state::settings::{GenerationContext, Seeds, WorldSettings};
use voxel_world::engine_state::voxels::block::block_type::BlockType;
use voxel_world::engine_state::voxels::edit_log::{BlockEdit, EditLog};
use voxel_world::engine_state::voxels::fragment::synthesis::{synthesize, terrain_height, Region};
use voxel_world::engine_state::voxels::fragment::BlockKey;
use voxel_world::engine_state::voxels::noise::PerlinNoise;

fn context(seed: i32, biome: usize) -> std::sync::Arc<GenerationContext> {
    let settings = WorldSettings {
        seeds: Some(Seeds {
            terrain: seed,
            cloud: seed,
            tree: seed,
        }),
        biome: Some(biome),
        ..WorldSettings::default()
    };
    GenerationContext::snapshot(&settings).unwrap()
}

#[test]
fn single_column_scenario() {
    let ctx = context(1, 0);
    let noise = PerlinNoise::new();
    let region = Region::columns(0, 1, 0, 1).with_height(-5, 15);
    let fragment = synthesize(region, &ctx, false, &[], &noise, 0);

    let h = terrain_height(&ctx, &noise, 0, 0);
    let horizon = ctx.stage.horizon_height;
    let ground = if h < horizon {
        BlockType::BEDROCK
    } else {
        BlockType::SNOW
    };
    let ground_blocks: Vec<&BlockKey> = fragment
        .index
        .iter()
        .filter(|(_, slot)| slot.block_type == ground)
        .map(|(key, _)| key)
        .collect();
    if (-5..15).contains(&h) {
        assert_eq!(ground_blocks, vec![&BlockKey::new(0, h, 0)]);
    } else {
        assert!(ground_blocks.is_empty());
    }

    let water = fragment
        .index
        .values()
        .filter(|slot| slot.block_type == BlockType::ICE)
        .count();
    if h < horizon {
        let expected = (horizon - (h + 1).max(-5) + 1).max(0) as usize;
        assert_eq!(water, expected);
    } else {
        assert_eq!(water, 0);
    }

    assert!(fragment.index.keys().all(|key| (-5..15).contains(&key.y)));
    assert!(fragment
        .clouds
        .iter()
        .all(|cloud| (-5..15).contains(&(cloud.position[1].floor() as i32))));
}

#[test]
fn identical_inputs_give_identical_fragments() {
    let ctx = context(77, 1);
    let noise = PerlinNoise::new();
    let edits = [
        BlockEdit::place(3, 12, -4, BlockType::BRICK),
        BlockEdit::remove(5, 0, -2),
    ];
    let region = Region::columns(0, 12, -12, 0);
    let a = synthesize(region, &ctx, false, &edits, &noise, 9);
    let b = synthesize(region, &ctx, false, &edits, &noise, 9);
    assert_eq!(a.batches, b.batches);
    assert_eq!(a.clouds, b.clouds);
    assert_eq!(a.index, b.index);
}

#[test]
fn removals_and_placements_from_the_log_win() {
    let ctx = context(5, 1);
    let noise = PerlinNoise::new();
    let region = Region::columns(-6, 6, -6, 6);
    let mut log = EditLog::new();

    let before = synthesize(region, &ctx, false, &[], &noise, 0);
    let h = terrain_height(&ctx, &noise, 2, 3);
    let ground = BlockKey::new(2, h, 3);
    assert!(before.contains(ground));

    log.insert(BlockEdit::remove(2, h, 3));
    log.insert(BlockEdit::place(-4, 25, 1, BlockType::GLASS));
    let edits = log.query_area(region.stx, region.edx - 1, region.stz, region.edz - 1);
    assert_eq!(edits.len(), 2);

    let after = synthesize(region, &ctx, false, &edits, &noise, 0);
    assert!(!after.contains(ground));
    assert_eq!(after.block_at(BlockKey::new(-4, 25, 1)), Some(BlockType::GLASS));
    let glass = after
        .batches
        .iter()
        .find(|batch| batch.block_type == BlockType::GLASS)
        .unwrap();
    assert_eq!(glass.positions.iter().filter(|p| !p.is_parked()).count(), 1);
}

#[test]
fn collision_geometry_leaves_out_passable_fills() {
    // Biome 4 floods with lava, which is passable.
    let ctx = context(2, 4);
    let noise = PerlinNoise::new();
    let region = Region::columns(-20, 20, -20, 20);
    let drawn = synthesize(region, &ctx, false, &[], &noise, 0);
    let solid = synthesize(region, &ctx, true, &[], &noise, 0);

    assert!(solid.clouds.is_empty());
    assert!(solid
        .index
        .values()
        .all(|slot| slot.block_type != BlockType::LAVA));
    for (key, slot) in &solid.index {
        assert_eq!(drawn.block_at(*key), Some(slot.block_type));
    }
}
