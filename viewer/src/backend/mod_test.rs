use super::*;

fn stack() -> LayerStack {
    LayerStack::new(
        "base.png",
        vec![(LayerId::Missing, "red.png".into()), (LayerId::Added, "green.png".into())],
        70,
    )
}

fn init<'a>(layers: &'a LayerStack, tiles: Option<&'a TileSource>) -> BackendInit<'a> {
    BackendInit { generation: Generation(3), layers, tiles, tile_cache_budget: 16, gpu: GpuCaps::default() }
}

// =============================================================
// Generation / AssetKey
// =============================================================

#[test]
fn generation_next_increments() {
    assert_eq!(Generation(4).next(), Generation(5));
    assert_eq!(Generation(u64::MAX).next(), Generation(0));
    assert_eq!(Generation(7).to_string(), "g7");
}

#[test]
fn asset_key_display() {
    let layer = AssetKey::Layer { layer: LayerId::Added, source: "g.png".into() };
    assert_eq!(layer.to_string(), "added:g.png");
    let tile = AssetKey::Tile { coord: TileCoord::new(3, 1, 2) };
    assert_eq!(tile.to_string(), "tile:3/1_2");
    assert_eq!(AssetKey::Descriptor { url: "p.dzi".into() }.to_string(), "descriptor:p.dzi");
}

#[test]
fn asset_key_serializes_tagged() {
    let key = AssetKey::Layer { layer: LayerId::Base, source: "b.png".into() };
    let json = serde_json::to_value(&key).unwrap();
    assert_eq!(json["kind"], "layer");
    assert_eq!(json["layer"], "base");
}

// =============================================================
// initialize
// =============================================================

#[test]
fn initialize_direct_requests_every_layer() {
    let layers = stack();
    let (backend, effects) = initialize(BackendKind::Direct, init(&layers, None)).unwrap();
    assert_eq!(backend.kind(), BackendKind::Direct);
    assert_eq!(backend.generation(), Generation(3));
    assert_eq!(effects.len(), 3);
    assert!(effects.iter().all(|e| matches!(e, Effect::Load(r) if r.generation == Generation(3))));
}

#[test]
fn initialize_tiled_without_pyramid_fails() {
    let layers = stack();
    let err = initialize(BackendKind::Tiled, init(&layers, None)).err().unwrap();
    assert!(matches!(err, ViewerError::BackendInit(_)));
}

#[test]
fn initialize_gpu_without_context_fails() {
    let layers = stack();
    let mut i = init(&layers, None);
    i.gpu.available = false;
    let err = initialize(BackendKind::Gpu, i).err().unwrap();
    assert_eq!(err, ViewerError::BackendInit("GPU context unavailable".into()));
}

#[test]
fn initialize_gpu_with_context() {
    let layers = stack();
    let (backend, effects) = initialize(BackendKind::Gpu, init(&layers, None)).unwrap();
    assert_eq!(backend.kind(), BackendKind::Gpu);
    assert_eq!(effects.len(), 3);
}

#[test]
fn initialize_tiled_with_zero_budget_fails() {
    let layers = stack();
    let tiles = TileSource { dzi_url: "p.dzi".into(), width: 10, height: 10, max_level: None };
    let mut i = init(&layers, Some(&tiles));
    i.tile_cache_budget = 0;
    assert!(initialize(BackendKind::Tiled, i).is_err());
}
