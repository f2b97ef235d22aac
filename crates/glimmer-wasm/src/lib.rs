//! # glimmer-wasm
//!
//! WebAssembly host for the Glimmer sprite engine.
//! Owns one scene per page, ticks it from `requestAnimationFrame` and forwards
//! GPU commands to JavaScript functions supplied at [`init`].

mod backend;
mod timing;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use backend::JsGpuBackend;
use glimmer_core::{GlimmerError, GlimmerResult, SceneConfig};
use glimmer_engine::{CallbackKind, HitTestParams, Scene, Sprite, SpriteView};
use js_sys::{Float32Array, Function};
use timing::BrowserTiming;
use wasm_bindgen::prelude::*;

/// Handle table grows at least this far before removed sprites are swept.
const MIN_PRUNE_AT: usize = 64;

struct Host {
    scene: Rc<Scene>,
    sprites: HashMap<u32, Sprite>,
    next_handle: u32,
    prune_at: usize,
}

impl Host {
    fn new(scene: Scene) -> Self {
        Self {
            scene: Rc::new(scene),
            sprites: HashMap::new(),
            next_handle: 0,
            prune_at: MIN_PRUNE_AT,
        }
    }

    fn register(&mut self, sprite: Sprite) -> u32 {
        if self.sprites.len() >= self.prune_at {
            self.sprites.retain(|_, held| !held.is_removed());
            self.prune_at = (self.sprites.len() * 2).max(MIN_PRUNE_AT);
        }
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        self.sprites.insert(handle, sprite);
        handle
    }
}

thread_local! {
    /// The page's scene. Scene methods guard their own state, so the host
    /// cell is only borrowed long enough to clone handles out of it.
    static HOST: RefCell<Option<Host>> = const { RefCell::new(None) };
}

fn to_js(err: GlimmerError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn with_host<F, R>(f: F) -> Result<R, JsValue>
where
    F: FnOnce(&mut Host) -> R,
{
    HOST.with(|host| {
        let mut host = host
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("glimmer host is busy"))?;
        let host = host
            .as_mut()
            .ok_or_else(|| JsValue::from_str("glimmer is not initialized; call init() first"))?;
        Ok(f(host))
    })
}

fn current_scene() -> Result<Rc<Scene>, JsValue> {
    with_host(|host| Rc::clone(&host.scene))
}

fn run_frame(_timestamp: f64) {
    let Ok(scene) = current_scene() else {
        return;
    };
    if let Err(err) = scene.tick() {
        web_sys::console::error_1(&to_js(err));
    }
}

/// Create the page's scene.
///
/// `config_json` may be empty for defaults. The four functions are the GPU
/// commands: `draw(instanceCount, elapsedMs)`,
/// `rebase(swatchUvs, count, elapsedMs)`, `syncRows(firstRow, rowCount, values)`
/// and `hitTest(inputs, uniforms) -> Uint8Array`.
#[wasm_bindgen]
pub fn init(
    config_json: &str,
    draw: Function,
    rebase: Function,
    sync_rows: Function,
    hit_test: Function,
) -> Result<(), JsValue> {
    let config = if config_json.trim().is_empty() {
        SceneConfig::default()
    } else {
        SceneConfig::from_json(config_json).map_err(to_js)?
    };
    let timing = Rc::new(BrowserTiming::new(run_frame)?);
    let backend = JsGpuBackend::new(draw, rebase, sync_rows, hit_test);
    let scene = Scene::new(&config, timing, Box::new(backend)).map_err(to_js)?;

    HOST.with(|host| {
        let mut host = host
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("glimmer host is busy"))?;
        if let Some(previous) = host.take() {
            previous.scene.disable();
        }
        *host = Some(Host::new(scene));
        Ok(())
    })
}

#[wasm_bindgen]
pub fn create_sprite() -> Result<JsSprite, JsValue> {
    let scene = current_scene()?;
    let sprite = scene.create_sprite().map_err(to_js)?;
    let handle = with_host(|host| host.register(sprite.clone()))?;
    Ok(JsSprite {
        handle,
        inner: sprite,
    })
}

/// Forget the handle `sprite_id`. Later hit tests treat it as a miss.
///
/// Sprites that finish removal are swept on their own; this only frees the
/// entry early. Returns false for unknown handles.
#[wasm_bindgen]
pub fn release_sprite(sprite_id: u32) -> Result<bool, JsValue> {
    with_host(|host| host.sprites.remove(&sprite_id).is_some())
}

/// Hit test sprites by id against a box. Returns one value per id: `-1` for
/// a miss or an unknown id, else an approximate swatch index usable for
/// depth sorting.
#[wasm_bindgen]
pub fn hit_test(
    sprite_ids: &[u32],
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    inclusive: bool,
) -> Result<Vec<f32>, JsValue> {
    let (scene, known) = with_host(|host| {
        let known: Vec<(usize, Sprite)> = sprite_ids
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| host.sprites.get(id).map(|sprite| (slot, sprite.clone())))
            .collect();
        (Rc::clone(&host.scene), known)
    })?;
    let mut values = vec![-1.0; sprite_ids.len()];
    if known.is_empty() {
        return Ok(values);
    }
    let (slots, sprites): (Vec<usize>, Vec<Sprite>) = known.into_iter().unzip();
    let result = scene
        .hit_test(&HitTestParams {
            sprites: &sprites,
            x,
            y,
            width,
            height,
            inclusive,
        })
        .map_err(to_js)?;
    for (slot, value) in slots.into_iter().zip(result.values()) {
        values[slot] = *value;
    }
    Ok(values)
}

/// Scene statistics as a JSON string.
#[wasm_bindgen]
pub fn stats_json() -> Result<String, JsValue> {
    let stats = current_scene()?.stats().map_err(to_js)?;
    serde_json::to_string(&stats).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn enable() -> Result<(), JsValue> {
    current_scene()?.enable();
    Ok(())
}

#[wasm_bindgen]
pub fn disable() -> Result<(), JsValue> {
    current_scene()?.disable();
    Ok(())
}

/// Get the version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// A sprite handle for JavaScript.
#[wasm_bindgen]
pub struct JsSprite {
    handle: u32,
    inner: Sprite,
}

#[wasm_bindgen]
impl JsSprite {
    /// Id accepted by [`hit_test`].
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> u32 {
        self.handle
    }

    #[wasm_bindgen(getter)]
    pub fn phase(&self) -> String {
        self.inner.phase().label().to_string()
    }

    #[wasm_bindgen(getter, js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    #[wasm_bindgen(getter, js_name = isAbandoned)]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }

    #[wasm_bindgen(getter, js_name = isRemoved)]
    pub fn is_removed(&self) -> bool {
        self.inner.is_removed()
    }

    /// `callback(swatch: Float32Array)` may edit the swatch in place.
    pub fn enter(&self, callback: Function) -> Result<(), JsValue> {
        self.register(CallbackKind::Enter, callback)
    }

    pub fn update(&self, callback: Function) -> Result<(), JsValue> {
        self.register(CallbackKind::Update, callback)
    }

    pub fn exit(&self, callback: Function) -> Result<(), JsValue> {
        self.register(CallbackKind::Exit, callback)
    }

    pub fn abandon(&self) -> Result<(), JsValue> {
        self.inner.abandon().map_err(to_js)
    }

    /// Same as [`release_sprite`] with this sprite's id.
    pub fn release(&self) -> Result<bool, JsValue> {
        release_sprite(self.handle)
    }

    fn register(&self, kind: CallbackKind, callback: Function) -> Result<(), JsValue> {
        let run = move |view: &mut SpriteView<'_>| -> GlimmerResult<()> {
            let swatch = Float32Array::from(view.values());
            callback
                .call1(&JsValue::NULL, &swatch)
                .map_err(|err| GlimmerError::callback(format!("{:?}", err)))?;
            view.copy_from(&swatch.to_vec())
        };
        self.inner
            .set_callback(kind, Box::new(run))
            .map(|_| ())
            .map_err(to_js)
    }
}
