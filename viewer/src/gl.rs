//! `WebGL2` painter for frames produced by the GPU strategy.
//!
//! Every layer becomes one texture, created from the decoded image the first
//! time its sprite is drawn and deleted when the engine releases the asset.
//! All sprites share a unit quad and one node matrix; each draw only updates
//! the destination rect and alpha. The measurement marker is drawn by the
//! same program in screen space, so the canvas never needs a 2D context.

#[cfg(test)]
#[path = "gl_test.rs"]
mod gl_test;

use std::collections::HashMap;

use js_sys::Float32Array;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    HtmlCanvasElement, HtmlImageElement, WebGl2RenderingContext as Gl, WebGlProgram, WebGlShader, WebGlTexture,
    WebGlUniformLocation,
};

use crate::backend::{AssetKey, Frame, GpuCaps};
use crate::coords::{Point, Rect, Size, ViewportTransform};

const VERTEX_SHADER: &str = r"#version 300 es
in vec2 a_unit;
uniform mat3 u_matrix;
uniform vec4 u_rect;
out vec2 v_uv;
void main() {
    vec2 p = u_rect.xy + a_unit * u_rect.zw;
    gl_Position = vec4((u_matrix * vec3(p, 1.0)).xy, 0.0, 1.0);
    v_uv = a_unit;
}
";

const FRAGMENT_SHADER: &str = r"#version 300 es
precision mediump float;
uniform sampler2D u_texture;
uniform float u_alpha;
uniform int u_mode;
uniform vec4 u_color;
in vec2 v_uv;
out vec4 out_color;
void main() {
    if (u_mode == 0) {
        vec4 c = texture(u_texture, v_uv);
        out_color = vec4(c.rgb, c.a * u_alpha);
        return;
    }
    vec2 d = v_uv * 2.0 - 1.0;
    float r = length(d);
    float dash = step(0.5, fract(atan(d.y, d.x) / 6.2831853 * 8.0));
    float ring = step(0.75, r) * step(r, 1.0) * dash;
    float center = step(r, 0.25);
    float a = max(ring, center);
    if (a == 0.0) {
        discard;
    }
    out_color = vec4(u_color.rgb, a);
}
";

/// Two triangles covering `[0, 1]²` as a strip.
const UNIT_QUAD: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];

const MODE_SPRITE: i32 = 0;
const MODE_MARKER: i32 = 1;

const BACKGROUND: [f32; 3] = [43.0 / 255.0, 43.0 / 255.0, 43.0 / 255.0];
const MARKER_COLOR: [f32; 3] = [1.0, 0.8, 0.0];
/// Outer marker radius in screen pixels.
const MARKER_RADIUS_PX: f64 = 6.0;

struct Uniforms {
    matrix: WebGlUniformLocation,
    rect: WebGlUniformLocation,
    alpha: WebGlUniformLocation,
    mode: WebGlUniformLocation,
    color: WebGlUniformLocation,
    texture: WebGlUniformLocation,
}

/// Owns the GL context, the sprite program, and one texture per drawn asset.
pub struct GlRenderer {
    gl: Gl,
    program: WebGlProgram,
    uniforms: Uniforms,
    textures: HashMap<AssetKey, WebGlTexture>,
}

impl GlRenderer {
    /// Acquire a `webgl2` context on `canvas` and build the sprite program.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the browser has no `WebGL2` support or a shader
    /// fails to compile or link.
    pub fn new(canvas: &HtmlCanvasElement) -> Result<Self, JsValue> {
        let gl = canvas
            .get_context("webgl2")?
            .ok_or_else(|| JsValue::from_str("webgl2 context unavailable"))?
            .dyn_into::<Gl>()?;

        let vertex = compile(&gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
        let fragment = compile(&gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER)?;
        let program = link(&gl, &vertex, &fragment)?;
        gl.delete_shader(Some(&vertex));
        gl.delete_shader(Some(&fragment));

        let uniforms = Uniforms {
            matrix: uniform(&gl, &program, "u_matrix")?,
            rect: uniform(&gl, &program, "u_rect")?,
            alpha: uniform(&gl, &program, "u_alpha")?,
            mode: uniform(&gl, &program, "u_mode")?,
            color: uniform(&gl, &program, "u_color")?,
            texture: uniform(&gl, &program, "u_texture")?,
        };

        let vao = gl.create_vertex_array().ok_or_else(|| JsValue::from_str("vertex array allocation failed"))?;
        gl.bind_vertex_array(Some(&vao));
        let quad = gl.create_buffer().ok_or_else(|| JsValue::from_str("buffer allocation failed"))?;
        gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&quad));
        gl.buffer_data_with_array_buffer_view(Gl::ARRAY_BUFFER, &Float32Array::from(UNIT_QUAD.as_slice()), Gl::STATIC_DRAW);
        let location = u32::try_from(gl.get_attrib_location(&program, "a_unit"))
            .map_err(|_| JsValue::from_str("a_unit attribute missing"))?;
        gl.enable_vertex_attrib_array(location);
        gl.vertex_attrib_pointer_with_i32(location, 2, Gl::FLOAT, false, 0, 0);

        tracing::debug!("webgl2 renderer ready");
        Ok(Self { gl, program, uniforms, textures: HashMap::new() })
    }

    /// Device limits for the GPU strategy.
    #[must_use]
    pub fn caps(&self) -> GpuCaps {
        let max = match self.gl.get_parameter(Gl::MAX_TEXTURE_SIZE) {
            Ok(value) => value.as_f64().map_or(0, f64_to_u32),
            Err(e) => {
                tracing::warn!(error = ?e, "max texture size unreadable");
                0
            }
        };
        GpuCaps { available: true, max_texture_size: max }
    }

    /// Number of textures currently on the device.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Delete the texture for `key`, if one was created.
    pub fn release(&mut self, key: &AssetKey) {
        if let Some(texture) = self.textures.remove(key) {
            self.gl.delete_texture(Some(&texture));
        }
    }

    /// Draw every sprite under the frame's node transform, then the marker.
    ///
    /// `marker` is in content coordinates. `viewport` is in CSS pixels.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a texture cannot be created or uploaded.
    pub fn draw(
        &mut self,
        frame: &Frame,
        images: &HashMap<AssetKey, HtmlImageElement>,
        marker: Option<Point>,
        viewport: Size,
    ) -> Result<(), JsValue> {
        self.clear();
        let gl = &self.gl;
        gl.use_program(Some(&self.program));
        gl.enable(Gl::BLEND);
        gl.blend_func(Gl::SRC_ALPHA, Gl::ONE_MINUS_SRC_ALPHA);
        gl.uniform1i(Some(&self.uniforms.mode), MODE_SPRITE);
        gl.uniform1i(Some(&self.uniforms.texture), 0);
        gl.active_texture(Gl::TEXTURE0);
        gl.uniform_matrix3fv_with_f32_array(
            Some(&self.uniforms.matrix),
            false,
            &clip_matrix(&frame.transform, viewport),
        );
        let magnify = if frame.transform.scale < 1.0 { Gl::LINEAR } else { Gl::NEAREST };

        for item in &frame.items {
            let Some(image) = images.get(&item.asset) else {
                continue;
            };
            let texture = self.texture_for(&item.asset, image)?;
            let gl = &self.gl;
            gl.bind_texture(Gl::TEXTURE_2D, Some(&texture));
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, gl_int(magnify));
            set_rect(gl, &self.uniforms.rect, item.dest);
            gl.uniform1f(Some(&self.uniforms.alpha), to_f32(item.alpha.clamp(0.0, 1.0)));
            gl.draw_arrays(Gl::TRIANGLE_STRIP, 0, 4);
        }

        if let Some(content_point) = marker {
            self.draw_marker(frame.transform.content_to_screen(content_point), viewport);
        }
        Ok(())
    }

    /// Clear to the background. Status text is left to the host page.
    pub fn draw_placeholder(&self) {
        self.clear();
    }

    fn clear(&self) {
        let gl = &self.gl;
        gl.viewport(0, 0, gl.drawing_buffer_width(), gl.drawing_buffer_height());
        let [r, g, b] = BACKGROUND;
        gl.clear_color(r, g, b, 1.0);
        gl.clear(Gl::COLOR_BUFFER_BIT);
    }

    fn draw_marker(&self, at: Point, viewport: Size) {
        let gl = &self.gl;
        gl.uniform1i(Some(&self.uniforms.mode), MODE_MARKER);
        let [r, g, b] = MARKER_COLOR;
        gl.uniform4f(Some(&self.uniforms.color), r, g, b, 1.0);
        gl.uniform_matrix3fv_with_f32_array(
            Some(&self.uniforms.matrix),
            false,
            &clip_matrix(&ViewportTransform::default(), viewport),
        );
        set_rect(gl, &self.uniforms.rect, marker_rect(at));
        gl.draw_arrays(Gl::TRIANGLE_STRIP, 0, 4);
    }

    fn texture_for(&mut self, key: &AssetKey, image: &HtmlImageElement) -> Result<WebGlTexture, JsValue> {
        if let Some(texture) = self.textures.get(key) {
            return Ok(texture.clone());
        }
        let gl = &self.gl;
        let texture = gl.create_texture().ok_or_else(|| JsValue::from_str("texture allocation failed"))?;
        gl.bind_texture(Gl::TEXTURE_2D, Some(&texture));
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, gl_int(Gl::LINEAR));
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_S, gl_int(Gl::CLAMP_TO_EDGE));
        gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_T, gl_int(Gl::CLAMP_TO_EDGE));
        if let Err(e) = gl.tex_image_2d_with_u32_and_u32_and_html_image_element(
            Gl::TEXTURE_2D,
            0,
            gl_int(Gl::RGBA),
            Gl::RGBA,
            Gl::UNSIGNED_BYTE,
            image,
        ) {
            gl.delete_texture(Some(&texture));
            return Err(e);
        }
        tracing::trace!(%key, width = image.natural_width(), height = image.natural_height(), "texture uploaded");
        self.textures.insert(key.clone(), texture.clone());
        Ok(texture)
    }
}

impl Drop for GlRenderer {
    fn drop(&mut self) {
        for (_, texture) in self.textures.drain() {
            self.gl.delete_texture(Some(&texture));
        }
        self.gl.delete_program(Some(&self.program));
    }
}

/// Column-major 3×3 matrix mapping content coordinates to clip space.
///
/// `viewport` is in CSS pixels; the device pixel ratio cancels out because
/// clip space spans the whole drawing buffer either way.
fn clip_matrix(t: &ViewportTransform, viewport: Size) -> [f32; 9] {
    let (w, h) = (viewport.width.max(1.0), viewport.height.max(1.0));
    let sx = 2.0 * t.scale / w;
    let sy = -2.0 * t.scale / h;
    let tx = 2.0 * t.translate_x / w - 1.0;
    let ty = 1.0 - 2.0 * t.translate_y / h;
    [to_f32(sx), 0.0, 0.0, 0.0, to_f32(sy), 0.0, to_f32(tx), to_f32(ty), 1.0]
}

/// Screen-space square the marker is drawn in.
fn marker_rect(at: Point) -> Rect {
    Rect::new(at.x - MARKER_RADIUS_PX, at.y - MARKER_RADIUS_PX, MARKER_RADIUS_PX * 2.0, MARKER_RADIUS_PX * 2.0)
}

fn set_rect(gl: &Gl, location: &WebGlUniformLocation, r: Rect) {
    gl.uniform4f(Some(location), to_f32(r.x), to_f32(r.y), to_f32(r.width), to_f32(r.height));
}

fn compile(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, JsValue> {
    let shader = gl.create_shader(kind).ok_or_else(|| JsValue::from_str("shader allocation failed"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl.get_shader_parameter(&shader, Gl::COMPILE_STATUS).as_bool().unwrap_or(false) {
        return Ok(shader);
    }
    let log = gl.get_shader_info_log(&shader).unwrap_or_default();
    gl.delete_shader(Some(&shader));
    Err(JsValue::from_str(&format!("shader compile failed: {log}")))
}

fn link(gl: &Gl, vertex: &WebGlShader, fragment: &WebGlShader) -> Result<WebGlProgram, JsValue> {
    let program = gl.create_program().ok_or_else(|| JsValue::from_str("program allocation failed"))?;
    gl.attach_shader(&program, vertex);
    gl.attach_shader(&program, fragment);
    gl.link_program(&program);
    if gl.get_program_parameter(&program, Gl::LINK_STATUS).as_bool().unwrap_or(false) {
        return Ok(program);
    }
    let log = gl.get_program_info_log(&program).unwrap_or_default();
    gl.delete_program(Some(&program));
    Err(JsValue::from_str(&format!("program link failed: {log}")))
}

fn uniform(gl: &Gl, program: &WebGlProgram, name: &str) -> Result<WebGlUniformLocation, JsValue> {
    gl.get_uniform_location(program, name)
        .ok_or_else(|| JsValue::from_str(&format!("uniform {name} missing")))
}

/// GL enums passed where the API takes a signed parameter.
#[allow(clippy::cast_possible_wrap)]
fn gl_int(value: u32) -> i32 {
    value as i32
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(value: f64) -> f32 {
    value as f32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f64_to_u32(value: f64) -> u32 {
    value.clamp(0.0, f64::from(u32::MAX)) as u32
}
