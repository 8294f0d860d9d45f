//! GLSL preparation for the playground's shader dialect.
//!
//! Program sources are written in desktop GLSL style: loose `uniform`
//! declarations, `uniform sampler2D` state inputs, and `in`/`out` variables
//! without layout qualifiers. wgpu consumes Vulkan-flavoured GLSL 450, so
//! each pair of stages is rewritten before anything reaches the GPU:
//!
//! 1. `#version` directives are dropped and `#version 450` is prepended.
//! 2. Loose uniforms of both stages are merged into one std140 block at
//!    group 0, binding 0. Conflicting declarations are a link error.
//! 3. Each `uniform sampler2D NAME` becomes a texture + sampler pair at
//!    group 1 (bindings `2i` and `2i + 1`) with a `NAME` macro that rebuilds
//!    the combined sampler.
//! 4. Vertex inputs are bound by name to the caller's [`VertexLayout`];
//!    varyings get matching locations across stages; fragment outputs get
//!    locations in declaration order.
//!
//! Both stages are then parsed and validated with naga, and the uniform block
//! is reflected into a [`UniformLayout`]. All of this runs on the CPU, so a
//! broken shader is rejected before the live program is touched.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use wgpu::naga;
use wgpu::naga::ShaderStage;

use crate::error::{CompileError, Stage};
use crate::gpu::{ScalarType, UniformLayout, UniformShape, UniformSlot, VertexLayout};

pub(crate) const UNIFORM_GROUP: u32 = 0;
pub(crate) const TEXTURE_GROUP: u32 = 1;
const UNIFORM_BLOCK: &str = "VisualsParams";
const INTERPOLATION_QUALIFIERS: [&str; 4] = ["flat", "smooth", "noperspective", "centroid"];
const PRECISION_QUALIFIERS: [&str; 3] = ["highp", "mediump", "lowp"];

/// A shader pair that passed translation and naga validation.
#[derive(Debug, Clone)]
pub struct PreparedProgram {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: UniformLayout,
    /// Number of color outputs written by the fragment stage.
    pub outputs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    qualifiers: Vec<String>,
    ty: String,
    name: String,
    array: Option<u32>,
}

impl Declaration {
    fn signature(&self) -> String {
        match self.array {
            Some(len) => format!("{}[{len}]", self.ty),
            None => self.ty.clone(),
        }
    }
}

#[derive(Debug)]
enum Line<'a> {
    Blank,
    Uniforms(Vec<Declaration>),
    Samplers(Vec<String>),
    Inputs(Vec<Declaration>),
    Outputs(Vec<Declaration>),
    Code(&'a str),
}

/// Rewrites, validates and reflects a vertex/fragment pair.
pub fn prepare_program(
    vertex: &str,
    fragment: &str,
    layout: &VertexLayout,
) -> Result<PreparedProgram, CompileError> {
    let vertex_lines = scan(vertex);
    let fragment_lines = scan(fragment);

    let mut uniforms: Vec<Declaration> = Vec::new();
    let mut samplers: Vec<String> = Vec::new();
    for (stage, lines) in [(Stage::Vertex, &vertex_lines), (Stage::Fragment, &fragment_lines)] {
        for line in lines.iter() {
            match line {
                Line::Uniforms(decls) => {
                    for decl in decls {
                        merge_uniform(&mut uniforms, decl, stage)?;
                    }
                }
                Line::Samplers(names) => {
                    for name in names {
                        if !samplers.contains(name) {
                            samplers.push(name.clone());
                        }
                    }
                }
                _ => {}
            }
        }
    }
    if let Some(clash) = uniforms.iter().find(|decl| samplers.contains(&decl.name)) {
        return Err(CompileError::Link(format!(
            "`{}` is declared both as a sampler and as a {} uniform",
            clash.name, clash.ty
        )));
    }

    let header = build_header(&uniforms, &samplers);
    let header_lines = header.lines().count();

    let mut varyings: HashMap<String, (usize, Declaration)> = HashMap::new();
    let mut vertex_body = String::new();
    for line in &vertex_lines {
        match line {
            Line::Inputs(decls) => {
                for decl in decls {
                    let location = attribute_location(decl, layout)?;
                    push_located(&mut vertex_body, location, "in", decl);
                }
                vertex_body.push('\n');
            }
            Line::Outputs(decls) => {
                for decl in decls {
                    let location = varyings.len();
                    varyings.insert(decl.name.clone(), (location, decl.clone()));
                    push_located(&mut vertex_body, location, "out", decl);
                }
                vertex_body.push('\n');
            }
            other => push_plain(&mut vertex_body, other),
        }
    }

    let mut outputs = 0usize;
    let mut fragment_body = String::new();
    for line in &fragment_lines {
        match line {
            Line::Inputs(decls) => {
                for decl in decls {
                    let (location, written) = varyings.get(&decl.name).ok_or_else(|| {
                        CompileError::Link(format!(
                            "fragment input `{}` is not written by the vertex stage",
                            decl.name
                        ))
                    })?;
                    if written.signature() != decl.signature() {
                        return Err(CompileError::Link(format!(
                            "`{}` is {} in the vertex stage but {} in the fragment stage",
                            decl.name,
                            written.signature(),
                            decl.signature()
                        )));
                    }
                    push_located(&mut fragment_body, *location, "in", decl);
                }
                fragment_body.push('\n');
            }
            Line::Outputs(decls) => {
                for decl in decls {
                    if decl.ty != "vec4" || decl.array.is_some() {
                        return Err(CompileError::Link(format!(
                            "fragment output `{}` must be a vec4, found {}",
                            decl.name,
                            decl.signature()
                        )));
                    }
                    push_located(&mut fragment_body, outputs, "out", decl);
                    outputs += 1;
                }
                fragment_body.push('\n');
            }
            other => push_plain(&mut fragment_body, other),
        }
    }
    if outputs == 0 {
        return Err(CompileError::Link(
            "fragment stage declares no color output".into(),
        ));
    }

    let vertex = format!("{header}{vertex_body}");
    let fragment = format!("{header}{fragment_body}");

    let vertex_module = parse_stage(Stage::Vertex, &vertex, header_lines)?;
    validate_stage(Stage::Vertex, &vertex_module, &vertex, header_lines)?;
    let fragment_module = parse_stage(Stage::Fragment, &fragment, header_lines)?;
    validate_stage(Stage::Fragment, &fragment_module, &fragment, header_lines)?;

    let uniforms = reflect_uniforms(&fragment_module, samplers)?;

    Ok(PreparedProgram {
        vertex,
        fragment,
        uniforms,
        outputs,
    })
}

/// Creates a shader module from already-prepared GLSL.
pub(crate) fn create_module(
    device: &wgpu::Device,
    label: &str,
    stage: Stage,
    source: &str,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_string()),
            stage: naga_stage(stage),
            defines: &[],
        },
    })
}

/// Compiles the shader pair used to copy the screen texture onto the surface.
/// Both stages go through naga first so a bad blit source fails here instead
/// of inside wgpu.
pub(crate) fn compile_blit_shaders(
    device: &wgpu::Device,
) -> Result<(wgpu::ShaderModule, wgpu::ShaderModule), CompileError> {
    validate_blit_sources(BLIT_VERTEX_GLSL, BLIT_FRAGMENT_GLSL)?;
    Ok((
        create_module(device, "blit vertex", Stage::Vertex, BLIT_VERTEX_GLSL),
        create_module(device, "blit fragment", Stage::Fragment, BLIT_FRAGMENT_GLSL),
    ))
}

fn validate_blit_sources(vertex: &str, fragment: &str) -> Result<(), CompileError> {
    for (stage, source) in [(Stage::Vertex, vertex), (Stage::Fragment, fragment)] {
        let module = parse_stage(stage, source, 0)?;
        validate_stage(stage, &module, source, 0)?;
    }
    Ok(())
}

fn naga_stage(stage: Stage) -> ShaderStage {
    match stage {
        Stage::Vertex => ShaderStage::Vertex,
        Stage::Fragment => ShaderStage::Fragment,
    }
}

fn merge_uniform(
    uniforms: &mut Vec<Declaration>,
    decl: &Declaration,
    stage: Stage,
) -> Result<(), CompileError> {
    match uniforms.iter().find(|existing| existing.name == decl.name) {
        Some(existing) if existing.signature() == decl.signature() => Ok(()),
        Some(existing) => Err(CompileError::Link(format!(
            "uniform `{}` is declared as {} and as {} in the {stage} stage",
            decl.name,
            existing.signature(),
            decl.signature()
        ))),
        None => {
            uniforms.push(decl.clone());
            Ok(())
        }
    }
}

fn attribute_location(decl: &Declaration, layout: &VertexLayout) -> Result<usize, CompileError> {
    let index = layout.attribute_index(&decl.name).ok_or_else(|| {
        CompileError::Link(format!(
            "vertex input `{}` has no matching attribute in the vertex layout",
            decl.name
        ))
    })?;
    let expected = layout.attributes[index].components;
    let declared = float_components(&decl.ty);
    if declared != Some(expected) {
        return Err(CompileError::Link(format!(
            "vertex input `{}` is {} but the layout provides {expected} floats",
            decl.name, decl.ty
        )));
    }
    Ok(index)
}

fn float_components(ty: &str) -> Option<u8> {
    match ty {
        "float" => Some(1),
        "vec2" => Some(2),
        "vec3" => Some(3),
        "vec4" => Some(4),
        _ => None,
    }
}

fn build_header(uniforms: &[Declaration], samplers: &[String]) -> String {
    let mut header = String::from("#version 450\n");
    if !uniforms.is_empty() {
        header.push_str(&format!(
            "layout(std140, set = {UNIFORM_GROUP}, binding = 0) uniform {UNIFORM_BLOCK} {{\n"
        ));
        for decl in uniforms {
            match decl.array {
                Some(len) => header.push_str(&format!("    {} {}[{len}];\n", decl.ty, decl.name)),
                None => header.push_str(&format!("    {} {};\n", decl.ty, decl.name)),
            }
        }
        header.push_str("};\n");
    }
    for (index, name) in samplers.iter().enumerate() {
        let texture_binding = index * 2;
        let sampler_binding = texture_binding + 1;
        header.push_str(&format!(
            "layout(set = {TEXTURE_GROUP}, binding = {texture_binding}) uniform texture2D {name}_texture;\n"
        ));
        header.push_str(&format!(
            "layout(set = {TEXTURE_GROUP}, binding = {sampler_binding}) uniform sampler {name}_sampler;\n"
        ));
        header.push_str(&format!(
            "#define {name} sampler2D({name}_texture, {name}_sampler)\n"
        ));
    }
    header
}

fn push_located(out: &mut String, location: usize, direction: &str, decl: &Declaration) {
    out.push_str(&format!("layout(location = {location}) "));
    for qualifier in &decl.qualifiers {
        out.push_str(qualifier);
        out.push(' ');
    }
    match decl.array {
        Some(len) => out.push_str(&format!("{direction} {} {}[{len}]; ", decl.ty, decl.name)),
        None => out.push_str(&format!("{direction} {} {}; ", decl.ty, decl.name)),
    }
}

fn push_plain(out: &mut String, line: &Line<'_>) {
    if let Line::Code(code) = line {
        out.push_str(code);
    }
    out.push('\n');
}

/// Splits a source into classified lines, one per input line.
fn scan(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut in_block_comment = false;
    for raw in source.lines() {
        let code = strip_comments(raw, &mut in_block_comment);
        let trimmed = code.trim();
        let line = if trimmed.starts_with("#version") {
            Line::Blank
        } else if let Some(decls) = parse_declarations(trimmed, "uniform") {
            let (samplers, values): (Vec<Declaration>, Vec<Declaration>) =
                decls.into_iter().partition(|decl| decl.ty == "sampler2D");
            match (samplers.is_empty(), values.is_empty()) {
                (false, true) => Line::Samplers(samplers.into_iter().map(|d| d.name).collect()),
                (true, false) => Line::Uniforms(values),
                _ => Line::Code(raw),
            }
        } else if let Some(decls) = parse_declarations(trimmed, "in") {
            Line::Inputs(decls)
        } else if let Some(decls) = parse_declarations(trimmed, "out") {
            Line::Outputs(decls)
        } else {
            Line::Code(raw)
        };
        lines.push(line);
    }
    lines
}

fn strip_comments(line: &str, in_block_comment: &mut bool) -> String {
    let mut out = String::new();
    let mut rest = line;
    loop {
        if *in_block_comment {
            match rest.find("*/") {
                Some(end) => {
                    *in_block_comment = false;
                    rest = &rest[end + 2..];
                }
                None => return out,
            }
        }
        let line_comment = rest.find("//");
        let block_comment = rest.find("/*");
        match (line_comment, block_comment) {
            (Some(l), Some(b)) if b < l => {
                out.push_str(&rest[..b]);
                *in_block_comment = true;
                rest = &rest[b + 2..];
            }
            (None, Some(b)) => {
                out.push_str(&rest[..b]);
                *in_block_comment = true;
                rest = &rest[b + 2..];
            }
            (Some(l), _) => {
                out.push_str(&rest[..l]);
                return out;
            }
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Parses `[qualifiers] <keyword> [precision] <type> <name>[N] {, <name>[N]};`.
fn parse_declarations(statement: &str, keyword: &str) -> Option<Vec<Declaration>> {
    let body = statement.strip_suffix(';')?.trim();
    if body.contains(['(', ')', '{', '}', '=', ';']) {
        return None;
    }

    let mut tokens = body.split_whitespace();
    let mut qualifiers = Vec::new();
    loop {
        let token = tokens.next()?;
        if token == keyword {
            break;
        }
        if !INTERPOLATION_QUALIFIERS.contains(&token) {
            return None;
        }
        qualifiers.push(token.to_string());
    }

    let mut ty = tokens.next()?;
    if PRECISION_QUALIFIERS.contains(&ty) {
        ty = tokens.next()?;
    }
    let names: String = tokens.collect::<Vec<_>>().join("");
    if names.is_empty() {
        return None;
    }

    names
        .split(',')
        .map(|entry| {
            let (name, array) = match entry.split_once('[') {
                Some((name, rest)) => {
                    let len = rest.strip_suffix(']')?.trim().parse::<u32>().ok()?;
                    (name, Some(len))
                }
                None => (entry, None),
            };
            if !is_identifier(name) {
                return None;
            }
            Some(Declaration {
                qualifiers: qualifiers.clone(),
                ty: ty.to_string(),
                name: name.to_string(),
                array,
            })
        })
        .collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_stage(
    stage: Stage,
    source: &str,
    header_lines: usize,
) -> Result<naga::Module, CompileError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(naga_stage(stage));
    frontend
        .parse(&options, source)
        .map_err(|errors| CompileError::Parse {
            stage,
            message: errors
                .errors
                .iter()
                .map(|error| {
                    let line = error.meta.location(source).line_number as usize;
                    format!("{}: {}", user_line(line, header_lines), error.kind)
                })
                .collect::<Vec<_>>()
                .join("\n"),
        })
}

fn validate_stage(
    stage: Stage,
    module: &naga::Module,
    source: &str,
    header_lines: usize,
) -> Result<(), CompileError> {
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(module).map(|_| ()).map_err(|err| {
        let mut message = err.as_inner().to_string();
        let mut source_err = std::error::Error::source(err.as_inner());
        while let Some(inner) = source_err {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source_err = inner.source();
        }
        if let Some((span, _)) = err.spans().next() {
            let line = span.location(source).line_number as usize;
            message = format!("{}: {message}", user_line(line, header_lines));
        }
        CompileError::Validation { stage, message }
    })
}

fn user_line(line: usize, header_lines: usize) -> String {
    if line > header_lines {
        format!("line {}", line - header_lines)
    } else {
        "generated prelude".to_string()
    }
}

fn reflect_uniforms(
    module: &naga::Module,
    samplers: Vec<String>,
) -> Result<UniformLayout, CompileError> {
    let block = module.global_variables.iter().find(|(_, var)| {
        var.space == naga::AddressSpace::Uniform
            && var
                .binding
                .as_ref()
                .is_some_and(|binding| binding.group == UNIFORM_GROUP && binding.binding == 0)
    });
    let Some((_, block)) = block else {
        return Ok(UniformLayout::new(0, BTreeMap::new(), samplers));
    };

    let naga::TypeInner::Struct { members, span } = &module.types[block.ty].inner else {
        return Err(CompileError::Link(
            "uniform block did not reflect as a struct".into(),
        ));
    };

    let mut slots = BTreeMap::new();
    for member in members {
        let Some(name) = member.name.clone() else {
            continue;
        };
        let (shape, array) = match &module.types[member.ty].inner {
            naga::TypeInner::Array { base, size, stride } => {
                let len = match size {
                    naga::ArraySize::Constant(len) => len.get(),
                    _ => {
                        return Err(CompileError::Link(format!(
                            "uniform array `{name}` must have a constant length"
                        )))
                    }
                };
                (reflect_shape(&name, &module.types[*base].inner)?, Some((len, *stride)))
            }
            inner => (reflect_shape(&name, inner)?, None),
        };
        slots.insert(
            name,
            UniformSlot {
                offset: member.offset,
                shape,
                array,
            },
        );
    }

    Ok(UniformLayout::new(*span, slots, samplers))
}

fn reflect_shape(name: &str, inner: &naga::TypeInner) -> Result<UniformShape, CompileError> {
    let scalar_type = |scalar: &naga::Scalar| match scalar.kind {
        naga::ScalarKind::Float => Ok(ScalarType::Float),
        naga::ScalarKind::Sint => Ok(ScalarType::Int),
        naga::ScalarKind::Uint => Ok(ScalarType::Uint),
        _ => Err(CompileError::Link(format!(
            "uniform `{name}` uses an unsupported scalar type"
        ))),
    };
    match inner {
        naga::TypeInner::Scalar(scalar) => Ok(UniformShape::Scalar(scalar_type(scalar)?)),
        naga::TypeInner::Vector { size, scalar } => {
            Ok(UniformShape::Vector(scalar_type(scalar)?, *size as u8))
        }
        naga::TypeInner::Matrix { columns, rows, .. } => Ok(UniformShape::Matrix {
            columns: *columns as u8,
            rows: *rows as u8,
        }),
        _ => Err(CompileError::Link(format!(
            "uniform `{name}` has a type that cannot be set from the host"
        ))),
    }
}

/// Full-screen triangle used to present the screen texture.
const BLIT_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

void main() {
    int index = int(gl_VertexIndex);
    vec2 pos = vec2(float((index << 1) & 2), float(index & 2)) * 2.0 - 1.0;
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

const BLIT_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D screen_texture;
layout(set = 0, binding = 1) uniform sampler screen_sampler;

void main() {
    outColor = texture(sampler2D(screen_texture, screen_sampler), v_uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 410
in vec3 vert;
in vec2 vertTexCoord;
out vec2 fragTexCoord;

void main() {
    fragTexCoord = vertTexCoord;
    gl_Position = vec4(vert, 1.0);
}
";

    const FRAGMENT: &str = r"#version 410
uniform sampler2D state;
uniform float time;
uniform vec2 scale;
uniform int s[9];
in vec2 fragTexCoord;
out vec4 outputColor;

void main() {
    vec4 cell = texture(state, gl_FragCoord.xy / scale);
    outputColor = vec4(cell.rgb * float(s[1]), time);
}
";

    #[test]
    fn blit_sources_validate() {
        validate_blit_sources(BLIT_VERTEX_GLSL, BLIT_FRAGMENT_GLSL).unwrap();

        let broken = BLIT_FRAGMENT_GLSL.replace("outColor =", "outColor = (");
        let err = validate_blit_sources(BLIT_VERTEX_GLSL, &broken).unwrap_err();
        assert!(matches!(err, CompileError::Parse { stage: Stage::Fragment, .. }), "{err}");
    }

    #[test]
    fn declarations_parse_qualifiers_and_arrays() {
        let decls = parse_declarations("uniform int s[9];", "uniform").unwrap();
        assert_eq!(decls[0].name, "s");
        assert_eq!(decls[0].array, Some(9));

        let decls = parse_declarations("flat out int cell, other;", "out").unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].qualifiers, vec!["flat".to_string()]);
        assert_eq!(decls[1].name, "other");

        assert!(parse_declarations("void f(in vec2 p);", "in").is_none());
        assert!(parse_declarations("uniform Block { float x; };", "uniform").is_none());
    }

    #[test]
    fn comments_are_ignored_when_scanning() {
        let mut in_block = false;
        assert_eq!(
            strip_comments("uniform float a; // note", &mut in_block),
            "uniform float a; "
        );
        assert_eq!(strip_comments("x /* start", &mut in_block), "x ");
        assert!(in_block);
        assert_eq!(strip_comments("end */ y", &mut in_block), " y");
    }

    #[test]
    fn prepared_program_reflects_std140_offsets() {
        let prepared = prepare_program(VERTEX, FRAGMENT, &VertexLayout::quad()).unwrap();
        let layout = &prepared.uniforms;
        assert_eq!(layout.samplers(), ["state".to_string()]);
        assert_eq!(layout.slot("time").unwrap().offset, 0);
        assert_eq!(layout.slot("scale").unwrap().offset, 8);
        let s = layout.slot("s").unwrap();
        assert_eq!(s.offset, 16);
        assert_eq!(s.array, Some((9, 16)));
        assert_eq!(prepared.outputs, 1);
        assert!(prepared.fragment.contains("#define state sampler2D("));
        assert!(prepared.vertex.contains("layout(location = 1) in vec2 vertTexCoord;"));
    }

    #[test]
    fn unmatched_varying_is_a_link_error() {
        let fragment = FRAGMENT.replace("in vec2 fragTexCoord;", "in vec2 uv;");
        let err = prepare_program(VERTEX, &fragment, &VertexLayout::quad()).unwrap_err();
        assert!(matches!(err, CompileError::Link(ref msg) if msg.contains("uv")));
    }

    #[test]
    fn unknown_attribute_is_a_link_error() {
        let vertex = VERTEX.replace("in vec3 vert;", "in vec3 position;");
        let err = prepare_program(&vertex, FRAGMENT, &VertexLayout::quad()).unwrap_err();
        assert!(matches!(err, CompileError::Link(ref msg) if msg.contains("position")));
    }

    #[test]
    fn conflicting_uniforms_are_rejected() {
        let vertex = VERTEX.replace("out vec2 fragTexCoord;", "out vec2 fragTexCoord;\nuniform vec3 time;");
        let err = prepare_program(&vertex, FRAGMENT, &VertexLayout::quad()).unwrap_err();
        assert!(matches!(err, CompileError::Link(ref msg) if msg.contains("time")));
    }

    #[test]
    fn syntax_error_reports_user_line() {
        let fragment = FRAGMENT.replace("outputColor = vec4", "outputColor = vec4(");
        let err = prepare_program(VERTEX, &fragment, &VertexLayout::quad()).unwrap_err();
        match err {
            CompileError::Parse { stage, message } => {
                assert_eq!(stage, Stage::Fragment);
                assert!(message.contains("line"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_output_is_rejected() {
        let fragment = FRAGMENT
            .replace("out vec4 outputColor;", "")
            .replace("outputColor = ", "vec4 unused = ");
        let err = prepare_program(VERTEX, &fragment, &VertexLayout::quad()).unwrap_err();
        assert!(matches!(err, CompileError::Link(_)));
    }
}
