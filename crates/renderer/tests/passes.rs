use renderer::gpu::{gradient_image, resample};
use renderer::{
    FramebufferError, Frame, Framebuffer, GpuContext, PassError, PassPipeline, ShaderProgram, Size,
    Stage, Texture, VertexLayout, QUAD_VERTEX_GLSL,
};

const COPY_FRAGMENT: &str = r#"
#version 410
uniform sampler2D state;
in vec2 fragTexCoord;
out vec4 outputColor;
void main() {
    outputColor = texture(state, fragTexCoord);
}
"#;

fn context() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(ctx) => Some(ctx),
        Err(_) => {
            eprintln!("Skipping test: no GPU adapter found");
            None
        }
    }
}

fn copy_program(ctx: &GpuContext) -> ShaderProgram {
    ShaderProgram::compile_named(ctx, "copy", QUAD_VERTEX_GLSL, COPY_FRAGMENT, &VertexLayout::quad())
        .unwrap()
}

#[test]
fn copy_stage_moves_state_between_ping_pong_sides() {
    let Some(ctx) = context() else { return };
    let size = Size::new(16, 8);
    let seed = gradient_image(size);
    let mut pipeline = PassPipeline::new(&ctx, "copy", size);
    let mut state = pipeline.ping_pong(&ctx, "state", &seed).unwrap();
    let program = copy_program(&ctx);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();

    let mut frame = Frame::new(&ctx, &screen);
    let stage = Stage::new("copy", &program).read(state.read, 0).write(state.write);
    pipeline.run(&mut frame, &stage).unwrap();
    assert_eq!(frame.bound_framebuffers(), 0);
    frame.finish();

    assert_eq!(pipeline.read_pixels(&ctx, state.write).unwrap(), seed);
    let written = state.write;
    state.swap();
    assert_eq!(state.read, written);
}

#[test]
fn sampling_the_written_texture_is_rejected() {
    let Some(ctx) = context() else { return };
    let size = Size::new(8, 8);
    let mut pipeline = PassPipeline::new(&ctx, "loop", size);
    let state = pipeline.ping_pong(&ctx, "state", &gradient_image(size)).unwrap();
    let program = copy_program(&ctx);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();

    let mut frame = Frame::new(&ctx, &screen);
    let stage = Stage::new("loop", &program).read(state.read, 0).write(state.read);
    let err = pipeline.run(&mut frame, &stage).unwrap_err();
    assert!(matches!(err, PassError::FeedbackLoop { .. }), "{err}");
    assert_eq!(frame.bound_framebuffers(), 0);
    frame.finish();
}

#[test]
fn unbound_sampler_unit_is_reported() {
    let Some(ctx) = context() else { return };
    let size = Size::new(8, 8);
    let mut pipeline = PassPipeline::new(&ctx, "unbound", size);
    let target = pipeline.add_blank(&ctx, "target").unwrap();
    let program = copy_program(&ctx);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();

    let mut frame = Frame::new(&ctx, &screen);
    let err = pipeline
        .run(&mut frame, &Stage::new("unbound", &program).write(target))
        .unwrap_err();
    assert!(matches!(err, PassError::UnboundUnit { unit: 0, .. }), "{err}");
    frame.finish();
}

#[test]
fn incomplete_framebuffer_cannot_be_bound() {
    let Some(ctx) = context() else { return };
    let screen = Texture::blank(&ctx, "screen", Size::new(4, 4)).unwrap();
    let mut frame = Frame::new(&ctx, &screen);

    let empty = Framebuffer::new("empty");
    assert!(matches!(
        frame.bind_framebuffer(&empty),
        Err(FramebufferError::Incomplete { slot: 0, .. })
    ));

    let small = Texture::blank(&ctx, "small", Size::new(4, 4)).unwrap();
    let large = Texture::blank(&ctx, "large", Size::new(8, 8)).unwrap();
    let mut mixed = Framebuffer::new("mixed");
    mixed.attach(0, &small).attach(1, &large);
    assert!(matches!(
        frame.bind_framebuffer(&mixed),
        Err(FramebufferError::SizeMismatch { slot: 1, .. })
    ));
    assert_eq!(frame.bound_framebuffers(), 0);
    assert!(!frame.unbind_framebuffer());
    frame.finish();
}

#[test]
fn foreign_sized_textures_are_refused() {
    let Some(ctx) = context() else { return };
    let mut pipeline = PassPipeline::new(&ctx, "sizes", Size::new(8, 8));
    let texture = Texture::blank(&ctx, "odd", Size::new(4, 8)).unwrap();
    assert!(matches!(
        pipeline.add_texture(texture),
        Err(PassError::SizeMismatch { expected: (8, 8), found: (4, 8), .. })
    ));
    assert_eq!(pipeline.texture_count(), 0);
}

#[test]
fn resize_reaches_every_texture() {
    let Some(ctx) = context() else { return };
    let size = Size::new(16, 16);
    let seed = gradient_image(size);
    let mut pipeline = PassPipeline::new(&ctx, "resize", size);
    let state = pipeline.ping_pong(&ctx, "state", &seed).unwrap();
    let extra = pipeline.add_blank(&ctx, "extra").unwrap();

    let larger = Size::new(32, 24);
    pipeline.resize(&ctx, larger).unwrap();
    assert_eq!(pipeline.size(), larger);
    for key in [state.read, state.write, extra] {
        assert_eq!(pipeline.texture(key).unwrap().size(), larger);
    }
    assert_eq!(pipeline.read_pixels(&ctx, state.read).unwrap(), resample(&seed, larger));

    let program = copy_program(&ctx);
    let screen = Texture::blank(&ctx, "screen", larger).unwrap();
    let mut frame = Frame::new(&ctx, &screen);
    pipeline
        .run(&mut frame, &Stage::new("copy", &program).read(state.read, 0).write(extra))
        .unwrap();
    frame.finish();
}

#[test]
fn failed_resize_keeps_every_texture() {
    let Some(ctx) = context() else { return };
    let size = Size::new(8, 8);
    let seed = gradient_image(size);
    let mut pipeline = PassPipeline::new(&ctx, "oversize", size);
    let state = pipeline.ping_pong(&ctx, "state", &seed).unwrap();
    let extra = pipeline.add_blank(&ctx, "extra").unwrap();

    let oversize = Size::new(ctx.max_texture_dimension() + 1, 4);
    assert!(pipeline.resize(&ctx, oversize).is_err());
    assert_eq!(pipeline.size(), size);
    for key in [state.read, state.write, extra] {
        assert_eq!(pipeline.texture(key).unwrap().size(), size);
    }
    assert_eq!(pipeline.read_pixels(&ctx, state.read).unwrap(), seed);

    let program = copy_program(&ctx);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    let mut frame = Frame::new(&ctx, &screen);
    pipeline
        .run(&mut frame, &Stage::new("copy", &program).read(state.read, 0).write(extra))
        .unwrap();
    frame.finish();
}

#[test]
fn keys_from_another_pipeline_are_rejected() {
    let Some(ctx) = context() else { return };
    let size = Size::new(8, 8);
    let mut large = PassPipeline::new(&ctx, "large", size);
    large.add_blank(&ctx, "first").unwrap();
    let foreign = large.add_blank(&ctx, "second").unwrap();
    let mut small = PassPipeline::new(&ctx, "small", size);
    let own = small.add_blank(&ctx, "only").unwrap();

    assert!(matches!(
        small.texture(foreign),
        Err(PassError::UnknownTexture { index: 1, .. })
    ));
    assert!(small.read_pixels(&ctx, foreign).is_err());
    assert!(small.write_image(&ctx, foreign, &gradient_image(size)).is_err());

    let program = copy_program(&ctx);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    let mut frame = Frame::new(&ctx, &screen);
    let err = small
        .run(&mut frame, &Stage::new("read", &program).read(foreign, 0).write(own))
        .unwrap_err();
    assert!(matches!(err, PassError::UnknownTexture { .. }), "{err}");
    let err = small
        .run(&mut frame, &Stage::new("write", &program).read(own, 0).write(foreign))
        .unwrap_err();
    assert!(matches!(err, PassError::UnknownTexture { .. }), "{err}");
    assert_eq!(frame.bound_framebuffers(), 0);
    frame.finish();
}
