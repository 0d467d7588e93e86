//! Scene integration tests.
//!
//! These tests drive the full registration, record, frame and resize cycle
//! against the dummy backend and inspect the recorded commands and
//! submissions.
//!
//! # Test Categories
//!
//! - **Registration Tests**: handles, replication, descriptor demand
//! - **Recording Tests**: emitted commands per swap-chain mode
//! - **Frame Tests**: wait edges, queues and signals
//! - **Resize Tests**: handle and order preservation, offscreen survival
//! - **Lifecycle Tests**: presentation and teardown

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{
    COMPUTE_QUEUE, GRAPHICS_QUEUE, TestContext, compute_shader, count_commands, fragment_shader,
    quad, swapchain_images, vertex_shader,
};
use redlilium_scene::backend::{GpuCommand, IndexFormat, PipelineBindPoint, SemaphoreWait};
use redlilium_scene::descriptor::DescriptorResource;
use redlilium_scene::graph::{DispatchGroups, OutputTarget};
use redlilium_scene::types::PipelineStages;
use redlilium_scene::{
    AttachmentDescriptor, CommandEncoder, CommandStreamDescriptor, ComputePassDescriptor,
    ComputePassId, DescriptorBinding, DescriptorKind, Extent2d, GpuBackend, GpuBuffer, GpuImage,
    ImageLayout, MeshDescriptor, MeshId, PassHooks, PresentQueue, Presenter,
    RayTracingPassDescriptor, RenderPassDescriptor, RenderPassId, RendererDescriptor, RendererId,
    Scene, SceneConfig, SceneError, ShaderStageDescriptor, StreamKind, StreamTarget,
    SwapchainMode, TextureFormat, TransferDescriptor, TransferId, VertexBufferBinding,
    VertexTemplate, WaitEdge,
};

fn add_quad_renderer(ctx: &mut TestContext, render_pass: RenderPassId) -> RendererId {
    let renderer = ctx
        .scene
        .add_renderer(
            RendererDescriptor::new("quad", render_pass, vertex_shader())
                .with_fragment_shader(fragment_shader())
                .with_vertex_template(VertexTemplate::PositionTexCoord2d),
        )
        .unwrap();
    ctx.scene
        .add_mesh(MeshDescriptor::new(render_pass, renderer, quad()))
        .unwrap();
    renderer
}

fn offscreen_color() -> Vec<AttachmentDescriptor> {
    vec![
        AttachmentDescriptor::color(TextureFormat::Rgba16Float, Extent2d::default())
            .with_image(GpuImage::from_raw(500)),
    ]
}

// ============================================================================
// Registration Tests
// ============================================================================

#[test]
fn test_handles_follow_registration_order() {
    let mut ctx = TestContext::new(3);

    for n in 0..3 {
        let id = ctx
            .scene
            .add_render_pass(RenderPassDescriptor::swapchain(format!("pass_{n}")))
            .unwrap();
        assert_eq!(id, RenderPassId::new(n));
    }
    for n in 0..2 {
        let id = ctx
            .scene
            .add_compute_pass(
                ComputePassDescriptor::new(format!("compute_{n}"), compute_shader())
                    .offscreen(Extent2d::new(64, 64)),
            )
            .unwrap();
        assert_eq!(id, ComputePassId::new(n));
    }
    let transfer = ctx
        .scene
        .add_transfer(TransferDescriptor::new("blit", GpuImage::from_raw(900)))
        .unwrap();
    assert_eq!(transfer, TransferId::new(0));

    let renderer = add_quad_renderer(&mut ctx, RenderPassId::new(1));
    assert_eq!(renderer, RendererId::new(0));
    let second_mesh = ctx
        .scene
        .add_mesh(MeshDescriptor::new(RenderPassId::new(1), renderer, quad()))
        .unwrap();
    assert_eq!(second_mesh, MeshId::new(1));
}

#[rstest]
#[case::single_image(1)]
#[case::double_buffered(2)]
#[case::triple_buffered(3)]
fn test_render_pass_replication(#[case] image_count: u64) {
    let mut ctx = TestContext::new(image_count);
    let swapchain = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    let offscreen = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::offscreen("gbuffer", offscreen_color()))
        .unwrap();

    let pass = ctx.scene.render_pass(swapchain).unwrap();
    assert_eq!(pass.objects().len(), image_count as usize);
    for (object, image) in pass.objects().iter().zip(ctx.scene.swapchain().images()) {
        assert_eq!(ctx.backend.render_pass_image(*object), Some(*image));
    }

    let pass = ctx.scene.render_pass(offscreen).unwrap();
    assert_eq!(pass.objects().len(), 1);
    assert_eq!(pass.extent(), Extent2d::new(1280, 720));
    assert_eq!(pass.attachments()[0].extent, Extent2d::new(1280, 720));
}

#[test]
fn test_offscreen_pass_without_output_rejected() {
    let mut ctx = TestContext::new(2);
    let result = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::offscreen("empty", Vec::new()));

    assert_eq!(
        result,
        Err(SceneError::MissingOutput {
            label: "empty".to_string()
        })
    );
    assert!(ctx.scene.registry().is_empty());
    assert_eq!(ctx.backend.live().render_passes, 0);
}

#[test]
fn test_invalid_render_pass_handle_for_renderer() {
    let mut ctx = TestContext::new(3);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    add_quad_renderer(&mut ctx, main);
    ctx.scene
        .add_mesh(
            MeshDescriptor::new(main, RendererId::new(0), quad())
                .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(7))),
        )
        .unwrap();
    let demand = ctx.scene.descriptor_demand();

    // One past the last valid render pass handle.
    let result = ctx.scene.add_renderer(RendererDescriptor::new(
        "orphan",
        RenderPassId::new(1),
        vertex_shader(),
    ));

    assert_eq!(
        result,
        Err(SceneError::InvalidRenderPass { id: 1, count: 1 })
    );
    assert!(result.unwrap_err().is_configuration());
    assert_eq!(ctx.scene.descriptor_demand(), demand);
    assert_eq!(ctx.scene.render_pass(main).unwrap().renderers().len(), 1);
}

#[test]
fn test_forced_renderer_replaces_in_place() {
    let mut ctx = TestContext::new(2);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    let quad_renderer = || {
        RendererDescriptor::new("quad", main, vertex_shader())
            .with_fragment_shader(fragment_shader())
            .with_vertex_template(VertexTemplate::PositionTexCoord2d)
    };
    let renderer = ctx.scene.add_renderer(quad_renderer()).unwrap();
    let empty = ctx.scene.descriptor_demand();
    ctx.scene
        .add_mesh(
            MeshDescriptor::new(main, renderer, quad())
                .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(7))),
        )
        .unwrap();
    assert_ne!(ctx.scene.descriptor_demand(), empty);

    // Before recording: same id, meshes dropped, demand given back.
    let replaced = ctx
        .scene
        .add_renderer(quad_renderer().with_forced_id(renderer))
        .unwrap();
    assert_eq!(replaced, renderer);
    assert_eq!(ctx.scene.render_pass(main).unwrap().renderers().len(), 1);
    assert!(ctx.scene.renderer(main, renderer).unwrap().meshes().is_empty());
    assert_eq!(ctx.scene.descriptor_demand(), empty);

    ctx.scene
        .add_mesh(
            MeshDescriptor::new(main, renderer, quad())
                .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(8))),
        )
        .unwrap();
    ctx.scene.record().unwrap();
    let old_pipeline = ctx
        .scene
        .renderer(main, renderer)
        .unwrap()
        .pipeline()
        .unwrap()
        .pipeline;
    let live = ctx.backend.live();
    let idle_waits = ctx.backend.device_idle_waits();

    // After recording: the device is drained and the scene must be recorded again.
    let replaced = ctx
        .scene
        .add_renderer(quad_renderer().with_forced_id(renderer))
        .unwrap();
    assert_eq!(replaced, renderer);
    assert_eq!(ctx.backend.device_idle_waits(), idle_waits + 1);
    let after = ctx.backend.live();
    assert_eq!(after.pipelines, live.pipelines - 1);
    assert_eq!(after.descriptor_sets, live.descriptor_sets - 1);
    assert_eq!(after.command_buffers, 0);
    assert_eq!(ctx.backend.invalid_releases(), 0);
    assert!(!ctx.scene.is_recorded());
    assert_eq!(
        ctx.scene
            .frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 0, None, &[], &[]),
        Err(SceneError::NotRecorded)
    );

    ctx.scene
        .add_mesh(MeshDescriptor::new(main, renderer, quad()))
        .unwrap();
    ctx.scene.record().unwrap();
    let new_pipeline = ctx
        .scene
        .renderer(main, renderer)
        .unwrap()
        .pipeline()
        .unwrap()
        .pipeline;
    assert_ne!(new_pipeline, old_pipeline);
    let commands = ctx.swapchain_commands(0);
    assert!(commands.contains(&GpuCommand::BindPipeline {
        bind_point: PipelineBindPoint::Graphics,
        pipeline: new_pipeline,
    }));
    assert!(!commands.iter().any(|command| matches!(
        command,
        GpuCommand::BindPipeline { pipeline, .. } if *pipeline == old_pipeline
    )));
    ctx.scene
        .frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 0, None, &[], &[])
        .unwrap();
    assert_eq!(ctx.backend.invalid_releases(), 0);
}

#[test]
fn test_invalid_stream_rejected() {
    let mut ctx = TestContext::new(2);
    let result = ctx.scene.add_render_pass(
        RenderPassDescriptor::swapchain("aux").with_stream(redlilium_scene::StreamId::new(0)),
    );
    assert_eq!(result, Err(SceneError::InvalidStream { id: 0, count: 0 }));
}

#[test]
fn test_mesh_demand_is_order_independent() {
    let uniform = DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(1));
    let sampled = DescriptorBinding::combined_image_sampler(
        1,
        GpuImage::from_raw(2),
        redlilium_scene::backend::GpuSampler::from_raw(3),
    );
    let storage = DescriptorBinding::storage_buffer(2, GpuBuffer::from_raw(4));

    let build = |sets: &[Vec<DescriptorBinding>]| {
        let mut ctx = TestContext::new(2);
        let main = ctx
            .scene
            .add_render_pass(RenderPassDescriptor::swapchain("main"))
            .unwrap();
        let renderer = add_quad_renderer(&mut ctx, main);
        for bindings in sets {
            let mut mesh = MeshDescriptor::new(main, renderer, quad());
            mesh.bindings = bindings.clone();
            ctx.scene.add_mesh(mesh).unwrap();
        }
        ctx.scene.descriptor_demand()
    };

    let forward = build(&[
        vec![uniform.clone(), sampled.clone()],
        vec![storage.clone()],
        vec![uniform.clone()],
    ]);
    let backward = build(&[
        vec![uniform.clone()],
        vec![storage],
        vec![sampled, uniform],
    ]);

    assert_eq!(forward, backward);
    assert_eq!(forward.max_sets(), 3);
    assert_eq!(forward.count(DescriptorKind::UniformBuffer), 2);
    assert_eq!(forward.count(DescriptorKind::CombinedImageSampler), 1);
    assert_eq!(forward.count(DescriptorKind::StorageBuffer), 1);
}

#[test]
fn test_compute_pass_replicated_per_image() {
    let mut ctx = TestContext::new(3);
    let id = ctx
        .scene
        .add_compute_pass(
            ComputePassDescriptor::new("tonemap", compute_shader())
                .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(5)))
                .with_output_binding(1),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let pass = ctx.scene.compute_pass(id).unwrap();
    assert_eq!(pass.replicas().len(), 3);

    let mut bound_images = Vec::new();
    for replica in pass.replicas() {
        let set = replica.descriptor_set().expect("replica descriptor set");
        let bindings = ctx.backend.descriptor_set_bindings(set).unwrap();
        let output = bindings
            .iter()
            .find(|binding| binding.binding == 1)
            .expect("output binding");
        assert_eq!(output.kind, DescriptorKind::StorageImage);
        let DescriptorResource::Image(image) = output.resources[0] else {
            panic!("output binding is not an image");
        };
        bound_images.push(image);
    }
    assert_eq!(bound_images, ctx.scene.swapchain().images());

    let capacity = ctx.scene.descriptor_pool_capacity().unwrap();
    assert_eq!(capacity.max_sets(), 3);
    assert_eq!(capacity.count(DescriptorKind::StorageImage), 3);
}

#[test]
fn test_pool_frozen_after_record() {
    let mut ctx = TestContext::new(2);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    let renderer = add_quad_renderer(&mut ctx, main);
    ctx.scene.record().unwrap();

    let late = ctx.scene.add_mesh(
        MeshDescriptor::new(main, renderer, quad())
            .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(1))),
    );
    assert!(matches!(late, Err(SceneError::DescriptorPoolFrozen { .. })));

    // Meshes without descriptors are still accepted.
    assert!(
        ctx.scene
            .add_mesh(MeshDescriptor::new(main, renderer, quad()))
            .is_ok()
    );
}

// ============================================================================
// Recording Tests
// ============================================================================

#[test]
fn test_single_quad_draw() {
    let mut ctx = TestContext::new(3);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    add_quad_renderer(&mut ctx, main);
    ctx.scene.record().unwrap();

    let acquired = ctx.semaphore();
    ctx.scene
        .frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 0, Some(acquired), &[], &[])
        .unwrap();

    let commands = ctx.swapchain_commands(0);
    let draws: Vec<_> = commands
        .iter()
        .filter(|command| matches!(command, GpuCommand::DrawIndexed { .. }))
        .collect();
    assert_eq!(
        draws,
        vec![&GpuCommand::DrawIndexed {
            index_count: 6,
            instance_count: 1
        }]
    );
    assert!(commands.contains(&GpuCommand::BindIndexBuffer {
        buffer: GpuBuffer::from_raw(11),
        format: IndexFormat::Uint32,
    }));
    assert_eq!(
        count_commands(&commands, |command| matches!(
            command,
            GpuCommand::BindDescriptorSet { .. }
        )),
        0
    );

    let object = ctx.scene.render_pass(main).unwrap().objects()[0];
    assert!(matches!(
        commands.first(),
        Some(GpuCommand::BeginRenderPass { render_pass, .. }) if *render_pass == object
    ));
    assert_eq!(commands.last(), Some(&GpuCommand::EndRenderPass));

    let submissions = ctx.backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].queue, GRAPHICS_QUEUE);
    assert_eq!(
        submissions[0].command_buffer,
        ctx.scene.streams().swapchain_command_buffers()[0]
    );
    assert_eq!(
        submissions[0].waits,
        vec![SemaphoreWait {
            semaphore: acquired,
            stage: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        }]
    );
    assert_eq!(
        submissions[0].signals,
        vec![ctx.scene.streams().swapchain_complete().handle()]
    );
}

#[test]
fn test_each_image_uses_its_own_pass_object() {
    let mut ctx = TestContext::new(3);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    add_quad_renderer(&mut ctx, main);
    ctx.scene.record().unwrap();

    let objects = ctx.scene.render_pass(main).unwrap().objects().to_vec();
    for (index, object) in objects.iter().enumerate() {
        assert!(matches!(
            ctx.swapchain_commands(index).first(),
            Some(GpuCommand::BeginRenderPass { render_pass, .. }) if render_pass == object
        ));
    }
}

#[test]
fn test_instanced_mesh_with_descriptor_set() {
    let mut ctx = TestContext::new(2);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    let renderer = ctx
        .scene
        .add_renderer(RendererDescriptor::new("trees", main, vertex_shader()))
        .unwrap();
    ctx.scene
        .add_mesh(
            MeshDescriptor::new(main, renderer, quad())
                .with_instances(GpuBuffer::from_raw(30), 12)
                .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(31))),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let pipeline = ctx.scene.renderer(main, renderer).unwrap().pipeline().unwrap();
    let mesh = &ctx.scene.renderer(main, renderer).unwrap().meshes()[0];
    let set = mesh.draw().descriptor_set.expect("scene-allocated set");

    let commands = ctx.swapchain_commands(1);
    assert!(commands.contains(&GpuCommand::BindVertexBuffer {
        binding: 1,
        buffer: GpuBuffer::from_raw(30),
    }));
    assert!(commands.contains(&GpuCommand::BindDescriptorSet {
        bind_point: PipelineBindPoint::Graphics,
        layout: pipeline.layout,
        set,
    }));
    assert!(commands.contains(&GpuCommand::DrawIndexed {
        index_count: 6,
        instance_count: 12,
    }));
}

#[test]
fn test_hooks_wrap_render_pass() {
    let mut ctx = TestContext::new(2);
    let hooks = PassHooks::new()
        .before(|encoder: &mut CommandEncoder<'_>| encoder.dispatch(1, 2, 3))
        .after(|encoder: &mut CommandEncoder<'_>| encoder.dispatch(4, 5, 6));
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main").with_hooks(hooks))
        .unwrap();
    add_quad_renderer(&mut ctx, main);
    ctx.scene.record().unwrap();

    let commands = ctx.swapchain_commands(0);
    assert_eq!(commands.first(), Some(&GpuCommand::Dispatch { x: 1, y: 2, z: 3 }));
    assert!(matches!(commands[1], GpuCommand::BeginRenderPass { .. }));
    assert_eq!(commands.last(), Some(&GpuCommand::Dispatch { x: 4, y: 5, z: 6 }));
}

#[test]
fn test_compute_mode_transitions_presentable_image() {
    let mut ctx =
        TestContext::with_config(2, SceneConfig::default().with_mode(SwapchainMode::Compute));
    ctx.scene
        .add_compute_pass(
            ComputePassDescriptor::new("raymarch", compute_shader())
                .with_dispatch_groups(DispatchGroups::new(16, 16, 1)),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let image = ctx.scene.swapchain().images()[1];
    let commands = ctx.swapchain_commands(1);
    assert!(matches!(
        &commands[0],
        GpuCommand::ImageBarrier(barrier)
            if barrier.image == image
                && barrier.old_layout == ImageLayout::PresentSrc
                && barrier.new_layout == ImageLayout::General
    ));
    assert!(commands.contains(&GpuCommand::Dispatch { x: 80, y: 45, z: 1 }));
    assert!(matches!(
        commands.last(),
        Some(GpuCommand::ImageBarrier(barrier))
            if barrier.image == image
                && barrier.old_layout == ImageLayout::General
                && barrier.new_layout == ImageLayout::PresentSrc
    ));

    let acquired = ctx.semaphore();
    ctx.scene
        .frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 1, Some(acquired), &[], &[])
        .unwrap();
    let submission = &ctx.backend.submissions()[0];
    assert_eq!(submission.queue, COMPUTE_QUEUE);
    assert_eq!(submission.waits[0].stage, PipelineStages::COMPUTE_SHADER);
}

#[test]
fn test_ray_tracing_mode_traces_full_image() {
    let mut ctx =
        TestContext::with_config(2, SceneConfig::default().with_mode(SwapchainMode::RayTracing));
    ctx.scene
        .add_ray_tracing_pass(
            RayTracingPassDescriptor::new("path_tracer", ShaderStageDescriptor::new("rt.rgen.spv"))
                .with_miss(ShaderStageDescriptor::new("rt.rmiss.spv"))
                .with_closest_hit(ShaderStageDescriptor::new("rt.rchit.spv")),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let commands = ctx.swapchain_commands(0);
    assert!(commands.contains(&GpuCommand::TraceRays {
        width: 1280,
        height: 720,
        depth: 1,
    }));
    assert_eq!(
        count_commands(&commands, |command| matches!(command, GpuCommand::ImageBarrier(_))),
        2
    );
}

#[test]
fn test_transfer_mode_copies_into_image() {
    let mut ctx =
        TestContext::with_config(2, SceneConfig::default().with_mode(SwapchainMode::Transfer));
    let origin = GpuImage::from_raw(700);
    ctx.scene
        .add_transfer(TransferDescriptor::new("present_copy", origin))
        .unwrap();
    ctx.scene.record().unwrap();

    let image = ctx.scene.swapchain().images()[0];
    assert!(ctx.swapchain_commands(0).contains(&GpuCommand::CopyImage {
        src: origin,
        dst: image,
        extent: Extent2d::new(1280, 720),
    }));
}

#[test]
fn test_mirror_blits_rendered_image() {
    common::init_logging();
    let backend = Arc::new(redlilium_scene::DummyBackend::new());
    let mirror = swapchain_images(200, 2, 640, 360);
    let mut scene = Scene::with_mirror(
        backend.clone(),
        SceneConfig::default(),
        swapchain_images(100, 2, 1280, 720),
        mirror.clone(),
    )
    .unwrap();
    let main = scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    assert_eq!(
        scene.render_pass(main).unwrap().attachments()[1].final_layout,
        ImageLayout::TransferSrc
    );
    scene.record().unwrap();

    let commands = backend.commands(scene.streams().swapchain_command_buffers()[1]);
    assert!(commands.contains(&GpuCommand::BlitImage {
        src: scene.swapchain().images()[1],
        src_extent: Extent2d::new(1280, 720),
        dst: mirror.images()[1],
        dst_extent: Extent2d::new(640, 360),
    }));
}

#[test]
fn test_mirror_blit_follows_each_presenting_pass() {
    common::init_logging();
    let backend = Arc::new(redlilium_scene::DummyBackend::new());
    let mut scene = Scene::with_mirror(
        backend.clone(),
        SceneConfig::default(),
        swapchain_images(100, 2, 1280, 720),
        swapchain_images(200, 2, 640, 360),
    )
    .unwrap();
    scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    scene
        .add_render_pass(RenderPassDescriptor::offscreen("gbuffer", offscreen_color()))
        .unwrap();
    scene
        .add_render_pass(RenderPassDescriptor::swapchain("overlay"))
        .unwrap();
    scene.record().unwrap();

    let commands = backend.commands(scene.streams().swapchain_command_buffers()[0]);
    let positions = |predicate: fn(&GpuCommand) -> bool| -> Vec<usize> {
        commands
            .iter()
            .enumerate()
            .filter(|(_, command)| predicate(command))
            .map(|(index, _)| index)
            .collect()
    };
    let begins = positions(|command| matches!(command, GpuCommand::BeginRenderPass { .. }));
    let ends = positions(|command| matches!(command, GpuCommand::EndRenderPass));
    let blits = positions(|command| matches!(command, GpuCommand::BlitImage { .. }));

    assert_eq!(begins.len(), 3);
    assert_eq!(ends.len(), 3);
    assert_eq!(blits.len(), 2);
    // After "main" and before "gbuffer" begins.
    assert!(ends[0] < blits[0] && blits[0] < begins[1]);
    // After "overlay", none after the offscreen pass.
    assert!(blits[1] > ends[2]);
}

#[test]
fn test_auxiliary_stream_recording() {
    let mut ctx = TestContext::new(3);
    let stream = ctx
        .scene
        .add_command_stream(CommandStreamDescriptor::new("shadows", StreamKind::Graphics))
        .unwrap();
    let shadows = ctx
        .scene
        .add_render_pass(
            RenderPassDescriptor::offscreen(
                "shadow_map",
                vec![AttachmentDescriptor::depth(
                    TextureFormat::Depth32Float,
                    Extent2d::new(2048, 2048),
                )],
            )
            .with_stream(stream),
        )
        .unwrap();
    add_quad_renderer(&mut ctx, shadows);

    let destination = GpuImage::from_raw(800);
    ctx.scene
        .add_transfer(
            TransferDescriptor::new("copy_shadow", GpuImage::from_raw(801))
                .with_stream(stream)
                .with_origin_extent(Extent2d::new(2048, 2048))
                .with_destination(destination, ImageLayout::ShaderReadOnly),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    assert_eq!(ctx.scene.streams().command_buffer_count(), 4);
    let command_buffer = ctx.scene.streams().command_buffer(stream).unwrap();
    let commands = ctx.backend.commands(command_buffer);
    assert_eq!(
        count_commands(&commands, |command| matches!(
            command,
            GpuCommand::BeginRenderPass { .. }
        )),
        1
    );
    assert!(commands.contains(&GpuCommand::CopyImage {
        src: GpuImage::from_raw(801),
        dst: destination,
        extent: Extent2d::new(2048, 2048),
    }));

    // Nothing of the auxiliary stream lands in the swap-chain stream.
    assert!(ctx.swapchain_commands(0).is_empty());
}

#[test]
fn test_auxiliary_transfer_requires_destination() {
    let mut ctx = TestContext::new(2);
    let stream = ctx
        .scene
        .add_command_stream(CommandStreamDescriptor::new("copies", StreamKind::Graphics))
        .unwrap();
    let result = ctx.scene.add_transfer(
        TransferDescriptor::new("nowhere", GpuImage::from_raw(1)).with_stream(stream),
    );
    assert!(matches!(result, Err(SceneError::MissingOutput { .. })));
}

#[rstest]
#[case::no_streams(3, 0)]
#[case::one_stream(3, 1)]
#[case::two_streams(2, 2)]
fn test_command_buffer_count(#[case] images: u64, #[case] streams: usize) {
    let mut ctx = TestContext::new(images);
    for n in 0..streams {
        ctx.scene
            .add_command_stream(CommandStreamDescriptor::new(
                format!("stream_{n}"),
                StreamKind::Compute,
            ))
            .unwrap();
    }
    ctx.scene.record().unwrap();

    assert_eq!(
        ctx.scene.streams().command_buffer_count(),
        images as usize + streams
    );
    assert_eq!(ctx.backend.live().command_buffers, images as usize + streams);
}

// ============================================================================
// Frame Tests
// ============================================================================

#[test]
fn test_wait_edge_between_streams() {
    let mut ctx = TestContext::new(3);
    let a = ctx
        .scene
        .add_command_stream(CommandStreamDescriptor::new("a", StreamKind::Graphics))
        .unwrap();
    let b = ctx
        .scene
        .add_command_stream(CommandStreamDescriptor::new("b", StreamKind::Compute))
        .unwrap();
    ctx.scene.record().unwrap();

    ctx.scene
        .frame(
            GRAPHICS_QUEUE,
            COMPUTE_QUEUE,
            2,
            None,
            &[a.into(), b.into()],
            &[WaitEdge::new(a, b)],
        )
        .unwrap();

    let a_done = ctx.scene.streams().completion(a).unwrap().handle();
    let b_done = ctx.scene.streams().completion(b).unwrap().handle();
    let submissions = ctx.backend.submissions();
    assert_eq!(submissions.len(), 3);

    assert_eq!(submissions[0].label, "a");
    assert_eq!(submissions[0].queue, GRAPHICS_QUEUE);
    assert!(submissions[0].waits.is_empty());
    assert_eq!(submissions[0].signals, vec![a_done]);

    assert_eq!(submissions[1].label, "b");
    assert_eq!(submissions[1].queue, COMPUTE_QUEUE);
    assert!(submissions[1].waits_on(a_done));
    assert_eq!(submissions[1].signals, vec![b_done]);

    // Without an acquired image the swap-chain stream signals nothing.
    assert!(submissions[2].waits.is_empty());
    assert!(submissions[2].signals.is_empty());
}

#[test]
fn test_swapchain_waits_on_streams() {
    let mut ctx = TestContext::new(2);
    let a = ctx
        .scene
        .add_command_stream(
            CommandStreamDescriptor::new("lighting", StreamKind::Compute)
                .with_final_stage(PipelineStages::FRAGMENT_SHADER),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let acquired = ctx.semaphore();
    ctx.scene
        .frame(
            GRAPHICS_QUEUE,
            COMPUTE_QUEUE,
            0,
            Some(acquired),
            &[StreamTarget::Swapchain, a.into()],
            &[WaitEdge::from_raw(0, -1)],
        )
        .unwrap();

    let submissions = ctx.backend.submissions();
    assert_eq!(submissions.len(), 2);
    let swapchain = &submissions[1];
    assert!(swapchain.waits_on(acquired));
    assert!(swapchain.waits.contains(&SemaphoreWait {
        semaphore: ctx.scene.streams().completion(a).unwrap().handle(),
        stage: PipelineStages::FRAGMENT_SHADER,
    }));
}

#[rstest]
#[case::swapchain_producer(WaitEdge::from_raw(-1, 0))]
#[case::unknown_producer(WaitEdge::from_raw(5, 0))]
#[case::unknown_consumer(WaitEdge::from_raw(0, 7))]
fn test_invalid_wait_edge_ignored(#[case] edge: WaitEdge) {
    let mut ctx = TestContext::new(2);
    let stream = ctx
        .scene
        .add_command_stream(CommandStreamDescriptor::new("a", StreamKind::Graphics))
        .unwrap();
    ctx.scene.record().unwrap();

    ctx.scene
        .frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 0, None, &[stream.into()], &[edge])
        .unwrap();

    for submission in ctx.backend.submissions() {
        assert!(submission.waits.is_empty());
    }
}

#[test]
fn test_frame_preconditions() {
    let mut ctx = TestContext::new(2);
    assert_eq!(
        ctx.scene.frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 0, None, &[], &[]),
        Err(SceneError::NotRecorded)
    );

    ctx.scene.record().unwrap();
    assert_eq!(
        ctx.scene.frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, 2, None, &[], &[]),
        Err(SceneError::InvalidImageIndex { index: 2, count: 2 })
    );
    assert!(ctx.backend.submissions().is_empty());
}

#[test]
fn test_frame_loop_with_presenter() {
    let mut ctx = TestContext::new(3);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    add_quad_renderer(&mut ctx, main);
    ctx.scene.record().unwrap();

    let presenter = Presenter::new(ctx.backend.clone(), PresentQueue::new(GRAPHICS_QUEUE));
    let acquired = ctx.semaphore();
    for _ in 0..4 {
        let index = presenter.acquire(acquired).unwrap();
        ctx.scene
            .frame(GRAPHICS_QUEUE, COMPUTE_QUEUE, index, Some(acquired), &[], &[])
            .unwrap();
        ctx.scene.present(&presenter, index).unwrap();
    }

    let presents = ctx.backend.presents();
    let indices: Vec<_> = presents.iter().map(|present| present.image_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 0]);
    let complete = ctx.scene.streams().swapchain_complete().handle();
    assert!(presents.iter().all(|present| present.wait == complete));
    assert_eq!(ctx.backend.queue_idle_waits(), 4);
}

#[test]
fn test_updated_vertex_buffer_used_on_rerecord() {
    let mut ctx = TestContext::new(2);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    let renderer = add_quad_renderer(&mut ctx, main);
    ctx.scene.record().unwrap();

    let geometry = VertexBufferBinding::new(GpuBuffer::from_raw(20), GpuBuffer::from_raw(21), 3, 3);
    ctx.scene
        .update_vertex_buffer(main, renderer, MeshId::new(0), geometry)
        .unwrap();
    assert!(
        ctx.scene
            .update_vertex_buffer(main, renderer, MeshId::new(4), quad())
            .is_err()
    );
    ctx.scene.record().unwrap();

    let commands = ctx.swapchain_commands(1);
    assert!(commands.contains(&GpuCommand::BindVertexBuffer {
        binding: 0,
        buffer: GpuBuffer::from_raw(20),
    }));
    assert!(commands.contains(&GpuCommand::DrawIndexed {
        index_count: 3,
        instance_count: 1,
    }));
}

// ============================================================================
// Resize Tests
// ============================================================================

#[test]
fn test_resize_preserves_handles_and_order() {
    let mut ctx = TestContext::new(3);
    let offscreen = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::offscreen("gbuffer", offscreen_color()))
        .unwrap();
    add_quad_renderer(&mut ctx, offscreen);
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    let renderer = add_quad_renderer(&mut ctx, main);
    let second = VertexBufferBinding::new(GpuBuffer::from_raw(40), GpuBuffer::from_raw(41), 8, 12);
    ctx.scene
        .add_mesh(
            MeshDescriptor::new(main, renderer, second)
                .with_binding(DescriptorBinding::uniform_buffer(0, GpuBuffer::from_raw(42))),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let offscreen_object = ctx.scene.render_pass(offscreen).unwrap().objects()[0];
    let offscreen_pipeline = ctx
        .scene
        .renderer(offscreen, RendererId::new(0))
        .unwrap()
        .pipeline();
    let demand = ctx.scene.descriptor_demand();

    ctx.scene
        .resize(swapchain_images(300, 2, 1920, 1080))
        .unwrap();

    assert!(ctx.scene.is_recorded());
    assert_eq!(ctx.scene.registry().render_passes().len(), 2);

    // Offscreen state is untouched.
    let pass = ctx.scene.render_pass(offscreen).unwrap();
    assert_eq!(pass.objects(), &[offscreen_object]);
    assert!(ctx.backend.is_live_render_pass(offscreen_object));
    assert_eq!(pass.renderers()[0].pipeline(), offscreen_pipeline);

    // The swap-chain pass is rebuilt in place with its renderer and meshes.
    let pass = ctx.scene.render_pass(main).unwrap();
    assert_eq!(pass.label(), "main");
    assert_eq!(pass.extent(), Extent2d::new(1920, 1080));
    assert_eq!(pass.objects().len(), 2);
    for (object, image) in pass.objects().iter().zip(ctx.scene.swapchain().images()) {
        assert_eq!(ctx.backend.render_pass_image(*object), Some(*image));
        assert_eq!(
            ctx.backend.render_pass_extent(*object),
            Some(Extent2d::new(1920, 1080))
        );
    }
    let rebuilt = ctx.scene.renderer(main, renderer).unwrap();
    assert_eq!(rebuilt.label(), "quad");
    assert_eq!(rebuilt.extent(), Extent2d::new(1920, 1080));
    let geometry: Vec<_> = rebuilt
        .meshes()
        .iter()
        .map(|mesh| mesh.descriptor().geometry)
        .collect();
    assert_eq!(geometry, vec![quad(), second]);
    assert!(rebuilt.meshes()[1].draw().has_descriptor_set());
    assert_eq!(ctx.scene.descriptor_demand(), demand);

    // Old objects were released exactly once.
    assert_eq!(ctx.backend.live().render_passes, 3);
    assert_eq!(ctx.backend.live().pipelines, 2);
    assert_eq!(ctx.backend.live().descriptor_sets, 1);
    assert_eq!(ctx.backend.live().command_buffers, 2);
    assert_eq!(ctx.backend.invalid_releases(), 0);
}

#[test]
fn test_resize_grows_compute_replicas() {
    let mut ctx = TestContext::new(2);
    let id = ctx
        .scene
        .add_compute_pass(ComputePassDescriptor::new("tonemap", compute_shader()))
        .unwrap();
    ctx.scene.record().unwrap();
    let first_pool = ctx.scene.descriptor_pool();
    assert_eq!(ctx.backend.live().descriptor_sets, 2);

    ctx.scene.resize(swapchain_images(300, 4, 800, 600)).unwrap();

    let pass = ctx.scene.compute_pass(id).unwrap();
    assert_eq!(pass.replicas().len(), 4);
    assert_eq!(pass.extent(), Extent2d::new(800, 600));
    assert!(pass.replicas().iter().all(|replica| replica.descriptor_set().is_some()));
    assert_ne!(ctx.scene.descriptor_pool(), first_pool);
    assert_eq!(ctx.backend.live().descriptor_pools, 1);
    assert_eq!(ctx.backend.live().descriptor_sets, 4);
    assert_eq!(ctx.scene.descriptor_demand().max_sets(), 4);
    assert_eq!(ctx.backend.invalid_releases(), 0);
}

#[test]
fn test_resize_keeps_offscreen_compute_pass() {
    let mut ctx = TestContext::new(2);
    let id = ctx
        .scene
        .add_compute_pass(
            ComputePassDescriptor::new("simulate", compute_shader())
                .offscreen(Extent2d::new(256, 256))
                .with_binding(DescriptorBinding::storage_buffer(0, GpuBuffer::from_raw(3))),
        )
        .unwrap();
    ctx.scene.record().unwrap();
    let set = ctx.scene.compute_pass(id).unwrap().replicas()[0].descriptor_set();

    ctx.scene.resize(swapchain_images(300, 3, 640, 480)).unwrap();

    let pass = ctx.scene.compute_pass(id).unwrap();
    assert_eq!(pass.replicas().len(), 1);
    assert_eq!(pass.extent(), Extent2d::new(256, 256));
    assert_eq!(pass.replicas()[0].descriptor_set(), set);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[test]
fn test_drop_releases_everything() {
    let mut ctx = TestContext::new(3);
    let stream = ctx
        .scene
        .add_command_stream(CommandStreamDescriptor::new("aux", StreamKind::Compute))
        .unwrap();
    let main = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"))
        .unwrap();
    add_quad_renderer(&mut ctx, main);
    ctx.scene
        .add_compute_pass(
            ComputePassDescriptor::new("blur", compute_shader())
                .offscreen(Extent2d::new(128, 128))
                .with_stream(stream)
                .with_binding(DescriptorBinding::storage_image(0, GpuImage::from_raw(9))),
        )
        .unwrap();
    ctx.scene.record().unwrap();

    let TestContext { backend, scene } = ctx;
    drop(scene);

    let live = backend.live();
    assert_eq!(live.semaphores, 0);
    assert_eq!(live.command_buffers, 0);
    assert_eq!(live.render_passes, 0);
    assert_eq!(live.descriptor_pools, 0);
    assert_eq!(live.descriptor_sets, 0);
    assert_eq!(live.pipelines, 0);
    assert_eq!(backend.invalid_releases(), 0);
    assert!(backend.device_idle_waits() >= 1);
}

#[test]
fn test_failed_object_creation_is_fatal() {
    let mut ctx = TestContext::new(2);
    ctx.backend.set_fail_object_creation(true);
    let result = ctx
        .scene
        .add_render_pass(RenderPassDescriptor::swapchain("main"));
    assert!(matches!(result, Err(SceneError::ObjectCreationFailed(_))));
    assert!(ctx.scene.registry().is_empty());
    assert_eq!(ctx.backend.live().render_passes, 0);
}

#[test]
fn test_output_target_of_passes() {
    let ctx = TestContext::new(2);
    let descriptor = ComputePassDescriptor::new("a", compute_shader());
    assert_eq!(descriptor.output, OutputTarget::Swapchain);
    let descriptor = descriptor.offscreen(Extent2d::new(1, 1));
    assert_eq!(descriptor.output, OutputTarget::Offscreen);
    assert_eq!(ctx.backend.name(), "Dummy");
}
