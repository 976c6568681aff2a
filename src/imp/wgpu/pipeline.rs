// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Compute pipelines built from whatever is bound at dispatch time.

Bound resources are laid out in three bind groups, with the binding index equal to the slot:

| Group | Contents                              | WGSL                                        |
|-------|---------------------------------------|---------------------------------------------|
| 0     | read views (buffers and textures)     | `var<storage, read>`, `texture_2d<T>`       |
| 1     | constant buffers                      | `var<uniform>`                              |
| 2     | read-write views                      | `var<storage, read_write>`                  |

A shader may declare fewer bindings than are bound.  Pipelines are cached per program and
binding signature.
*/

use std::collections::HashMap;

use wgpu::{BindGroupLayoutEntry, BindingType, BufferBindingType, ShaderStages};

use super::pixel_format::SampleKind;
use super::{WgpuBuffer, WgpuProgram, WgpuReadView, WgpuWriteView};

pub(super) const READ_GROUP: usize = 0;
pub(super) const CONSTANT_GROUP: usize = 1;
pub(super) const WRITE_GROUP: usize = 2;
const GROUPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Binding {
    ReadBuffer,
    Texture(SampleKind),
    Uniform,
    ReadWrite,
}

impl Binding {
    fn wgpu(self) -> BindingType {
        match self {
            Binding::ReadBuffer => BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Binding::Texture(kind) => BindingType::Texture {
                sample_type: kind.wgpu(),
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            Binding::Uniform => BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            Binding::ReadWrite => BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        }
    }
}

/// Which binding sits in each slot of each group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct Signature([Vec<Option<Binding>>; GROUPS]);

impl Signature {
    pub(super) fn of(
        read: &[Option<WgpuReadView>],
        constant: &[Option<WgpuBuffer>],
        write: &[Option<WgpuWriteView>],
    ) -> Self {
        let read = read
            .iter()
            .map(|view| {
                view.as_ref().map(|view| match view {
                    WgpuReadView::Buffer { .. } => Binding::ReadBuffer,
                    WgpuReadView::Texture { sample, .. } => Binding::Texture(*sample),
                })
            })
            .collect();
        let constant = constant
            .iter()
            .map(|buffer| buffer.as_ref().map(|_| Binding::Uniform))
            .collect();
        let write = write
            .iter()
            .map(|view| view.as_ref().map(|_| Binding::ReadWrite))
            .collect();
        Signature([read, constant, write])
    }

    fn entries(&self, group: usize) -> Vec<BindGroupLayoutEntry> {
        self.0[group]
            .iter()
            .enumerate()
            .filter_map(|(slot, binding)| {
                binding.map(|binding| BindGroupLayoutEntry {
                    binding: slot as u32,
                    visibility: ShaderStages::COMPUTE,
                    ty: binding.wgpu(),
                    count: None,
                })
            })
            .collect()
    }
}

#[derive(Debug)]
pub(super) struct Pipeline {
    pub(super) raw: wgpu::ComputePipeline,
    pub(super) layouts: [wgpu::BindGroupLayout; GROUPS],
}

fn build(device: &wgpu::Device, program: &WgpuProgram, signature: &Signature) -> Pipeline {
    let layouts = [READ_GROUP, CONSTANT_GROUP, WRITE_GROUP].map(|group| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&program.label),
            entries: &signature.entries(group),
        })
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&program.label),
        bind_group_layouts: &[&layouts[0], &layouts[1], &layouts[2]],
        push_constant_ranges: &[],
    });
    let raw = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&program.label),
        layout: Some(&pipeline_layout),
        module: &program.module,
        entry_point: Some(&program.entry_point),
        compilation_options: Default::default(),
        cache: None,
    });
    Pipeline { raw, layouts }
}

#[derive(Debug, Default)]
pub(super) struct PipelineCache {
    pipelines: HashMap<(u64, Signature), Pipeline>,
}

impl PipelineCache {
    /// Must be called inside an error scope; a pipeline that fails validation is cached anyway
    /// and fails again on every use.
    pub(super) fn get(
        &mut self,
        device: &wgpu::Device,
        program: &WgpuProgram,
        signature: Signature,
    ) -> &Pipeline {
        self.pipelines
            .entry((program.id, signature))
            .or_insert_with_key(|(_, signature)| build(device, program, signature))
    }

    pub(super) fn forget(&mut self, program_id: u64) {
        self.pipelines.retain(|(id, _), _| *id != program_id);
    }
}

fn read_resource(view: &WgpuReadView) -> wgpu::BindingResource<'_> {
    match view {
        WgpuReadView::Buffer { buffer, .. } => buffer.as_entire_binding(),
        WgpuReadView::Texture { view, .. } => wgpu::BindingResource::TextureView(view),
    }
}

/// One bind group per group, holding every bound slot.
pub(super) fn bind_groups(
    device: &wgpu::Device,
    pipeline: &Pipeline,
    read: &[Option<WgpuReadView>],
    constant: &[Option<WgpuBuffer>],
    write: &[Option<WgpuWriteView>],
) -> [wgpu::BindGroup; GROUPS] {
    fn entries<'a, T>(
        slots: &'a [Option<T>],
        resource: impl Fn(&'a T) -> wgpu::BindingResource<'a>,
    ) -> Vec<wgpu::BindGroupEntry<'a>> {
        slots
            .iter()
            .enumerate()
            .filter_map(|(slot, value)| {
                value.as_ref().map(|value| wgpu::BindGroupEntry {
                    binding: slot as u32,
                    resource: resource(value),
                })
            })
            .collect()
    }
    let groups = [
        entries(read, read_resource),
        entries(constant, |buffer| buffer.raw.as_entire_binding()),
        entries(write, |view| view.buffer.as_entire_binding()),
    ];
    std::array::from_fn(|group| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernels_and_views bindings"),
            layout: &pipeline.layouts[group],
            entries: &groups[group],
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slots_leave_gaps() {
        let signature = Signature([
            vec![Some(Binding::ReadBuffer), None, Some(Binding::Texture(SampleKind::Uint))],
            vec![],
            vec![None, Some(Binding::ReadWrite)],
        ]);
        let read: Vec<u32> = signature
            .entries(READ_GROUP)
            .iter()
            .map(|e| e.binding)
            .collect();
        assert_eq!(read, vec![0, 2]);
        assert!(signature.entries(CONSTANT_GROUP).is_empty());
        let write = signature.entries(WRITE_GROUP);
        assert_eq!(write.len(), 1);
        assert_eq!(write[0].binding, 1);
        assert!(matches!(
            write[0].ty,
            BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only: false },
                ..
            }
        ));
    }

    #[test]
    fn signatures_distinguish_sample_kinds() {
        let float = Signature([vec![Some(Binding::Texture(SampleKind::Float))], vec![], vec![]]);
        let uint = Signature([vec![Some(Binding::Texture(SampleKind::Uint))], vec![], vec![]]);
        assert_ne!(float, uint);
    }
}
