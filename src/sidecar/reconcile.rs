//! Business-name reconciliation between a model and its sidecar.
//!
//! Export goes sidecar to model: records override what the host can express and
//! supply what it cannot (physics, labels, non-vertex morphs). Import goes the other
//! way and regenerates a complete sidecar from a loaded model.

use crate::bone_order::{business_bone_name, BoneIndex};
use crate::error::{Diagnostic, Report, Result};
use crate::sidecar::document::{
    BoneOffsetRecord, BoneRecord, ColorOverride, GroupOffsetRecord, Header, JointRecord,
    LabelRecord, MaterialOffsetRecord, MaterialRecord, MorphRecord, RigidRecord, Sidecar,
    SphereRecord, Tab, TabKind,
};
use crate::sidecar::emit::crlf;
use crate::types::{
    BoneOffset, Frame, FrameItem, GroupOffset, Joint, JointKind, Material, MaterialFlags,
    MaterialOffset, Model, ModelInfo, Morph, MorphOffsets, Panel, Rigid, RigidPhysics,
    RigidShape, SphereMode, TextureTable, ToonMode, Vec3, VertexOffset,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The project sidecar (or the template standing in for it) plus the merged morph records.
#[derive(Debug, Clone)]
pub struct Sources {
    pub active: Sidecar,
    project: bool,
    template_header: Option<Header>,
    morphs: HashMap<String, MorphRecord>,
}

impl Sources {
    /// Template morph records first, then the project's; the project wins on a shared name.
    pub fn new(project: Option<Sidecar>, use_japanese: bool) -> Result<Sources> {
        let template = Sidecar::template(use_japanese)?;
        let mut morphs: HashMap<String, MorphRecord> = template
            .morphs
            .iter()
            .map(|m| (m.b_name.clone(), m.clone()))
            .collect();
        let template_header = template.header.clone();
        let is_project = project.is_some();
        let active = match project {
            Some(project) => {
                for m in &project.morphs {
                    morphs.insert(m.b_name.clone(), m.clone());
                }
                project
            }
            None => template,
        };
        Ok(Sources {
            active,
            project: is_project,
            template_header,
            morphs,
        })
    }

    pub fn morph(&self, b_name: &str) -> Option<&MorphRecord> {
        self.morphs.get(b_name)
    }

    /// Declared bone order, when the sidecar has one.
    pub fn bone_order(&self) -> Option<Vec<String>> {
        if self.active.bones.is_empty() {
            None
        } else {
            Some(self.active.bones.iter().map(|b| b.b_name.clone()).collect())
        }
    }

    /// Header fields, falling back to the file name and the template comments.
    pub fn model_info(&self, file_name: &str) -> ModelInfo {
        let empty = Header::default();
        let project = match (&self.active.header, self.project) {
            (Some(h), true) => h,
            _ => &empty,
        };
        let template = self.template_header.as_ref().unwrap_or(&empty);
        let name = project
            .name
            .clone()
            .unwrap_or_else(|| file_name.to_owned());
        ModelInfo {
            name_en: project.name_e.clone().unwrap_or_else(|| name.clone()),
            name,
            comment: crlf(
                project
                    .comment
                    .as_deref()
                    .or(template.comment.as_deref())
                    .unwrap_or("Comment"),
            ),
            comment_en: crlf(
                project
                    .comment_e
                    .as_deref()
                    .or(template.comment_e.as_deref())
                    .unwrap_or("Comment"),
            ),
        }
    }
}

/// Host-stable keys of a model's bones, materials and morphs, index-aligned with the model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BusinessNames {
    pub bones: Vec<String>,
    pub materials: Vec<String>,
    pub morphs: Vec<String>,
}

fn selected(name: &str, name_en: &str, use_japanese: bool) -> String {
    if use_japanese || name_en.is_empty() {
        name.to_owned()
    } else {
        name_en.to_owned()
    }
}

impl BusinessNames {
    pub fn derive(model: &Model, use_japanese: bool) -> BusinessNames {
        BusinessNames {
            bones: model
                .bones
                .iter()
                .map(|b| business_bone_name(&b.name, &b.name_en, use_japanese))
                .collect(),
            materials: model
                .materials
                .iter()
                .map(|m| selected(&m.name, &m.name_en, use_japanese))
                .collect(),
            morphs: model
                .morphs
                .iter()
                .map(|m| selected(&m.name, &m.name_en, use_japanese))
                .collect(),
        }
    }
}

fn name_at(names: &[String], index: i32) -> Option<String> {
    usize::try_from(index)
        .ok()
        .and_then(|i| names.get(i))
        .cloned()
}

fn degrees(v: Vec3) -> Vec3 {
    [v[0].to_degrees(), v[1].to_degrees(), v[2].to_degrees()]
}

fn radians(v: Vec3) -> Vec3 {
    [v[0].to_radians(), v[1].to_radians(), v[2].to_radians()]
}

fn unresolved(report: &mut Report, kind: &'static str, name: &str) {
    report.push(Diagnostic::UnresolvedName {
        kind,
        name: name.to_owned(),
    });
}

/// Applies every attribute the record carries; absent ones keep the current value.
pub fn apply_material(record: &MaterialRecord, material: &mut Material, textures: &mut TextureTable) {
    if let Some(name) = &record.name {
        material.name = name.clone();
    }
    if let Some(name_e) = &record.name_e {
        material.name_en = name_e.clone();
    }
    let flags = [
        (record.both, MaterialFlags::DOUBLE_SIDED),
        (record.ground_shadow, MaterialFlags::GROUND_SHADOW),
        (record.drop_shadow, MaterialFlags::DROP_SHADOW),
        (record.on_shadow, MaterialFlags::RECEIVE_SHADOW),
        (record.on_edge, MaterialFlags::EDGE),
    ];
    for (value, flag) in flags {
        if let Some(on) = value {
            material.flags.set(flag, on);
        }
    }
    if let Some(size) = record.edge_size {
        material.edge_size = size;
    }
    if let Some(power) = record.power {
        material.specular_power = power;
    }
    if let Some(c) = &record.edge_color {
        c.apply_rgba(&mut material.edge_color);
    }
    if let Some(c) = &record.diffuse {
        c.apply_rgba(&mut material.diffuse);
    }
    if let Some(c) = &record.specular {
        c.apply_rgb(&mut material.specular);
    }
    if let Some(c) = &record.ambient {
        c.apply_rgb(&mut material.ambient);
    }
    if let Some(toon) = &record.toon {
        material.toon = toon_mode(record.use_systemtoon, toon, textures);
    }
    if let Some(sphere) = &record.sphere {
        if sphere.path.is_empty() || sphere.mode == SphereMode::None {
            material.sphere = -1;
            material.sphere_mode = SphereMode::None;
        } else {
            material.sphere = textures.intern(&sphere.path);
            material.sphere_mode = sphere.mode;
        }
    }
}

fn toon_mode(use_system: Option<bool>, toon: &str, textures: &mut TextureTable) -> ToonMode {
    let toon = toon.trim();
    if toon.is_empty() || toon == "-1" {
        return ToonMode::Texture(-1);
    }
    let system = toon.parse::<u8>().ok().filter(|id| *id <= 9);
    match (use_system, system) {
        (Some(false), _) | (None, None) => ToonMode::Texture(textures.intern(toon)),
        (_, Some(id)) => ToonMode::System(id),
        (Some(true), None) => {
            warn!(toon, "system toon id out of range, using toon 0");
            ToonMode::System(0)
        }
    }
}

/// A record holding every rendering attribute of `m`.
pub fn material_record(m: &Material, b_name: &str, textures: &[String]) -> MaterialRecord {
    let path = |index: i32| {
        usize::try_from(index)
            .ok()
            .and_then(|i| textures.get(i))
            .cloned()
    };
    let (use_systemtoon, toon) = match m.toon {
        ToonMode::System(id) => (true, id.to_string()),
        ToonMode::Texture(index) => (false, path(index).unwrap_or_else(|| "-1".to_owned())),
    };
    MaterialRecord {
        b_name: b_name.to_owned(),
        name: Some(m.name.clone()),
        name_e: Some(m.name_en.clone()),
        use_systemtoon: Some(use_systemtoon),
        toon: Some(toon),
        both: Some(m.flags.contains(MaterialFlags::DOUBLE_SIDED)),
        ground_shadow: Some(m.flags.contains(MaterialFlags::GROUND_SHADOW)),
        drop_shadow: Some(m.flags.contains(MaterialFlags::DROP_SHADOW)),
        on_shadow: Some(m.flags.contains(MaterialFlags::RECEIVE_SHADOW)),
        on_edge: Some(m.flags.contains(MaterialFlags::EDGE)),
        edge_size: Some(m.edge_size),
        power: Some(m.specular_power),
        edge_color: Some(ColorOverride::rgba(m.edge_color)),
        diffuse: Some(ColorOverride::rgba(m.diffuse)),
        specular: Some(ColorOverride::rgb(m.specular)),
        ambient: Some(ColorOverride::rgb(m.ambient)),
        sphere: path(m.sphere).map(|path| SphereRecord {
            path,
            mode: m.sphere_mode,
        }),
    }
}

enum MorphSource {
    Vertex(Vec<VertexOffset>),
    Record,
}

fn has_offsets(record: &MorphRecord) -> bool {
    !(record.material_offsets.is_empty()
        && record.bone_offsets.is_empty()
        && record.group_offsets.is_empty())
}

/// Orders and builds every morph, returning them with their business names.
///
/// Sidecar-declared morphs come first in declared order; a declared morph exists when
/// the host has a shape key of that name or its record carries offsets. Host-only
/// shape keys follow. Group offsets are resolved once all indices are known.
pub fn resolve_morphs(
    sources: &Sources,
    vertex_morphs: Vec<(String, Vec<VertexOffset>)>,
    materials: &HashMap<String, i32>,
    bones: &BoneIndex,
    report: &mut Report,
) -> (Vec<Morph>, Vec<String>) {
    let mut shapes: HashMap<String, Vec<VertexOffset>> = HashMap::new();
    let mut host_order = vec![];
    for (name, offsets) in vertex_morphs {
        if !shapes.contains_key(&name) {
            host_order.push(name.clone());
        }
        shapes.insert(name, offsets);
    }

    let mut plan: Vec<(String, MorphSource)> = vec![];
    for record in &sources.active.morphs {
        let name = &record.b_name;
        if plan.iter().any(|(n, _)| n == name) {
            continue;
        }
        if let Some(offsets) = shapes.remove(name) {
            plan.push((name.clone(), MorphSource::Vertex(offsets)));
        } else if sources.morph(name).map_or(false, has_offsets) {
            plan.push((name.clone(), MorphSource::Record));
        }
    }
    for name in host_order {
        if let Some(offsets) = shapes.remove(&name) {
            plan.push((name, MorphSource::Vertex(offsets)));
        }
    }

    let index: HashMap<&str, i32> = plan
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i as i32))
        .collect();

    let mut morphs = Vec::with_capacity(plan.len());
    for (name, source) in &plan {
        let record = sources.morph(name);
        let offsets = match source {
            MorphSource::Vertex(offsets) => MorphOffsets::Vertex(offsets.clone()),
            MorphSource::Record => match record {
                Some(r) => record_offsets(r, &index, materials, bones, report),
                None => MorphOffsets::Vertex(vec![]),
            },
        };
        morphs.push(Morph {
            name: record
                .and_then(|r| r.name.clone())
                .unwrap_or_else(|| name.clone()),
            name_en: record
                .and_then(|r| r.name_e.clone())
                .unwrap_or_else(|| name.clone()),
            panel: record.map_or(Panel::Other, |r| r.group),
            offsets,
        });
    }
    debug!(morphs = morphs.len(), "resolved morphs");
    let names = plan.into_iter().map(|(name, _)| name).collect();
    (morphs, names)
}

/// Picks the offset list named by the record's kind, else the first non-empty one.
fn record_offsets(
    record: &MorphRecord,
    morphs: &HashMap<&str, i32>,
    materials: &HashMap<String, i32>,
    bones: &BoneIndex,
    report: &mut Report,
) -> MorphOffsets {
    let kind = match record.kind {
        Some(0) if !record.group_offsets.is_empty() => 0,
        Some(2) if !record.bone_offsets.is_empty() => 2,
        Some(8) if !record.material_offsets.is_empty() => 8,
        _ if !record.material_offsets.is_empty() => 8,
        _ if !record.bone_offsets.is_empty() => 2,
        _ => 0,
    };
    match kind {
        8 => MorphOffsets::Material(
            record
                .material_offsets
                .iter()
                .filter_map(|o| material_offset(o, materials, report))
                .collect(),
        ),
        2 => MorphOffsets::Bone(
            record
                .bone_offsets
                .iter()
                .filter_map(|o| {
                    let bone = bones.get(&o.bone);
                    if bone < 0 {
                        unresolved(report, "bone", &o.bone);
                        return None;
                    }
                    Some(BoneOffset {
                        bone,
                        translation: o.translation,
                        rotation: o.rotation,
                    })
                })
                .collect(),
        ),
        _ => MorphOffsets::Group(
            record
                .group_offsets
                .iter()
                .filter_map(|o| match morphs.get(o.morph.as_str()) {
                    Some(&morph) => Some(GroupOffset {
                        morph,
                        factor: o.factor,
                    }),
                    None => {
                        unresolved(report, "morph", &o.morph);
                        None
                    }
                })
                .collect(),
        ),
    }
}

fn material_offset(
    o: &MaterialOffsetRecord,
    materials: &HashMap<String, i32>,
    report: &mut Report,
) -> Option<MaterialOffset> {
    let material = match &o.material_name {
        None => -1,
        Some(name) => match materials.get(name) {
            Some(&i) => i,
            None => {
                unresolved(report, "material", name);
                return None;
            }
        },
    };
    Some(MaterialOffset {
        material,
        operation: o.operation,
        diffuse: o.diffuse,
        specular: o.specular,
        specular_power: o.power,
        ambient: o.ambient,
        edge_color: o.edge_color,
        edge_size: o.edge_size,
        texture_tint: o.texture,
        sphere_tint: o.sphere,
        toon_tint: o.toon,
    })
}

/// Sidecar labels, or Root, 表情 (every morph) and 骨 (every bone) when there are none.
pub fn resolve_labels(
    labels: Option<&[LabelRecord]>,
    bones: &BoneIndex,
    bone_count: usize,
    morphs: &HashMap<String, i32>,
    morph_count: usize,
    report: &mut Report,
) -> Vec<Frame> {
    let labels = match labels {
        Some(labels) => labels,
        None => {
            return vec![
                Frame {
                    name: "Root".to_owned(),
                    name_en: "Root".to_owned(),
                    special: true,
                    items: vec![FrameItem::Bone(0)],
                },
                Frame {
                    name: "表情".to_owned(),
                    name_en: "Exp".to_owned(),
                    special: true,
                    items: (0..morph_count as i32).map(FrameItem::Morph).collect(),
                },
                Frame {
                    name: "骨".to_owned(),
                    name_en: "Bone".to_owned(),
                    special: false,
                    items: (0..bone_count as i32).map(FrameItem::Bone).collect(),
                },
            ]
        }
    };
    labels
        .iter()
        .map(|label| Frame {
            name: label.name.clone(),
            name_en: label.name_e.clone().unwrap_or_else(|| label.name.clone()),
            special: label.special,
            items: label
                .tabs
                .iter()
                .filter_map(|tab| {
                    let item = match tab.kind {
                        TabKind::Bone => Some(bones.get(&tab.name))
                            .filter(|i| *i >= 0)
                            .map(FrameItem::Bone),
                        TabKind::Morph => morphs.get(&tab.name).map(|&i| FrameItem::Morph(i)),
                    };
                    if item.is_none() {
                        let kind = match tab.kind {
                            TabKind::Bone => "bone",
                            TabKind::Morph => "morph",
                        };
                        unresolved(report, kind, &tab.name);
                    }
                    item
                })
                .collect(),
        })
        .collect()
}

pub fn resolve_rigids(records: &[RigidRecord], bones: &BoneIndex, report: &mut Report) -> Vec<Rigid> {
    records
        .iter()
        .map(|r| {
            let bone = match &r.attach {
                None => -1,
                Some(name) => {
                    let bone = bones.get(name);
                    if bone < 0 {
                        unresolved(report, "bone", name);
                    }
                    bone
                }
            };
            let shape = RigidShape::try_from(r.shape).unwrap_or_else(|e| {
                warn!(rigid = %r.name, "{}, using a sphere", e);
                RigidShape::Sphere
            });
            let physics = RigidPhysics::try_from(r.physics).unwrap_or_else(|e| {
                warn!(rigid = %r.name, "{}, using static", e);
                RigidPhysics::Static
            });
            Rigid {
                name: r.name.clone(),
                name_en: r.name_e.clone().unwrap_or_else(|| r.name.clone()),
                bone,
                group: r.group,
                collision_mask: r.collision_mask,
                shape,
                size: r.size,
                position: r.position,
                rotation: radians(r.rotation),
                mass: r.mass,
                linear_damping: r.linear_damping,
                angular_damping: r.angular_damping,
                restitution: r.restitution,
                friction: r.friction,
                physics,
            }
        })
        .collect()
}

/// A body is a rigid name, or a bare index into the rigid list.
fn body(name: &Option<String>, rigids: &[Rigid], report: &mut Report) -> i32 {
    let name = match name {
        Some(name) => name,
        None => return -1,
    };
    if let Some(i) = rigids.iter().position(|r| &r.name == name) {
        return i as i32;
    }
    match name.trim().parse::<i32>() {
        Ok(i) if i >= -1 && i < rigids.len() as i32 => i,
        _ => {
            unresolved(report, "rigid", name);
            -1
        }
    }
}

pub fn resolve_joints(records: &[JointRecord], rigids: &[Rigid], report: &mut Report) -> Vec<Joint> {
    records
        .iter()
        .map(|j| Joint {
            name: j.name.clone(),
            name_en: j.name_e.clone().unwrap_or_else(|| j.name.clone()),
            kind: JointKind::Spring6Dof,
            rigid_a: body(&j.body_a, rigids, report),
            rigid_b: body(&j.body_b, rigids, report),
            position: j.position,
            rotation: radians(j.rotation),
            position_min: j.position_min,
            position_max: j.position_max,
            rotation_min: radians(j.rotation_min),
            rotation_max: radians(j.rotation_max),
            position_spring: j.position_spring,
            rotation_spring: j.rotation_spring,
        })
        .collect()
}

fn morph_record(morph: &Morph, b_name: &str, names: &BusinessNames) -> MorphRecord {
    let mut record = MorphRecord {
        name: Some(morph.name.clone()),
        name_e: Some(morph.name_en.clone()),
        group: morph.panel,
        kind: Some(morph.offsets.kind()),
        ..MorphRecord::new(b_name)
    };
    match &morph.offsets {
        MorphOffsets::Group(offsets) => {
            record.group_offsets = offsets
                .iter()
                .filter_map(|o| {
                    Some(GroupOffsetRecord {
                        morph: name_at(&names.morphs, o.morph)?,
                        factor: o.factor,
                    })
                })
                .collect()
        }
        MorphOffsets::Bone(offsets) => {
            record.bone_offsets = offsets
                .iter()
                .filter_map(|o| {
                    Some(BoneOffsetRecord {
                        bone: name_at(&names.bones, o.bone)?,
                        translation: o.translation,
                        rotation: o.rotation,
                    })
                })
                .collect()
        }
        MorphOffsets::Material(offsets) => {
            record.material_offsets = offsets
                .iter()
                .map(|o| MaterialOffsetRecord {
                    material_name: name_at(&names.materials, o.material),
                    operation: o.operation,
                    diffuse: o.diffuse,
                    specular: o.specular,
                    power: o.specular_power,
                    ambient: o.ambient,
                    edge_color: o.edge_color,
                    edge_size: o.edge_size,
                    texture: o.texture_tint,
                    sphere: o.sphere_tint,
                    toon: o.toon_tint,
                })
                .collect()
        }
        MorphOffsets::Vertex(_)
        | MorphOffsets::Uv { .. }
        | MorphOffsets::Flip(_)
        | MorphOffsets::Impulse(_) => {}
    }
    record
}

impl Sidecar {
    /// A complete sidecar describing `model`, keyed by `names`.
    pub fn from_model(model: &Model, names: &BusinessNames) -> Sidecar {
        let bones = model
            .bones
            .iter()
            .zip(&names.bones)
            .map(|(b, b_name)| {
                let inherit = b.inherit.source();
                BoneRecord {
                    b_name: b_name.clone(),
                    name: Some(b.name.clone()),
                    name_e: Some(b.name_en.clone()),
                    rotatable: b.rotatable,
                    movable: b.movable,
                    visible: b.visible,
                    operational: b.operational,
                    ik: b.ik.is_some(),
                    add_rot: b.inherit.rotates(),
                    add_move: b.inherit.translates(),
                    target: inherit.and_then(|(parent, _)| name_at(&names.bones, parent)),
                    power: inherit.map_or(0.0, |(_, power)| power),
                    fixed_axis: b.fixed_axis.is_some(),
                    local_axis: b.local_axis.is_some(),
                    local_x: b.local_axis.map_or([0.0; 3], |a| a.x),
                    local_z: b.local_axis.map_or([0.0; 3], |a| a.z),
                    level: b.level,
                    after_physical: b.after_physics,
                }
            })
            .collect();
        let materials = model
            .materials
            .iter()
            .zip(&names.materials)
            .map(|(m, b_name)| material_record(m, b_name, &model.textures))
            .collect();
        let morphs = model
            .morphs
            .iter()
            .zip(&names.morphs)
            .map(|(m, b_name)| morph_record(m, b_name, names))
            .collect();
        let labels = model
            .frames
            .iter()
            .map(|f| LabelRecord {
                name: f.name.clone(),
                name_e: Some(f.name_en.clone()),
                special: f.special,
                tabs: f
                    .items
                    .iter()
                    .filter_map(|item| match *item {
                        FrameItem::Bone(i) => name_at(&names.bones, i).map(|name| Tab {
                            kind: TabKind::Bone,
                            name,
                        }),
                        FrameItem::Morph(i) => name_at(&names.morphs, i).map(|name| Tab {
                            kind: TabKind::Morph,
                            name,
                        }),
                    })
                    .collect(),
            })
            .collect();
        let rigids = model
            .rigids
            .iter()
            .map(|r| RigidRecord {
                name: r.name.clone(),
                name_e: Some(r.name_en.clone()),
                attach: name_at(&names.bones, r.bone),
                physics: match r.physics {
                    RigidPhysics::Static => 0,
                    RigidPhysics::Dynamic => 1,
                    RigidPhysics::DynamicWithBone => 2,
                },
                group: r.group,
                collision_mask: r.collision_mask,
                shape: match r.shape {
                    RigidShape::Sphere => 0,
                    RigidShape::Box => 1,
                    RigidShape::Capsule => 2,
                },
                size: r.size,
                position: r.position,
                rotation: degrees(r.rotation),
                mass: r.mass,
                linear_damping: r.linear_damping,
                angular_damping: r.angular_damping,
                restitution: r.restitution,
                friction: r.friction,
            })
            .collect();
        let rigid_names: Vec<String> = model.rigids.iter().map(|r| r.name.clone()).collect();
        let joints = model
            .joints
            .iter()
            .map(|j| JointRecord {
                name: j.name.clone(),
                name_e: Some(j.name_en.clone()),
                body_a: name_at(&rigid_names, j.rigid_a),
                body_b: name_at(&rigid_names, j.rigid_b),
                position: j.position,
                rotation: degrees(j.rotation),
                position_min: j.position_min,
                position_max: j.position_max,
                rotation_min: degrees(j.rotation_min),
                rotation_max: degrees(j.rotation_max),
                position_spring: j.position_spring,
                rotation_spring: j.rotation_spring,
            })
            .collect();
        Sidecar {
            header: Some(Header {
                name: Some(model.info.name.clone()),
                name_e: Some(model.info.name_en.clone()),
                comment: Some(model.info.comment.clone()),
                comment_e: Some(model.info.comment_en.clone()),
            }),
            morphs,
            bones,
            labels: Some(labels),
            materials,
            rigids,
            joints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone_order::build_bone_order;
    use crate::scene::HostBone;

    fn project(xml: &str) -> Sources {
        Sources::new(Some(Sidecar::parse(xml).unwrap()), true).unwrap()
    }

    #[test]
    fn edge_size_override_leaves_diffuse_alone() {
        let sources = project(
            r#"<pmxstatus><materials><material b_name="skin" edge_size="0.3" /></materials></pmxstatus>"#,
        );
        let mut material = Material {
            diffuse: [0.8, 0.6, 0.4, 1.0],
            ..Material::default()
        };
        let before = material.clone();
        let mut textures = TextureTable::default();
        apply_material(
            sources.active.material("skin").unwrap(),
            &mut material,
            &mut textures,
        );
        assert_eq!(material.edge_size, 0.3);
        assert_eq!(material.diffuse, before.diffuse);
        assert_eq!(
            Material {
                edge_size: before.edge_size,
                ..material
            },
            before
        );
    }

    #[test]
    fn toon_and_sphere_use_the_texture_table() {
        let sources = project(
            r#"<pmxstatus><materials>
            <material b_name="a" use_systemtoon="0" toon="toon_skin.bmp"><sphere path="env.spa" type="2" /></material>
            <material b_name="b" use_systemtoon="1" toon="3" />
            <material b_name="c" toon="-1" />
            </materials></pmxstatus>"#,
        );
        let mut textures = TextureTable::default();
        let mut a = Material::default();
        apply_material(sources.active.material("a").unwrap(), &mut a, &mut textures);
        assert_eq!(a.toon, ToonMode::Texture(0));
        assert_eq!((a.sphere, a.sphere_mode), (1, SphereMode::Add));
        let mut b = Material::default();
        apply_material(sources.active.material("b").unwrap(), &mut b, &mut textures);
        assert_eq!(b.toon, ToonMode::System(3));
        let mut c = Material {
            toon: ToonMode::System(1),
            ..Material::default()
        };
        apply_material(sources.active.material("c").unwrap(), &mut c, &mut textures);
        assert_eq!(c.toon, ToonMode::Texture(-1));
        assert_eq!(textures.paths, vec!["toon_skin.bmp", "env.spa"]);
    }

    #[test]
    fn project_morphs_override_the_template() {
        let sources = project(
            r#"<pmxstatus><morphs><morph b_name="あ" name="あ" name_e="Ah" group="3" /></morphs></pmxstatus>"#,
        );
        assert_eq!(sources.morph("あ").unwrap().name_e.as_deref(), Some("Ah"));
        // template-only records stay reachable
        assert!(sources.morph("もぐもぐ").is_some());
        assert_eq!(sources.active.morphs.len(), 1);
    }

    #[test]
    fn group_offsets_resolve_forward_references() {
        let sources = project(
            r#"<pmxstatus><morphs>
            <morph b_name="both" type="0" group="4">
              <group_offsets><group_offset morph="smile" factor="0.5" /><group_offset morph="nowhere" /></group_offsets>
            </morph>
            <morph b_name="smile" group="3" />
            </morphs></pmxstatus>"#,
        );
        let mut report = Report::default();
        let (morphs, names) = resolve_morphs(
            &sources,
            vec![(
                "smile".to_owned(),
                vec![VertexOffset {
                    vertex: 0,
                    offset: [0.0, 1.0, 0.0],
                }],
            )],
            &HashMap::new(),
            &BoneIndex::default(),
            &mut report,
        );
        assert_eq!(names, vec!["both", "smile"]);
        assert_eq!(
            morphs[0].offsets,
            MorphOffsets::Group(vec![GroupOffset {
                morph: 1,
                factor: 0.5
            }])
        );
        assert_eq!(morphs[1].panel, Panel::Mouth);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::UnresolvedName {
                kind: "morph",
                name: "nowhere".to_owned()
            }]
        );
    }

    #[test]
    fn host_only_morphs_follow_declared_ones() {
        let sources = Sources::new(None, true).unwrap();
        let mut report = Report::default();
        let shape = |name: &str| (name.to_owned(), Vec::<VertexOffset>::new());
        let (morphs, names) = resolve_morphs(
            &sources,
            vec![shape("custom"), shape("あ"), shape("まばたき")],
            &HashMap::new(),
            &BoneIndex::default(),
            &mut report,
        );
        assert_eq!(names, vec!["まばたき", "あ", "custom"]);
        assert_eq!(morphs[2].panel, Panel::Other);
        assert_eq!(morphs[1].name_en, "A");
    }

    #[test]
    fn default_labels_cover_everything() {
        let mut report = Report::default();
        let frames = resolve_labels(None, &BoneIndex::default(), 3, &HashMap::new(), 2, &mut report);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].items, vec![FrameItem::Bone(0)]);
        assert_eq!(frames[1].items.len(), 2);
        assert_eq!(frames[2].name_en, "Bone");
        assert_eq!(frames[2].items.len(), 3);
    }

    #[test]
    fn physics_resolves_by_name() {
        let sidecar = Sidecar::parse(
            r#"<pmxstatus>
            <rigid_bodies>
              <rigid name="head" attach="head" shape="2" type="1"><rot x="180" y="0" z="0" /></rigid>
              <rigid name="hair" attach="ghost" />
            </rigid_bodies>
            <constraints>
              <constraint name="neck" body_A="head" body_B="1"><rot_limit><to x="90" y="0" z="0" /></rot_limit></constraint>
              <constraint name="lost" body_A="missing" />
            </constraints>
            </pmxstatus>"#,
        )
        .unwrap();
        let order = build_bone_order(
            &[HostBone::new("head", [0.0; 3], [0.0, 0.0, 1.0])],
            None,
            true,
        );
        let mut report = Report::default();
        let rigids = resolve_rigids(&sidecar.rigids, &order.index, &mut report);
        assert_eq!(rigids[0].bone, 0);
        assert_eq!(rigids[0].shape, RigidShape::Capsule);
        assert!((rigids[0].rotation[0] - std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(rigids[1].bone, -1);
        let joints = resolve_joints(&sidecar.joints, &rigids, &mut report);
        assert_eq!((joints[0].rigid_a, joints[0].rigid_b), (0, 1));
        assert!((joints[0].rotation_max[0] - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert_eq!(joints[1].rigid_a, -1);
        assert_eq!(report.diagnostics.len(), 2);
    }

    #[test]
    fn header_falls_back_to_the_file_name() {
        let sources = Sources::new(None, false).unwrap();
        let info = sources.model_info("miku");
        assert_eq!(info.name, "miku");
        assert_eq!(info.name_en, "miku");
        assert_eq!(info.comment_en, "Comment");
        let sources = project(r#"<pmxstatus><pmdinfo><name>ミク</name></pmdinfo></pmxstatus>"#);
        let info = sources.model_info("miku");
        assert_eq!(info.name, "ミク");
        assert_eq!(info.name_en, "ミク");
    }

    #[test]
    fn model_sidecar_uses_business_names() {
        use crate::types::{Bone, Inherit};
        let model = Model {
            bones: vec![
                Bone {
                    name: "左肩".to_owned(),
                    name_en: "shoulder_L".to_owned(),
                    ..Bone::default()
                },
                Bone {
                    name: "左腕".to_owned(),
                    name_en: "arm_L".to_owned(),
                    inherit: Inherit::Rotate {
                        parent: 0,
                        power: 0.5,
                    },
                    ..Bone::default()
                },
            ],
            rigids: vec![Rigid {
                name: "arm".to_owned(),
                bone: 1,
                rotation: [std::f32::consts::PI, 0.0, 0.0],
                ..Rigid::default()
            }],
            ..Model::default()
        };
        let names = BusinessNames::derive(&model, true);
        assert_eq!(names.bones, vec!["肩_L", "腕_L"]);
        let sidecar = Sidecar::from_model(&model, &names);
        let arm = sidecar.bone("腕_L").unwrap();
        assert!(arm.add_rot && !arm.add_move);
        assert_eq!(arm.target.as_deref(), Some("肩_L"));
        assert_eq!(sidecar.rigids[0].attach.as_deref(), Some("腕_L"));
        assert!((sidecar.rigids[0].rotation[0] - 180.0).abs() < 1e-3);
        assert_eq!(sidecar.labels, Some(vec![]));
    }
}
