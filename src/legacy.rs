//! One-way upgrade of a parsed PMD file into the PMX model.

use crate::error::Result;
use crate::pmd::{PmdBone, PmdMaterial, PmdModel, PmdVertex};
use crate::status::FormatStatus;
use crate::types::{
    Bone, BoneTail, Frame, FrameItem, Ik, IkLink, Inherit, Joint, JointKind, Material,
    MaterialFlags, Model, ModelInfo, Morph, MorphOffsets, Panel, Rigid, RigidPhysics, RigidShape,
    SphereMode, TextureTable, ToonMode, Vertex, VertexOffset, VertexWeight,
};
use std::f32::consts::PI;
use tracing::{debug, warn};

const KNEE: &str = "ひざ";

static SYSTEM_TOONS: [&str; 10] = [
    "toon01.bmp",
    "toon02.bmp",
    "toon03.bmp",
    "toon04.bmp",
    "toon05.bmp",
    "toon06.bmp",
    "toon07.bmp",
    "toon08.bmp",
    "toon09.bmp",
    "toon10.bmp",
];

/// Missing English names fall back to the Japanese one.
fn placeholder(name_en: &str, name: &str) -> String {
    if name_en.is_empty() {
        name.to_owned()
    } else {
        name_en.to_owned()
    }
}

/// Two-bone legacy weight (percent of the first bone) to the tagged variant.
pub fn upgrade_weight(bones: [i32; 2], weight: u8) -> VertexWeight {
    let [a, b] = bones;
    if a == b || weight >= 100 {
        VertexWeight::BDEF1(a)
    } else if weight == 0 {
        VertexWeight::BDEF1(b)
    } else {
        VertexWeight::BDEF2 {
            bones,
            weight: f32::from(weight) / 100.0,
        }
    }
}

fn upgrade_vertex(v: &PmdVertex) -> Vertex {
    Vertex {
        position: v.position,
        normal: v.normal,
        uv: v.uv,
        extra_uv: vec![],
        weight: upgrade_weight(v.bones, v.weight),
        edge_scale: if v.edge_flag == 1 { 1.0 } else { 0.0 },
    }
}

fn upgrade_material(
    i: usize,
    m: &PmdMaterial,
    toon_names: &[String],
    textures: &mut TextureTable,
) -> Material {
    let alpha = m.diffuse[3];
    let mut flags = MaterialFlags::RECEIVE_SHADOW;
    flags.set(MaterialFlags::DOUBLE_SIDED, alpha < 1.0);
    flags.set(MaterialFlags::GROUND_SHADOW, m.edge);
    flags.set(MaterialFlags::DROP_SHADOW, (alpha * 100.0) as i32 != 98);
    flags.set(MaterialFlags::EDGE, m.edge);

    let texture = if m.texture.is_empty() {
        -1
    } else {
        textures.intern(&m.texture)
    };
    let (sphere, sphere_mode) = if m.sphere.is_empty() {
        (-1, SphereMode::None)
    } else {
        let lower = m.sphere.to_lowercase();
        let mode = if lower.ends_with(".sph") {
            SphereMode::Multiply
        } else if lower.ends_with(".spa") {
            SphereMode::Add
        } else {
            SphereMode::None
        };
        (textures.intern(&m.sphere), mode)
    };
    let toon = if m.toon < 0 {
        ToonMode::Texture(-1)
    } else {
        let name = toon_names
            .get(m.toon as usize)
            .map(String::as_str)
            .unwrap_or("");
        match SYSTEM_TOONS.iter().position(|t| *t == name) {
            Some(id) => ToonMode::System(id as u8),
            None if !name.is_empty() => ToonMode::Texture(textures.intern(name)),
            None => ToonMode::System(0),
        }
    };

    let name = format!("mat{:02}", i);
    Material {
        name_en: name.clone(),
        name,
        diffuse: m.diffuse,
        specular: m.specular,
        specular_power: m.shininess,
        ambient: m.ambient,
        flags,
        edge_color: [0.0, 0.0, 0.0, 1.0],
        edge_size: 1.0,
        texture,
        sphere,
        sphere_mode,
        toon,
        memo: String::new(),
        face_count: m.face_count as i32,
    }
}

fn position_of(bones: &[PmdBone], index: i32) -> Option<[f32; 3]> {
    usize::try_from(index)
        .ok()
        .and_then(|i| bones.get(i))
        .map(|b| b.position)
}

fn tail_of(bones: &[PmdBone], index: i32) -> i32 {
    usize::try_from(index)
        .ok()
        .and_then(|i| bones.get(i))
        .map_or(-1, |b| b.tail)
}

/// Legacy bone kinds onto capability flags and additional transforms.
fn upgrade_bone(b: &PmdBone, all: &[PmdBone]) -> Bone {
    let mut bone = Bone {
        name: b.name.clone(),
        name_en: placeholder(&b.name_en, &b.name),
        position: b.position,
        parent: b.parent,
        level: 0,
        tail: BoneTail::Bone(b.tail),
        rotatable: true,
        movable: true,
        visible: true,
        operational: true,
        ..Bone::default()
    };
    match b.kind {
        0 | 4 => bone.movable = false,
        3 => {
            bone.rotatable = false;
            bone.movable = false;
        }
        5 => {
            bone.inherit = Inherit::Rotate {
                parent: b.kind_target,
                power: 1.0,
            }
        }
        6 | 7 => {
            bone.rotatable = false;
            bone.movable = false;
            bone.visible = false;
        }
        8 => {
            bone.movable = false;
            if let Some(to) = position_of(all, b.tail) {
                bone.fixed_axis = Some([
                    to[0] - b.position[0],
                    to[1] - b.position[1],
                    to[2] - b.position[2],
                ]);
            }
        }
        9 => {
            // follows the tail bone and points at that bone's own tail
            bone.movable = false;
            bone.visible = false;
            bone.inherit = Inherit::Rotate {
                parent: b.tail,
                power: b.kind_target as f32 / 100.0,
            };
            bone.tail = BoneTail::Bone(tail_of(all, b.tail));
        }
        // 1 rotate+move, 2 IK (the descriptor comes from the IK list)
        _ => {}
    }
    bone
}

/// Upgrades a legacy model. The result is a plain PMX model.
pub fn upgrade(pmd: &PmdModel) -> Result<Model> {
    let mut textures = TextureTable::default();
    let vertices = pmd.vertices.iter().map(upgrade_vertex).collect();
    let materials = pmd
        .materials
        .iter()
        .enumerate()
        .map(|(i, m)| upgrade_material(i, m, &pmd.toon_names, &mut textures))
        .collect();

    let mut bones: Vec<Bone> = pmd.bones.iter().map(|b| upgrade_bone(b, &pmd.bones)).collect();
    for ik in &pmd.iks {
        let links = ik
            .chain
            .iter()
            .map(|&node| {
                let knee = usize::try_from(node)
                    .ok()
                    .and_then(|i| pmd.bones.get(i))
                    .map_or(false, |b| b.name.find(KNEE).map_or(false, |at| at > 0));
                IkLink {
                    bone: node,
                    limit: if knee {
                        Some(([-PI, 0.0, 0.0], [0.0, 0.0, 0.0]))
                    } else {
                        None
                    },
                }
            })
            .collect();
        match usize::try_from(ik.target)
            .ok()
            .and_then(|i| bones.get_mut(i))
        {
            Some(bone) => {
                bone.ik = Some(Ik {
                    target: ik.effector,
                    loops: i32::from(ik.loops),
                    limit: ik.limit * 4.0,
                    links,
                })
            }
            None => warn!(target = ik.target, "IK entry points outside the bone list"),
        }
    }

    let base = pmd.skins.iter().find(|s| s.kind == 0);
    let mut morphs: Vec<Morph> = pmd
        .skins
        .iter()
        .filter(|s| s.kind != 0)
        .map(|skin| {
            let offsets = skin
                .vertices
                .iter()
                .filter_map(|v| {
                    let vertex = base
                        .and_then(|b| b.vertices.get(v.index as usize))
                        .map(|bv| bv.index as i32);
                    if vertex.is_none() {
                        warn!(skin = %skin.name, index = v.index, "skin vertex outside the base skin");
                    }
                    vertex.map(|vertex| VertexOffset {
                        vertex,
                        offset: v.offset,
                    })
                })
                .collect();
            Morph {
                name: skin.name.clone(),
                name_en: skin.name.clone(),
                panel: Panel::try_from(skin.kind).unwrap_or(Panel::Other),
                offsets: MorphOffsets::Vertex(offsets),
            }
        })
        .collect();

    let mut frames = vec![
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
            items: vec![],
        },
    ];
    for entry in &pmd.skin_display {
        // the base skin is not a morph
        let morph = entry.skin - 1;
        frames[1].items.push(FrameItem::Morph(morph));
        if let Some(m) = usize::try_from(morph).ok().and_then(|i| morphs.get_mut(i)) {
            if !entry.name_en.is_empty() {
                m.name_en = entry.name_en.clone();
            }
        }
    }
    for group in &pmd.bone_groups {
        frames.push(Frame {
            name: group.name.clone(),
            name_en: placeholder(&group.name_en, &group.name),
            special: false,
            items: vec![],
        });
    }
    for &(bone, group) in &pmd.bone_display {
        match frames.get_mut(usize::from(group) + 1) {
            Some(frame) => frame.items.push(FrameItem::Bone(bone)),
            None => warn!(bone, group, "bone display entry names a missing group"),
        }
    }

    let rigids = pmd
        .rigids
        .iter()
        .map(|r| {
            let mut position = r.position;
            if let Some(origin) = position_of(&pmd.bones, r.bone) {
                for k in 0..3 {
                    position[k] += origin[k];
                }
            }
            Ok(Rigid {
                name: r.name.clone(),
                name_en: r.name.clone(),
                bone: r.bone,
                group: r.group,
                collision_mask: r.collision_mask,
                shape: RigidShape::try_from(r.shape)?,
                size: r.size,
                position,
                rotation: r.rotation,
                mass: r.mass,
                linear_damping: r.linear_damping,
                angular_damping: r.angular_damping,
                restitution: r.restitution,
                friction: r.friction,
                physics: RigidPhysics::try_from(r.physics)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let joints = pmd
        .joints
        .iter()
        .map(|j| Joint {
            name: j.name.clone(),
            name_en: j.name.clone(),
            kind: JointKind::Spring6Dof,
            rigid_a: j.rigid_a,
            rigid_b: j.rigid_b,
            position: j.position,
            rotation: j.rotation,
            position_min: j.position_min,
            position_max: j.position_max,
            rotation_min: j.rotation_min,
            rotation_max: j.rotation_max,
            position_spring: j.position_spring,
            rotation_spring: j.rotation_spring,
        })
        .collect();

    debug!(
        morphs = morphs.len(),
        frames = frames.len(),
        textures = textures.paths.len(),
        "upgraded legacy model"
    );
    Ok(Model {
        status: FormatStatus::legacy(),
        info: ModelInfo {
            name: pmd.name.clone(),
            name_en: placeholder(&pmd.name_en, &pmd.name),
            comment: pmd.comment.clone(),
            comment_en: placeholder(&pmd.comment_en, &pmd.comment),
        },
        vertices,
        faces: pmd.indices.clone(),
        textures: textures.paths,
        materials,
        bones,
        morphs,
        frames,
        rigids,
        joints,
        soft_bodies: vec![],
    })
}
